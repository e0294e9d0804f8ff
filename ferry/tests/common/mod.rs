// Copyright (c) 2025 Xu Shaohua <shaohua@biofan.org>. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

//! Helpers to drive a broker instance over real sockets.

#![allow(dead_code)]

use std::net::SocketAddr;
use tokio::io::{AsyncReadExt, AsyncWriteExt, BufReader, DuplexStream};
use tokio::net::{TcpStream, UdpSocket};
use tokio::task::JoinHandle;
use tokio::time::{sleep, Duration};

use codec::{ByteArray, DecodeFrame, EncodeFrame, RequestFrame, REQUEST_FRAME_LEN};
use ferry::broker::Broker;
use ferry::error::Error;
use ferry::{constants, socket};

/// How long to wait for the broker task to process inflight frames.
pub const SETTLE: Duration = Duration::from_millis(300);

pub struct TestBroker {
    pub tcp_addr: SocketAddr,
    pub udp_addr: SocketAddr,
    admin: DuplexStream,
    handle: JoinHandle<Result<(), Error>>,
}

impl TestBroker {
    /// Bind a broker to ephemeral local ports and run its loop.
    pub async fn start() -> Self {
        let listener = socket::new_tcp_listener("127.0.0.1:0".parse().unwrap()).unwrap();
        let udp = socket::new_udp_socket("127.0.0.1:0".parse().unwrap())
            .await
            .unwrap();
        let tcp_addr = listener.local_addr().unwrap();
        let udp_addr = udp.local_addr().unwrap();

        let (admin, admin_remote) = tokio::io::duplex(64);
        let handle = tokio::spawn(async move {
            let mut broker = Broker::new(listener, udp, constants::CHANNEL_CAPACITY);
            broker.run_loop(BufReader::new(admin_remote)).await
        });

        Self {
            tcp_addr,
            udp_addr,
            admin,
            handle,
        }
    }

    /// Send the `exit` token on the administrative input and wait for the
    /// loop to return.
    pub async fn shutdown(mut self) -> Result<(), Error> {
        self.admin.write_all(b"exit\n").await.unwrap();
        self.handle.await.unwrap()
    }

    /// Write one raw line to the administrative input.
    pub async fn admin_line(&mut self, line: &str) {
        self.admin.write_all(line.as_bytes()).await.unwrap();
    }

    pub fn abort(self) {
        self.handle.abort();
    }
}

/// Open a stream to the broker and identify as `id`.
pub async fn connect(addr: SocketAddr, id: &str) -> TcpStream {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream.set_nodelay(true).unwrap();
    send_request(
        &mut stream,
        &RequestFrame::Connect { id: id.to_string() },
    )
    .await;
    stream
}

pub async fn send_request(stream: &mut TcpStream, frame: &RequestFrame) {
    let mut buf = Vec::with_capacity(REQUEST_FRAME_LEN);
    frame.encode(&mut buf).unwrap();
    stream.write_all(&buf).await.unwrap();
}

pub async fn subscribe(stream: &mut TcpStream, id: &str, topic: &str, sf: bool) {
    send_request(
        stream,
        &RequestFrame::Subscribe {
            id: id.to_string(),
            topic: topic.to_string(),
            sf,
        },
    )
    .await;
}

pub async fn unsubscribe(stream: &mut TcpStream, id: &str, topic: &str) {
    send_request(
        stream,
        &RequestFrame::Unsubscribe {
            id: id.to_string(),
            topic: topic.to_string(),
        },
    )
    .await;
}

pub async fn send_exit(stream: &mut TcpStream, id: &str) {
    send_request(stream, &RequestFrame::Exit { id: id.to_string() }).await;
}

/// Build a datagram carrying an INT value.
pub fn int_datagram(topic: &str, sign: u8, magnitude: u32) -> Vec<u8> {
    let mut datagram = vec![0_u8; codec::TOPIC_LEN];
    datagram[..topic.len()].copy_from_slice(topic.as_bytes());
    datagram.push(0);
    datagram.push(sign);
    datagram.extend_from_slice(&magnitude.to_be_bytes());
    datagram
}

/// Build a datagram carrying a STRING value.
pub fn string_datagram(topic: &str, value: &str) -> Vec<u8> {
    let mut datagram = vec![0_u8; codec::TOPIC_LEN];
    datagram[..topic.len()].copy_from_slice(topic.as_bytes());
    datagram.push(3);
    datagram.extend_from_slice(value.as_bytes());
    datagram
}

/// Read one broker frame; panics on a control frame other than shutdown.
pub enum BrokerFrame {
    Delivery(Vec<u8>),
    Shutdown,
}

pub async fn read_frame(stream: &mut TcpStream) -> BrokerFrame {
    let mut kind = [0_u8; 1];
    stream.read_exact(&mut kind).await.unwrap();
    match kind[0] {
        0 => {
            let mut len = [0_u8; 4];
            stream.read_exact(&mut len).await.unwrap();
            let len = u32::from_ne_bytes(len) as usize;
            let mut payload = vec![0_u8; len];
            stream.read_exact(&mut payload).await.unwrap();
            BrokerFrame::Delivery(payload)
        }
        1 => {
            let mut frame = [0_u8; REQUEST_FRAME_LEN];
            stream.read_exact(&mut frame).await.unwrap();
            let frame = RequestFrame::decode(&mut ByteArray::new(&frame)).unwrap();
            assert_eq!(frame, RequestFrame::Shutdown);
            BrokerFrame::Shutdown
        }
        kind => panic!("unknown frame kind {kind}"),
    }
}

/// Read one frame and require it to be a delivery.
pub async fn read_delivery(stream: &mut TcpStream) -> Vec<u8> {
    match read_frame(stream).await {
        BrokerFrame::Delivery(payload) => payload,
        BrokerFrame::Shutdown => panic!("expected a delivery, got shutdown"),
    }
}

/// Give the broker task time to process what was just sent.
pub async fn settle() {
    sleep(SETTLE).await;
}

/// Bind an ephemeral publisher socket.
pub async fn publisher() -> UdpSocket {
    UdpSocket::bind("127.0.0.1:0").await.unwrap()
}
