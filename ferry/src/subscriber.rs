// Copyright (c) 2025 Xu Shaohua <shaohua@biofan.org>. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

//! The subscriber command line client.
//!
//! A thin front-end: it identifies itself with a connect frame, turns stdin
//! commands into request frames, and prints every decoded delivery one per
//! line.

use clap::Parser;
use std::convert::TryFrom;
use std::net::{Ipv4Addr, SocketAddrV4};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::tcp::OwnedReadHalf;
use tokio::net::TcpStream;
use tokio::runtime::Runtime;

use codec::{
    ByteArray, DecodeFrame, EncodeFrame, FrameKind, Payload, RequestFrame, MAX_ID_LEN,
    MAX_PAYLOAD_LEN, REQUEST_FRAME_LEN,
};

use crate::error::{Error, ErrorKind};

#[derive(Debug, Parser)]
#[command(name = "ferry-sub", about = "Subscriber client for the ferry broker", version)]
struct Arguments {
    /// Subscriber identity, at most 10 bytes.
    id: String,

    /// Broker address.
    ip: Ipv4Addr,

    /// Broker port.
    port: u16,
}

/// Entry point of the subscriber binary.
///
/// # Errors
///
/// Returns error on invalid parameters or transport failures.
pub fn run_subscriber() -> Result<(), Error> {
    let args = Arguments::parse();
    if args.id.is_empty() || args.id.len() > MAX_ID_LEN {
        return Err(Error::from_string(
            ErrorKind::ParameterError,
            format!("client id must be 1..={MAX_ID_LEN} bytes, got {:?}", args.id),
        ));
    }

    let runtime = Runtime::new()?;
    runtime.block_on(client_loop(&args.id, SocketAddrV4::new(args.ip, args.port)))
}

async fn client_loop(id: &str, address: SocketAddrV4) -> Result<(), Error> {
    let mut stream = TcpStream::connect(address).await?;
    stream.set_nodelay(true)?;

    send_request(&mut stream, &RequestFrame::Connect { id: id.to_string() }).await?;

    let (read_half, mut write_half) = stream.into_split();
    let mut reader = tokio::spawn(read_frames(read_half));

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;
    loop {
        tokio::select! {
            ret = &mut reader => {
                // The broker closed the stream or announced shutdown.
                return ret.unwrap_or(Ok(()));
            }

            line = lines.next_line(), if stdin_open => {
                match line {
                    Ok(Some(line)) => {
                        if handle_command(&mut write_half, id, &line).await? {
                            reader.abort();
                            return Ok(());
                        }
                    }
                    Ok(None) => stdin_open = false,
                    Err(err) => return Err(err.into()),
                }
            }
        }
    }
}

/// Print broker frames until the stream ends.
async fn read_frames(mut stream: OwnedReadHalf) -> Result<(), Error> {
    loop {
        let mut kind = [0_u8; 1];
        match stream.read_exact(&mut kind).await {
            Ok(_) => {}
            // A clean close also covers rejected duplicate identities.
            Err(err) if err.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(()),
            Err(err) => return Err(err.into()),
        }

        match FrameKind::try_from(kind[0])? {
            FrameKind::Delivery => {
                let mut len = [0_u8; 4];
                stream.read_exact(&mut len).await?;
                let len = u32::from_ne_bytes(len) as usize;
                if len > MAX_PAYLOAD_LEN {
                    return Err(Error::from_string(
                        ErrorKind::DecodeError,
                        format!("oversize delivery frame: {len} bytes"),
                    ));
                }
                let mut payload = vec![0_u8; len];
                stream.read_exact(&mut payload).await?;
                match Payload::parse(&payload) {
                    Ok(payload) => println!("{payload}"),
                    Err(err) => log::warn!("dropping malformed delivery: {err:?}"),
                }
            }
            FrameKind::Shutdown => {
                let mut frame = [0_u8; REQUEST_FRAME_LEN];
                stream.read_exact(&mut frame).await?;
                match RequestFrame::decode(&mut ByteArray::new(&frame)) {
                    Ok(RequestFrame::Shutdown) => {
                        println!("Server is shutting down. Closing connection.");
                        return Ok(());
                    }
                    Ok(frame) => log::warn!("unexpected control frame: {frame:?}"),
                    Err(err) => log::warn!("dropping malformed control frame: {err:?}"),
                }
            }
        }
    }
}

/// Handle one stdin command. Returns true when the client should exit.
async fn handle_command<W>(stream: &mut W, id: &str, line: &str) -> Result<bool, Error>
where
    W: AsyncWrite + Unpin,
{
    let argv: Vec<&str> = line.split_whitespace().collect();
    match argv.first() {
        Some(&"exit") => {
            if argv.len() != 1 {
                println!("Wrong format for exit.");
                return Ok(false);
            }
            send_request(stream, &RequestFrame::Exit { id: id.to_string() }).await?;
            Ok(true)
        }
        Some(&"subscribe") => {
            let sf = match argv.as_slice() {
                [_, _topic] => false,
                [_, _topic, "0"] => false,
                [_, _topic, "1"] => true,
                _ => {
                    println!("Wrong format for subscribe.");
                    return Ok(false);
                }
            };
            let frame = RequestFrame::Subscribe {
                id: id.to_string(),
                topic: argv[1].to_string(),
                sf,
            };
            send_request(stream, &frame).await?;
            println!("Subscribed to topic.");
            Ok(false)
        }
        Some(&"unsubscribe") => {
            if argv.len() != 2 {
                println!("Wrong format for unsubscribe.");
                return Ok(false);
            }
            let frame = RequestFrame::Unsubscribe {
                id: id.to_string(),
                topic: argv[1].to_string(),
            };
            send_request(stream, &frame).await?;
            println!("Unsubscribed from topic.");
            Ok(false)
        }
        Some(command) => {
            log::warn!("unknown command: {command}");
            Ok(false)
        }
        None => Ok(false),
    }
}

async fn send_request<W>(stream: &mut W, frame: &RequestFrame) -> Result<(), Error>
where
    W: AsyncWrite + Unpin,
{
    let mut buf = Vec::with_capacity(REQUEST_FRAME_LEN);
    frame.encode(&mut buf)?;
    stream.write_all(&buf).await?;
    Ok(())
}
