// Copyright (c) 2025 Xu Shaohua <shaohua@biofan.org>. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::mpsc::{Receiver, Sender};

use codec::{
    ByteArray, DecodeFrame, DeliveryFrame, EncodeFrame, FrameKind, RequestFrame,
    REQUEST_FRAME_LEN,
};

use crate::commands::{BrokerToSessionCmd, SessionId, SessionToBrokerCmd};
use crate::error::Error;

/// One accepted stream connection.
///
/// The read half frames fixed-size requests and forwards them to the broker;
/// the write half frames whatever the broker orders delivered. Splitting the
/// stream keeps a request read in flight while a delivery is written, so a
/// frame is never torn by the other direction.
#[derive(Debug)]
pub struct Session {
    id: SessionId,
    stream: TcpStream,
    sender: Sender<SessionToBrokerCmd>,
    receiver: Receiver<BrokerToSessionCmd>,
}

impl Session {
    #[must_use]
    pub fn new(
        id: SessionId,
        stream: TcpStream,
        sender: Sender<SessionToBrokerCmd>,
        receiver: Receiver<BrokerToSessionCmd>,
    ) -> Self {
        Self {
            id,
            stream,
            sender,
            receiver,
        }
    }

    pub async fn run_loop(self) {
        let Self {
            id,
            stream,
            sender,
            mut receiver,
        } = self;
        let (read_half, mut write_half) = stream.into_split();
        let reader = tokio::spawn(read_requests(id, read_half, sender.clone()));

        while let Some(cmd) = receiver.recv().await {
            match cmd {
                BrokerToSessionCmd::Deliver(frame) => {
                    if let Err(err) = write_delivery(&mut write_half, &frame).await {
                        log::warn!("session {id}: delivery write failed: {err}");
                        let _ = sender.send(SessionToBrokerCmd::Disconnect(id)).await;
                        break;
                    }
                }
                BrokerToSessionCmd::Shutdown => {
                    if let Err(err) = write_shutdown(&mut write_half).await {
                        log::warn!("session {id}: shutdown write failed: {err}");
                    }
                    break;
                }
                BrokerToSessionCmd::Close => break,
            }
        }

        // Closing the write half alone would leave the socket half-open.
        reader.abort();
        log::info!("session {id}: closed");
    }
}

/// Read fixed-size request frames until the peer goes away.
async fn read_requests(id: SessionId, mut stream: OwnedReadHalf, sender: Sender<SessionToBrokerCmd>) {
    let mut buf = [0_u8; REQUEST_FRAME_LEN];
    loop {
        if stream.read_exact(&mut buf).await.is_err() {
            // Peer closed the stream or the transport failed.
            let _ = sender.send(SessionToBrokerCmd::Disconnect(id)).await;
            return;
        }

        match RequestFrame::decode(&mut ByteArray::new(&buf)) {
            Ok(frame) => {
                // A full frame was consumed either way, so framing stays
                // synchronized and the connection survives bad requests.
                let exit = matches!(frame, RequestFrame::Exit { .. });
                if sender
                    .send(SessionToBrokerCmd::Request(id, frame))
                    .await
                    .is_err()
                {
                    return;
                }
                if exit {
                    return;
                }
            }
            Err(err) => {
                log::warn!("session {id}: dropping malformed request frame: {err:?}");
            }
        }
    }
}

async fn write_delivery(stream: &mut OwnedWriteHalf, frame: &DeliveryFrame) -> Result<(), Error> {
    let mut buf = Vec::with_capacity(1 + 4 + frame.payload().len());
    frame.encode(&mut buf)?;
    stream.write_all(&buf).await?;
    Ok(())
}

async fn write_shutdown(stream: &mut OwnedWriteHalf) -> Result<(), Error> {
    let mut buf = Vec::with_capacity(1 + REQUEST_FRAME_LEN);
    buf.push(FrameKind::Shutdown as u8);
    RequestFrame::Shutdown.encode(&mut buf)?;
    stream.write_all(&buf).await?;
    Ok(())
}
