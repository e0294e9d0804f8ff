// Copyright (c) 2025 Xu Shaohua <shaohua@biofan.org>. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

//! The broker event loop.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::net::{TcpListener, TcpStream, UdpSocket};
use tokio::sync::mpsc::{self, Receiver, Sender};

use codec::{DeliveryFrame, RequestFrame, MAX_DATAGRAM_LEN};

use crate::commands::{BrokerToSessionCmd, SessionId, SessionToBrokerCmd};
use crate::constants::SHUTDOWN_DRAIN;
use crate::dispatcher::{ConnectOutcome, Dispatcher};
use crate::error::{Error, ErrorKind};
use crate::session::Session;

/// Per-connection handle kept by the broker.
#[derive(Debug)]
struct Pipeline {
    sender: Sender<BrokerToSessionCmd>,
    peer: SocketAddr,

    /// Identity bound by a connect request; `None` while pre-identification.
    client_id: Option<String>,
}

/// Multiplexes datagram ingress, stream accept, session requests and
/// administrative input, and owns all broker state.
#[derive(Debug)]
pub struct Broker {
    listener: TcpListener,
    udp: UdpSocket,
    dispatcher: Dispatcher,
    pipelines: HashMap<SessionId, Pipeline>,
    current_session_id: SessionId,
    session_sender: Sender<SessionToBrokerCmd>,
    session_receiver: Receiver<SessionToBrokerCmd>,
    channel_capacity: usize,
}

impl Broker {
    #[must_use]
    pub fn new(listener: TcpListener, udp: UdpSocket, channel_capacity: usize) -> Self {
        let (session_sender, session_receiver) = mpsc::channel(channel_capacity);
        Self {
            listener,
            udp,
            dispatcher: Dispatcher::new(),
            pipelines: HashMap::new(),
            current_session_id: 0,
            session_sender,
            session_receiver,
            channel_capacity,
        }
    }

    /// Run until the `exit` token arrives on `admin`.
    ///
    /// # Errors
    ///
    /// Returns error if the ingress socket or the listener fails; failures
    /// on subscriber streams are handled as disconnects and never abort the
    /// loop.
    pub async fn run_loop<R>(&mut self, admin: R) -> Result<(), Error>
    where
        R: AsyncBufRead + Unpin,
    {
        let mut admin_lines = admin.lines();
        let mut admin_open = true;
        // One spare byte so an oversize datagram is detectable.
        let mut datagram = [0_u8; MAX_DATAGRAM_LEN + 1];

        loop {
            tokio::select! {
                ret = self.listener.accept() => {
                    match ret {
                        Ok((stream, address)) => self.new_connection(stream, address),
                        Err(err) => {
                            return Err(Error::from_string(
                                ErrorKind::SocketError,
                                format!("listener failed: {err}"),
                            ));
                        }
                    }
                }

                ret = self.udp.recv_from(&mut datagram) => {
                    match ret {
                        Ok((len, src)) => self.handle_datagram(&datagram[..len], src).await,
                        Err(err) => {
                            return Err(Error::from_string(
                                ErrorKind::SocketError,
                                format!("datagram ingress failed: {err}"),
                            ));
                        }
                    }
                }

                Some(cmd) = self.session_receiver.recv() => {
                    self.handle_session_cmd(cmd).await;
                }

                line = admin_lines.next_line(), if admin_open => {
                    match line {
                        Ok(Some(line)) => {
                            if self.handle_admin_line(&line).await {
                                return Ok(());
                            }
                        }
                        Ok(None) => admin_open = false,
                        Err(err) => {
                            log::error!("broker: admin input failed: {err}");
                            admin_open = false;
                        }
                    }
                }
            }
        }
    }

    fn next_session_id(&mut self) -> SessionId {
        self.current_session_id += 1;
        self.current_session_id
    }

    fn new_connection(&mut self, stream: TcpStream, address: SocketAddr) {
        if let Err(err) = stream.set_nodelay(true) {
            log::warn!("broker: failed to disable nagle for {address}: {err}");
        }
        let (sender, receiver) = mpsc::channel(self.channel_capacity);
        let session_id = self.next_session_id();
        self.pipelines.insert(
            session_id,
            Pipeline {
                sender,
                peer: address,
                client_id: None,
            },
        );
        let session = Session::new(session_id, stream, self.session_sender.clone(), receiver);
        tokio::spawn(session.run_loop());
        log::info!("broker: accepted stream connection from {address}");
    }

    async fn handle_datagram(&mut self, datagram: &[u8], src: SocketAddr) {
        let SocketAddr::V4(src) = src else {
            log::warn!("broker: dropping non-IPv4 datagram from {src}");
            return;
        };
        let frame = match DeliveryFrame::from_datagram(*src.ip(), src.port(), datagram) {
            Ok(frame) => frame,
            Err(err) => {
                log::warn!("broker: dropping datagram from {src}: {err:?}");
                return;
            }
        };

        let frame = Arc::new(frame);
        for session in self.dispatcher.dispatch(&frame) {
            self.deliver(session, Arc::clone(&frame)).await;
        }
    }

    async fn deliver(&mut self, session: SessionId, frame: Arc<DeliveryFrame>) {
        let Some(pipeline) = self.pipelines.get(&session) else {
            log::error!("broker: no pipeline for session {session}");
            return;
        };
        if pipeline
            .sender
            .send(BrokerToSessionCmd::Deliver(frame))
            .await
            .is_err()
        {
            log::warn!("broker: session {session} is gone, marking disconnected");
            self.on_transport_disconnect(session);
        }
    }

    async fn handle_session_cmd(&mut self, cmd: SessionToBrokerCmd) {
        match cmd {
            SessionToBrokerCmd::Request(session, frame) => match frame {
                RequestFrame::Connect { id } => self.on_connect(session, &id).await,
                RequestFrame::Subscribe { id, topic, sf } => self.on_subscribe(&id, &topic, sf),
                RequestFrame::Unsubscribe { id, topic } => self.on_unsubscribe(&id, &topic),
                RequestFrame::Exit { id } => self.on_exit(session, &id),
                RequestFrame::Shutdown => {
                    log::warn!("broker: unexpected shutdown frame from session {session}");
                }
            },
            SessionToBrokerCmd::Disconnect(session) => self.on_transport_disconnect(session),
        }
    }

    async fn on_connect(&mut self, session: SessionId, id: &str) {
        let Some(pipeline) = self.pipelines.get(&session) else {
            return;
        };
        if pipeline.client_id.is_some() {
            log::warn!("broker: session {session} is already identified, ignoring connect for {id}");
            return;
        }
        let peer = pipeline.peer;

        match self.dispatcher.connect(id, session) {
            ConnectOutcome::Accepted { replay } => {
                println!(
                    "New client {id} connected from {}:{}.",
                    peer.ip(),
                    peer.port()
                );
                if let Some(pipeline) = self.pipelines.get_mut(&session) {
                    pipeline.client_id = Some(id.to_string());
                }
                // Replay precedes anything published after this point; the
                // session channel keeps the order.
                for frame in replay {
                    self.deliver(session, frame).await;
                }
            }
            ConnectOutcome::AlreadyConnected => {
                println!("Client {id} already connected.");
                if let Some(pipeline) = self.pipelines.remove(&session) {
                    let _ = pipeline.sender.send(BrokerToSessionCmd::Close).await;
                }
            }
            ConnectOutcome::Noop => {
                log::warn!("broker: repeated connect for {id} on session {session}");
            }
        }
    }

    fn on_subscribe(&mut self, id: &str, topic: &str, sf: bool) {
        if !self.dispatcher.subscribe(id, topic, sf) {
            log::warn!("broker: subscribe request from unknown client id {id}");
        }
    }

    fn on_unsubscribe(&mut self, id: &str, topic: &str) {
        if !self.dispatcher.unsubscribe(id, topic) {
            log::warn!("broker: unsubscribe request from unknown client id {id}");
        }
    }

    fn on_exit(&mut self, session: SessionId, id: &str) {
        if self.dispatcher.disconnect(id) {
            println!("Client {id} disconnected.");
        } else {
            log::warn!("broker: exit request from unknown client id {id}");
        }
        self.pipelines.remove(&session);
    }

    /// Abrupt disconnect: keep the registry entry, forget the pipeline.
    fn on_transport_disconnect(&mut self, session: SessionId) {
        if self.pipelines.remove(&session).is_none() {
            return;
        }
        if let Some(id) = self.dispatcher.disconnect_session(session) {
            println!("Client {id} disconnected.");
        } else {
            log::info!("broker: unidentified session {session} closed");
        }
    }

    /// Returns true when the loop should stop.
    async fn handle_admin_line(&mut self, line: &str) -> bool {
        let mut words = line.split_whitespace();
        match words.next() {
            Some("exit") if words.next().is_none() => {
                self.shutdown().await;
                true
            }
            Some(command) => {
                log::warn!("broker: unknown admin command: {command}");
                false
            }
            None => false,
        }
    }

    async fn shutdown(&mut self) {
        log::info!("broker: shutting down");
        for (session, pipeline) in &self.pipelines {
            let cmd = if pipeline.client_id.is_some() {
                BrokerToSessionCmd::Shutdown
            } else {
                BrokerToSessionCmd::Close
            };
            if pipeline.sender.send(cmd).await.is_err() {
                log::warn!("broker: session {session} is already gone");
            }
        }
        self.pipelines.clear();
        // Let session tasks flush their shutdown frames before the runtime
        // is torn down.
        tokio::time::sleep(SHUTDOWN_DRAIN).await;
    }
}
