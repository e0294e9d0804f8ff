// Copyright (c) 2025 Xu Shaohua <shaohua@biofan.org>. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

use std::net::SocketAddr;
use tokio::net::{TcpListener, TcpSocket, UdpSocket};

use crate::constants::LISTEN_BACKLOG;
use crate::error::Error;

/// Create the stream listener at `address` with address reuse enabled.
///
/// # Errors
///
/// Returns error if the socket cannot be created or bound.
pub fn new_tcp_listener(address: SocketAddr) -> Result<TcpListener, Error> {
    let socket = match address {
        SocketAddr::V4(..) => TcpSocket::new_v4()?,
        SocketAddr::V6(..) => TcpSocket::new_v6()?,
    };
    socket.set_reuseaddr(true)?;
    socket.bind(address)?;
    Ok(socket.listen(LISTEN_BACKLOG)?)
}

/// Create the datagram ingress socket at `address`.
///
/// # Errors
///
/// Returns error if the socket cannot be bound.
pub async fn new_udp_socket(address: SocketAddr) -> Result<UdpSocket, Error> {
    Ok(UdpSocket::bind(address).await?)
}
