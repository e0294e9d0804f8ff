// Copyright (c) 2025 Xu Shaohua <shaohua@biofan.org>. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

use clap::Parser;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use tokio::io::BufReader;
use tokio::runtime::Runtime;

use crate::broker::Broker;
use crate::config::Config;
use crate::constants::MIN_PORT;
use crate::error::{Error, ErrorKind};
use crate::socket;

#[derive(Debug, Parser)]
#[command(name = "ferry", about = "Topic based publish/subscribe broker", version)]
struct Arguments {
    /// Port both the datagram ingress and the stream listener bind to.
    port: u16,

    /// Specify config file path.
    #[arg(short, long, value_name = "config_file")]
    config: Option<PathBuf>,
}

/// Entry point of the broker binary.
///
/// # Errors
///
/// Returns error on invalid parameters, bind failures, or a fatal failure
/// of the ingress socket or listener.
pub fn run_server() -> Result<(), Error> {
    let args = Arguments::parse();
    if args.port < MIN_PORT {
        return Err(Error::from_string(
            ErrorKind::ParameterError,
            format!("port {} out of range [{MIN_PORT}, 65535]", args.port),
        ));
    }

    let config = match &args.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };

    env_logger::Builder::from_default_env()
        .filter_level(config.log.level.to_level_filter())
        .init();

    let ip: IpAddr = config.network.bind_ip.parse()?;
    let address = SocketAddr::new(ip, args.port);

    let runtime = Runtime::new()?;
    runtime.block_on(async {
        let listener = socket::new_tcp_listener(address)?;
        let udp = socket::new_udp_socket(address).await?;
        log::info!("listening at {address}");

        let mut broker = Broker::new(listener, udp, config.network.channel_capacity);
        broker.run_loop(BufReader::new(tokio::io::stdin())).await
    })
}
