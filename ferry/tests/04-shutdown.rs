// Copyright (c) 2025 Xu Shaohua <shaohua@biofan.org>. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

mod common;
use common::{BrokerFrame, TestBroker};

use tokio::io::AsyncReadExt;

#[tokio::test]
async fn test_exit_token_notifies_connected_subscribers() {
    let broker = TestBroker::start().await;

    let mut first = common::connect(broker.tcp_addr, "s1").await;
    let mut second = common::connect(broker.tcp_addr, "s2").await;
    common::settle().await;

    broker.shutdown().await.unwrap();

    assert!(matches!(
        common::read_frame(&mut first).await,
        BrokerFrame::Shutdown
    ));
    assert!(matches!(
        common::read_frame(&mut second).await,
        BrokerFrame::Shutdown
    ));

    // The streams end after the control frame.
    let mut byte = [0_u8; 1];
    assert_eq!(first.read(&mut byte).await.unwrap(), 0);
    assert_eq!(second.read(&mut byte).await.unwrap(), 0);
}

#[tokio::test]
async fn test_unknown_admin_command_is_ignored() {
    let mut broker = TestBroker::start().await;
    let mut sub = common::connect(broker.tcp_addr, "s1").await;
    common::subscribe(&mut sub, "s1", "news", false).await;
    common::settle().await;

    // The loop survives garbage on the administrative input.
    broker.admin_line("status\n").await;
    common::settle().await;

    let publisher = common::publisher().await;
    publisher
        .send_to(&common::string_datagram("news", "x"), broker.udp_addr)
        .await
        .unwrap();
    let _payload = common::read_delivery(&mut sub).await;

    broker.shutdown().await.unwrap();
}
