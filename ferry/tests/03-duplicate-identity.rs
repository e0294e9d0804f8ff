// Copyright (c) 2025 Xu Shaohua <shaohua@biofan.org>. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

mod common;
use common::TestBroker;

use codec::{Payload, PayloadValue};
use tokio::io::AsyncReadExt;

#[tokio::test]
async fn test_second_connect_with_live_identity_is_rejected() {
    let broker = TestBroker::start().await;

    let mut first = common::connect(broker.tcp_addr, "c1").await;
    common::subscribe(&mut first, "c1", "news", false).await;
    common::settle().await;

    // The rejected socket is closed without a frame.
    let mut second = common::connect(broker.tcp_addr, "c1").await;
    let mut byte = [0_u8; 1];
    let n = second.read(&mut byte).await.unwrap();
    assert_eq!(n, 0);

    // The original session is intact and still receives messages.
    let publisher = common::publisher().await;
    publisher
        .send_to(&common::string_datagram("news", "alive"), broker.udp_addr)
        .await
        .unwrap();
    let parsed = Payload::parse(&common::read_delivery(&mut first).await).unwrap();
    assert_eq!(parsed.value, PayloadValue::String("alive".to_string()));

    broker.shutdown().await.unwrap();
}
