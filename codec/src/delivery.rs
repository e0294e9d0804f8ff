// Copyright (c) 2025 Xu Shaohua <shaohua@biofan.org>. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

use bytes::{Bytes, BytesMut};
use std::convert::TryFrom;
use std::net::Ipv4Addr;

use super::utils::cstr_to_string;
use super::{
    DecodeError, EncodeError, EncodeFrame, FrameKind, PayloadType, DATAGRAM_HEADER_LEN,
    MAX_DATAGRAM_LEN, TOPIC_LEN,
};

/// Width of the publisher address prefix of a delivery payload.
pub const SRC_ADDR_LEN: usize = 6;

/// Maximum width of a delivery payload.
pub const MAX_PAYLOAD_LEN: usize = SRC_ADDR_LEN + MAX_DATAGRAM_LEN;

/// A broker-to-subscriber delivery frame.
///
/// The payload is the publisher source address prepended to the original
/// datagram bytes; it is immutable after construction and cheap to share
/// between live deliveries and store-and-forward queues.
///
/// On the wire the frame is the `FrameKind::Delivery` tag, a `u32` payload
/// length in native byte order, and the payload:
///
/// ```txt
/// +--------+----------------------+---------------------------------------+
/// | kind   | length               | payload                               |
/// | 1 byte | u32, native order    | src_ip[4] src_port[2] datagram[..]    |
/// +--------+----------------------+---------------------------------------+
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryFrame {
    topic: String,
    payload: Bytes,
}

impl DeliveryFrame {
    /// Build a delivery frame from one ingress datagram and its source
    /// address.
    ///
    /// # Errors
    ///
    /// Returns error if the datagram is shorter than its fixed header,
    /// exceeds the maximum ingress size, or carries an unknown type tag.
    pub fn from_datagram(
        src_ip: Ipv4Addr,
        src_port: u16,
        datagram: &[u8],
    ) -> Result<Self, DecodeError> {
        if datagram.len() < DATAGRAM_HEADER_LEN {
            return Err(DecodeError::DatagramTooShort);
        }
        if datagram.len() > MAX_DATAGRAM_LEN {
            return Err(DecodeError::DatagramTooLarge);
        }
        let _payload_type = PayloadType::try_from(datagram[TOPIC_LEN])?;

        let topic = cstr_to_string(&datagram[..TOPIC_LEN]);

        let mut payload = BytesMut::with_capacity(SRC_ADDR_LEN + datagram.len());
        payload.extend_from_slice(&src_ip.octets());
        payload.extend_from_slice(&src_port.to_be_bytes());
        payload.extend_from_slice(datagram);

        Ok(Self {
            topic,
            payload: payload.freeze(),
        })
    }

    /// Topic the datagram was published on.
    #[must_use]
    pub fn topic(&self) -> &str {
        &self.topic
    }

    #[must_use]
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Payload width as carried in the length prefix.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn len(&self) -> u32 {
        self.payload.len() as u32
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }
}

impl EncodeFrame for DeliveryFrame {
    fn encode(&self, buf: &mut Vec<u8>) -> Result<usize, EncodeError> {
        buf.push(FrameKind::Delivery as u8);
        buf.extend_from_slice(&self.len().to_ne_bytes());
        buf.extend_from_slice(&self.payload);
        Ok(1 + 4 + self.payload.len())
    }
}
