// Copyright (c) 2025 Xu Shaohua <shaohua@biofan.org>. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

use byteorder::{BigEndian, WriteBytesExt};
use std::convert::TryFrom;

use super::utils::{validate_id, write_cstr_field};
use super::{
    ByteArray, DecodeError, DecodeFrame, EncodeError, EncodeFrame, ID_FIELD_LEN, MAX_ID_LEN,
    TOPIC_FIELD_LEN,
};

/// Width of the request body in bytes, shared by every request kind.
const BODY_LEN: usize = TOPIC_FIELD_LEN + 1;

/// Total width of a request frame in bytes.
///
/// The frame is a packed fixed-size record; the receiver always reads
/// exactly this many bytes before decoding, so a malformed body never
/// desynchronizes the stream.
///
/// ```txt
/// +-----------------+------------------------+----------------+
/// | id              | body                   | kind           |
/// | 11 bytes        | 52 bytes               | u32, net order |
/// +-----------------+------------------------+----------------+
///
/// body, subscribe:      topic[51] ++ sf[1]
/// body, unsubscribe:    topic[51] ++ pad[1]
/// body, message:        message_kind[u32, net order] ++ pad[48]
/// body, exit:           pad[52]
/// ```
pub const REQUEST_FRAME_LEN: usize = ID_FIELD_LEN + BODY_LEN + 4;

/// Identity the broker signs control frames with.
pub const SERVER_ID: &str = "SERVER";

/// Value of the trailing kind field of a request frame.
#[repr(u32)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RequestKind {
    Exit = 0,
    Subscribe = 1,
    Unsubscribe = 2,
    Message = 3,
}

impl TryFrom<u32> for RequestKind {
    type Error = DecodeError;

    fn try_from(v: u32) -> Result<Self, Self::Error> {
        match v {
            0 => Ok(Self::Exit),
            1 => Ok(Self::Subscribe),
            2 => Ok(Self::Unsubscribe),
            3 => Ok(Self::Message),
            _ => Err(DecodeError::InvalidRequestKind),
        }
    }
}

/// Discriminator of the body of `RequestKind::Message` frames.
#[repr(u32)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MessageKind {
    /// Subscriber announces its identity after opening the stream.
    Connect = 0,

    /// Broker announces orderly shutdown to a subscriber.
    Shutdown = 1,
}

impl TryFrom<u32> for MessageKind {
    type Error = DecodeError;

    fn try_from(v: u32) -> Result<Self, Self::Error> {
        match v {
            0 => Ok(Self::Connect),
            1 => Ok(Self::Shutdown),
            _ => Err(DecodeError::InvalidMessageKind),
        }
    }
}

/// A decoded request frame.
///
/// Subscribers send `Connect`, `Subscribe`, `Unsubscribe` and `Exit`; the
/// broker sends `Shutdown`. The wire shape is identical in both directions.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RequestFrame {
    Connect { id: String },
    Subscribe { id: String, topic: String, sf: bool },
    Unsubscribe { id: String, topic: String },
    Exit { id: String },
    Shutdown,
}

impl RequestFrame {
    /// Identity carried in the frame.
    #[must_use]
    pub fn id(&self) -> &str {
        match self {
            Self::Connect { id }
            | Self::Subscribe { id, .. }
            | Self::Unsubscribe { id, .. }
            | Self::Exit { id } => id,
            Self::Shutdown => SERVER_ID,
        }
    }

    #[must_use]
    pub const fn kind(&self) -> RequestKind {
        match self {
            Self::Exit { .. } => RequestKind::Exit,
            Self::Subscribe { .. } => RequestKind::Subscribe,
            Self::Unsubscribe { .. } => RequestKind::Unsubscribe,
            Self::Connect { .. } | Self::Shutdown => RequestKind::Message,
        }
    }
}

impl EncodeFrame for RequestFrame {
    fn encode(&self, buf: &mut Vec<u8>) -> Result<usize, EncodeError> {
        validate_id(self.id())?;
        let old_len = buf.len();

        write_cstr_field(buf, self.id(), ID_FIELD_LEN);

        match self {
            Self::Subscribe { topic, sf, .. } => {
                write_cstr_field(buf, topic, TOPIC_FIELD_LEN);
                buf.push(u8::from(*sf));
            }
            Self::Unsubscribe { topic, .. } => {
                write_cstr_field(buf, topic, TOPIC_FIELD_LEN);
                buf.push(0);
            }
            Self::Connect { .. } => {
                buf.write_u32::<BigEndian>(MessageKind::Connect as u32)?;
            }
            Self::Shutdown => {
                buf.write_u32::<BigEndian>(MessageKind::Shutdown as u32)?;
            }
            Self::Exit { .. } => {}
        }

        // Zero-fill the unused tail of the body.
        buf.resize(old_len + ID_FIELD_LEN + BODY_LEN, 0);

        buf.write_u32::<BigEndian>(self.kind() as u32)?;
        Ok(REQUEST_FRAME_LEN)
    }
}

impl DecodeFrame for RequestFrame {
    fn decode(ba: &mut ByteArray) -> Result<Self, DecodeError> {
        let mut id = ba.read_cstr(ID_FIELD_LEN)?;
        // An unterminated identity field is clamped to the declared width.
        id.truncate(MAX_ID_LEN);

        let mut body = [0_u8; BODY_LEN];
        body.copy_from_slice(ba.read_bytes(BODY_LEN)?);
        let kind = RequestKind::try_from(ba.read_u32()?)?;

        let mut body = ByteArray::new(&body);
        match kind {
            RequestKind::Exit => Ok(Self::Exit { id }),
            RequestKind::Subscribe => {
                let topic = body.read_cstr(TOPIC_FIELD_LEN)?;
                let sf = match body.read_byte()? {
                    0 => false,
                    1 => true,
                    _ => return Err(DecodeError::InvalidBool),
                };
                Ok(Self::Subscribe { id, topic, sf })
            }
            RequestKind::Unsubscribe => {
                let topic = body.read_cstr(TOPIC_FIELD_LEN)?;
                Ok(Self::Unsubscribe { id, topic })
            }
            RequestKind::Message => match MessageKind::try_from(body.read_u32()?)? {
                MessageKind::Connect => Ok(Self::Connect { id }),
                MessageKind::Shutdown => Ok(Self::Shutdown),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(frame: &RequestFrame) -> RequestFrame {
        let mut buf = Vec::new();
        let written = frame.encode(&mut buf).unwrap();
        assert_eq!(written, REQUEST_FRAME_LEN);
        assert_eq!(buf.len(), REQUEST_FRAME_LEN);
        RequestFrame::decode(&mut ByteArray::new(&buf)).unwrap()
    }

    #[test]
    fn test_roundtrip_connect() {
        let frame = RequestFrame::Connect {
            id: "sub01".to_string(),
        };
        assert_eq!(roundtrip(&frame), frame);
    }

    #[test]
    fn test_roundtrip_subscribe() {
        let frame = RequestFrame::Subscribe {
            id: "sub01".to_string(),
            topic: "sensors/+/temp".to_string(),
            sf: true,
        };
        assert_eq!(roundtrip(&frame), frame);
    }

    #[test]
    fn test_roundtrip_unsubscribe() {
        let frame = RequestFrame::Unsubscribe {
            id: "sub01".to_string(),
            topic: "news".to_string(),
        };
        assert_eq!(roundtrip(&frame), frame);
    }

    #[test]
    fn test_roundtrip_exit() {
        let frame = RequestFrame::Exit {
            id: "a".to_string(),
        };
        assert_eq!(roundtrip(&frame), frame);
    }

    #[test]
    fn test_roundtrip_shutdown() {
        assert_eq!(roundtrip(&RequestFrame::Shutdown), RequestFrame::Shutdown);
        let mut buf = Vec::new();
        let _ = RequestFrame::Shutdown.encode(&mut buf).unwrap();
        assert_eq!(&buf[..7], b"SERVER\x00");
    }

    #[test]
    fn test_id_too_long() {
        let frame = RequestFrame::Connect {
            id: "longer-than-ten".to_string(),
        };
        let mut buf = Vec::new();
        assert_eq!(frame.encode(&mut buf), Err(EncodeError::IdTooLong));
    }

    #[test]
    fn test_topic_is_clamped() {
        let frame = RequestFrame::Subscribe {
            id: "sub01".to_string(),
            topic: "x".repeat(60),
            sf: false,
        };
        let mut buf = Vec::new();
        let _ = frame.encode(&mut buf).unwrap();
        match RequestFrame::decode(&mut ByteArray::new(&buf)).unwrap() {
            RequestFrame::Subscribe { topic, .. } => assert_eq!(topic, "x".repeat(50)),
            other => panic!("unexpected frame: {other:?}"),
        }
    }

    #[test]
    fn test_invalid_kind() {
        let mut buf = Vec::new();
        let _ = RequestFrame::Exit {
            id: "a".to_string(),
        }
        .encode(&mut buf)
        .unwrap();
        buf[REQUEST_FRAME_LEN - 1] = 9;
        assert_eq!(
            RequestFrame::decode(&mut ByteArray::new(&buf)),
            Err(DecodeError::InvalidRequestKind)
        );
    }

    #[test]
    fn test_invalid_sf_flag() {
        let frame = RequestFrame::Subscribe {
            id: "sub01".to_string(),
            topic: "news".to_string(),
            sf: false,
        };
        let mut buf = Vec::new();
        let _ = frame.encode(&mut buf).unwrap();
        buf[ID_FIELD_LEN + TOPIC_FIELD_LEN] = 7;
        assert_eq!(
            RequestFrame::decode(&mut ByteArray::new(&buf)),
            Err(DecodeError::InvalidBool)
        );
    }

    #[test]
    fn test_truncated_frame() {
        let mut buf = Vec::new();
        let _ = RequestFrame::Exit {
            id: "a".to_string(),
        }
        .encode(&mut buf)
        .unwrap();
        buf.pop();
        assert_eq!(
            RequestFrame::decode(&mut ByteArray::new(&buf)),
            Err(DecodeError::OutOfRange)
        );
    }
}
