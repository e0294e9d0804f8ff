// Copyright (c) 2025 Xu Shaohua <shaohua@biofan.org>. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

use super::{EncodeError, MAX_ID_LEN};

/// Append a fixed-width NUL-padded text field to `buf`.
///
/// The field occupies exactly `width` bytes. The content is truncated to
/// `width - 1` bytes so the terminating NUL always fits.
pub fn write_cstr_field(buf: &mut Vec<u8>, s: &str, width: usize) {
    let content = &s.as_bytes()[..s.len().min(width - 1)];
    buf.extend_from_slice(content);
    buf.resize(buf.len() + width - content.len(), 0);
}

/// Convert a fixed-width NUL-padded field to a string.
///
/// Stops at the first NUL byte, or at field end when every byte is
/// populated. Invalid UTF-8 is replaced, matching the tolerant handling of
/// raw publisher bytes on the egress path.
#[must_use]
pub fn cstr_to_string(field: &[u8]) -> String {
    let end = field.iter().position(|b| *b == 0).unwrap_or(field.len());
    String::from_utf8_lossy(&field[..end]).into_owned()
}

/// Check subscriber identity length.
///
/// # Errors
///
/// Returns error if `id` exceeds 10 bytes.
pub fn validate_id(id: &str) -> Result<(), EncodeError> {
    if id.len() > MAX_ID_LEN {
        Err(EncodeError::IdTooLong)
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_cstr_field() {
        let mut buf = Vec::new();
        write_cstr_field(&mut buf, "ab", 4);
        assert_eq!(&buf, b"ab\x00\x00");

        buf.clear();
        write_cstr_field(&mut buf, "abcdef", 4);
        assert_eq!(&buf, b"abc\x00");
    }

    #[test]
    fn test_cstr_to_string() {
        assert_eq!(cstr_to_string(b"abc\x00\x00"), "abc");
        assert_eq!(cstr_to_string(b"abc"), "abc");
        assert_eq!(cstr_to_string(b"\x00abc"), "");
    }

    #[test]
    fn test_validate_id() {
        assert!(validate_id("abcdefghij").is_ok());
        assert_eq!(validate_id("abcdefghijk"), Err(EncodeError::IdTooLong));
    }
}
