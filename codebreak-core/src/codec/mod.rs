//! Length-prefixed text framing.
//!
//! ```text
//! "ML" <ascii decimal length> <payload bytes>
//! ```
//!
//! The length field has no terminator: it ends at the first non-digit
//! byte, which is already the first payload byte. Every payload starts
//! with the `LK` protocol tag, so this is unambiguous in practice.

use bytes::{Buf, BufMut, BytesMut};

use crate::error::CodebreakError;

/// Two-byte marker opening every frame.
pub const FRAME_MARKER: &[u8; 2] = b"ML";

/// Largest payload accepted in either direction (10 MiB).
pub const MAX_FRAME_SIZE: usize = 10 * 1024 * 1024;

/// `MAX_FRAME_SIZE` has 8 decimal digits; anything longer is garbage.
const MAX_LENGTH_DIGITS: usize = 8;

#[derive(Debug, Default, Clone, Copy)]
pub struct FrameCodec;

impl tokio_util::codec::Decoder for FrameCodec {
    type Item = String;
    type Error = CodebreakError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if src.len() < FRAME_MARKER.len() {
            return Ok(None);
        }
        if &src[..FRAME_MARKER.len()] != FRAME_MARKER {
            return Err(CodebreakError::InvalidMarker);
        }

        let digits = src[FRAME_MARKER.len()..]
            .iter()
            .take_while(|b| b.is_ascii_digit())
            .count();
        if digits > MAX_LENGTH_DIGITS {
            return Err(CodebreakError::InvalidLength("too many length digits"));
        }
        let header_len = FRAME_MARKER.len() + digits;
        if header_len == src.len() {
            // Still inside the length field.
            return Ok(None);
        }
        if digits == 0 {
            return Err(CodebreakError::InvalidLength("missing length"));
        }

        let length: usize = std::str::from_utf8(&src[FRAME_MARKER.len()..header_len])
            .ok()
            .and_then(|s| s.parse().ok())
            .ok_or(CodebreakError::InvalidLength("unparsable length"))?;
        if length == 0 {
            return Err(CodebreakError::InvalidLength("empty payload"));
        }
        if length > MAX_FRAME_SIZE {
            return Err(CodebreakError::FrameTooLarge {
                size: length,
                max: MAX_FRAME_SIZE,
            });
        }

        if src.len() < header_len + length {
            src.reserve(header_len + length - src.len());
            return Ok(None);
        }

        src.advance(header_len);
        let payload = src.split_to(length);
        Ok(Some(String::from_utf8(payload.to_vec())?))
    }
}

impl tokio_util::codec::Encoder<String> for FrameCodec {
    type Error = CodebreakError;

    fn encode(&mut self, item: String, dst: &mut BytesMut) -> Result<(), Self::Error> {
        if item.is_empty() {
            return Err(CodebreakError::InvalidLength("empty payload"));
        }
        if item.len() > MAX_FRAME_SIZE {
            return Err(CodebreakError::FrameTooLarge {
                size: item.len(),
                max: MAX_FRAME_SIZE,
            });
        }
        let length = item.len().to_string();
        dst.reserve(FRAME_MARKER.len() + length.len() + item.len());
        dst.put_slice(FRAME_MARKER);
        dst.put_slice(length.as_bytes());
        dst.put_slice(item.as_bytes());
        Ok(())
    }
}
