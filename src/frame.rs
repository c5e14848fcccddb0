//! # Frame
//!
//! The `frame` module implements the frames of the legacy hybi-00 WebSocket draft. There is
//! no header word as in RFC 6455: the first byte alone decides how the rest of the frame is
//! delimited.
//!
//! ## Frame Binary Format
//!
//! ```text
//! Text frame (type byte with bit 7 clear, payload ends at the first 0xFF):
//! +--------+--------------------------------+------+
//! | 0x00   |        payload ...             | 0xFF |
//! +--------+--------------------------------+------+
//!
//! Binary frame (type byte with bit 7 set, base-128 big-endian length):
//! +--------+-----------+-----+-----------+--------------------+
//! | 0x80   | 1LLLLLLL  | ... | 0LLLLLLL  |    payload ...     |
//! +--------+-----------+-----+-----------+--------------------+
//!
//! Close indication (binary type 0xFF, zero length):
//! +--------+--------+
//! | 0xFF   | 0x00   |
//! +--------+--------+
//! ```
//!
//! Text payloads are carried as raw bytes; validating them as UTF-8 is left to whoever
//! consumes the frame, see [`Frame::as_str`].
use bytes::{Bytes, BytesMut};

use crate::WebSocketError;

/// Type byte used when encoding text frames.
pub(crate) const TEXT_TYPE: u8 = 0x00;
/// Type byte used when encoding binary frames.
pub(crate) const BINARY_TYPE: u8 = 0x80;
/// Type byte that, followed by a zero length, signals the closing handshake.
pub(crate) const CLOSE_TYPE: u8 = 0xFF;
/// Terminates a text frame.
pub(crate) const TEXT_DELIMITER: u8 = 0xFF;

/// The kind of a hybi-00 frame.
///
/// - `Text`: payload delimited by `0xFF`, conventionally UTF-8
/// - `Binary`: length-prefixed raw bytes
/// - `Close`: the closing handshake, never carries a payload
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum OpCode {
    Text,
    Binary,
    Close,
}

/// A hybi-00 WebSocket frame.
///
/// Decoded frames own their payload: it is split off the connection's read buffer without
/// copying, and the decoder keeps no reference to it afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// The kind of frame.
    pub opcode: OpCode,
    /// The frame's payload data. Always empty for `OpCode::Close`.
    pub payload: Bytes,
}

impl Frame {
    /// Creates a new text frame with the given payload.
    ///
    /// The payload must not contain `0xFF`, otherwise encoding fails with
    /// [`WebSocketError::InvalidTextPayload`].
    pub fn text(payload: impl Into<Bytes>) -> Self {
        Self {
            opcode: OpCode::Text,
            payload: payload.into(),
        }
    }

    /// Creates a new binary frame with the given payload.
    pub fn binary(payload: impl Into<Bytes>) -> Self {
        Self {
            opcode: OpCode::Binary,
            payload: payload.into(),
        }
    }

    /// Creates the close indication.
    pub fn close() -> Self {
        Self {
            opcode: OpCode::Close,
            payload: Bytes::new(),
        }
    }

    #[inline]
    pub fn is_text(&self) -> bool {
        self.opcode == OpCode::Text
    }

    #[inline]
    pub fn is_binary(&self) -> bool {
        self.opcode == OpCode::Binary
    }

    #[inline]
    pub fn is_close(&self) -> bool {
        self.opcode == OpCode::Close
    }

    /// Views the payload as a string slice.
    ///
    /// # Errors
    /// Returns [`WebSocketError::InvalidUTF8`] if the payload is not valid UTF-8. The
    /// decoder never validates text, so this is where hostile text gets caught.
    pub fn as_str(&self) -> Result<&str, WebSocketError> {
        #[cfg(feature = "simd")]
        use simdutf8::basic::from_utf8;
        #[cfg(not(feature = "simd"))]
        use std::str::from_utf8;

        from_utf8(&self.payload).map_err(|_| WebSocketError::InvalidUTF8)
    }

    /// Writes the frame in wire format at the end of `dst`.
    ///
    /// Nothing is written if the frame cannot be represented.
    pub(crate) fn write_to(&self, dst: &mut BytesMut) -> Result<(), WebSocketError> {
        match self.opcode {
            OpCode::Text => {
                if self.payload.contains(&TEXT_DELIMITER) {
                    return Err(WebSocketError::InvalidTextPayload);
                }

                dst.reserve(self.payload.len() + 2);
                dst.extend_from_slice(&[TEXT_TYPE]);
                dst.extend_from_slice(&self.payload);
                dst.extend_from_slice(&[TEXT_DELIMITER]);
            }
            OpCode::Binary => {
                let mut head = [0; 1 + MAX_ENCODED_LENGTH];
                head[0] = BINARY_TYPE;
                let size = 1 + fmt_length(self.payload.len(), &mut head[1..]);

                dst.reserve(size + self.payload.len());
                dst.extend_from_slice(&head[..size]);
                dst.extend_from_slice(&self.payload);
            }
            OpCode::Close => dst.extend_from_slice(&[CLOSE_TYPE, 0x00]),
        }

        Ok(())
    }
}

/// Enough 7-bit groups for any `u64` length.
const MAX_ENCODED_LENGTH: usize = 10;

/// Formats `len` as a base-128 big-endian number with the continuation bit set on every
/// byte but the last, using the fewest groups possible.
///
/// # Returns
/// The number of bytes written to `out`.
fn fmt_length(len: usize, out: &mut [u8]) -> usize {
    let len = len as u64;
    let groups = ((u64::BITS - len.leading_zeros()) as usize).div_ceil(7).max(1);

    for (i, byte) in out[..groups].iter_mut().enumerate() {
        let shift = 7 * (groups - 1 - i);
        let more = if i + 1 < groups { 0x80 } else { 0x00 };
        *byte = ((len >> shift) as u8 & 0x7F) | more;
    }

    groups
}

/// Converts a `Frame` into a tuple of `(OpCode, Bytes)`.
impl From<Frame> for (OpCode, Bytes) {
    fn from(val: Frame) -> Self {
        (val.opcode, val.payload)
    }
}

/// Unit tests for the `hybi00::frame` module.
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_frame() {
        let frame = Frame::text("Hello, WebSocket!");

        assert_eq!(frame.opcode, OpCode::Text);
        assert!(frame.is_text());
        assert_eq!(frame.payload, Bytes::from("Hello, WebSocket!"));
    }

    #[test]
    fn test_binary_frame() {
        let data = vec![0x01, 0x02, 0x03];
        let frame = Frame::binary(data.clone());

        assert_eq!(frame.opcode, OpCode::Binary);
        assert!(frame.is_binary());
        assert_eq!(frame.payload, Bytes::from(data));
    }

    #[test]
    fn test_close_frame() {
        let frame = Frame::close();

        assert!(frame.is_close());
        assert!(frame.payload.is_empty());
    }

    #[test]
    fn test_as_str() {
        assert_eq!(Frame::text("ünïcode").as_str().unwrap(), "ünïcode");
        assert!(matches!(
            Frame::text(vec![0xC3, 0x28]).as_str(),
            Err(WebSocketError::InvalidUTF8)
        ));
    }

    #[test]
    fn test_into_tuple() {
        let (opcode, payload) = Frame::binary("abc").into();
        assert_eq!(opcode, OpCode::Binary);
        assert_eq!(payload, Bytes::from("abc"));
    }

    #[test]
    fn test_fmt_length() {
        let mut out = [0; MAX_ENCODED_LENGTH];

        assert_eq!(fmt_length(0, &mut out), 1);
        assert_eq!(out[0], 0x00);

        assert_eq!(fmt_length(127, &mut out), 1);
        assert_eq!(out[0], 0x7F);

        assert_eq!(fmt_length(128, &mut out), 2);
        assert_eq!(&out[..2], &[0x81, 0x00]);

        // 131072 = 0b1000_0000000_0000000
        assert_eq!(fmt_length(131072, &mut out), 3);
        assert_eq!(&out[..3], &[0x88, 0x80, 0x00]);

        assert_eq!(fmt_length(usize::MAX, &mut out), (usize::BITS as usize).div_ceil(7));
    }

    #[test]
    fn test_write_text() {
        let mut dst = BytesMut::new();
        Frame::text("foo").write_to(&mut dst).unwrap();
        assert_eq!(&dst[..], b"\x00foo\xff");
    }

    #[test]
    fn test_write_text_with_delimiter() {
        let mut dst = BytesMut::new();
        let res = Frame::text(vec![b'a', 0xFF, b'b']).write_to(&mut dst);

        assert!(matches!(res, Err(WebSocketError::InvalidTextPayload)));
        assert!(dst.is_empty());
    }

    #[test]
    fn test_write_binary() {
        let mut dst = BytesMut::new();
        Frame::binary(vec![7; 200]).write_to(&mut dst).unwrap();

        assert_eq!(&dst[..3], &[0x80, 0x81, 0x48]);
        assert_eq!(dst.len(), 3 + 200);
        assert!(dst[3..].iter().all(|&b| b == 7));
    }

    #[test]
    fn test_write_empty_binary() {
        let mut dst = BytesMut::new();
        Frame::binary(Bytes::new()).write_to(&mut dst).unwrap();
        assert_eq!(&dst[..], &[0x80, 0x00]);
    }

    #[test]
    fn test_write_close() {
        let mut dst = BytesMut::new();
        Frame::close().write_to(&mut dst).unwrap();
        assert_eq!(&dst[..], &[0xFF, 0x00]);
    }
}
