//! # hybi00
//! Streaming codec for the legacy WebSocket framing known as hybi-00 (also hixie-76), the
//! format spoken by browsers before RFC 6455.
//!
//! The crate turns an arbitrarily fragmented byte stream from an untrusted peer into a
//! sequence of [`Frame`]s, and frames back into bytes. It plugs into Tokio through
//! [`tokio_util::codec`], so a connection that already completed its HTTP upgrade can be
//! wrapped with [`Codec::framed`] and driven as a `Stream` + `Sink` of frames.
//!
//! # Wire format
//!
//! ```text
//! text:    0x00..=0x7F  payload ... 0xFF
//! binary:  0x80..=0xFF  length (base-128, big-endian, bit 7 = more)  payload ...
//! close:   0xFF 0x00
//! ```
//!
//! # Features
//! The crate provides a couple of optional features that can be enabled in your `Cargo.toml`:
//!
//! - `logging`: Enables debug logging of rejected peers and trace logging of decoded frames
//!   using the `log` crate.
//!
//! - `simd`: Uses `simdutf8` to validate text payloads in [`Frame::as_str`].
//!
//! # Example
//! ```rust
//! use bytes::BytesMut;
//! use tokio_util::codec::Decoder as _;
//! use hybi00::{Codec, Options, OpCode};
//!
//! # fn main() -> hybi00::Result<()> {
//! let mut codec = Codec::new(&Options::default().with_max_frame_size(64 * 1024))?;
//! let mut buf = BytesMut::from(&b"\x00hello\xff\xff\x00"[..]);
//!
//! let frame = codec.decode(&mut buf)?.expect("text frame");
//! assert_eq!(frame.opcode, OpCode::Text);
//! assert_eq!(frame.as_str()?, "hello");
//!
//! let frame = codec.decode(&mut buf)?.expect("close frame");
//! assert!(frame.is_close());
//! # Ok(())
//! # }
//! ```
//!
//! # Memory Safety
//! Every frame is bounded by a maximum size (default [`DEFAULT_MAX_FRAME_SIZE`]):
//! - Binary frames are rejected as soon as the declared length passes the bound, before
//!   any payload is awaited.
//! - Text frames are rejected once more than the bound is buffered without a delimiter.
//! - Length fields are capped at [`MAX_LENGTH_FIELD_SIZE`] bytes.
//!
//! A rejected peer surfaces as an `Err`, after which the connection must be closed. The
//! format has no way to resynchronize a corrupted stream.

#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod codec;
pub mod frame;

use std::num::NonZeroUsize;

use thiserror::Error;

pub use codec::{Codec, Decoder, Encoder};
pub use frame::{Frame, OpCode};

/// The default maximum frame size, set to 128 KiB.
///
/// Frames whose declared or observed payload size is larger than this are rejected and the
/// connection is expected to be closed.
pub const DEFAULT_MAX_FRAME_SIZE: usize = 128 * 1024;

/// Maximum number of bytes a binary frame length may span.
///
/// Eight groups of seven bits already describe lengths far larger than any sane limit; a peer
/// that keeps the continuation bit set past this point is cut off.
pub const MAX_LENGTH_FIELD_SIZE: usize = 8;

/// A result type for codec operations, using `WebSocketError` as the error type.
pub type Result<T> = std::result::Result<T, WebSocketError>;

/// Represents errors that can occur while framing or unframing hybi-00 traffic.
///
/// Running out of buffered bytes is never an error: the decoder reports it as `Ok(None)`.
/// The variants for which [`WebSocketError::is_protocol_violation`] returns `true` mean the
/// peer broke the protocol limits and the connection has to be closed.
#[derive(Error, Debug)]
pub enum WebSocketError {
    /// Occurs when a frame's declared or observed payload size exceeds the configured maximum.
    /// This is raised while accumulating a binary length, while searching for a text
    /// delimiter, or once the delimiter is found too far away.
    #[error("Frame too large")]
    FrameTooLarge,

    /// Occurs when a binary frame's length field spans more than [`MAX_LENGTH_FIELD_SIZE`]
    /// bytes, i.e. the peer never clears the continuation bit.
    #[error("Frame length field too long")]
    LengthFieldTooLong,

    /// Returned when a maximum frame size of zero is configured.
    #[error("Maximum frame size must be positive")]
    InvalidMaxFrameSize,

    /// Returned when encoding a text frame whose payload contains the `0xFF` delimiter,
    /// which the text framing has no way to escape.
    #[error("Text payload contains the 0xFF frame delimiter")]
    InvalidTextPayload,

    /// Indicates that a payload read as text is not valid UTF-8.
    #[error("Invalid UTF-8")]
    InvalidUTF8,

    /// Wraps standard I/O errors coming from the underlying transport,
    /// such as connection resets or bytes left over at end of stream.
    #[error(transparent)]
    IoError(#[from] std::io::Error),
}

impl WebSocketError {
    /// Returns `true` if the error is a protocol violation by the peer.
    ///
    /// Both [`WebSocketError::FrameTooLarge`] and [`WebSocketError::LengthFieldTooLong`] are
    /// fatal to the connection and are handled the same way by callers.
    pub fn is_protocol_violation(&self) -> bool {
        matches!(
            self,
            WebSocketError::FrameTooLarge | WebSocketError::LengthFieldTooLong
        )
    }
}

/// Configuration options for a hybi-00 connection.
///
/// The frame size limit is the only tunable. It bounds the memory a peer can make the
/// decoder wait on.
#[derive(Clone, Debug, Default)]
pub struct Options {
    /// Maximum allowed payload size for incoming frames, in bytes.
    ///
    /// Must be positive. A frame exceeding it makes the decoder fail and the connection
    /// should be closed.
    ///
    /// Default: 128 KiB (131,072 bytes) as defined in [`DEFAULT_MAX_FRAME_SIZE`]
    pub max_frame_size: Option<usize>,
}

impl Options {
    /// Sets the maximum allowed payload size for incoming frames.
    ///
    /// # Parameters
    /// - `size`: The maximum frame size in bytes.
    ///
    /// # Returns
    /// A modified `Options` instance with the specified frame size limit.
    pub fn with_max_frame_size(self, size: usize) -> Self {
        Self {
            max_frame_size: Some(size),
        }
    }

    /// Returns the effective maximum frame size.
    ///
    /// Falls back to [`DEFAULT_MAX_FRAME_SIZE`] when unset and fails with
    /// [`WebSocketError::InvalidMaxFrameSize`] when set to zero.
    pub fn max_frame_size(&self) -> Result<NonZeroUsize> {
        let size = self.max_frame_size.unwrap_or(DEFAULT_MAX_FRAME_SIZE);
        NonZeroUsize::new(size).ok_or(WebSocketError::InvalidMaxFrameSize)
    }
}
