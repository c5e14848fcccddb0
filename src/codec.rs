use std::num::NonZeroUsize;

use bytes::{Buf, BytesMut};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::codec::{self, Framed};

use crate::{
    frame::{Frame, CLOSE_TYPE, TEXT_DELIMITER},
    Options, Result, WebSocketError, DEFAULT_MAX_FRAME_SIZE, MAX_LENGTH_FIELD_SIZE,
};

/// A combined codec that provides both encoding and decoding functionality for hybi-00 frames.
///
/// The `Codec` struct combines a `Decoder` for parsing incoming frames and an `Encoder` for
/// serializing outgoing frames. Use it with Tokio's framed streams, or through
/// [`Codec::framed`], once the HTTP upgrade of a connection is done.
#[derive(Debug, Default)]
pub struct Codec {
    decoder: Decoder,
    encoder: Encoder,
}

impl Codec {
    /// Creates a new `Codec` configured by `options`.
    ///
    /// # Errors
    /// Returns [`WebSocketError::InvalidMaxFrameSize`] if the configured maximum frame size is zero.
    pub fn new(options: &Options) -> Result<Self> {
        Ok(Self {
            decoder: Decoder::new(options.max_frame_size()?),
            encoder: Encoder,
        })
    }

    /// Wraps `io` into a [`Framed`] stream of incoming frames and sink of outgoing frames.
    ///
    /// `io` must already be past the HTTP upgrade. The stream ends with an error if the peer
    /// violates the protocol or hangs up in the middle of a frame.
    pub fn framed<T>(self, io: T) -> Framed<T, Self>
    where
        T: AsyncRead + AsyncWrite,
    {
        Framed::new(io, self)
    }

    /// Returns the decoding half.
    pub fn decoder(&self) -> &Decoder {
        &self.decoder
    }
}

impl From<(Decoder, Encoder)> for Codec {
    fn from((decoder, encoder): (Decoder, Encoder)) -> Self {
        Self { decoder, encoder }
    }
}

impl codec::Decoder for Codec {
    type Item = <Decoder as codec::Decoder>::Item;
    type Error = <Decoder as codec::Decoder>::Error;

    #[inline]
    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>> {
        codec::Decoder::decode(&mut self.decoder, src)
    }
}

impl codec::Encoder<Frame> for Codec {
    type Error = <Encoder as codec::Encoder<Frame>>::Error;

    #[inline]
    fn encode(&mut self, item: Frame, dst: &mut BytesMut) -> Result<()> {
        codec::Encoder::encode(&mut self.encoder, item, dst)
    }
}

/// A decoder for hybi-00 frames.
///
/// The decoder keeps no parsing state between calls: every call parses from the start of the
/// buffer again, and the buffer is only advanced once a whole frame is there. A call that
/// returns `Ok(None)` leaves every byte in place, so the same bytes are simply parsed again
/// when more data arrives. The only thing it holds is the maximum frame size.
#[derive(Debug, Clone)]
pub struct Decoder {
    /// Maximum allowed size for a frame payload.
    max_frame_size: usize,
}

impl Default for Decoder {
    fn default() -> Self {
        Self {
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
        }
    }
}

impl Decoder {
    /// Creates a new `Decoder` with a specified maximum frame size.
    ///
    /// # Parameters
    /// - `max_frame_size`: The maximum allowed payload size, in bytes.
    pub fn new(max_frame_size: NonZeroUsize) -> Self {
        Self {
            max_frame_size: max_frame_size.get(),
        }
    }

    /// Returns the maximum frame size this decoder accepts.
    pub fn max_frame_size(&self) -> usize {
        self.max_frame_size
    }

    /// Parses a binary frame, `src[0]` being its type byte.
    ///
    /// The length is accumulated seven bits at a time and checked against the limit after
    /// every byte, so an oversized frame is refused before its length is even complete.
    fn decode_binary(&self, type_byte: u8, src: &mut BytesMut) -> Result<Option<Frame>> {
        let mut frame_size: usize = 0;
        let mut length_field_size = 0;

        loop {
            let Some(&b) = src.get(1 + length_field_size) else {
                return Ok(None);
            };

            let low = usize::from(b & 0x7F);
            frame_size = match frame_size.checked_mul(128) {
                Some(size) if (size | low) <= self.max_frame_size => size | low,
                _ => return Err(self.frame_too_large(frame_size.saturating_mul(128) | low)),
            };

            length_field_size += 1;
            if length_field_size > MAX_LENGTH_FIELD_SIZE {
                #[cfg(feature = "logging")]
                log::debug!(
                    "rejecting binary frame: length field longer than {MAX_LENGTH_FIELD_SIZE} bytes"
                );
                return Err(WebSocketError::LengthFieldTooLong);
            }

            if b & 0x80 == 0 {
                break;
            }
        }

        let header_size = 1 + length_field_size;

        if frame_size == 0 && type_byte == CLOSE_TYPE {
            src.advance(header_size);
            return Ok(Some(Frame::close()));
        }

        let Some(frame_end) = header_size.checked_add(frame_size) else {
            return Err(self.frame_too_large(frame_size));
        };
        if src.len() < frame_end {
            // bounded by max_frame_size
            src.reserve(frame_end - src.len());
            return Ok(None);
        }

        src.advance(header_size);
        let payload = src.split_to(frame_size).freeze();

        Ok(Some(Frame::binary(payload)))
    }

    /// Parses a text frame: everything after the type byte up to the first `0xFF`.
    fn decode_text(&self, src: &mut BytesMut) -> Result<Option<Frame>> {
        let pending = &src[1..];
        // Only the first max + 1 bytes can hold an acceptable delimiter.
        let window = pending.len().min(self.max_frame_size.saturating_add(1));

        let Some(frame_size) = pending[..window].iter().position(|&b| b == TEXT_DELIMITER) else {
            if pending.len() > self.max_frame_size {
                return Err(self.frame_too_large(pending.len()));
            }
            return Ok(None);
        };

        if frame_size > self.max_frame_size {
            return Err(self.frame_too_large(frame_size));
        }

        src.advance(1);
        let payload = src.split_to(frame_size).freeze();
        src.advance(1);

        Ok(Some(Frame::text(payload)))
    }

    #[cfg_attr(not(feature = "logging"), allow(unused_variables))]
    fn frame_too_large(&self, seen: usize) -> WebSocketError {
        #[cfg(feature = "logging")]
        log::debug!(
            "rejecting frame: {seen} bytes against a maximum of {}",
            self.max_frame_size
        );
        WebSocketError::FrameTooLarge
    }
}

impl codec::Decoder for Decoder {
    type Item = Frame;
    type Error = WebSocketError;

    /// Decodes one frame from the front of `src`.
    ///
    /// # Returns
    /// - `Ok(Some(Frame))`: A complete frame; exactly its bytes were removed from `src`.
    /// - `Ok(None)`: More data is needed; `src` is left untouched.
    /// - `Err(WebSocketError)`: The peer violated the protocol limits. The connection must be
    ///   closed; decoding the same bytes again is meaningless.
    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>> {
        let Some(&type_byte) = src.first() else {
            return Ok(None);
        };

        let frame = if type_byte & 0x80 == 0x80 {
            self.decode_binary(type_byte, src)?
        } else {
            self.decode_text(src)?
        };

        #[cfg(feature = "logging")]
        if let Some(frame) = &frame {
            log::trace!(
                "decoded {:?} frame with {} payload bytes",
                frame.opcode,
                frame.payload.len()
            );
        }

        Ok(frame)
    }
}

/// hybi-00 frame encoder for serializing `Frame` instances into a buffer.
///
/// # Errors
/// Returns [`WebSocketError::InvalidTextPayload`] for text frames containing `0xFF`.
#[derive(Debug, Default, Clone, Copy)]
pub struct Encoder;

impl codec::Encoder<Frame> for Encoder {
    type Error = WebSocketError;

    fn encode(&mut self, frame: Frame, dst: &mut BytesMut) -> Result<()> {
        frame.write_to(dst)
    }
}
