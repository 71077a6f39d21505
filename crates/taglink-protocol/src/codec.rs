//! Tokio codec for LLRP message framing.
//!
//! `LlrpCodec` adapts the length-delimited LLRP frame format to Tokio's
//! [`Decoder`]/[`Encoder`] traits so a session can run over
//! `Framed<TcpStream, LlrpCodec>`:
//!
//! ```text
//! TCP stream -> Decoder -> LlrpMessage (parsed)
//! LlrpMessage -> Encoder -> TCP stream (10-byte header + payload)
//! ```
//!
//! The decoder never discards bytes except by consuming a complete frame:
//! partial input is left in the buffer until the declared total length has
//! arrived. A maximum frame size (default 64 KiB) rejects absurd length
//! fields before they can pin the buffer.

use bytes::BytesMut;
use tokio_util::codec::{Decoder, Encoder};

use crate::frame::LlrpMessage;
use taglink_core::{constants::HEADER_LEN, Error, Result};

/// Default maximum frame size in bytes (64 KiB).
///
/// RO_ACCESS_REPORTs from an FX9600 top out well below this even with
/// hundreds of tag records per report.
const DEFAULT_MAX_FRAME_SIZE: usize = 64 * 1024;

/// Tokio codec for LLRP messages.
///
/// # Example
/// ```
/// use bytes::BytesMut;
/// use tokio_util::codec::{Decoder, Encoder};
/// use taglink_protocol::{LlrpCodec, LlrpMessage};
/// use taglink_core::constants::MSG_KEEPALIVE;
///
/// let mut codec = LlrpCodec::new();
/// let mut buf = BytesMut::new();
/// codec.encode(LlrpMessage::header_only(MSG_KEEPALIVE, 1), &mut buf).unwrap();
///
/// let decoded = codec.decode(&mut buf).unwrap().unwrap();
/// assert_eq!(decoded.message_type, MSG_KEEPALIVE);
/// ```
#[derive(Debug)]
pub struct LlrpCodec {
    /// Frames larger than this are rejected with `FrameTooLarge`.
    max_frame_size: usize,
}

impl LlrpCodec {
    /// Create a codec with the default maximum frame size.
    pub fn new() -> Self {
        LlrpCodec {
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
        }
    }

    /// Create a codec with a custom maximum frame size.
    pub fn with_max_frame_size(max_frame_size: usize) -> Self {
        LlrpCodec { max_frame_size }
    }

    /// Get the configured maximum frame size.
    pub fn max_frame_size(&self) -> usize {
        self.max_frame_size
    }
}

impl Default for LlrpCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for LlrpCodec {
    type Item = LlrpMessage;
    type Error = Error;

    /// Extract one complete message from the stream buffer.
    ///
    /// Returns `Ok(None)` until the full frame (as declared by the length
    /// field) has been buffered.
    ///
    /// # Errors
    /// - `FrameLengthInvalid` if the length field is below the header size;
    ///   the session treats this as a protocol error and tears down
    /// - `FrameTooLarge` if the length field exceeds the configured maximum
    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>> {
        let Some(total) = LlrpMessage::peek_total_len(src) else {
            return Ok(None);
        };

        if total < HEADER_LEN {
            return Err(Error::FrameLengthInvalid {
                length: total as u32,
            });
        }
        if total > self.max_frame_size {
            return Err(Error::FrameTooLarge {
                size: total,
                max_size: self.max_frame_size,
            });
        }

        if src.len() < total {
            // Reserve up front so the remainder arrives into one allocation.
            src.reserve(total - src.len());
            return Ok(None);
        }

        let frame = src.split_to(total);
        LlrpMessage::decode(&frame).map(Some)
    }
}

impl Encoder<LlrpMessage> for LlrpCodec {
    type Error = Error;

    fn encode(&mut self, item: LlrpMessage, dst: &mut BytesMut) -> Result<()> {
        if item.total_len() > self.max_frame_size {
            return Err(Error::FrameTooLarge {
                size: item.total_len(),
                max_size: self.max_frame_size,
            });
        }
        item.encode(dst);
        Ok(())
    }
}
