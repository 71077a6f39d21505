use bytes::{BufMut, Bytes, BytesMut};
use std::fmt;
use taglink_core::{constants::*, Error, Result};

/// A framed LLRP message.
///
/// Wire layout is a 10-byte header followed by the payload:
///
/// ```text
/// byte 0      rsvd(2) | version(3) | type bits 9..8
/// byte 1      type bits 7..0
/// bytes 2..6  total length, big-endian, counting the header itself
/// bytes 6..10 message ID, big-endian
/// bytes 10..  payload
/// ```
///
/// Outbound messages always carry protocol version 1. Inbound messages
/// have their type field masked to the low 10 bits; the version bits are
/// not checked because FX9600 firmware echoes whatever the client sent.
///
/// # Example
/// ```
/// use bytes::BytesMut;
/// use taglink_protocol::LlrpMessage;
/// use taglink_core::constants::MSG_KEEPALIVE_ACK;
///
/// let msg = LlrpMessage::header_only(MSG_KEEPALIVE_ACK, 7);
/// let mut buf = BytesMut::new();
/// msg.encode(&mut buf);
///
/// assert_eq!(buf.len(), 10);
/// let back = LlrpMessage::decode(&buf).unwrap();
/// assert_eq!(back, msg);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LlrpMessage {
    /// Message type (10 bits).
    pub message_type: u16,

    /// Message ID allocated by the sender.
    pub message_id: u32,

    /// Payload bytes after the 10-byte header.
    pub payload: Bytes,
}

impl LlrpMessage {
    /// Create a message with a payload.
    pub fn new(message_type: u16, message_id: u32, payload: impl Into<Bytes>) -> Self {
        LlrpMessage {
            message_type: message_type & TLV_TYPE_MASK,
            message_id,
            payload: payload.into(),
        }
    }

    /// Create a message with no payload (header only on the wire).
    pub fn header_only(message_type: u16, message_id: u32) -> Self {
        Self::new(message_type, message_id, Bytes::new())
    }

    /// Total on-wire length including the header.
    #[must_use]
    pub fn total_len(&self) -> usize {
        HEADER_LEN + self.payload.len()
    }

    /// Append the framed message to `dst`.
    pub fn encode(&self, dst: &mut BytesMut) {
        dst.reserve(self.total_len());
        dst.put_u8((LLRP_VERSION << 2) | ((self.message_type >> 8) as u8 & 0x03));
        dst.put_u8((self.message_type & 0xFF) as u8);
        dst.put_u32(self.total_len() as u32);
        dst.put_u32(self.message_id);
        dst.put_slice(&self.payload);
    }

    /// Parse one complete frame from `src`.
    ///
    /// `src` must hold the entire frame; partial input is reported as
    /// `FrameTooShort`, which the stream codec never lets escape (it waits
    /// for more bytes instead of calling this on incomplete data).
    ///
    /// # Errors
    /// - `FrameTooShort` if `src` is smaller than the declared total length
    /// - `FrameLengthInvalid` if the length field is below the header size
    pub fn decode(src: &[u8]) -> Result<Self> {
        if src.len() < HEADER_LEN {
            return Err(Error::FrameTooShort {
                needed: HEADER_LEN,
                available: src.len(),
            });
        }

        let total = u32::from_be_bytes([src[2], src[3], src[4], src[5]]);
        if (total as usize) < HEADER_LEN {
            return Err(Error::FrameLengthInvalid { length: total });
        }
        if src.len() < total as usize {
            return Err(Error::FrameTooShort {
                needed: total as usize,
                available: src.len(),
            });
        }

        let message_type = u16::from_be_bytes([src[0], src[1]]) & TLV_TYPE_MASK;
        let message_id = u32::from_be_bytes([src[6], src[7], src[8], src[9]]);
        let payload = Bytes::copy_from_slice(&src[HEADER_LEN..total as usize]);

        Ok(LlrpMessage {
            message_type,
            message_id,
            payload,
        })
    }

    /// Peek the total-length field of a (possibly partial) frame.
    ///
    /// Returns `None` when fewer than 6 bytes are available.
    #[must_use]
    pub fn peek_total_len(src: &[u8]) -> Option<usize> {
        if src.len() < 6 {
            return None;
        }
        Some(u32::from_be_bytes([src[2], src[3], src[4], src[5]]) as usize)
    }
}

impl fmt::Display for LlrpMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "LlrpMessage[type={}, id={}, payload={}B]",
            self.message_type,
            self.message_id,
            self.payload.len()
        )
    }
}
