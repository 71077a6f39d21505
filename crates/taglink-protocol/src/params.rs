//! TLV and TV parameter codec.
//!
//! LLRP mixes two parameter encodings in the same byte stream:
//!
//! - **TLV**: 2-byte type (low 10 bits significant), 2-byte length counting
//!   the 4-byte header, then the value. Containers nest by placing further
//!   parameters inside the value.
//! - **TV**: 1-byte type with the MSB set (low 7 bits significant),
//!   followed by a fixed-size value whose length is implied by the type.
//!   TV parameters carry no length field, so an unknown TV type makes the
//!   remainder of the scope unparseable without help.
//!
//! Decoding is expressed over byte ranges of the parent buffer: no parsed
//! parameter owns storage, and nested TLV containers are decoded by
//! constructing a new [`ParamIter`] over a sub-range.

use taglink_core::constants::{RESYNC_SCAN_LIMIT, TLV_TYPE_MASK, TV_FLAG, TV_TYPE_MASK};

use bytes::{BufMut, BytesMut};

/// Value length in bytes for a known TV parameter type.
///
/// Returns `None` for TV types this client cannot size; inside a tag
/// report the iterator then falls back to resynchronisation.
#[must_use]
pub fn tv_value_len(tv_type: u8) -> Option<usize> {
    use taglink_core::constants::*;
    match tv_type {
        TV_ANTENNA_ID => Some(2),
        TV_PEAK_RSSI => Some(1),
        TV_CHANNEL_INDEX => Some(2),
        TV_FIRST_SEEN_UTC => Some(8),
        TV_LAST_SEEN_UTC => Some(8),
        TV_TAG_SEEN_COUNT => Some(2),
        TV_EPC_96 => Some(12),
        TV_RO_SPEC_ID => Some(4),
        TV_SPEC_INDEX => Some(2),
        TV_INVENTORY_PARAMETER_SPEC_ID => Some(2),
        _ => None,
    }
}

/// A decoded parameter, borrowing from the parent buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Param<'a> {
    /// TLV parameter. `data` spans the whole parameter INCLUDING its
    /// 4-byte header, so nested decodes can recurse from offset 4.
    Tlv { param_type: u16, data: &'a [u8] },

    /// TV parameter. `value` spans the fixed-size value only.
    Tv { tv_type: u8, value: &'a [u8] },
}

impl<'a> Param<'a> {
    /// Value bytes of a TLV parameter (everything after the header).
    #[must_use]
    pub fn tlv_body(&self) -> Option<&'a [u8]> {
        match self {
            Param::Tlv { data, .. } => data.get(4..),
            Param::Tv { .. } => None,
        }
    }
}

/// Recovery policy applied when the iterator hits an unknown TV type or a
/// malformed TLV length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resync {
    /// Terminate the scope. Used for top-level message walks, where any
    /// malformation is a protocol error the session must surface.
    Strict,

    /// Scan forward a bounded distance for the next MSB-set byte and
    /// resume there; terminate the record if none is found. Readers in
    /// the FX9600 class append vendor TV parameters only after well-formed
    /// prefixes, so this recovers the common case. Gated to TagReportData
    /// decoding; it is not part of the LLRP specification.
    TagReport,
}

/// Lazy iterator over the parameters in a byte range.
///
/// # Example
/// ```
/// use taglink_protocol::params::{Param, ParamIter, Resync};
///
/// // One AntennaID TV (type 1, value 0x0003)
/// let buf = [0x81, 0x00, 0x03];
/// let params: Vec<_> = ParamIter::new(&buf, Resync::Strict).collect();
/// assert_eq!(params, vec![Param::Tv { tv_type: 1, value: &[0x00, 0x03] }]);
/// ```
#[derive(Debug)]
pub struct ParamIter<'a> {
    buf: &'a [u8],
    pos: usize,
    resync: Resync,
}

impl<'a> ParamIter<'a> {
    pub fn new(buf: &'a [u8], resync: Resync) -> Self {
        ParamIter {
            buf,
            pos: 0,
            resync,
        }
    }

    /// Attempt recovery after a malformed or unsizable parameter.
    ///
    /// Returns `true` if the cursor was moved to a plausible TV boundary.
    fn try_resync(&mut self) -> bool {
        match self.resync {
            Resync::Strict => {
                self.pos = self.buf.len();
                false
            }
            Resync::TagReport => {
                let window_end = (self.pos + 1 + RESYNC_SCAN_LIMIT).min(self.buf.len());
                for candidate in self.pos + 1..window_end {
                    if self.buf[candidate] & TV_FLAG != 0 {
                        self.pos = candidate;
                        return true;
                    }
                }
                self.pos = self.buf.len();
                false
            }
        }
    }
}

impl<'a> Iterator for ParamIter<'a> {
    type Item = Param<'a>;

    fn next(&mut self) -> Option<Param<'a>> {
        loop {
            if self.pos >= self.buf.len() {
                return None;
            }

            let first = self.buf[self.pos];
            if first & TV_FLAG != 0 {
                let tv_type = first & TV_TYPE_MASK;
                let Some(value_len) = tv_value_len(tv_type) else {
                    if !self.try_resync() {
                        return None;
                    }
                    continue;
                };

                let start = self.pos + 1;
                let end = start + value_len;
                if end > self.buf.len() {
                    // Truncated value: nothing more to salvage here.
                    self.pos = self.buf.len();
                    return None;
                }
                let value = &self.buf[start..end];
                self.pos = end;
                return Some(Param::Tv { tv_type, value });
            }

            // TLV path
            if self.pos + 4 > self.buf.len() {
                self.pos = self.buf.len();
                return None;
            }
            let raw_type = u16::from_be_bytes([self.buf[self.pos], self.buf[self.pos + 1]]);
            let length =
                u16::from_be_bytes([self.buf[self.pos + 2], self.buf[self.pos + 3]]) as usize;

            // A zero length terminates the containing scope.
            if length == 0 {
                self.pos = self.buf.len();
                return None;
            }
            if length < 4 || self.pos + length > self.buf.len() {
                if !self.try_resync() {
                    return None;
                }
                continue;
            }

            let data = &self.buf[self.pos..self.pos + length];
            self.pos += length;
            return Some(Param::Tlv {
                param_type: raw_type & TLV_TYPE_MASK,
                data,
            });
        }
    }
}

/// Append a TLV parameter, writing the value via `body` and patching the
/// length field afterwards.
///
/// # Example
/// ```
/// use bytes::{BufMut, BytesMut};
/// use taglink_protocol::params::put_tlv;
///
/// let mut buf = BytesMut::new();
/// put_tlv(&mut buf, 238, |b| b.put_u16(0x0000));
/// assert_eq!(&buf[..], &[0x00, 0xEE, 0x00, 0x06, 0x00, 0x00]);
/// ```
pub fn put_tlv<F>(dst: &mut BytesMut, param_type: u16, body: F)
where
    F: FnOnce(&mut BytesMut),
{
    dst.put_u16(param_type & TLV_TYPE_MASK);
    let len_at = dst.len();
    dst.put_u16(0);
    let body_start = dst.len();
    body(dst);

    let total = (dst.len() - body_start + 4) as u16;
    dst[len_at..len_at + 2].copy_from_slice(&total.to_be_bytes());
}

/// Append a TV parameter with its fixed-size value.
pub fn put_tv(dst: &mut BytesMut, tv_type: u8, value: &[u8]) {
    debug_assert_eq!(tv_value_len(tv_type & TV_TYPE_MASK), Some(value.len()));
    dst.put_u8(TV_FLAG | tv_type);
    dst.put_slice(value);
}
