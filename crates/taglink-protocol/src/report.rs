//! Tag report decoding.
//!
//! An RO_ACCESS_REPORT carries a sequence of TagReportData parameters, one
//! per tag sighting. Inside each record the FX9600 mixes TV parameters
//! (antenna, RSSI, timestamps, EPC-96) with the occasional TLV (EPCData for
//! non-96-bit tags), and may append vendor TV parameters this client cannot
//! size. Those are skipped via bounded resynchronisation rather than
//! aborting the record.

use bytes::Bytes;
use tracing::debug;

use crate::params::{Param, ParamIter, Resync};
use taglink_core::{constants::*, TagObservation};

/// Decode the payload of an RO_ACCESS_REPORT into tag observations.
///
/// `sole_antenna` is the antenna ID to synthesise onto records that omit
/// the AntennaID parameter; pass it only when exactly one antenna is
/// configured. Records without an EPC are logged and dropped; a record
/// the reader could not fill in is diagnostic noise, not an observation.
#[must_use]
pub fn parse_report(payload: &[u8], sole_antenna: Option<u16>) -> Vec<TagObservation> {
    let mut observations = Vec::new();

    for param in ParamIter::new(payload, Resync::Strict) {
        let Param::Tlv {
            param_type: PARAM_TAG_REPORT_DATA,
            data,
        } = param
        else {
            continue;
        };

        match decode_tag_report(&data[4..], sole_antenna) {
            Some(observation) => observations.push(observation),
            None => debug!(raw = ?data, "dropping tag report record without EPC"),
        }
    }

    observations
}

/// Decode one TagReportData body.
fn decode_tag_report(body: &[u8], sole_antenna: Option<u16>) -> Option<TagObservation> {
    let mut epc: Option<Bytes> = None;
    let mut antenna = None;
    let mut rssi = None;
    let mut seen_count = None;
    let mut last_seen_utc_micros = None;

    for param in ParamIter::new(body, Resync::TagReport) {
        match param {
            Param::Tv {
                tv_type: TV_ANTENNA_ID,
                value,
            } => antenna = Some(u16::from_be_bytes([value[0], value[1]])),
            Param::Tv {
                tv_type: TV_PEAK_RSSI,
                value,
            } => rssi = Some(value[0] as i8),
            Param::Tv {
                tv_type: TV_LAST_SEEN_UTC,
                value,
            } => {
                let mut raw = [0u8; 8];
                raw.copy_from_slice(value);
                last_seen_utc_micros = Some(u64::from_be_bytes(raw));
            }
            Param::Tv {
                tv_type: TV_TAG_SEEN_COUNT,
                value,
            } => seen_count = Some(u16::from_be_bytes([value[0], value[1]])),
            Param::Tv {
                tv_type: TV_EPC_96,
                value,
            } => epc = Some(Bytes::copy_from_slice(value)),
            Param::Tlv {
                param_type: PARAM_EPC_DATA,
                data,
            } => {
                if let Some(decoded) = decode_epc_data(data) {
                    epc = Some(decoded);
                }
            }
            // Other parameters (ROSpecID, SpecIndex, channel, first-seen,
            // unknown TLVs) are tolerated and ignored.
            _ => {}
        }
    }

    let epc = epc?;
    let mut observation = TagObservation::new(epc).ok()?;
    observation.antenna = antenna.or(sole_antenna);
    observation.rssi = rssi;
    observation.seen_count = seen_count;
    observation.last_seen_utc_micros = last_seen_utc_micros;
    Some(observation)
}

/// Extract the EPC from an EPCData parameter (full TLV bytes).
///
/// The value opens with the EPC bit length; the EPC occupies the next
/// `ceil(bits / 8)` bytes. Rounding up preserves the final partial byte of
/// non-byte-aligned EPCs.
fn decode_epc_data(data: &[u8]) -> Option<Bytes> {
    if data.len() < 6 {
        return None;
    }
    let bit_len = u16::from_be_bytes([data[4], data[5]]) as usize;
    let byte_len = bit_len.div_ceil(8);
    let end = 6 + byte_len;
    if byte_len == 0 || end > data.len() {
        return None;
    }
    Some(Bytes::copy_from_slice(&data[6..end]))
}
