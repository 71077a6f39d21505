//! Capabilities parsing.
//!
//! The reader's transmit-power table and frequency hop tables are only
//! discoverable at runtime, inside a GET_READER_CAPABILITIES_RESPONSE, and
//! both must be threaded into the ROSpec built later in the startup chain.
//! The walk is:
//!
//! ```text
//! payload
//! ├── LLRPStatus (287, optional; non-zero code fails the parse)
//! └── RegulatoryCapabilities (143)
//!     └── UHFBandCapabilities (144)
//!         ├── TransmitPowerLevelTableEntry (145) *
//!         └── FrequencyHopTable (147) *
//! ```

use tracing::warn;

use crate::params::{Param, ParamIter, Resync};
use crate::status::LlrpStatus;
use taglink_core::{constants::*, PowerTable, PowerTableEntry, ReaderCapabilities, Result};

/// Parse the body of a GET_READER_CAPABILITIES_RESPONSE (everything after
/// the 10-byte frame header).
///
/// An empty power table or hop-table set is not an error here: permissive
/// hardware may advertise neither, and the session falls back (rounded
/// power index, hop-table ID 1).
///
/// # Errors
/// Returns `Error::LlrpStatus` if a leading status parameter carries a
/// non-zero code.
pub fn parse_capabilities(payload: &[u8]) -> Result<ReaderCapabilities> {
    let mut caps = ReaderCapabilities::default();
    let mut entries = Vec::new();

    let mut offset = 0;
    if let Some(first) = ParamIter::new(payload, Resync::Strict).next() {
        if let Param::Tlv {
            param_type: PARAM_LLRP_STATUS,
            data,
        } = first
        {
            LlrpStatus::decode(data).into_result()?;
            offset = data.len();
        }
    }

    for param in ParamIter::new(&payload[offset..], Resync::Strict) {
        if let Param::Tlv {
            param_type: PARAM_REGULATORY_CAPABILITIES,
            data,
        } = param
        {
            parse_regulatory(data, &mut entries, &mut caps);
        }
    }

    caps.power_table = PowerTable::from_entries(entries);
    Ok(caps)
}

/// Walk a RegulatoryCapabilities parameter.
///
/// The body opens with CountryCode (u16) and CommunicationsStandard (u16)
/// before the nested parameters, so the inner walk starts 8 bytes in.
fn parse_regulatory(data: &[u8], entries: &mut Vec<PowerTableEntry>, caps: &mut ReaderCapabilities) {
    let Some(inner) = data.get(8..) else {
        warn!(len = data.len(), "RegulatoryCapabilities too short, skipping");
        return;
    };

    for param in ParamIter::new(inner, Resync::Strict) {
        if let Param::Tlv {
            param_type: PARAM_UHF_BAND_CAPABILITIES,
            data,
        } = param
        {
            parse_uhf_band(data, entries, caps);
        }
    }
}

/// Collect power entries and hop-table IDs from a UHFBandCapabilities.
fn parse_uhf_band(data: &[u8], entries: &mut Vec<PowerTableEntry>, caps: &mut ReaderCapabilities) {
    let Some(inner) = data.get(4..) else {
        return;
    };

    for param in ParamIter::new(inner, Resync::Strict) {
        match param {
            Param::Tlv {
                param_type: PARAM_TRANSMIT_POWER_LEVEL_ENTRY,
                data,
            } if data.len() >= 8 => {
                let index = u16::from_be_bytes([data[4], data[5]]);
                let raw = i16::from_be_bytes([data[6], data[7]]);
                entries.push(PowerTableEntry {
                    index,
                    power_dbm: f32::from(raw) / 100.0,
                });
            }
            Param::Tlv {
                param_type: PARAM_FREQUENCY_HOP_TABLE,
                data,
            } if data.len() >= 6 => {
                caps.record_hop_table(u16::from_be_bytes([data[4], data[5]]));
            }
            _ => {}
        }
    }
}
