//! Common test utilities for protocol integration tests.
//!
//! Builders for reader-side payloads (capabilities responses, tag reports)
//! so tests can fabricate exactly the byte sequences an FX9600 would emit.

// Not every test binary uses every helper.
#![allow(dead_code)]

use bytes::{BufMut, BytesMut};
use taglink_core::constants::*;
use taglink_protocol::params::{put_tlv, put_tv};

/// Build a GET_READER_CAPABILITIES_RESPONSE payload.
///
/// `powers` are (index, hundredths-of-dBm) pairs; `hops` are hop-table IDs.
/// A zero status parameter leads the payload, as the FX9600 always sends
/// one.
pub fn capabilities_payload(powers: &[(u16, i16)], hops: &[u16]) -> BytesMut {
    let mut buf = BytesMut::new();
    put_tlv(&mut buf, PARAM_LLRP_STATUS, |b| {
        b.put_u16(0);
        b.put_u16(0);
    });
    put_tlv(&mut buf, PARAM_REGULATORY_CAPABILITIES, |b| {
        b.put_u16(840); // country code
        b.put_u16(1); // communications standard
        put_tlv(b, PARAM_UHF_BAND_CAPABILITIES, |b| {
            for &(index, raw) in powers {
                put_tlv(b, PARAM_TRANSMIT_POWER_LEVEL_ENTRY, |b| {
                    b.put_u16(index);
                    b.put_i16(raw);
                });
            }
            for &id in hops {
                put_tlv(b, PARAM_FREQUENCY_HOP_TABLE, |b| {
                    b.put_u16(id);
                    b.put_u16(0);
                });
            }
        });
    });
    buf
}

/// Build an RO_ACCESS_REPORT payload holding one EPC-96 record.
pub fn single_tag_report(epc: &[u8; 12], antenna: u16, rssi: i8) -> BytesMut {
    let mut buf = BytesMut::new();
    put_tlv(&mut buf, PARAM_TAG_REPORT_DATA, |b| {
        put_tv(b, TV_EPC_96, epc);
        put_tv(b, TV_ANTENNA_ID, &antenna.to_be_bytes());
        put_tv(b, TV_PEAK_RSSI, &[rssi as u8]);
    });
    buf
}
