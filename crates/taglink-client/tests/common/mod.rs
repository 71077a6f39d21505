//! Common test utilities: a scripted in-process reader.
//!
//! `spawn_reader` binds a listener and serves one connection per
//! [`ReaderBehavior`], replying to the client's startup chain the way an
//! FX9600 would. Behaviors can inject a rejected ADD, a stale tag report
//! flushed before the session starts, keepalives, and can forward every
//! inbound message to the test for assertions.

use std::net::SocketAddr;

use bytes::{BufMut, Bytes, BytesMut};
use futures::{SinkExt, StreamExt};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_util::codec::Framed;

use taglink_core::constants::*;
use taglink_protocol::params::{put_tlv, put_tv};
use taglink_protocol::{LlrpCodec, LlrpMessage};

/// The EPC used for fresh (current-session) tag reports.
pub const EPC: [u8; 12] = [
    0x30, 0x0A, 0x00, 0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08, 0x09,
];

/// The EPC used for stale (previous-session) tag reports.
pub const STALE_EPC: [u8; 12] = [0x99; 12];

pub fn status_payload(code: u16, description: &str) -> Bytes {
    let mut buf = BytesMut::new();
    put_tlv(&mut buf, PARAM_LLRP_STATUS, |b| {
        b.put_u16(code);
        b.put_u16(description.len() as u16);
        b.put_slice(description.as_bytes());
    });
    buf.freeze()
}

pub fn capabilities_payload(powers: &[(u16, i16)], hops: &[u16]) -> Bytes {
    let mut buf = BytesMut::new();
    put_tlv(&mut buf, PARAM_LLRP_STATUS, |b| {
        b.put_u16(0);
        b.put_u16(0);
    });
    put_tlv(&mut buf, PARAM_REGULATORY_CAPABILITIES, |b| {
        b.put_u16(840);
        b.put_u16(1);
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
    buf.freeze()
}

pub fn tag_report_payload(epc: &[u8; 12], antenna: Option<u16>, rssi: i8) -> Bytes {
    let mut buf = BytesMut::new();
    put_tlv(&mut buf, PARAM_TAG_REPORT_DATA, |b| {
        put_tv(b, TV_EPC_96, epc);
        if let Some(antenna) = antenna {
            put_tv(b, TV_ANTENNA_ID, &antenna.to_be_bytes());
        }
        put_tv(b, TV_PEAK_RSSI, &[rssi as u8]);
    });
    buf.freeze()
}

/// Script for one served connection.
pub struct ReaderBehavior {
    pub powers: Vec<(u16, i16)>,
    pub hops: Vec<u16>,

    /// Status returned for ADD_ROSPEC (code, description).
    pub add_status: (u16, &'static str),

    /// Flush a report from a "previous session" immediately on accept,
    /// before the startup chain completes.
    pub stale_report: bool,

    /// Send a KEEPALIVE after acknowledging START_ROSPEC.
    pub keepalive_after_start: bool,

    /// Report payloads to send after acknowledging START_ROSPEC.
    pub reports_after_start: Vec<Bytes>,

    /// Forward every inbound client message to the test.
    pub inbound_tx: Option<mpsc::UnboundedSender<LlrpMessage>>,
}

impl Default for ReaderBehavior {
    fn default() -> Self {
        ReaderBehavior {
            powers: vec![(1, 1000), (200, 3000)],
            hops: vec![1],
            add_status: (0, ""),
            stale_report: false,
            keepalive_after_start: false,
            reports_after_start: Vec::new(),
            inbound_tx: None,
        }
    }
}

/// Bind a scripted reader and serve the behaviors, one connection each.
/// Returns the address to point the client at.
pub async fn spawn_reader(behaviors: Vec<ReaderBehavior>) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        for behavior in behaviors {
            serve_one(&listener, behavior).await;
        }
    });

    addr
}

async fn serve_one(listener: &TcpListener, behavior: ReaderBehavior) {
    let Ok((stream, _)) = listener.accept().await else {
        return;
    };
    let mut framed = Framed::new(stream, LlrpCodec::new());
    let mut reader_id = 1000u32;

    if behavior.stale_report {
        reader_id += 1;
        let stale = LlrpMessage::new(
            MSG_RO_ACCESS_REPORT,
            reader_id,
            tag_report_payload(&STALE_EPC, Some(9), -60),
        );
        if framed.send(stale).await.is_err() {
            return;
        }
    }

    while let Some(Ok(message)) = framed.next().await {
        if let Some(tx) = &behavior.inbound_tx {
            let _ = tx.send(message.clone());
        }

        let reply = match message.message_type {
            MSG_GET_READER_CAPABILITIES => Some((
                MSG_GET_READER_CAPABILITIES_RESPONSE,
                capabilities_payload(&behavior.powers, &behavior.hops),
            )),
            MSG_DELETE_ROSPEC => Some((MSG_DELETE_ROSPEC_RESPONSE, status_payload(0, ""))),
            MSG_ADD_ROSPEC => Some((
                MSG_ADD_ROSPEC_RESPONSE,
                status_payload(behavior.add_status.0, behavior.add_status.1),
            )),
            MSG_ENABLE_ROSPEC => Some((MSG_ENABLE_ROSPEC_RESPONSE, status_payload(0, ""))),
            MSG_START_ROSPEC => Some((MSG_START_ROSPEC_RESPONSE, status_payload(0, ""))),
            MSG_CLOSE_CONNECTION => break,
            _ => None,
        };

        let Some((reply_type, payload)) = reply else {
            continue;
        };
        reader_id += 1;
        if framed
            .send(LlrpMessage::new(reply_type, reader_id, payload))
            .await
            .is_err()
        {
            return;
        }

        if reply_type == MSG_START_ROSPEC_RESPONSE {
            for report in &behavior.reports_after_start {
                reader_id += 1;
                let msg = LlrpMessage::new(MSG_RO_ACCESS_REPORT, reader_id, report.clone());
                if framed.send(msg).await.is_err() {
                    return;
                }
            }
            if behavior.keepalive_after_start {
                reader_id += 1;
                let keepalive = LlrpMessage::header_only(MSG_KEEPALIVE, reader_id);
                if framed.send(keepalive).await.is_err() {
                    return;
                }
            }
        }
    }
}
