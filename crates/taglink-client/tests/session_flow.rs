//! End-to-end session tests against a scripted in-process reader.
//!
//! These run the full client task over real TCP: startup chain, tag
//! streaming, keepalive, buffered-report suppression, rejected ROSpecs
//! with reconnect, reconfiguration and graceful shutdown.

mod common;

use std::collections::{BTreeMap, BTreeSet};
use std::net::SocketAddr;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::time::timeout;

use common::ReaderBehavior;
use taglink_client::{ReaderClient, ReaderConfig};
use taglink_core::constants::*;
use taglink_core::ReaderEvent;
use taglink_protocol::{Param, ParamIter, Resync};

fn config_for(addr: SocketAddr) -> ReaderConfig {
    let mut config = ReaderConfig::new(addr.ip().to_string());
    config.port = addr.port();
    config.reconnect_interval = Duration::from_millis(50);
    config
}

async fn next_event(events: &mut mpsc::Receiver<ReaderEvent>) -> ReaderEvent {
    timeout(Duration::from_secs(5), events.recv())
        .await
        .expect("timed out waiting for event")
        .expect("event channel closed")
}

/// Wait for a specific inbound message type at the mock reader.
async fn next_inbound_of_type(
    inbound: &mut mpsc::UnboundedReceiver<taglink_protocol::LlrpMessage>,
    message_type: u16,
) -> taglink_protocol::LlrpMessage {
    timeout(Duration::from_secs(5), async {
        loop {
            let message = inbound.recv().await.expect("inbound channel closed");
            if message.message_type == message_type {
                return message;
            }
        }
    })
    .await
    .expect("timed out waiting for inbound message")
}

#[tokio::test]
async fn test_minimum_connect_path_streams_tags() {
    let behavior = ReaderBehavior {
        reports_after_start: vec![common::tag_report_payload(&common::EPC, Some(3), -40)],
        ..Default::default()
    };
    let addr = common::spawn_reader(vec![behavior]).await;

    let (handle, mut events) = ReaderClient::connect(config_for(addr)).unwrap();

    assert!(matches!(next_event(&mut events).await, ReaderEvent::Connected));
    assert!(matches!(next_event(&mut events).await, ReaderEvent::Ready));

    match next_event(&mut events).await {
        ReaderEvent::Tag(observation) => {
            assert_eq!(observation.epc_hex(), "300A00010203040506070809");
            assert_eq!(observation.antenna, Some(3));
            assert_eq!(observation.rssi, Some(-40));
        }
        other => panic!("expected Tag, got {other:?}"),
    }

    handle.disconnect().await;
    assert!(matches!(
        next_event(&mut events).await,
        ReaderEvent::Disconnected
    ));
}

#[tokio::test]
async fn test_permissive_reader_without_tables_still_starts() {
    let behavior = ReaderBehavior {
        powers: Vec::new(),
        hops: Vec::new(),
        reports_after_start: vec![common::tag_report_payload(&common::EPC, Some(1), -52)],
        ..Default::default()
    };
    let addr = common::spawn_reader(vec![behavior]).await;

    let (handle, mut events) = ReaderClient::connect(config_for(addr)).unwrap();

    assert!(matches!(next_event(&mut events).await, ReaderEvent::Connected));
    assert!(matches!(next_event(&mut events).await, ReaderEvent::Ready));
    assert!(matches!(next_event(&mut events).await, ReaderEvent::Tag(_)));

    handle.disconnect().await;
}

#[tokio::test]
async fn test_rejected_add_emits_error_then_reconnects() {
    let rejecting = ReaderBehavior {
        add_status: (100, "Bad ROSpec"),
        ..Default::default()
    };
    let healthy = ReaderBehavior::default();
    let addr = common::spawn_reader(vec![rejecting, healthy]).await;

    let (handle, mut events) = ReaderClient::connect(config_for(addr)).unwrap();

    // First session: connect, then the rejected ADD tears it down.
    assert!(matches!(next_event(&mut events).await, ReaderEvent::Connected));
    assert!(matches!(
        next_event(&mut events).await,
        ReaderEvent::Disconnected
    ));
    match next_event(&mut events).await {
        ReaderEvent::Error { kind, detail } => {
            assert_eq!(kind, "llrp_status");
            assert!(detail.contains("100"));
            assert!(detail.contains("Bad ROSpec"));
        }
        other => panic!("expected Error, got {other:?}"),
    }

    // Second session after backoff reaches Ready.
    assert!(matches!(next_event(&mut events).await, ReaderEvent::Connected));
    assert!(matches!(next_event(&mut events).await, ReaderEvent::Ready));

    handle.disconnect().await;
}

#[tokio::test]
async fn test_failure_without_reconnect_ends_task() {
    let rejecting = ReaderBehavior {
        add_status: (100, "Bad ROSpec"),
        ..Default::default()
    };
    let addr = common::spawn_reader(vec![rejecting]).await;

    let mut config = config_for(addr);
    config.enable_reconnect = false;
    let (_handle, mut events) = ReaderClient::connect(config).unwrap();

    assert!(matches!(next_event(&mut events).await, ReaderEvent::Connected));
    assert!(matches!(
        next_event(&mut events).await,
        ReaderEvent::Disconnected
    ));
    assert!(matches!(
        next_event(&mut events).await,
        ReaderEvent::Error { kind: "llrp_status", .. }
    ));

    // Task ends; the event channel closes instead of reconnecting.
    let closed = timeout(Duration::from_secs(5), events.recv()).await.unwrap();
    assert!(closed.is_none());
}

#[tokio::test]
async fn test_stale_reports_suppressed_until_ready() {
    let behavior = ReaderBehavior {
        stale_report: true,
        reports_after_start: vec![common::tag_report_payload(&common::EPC, Some(1), -45)],
        ..Default::default()
    };
    let addr = common::spawn_reader(vec![behavior]).await;

    let (handle, mut events) = ReaderClient::connect(config_for(addr)).unwrap();

    // Nothing between Connected and Ready may be a Tag: the stale report
    // from the previous session must be dropped, not attributed.
    assert!(matches!(next_event(&mut events).await, ReaderEvent::Connected));
    assert!(matches!(next_event(&mut events).await, ReaderEvent::Ready));

    match next_event(&mut events).await {
        ReaderEvent::Tag(observation) => {
            assert_eq!(&observation.epc[..], &common::EPC);
        }
        other => panic!("expected the post-start tag only, got {other:?}"),
    }

    handle.disconnect().await;
}

#[tokio::test]
async fn test_keepalive_acknowledged() {
    let (inbound_tx, mut inbound) = mpsc::unbounded_channel();
    let behavior = ReaderBehavior {
        keepalive_after_start: true,
        inbound_tx: Some(inbound_tx),
        ..Default::default()
    };
    let addr = common::spawn_reader(vec![behavior]).await;

    let (handle, mut events) = ReaderClient::connect(config_for(addr)).unwrap();

    assert!(matches!(next_event(&mut events).await, ReaderEvent::Connected));
    assert!(matches!(next_event(&mut events).await, ReaderEvent::Ready));

    let ack = next_inbound_of_type(&mut inbound, MSG_KEEPALIVE_ACK).await;
    assert!(ack.payload.is_empty());
    assert!(ack.message_id > 0);

    handle.disconnect().await;
}

#[tokio::test]
async fn test_disconnect_sends_close_connection() {
    let (inbound_tx, mut inbound) = mpsc::unbounded_channel();
    let behavior = ReaderBehavior {
        inbound_tx: Some(inbound_tx),
        ..Default::default()
    };
    let addr = common::spawn_reader(vec![behavior]).await;

    let (handle, mut events) = ReaderClient::connect(config_for(addr)).unwrap();
    assert!(matches!(next_event(&mut events).await, ReaderEvent::Connected));
    assert!(matches!(next_event(&mut events).await, ReaderEvent::Ready));

    handle.disconnect().await;

    let close = next_inbound_of_type(&mut inbound, MSG_CLOSE_CONNECTION).await;
    assert!(close.payload.is_empty());
    assert!(matches!(
        next_event(&mut events).await,
        ReaderEvent::Disconnected
    ));
}

#[tokio::test]
async fn test_reconfigure_restarts_with_new_plan() {
    let first = ReaderBehavior::default();
    let (inbound_tx, mut inbound) = mpsc::unbounded_channel();
    let second = ReaderBehavior {
        inbound_tx: Some(inbound_tx),
        ..Default::default()
    };
    let addr = common::spawn_reader(vec![first, second]).await;

    let (handle, mut events) = ReaderClient::connect(config_for(addr)).unwrap();
    assert!(matches!(next_event(&mut events).await, ReaderEvent::Connected));
    assert!(matches!(next_event(&mut events).await, ReaderEvent::Ready));

    handle
        .reconfigure(
            BTreeSet::from([2]),
            BTreeMap::from([(2, 10.0)]),
        )
        .await
        .unwrap();

    // The session restarts and comes back Ready on the new plan.
    assert!(matches!(
        next_event(&mut events).await,
        ReaderEvent::Disconnected
    ));
    assert!(matches!(next_event(&mut events).await, ReaderEvent::Connected));
    assert!(matches!(next_event(&mut events).await, ReaderEvent::Ready));

    // The second connection's ROSpec targets antenna 2 with the power
    // index for 10 dBm (table index 1).
    let add = next_inbound_of_type(&mut inbound, MSG_ADD_ROSPEC).await;
    let rospec = ParamIter::new(&add.payload, Resync::Strict)
        .find_map(|param| match param {
            Param::Tlv { param_type, data } if param_type == PARAM_RO_SPEC => Some(data.to_vec()),
            _ => None,
        })
        .expect("ADD_ROSPEC must carry a ROSpec");
    let aispec = ParamIter::new(&rospec[10..], Resync::Strict)
        .find_map(|param| match param {
            Param::Tlv { param_type, data } if param_type == PARAM_AI_SPEC => Some(data.to_vec()),
            _ => None,
        })
        .expect("ROSpec must carry an AISpec");
    assert_eq!(&aispec[4..6], &[0, 1]); // one antenna
    assert_eq!(&aispec[6..8], &[0, 2]); // antenna 2

    handle.disconnect().await;
}

#[tokio::test]
async fn test_connection_refused_surfaces_socket_error() {
    // Bind and immediately drop to get a port with nothing listening.
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let mut config = config_for(addr);
    config.enable_reconnect = false;
    let (_handle, mut events) = ReaderClient::connect(config).unwrap();

    assert!(matches!(
        next_event(&mut events).await,
        ReaderEvent::Disconnected
    ));
    assert!(matches!(
        next_event(&mut events).await,
        ReaderEvent::Error { kind: "socket", .. }
    ));
}

#[tokio::test]
async fn test_invalid_config_rejected_up_front() {
    let config = ReaderConfig::new("reader").with_antennas(std::iter::empty());
    assert!(ReaderClient::connect(config).is_err());
}
