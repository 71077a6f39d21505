//! Session state machine.
//!
//! The startup sequence against an FX9600 is a strict chain:
//!
//! ```text
//! Connecting ──caps──> AwaitingCapabilities ──delete ack──> AwaitingDeleteAck
//!   ──add ack──> AwaitingAddAck ──enable ack──> AwaitingEnableAck
//!   ──start ack──> AwaitingStartAck ──first report──> Running
//! ```
//!
//! Every transition is a pure function of `(state, inbound message)`; the
//! side effects (messages to send, events for the consumer) come back as
//! [`Intent`]s that the I/O driver applies. Keeping the machine free of
//! I/O makes the ordering invariants testable without sockets, most
//! importantly the buffered-tag guard: the reader may flush reports queued
//! by a PREVIOUS session before it has even acknowledged this session's
//! START_ROSPEC, and those must never be attributed to the current
//! configuration.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::time::Instant;

use bytes::Bytes;
use tracing::{debug, info, trace, warn};

use taglink_core::{constants::*, Error, ReaderCapabilities, ReaderEvent, Result};
use taglink_protocol::{
    parse_capabilities, parse_report, rospec_id_payload, LlrpMessage, LlrpStatus, RoSpecBuilder,
};

use crate::config::ReaderConfig;

/// Session lifecycle states.
///
/// A state is named for the acknowledgement most recently consumed; the
/// on-entry action of each state issues the next request in the chain.
#[derive(Debug, Clone)]
pub enum SessionState {
    /// No TCP connection.
    Disconnected,

    /// TCP connected; events enabled and capabilities requested.
    Connecting,

    /// Capabilities parsed; DELETE_ROSPEC(0) in flight.
    AwaitingCapabilities { sent_at: Instant },

    /// Delete acknowledged; ADD_ROSPEC in flight.
    AwaitingDeleteAck,

    /// Add acknowledged; ENABLE_ROSPEC in flight.
    AwaitingAddAck,

    /// Enable acknowledged; START_ROSPEC in flight.
    AwaitingEnableAck,

    /// Start acknowledged; waiting for the first report of this session.
    AwaitingStartAck,

    /// Streaming tag reports.
    Running,

    /// CLOSE_CONNECTION sent; socket teardown pending.
    ShuttingDown,
}

impl SessionState {
    /// Stable state name for diagnostics and error detail.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            SessionState::Disconnected => "Disconnected",
            SessionState::Connecting => "Connecting",
            SessionState::AwaitingCapabilities { .. } => "AwaitingCapabilities",
            SessionState::AwaitingDeleteAck => "AwaitingDeleteAck",
            SessionState::AwaitingAddAck => "AwaitingAddAck",
            SessionState::AwaitingEnableAck => "AwaitingEnableAck",
            SessionState::AwaitingStartAck => "AwaitingStartAck",
            SessionState::Running => "Running",
            SessionState::ShuttingDown => "ShuttingDown",
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// A side effect requested by the state machine, applied by the driver.
#[derive(Debug)]
pub enum Intent {
    /// Write a message to the reader.
    Send(LlrpMessage),

    /// Deliver an event to the consumer channel.
    Emit(ReaderEvent),
}

/// The per-connection protocol engine.
///
/// Owns the configuration, the monotonic message-ID counter, and the
/// tables discovered from capabilities. All of the discovered state is
/// cleared by [`Session::reset`] ahead of a reconnect.
pub struct Session {
    config: ReaderConfig,
    state: SessionState,
    next_message_id: u32,
    capabilities: Option<ReaderCapabilities>,
    antenna_power_index: BTreeMap<u16, u16>,
    rospec_started: bool,
}

impl Session {
    pub fn new(config: ReaderConfig) -> Self {
        Session {
            config,
            state: SessionState::Disconnected,
            next_message_id: 1,
            capabilities: None,
            antenna_power_index: BTreeMap::new(),
            rospec_started: false,
        }
    }

    pub fn config(&self) -> &ReaderConfig {
        &self.config
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// True once this session's ROSpec start has been acknowledged.
    pub fn rospec_started(&self) -> bool {
        self.rospec_started
    }

    /// Capabilities discovered on this connection, if parsed yet.
    pub fn capabilities(&self) -> Option<&ReaderCapabilities> {
        self.capabilities.as_ref()
    }

    /// Resolved antenna -> transmit-power-index mapping.
    pub fn antenna_power_index(&self) -> &BTreeMap<u16, u16> {
        &self.antenna_power_index
    }

    /// Allocate the next outbound message ID. Wraps at 2^32; nothing
    /// correlates on IDs so wraparound is harmless.
    fn alloc_message_id(&mut self) -> u32 {
        let id = self.next_message_id;
        self.next_message_id = self.next_message_id.wrapping_add(1);
        id
    }

    fn outbound(&mut self, message_type: u16, payload: impl Into<Bytes>) -> LlrpMessage {
        LlrpMessage::new(message_type, self.alloc_message_id(), payload)
    }

    /// The driver established the TCP connection: announce it and enable
    /// event delivery on the reader.
    pub fn on_connected(&mut self) -> Vec<Intent> {
        info!(addr = %self.config.addr(), "connected to reader");
        self.state = SessionState::Connecting;
        let enable = self.outbound(MSG_ENABLE_EVENTS_AND_REPORTS, Bytes::new());
        vec![
            Intent::Emit(ReaderEvent::Connected),
            Intent::Send(enable),
        ]
    }

    /// Request the capability set (sent by the driver after the
    /// post-connect settle delay).
    pub fn request_capabilities(&mut self) -> Vec<Intent> {
        // Payload 0x00: request all capability categories.
        let request = self.outbound(MSG_GET_READER_CAPABILITIES, Bytes::from_static(&[0x00]));
        vec![Intent::Send(request)]
    }

    /// Feed one inbound message through the machine.
    ///
    /// # Errors
    /// Any returned error is session-fatal: the driver tears the
    /// connection down and (if enabled) schedules a reconnect.
    pub fn handle_message(&mut self, msg: &LlrpMessage) -> Result<Vec<Intent>> {
        match msg.message_type {
            MSG_KEEPALIVE => {
                trace!(id = msg.message_id, "keepalive");
                let ack = self.outbound(MSG_KEEPALIVE_ACK, Bytes::new());
                Ok(vec![Intent::Send(ack)])
            }

            // Liveness signal only; the capabilities response drives the
            // startup chain, so this must not transition anything no
            // matter when it arrives.
            MSG_READER_EVENT_NOTIFICATION => {
                trace!("reader event notification");
                Ok(vec![])
            }

            MSG_ERROR_MESSAGE => {
                let status = LlrpStatus::find_in(&msg.payload).unwrap_or_default();
                Err(Error::LlrpStatus {
                    code: status.code,
                    description: status.description,
                })
            }

            MSG_RO_ACCESS_REPORT => self.handle_report(msg),

            _ => self.handle_startup_reply(msg),
        }
    }

    fn handle_report(&mut self, msg: &LlrpMessage) -> Result<Vec<Intent>> {
        if !self.rospec_started {
            // Queued reports from a previous session can arrive before or
            // concurrent with this session's START acknowledgement.
            debug!(
                bytes = msg.payload.len(),
                "dropping tag report buffered before ROSpec start"
            );
            return Ok(vec![]);
        }

        if matches!(self.state, SessionState::AwaitingStartAck) {
            self.state = SessionState::Running;
        }

        let observations = parse_report(&msg.payload, self.config.sole_antenna());
        trace!(count = observations.len(), "tag report decoded");
        Ok(observations
            .into_iter()
            .map(|observation| Intent::Emit(ReaderEvent::Tag(observation)))
            .collect())
    }

    fn handle_startup_reply(&mut self, msg: &LlrpMessage) -> Result<Vec<Intent>> {
        match (&self.state, msg.message_type) {
            (SessionState::Connecting, MSG_GET_READER_CAPABILITIES_RESPONSE) => {
                let caps = parse_capabilities(&msg.payload)?;
                if caps.power_table.is_empty() {
                    warn!("reader advertised no transmit-power table; using rounded dBm as index");
                } else {
                    debug!(entries = caps.power_table.len(), "power table parsed");
                }
                if caps.hop_table_ids.is_empty() {
                    warn!("reader advertised no hop tables; falling back to hop table 1");
                }

                self.antenna_power_index = self.compute_power_indices(&caps);
                self.capabilities = Some(caps);
                self.state = SessionState::AwaitingCapabilities {
                    sent_at: Instant::now(),
                };
                let delete = self.outbound(MSG_DELETE_ROSPEC, rospec_id_payload(0));
                Ok(vec![Intent::Send(delete)])
            }

            (SessionState::AwaitingCapabilities { .. }, MSG_DELETE_ROSPEC_RESPONSE) => {
                self.check_response_status(msg)?;
                let rospec = self.build_rospec()?;
                self.state = SessionState::AwaitingDeleteAck;
                let add = self.outbound(MSG_ADD_ROSPEC, rospec);
                Ok(vec![Intent::Send(add)])
            }

            (SessionState::AwaitingDeleteAck, MSG_ADD_ROSPEC_RESPONSE) => {
                self.check_response_status(msg)?;
                self.state = SessionState::AwaitingAddAck;
                let enable = self.outbound(MSG_ENABLE_ROSPEC, rospec_id_payload(ROSPEC_ID));
                Ok(vec![Intent::Send(enable)])
            }

            (SessionState::AwaitingAddAck, MSG_ENABLE_ROSPEC_RESPONSE) => {
                self.check_response_status(msg)?;
                self.state = SessionState::AwaitingEnableAck;
                let start = self.outbound(MSG_START_ROSPEC, rospec_id_payload(ROSPEC_ID));
                Ok(vec![Intent::Send(start)])
            }

            (SessionState::AwaitingEnableAck, MSG_START_ROSPEC_RESPONSE) => {
                self.check_response_status(msg)?;
                self.state = SessionState::AwaitingStartAck;
                self.rospec_started = true;
                info!("ROSpec started; streaming tag reports");
                Ok(vec![Intent::Emit(ReaderEvent::Ready)])
            }

            (state, message_type) => Err(Error::UnexpectedMessage {
                message_type,
                state: state.name().to_string(),
            }),
        }
    }

    /// Check the LLRPStatus of a startup response; field and parameter
    /// errors go to the diagnostic channel verbatim.
    fn check_response_status(&self, msg: &LlrpMessage) -> Result<()> {
        let Some(status) = LlrpStatus::find_in(&msg.payload) else {
            return Ok(());
        };
        for &(field, code) in &status.field_errors {
            warn!(field, code, "reader reported a field error");
        }
        for &(param_type, code) in &status.parameter_errors {
            warn!(param_type, code, "reader reported a parameter error");
        }
        status.into_result()
    }

    /// Resolve each configured antenna's requested dBm against the power
    /// table; with no table, round the dBm and clamp it into index range.
    fn compute_power_indices(&self, caps: &ReaderCapabilities) -> BTreeMap<u16, u16> {
        let mut indices = BTreeMap::new();
        for &antenna in &self.config.antennas {
            let target = self.config.power_for(antenna);
            let index = caps.power_table.closest_index(target).unwrap_or_else(|| {
                (target.round() as i64)
                    .clamp(
                        i64::from(FALLBACK_POWER_INDEX_MIN),
                        i64::from(FALLBACK_POWER_INDEX_MAX),
                    ) as u16
            });
            debug!(antenna, target_dbm = target, index, "transmit power resolved");
            indices.insert(antenna, index);
        }
        indices
    }

    fn build_rospec(&self) -> Result<Bytes> {
        let hop_table_id = self
            .capabilities
            .as_ref()
            .map(ReaderCapabilities::hop_table_id)
            .unwrap_or(FALLBACK_HOP_TABLE_ID);

        let mut builder = RoSpecBuilder::new(hop_table_id);
        for (&antenna, &power_index) in &self.antenna_power_index {
            builder = builder.antenna(antenna, power_index);
        }
        builder.build()
    }

    /// Begin a graceful shutdown: notify the reader, then the driver
    /// destroys the socket after the grace window.
    pub fn begin_shutdown(&mut self) -> Vec<Intent> {
        self.state = SessionState::ShuttingDown;
        let close = self.outbound(MSG_CLOSE_CONNECTION, Bytes::new());
        vec![Intent::Send(close)]
    }

    /// Replace the antenna plan. Takes effect on the next session start.
    pub fn reconfigure(&mut self, antennas: BTreeSet<u16>, power_dbm: BTreeMap<u16, f32>) {
        self.config.antennas = antennas;
        self.config.power_dbm = power_dbm;
    }

    /// Tear down per-connection state ahead of a reconnect: discovered
    /// tables, the start flag, and the message-ID counter all restart.
    pub fn reset(&mut self) {
        self.state = SessionState::Disconnected;
        self.next_message_id = 1;
        self.capabilities = None;
        self.antenna_power_index.clear();
        self.rospec_started = false;
    }
}
