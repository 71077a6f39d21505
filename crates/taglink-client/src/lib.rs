//! Session controller for LLRP readers.
//!
//! This crate owns the connection lifecycle against an FX9600-class
//! reader: it drives the startup chain (capabilities -> delete -> add ->
//! enable -> start), streams tag observations to a consumer channel,
//! acknowledges keepalives, and reconnects with backoff when a session
//! fails.
//!
//! # Components
//!
//! - [`ReaderConfig`]: host, antenna set, per-antenna power, reconnect policy
//! - [`Session`]: the pure protocol state machine (no I/O)
//! - [`ReaderClient`] / [`ReaderHandle`]: the Tokio task that runs it
//!
//! # Example
//!
//! ```no_run
//! use taglink_client::{ReaderClient, ReaderConfig};
//! use taglink_core::ReaderEvent;
//!
//! # async fn example() -> taglink_core::Result<()> {
//! let config = ReaderConfig::new("192.168.0.40").with_antennas([1, 2]);
//! let (handle, mut events) = ReaderClient::connect(config)?;
//!
//! while let Some(event) = events.recv().await {
//!     if let ReaderEvent::Tag(observation) = event {
//!         println!("{} on antenna {:?}", observation.epc_hex(), observation.antenna);
//!     }
//! }
//! # Ok(())
//! # }
//! ```

mod client;
mod config;
mod session;

pub use client::{ReaderClient, ReaderHandle};
pub use config::ReaderConfig;
pub use session::{Intent, Session, SessionState};
