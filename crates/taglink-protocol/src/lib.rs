//! LLRP wire protocol for the taglink client.
//!
//! This crate implements the protocol surface needed to drive a UHF RFID
//! reader: message framing, the mixed TLV/TV parameter encoding,
//! capabilities discovery, ROSpec construction and tag-report decoding.
//!
//! ```text
//! TCP bytes -> LlrpCodec -> LlrpMessage -> ParamIter -> capabilities / report
//! RoSpecBuilder -> params -> LlrpMessage -> LlrpCodec -> TCP bytes
//! ```
//!
//! Everything here is pure over byte slices; connection state and the
//! startup sequence live in `taglink-client`.

pub mod capabilities;
pub mod codec;
pub mod frame;
pub mod params;
pub mod report;
pub mod rospec;
pub mod status;

pub use capabilities::parse_capabilities;
pub use codec::LlrpCodec;
pub use frame::LlrpMessage;
pub use params::{tv_value_len, Param, ParamIter, Resync};
pub use report::parse_report;
pub use rospec::{rospec_id_payload, RoSpecBuilder};
pub use status::{check_status, LlrpStatus};
