//! LLRPStatus decoding.
//!
//! Most reader responses carry an LLRPStatus parameter (TLV 287). A status
//! code of zero means success; anything else aborts the startup chain. The
//! status may be followed by FieldError (288) and ParameterError (289)
//! parameters that pinpoint what the reader objected to; those are decoded
//! verbatim for the diagnostic channel.

use crate::params::{Param, ParamIter, Resync};
use taglink_core::{constants::*, Error, Result};

/// Status code zero: success.
pub const STATUS_SUCCESS: u16 = 0;

/// Decoded LLRPStatus parameter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LlrpStatus {
    /// Status code; zero is success.
    pub code: u16,

    /// UTF-8 error description supplied by the reader (may be empty).
    pub description: String,

    /// (field number, error code) pairs from FieldError parameters.
    pub field_errors: Vec<(u16, u16)>,

    /// (parameter type, error code) pairs from ParameterError parameters.
    pub parameter_errors: Vec<(u16, u16)>,
}

impl LlrpStatus {
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.code == STATUS_SUCCESS
    }

    /// Decode an LLRPStatus from its full TLV bytes (header included).
    ///
    /// Layout after the 4-byte header: status code u16, description byte
    /// count u16, UTF-8 description, then optional FieldError and
    /// ParameterError TLVs. Truncated descriptions are clamped rather than
    /// rejected; a present status is always better surfaced than dropped.
    #[must_use]
    pub fn decode(data: &[u8]) -> Self {
        let mut status = LlrpStatus::default();
        let body = match data.get(4..) {
            Some(body) if body.len() >= 4 => body,
            _ => return status,
        };

        status.code = u16::from_be_bytes([body[0], body[1]]);
        let desc_len = u16::from_be_bytes([body[2], body[3]]) as usize;
        let desc_end = (4 + desc_len).min(body.len());
        status.description = String::from_utf8_lossy(&body[4..desc_end]).into_owned();

        for param in ParamIter::new(&body[desc_end..], Resync::Strict) {
            if let Param::Tlv { param_type, data } = param {
                // Both error parameters start with two u16 fields.
                if data.len() < 8 {
                    continue;
                }
                let first = u16::from_be_bytes([data[4], data[5]]);
                let second = u16::from_be_bytes([data[6], data[7]]);
                match param_type {
                    PARAM_FIELD_ERROR => status.field_errors.push((first, second)),
                    PARAM_PARAMETER_ERROR => status.parameter_errors.push((first, second)),
                    _ => {}
                }
            }
        }

        status
    }

    /// Find the first LLRPStatus among the top-level parameters of a
    /// message payload.
    #[must_use]
    pub fn find_in(payload: &[u8]) -> Option<Self> {
        ParamIter::new(payload, Resync::Strict).find_map(|param| match param {
            Param::Tlv {
                param_type: PARAM_LLRP_STATUS,
                data,
            } => Some(Self::decode(data)),
            _ => None,
        })
    }

    /// Convert a failed status into the session-fatal error.
    ///
    /// # Errors
    /// Returns `Error::LlrpStatus` when the code is non-zero.
    pub fn into_result(self) -> Result<()> {
        if self.is_success() {
            Ok(())
        } else {
            Err(Error::LlrpStatus {
                code: self.code,
                description: self.description,
            })
        }
    }
}

/// Check the LLRPStatus of a response payload, treating an absent status
/// as success.
///
/// # Errors
/// Returns `Error::LlrpStatus` if a status parameter is present with a
/// non-zero code.
pub fn check_status(payload: &[u8]) -> Result<()> {
    match LlrpStatus::find_in(payload) {
        Some(status) => status.into_result(),
        None => Ok(()),
    }
}
