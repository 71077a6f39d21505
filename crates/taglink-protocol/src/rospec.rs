//! ROSpec construction.
//!
//! Builds the single ROSpec this client installs: a null-triggered
//! inventory over the selected antennas, reporting every tag immediately
//! (`UponNTagsOrEndOfROSpec`, N = 1) with the default report fields.
//!
//! Two structural rules are load-bearing on FX9600 firmware and are
//! deliberately NOT configurable:
//!
//! - `AntennaConfiguration` carries only an `RFTransmitter`. Adding a
//!   `C1G2InventoryCommand` makes the reader accept the ROSpec and then
//!   silently stop reporting.
//! - The `TagReportContentSelector` mask stays `0x0000`. Requesting more
//!   fields degrades report delivery on the same firmware.

use bytes::{BufMut, Bytes, BytesMut};
use taglink_core::{constants::*, Error, Result};

use crate::params::put_tlv;

/// Builder for the ROSpec parameter (TLV 177).
///
/// Antennas are added with their transmit power index already resolved
/// against the reader's power table; the builder does not consult
/// capabilities itself.
///
/// # Example
/// ```
/// use taglink_protocol::RoSpecBuilder;
///
/// let rospec = RoSpecBuilder::new(1)
///     .antenna(1, 200)
///     .antenna(2, 200)
///     .build()
///     .unwrap();
/// assert_eq!(&rospec[..2], &[0x00, 177]);
/// ```
#[derive(Debug, Clone)]
pub struct RoSpecBuilder {
    rospec_id: u32,
    hop_table_id: u16,
    antennas: Vec<(u16, u16)>,
}

impl RoSpecBuilder {
    /// Create a builder for ROSpec ID 1 with the given hop-table ID.
    ///
    /// The hop-table ID must come from parsed capabilities; callers fall
    /// back to the literal 1 only when the reader advertised no hop tables.
    pub fn new(hop_table_id: u16) -> Self {
        RoSpecBuilder {
            rospec_id: ROSPEC_ID,
            hop_table_id,
            antennas: Vec::new(),
        }
    }

    /// Add an antenna with its resolved transmit power index.
    ///
    /// Antennas are sorted by ID at build time regardless of insertion
    /// order.
    #[must_use]
    pub fn antenna(mut self, antenna_id: u16, power_index: u16) -> Self {
        self.antennas.push((antenna_id, power_index));
        self
    }

    /// Serialize the ROSpec parameter.
    ///
    /// # Errors
    /// Returns `Error::Config` if no antennas were added.
    pub fn build(mut self) -> Result<Bytes> {
        if self.antennas.is_empty() {
            return Err(Error::Config(
                "ROSpec requires at least one antenna".to_string(),
            ));
        }
        self.antennas.sort_by_key(|&(antenna_id, _)| antenna_id);

        let rospec_id = self.rospec_id;
        let hop_table_id = self.hop_table_id;
        let antennas = &self.antennas;

        let mut buf = BytesMut::with_capacity(64 + 16 * antennas.len());
        put_tlv(&mut buf, PARAM_RO_SPEC, |b| {
            b.put_u32(rospec_id);
            b.put_u8(0); // priority
            b.put_u8(0); // current state: Disabled

            put_tlv(b, PARAM_RO_BOUNDARY_SPEC, |b| {
                put_tlv(b, PARAM_RO_SPEC_START_TRIGGER, |b| {
                    b.put_u8(0); // null trigger
                });
                put_tlv(b, PARAM_RO_SPEC_STOP_TRIGGER, |b| {
                    b.put_u8(0); // null trigger
                    b.put_u32(0); // duration field is mandatory even when null
                });
            });

            put_tlv(b, PARAM_AI_SPEC, |b| {
                b.put_u16(antennas.len() as u16);
                for &(antenna_id, _) in antennas {
                    b.put_u16(antenna_id);
                }
                put_tlv(b, PARAM_AI_SPEC_STOP_TRIGGER, |b| {
                    b.put_u8(0);
                    b.put_u32(0);
                });
                put_tlv(b, PARAM_INVENTORY_PARAMETER_SPEC, |b| {
                    b.put_u16(1); // InventoryParameterSpecID
                    b.put_u8(1); // protocol: EPCGlobal Class 1 Gen 2
                    for &(antenna_id, power_index) in antennas {
                        put_tlv(b, PARAM_ANTENNA_CONFIGURATION, |b| {
                            b.put_u16(antenna_id);
                            put_tlv(b, PARAM_RF_TRANSMITTER, |b| {
                                b.put_u16(hop_table_id);
                                b.put_u16(0); // channel index
                                b.put_u16(power_index);
                            });
                        });
                    }
                });
            });

            put_tlv(b, PARAM_RO_REPORT_SPEC, |b| {
                b.put_u8(1); // trigger: UponNTagsOrEndOfROSpec
                b.put_u16(1); // N = 1
                put_tlv(b, PARAM_TAG_REPORT_CONTENT_SELECTOR, |b| {
                    b.put_u16(0x0000);
                });
            });
        });

        Ok(buf.freeze())
    }
}

/// Payload for DELETE_ROSPEC / ENABLE_ROSPEC / START_ROSPEC: a bare
/// ROSpecID. ID 0 addresses all ROSpecs (used by the startup delete).
#[must_use]
pub fn rospec_id_payload(rospec_id: u32) -> Bytes {
    Bytes::copy_from_slice(&rospec_id.to_be_bytes())
}
