use std::cmp::Ordering;
use std::fmt;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::constants::{FALLBACK_HOP_TABLE_ID, MAX_EPC_LEN, MIN_EPC_LEN};
use crate::error::{Error, Result};

/// A single tag sighting decoded from an RO_ACCESS_REPORT.
///
/// The EPC is stored as raw bytes; hex formatting is a presentation
/// concern handled by [`TagObservation::epc_hex`]. All other fields are
/// optional because the reader only includes what the report content
/// selector asked for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagObservation {
    /// Electronic Product Code, 1..=62 bytes.
    pub epc: Bytes,

    /// Antenna the tag was seen on. `None` when the reader omitted the
    /// parameter and more than one antenna is configured.
    pub antenna: Option<u16>,

    /// Peak RSSI in dBm (signed).
    pub rssi: Option<i8>,

    /// Number of times the tag was seen during the report interval.
    pub seen_count: Option<u16>,

    /// Last-seen timestamp, microseconds since the Unix epoch (UTC).
    pub last_seen_utc_micros: Option<u64>,
}

impl TagObservation {
    /// Create an observation from a decoded EPC, validating its length.
    ///
    /// # Errors
    /// Returns `Error::TagRecordMalformed` if the EPC is empty or longer
    /// than 62 bytes.
    pub fn new(epc: Bytes) -> Result<Self> {
        if !(MIN_EPC_LEN..=MAX_EPC_LEN).contains(&epc.len()) {
            return Err(Error::TagRecordMalformed(format!(
                "EPC must be {MIN_EPC_LEN}-{MAX_EPC_LEN} bytes, got {}",
                epc.len()
            )));
        }
        Ok(TagObservation {
            epc,
            antenna: None,
            rssi: None,
            seen_count: None,
            last_seen_utc_micros: None,
        })
    }

    /// Uppercase hex rendering of the EPC.
    #[must_use]
    pub fn epc_hex(&self) -> String {
        bytes_to_hex(&self.epc)
    }

    /// Last-seen timestamp as a UTC datetime, when the reader reported one.
    #[must_use]
    pub fn last_seen(&self) -> Option<DateTime<Utc>> {
        self.last_seen_utc_micros
            .and_then(|micros| DateTime::from_timestamp_micros(micros as i64))
    }
}

impl fmt::Display for TagObservation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.epc_hex())?;
        if let Some(antenna) = self.antenna {
            write!(f, " ant={antenna}")?;
        }
        if let Some(rssi) = self.rssi {
            write!(f, " rssi={rssi}")?;
        }
        Ok(())
    }
}

/// Convert bytes to an uppercase hex string.
fn bytes_to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02X}")).collect()
}

/// One row of the reader's transmit-power table.
///
/// The on-wire value is a signed 16-bit count of hundredths of a dBm;
/// it is converted to dBm at parse time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PowerTableEntry {
    pub index: u16,
    pub power_dbm: f32,
}

/// Transmit-power table discovered from reader capabilities.
///
/// Entries are kept sorted ascending by `power_dbm`; indices are unique
/// per the LLRP capabilities contract.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PowerTable {
    entries: Vec<PowerTableEntry>,
}

impl PowerTable {
    /// Build a table from raw entries, sorting ascending by dBm.
    #[must_use]
    pub fn from_entries(mut entries: Vec<PowerTableEntry>) -> Self {
        entries.sort_by(|a, b| {
            a.power_dbm
                .partial_cmp(&b.power_dbm)
                .unwrap_or(Ordering::Equal)
        });
        PowerTable { entries }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn entries(&self) -> &[PowerTableEntry] {
        &self.entries
    }

    /// Index of the entry closest to `target_dbm`.
    ///
    /// Resolves to the entry with the minimum absolute difference in dBm;
    /// ties break to the lower index. Returns `None` on an empty table.
    ///
    /// # Example
    /// ```
    /// use taglink_core::{PowerTable, PowerTableEntry};
    ///
    /// let table = PowerTable::from_entries(vec![
    ///     PowerTableEntry { index: 1, power_dbm: 10.0 },
    ///     PowerTableEntry { index: 200, power_dbm: 30.0 },
    /// ]);
    /// assert_eq!(table.closest_index(30.0), Some(200));
    /// assert_eq!(table.closest_index(12.0), Some(1));
    /// ```
    #[must_use]
    pub fn closest_index(&self, target_dbm: f32) -> Option<u16> {
        self.entries
            .iter()
            .min_by(|a, b| {
                let da = (a.power_dbm - target_dbm).abs();
                let db = (b.power_dbm - target_dbm).abs();
                da.partial_cmp(&db)
                    .unwrap_or(Ordering::Equal)
                    .then_with(|| a.index.cmp(&b.index))
            })
            .map(|entry| entry.index)
    }
}

/// Runtime-discovered reader capabilities.
///
/// Populated by parsing a GET_READER_CAPABILITIES_RESPONSE; cleared and
/// rediscovered on every reconnect because firmware updates and regulatory
/// region changes can alter both tables.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReaderCapabilities {
    /// Transmit-power table, sorted ascending by dBm.
    pub power_table: PowerTable,

    /// Frequency hop-table IDs in the order first observed. May be empty
    /// on permissive (non-hopping) hardware.
    pub hop_table_ids: Vec<u16>,
}

impl ReaderCapabilities {
    /// Record a hop-table ID, ignoring zeros and duplicates.
    pub fn record_hop_table(&mut self, id: u16) {
        if id != 0 && !self.hop_table_ids.contains(&id) {
            self.hop_table_ids.push(id);
        }
    }

    /// Hop-table ID to configure the transmitter with: the first one
    /// advertised, or the literal 1 when the reader advertised none.
    #[must_use]
    pub fn hop_table_id(&self) -> u16 {
        self.hop_table_ids
            .first()
            .copied()
            .unwrap_or(FALLBACK_HOP_TABLE_ID)
    }
}

/// Events surfaced to the upstream consumer of a reader session.
#[derive(Debug)]
pub enum ReaderEvent {
    /// TCP session to the reader is established.
    Connected,

    /// The ROSpec is confirmed started; tag observations follow.
    Ready,

    /// A tag observation decoded from an RO_ACCESS_REPORT.
    Tag(TagObservation),

    /// The session was torn down. A reconnect may follow.
    Disconnected,

    /// A session-fatal error, identified by its stable kind tag.
    Error {
        kind: &'static str,
        detail: String,
    },
}
