use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use taglink_core::constants::{DEFAULT_POWER_DBM, DEFAULT_PORT, DEFAULT_RECONNECT_INTERVAL_MS};
use taglink_core::{Error, Result};

/// Configuration for a reader session.
///
/// # Example
/// ```
/// use taglink_client::ReaderConfig;
///
/// let config = ReaderConfig::new("192.168.0.40")
///     .with_antennas([1, 2])
///     .with_power(1, 27.5);
///
/// assert_eq!(config.addr(), "192.168.0.40:5084");
/// assert_eq!(config.power_for(1), 27.5);
/// assert_eq!(config.power_for(2), 30.0); // default
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReaderConfig {
    /// Reader hostname or IP address.
    pub host: String,

    /// LLRP TCP port (5084 unless the reader was reconfigured).
    pub port: u16,

    /// Active antenna IDs. Must be non-empty to start a session.
    pub antennas: BTreeSet<u16>,

    /// Requested transmit power per antenna in dBm. Antennas without an
    /// entry default to 30.0 dBm.
    pub power_dbm: BTreeMap<u16, f32>,

    /// Delay before a reconnect attempt after a session failure.
    pub reconnect_interval: Duration,

    /// Whether failed sessions are retried at all.
    pub enable_reconnect: bool,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        ReaderConfig {
            host: "127.0.0.1".to_string(),
            port: DEFAULT_PORT,
            antennas: BTreeSet::from([1]),
            power_dbm: BTreeMap::new(),
            reconnect_interval: Duration::from_millis(DEFAULT_RECONNECT_INTERVAL_MS),
            enable_reconnect: true,
        }
    }
}

impl ReaderConfig {
    /// Create a configuration for the given host with defaults for
    /// everything else (port 5084, antenna 1, 30 dBm, reconnect enabled).
    pub fn new(host: impl Into<String>) -> Self {
        ReaderConfig {
            host: host.into(),
            ..Default::default()
        }
    }

    /// Replace the active antenna set.
    #[must_use]
    pub fn with_antennas(mut self, antennas: impl IntoIterator<Item = u16>) -> Self {
        self.antennas = antennas.into_iter().collect();
        self
    }

    /// Set the requested transmit power for one antenna.
    #[must_use]
    pub fn with_power(mut self, antenna: u16, dbm: f32) -> Self {
        self.power_dbm.insert(antenna, dbm);
        self
    }

    /// Socket address string for the TCP connect.
    #[must_use]
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Requested power for an antenna, defaulting to 30.0 dBm.
    #[must_use]
    pub fn power_for(&self, antenna: u16) -> f32 {
        self.power_dbm
            .get(&antenna)
            .copied()
            .unwrap_or(DEFAULT_POWER_DBM)
    }

    /// The configured antenna when exactly one is active.
    ///
    /// Tag records missing an AntennaID parameter are attributed to this
    /// antenna; with several antennas active no attribution is possible.
    #[must_use]
    pub fn sole_antenna(&self) -> Option<u16> {
        if self.antennas.len() == 1 {
            self.antennas.first().copied()
        } else {
            None
        }
    }

    /// Validate the configuration ahead of a session start.
    ///
    /// # Errors
    /// Returns `Error::Config` if the host is empty, the antenna set is
    /// empty, or antenna 0 is listed (LLRP antenna IDs start at 1).
    pub fn validate(&self) -> Result<()> {
        if self.host.is_empty() {
            return Err(Error::Config("host must not be empty".to_string()));
        }
        if self.antennas.is_empty() {
            return Err(Error::Config(
                "at least one antenna must be configured".to_string(),
            ));
        }
        if self.antennas.contains(&0) {
            return Err(Error::Config("antenna IDs start at 1".to_string()));
        }
        Ok(())
    }
}
