/// LLRP protocol version carried in bits 5..3 of the first header byte.
pub const LLRP_VERSION: u8 = 1;

/// Frame header length: version/type (2) + total length (4) + message ID (4).
pub const HEADER_LEN: usize = 10;

/// Low 10 bits of a TLV type field; high bits are vendor/reserved.
pub const TLV_TYPE_MASK: u16 = 0x03FF;

/// MSB flag distinguishing TV parameters from TLV parameters.
pub const TV_FLAG: u8 = 0x80;

/// Low 7 bits of a TV type byte.
pub const TV_TYPE_MASK: u8 = 0x7F;

/// Message types (client -> reader)
pub const MSG_GET_READER_CAPABILITIES: u16 = 1;
pub const MSG_CLOSE_CONNECTION: u16 = 14;
pub const MSG_ADD_ROSPEC: u16 = 20;
pub const MSG_DELETE_ROSPEC: u16 = 21;
pub const MSG_START_ROSPEC: u16 = 22;
pub const MSG_ENABLE_ROSPEC: u16 = 24;
pub const MSG_ENABLE_EVENTS_AND_REPORTS: u16 = 64;
pub const MSG_KEEPALIVE_ACK: u16 = 72;

/// Message types (reader -> client)
pub const MSG_GET_READER_CAPABILITIES_RESPONSE: u16 = 11;
pub const MSG_ADD_ROSPEC_RESPONSE: u16 = 30;
pub const MSG_DELETE_ROSPEC_RESPONSE: u16 = 31;
pub const MSG_START_ROSPEC_RESPONSE: u16 = 32;
pub const MSG_ENABLE_ROSPEC_RESPONSE: u16 = 34;
pub const MSG_RO_ACCESS_REPORT: u16 = 61;
pub const MSG_KEEPALIVE: u16 = 62;
pub const MSG_READER_EVENT_NOTIFICATION: u16 = 63;
pub const MSG_ERROR_MESSAGE: u16 = 100;

/// TLV parameter types (compared after masking with TLV_TYPE_MASK)
pub const PARAM_REGULATORY_CAPABILITIES: u16 = 143;
pub const PARAM_UHF_BAND_CAPABILITIES: u16 = 144;
pub const PARAM_TRANSMIT_POWER_LEVEL_ENTRY: u16 = 145;
pub const PARAM_FREQUENCY_HOP_TABLE: u16 = 147;
pub const PARAM_RO_SPEC: u16 = 177;
pub const PARAM_RO_BOUNDARY_SPEC: u16 = 178;
pub const PARAM_RO_SPEC_START_TRIGGER: u16 = 179;
pub const PARAM_RO_SPEC_STOP_TRIGGER: u16 = 182;
pub const PARAM_AI_SPEC: u16 = 183;
pub const PARAM_AI_SPEC_STOP_TRIGGER: u16 = 184;
pub const PARAM_INVENTORY_PARAMETER_SPEC: u16 = 186;
pub const PARAM_ANTENNA_CONFIGURATION: u16 = 222;
pub const PARAM_RF_TRANSMITTER: u16 = 224;
pub const PARAM_RO_REPORT_SPEC: u16 = 237;
pub const PARAM_TAG_REPORT_CONTENT_SELECTOR: u16 = 238;
pub const PARAM_TAG_REPORT_DATA: u16 = 240;
pub const PARAM_EPC_DATA: u16 = 241;
pub const PARAM_LLRP_STATUS: u16 = 287;
pub const PARAM_FIELD_ERROR: u16 = 288;
pub const PARAM_PARAMETER_ERROR: u16 = 289;
pub const PARAM_C1G2_INVENTORY_COMMAND: u16 = 330;

/// TV parameter types (low 7 bits of an MSB-set type byte)
pub const TV_ANTENNA_ID: u8 = 1;
pub const TV_PEAK_RSSI: u8 = 6;
pub const TV_CHANNEL_INDEX: u8 = 7;
pub const TV_FIRST_SEEN_UTC: u8 = 8;
pub const TV_LAST_SEEN_UTC: u8 = 9;
pub const TV_TAG_SEEN_COUNT: u8 = 10;
pub const TV_EPC_96: u8 = 13;
pub const TV_RO_SPEC_ID: u8 = 14;
pub const TV_SPEC_INDEX: u8 = 15;
pub const TV_INVENTORY_PARAMETER_SPEC_ID: u8 = 16;

/// EPC limits (bytes)
pub const MIN_EPC_LEN: usize = 1;
pub const MAX_EPC_LEN: usize = 62;

/// Bytes scanned forward for an MSB-set type byte when resynchronising
/// inside a TagReportData.
pub const RESYNC_SCAN_LIMIT: usize = 16;

/// Network defaults
pub const DEFAULT_PORT: u16 = 5084;
pub const DEFAULT_POWER_DBM: f32 = 30.0;
pub const FALLBACK_HOP_TABLE_ID: u16 = 1;

/// The single ROSpec this client installs and starts.
pub const ROSPEC_ID: u32 = 1;

/// Timers (milliseconds)
pub const DEFAULT_RECONNECT_INTERVAL_MS: u64 = 5000;
pub const STARTUP_TIMEOUT_MS: u64 = 30_000;
pub const CAPABILITIES_DELAY_MS: u64 = 100;
pub const SHUTDOWN_GRACE_MS: u64 = 500;

/// Power-index fallback bounds used when the reader advertises no power table.
pub const FALLBACK_POWER_INDEX_MIN: u16 = 1;
pub const FALLBACK_POWER_INDEX_MAX: u16 = 100;
