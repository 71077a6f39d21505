use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    // Framing errors
    #[error("frame length field {length} is below the 10-byte header minimum")]
    FrameLengthInvalid { length: u32 },

    #[error("frame truncated: need {needed} bytes, have {available}")]
    FrameTooShort { needed: usize, available: usize },

    #[error("frame of {size} bytes exceeds maximum {max_size} bytes")]
    FrameTooLarge { size: usize, max_size: usize },

    // Protocol errors
    #[error("unexpected message type {message_type} in state {state}")]
    UnexpectedMessage { message_type: u16, state: String },

    #[error("reader rejected request with LLRP status {code}: {description}")]
    LlrpStatus { code: u16, description: String },

    #[error("parameter {param_type} rejected with error code {code}")]
    ParameterError { param_type: u16, code: u16 },

    #[error("field {field} rejected with error code {code}")]
    FieldError { field: u16, code: u16 },

    #[error("capabilities response malformed: {0}")]
    CapabilitiesMalformed(String),

    #[error("tag report record malformed: {0}")]
    TagRecordMalformed(String),

    // Configuration errors
    #[error("invalid reader configuration: {0}")]
    Config(String),

    // IO errors
    #[error("timed out waiting for the reader")]
    ConnectTimeout,

    #[error("socket error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Stable kind tag surfaced alongside consumer-facing error events.
    ///
    /// The tag identifies the error class without the free-form detail,
    /// so upstream consumers can match on it across releases.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::FrameLengthInvalid { .. } => "frame_length_invalid",
            Error::FrameTooShort { .. } => "frame_too_short",
            Error::FrameTooLarge { .. } => "frame_too_large",
            Error::UnexpectedMessage { .. } => "unexpected_message",
            Error::LlrpStatus { .. } => "llrp_status",
            Error::ParameterError { .. } => "parameter_error",
            Error::FieldError { .. } => "field_error",
            Error::CapabilitiesMalformed(_) => "capabilities_malformed",
            Error::TagRecordMalformed(_) => "tag_record_malformed",
            Error::Config(_) => "config",
            Error::ConnectTimeout => "connect_timeout",
            Error::Io(_) => "socket",
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
