//! Error types for the wire crate.

use thiserror::Error;

/// Errors that can occur when encoding or decoding messages.
///
/// The streaming decoder never returns these to its caller: malformed frames
/// are dropped and counted. They surface only from the explicit payload
/// helpers and the text parsers.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WireError {
    /// Message id is not part of the supported dialect.
    #[error("unknown message id: {0}")]
    UnknownMessage(u8),

    /// Payload longer than the message allows.
    #[error("payload too long for message {msg_id}: {len} bytes (max {max})")]
    PayloadTooLong {
        /// Message id.
        msg_id: u8,
        /// Received length.
        len: usize,
        /// Maximum length for this id.
        max: usize,
    },

    /// Checksum did not validate.
    #[error("checksum mismatch: expected {expected:#06x}, got {actual:#06x}")]
    ChecksumMismatch {
        /// Computed checksum.
        expected: u16,
        /// Checksum carried by the frame.
        actual: u16,
    },

    /// Frame does not start with the start marker or is truncated.
    #[error("malformed frame: {0}")]
    MalformedFrame(String),

    /// A text field (mission line, parameter line) could not be parsed.
    #[error("invalid field '{field}': {value}")]
    InvalidField {
        /// Name of the field.
        field: &'static str,
        /// Offending text.
        value: String,
    },

    /// A text record had the wrong number of fields.
    #[error("expected {expected} fields, got {actual}")]
    FieldCount {
        /// Expected number of fields.
        expected: usize,
        /// Actual number of fields.
        actual: usize,
    },

    /// Parameter id longer than 16 bytes or not ASCII.
    #[error("invalid parameter id: {0}")]
    InvalidParamId(String),
}

/// Result type alias for wire operations.
pub type WireResult<T> = Result<T, WireError>;
