//! Error types for link operations.

use mavgc_wire::{MissionResult, WireError};
use thiserror::Error;

use crate::rendezvous::CommandClass;

/// Errors returned by remote operations.
#[derive(Debug, Error)]
pub enum LinkError {
    /// The retry budget ran out without a correlated response.
    #[error("{operation} timed out after {attempts} attempt(s)")]
    Timeout {
        operation: &'static str,
        attempts: u32,
    },

    /// Another operation of the same class is in flight.
    #[error("{0} operation already in flight")]
    Busy(CommandClass),

    #[error("bad command: {0}")]
    BadCommand(String),

    /// Nothing cached to return.
    #[error("no {0} available")]
    NoData(&'static str),

    /// The vehicle acknowledged with a non-accepted `MAV_RESULT`.
    #[error("vehicle rejected the command (result {code})")]
    Rejected { code: u8 },

    #[error("mission rejected: {0}")]
    MissionRejected(MissionResult),

    /// Parameter not present in the cache.
    #[error("unknown parameter: {0}")]
    UnknownParameter(String),

    /// No explicit target and none latched from a heartbeat.
    #[error("no target vehicle")]
    NoTarget,

    #[error("transport error: {0}")]
    Transport(#[from] std::io::Error),

    /// The mission source could not supply what was asked.
    #[error("mission source: {0}")]
    Source(String),

    #[error(transparent)]
    Wire(#[from] WireError),
}

/// Result type alias for link operations.
pub type LinkResult<T> = Result<T, LinkError>;
