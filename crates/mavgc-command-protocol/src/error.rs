//! Error types for the text command protocol.

use thiserror::Error;

/// Errors that can occur when parsing commands or replies.
///
/// Every command parse error renders as `BADCMD`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CommandError {
    /// The line was empty.
    #[error("empty command")]
    Empty,

    /// The first token is not a known ordinal.
    #[error("unknown command ordinal: {0}")]
    UnknownCommand(String),

    /// The command does not accept this many arguments.
    #[error("{command} does not take {actual} argument(s)")]
    WrongArity {
        /// Command name.
        command: &'static str,
        /// Number of arguments supplied.
        actual: usize,
    },

    /// An argument could not be converted to the required type.
    #[error("invalid argument '{value}' for {name}")]
    InvalidArgument {
        /// Argument name.
        name: &'static str,
        /// Offending text.
        value: String,
    },

    /// Failed to parse a reply line.
    #[error("failed to parse reply: {0}")]
    ParseError(String),

    /// Buffer overflow (line too long).
    #[error("buffer overflow: max {max} bytes, got {actual}")]
    BufferOverflow { max: usize, actual: usize },
}

/// Result type alias for command protocol operations.
pub type CommandResult<T> = Result<T, CommandError>;
