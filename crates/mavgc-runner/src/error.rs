//! Runner error type.

use mavgc_command_protocol::CommandError;
use mavgc_core::LinkError;
use mavgc_wire::WireError;
use thiserror::Error;

/// Errors that stop the runner or one of its file loaders.
#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Link error: {0}")]
    Link(#[from] LinkError),

    #[error("Command error: {0}")]
    Command(#[from] CommandError),

    /// A malformed line in a waypoint or parameter file.
    #[error("{file} line {line}: {source}")]
    FileLine {
        file: String,
        line: usize,
        source: WireError,
    },

    #[error("Task error: {0}")]
    Task(#[from] tokio::task::JoinError),

    #[error("Configuration error: {0}")]
    Config(String),
}

pub type RunnerResult<T> = Result<T, RunnerError>;
