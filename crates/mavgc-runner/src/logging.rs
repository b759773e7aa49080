//! Tracing subscriber setup for the binary.

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::error::{RunnerError, RunnerResult};

pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Filter directive for the mavgc crates. `RUST_LOG` wins when set.
pub fn filter_directive(level: Option<&str>) -> String {
    format!("mavgc={}", level.unwrap_or(DEFAULT_LOG_LEVEL))
}

/// Install the global subscriber. Logs go to stderr so stdout stays free
/// for replies and telemetry.
pub fn init_tracing(level: Option<&str>) -> RunnerResult<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter_directive(level)));

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_thread_names(true)
                .with_file(false)
                .with_line_number(false)
                .with_timer(fmt::time::uptime()),
        )
        .with(filter)
        .try_init()
        .map_err(|e| RunnerError::Config(format!("tracing: {}", e)))
}
