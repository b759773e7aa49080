//! Timing and identity configuration for a link.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use mavgc_command_protocol::CommandKind;

/// Per-attempt deadline and retry budget for one rendezvous.
///
/// A policy with `retries = 3` sends the request up to four times.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempt_timeout: Duration,
    pub retries: u32,
}

impl RetryPolicy {
    pub const fn new(attempt_timeout: Duration, retries: u32) -> Self {
        RetryPolicy {
            attempt_timeout,
            retries,
        }
    }

    /// Total number of sends, initial one included.
    pub fn attempts(&self) -> u32 {
        self.retries + 1
    }

    /// Longest time the whole exchange can wait.
    pub fn worst_case(&self) -> Duration {
        self.attempt_timeout * self.attempts()
    }
}

/// Heartbeat sweep configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LivenessConfig {
    /// Delay before the first sweep.
    pub warmup_ms: u64,
    pub sweep_interval_ms: u64,
    /// Silence after which a vehicle is reported stale.
    pub stale_after_ms: u64,
    /// Silence after which a vehicle is evicted.
    pub lost_after_ms: u64,
}

impl Default for LivenessConfig {
    fn default() -> Self {
        LivenessConfig {
            warmup_ms: 30_000,
            sweep_interval_ms: 1_000,
            stale_after_ms: 2_000,
            lost_after_ms: 20_000,
        }
    }
}

impl LivenessConfig {
    pub fn warmup(&self) -> Duration {
        Duration::from_millis(self.warmup_ms)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_millis(self.sweep_interval_ms)
    }

    pub fn stale_after(&self) -> Duration {
        Duration::from_millis(self.stale_after_ms)
    }

    pub fn lost_after(&self) -> Duration {
        Duration::from_millis(self.lost_after_ms)
    }
}

/// Link configuration.
///
/// Every field has a default, so a YAML file only needs the keys it changes:
///
/// ```yaml
/// attempt_timeout_ms: 500
/// liveness:
///   lost_after_ms: 10000
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkConfig {
    /// System id this ground station sends as.
    pub gcs_system_id: u8,
    /// Component id this ground station sends as.
    pub gcs_component_id: u8,
    /// Deadline for one request/response attempt.
    pub attempt_timeout_ms: u64,
    /// Resends after the first attempt times out.
    pub retries: u32,
    /// Resends for `MISSION_SET_CURRENT`.
    pub set_current_retries: u32,
    /// Window for the first value of a bulk parameter read.
    pub param_list_window_ms: u64,
    /// Idle window for the final ack of a mission upload.
    pub upload_ack_window_ms: u64,
    /// How long log entries keep being collected after the first one.
    pub log_settle_ms: u64,
    /// Outer reply timeout of the command client, and the floor of every
    /// per-command deadline.
    pub facade_timeout_ms: u64,
    /// Extra time granted to mission transfers and bulk parameter reads,
    /// whose length grows with the number of items.
    pub transfer_timeout_ms: u64,
    pub liveness: LivenessConfig,
}

impl Default for LinkConfig {
    fn default() -> Self {
        LinkConfig {
            gcs_system_id: 255,
            gcs_component_id: 190,
            attempt_timeout_ms: 700,
            retries: 3,
            set_current_retries: 5,
            param_list_window_ms: 17_000,
            upload_ack_window_ms: 1_000,
            log_settle_ms: 3_000,
            facade_timeout_ms: 3_000,
            transfer_timeout_ms: 120_000,
            liveness: LivenessConfig::default(),
        }
    }
}

impl LinkConfig {
    pub fn attempt_timeout(&self) -> Duration {
        Duration::from_millis(self.attempt_timeout_ms)
    }

    /// Policy for ordinary command/ack exchanges.
    pub fn command_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.attempt_timeout(), self.retries)
    }

    pub fn set_current_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.attempt_timeout(), self.set_current_retries)
    }

    /// Policy for the first value of a bulk parameter read.
    pub fn param_list_policy(&self) -> RetryPolicy {
        RetryPolicy::new(Duration::from_millis(self.param_list_window_ms), self.retries)
    }

    pub fn upload_ack_window(&self) -> Duration {
        Duration::from_millis(self.upload_ack_window_ms)
    }

    pub fn log_settle(&self) -> Duration {
        Duration::from_millis(self.log_settle_ms)
    }

    pub fn facade_timeout(&self) -> Duration {
        Duration::from_millis(self.facade_timeout_ms)
    }

    pub fn transfer_timeout(&self) -> Duration {
        Duration::from_millis(self.transfer_timeout_ms)
    }

    /// How long the command client waits for a reply to `kind`.
    ///
    /// Covers every attempt the operation may make plus one attempt of
    /// slack, so the operation reports its own timeout before the client
    /// gives up. Never shorter than [`LinkConfig::facade_timeout`].
    pub fn reply_deadline(&self, kind: CommandKind) -> Duration {
        let command = self.command_policy().worst_case();
        let budget = match kind {
            CommandKind::Heartbeat
            | CommandKind::GetMission
            | CommandKind::GetParameterList
            | CommandKind::GetLogEntry
            | CommandKind::UpdateTarget => Duration::ZERO,
            CommandKind::ReadMission | CommandKind::WriteMission => {
                command + self.upload_ack_window() + self.transfer_timeout()
            }
            CommandKind::ReadParameterListStart => {
                self.param_list_policy().worst_case() + self.transfer_timeout()
            }
            CommandKind::SetCurrentActiveWp => self.set_current_policy().worst_case(),
            CommandKind::ReadLogEntry => command + self.log_settle(),
            _ => command,
        };
        if budget.is_zero() {
            return self.facade_timeout();
        }
        (budget + self.attempt_timeout()).max(self.facade_timeout())
    }
}
