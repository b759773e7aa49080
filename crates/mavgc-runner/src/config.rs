//! Runner configuration: a YAML file overlaid with command line flags.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use clap::{Parser, ValueEnum};
use mavgc_core::LinkConfig;
use serde::{Deserialize, Serialize};

use crate::error::{RunnerError, RunnerResult};

/// Socket type used to reach the vehicle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    /// Connect to a TCP endpoint (SITL, serial bridges).
    Tcp,
    /// Listen on a UDP port and answer whichever peer talks first.
    Udp,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    pub kind: TransportKind,
    /// TCP endpoint to connect to.
    pub address: String,
    /// Local UDP address to bind.
    pub bind: String,
    /// UDP peer to send to before one has been heard from.
    pub peer: Option<String>,
}

impl Default for TransportConfig {
    fn default() -> Self {
        TransportConfig {
            kind: TransportKind::Tcp,
            address: "127.0.0.1:5760".to_string(),
            bind: "0.0.0.0:14550".to_string(),
            peer: None,
        }
    }
}

/// Everything the runner needs to start.
///
/// ```yaml
/// transport:
///   kind: udp
///   bind: 0.0.0.0:14550
/// link:
///   retries: 5
/// telemetry: true
/// mission_file: missions/survey.waypoints
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    pub link: LinkConfig,
    pub transport: TransportConfig,
    /// Print telemetry events as JSON lines on stdout.
    pub telemetry: bool,
    /// Include every decoded message in the telemetry output.
    pub telemetry_messages: bool,
    /// Waypoint file served to WRITE_MISSION.
    pub mission_file: Option<PathBuf>,
    /// Parameter file applied once the parameter list has been read.
    pub param_file: Option<PathBuf>,
    /// `tracing` level for the mavgc crates.
    pub log_level: Option<String>,
    /// Serve Prometheus metrics here (needs the `prometheus` feature).
    pub metrics_listen: Option<SocketAddr>,
}

impl RunnerConfig {
    pub fn from_yaml(text: &str) -> RunnerResult<Self> {
        Ok(serde_yaml::from_str(text)?)
    }

    pub fn load(path: &Path) -> RunnerResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_yaml(&text)
    }
}

/// Command line interface of the `mavgc` binary.
#[derive(Debug, Parser)]
#[command(name = "mavgc", version, about = "MAVLink v1 ground station command console")]
pub struct Cli {
    /// YAML configuration file.
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Log level for the mavgc crates (overridden by RUST_LOG).
    #[arg(long)]
    pub log_level: Option<String>,

    #[arg(long, value_enum)]
    pub transport: Option<TransportKind>,

    /// TCP endpoint to connect to.
    #[arg(long)]
    pub connect: Option<String>,

    /// Local UDP address to bind.
    #[arg(long)]
    pub bind: Option<String>,

    /// UDP peer to send to.
    #[arg(long)]
    pub peer: Option<String>,

    /// Waypoint file served to WRITE_MISSION.
    #[arg(long)]
    pub mission: Option<PathBuf>,

    /// Parameter file to apply after reading the parameter list.
    #[arg(long)]
    pub params: Option<PathBuf>,

    /// Print telemetry events as JSON lines.
    #[arg(long)]
    pub telemetry: bool,

    /// Serve Prometheus metrics on this address.
    #[arg(long)]
    pub metrics_listen: Option<SocketAddr>,

    /// Write the downloaded mission to this waypoint file before exiting.
    #[arg(long)]
    pub save_mission: Option<PathBuf>,

    /// Run these command lines in order and exit.
    #[arg(short = 'e', long = "exec")]
    pub exec: Vec<String>,
}

impl Cli {
    /// Load the configuration file (if any) and apply the flags on top.
    pub fn resolve(&self) -> RunnerResult<RunnerConfig> {
        let mut config = match &self.config {
            Some(path) => RunnerConfig::load(path).map_err(|e| {
                RunnerError::Config(format!("{}: {}", path.display(), e))
            })?,
            None => RunnerConfig::default(),
        };
        self.apply(&mut config);
        Ok(config)
    }

    fn apply(&self, config: &mut RunnerConfig) {
        if let Some(kind) = self.transport {
            config.transport.kind = kind;
        }
        if let Some(address) = &self.connect {
            config.transport.address = address.clone();
        }
        if let Some(bind) = &self.bind {
            config.transport.bind = bind.clone();
        }
        if let Some(peer) = &self.peer {
            config.transport.peer = Some(peer.clone());
        }
        if let Some(mission) = &self.mission {
            config.mission_file = Some(mission.clone());
        }
        if let Some(params) = &self.params {
            config.param_file = Some(params.clone());
        }
        if let Some(level) = &self.log_level {
            config.log_level = Some(level.clone());
        }
        if let Some(addr) = self.metrics_listen {
            config.metrics_listen = Some(addr);
        }
        config.telemetry |= self.telemetry;
    }
}
