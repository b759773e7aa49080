//! Ground station core: turns a stream of MAVLink frames into synchronous,
//! retry-safe remote operations.
//!
//! # Architecture
//!
//! ```text
//! transport bytes ──► dispatcher thread ──► Link::handle_frame
//!                                             ├─ LivenessTracker (heartbeats)
//!                                             ├─ ParameterStore / LogStore caches
//!                                             ├─ Rendezvous::offer ──► waiting Flight
//!                                             └─ TelemetrySink
//!
//! CommandClient ──► facade worker ──► CommandFacade ──► Link operations ──► FrameSink
//! ```
//!
//! Operations (mission transfer, parameter reads, vehicle commands) block
//! the calling thread on a [`Flight`] until the dispatcher delivers the
//! correlated response or the retry budget runs out. They must never run on
//! the dispatcher thread.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use crossbeam_channel::unbounded;
//! use mavgc_core::{CommandFacade, Link, LinkConfig, NullTelemetry, VecMissionSource};
//! use mavgc_command_protocol::Reply;
//!
//! let (frames_tx, _frames_rx) = unbounded::<Vec<u8>>();
//! let link = Arc::new(Link::new(
//!     LinkConfig::default(),
//!     Arc::new(frames_tx),
//!     Arc::new(NullTelemetry),
//! ));
//! let facade = CommandFacade::new(link, Arc::new(VecMissionSource::default()));
//!
//! // No vehicle seen yet, so nothing is cached.
//! assert_eq!(facade.execute("2"), Reply::Null);
//! assert_eq!(facade.execute("2=1"), Reply::BadCommand);
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod facade;
pub mod link;
pub mod liveness;
pub mod logs;
pub mod mission;
pub mod params;
pub mod ports;
pub mod rendezvous;
pub mod vehicle;

pub use client::CommandClient;
pub use config::{LinkConfig, LivenessConfig, RetryPolicy};
pub use error::{LinkError, LinkResult};
pub use facade::{reply_for_error, CommandFacade};
pub use link::{spawn_dispatcher, HeartbeatRecord, Link};
pub use liveness::{LivenessEvent, LivenessMonitor, LivenessTracker, Vehicle, VehicleState};
pub use logs::LogStore;
pub use mission::{MissionSession, MissionStore};
pub use params::{BulkSession, ParamEntry, ParameterStore};
pub use ports::{
    FrameSink, MissionDirection, MissionSource, NullTelemetry, TelemetryEvent, TelemetrySink,
    VecMissionSource,
};
pub use rendezvous::{CommandClass, Flight, Rendezvous};
pub use vehicle::{degrees_to_wire, meters_to_wire, power_params};
