//! Collaborator seams: the outbound byte sink, the telemetry sink and the
//! mission source consulted during uploads.

use std::io;
use std::time::Duration;

use crossbeam_channel::Sender;
use parking_lot::Mutex;
use serde::Serialize;

use mavgc_wire::{Message, MissionItem, MissionResult, Target};

// ============================================================================
// Frame sink
// ============================================================================

/// Destination for encoded frames (serial port, socket, test harness).
pub trait FrameSink: Send + Sync {
    fn send(&self, frame: &[u8]) -> io::Result<()>;
}

impl FrameSink for Sender<Vec<u8>> {
    fn send(&self, frame: &[u8]) -> io::Result<()> {
        Sender::send(self, frame.to_vec())
            .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "frame channel closed"))
    }
}

// ============================================================================
// Telemetry
// ============================================================================

/// Direction of a mission transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MissionDirection {
    Upload,
    Download,
}

impl MissionDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            MissionDirection::Upload => "upload",
            MissionDirection::Download => "download",
        }
    }
}

/// Events published to the telemetry sink.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum TelemetryEvent {
    /// Every decoded inbound message.
    Message { source: Target, message: Message },
    /// First heartbeat latched the default target.
    TargetLatched { target: Target },
    /// Silent past the stale threshold, still tracked.
    VehicleStale { system: u8, silent_ms: u64 },
    /// Silent past the lost threshold, evicted.
    VehicleLost { system: u8, silent_ms: u64 },
    MissionOutcome {
        direction: MissionDirection,
        result: MissionResult,
    },
    MissionItemReached { seq: u16 },
}

/// Consumer of telemetry events.
pub trait TelemetrySink: Send + Sync {
    fn publish(&self, event: TelemetryEvent);
}

/// Discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullTelemetry;

impl TelemetrySink for NullTelemetry {
    fn publish(&self, _event: TelemetryEvent) {}
}

impl TelemetrySink for Sender<TelemetryEvent> {
    fn publish(&self, event: TelemetryEvent) {
        // A dropped receiver only means nobody is listening.
        let _ = Sender::send(self, event);
    }
}

// ============================================================================
// Mission source
// ============================================================================

/// Supplies mission items during an upload.
///
/// The upload notifies [`start`](MissionSource::start), asks for
/// [`count`](MissionSource::count) until it is known, then asks for each item
/// the vehicle requests and finally reports the outcome.
pub trait MissionSource: Send + Sync {
    fn start(&self);

    /// Number of items, waiting at most `timeout` for it to become known.
    fn count(&self, timeout: Duration) -> Option<u16>;

    fn item(&self, seq: u16) -> Option<MissionItem>;

    fn finished(&self, result: MissionResult);
}

/// In-memory mission source.
#[derive(Debug, Default)]
pub struct VecMissionSource {
    items: Mutex<Vec<MissionItem>>,
    outcome: Mutex<Option<MissionResult>>,
}

impl VecMissionSource {
    pub fn new(items: Vec<MissionItem>) -> Self {
        VecMissionSource {
            items: Mutex::new(items),
            outcome: Mutex::new(None),
        }
    }

    /// Replace the items for the next upload.
    pub fn set_items(&self, items: Vec<MissionItem>) {
        *self.items.lock() = items;
    }

    /// Outcome of the last upload.
    pub fn outcome(&self) -> Option<MissionResult> {
        *self.outcome.lock()
    }
}

impl MissionSource for VecMissionSource {
    fn start(&self) {
        *self.outcome.lock() = None;
    }

    fn count(&self, _timeout: Duration) -> Option<u16> {
        u16::try_from(self.items.lock().len()).ok()
    }

    fn item(&self, seq: u16) -> Option<MissionItem> {
        self.items.lock().get(seq as usize).copied()
    }

    fn finished(&self, result: MissionResult) {
        *self.outcome.lock() = Some(result);
    }
}
