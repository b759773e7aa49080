//! JSON line telemetry output.

use std::io::Write;

use chrono::{DateTime, Utc};
use mavgc_core::{TelemetryEvent, TelemetrySink};
use parking_lot::Mutex;
use serde::Serialize;
use tracing::warn;

#[derive(Serialize)]
struct TelemetryLine<'a> {
    time: DateTime<Utc>,
    #[serde(flatten)]
    event: &'a TelemetryEvent,
}

/// Writes each event as one JSON object per line, stamped with UTC time.
pub struct JsonTelemetry<W: Write + Send> {
    out: Mutex<W>,
    include_messages: bool,
}

impl<W: Write + Send> JsonTelemetry<W> {
    /// `include_messages` controls whether raw decoded messages are written
    /// or only the dedicated events.
    pub fn new(out: W, include_messages: bool) -> Self {
        JsonTelemetry {
            out: Mutex::new(out),
            include_messages,
        }
    }

    pub fn into_inner(self) -> W {
        self.out.into_inner()
    }
}

impl<W: Write + Send> TelemetrySink for JsonTelemetry<W> {
    fn publish(&self, event: TelemetryEvent) {
        if !self.include_messages && matches!(event, TelemetryEvent::Message { .. }) {
            return;
        }
        let line = TelemetryLine {
            time: Utc::now(),
            event: &event,
        };
        let mut out = self.out.lock();
        let written = serde_json::to_writer(&mut *out, &line)
            .map_err(std::io::Error::from)
            .and_then(|()| out.write_all(b"\n"))
            .and_then(|()| out.flush());
        if let Err(e) = written {
            warn!("Telemetry: write failed: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mavgc_core::MissionDirection;
    use mavgc_wire::{Message, MissionResult, Target};

    fn lines(sink: JsonTelemetry<Vec<u8>>) -> Vec<serde_json::Value> {
        String::from_utf8(sink.into_inner())
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect()
    }

    #[test]
    fn test_events_are_stamped_json_lines() {
        let sink = JsonTelemetry::new(Vec::new(), false);
        sink.publish(TelemetryEvent::VehicleStale {
            system: 1,
            silent_ms: 2_500,
        });
        sink.publish(TelemetryEvent::MissionOutcome {
            direction: MissionDirection::Upload,
            result: MissionResult::NoSpace,
        });

        let lines = lines(sink);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["event"], "vehicle_stale");
        assert_eq!(lines[0]["silent_ms"], 2_500);
        assert!(lines[0]["time"].as_str().is_some());
        assert_eq!(lines[1]["event"], "mission_outcome");
    }

    #[test]
    fn test_raw_messages_filtered_unless_enabled() {
        let event = || TelemetryEvent::Message {
            source: Target::new(1, 1),
            message: Message::MissionCurrent { seq: 4 },
        };

        let quiet = JsonTelemetry::new(Vec::new(), false);
        quiet.publish(event());
        assert!(lines(quiet).is_empty());

        let verbose = JsonTelemetry::new(Vec::new(), true);
        verbose.publish(event());
        let lines = lines(verbose);
        assert_eq!(lines[0]["event"], "message");
        assert_eq!(lines[0]["message"]["message"], "MISSION_CURRENT");
    }
}
