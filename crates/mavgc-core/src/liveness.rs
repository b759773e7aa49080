//! Per-vehicle heartbeat tracking.
//!
//! Every heartbeat refreshes the sender's `last_seen`. The first heartbeat
//! ever seen also latches the default target used by commands that do not
//! name one. A periodic sweep reports vehicles that went quiet and evicts
//! those that stayed quiet for too long.

use std::collections::HashMap;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, RecvTimeoutError, Sender};
use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, info, warn};

use mavgc_metrics::{metric_defs, metrics};
use mavgc_wire::Target;

use crate::config::LivenessConfig;
use crate::ports::{TelemetryEvent, TelemetrySink};

/// Freshness of a tracked vehicle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum VehicleState {
    Fresh,
    Stale,
    Lost,
}

/// A vehicle seen on the link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Vehicle {
    pub target: Target,
    pub last_seen: Instant,
    pub state: VehicleState,
}

/// Outcome of a sweep for one vehicle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LivenessEvent {
    /// Silent past the stale threshold; still tracked.
    Stale { system: u8, silent: Duration },
    /// Silent past the lost threshold; removed.
    Lost { system: u8, silent: Duration },
}

impl LivenessEvent {
    /// Telemetry form of this event.
    pub fn to_telemetry(&self) -> TelemetryEvent {
        match *self {
            LivenessEvent::Stale { system, silent } => TelemetryEvent::VehicleStale {
                system,
                silent_ms: silent.as_millis() as u64,
            },
            LivenessEvent::Lost { system, silent } => TelemetryEvent::VehicleLost {
                system,
                silent_ms: silent.as_millis() as u64,
            },
        }
    }
}

/// Tracks `system id -> last heartbeat`.
#[derive(Debug)]
pub struct LivenessTracker {
    vehicles: Mutex<HashMap<u8, Vehicle>>,
    default_target: Mutex<Option<Target>>,
    stale_after: Duration,
    lost_after: Duration,
}

impl LivenessTracker {
    pub fn new(config: &LivenessConfig) -> Self {
        LivenessTracker {
            vehicles: Mutex::new(HashMap::new()),
            default_target: Mutex::new(None),
            stale_after: config.stale_after(),
            lost_after: config.lost_after(),
        }
    }

    /// Record a heartbeat from `source` at `now`.
    ///
    /// Returns the target if this heartbeat latched the default target.
    pub fn on_heartbeat(&self, source: Target, now: Instant) -> Option<Target> {
        {
            let mut vehicles = self.vehicles.lock();
            let vehicle = vehicles.entry(source.system).or_insert(Vehicle {
                target: source,
                last_seen: now,
                state: VehicleState::Fresh,
            });
            vehicle.last_seen = now;
            vehicle.state = VehicleState::Fresh;
            metrics::gauge!(metric_defs::VEHICLES_TRACKED.name).set(vehicles.len() as f64);
        }

        let mut default_target = self.default_target.lock();
        if default_target.is_none() {
            *default_target = Some(source);
            info!("Liveness[{}]: latched as default target", source);
            return Some(source);
        }
        None
    }

    /// Inspect every vehicle at `now`, marking stale ones and evicting lost ones.
    pub fn sweep(&self, now: Instant) -> Vec<LivenessEvent> {
        let mut vehicles = self.vehicles.lock();
        let mut events = Vec::new();

        vehicles.retain(|&system, vehicle| {
            let silent = now.saturating_duration_since(vehicle.last_seen);
            if silent > self.lost_after {
                vehicle.state = VehicleState::Lost;
                events.push(LivenessEvent::Lost { system, silent });
                false
            } else {
                if silent > self.stale_after {
                    vehicle.state = VehicleState::Stale;
                    events.push(LivenessEvent::Stale { system, silent });
                }
                true
            }
        });

        let evicted = events
            .iter()
            .filter(|e| matches!(e, LivenessEvent::Lost { .. }))
            .count();
        if evicted > 0 {
            metrics::counter!(metric_defs::VEHICLES_EVICTED.name).increment(evicted as u64);
        }
        metrics::gauge!(metric_defs::VEHICLES_TRACKED.name).set(vehicles.len() as f64);
        events.sort_by_key(|e| match e {
            LivenessEvent::Stale { system, .. } | LivenessEvent::Lost { system, .. } => *system,
        });
        events
    }

    /// Default target for commands without an explicit one.
    pub fn default_target(&self) -> Option<Target> {
        *self.default_target.lock()
    }

    /// Replace the default target.
    pub fn set_default_target(&self, target: Target) {
        *self.default_target.lock() = Some(target);
        info!("Liveness[{}]: default target updated", target);
    }

    pub fn vehicle(&self, system: u8) -> Option<Vehicle> {
        self.vehicles.lock().get(&system).copied()
    }

    pub fn is_tracked(&self, system: u8) -> bool {
        self.vehicles.lock().contains_key(&system)
    }

    /// Tracked system ids, ascending.
    pub fn tracked(&self) -> Vec<u8> {
        let mut systems: Vec<u8> = self.vehicles.lock().keys().copied().collect();
        systems.sort_unstable();
        systems
    }
}

// ============================================================================
// Sweep thread
// ============================================================================

/// Background thread running [`LivenessTracker::sweep`] on a fixed interval.
///
/// The thread stops when the monitor is stopped or dropped.
pub struct LivenessMonitor {
    stop_tx: Option<Sender<()>>,
    thread_handle: Option<JoinHandle<()>>,
}

impl LivenessMonitor {
    /// Start sweeping after the configured warm-up.
    pub fn spawn(
        tracker: Arc<LivenessTracker>,
        telemetry: Arc<dyn TelemetrySink>,
        config: &LivenessConfig,
    ) -> Self {
        let (stop_tx, stop_rx) = bounded::<()>(0);
        let warmup = config.warmup();
        let interval = config.sweep_interval();

        let thread_handle = thread::spawn(move || {
            let mut wait = warmup;
            loop {
                match stop_rx.recv_timeout(wait) {
                    Err(RecvTimeoutError::Timeout) => {}
                    _ => break,
                }
                wait = interval;

                for event in tracker.sweep(Instant::now()) {
                    match event {
                        LivenessEvent::Stale { system, silent } => warn!(
                            "Liveness[{}]: no heartbeat for {:.2}s",
                            system,
                            silent.as_secs_f64()
                        ),
                        LivenessEvent::Lost { system, silent } => warn!(
                            "Liveness[{}]: lost after {:.2}s of silence, evicted",
                            system,
                            silent.as_secs_f64()
                        ),
                    }
                    telemetry.publish(event.to_telemetry());
                }
            }
            debug!("Liveness: sweep thread stopped");
        });

        LivenessMonitor {
            stop_tx: Some(stop_tx),
            thread_handle: Some(thread_handle),
        }
    }

    /// Stop the sweep thread and wait for it to finish.
    pub fn stop(mut self) {
        self.stop_tx.take();
        if let Some(handle) = self.thread_handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for LivenessMonitor {
    fn drop(&mut self) {
        // Disconnecting the channel wakes the thread; it exits on its own.
        self.stop_tx.take();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tracker() -> LivenessTracker {
        LivenessTracker::new(&LivenessConfig::default())
    }

    #[test]
    fn test_first_heartbeat_latches_once() {
        let tracker = tracker();
        let now = Instant::now();
        assert_eq!(tracker.on_heartbeat(Target::new(1, 1), now), Some(Target::new(1, 1)));
        assert_eq!(tracker.on_heartbeat(Target::new(2, 1), now), None);
        assert_eq!(tracker.default_target(), Some(Target::new(1, 1)));
        assert_eq!(tracker.tracked(), vec![1, 2]);
    }

    #[test]
    fn test_update_target_overrides_latch() {
        let tracker = tracker();
        tracker.on_heartbeat(Target::new(1, 1), Instant::now());
        tracker.set_default_target(Target::new(3, 190));
        tracker.on_heartbeat(Target::new(1, 1), Instant::now());
        assert_eq!(tracker.default_target(), Some(Target::new(3, 190)));
    }

    #[test]
    fn test_stale_vehicle_stays_tracked() {
        let tracker = tracker();
        let start = Instant::now();
        tracker.on_heartbeat(Target::new(1, 1), start);

        let events = tracker.sweep(start + Duration::from_millis(2010));
        assert_eq!(
            events,
            vec![LivenessEvent::Stale {
                system: 1,
                silent: Duration::from_millis(2010)
            }]
        );
        assert!(tracker.is_tracked(1));
        assert_eq!(tracker.vehicle(1).map(|v| v.state), Some(VehicleState::Stale));
    }

    #[test]
    fn test_lost_vehicle_is_evicted_once() {
        let tracker = tracker();
        let start = Instant::now();
        tracker.on_heartbeat(Target::new(1, 1), start);

        let later = start + Duration::from_millis(20_010);
        let events = tracker.sweep(later);
        assert!(matches!(events.as_slice(), [LivenessEvent::Lost { system: 1, .. }]));
        assert!(!tracker.is_tracked(1));
        assert!(tracker.sweep(later).is_empty());
        // Latch survives eviction.
        assert_eq!(tracker.default_target(), Some(Target::new(1, 1)));
    }

    #[test]
    fn test_heartbeat_refreshes() {
        let tracker = tracker();
        let start = Instant::now();
        tracker.on_heartbeat(Target::new(1, 1), start);
        tracker.sweep(start + Duration::from_secs(3));
        tracker.on_heartbeat(Target::new(1, 1), start + Duration::from_secs(3));
        assert!(tracker.sweep(start + Duration::from_millis(4500)).is_empty());
        assert_eq!(tracker.vehicle(1).map(|v| v.state), Some(VehicleState::Fresh));
    }

    #[test]
    fn test_monitor_publishes_events() {
        let config = LivenessConfig {
            warmup_ms: 0,
            sweep_interval_ms: 10,
            stale_after_ms: 0,
            lost_after_ms: 1,
        };
        let tracker = Arc::new(LivenessTracker::new(&config));
        tracker.on_heartbeat(Target::new(7, 1), Instant::now());
        let (tx, rx) = crossbeam_channel::unbounded::<TelemetryEvent>();
        let monitor = LivenessMonitor::spawn(Arc::clone(&tracker), Arc::new(tx), &config);
        let lost = std::iter::from_fn(|| rx.recv_timeout(Duration::from_secs(2)).ok())
            .find(|event| matches!(event, TelemetryEvent::VehicleLost { system: 7, .. }));
        assert!(lost.is_some());
        monitor.stop();
        assert!(!tracker.is_tracked(7));
    }
}
