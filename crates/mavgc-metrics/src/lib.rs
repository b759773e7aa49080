//! Metrics infrastructure for the mavgc ground station.
//!
//! Every metric emitted by the workspace is declared here as a [`Metric`]
//! constant so names and label keys stay consistent between the codec, the
//! rendezvous engine and whatever exporter the host installs. The `metrics`
//! crate is re-exported; with no recorder installed all macros are no-ops.
//!
//! # Example
//!
//! ```rust
//! use mavgc_metrics::{metric_defs, metrics};
//!
//! metrics::counter!(metric_defs::CODEC_FRAMES_DROPPED.name, "reason" => "crc").increment(1);
//! ```

pub use metrics;

use metrics::{describe_counter, describe_gauge, describe_histogram, Unit};

/// The kind of metric (counter, gauge, or histogram).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricKind {
    /// A monotonically increasing counter.
    Counter,
    /// A gauge that can go up and down.
    Gauge,
    /// A histogram for recording distributions.
    Histogram,
}

impl MetricKind {
    /// Returns the kind as a lowercase string.
    pub const fn as_str(&self) -> &'static str {
        match self {
            MetricKind::Counter => "counter",
            MetricKind::Gauge => "gauge",
            MetricKind::Histogram => "histogram",
        }
    }
}

impl std::fmt::Display for MetricKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A metric declaration with its metadata.
///
/// ```rust
/// use mavgc_metrics::{Metric, MetricKind};
/// use metrics::Unit;
///
/// const FRAMES: Metric = Metric::counter("mavgc.test.frames")
///     .with_description("Frames seen")
///     .with_unit(Unit::Count)
///     .with_labels(&["direction"]);
///
/// assert_eq!(FRAMES.kind, MetricKind::Counter);
/// ```
#[derive(Debug, Clone)]
pub struct Metric {
    /// The metric name (e.g., "mavgc.codec.frames_dropped").
    pub name: &'static str,
    /// The kind of metric.
    pub kind: MetricKind,
    /// Human-readable description.
    pub description: &'static str,
    /// The unit of measurement (optional).
    pub unit: Option<Unit>,
    /// Expected label keys.
    pub labels: &'static [&'static str],
}

impl Metric {
    /// Creates a new counter metric with the given name.
    pub const fn counter(name: &'static str) -> Self {
        Self::new(name, MetricKind::Counter)
    }

    /// Creates a new gauge metric with the given name.
    pub const fn gauge(name: &'static str) -> Self {
        Self::new(name, MetricKind::Gauge)
    }

    /// Creates a new histogram metric with the given name.
    pub const fn histogram(name: &'static str) -> Self {
        Self::new(name, MetricKind::Histogram)
    }

    const fn new(name: &'static str, kind: MetricKind) -> Self {
        Self {
            name,
            kind,
            description: "",
            unit: None,
            labels: &[],
        }
    }

    /// Sets the description for the metric.
    pub const fn with_description(mut self, description: &'static str) -> Self {
        self.description = description;
        self
    }

    /// Sets the unit for the metric.
    pub const fn with_unit(mut self, unit: Unit) -> Self {
        self.unit = Some(unit);
        self
    }

    /// Sets the expected label keys for the metric.
    pub const fn with_labels(mut self, labels: &'static [&'static str]) -> Self {
        self.labels = labels;
        self
    }

    /// Registers this metric's description with the installed recorder.
    pub fn describe(&self) {
        match (self.kind, self.unit) {
            (MetricKind::Counter, Some(unit)) => {
                describe_counter!(self.name, unit, self.description);
            }
            (MetricKind::Counter, None) => {
                describe_counter!(self.name, self.description);
            }
            (MetricKind::Gauge, Some(unit)) => {
                describe_gauge!(self.name, unit, self.description);
            }
            (MetricKind::Gauge, None) => {
                describe_gauge!(self.name, self.description);
            }
            (MetricKind::Histogram, Some(unit)) => {
                describe_histogram!(self.name, unit, self.description);
            }
            (MetricKind::Histogram, None) => {
                describe_histogram!(self.name, self.description);
            }
        }
    }
}

/// All metric definitions for the ground station.
pub mod metric_defs {
    use super::{Metric, Unit};

    // ========================================================================
    // Codec
    // ========================================================================

    /// Frames that passed the checksum and decoded into a known message.
    pub const CODEC_FRAMES_DECODED: Metric = Metric::counter("mavgc.codec.frames_decoded")
        .with_description("Frames decoded into a known message")
        .with_unit(Unit::Count);

    /// Frames silently discarded by the parser.
    ///
    /// Labels: reason (`crc`, `unknown_id`, `malformed`)
    pub const CODEC_FRAMES_DROPPED: Metric = Metric::counter("mavgc.codec.frames_dropped")
        .with_description("Frames discarded by the parser")
        .with_unit(Unit::Count)
        .with_labels(&["reason"]);

    /// Frames written to the transport.
    pub const LINK_FRAMES_SENT: Metric = Metric::counter("mavgc.link.frames_sent")
        .with_description("Frames written to the transport")
        .with_unit(Unit::Count)
        .with_labels(&["message"]);

    // ========================================================================
    // Rendezvous
    // ========================================================================

    /// Requests resent after a per-attempt deadline elapsed.
    pub const RENDEZVOUS_RETRIES: Metric = Metric::counter("mavgc.rendezvous.retries")
        .with_description("Requests resent after an attempt deadline")
        .with_unit(Unit::Count)
        .with_labels(&["class"]);

    /// Operations that exhausted their retry budget.
    pub const RENDEZVOUS_TIMEOUTS: Metric = Metric::counter("mavgc.rendezvous.timeouts")
        .with_description("Operations that exhausted their retry budget")
        .with_unit(Unit::Count)
        .with_labels(&["class"]);

    /// Invocations rejected because the class slot was taken.
    pub const RENDEZVOUS_BUSY: Metric = Metric::counter("mavgc.rendezvous.busy")
        .with_description("Invocations rejected because the class slot was taken")
        .with_unit(Unit::Count)
        .with_labels(&["class"]);

    /// Time from first send to correlated response.
    pub const RENDEZVOUS_LATENCY: Metric = Metric::histogram("mavgc.rendezvous.latency_ms")
        .with_description("Time from first send to the correlated response")
        .with_unit(Unit::Milliseconds)
        .with_labels(&["class"]);

    // ========================================================================
    // Vehicles and sessions
    // ========================================================================

    /// Vehicles currently tracked by the liveness tracker.
    pub const VEHICLES_TRACKED: Metric = Metric::gauge("mavgc.liveness.vehicles")
        .with_description("Vehicles currently tracked")
        .with_unit(Unit::Count);

    /// Vehicles removed after the lost threshold.
    pub const VEHICLES_EVICTED: Metric = Metric::counter("mavgc.liveness.evicted")
        .with_description("Vehicles removed after going silent")
        .with_unit(Unit::Count);

    /// Finished mission transfers.
    ///
    /// Labels: direction (`upload`, `download`), outcome
    pub const MISSION_TRANSFERS: Metric = Metric::counter("mavgc.mission.transfers")
        .with_description("Finished mission transfers")
        .with_unit(Unit::Count)
        .with_labels(&["direction", "outcome"]);

    /// Parameter values received from the vehicle.
    pub const PARAMS_RECEIVED: Metric = Metric::counter("mavgc.params.received")
        .with_description("Parameter values received")
        .with_unit(Unit::Count);

    /// All metrics, for bulk description.
    pub const ALL: &[Metric] = &[
        CODEC_FRAMES_DECODED,
        CODEC_FRAMES_DROPPED,
        LINK_FRAMES_SENT,
        RENDEZVOUS_RETRIES,
        RENDEZVOUS_TIMEOUTS,
        RENDEZVOUS_BUSY,
        RENDEZVOUS_LATENCY,
        VEHICLES_TRACKED,
        VEHICLES_EVICTED,
        MISSION_TRANSFERS,
        PARAMS_RECEIVED,
    ];
}

/// Describes all metrics. Call once after installing a recorder.
pub fn describe_metrics() {
    for metric in metric_defs::ALL {
        metric.describe();
    }
}

/// Installs a Prometheus recorder serving `/metrics` on `addr`, then
/// describes all metrics.
#[cfg(feature = "prometheus")]
pub fn install_prometheus(
    addr: std::net::SocketAddr,
) -> Result<(), metrics_exporter_prometheus::BuildError> {
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;
    describe_metrics();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metric_definitions() {
        assert_eq!(metric_defs::CODEC_FRAMES_DROPPED.name, "mavgc.codec.frames_dropped");
        assert_eq!(metric_defs::CODEC_FRAMES_DROPPED.kind, MetricKind::Counter);
        assert_eq!(metric_defs::CODEC_FRAMES_DROPPED.labels, &["reason"]);
        assert_eq!(metric_defs::VEHICLES_TRACKED.kind, MetricKind::Gauge);
        assert_eq!(metric_defs::RENDEZVOUS_LATENCY.unit, Some(Unit::Milliseconds));
    }

    #[test]
    fn test_all_names_unique() {
        let mut names: Vec<_> = metric_defs::ALL.iter().map(|m| m.name).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), metric_defs::ALL.len());
    }

    #[test]
    fn test_metric_minimal() {
        const MINIMAL: Metric = Metric::histogram("minimal");

        assert_eq!(MINIMAL.kind, MetricKind::Histogram);
        assert_eq!(MINIMAL.description, "");
        assert_eq!(MINIMAL.unit, None);
        assert_eq!(MINIMAL.labels, &[] as &[&str]);
    }

    #[test]
    fn test_describe_without_recorder() {
        describe_metrics();
    }
}
