//! Mission download, upload, clear and set-current.
//!
//! All four share [`CommandClass::Mission`], so a stray `MISSION_ACK` can
//! never be taken for the answer to a different mission operation.

use std::time::Duration;

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use mavgc_metrics::{metric_defs, metrics};
use mavgc_wire::{
    Message, MissionAck, MissionCount, MissionItem, MissionResult, MissionSeq, Target,
    MAV_MISSION_ACCEPTED,
};

use crate::error::{LinkError, LinkResult};
use crate::link::Link;
use crate::ports::{MissionDirection, MissionSource, TelemetryEvent};
use crate::rendezvous::CommandClass;

/// The last successfully downloaded mission.
#[derive(Debug, Default)]
pub struct MissionStore {
    downloaded: Mutex<Option<Vec<MissionItem>>>,
}

impl MissionStore {
    /// The last complete download, if any.
    pub fn mission(&self) -> Option<Vec<MissionItem>> {
        self.downloaded.lock().clone()
    }

    fn store(&self, items: Vec<MissionItem>) {
        *self.downloaded.lock() = Some(items);
    }

    fn clear(&self) {
        *self.downloaded.lock() = None;
    }
}

/// Progress of one transfer.
#[derive(Debug, Clone, PartialEq)]
pub struct MissionSession {
    pub direction: MissionDirection,
    pub expected_count: u16,
    pub next_index: u16,
    pub items: Vec<MissionItem>,
    pub ack_result: Option<MissionResult>,
}

impl MissionSession {
    pub fn new(direction: MissionDirection, expected_count: u16) -> Self {
        MissionSession {
            direction,
            expected_count,
            next_index: 0,
            items: Vec::with_capacity(expected_count as usize),
            ack_result: None,
        }
    }

    /// Store a downloaded item, ignoring a repeat of the last one.
    ///
    /// Returns false for the repeat.
    pub fn store(&mut self, item: MissionItem) -> bool {
        if self.items.last().is_some_and(|last| last.seq == item.seq) {
            return false;
        }
        self.items.push(item);
        self.next_index = item.seq.saturating_add(1);
        true
    }

    pub fn is_complete(&self) -> bool {
        self.next_index >= self.expected_count
    }
}

/// What the vehicle said during an upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum UploadStep {
    Request(u16),
    Ack(u8),
}

fn upload_step(message: &Message) -> Option<UploadStep> {
    match message {
        Message::MissionRequest(request) => Some(UploadStep::Request(request.seq)),
        Message::MissionAck(ack) => Some(UploadStep::Ack(ack.result)),
        _ => None,
    }
}

fn record_transfer<T>(direction: MissionDirection, result: &LinkResult<T>) {
    let outcome = match result {
        Ok(_) => "ok",
        Err(LinkError::Timeout { .. }) => "timeout",
        Err(LinkError::MissionRejected(_)) => "rejected",
        Err(LinkError::Busy(_)) => "busy",
        Err(_) => "error",
    };
    metrics::counter!(
        metric_defs::MISSION_TRANSFERS.name,
        "direction" => direction.as_str(),
        "outcome" => outcome
    )
    .increment(1);
}

impl Link {
    /// Download the vehicle's mission.
    ///
    /// On success the mission replaces the stored one; on failure the
    /// stored mission is left untouched.
    pub fn download_mission(&self, target: Target) -> LinkResult<Vec<MissionItem>> {
        let result = self.download_inner(target);
        record_transfer(MissionDirection::Download, &result);
        result
    }

    fn download_inner(&self, target: Target) -> LinkResult<Vec<MissionItem>> {
        let flight = self.rendezvous.claim(CommandClass::Mission)?;
        let policy = self.config().command_policy();

        let count = flight.exchange(
            "mission count",
            policy,
            || self.send(&Message::MissionRequestList(target)),
            |m| match m {
                Message::MissionCount(count) => Some(count.count),
                _ => None,
            },
        )?;
        info!("Mission[{}]: downloading {} item(s)", target, count);

        let mut session = MissionSession::new(MissionDirection::Download, count);
        while !session.is_complete() {
            let seq = session.next_index;
            let item = flight.exchange(
                "mission item",
                policy,
                || self.send(&Message::MissionRequest(MissionSeq { seq, target })),
                |m| match m {
                    Message::MissionItem(item) if item.seq == seq => Some(*item),
                    Message::MissionItem(item) => {
                        debug!("Mission[{}]: ignoring item {} while waiting for {}", target, item.seq, seq);
                        None
                    }
                    _ => None,
                },
            )?;
            session.store(item);
        }

        self.send(&Message::MissionAck(MissionAck {
            target,
            result: MAV_MISSION_ACCEPTED,
        }))?;
        session.ack_result = Some(MissionResult::Accepted);
        self.missions().store(session.items.clone());
        info!("Mission[{}]: download complete", target);
        Ok(session.items)
    }

    /// Upload the mission held by `source`.
    ///
    /// Returns the vehicle's outcome when accepted, and
    /// [`LinkError::MissionRejected`] for any other outcome.
    pub fn upload_mission(
        &self,
        target: Target,
        source: &dyn MissionSource,
    ) -> LinkResult<MissionResult> {
        let result = self.upload_inner(target, source);
        record_transfer(MissionDirection::Upload, &result);
        result
    }

    fn upload_inner(&self, target: Target, source: &dyn MissionSource) -> LinkResult<MissionResult> {
        let flight = self.rendezvous.claim(CommandClass::Mission)?;
        let policy = self.config().command_policy();

        source.start();
        let count = (0..policy.attempts())
            .find_map(|_| source.count(policy.attempt_timeout))
            .ok_or(LinkError::Timeout {
                operation: "mission source count",
                attempts: policy.attempts(),
            })?;
        info!("Mission[{}]: uploading {} item(s)", target, count);

        let mut session = MissionSession::new(MissionDirection::Upload, count);
        let mut step = flight.exchange(
            "mission count",
            policy,
            || self.send(&Message::MissionCount(MissionCount { count, target })),
            upload_step,
        )?;

        // The vehicle drives the rest; each request restarts the ack window.
        let ack_window: Duration = self.config().upload_ack_window();
        let code = loop {
            match step {
                UploadStep::Ack(code) => break code,
                UploadStep::Request(seq) => {
                    let mut item = source
                        .item(seq)
                        .ok_or_else(|| LinkError::Source(format!("no mission item {}", seq)))?;
                    item.seq = seq;
                    item.target = target;
                    self.send(&Message::MissionItem(item))?;
                    session.next_index = seq.saturating_add(1);
                    debug!("Mission[{}]: sent item {}/{}", target, seq, count);
                }
            }
            step = flight.wait_for(ack_window, upload_step).ok_or(LinkError::Timeout {
                operation: "mission ack",
                attempts: 1,
            })?;
        };

        let result = MissionResult::from_code(code);
        session.ack_result = Some(result);
        source.finished(result);
        self.telemetry().publish(TelemetryEvent::MissionOutcome {
            direction: MissionDirection::Upload,
            result,
        });

        if result.is_accepted() {
            info!("Mission[{}]: upload accepted", target);
            Ok(result)
        } else {
            warn!("Mission[{}]: upload rejected with {}", target, result);
            Err(LinkError::MissionRejected(result))
        }
    }

    /// Remove every mission item on the vehicle.
    pub fn clear_mission(&self, target: Target) -> LinkResult<()> {
        let flight = self.rendezvous.claim(CommandClass::Mission)?;
        let code = flight.exchange(
            "mission clear",
            self.config().command_policy(),
            || self.send(&Message::MissionClearAll(target)),
            |m| match m {
                Message::MissionAck(ack) => Some(ack.result),
                _ => None,
            },
        )?;
        let result = MissionResult::from_code(code);
        if !result.is_accepted() {
            return Err(LinkError::MissionRejected(result));
        }
        self.missions().clear();
        Ok(())
    }

    /// Make `seq` the active waypoint.
    pub fn set_current_waypoint(&self, seq: u16, target: Target) -> LinkResult<()> {
        let flight = self.rendezvous.claim(CommandClass::Mission)?;
        flight.exchange(
            "mission set current",
            self.config().set_current_policy(),
            || self.send(&Message::MissionSetCurrent(MissionSeq { seq, target })),
            |m| match m {
                Message::MissionCurrent { seq: current } if *current == seq => Some(()),
                _ => None,
            },
        )
    }
}
