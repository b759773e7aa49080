//! The message router.
//!
//! A [`Link`] owns everything shared between the dispatch path and the
//! operations: the outbound encoder, the caches and the rendezvous table.
//! Inbound frames are handled by [`Link::handle_frame`], which updates the
//! caches, offers the message to any in-flight operation and forwards it to
//! telemetry. Handling never waits on an operation, so operations must run
//! on threads other than the dispatcher.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;

use crossbeam_channel::Receiver;
use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, trace};

use mavgc_metrics::{metric_defs, metrics};
use mavgc_wire::{CodecStats, Frame, FrameCodec, FrameEncoder, Heartbeat, Message, Target};

use crate::config::LinkConfig;
use crate::error::{LinkError, LinkResult};
use crate::liveness::LivenessTracker;
use crate::logs::LogStore;
use crate::mission::MissionStore;
use crate::params::ParameterStore;
use crate::ports::{FrameSink, TelemetryEvent, TelemetrySink};
use crate::rendezvous::Rendezvous;

/// The last heartbeat received, with its sender.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct HeartbeatRecord {
    pub source: Target,
    pub heartbeat: Heartbeat,
}

/// Shared link state and the router.
pub struct Link {
    config: LinkConfig,
    encoder: Mutex<FrameEncoder>,
    sink: Arc<dyn FrameSink>,
    telemetry: Arc<dyn TelemetrySink>,
    pub(crate) rendezvous: Rendezvous,
    liveness: Arc<LivenessTracker>,
    params: ParameterStore,
    missions: MissionStore,
    logs: LogStore,
    last_heartbeat: Mutex<Option<HeartbeatRecord>>,
}

impl Link {
    pub fn new(
        config: LinkConfig,
        sink: Arc<dyn FrameSink>,
        telemetry: Arc<dyn TelemetrySink>,
    ) -> Self {
        Link {
            encoder: Mutex::new(FrameEncoder::new(
                config.gcs_system_id,
                config.gcs_component_id,
            )),
            liveness: Arc::new(LivenessTracker::new(&config.liveness)),
            config,
            sink,
            telemetry,
            rendezvous: Rendezvous::new(),
            params: ParameterStore::default(),
            missions: MissionStore::default(),
            logs: LogStore::default(),
            last_heartbeat: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &LinkConfig {
        &self.config
    }

    pub fn liveness(&self) -> &Arc<LivenessTracker> {
        &self.liveness
    }

    pub fn params(&self) -> &ParameterStore {
        &self.params
    }

    pub fn missions(&self) -> &MissionStore {
        &self.missions
    }

    pub fn logs(&self) -> &LogStore {
        &self.logs
    }

    pub fn telemetry(&self) -> &Arc<dyn TelemetrySink> {
        &self.telemetry
    }

    /// Encode and send one message.
    pub fn send(&self, message: &Message) -> LinkResult<()> {
        // Held across the sink write so sequence numbers leave in order.
        let mut encoder = self.encoder.lock();
        let bytes = encoder.encode(message)?;
        trace!("Link: tx {} {}", message.name(), hex::encode(&bytes));
        self.sink.send(&bytes)?;
        metrics::counter!(metric_defs::LINK_FRAMES_SENT.name, "message" => message.name())
            .increment(1);
        Ok(())
    }

    /// `explicit`, else the latched default target.
    pub fn resolve_target(&self, explicit: Option<Target>) -> LinkResult<Target> {
        explicit
            .or_else(|| self.liveness.default_target())
            .ok_or(LinkError::NoTarget)
    }

    /// Take the last heartbeat; a second call returns `None` until a new one arrives.
    pub fn take_heartbeat(&self) -> Option<HeartbeatRecord> {
        self.last_heartbeat.lock().take()
    }

    /// Route one decoded frame.
    pub fn handle_frame(&self, frame: Frame) {
        let source = Target::new(frame.system_id, frame.component_id);
        let message = frame.message;
        trace!("Link: rx {} from {} seq {}", message.name(), source, frame.seq);

        match &message {
            Message::Heartbeat(heartbeat) => {
                *self.last_heartbeat.lock() = Some(HeartbeatRecord {
                    source,
                    heartbeat: *heartbeat,
                });
                if let Some(target) = self.liveness.on_heartbeat(source, Instant::now()) {
                    self.telemetry.publish(TelemetryEvent::TargetLatched { target });
                }
            }
            Message::ParamValue(value) => self.params.record(value),
            Message::LogEntry(entry) => self.logs.record(entry),
            Message::MissionItemReached { seq } => {
                self.telemetry
                    .publish(TelemetryEvent::MissionItemReached { seq: *seq });
            }
            _ => {}
        }

        let delivered = self.rendezvous.offer(&message);
        if delivered > 0 {
            trace!("Link: {} delivered to {} waiter(s)", message.name(), delivered);
        }
        self.telemetry
            .publish(TelemetryEvent::Message { source, message });
    }

    /// Feed raw bytes through `codec` and route every complete frame.
    ///
    /// Returns the number of frames routed.
    pub fn handle_bytes(&self, codec: &mut FrameCodec, bytes: &[u8]) -> usize {
        trace!("Link: rx bytes {}", hex::encode(bytes));
        codec.push(bytes);
        let mut routed = 0;
        while let Some(frame) = codec.decode() {
            self.handle_frame(frame);
            routed += 1;
        }
        routed
    }
}

/// Start the dispatch thread: it owns a [`FrameCodec`] and routes every
/// byte chunk from `bytes` until the channel disconnects.
///
/// The thread returns the codec statistics when it ends.
pub fn spawn_dispatcher(
    link: Arc<Link>,
    bytes: Receiver<Vec<u8>>,
) -> LinkResult<JoinHandle<CodecStats>> {
    let handle = thread::Builder::new()
        .name("mavgc-dispatch".to_string())
        .spawn(move || {
            let mut codec = FrameCodec::new();
            for chunk in bytes.iter() {
                link.handle_bytes(&mut codec, &chunk);
            }
            let stats = codec.stats();
            debug!(
                "Link: dispatcher stopped, {} decoded, {} dropped",
                stats.frames_decoded,
                stats.dropped()
            );
            stats
        })?;
    Ok(handle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::NullTelemetry;
    use crate::rendezvous::CommandClass;
    use crossbeam_channel::{unbounded, Sender};
    use mavgc_wire::{encode_frame, CommandAck, ParamValue};
    use std::time::Duration;

    fn link() -> (Link, Receiver<Vec<u8>>) {
        let (tx, rx) = unbounded::<Vec<u8>>();
        let sink: Sender<Vec<u8>> = tx;
        (
            Link::new(LinkConfig::default(), Arc::new(sink), Arc::new(NullTelemetry)),
            rx,
        )
    }

    fn heartbeat() -> Message {
        Message::Heartbeat(Heartbeat {
            custom_mode: 5,
            mav_type: 2,
            autopilot: 3,
            base_mode: 0x51,
            system_status: 4,
            mavlink_version: 3,
        })
    }

    fn frame(system_id: u8, message: Message) -> Frame {
        Frame {
            seq: 0,
            system_id,
            component_id: 1,
            message,
        }
    }

    #[test]
    fn test_send_increments_sequence() {
        let (link, rx) = link();
        link.send(&Message::ParamRequestList(Target::new(1, 1))).unwrap();
        link.send(&Message::ParamRequestList(Target::new(1, 1))).unwrap();
        let first = rx.try_recv().unwrap();
        let second = rx.try_recv().unwrap();
        assert_eq!(first[2], 0);
        assert_eq!(second[2], 1);
        assert_eq!(first[3], 255);
        assert_eq!(first[4], 190);
    }

    #[test]
    fn test_heartbeat_latches_and_is_consumed_once() {
        let (link, _rx) = link();
        assert!(matches!(link.resolve_target(None), Err(LinkError::NoTarget)));
        link.handle_frame(frame(1, heartbeat()));
        assert_eq!(link.resolve_target(None).unwrap(), Target::new(1, 1));
        assert_eq!(
            link.resolve_target(Some(Target::new(4, 4))).unwrap(),
            Target::new(4, 4)
        );

        let record = link.take_heartbeat().unwrap();
        assert_eq!(record.source, Target::new(1, 1));
        assert_eq!(record.heartbeat.custom_mode, 5);
        assert!(link.take_heartbeat().is_none());
    }

    #[test]
    fn test_param_value_always_cached() {
        let (link, _rx) = link();
        link.handle_frame(frame(
            1,
            Message::ParamValue(ParamValue {
                param_value: 15.0,
                param_count: 300,
                param_index: 12,
                param_id: "RTL_ALT".into(),
                param_type: 9,
            }),
        ));
        assert_eq!(link.params().get("RTL_ALT").map(|p| p.value), Some(15.0));
    }

    #[test]
    fn test_handle_bytes_routes_to_waiter() {
        let (link, _rx) = link();
        let flight = link.rendezvous.claim(CommandClass::Command).unwrap();
        let bytes = encode_frame(
            1,
            1,
            1,
            &Message::CommandAck(CommandAck {
                command: 400,
                result: 0,
            }),
        )
        .unwrap();

        let mut codec = FrameCodec::new();
        assert_eq!(link.handle_bytes(&mut codec, &bytes[..4]), 0);
        assert_eq!(link.handle_bytes(&mut codec, &bytes[4..]), 1);
        let command = flight.wait_for(Duration::from_millis(10), |m| match m {
            Message::CommandAck(ack) => Some(ack.command),
            _ => None,
        });
        assert_eq!(command, Some(400));
    }

    #[test]
    fn test_dispatcher_returns_stats() {
        let (link, _rx) = link();
        let link = Arc::new(link);
        let (tx, rx) = unbounded::<Vec<u8>>();
        let handle = spawn_dispatcher(Arc::clone(&link), rx).unwrap();
        tx.send(encode_frame(0, 1, 1, &heartbeat()).unwrap()).unwrap();
        tx.send(vec![0xFE, 0x09, 0x00]).unwrap();
        drop(tx);
        let stats = handle.join().unwrap();
        assert_eq!(stats.frames_decoded, 1);
        assert!(link.liveness().is_tracked(1));
    }
}
