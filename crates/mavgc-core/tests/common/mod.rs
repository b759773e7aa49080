//! Simulated vehicle for integration tests.
//!
//! The vehicle reads every frame the link sends, answers the way an
//! ArduPilot autopilot would, and feeds its answers back through a real
//! dispatcher thread.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use parking_lot::Mutex;

use mavgc_core::{spawn_dispatcher, Link, LinkConfig, NullTelemetry};
use mavgc_wire::*;

/// Link configuration with short deadlines.
pub fn fast_config() -> LinkConfig {
    LinkConfig {
        attempt_timeout_ms: 100,
        retries: 2,
        set_current_retries: 2,
        param_list_window_ms: 400,
        upload_ack_window_ms: 400,
        log_settle_ms: 300,
        facade_timeout_ms: 5_000,
        ..LinkConfig::default()
    }
}

pub fn waypoint(seq: u16, lat: f32, lon: f32, alt: f32) -> MissionItem {
    MissionItem {
        seq,
        command: 16,
        frame: 3,
        autocontinue: 1,
        x: lat,
        y: lon,
        z: alt,
        ..MissionItem::default()
    }
}

/// How the simulated vehicle behaves.
#[derive(Debug, Clone, Default)]
pub struct SimConfig {
    pub mission: Vec<MissionItem>,
    /// Deliver this mission item twice.
    pub duplicate_item: Option<u16>,
    pub params: Vec<(String, f32)>,
    /// `MAV_RESULT` for `COMMAND_LONG`, by command id. Unlisted commands are accepted.
    pub command_results: HashMap<u16, u8>,
    /// `MAV_MISSION_RESULT` sent at the end of an upload.
    pub upload_result: u8,
    /// Never send the final MISSION_ACK of an upload.
    pub withhold_upload_ack: bool,
    /// After the last uploaded item, request one more instead of acking.
    pub overrun_upload: bool,
    pub logs: u16,
    /// Ignore the first N messages with a given id.
    pub ignore_first: HashMap<u8, usize>,
}

#[derive(Default)]
struct SimState {
    params: Vec<(String, f32)>,
    upload_count: u16,
    uploaded: Vec<MissionItem>,
    ignored: HashMap<u8, usize>,
}

pub struct SimVehicle {
    pub link: Arc<Link>,
    sent: Arc<Mutex<Vec<Message>>>,
    uploaded: Arc<Mutex<Vec<MissionItem>>>,
    to_link: Sender<Vec<u8>>,
    encoder: Arc<Mutex<FrameEncoder>>,
    stop: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl SimVehicle {
    pub fn start(config: LinkConfig, sim: SimConfig) -> Self {
        let (out_tx, out_rx) = unbounded::<Vec<u8>>();
        let (in_tx, in_rx) = unbounded::<Vec<u8>>();
        let link = Arc::new(Link::new(config, Arc::new(out_tx), Arc::new(NullTelemetry)));
        spawn_dispatcher(Arc::clone(&link), in_rx).expect("dispatcher");

        let sent = Arc::new(Mutex::new(Vec::new()));
        let uploaded = Arc::new(Mutex::new(Vec::new()));
        let encoder = Arc::new(Mutex::new(FrameEncoder::new(1, 1)));
        let stop = Arc::new(AtomicBool::new(false));

        let thread = {
            let sent = Arc::clone(&sent);
            let uploaded = Arc::clone(&uploaded);
            let encoder = Arc::clone(&encoder);
            let stop = Arc::clone(&stop);
            let to_link = in_tx.clone();
            thread::spawn(move || {
                run_vehicle(sim, out_rx, to_link, encoder, sent, uploaded, stop);
            })
        };

        SimVehicle {
            link,
            sent,
            uploaded,
            to_link: in_tx,
            encoder,
            stop,
            thread: Some(thread),
        }
    }

    /// Emit a heartbeat and wait until the link has latched a target.
    pub fn heartbeat(&self) {
        self.inject(&Message::Heartbeat(Heartbeat {
            custom_mode: 0,
            mav_type: 2,
            autopilot: 3,
            base_mode: 0x51,
            system_status: 4,
            mavlink_version: MAVLINK_VERSION,
        }));
        assert!(
            wait_until(Duration::from_secs(2), || self.link.liveness().is_tracked(1)),
            "heartbeat not routed"
        );
    }

    /// Send an unsolicited message to the link.
    pub fn inject(&self, message: &Message) {
        let bytes = self.encoder.lock().encode(message).expect("encode");
        self.to_link.send(bytes).expect("dispatcher alive");
    }

    /// Every message the link sent so far.
    pub fn sent(&self) -> Vec<Message> {
        self.sent.lock().clone()
    }

    pub fn sent_count(&self, pred: impl Fn(&Message) -> bool) -> usize {
        self.sent.lock().iter().filter(|m| pred(m)).count()
    }

    /// Items received during uploads.
    pub fn uploaded(&self) -> Vec<MissionItem> {
        self.uploaded.lock().clone()
    }
}

impl Drop for SimVehicle {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(handle) = self.thread.take() {
            let _ = handle.join();
        }
    }
}

/// Poll `cond` until it holds or `timeout` passes.
pub fn wait_until(timeout: Duration, mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    cond()
}

fn run_vehicle(
    sim: SimConfig,
    from_link: Receiver<Vec<u8>>,
    to_link: Sender<Vec<u8>>,
    encoder: Arc<Mutex<FrameEncoder>>,
    sent: Arc<Mutex<Vec<Message>>>,
    uploaded: Arc<Mutex<Vec<MissionItem>>>,
    stop: Arc<AtomicBool>,
) {
    let gcs = Target::new(255, 190);
    let mut codec = FrameCodec::new();
    let mut state = SimState {
        params: sim.params.clone(),
        ..SimState::default()
    };
    let reply = |message: Message| {
        let bytes = encoder.lock().encode(&message).expect("encode");
        let _ = to_link.send(bytes);
    };

    while !stop.load(Ordering::Relaxed) {
        let chunk = match from_link.recv_timeout(Duration::from_millis(20)) {
            Ok(chunk) => chunk,
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => break,
        };
        codec.push(&chunk);

        while let Some(frame) = codec.decode() {
            let message = frame.message;
            sent.lock().push(message.clone());

            let skip = sim.ignore_first.get(&message.id()).copied().unwrap_or(0);
            let ignored = state.ignored.entry(message.id()).or_insert(0);
            if *ignored < skip {
                *ignored += 1;
                continue;
            }

            match message {
                Message::MissionRequestList(_) => reply(Message::MissionCount(MissionCount {
                    count: sim.mission.len() as u16,
                    target: gcs,
                })),
                Message::MissionRequest(request) => {
                    if let Some(item) = sim.mission.get(request.seq as usize) {
                        let item = MissionItem {
                            seq: request.seq,
                            target: gcs,
                            ..*item
                        };
                        reply(Message::MissionItem(item));
                        if sim.duplicate_item == Some(request.seq) {
                            reply(Message::MissionItem(item));
                        }
                    }
                }
                Message::MissionCount(count) => {
                    state.upload_count = count.count;
                    state.uploaded.clear();
                    if count.count == 0 {
                        if !sim.withhold_upload_ack {
                            reply(Message::MissionAck(MissionAck {
                                target: gcs,
                                result: sim.upload_result,
                            }));
                        }
                    } else {
                        reply(Message::MissionRequest(MissionSeq { seq: 0, target: gcs }));
                    }
                }
                Message::MissionItem(item) => {
                    state.uploaded.push(item);
                    *uploaded.lock() = state.uploaded.clone();
                    let next = item.seq + 1;
                    if next < state.upload_count || (sim.overrun_upload && next == state.upload_count) {
                        reply(Message::MissionRequest(MissionSeq { seq: next, target: gcs }));
                    } else if !sim.withhold_upload_ack {
                        reply(Message::MissionAck(MissionAck {
                            target: gcs,
                            result: sim.upload_result,
                        }));
                    }
                }
                Message::MissionClearAll(_) => reply(Message::MissionAck(MissionAck {
                    target: gcs,
                    result: MAV_MISSION_ACCEPTED,
                })),
                Message::MissionSetCurrent(set) => {
                    reply(Message::MissionCurrent { seq: set.seq });
                }
                Message::ParamRequestList(_) => {
                    let count = state.params.len() as u16;
                    for (index, (name, value)) in state.params.iter().enumerate() {
                        reply(param_value(name, *value, index as u16, count));
                    }
                }
                Message::ParamRequestRead(read) => {
                    let count = state.params.len() as u16;
                    let found = state.params.iter().enumerate().find(|(index, (name, _))| {
                        if read.param_index >= 0 {
                            *index == read.param_index as usize
                        } else {
                            *name == read.param_id
                        }
                    });
                    if let Some((index, (name, value))) = found {
                        reply(param_value(name, *value, index as u16, count));
                    }
                }
                Message::ParamSet(set) => {
                    let count = state.params.len() as u16;
                    if let Some(index) = state.params.iter().position(|(n, _)| *n == set.param_id) {
                        state.params[index].1 = set.param_value;
                        reply(param_value(&set.param_id, set.param_value, index as u16, count));
                    }
                }
                Message::CommandLong(command) => reply(Message::CommandAck(CommandAck {
                    command: command.command,
                    result: sim.command_results.get(&command.command).copied().unwrap_or(0),
                })),
                Message::SetMode(_) => reply(Message::CommandAck(CommandAck {
                    command: u16::from(MSG_ID_SET_MODE),
                    result: MAV_RESULT_ACCEPTED,
                })),
                Message::SafetySetAllowedArea(set) => reply(Message::SafetyAllowedArea(set.area)),
                Message::SetGpsGlobalOrigin(origin) => {
                    reply(Message::GpsGlobalOrigin(GpsGlobalOrigin {
                        latitude: origin.latitude,
                        longitude: origin.longitude,
                        altitude: origin.altitude,
                    }))
                }
                Message::LogRequestList(_) => {
                    if sim.logs == 0 {
                        reply(log_entry(0, 0));
                    }
                    for id in 1..=sim.logs {
                        reply(log_entry(id, sim.logs));
                    }
                }
                _ => {}
            }
        }
    }
}

fn param_value(name: &str, value: f32, index: u16, count: u16) -> Message {
    Message::ParamValue(ParamValue {
        param_value: value,
        param_count: count,
        param_index: index,
        param_id: name.to_string(),
        param_type: 9,
    })
}

fn log_entry(id: u16, num_logs: u16) -> Message {
    Message::LogEntry(LogEntry {
        time_utc: 1_700_000_000 + u32::from(id),
        size: 1024 * u32::from(id),
        id,
        num_logs,
        last_log_num: num_logs,
    })
}
