//! Typed messages and their payload layouts.
//!
//! Fields are laid out the way MAVLink v1 serializes them: sorted by type
//! size (largest first), little endian, arrays last within their size class.
//! Decoding zero-extends short payloads, so a truncated payload never panics.

use bytes::{Buf, BufMut};
use serde::Serialize;

use crate::constants::*;
use crate::error::{WireError, WireResult};
use crate::types::{decode_param_id, encode_param_id, Target};

// ============================================================================
// Payload structs
// ============================================================================

/// Periodic liveness message.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Heartbeat {
    pub custom_mode: u32,
    pub mav_type: u8,
    pub autopilot: u8,
    pub base_mode: u8,
    pub system_status: u8,
    pub mavlink_version: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SetMode {
    pub custom_mode: u32,
    pub target_system: u8,
    pub base_mode: u8,
}

/// Read a single parameter by index, or by name when `param_index` is -1.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParamRequestRead {
    pub param_index: i16,
    pub target: Target,
    pub param_id: String,
}

/// One parameter as reported by the vehicle.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParamValue {
    pub param_value: f32,
    /// Total number of parameters on the vehicle.
    pub param_count: u16,
    pub param_index: u16,
    pub param_id: String,
    pub param_type: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParamSet {
    pub param_value: f32,
    pub target: Target,
    pub param_id: String,
    pub param_type: u8,
}

/// One mission entry. `x`/`y`/`z` are lat/lon/alt for global frames.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct MissionItem {
    pub param1: f32,
    pub param2: f32,
    pub param3: f32,
    pub param4: f32,
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub seq: u16,
    pub command: u16,
    pub target: Target,
    pub frame: u8,
    pub current: u8,
    pub autocontinue: u8,
}

/// Sequence-addressed mission message (`MISSION_REQUEST`, `MISSION_SET_CURRENT`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MissionSeq {
    pub seq: u16,
    pub target: Target,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MissionCount {
    pub count: u16,
    pub target: Target,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MissionAck {
    pub target: Target,
    /// Raw `MAV_MISSION_RESULT` code.
    pub result: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SetGpsGlobalOrigin {
    /// Degrees * 1e7.
    pub latitude: i32,
    /// Degrees * 1e7.
    pub longitude: i32,
    /// Millimeters.
    pub altitude: i32,
    pub target_system: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct GpsGlobalOrigin {
    pub latitude: i32,
    pub longitude: i32,
    pub altitude: i32,
}

/// Axis-aligned safety box, corner 1 and corner 2.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AllowedArea {
    pub p1x: f32,
    pub p1y: f32,
    pub p1z: f32,
    pub p2x: f32,
    pub p2y: f32,
    pub p2z: f32,
    pub frame: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SafetySetAllowedArea {
    pub area: AllowedArea,
    pub target: Target,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RequestDataStream {
    pub req_message_rate: u16,
    pub target: Target,
    pub req_stream_id: u8,
    pub start_stop: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CommandLong {
    pub params: [f32; 7],
    pub command: u16,
    pub target: Target,
    pub confirmation: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CommandAck {
    pub command: u16,
    /// Raw `MAV_RESULT` code.
    pub result: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LogRequestList {
    pub start: u16,
    pub end: u16,
    pub target: Target,
}

/// One onboard log as listed by the vehicle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LogEntry {
    pub time_utc: u32,
    pub size: u32,
    pub id: u16,
    pub num_logs: u16,
    pub last_log_num: u16,
}

// ============================================================================
// Message union
// ============================================================================

/// A decoded message of the supported dialect subset.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "message", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Message {
    Heartbeat(Heartbeat),
    SetMode(SetMode),
    ParamRequestRead(ParamRequestRead),
    ParamRequestList(Target),
    ParamValue(ParamValue),
    ParamSet(ParamSet),
    MissionItem(MissionItem),
    MissionRequest(MissionSeq),
    MissionSetCurrent(MissionSeq),
    MissionCurrent { seq: u16 },
    MissionRequestList(Target),
    MissionCount(MissionCount),
    MissionClearAll(Target),
    MissionItemReached { seq: u16 },
    MissionAck(MissionAck),
    SetGpsGlobalOrigin(SetGpsGlobalOrigin),
    GpsGlobalOrigin(GpsGlobalOrigin),
    SafetySetAllowedArea(SafetySetAllowedArea),
    SafetyAllowedArea(AllowedArea),
    RequestDataStream(RequestDataStream),
    CommandLong(CommandLong),
    CommandAck(CommandAck),
    LogRequestList(LogRequestList),
    LogEntry(LogEntry),
}

impl Message {
    /// The wire message id.
    pub fn id(&self) -> u8 {
        match self {
            Message::Heartbeat(_) => MSG_ID_HEARTBEAT,
            Message::SetMode(_) => MSG_ID_SET_MODE,
            Message::ParamRequestRead(_) => MSG_ID_PARAM_REQUEST_READ,
            Message::ParamRequestList(_) => MSG_ID_PARAM_REQUEST_LIST,
            Message::ParamValue(_) => MSG_ID_PARAM_VALUE,
            Message::ParamSet(_) => MSG_ID_PARAM_SET,
            Message::MissionItem(_) => MSG_ID_MISSION_ITEM,
            Message::MissionRequest(_) => MSG_ID_MISSION_REQUEST,
            Message::MissionSetCurrent(_) => MSG_ID_MISSION_SET_CURRENT,
            Message::MissionCurrent { .. } => MSG_ID_MISSION_CURRENT,
            Message::MissionRequestList(_) => MSG_ID_MISSION_REQUEST_LIST,
            Message::MissionCount(_) => MSG_ID_MISSION_COUNT,
            Message::MissionClearAll(_) => MSG_ID_MISSION_CLEAR_ALL,
            Message::MissionItemReached { .. } => MSG_ID_MISSION_ITEM_REACHED,
            Message::MissionAck(_) => MSG_ID_MISSION_ACK,
            Message::SetGpsGlobalOrigin(_) => MSG_ID_SET_GPS_GLOBAL_ORIGIN,
            Message::GpsGlobalOrigin(_) => MSG_ID_GPS_GLOBAL_ORIGIN,
            Message::SafetySetAllowedArea(_) => MSG_ID_SAFETY_SET_ALLOWED_AREA,
            Message::SafetyAllowedArea(_) => MSG_ID_SAFETY_ALLOWED_AREA,
            Message::RequestDataStream(_) => MSG_ID_REQUEST_DATA_STREAM,
            Message::CommandLong(_) => MSG_ID_COMMAND_LONG,
            Message::CommandAck(_) => MSG_ID_COMMAND_ACK,
            Message::LogRequestList(_) => MSG_ID_LOG_REQUEST_LIST,
            Message::LogEntry(_) => MSG_ID_LOG_ENTRY,
        }
    }

    /// Short upper-case name, used in logs and metric labels.
    pub fn name(&self) -> &'static str {
        match self {
            Message::Heartbeat(_) => "HEARTBEAT",
            Message::SetMode(_) => "SET_MODE",
            Message::ParamRequestRead(_) => "PARAM_REQUEST_READ",
            Message::ParamRequestList(_) => "PARAM_REQUEST_LIST",
            Message::ParamValue(_) => "PARAM_VALUE",
            Message::ParamSet(_) => "PARAM_SET",
            Message::MissionItem(_) => "MISSION_ITEM",
            Message::MissionRequest(_) => "MISSION_REQUEST",
            Message::MissionSetCurrent(_) => "MISSION_SET_CURRENT",
            Message::MissionCurrent { .. } => "MISSION_CURRENT",
            Message::MissionRequestList(_) => "MISSION_REQUEST_LIST",
            Message::MissionCount(_) => "MISSION_COUNT",
            Message::MissionClearAll(_) => "MISSION_CLEAR_ALL",
            Message::MissionItemReached { .. } => "MISSION_ITEM_REACHED",
            Message::MissionAck(_) => "MISSION_ACK",
            Message::SetGpsGlobalOrigin(_) => "SET_GPS_GLOBAL_ORIGIN",
            Message::GpsGlobalOrigin(_) => "GPS_GLOBAL_ORIGIN",
            Message::SafetySetAllowedArea(_) => "SAFETY_SET_ALLOWED_AREA",
            Message::SafetyAllowedArea(_) => "SAFETY_ALLOWED_AREA",
            Message::RequestDataStream(_) => "REQUEST_DATA_STREAM",
            Message::CommandLong(_) => "COMMAND_LONG",
            Message::CommandAck(_) => "COMMAND_ACK",
            Message::LogRequestList(_) => "LOG_REQUEST_LIST",
            Message::LogEntry(_) => "LOG_ENTRY",
        }
    }

    /// Serialize the payload (without framing).
    pub fn encode_payload(&self) -> WireResult<Vec<u8>> {
        let mut buf = Vec::with_capacity(payload_len(self.id()).unwrap_or(0));
        match self {
            Message::Heartbeat(m) => {
                buf.put_u32_le(m.custom_mode);
                buf.put_u8(m.mav_type);
                buf.put_u8(m.autopilot);
                buf.put_u8(m.base_mode);
                buf.put_u8(m.system_status);
                buf.put_u8(m.mavlink_version);
            }
            Message::SetMode(m) => {
                buf.put_u32_le(m.custom_mode);
                buf.put_u8(m.target_system);
                buf.put_u8(m.base_mode);
            }
            Message::ParamRequestRead(m) => {
                buf.put_i16_le(m.param_index);
                put_target(&mut buf, m.target);
                // An index read carries an empty id.
                if m.param_id.is_empty() {
                    buf.put_bytes(0, PARAM_ID_LEN);
                } else {
                    buf.put_slice(&encode_param_id(&m.param_id)?);
                }
            }
            Message::ParamRequestList(t)
            | Message::MissionRequestList(t)
            | Message::MissionClearAll(t) => put_target(&mut buf, *t),
            Message::ParamValue(m) => {
                buf.put_f32_le(m.param_value);
                buf.put_u16_le(m.param_count);
                buf.put_u16_le(m.param_index);
                buf.put_slice(&encode_param_id(&m.param_id)?);
                buf.put_u8(m.param_type);
            }
            Message::ParamSet(m) => {
                buf.put_f32_le(m.param_value);
                put_target(&mut buf, m.target);
                buf.put_slice(&encode_param_id(&m.param_id)?);
                buf.put_u8(m.param_type);
            }
            Message::MissionItem(m) => {
                for value in [m.param1, m.param2, m.param3, m.param4, m.x, m.y, m.z] {
                    buf.put_f32_le(value);
                }
                buf.put_u16_le(m.seq);
                buf.put_u16_le(m.command);
                put_target(&mut buf, m.target);
                buf.put_u8(m.frame);
                buf.put_u8(m.current);
                buf.put_u8(m.autocontinue);
            }
            Message::MissionRequest(m) | Message::MissionSetCurrent(m) => {
                buf.put_u16_le(m.seq);
                put_target(&mut buf, m.target);
            }
            Message::MissionCurrent { seq } | Message::MissionItemReached { seq } => {
                buf.put_u16_le(*seq);
            }
            Message::MissionCount(m) => {
                buf.put_u16_le(m.count);
                put_target(&mut buf, m.target);
            }
            Message::MissionAck(m) => {
                put_target(&mut buf, m.target);
                buf.put_u8(m.result);
            }
            Message::SetGpsGlobalOrigin(m) => {
                buf.put_i32_le(m.latitude);
                buf.put_i32_le(m.longitude);
                buf.put_i32_le(m.altitude);
                buf.put_u8(m.target_system);
            }
            Message::GpsGlobalOrigin(m) => {
                buf.put_i32_le(m.latitude);
                buf.put_i32_le(m.longitude);
                buf.put_i32_le(m.altitude);
            }
            Message::SafetySetAllowedArea(m) => {
                put_area_corners(&mut buf, &m.area);
                put_target(&mut buf, m.target);
                buf.put_u8(m.area.frame);
            }
            Message::SafetyAllowedArea(area) => {
                put_area_corners(&mut buf, area);
                buf.put_u8(area.frame);
            }
            Message::RequestDataStream(m) => {
                buf.put_u16_le(m.req_message_rate);
                put_target(&mut buf, m.target);
                buf.put_u8(m.req_stream_id);
                buf.put_u8(m.start_stop);
            }
            Message::CommandLong(m) => {
                for param in m.params {
                    buf.put_f32_le(param);
                }
                buf.put_u16_le(m.command);
                put_target(&mut buf, m.target);
                buf.put_u8(m.confirmation);
            }
            Message::CommandAck(m) => {
                buf.put_u16_le(m.command);
                buf.put_u8(m.result);
            }
            Message::LogRequestList(m) => {
                buf.put_u16_le(m.start);
                buf.put_u16_le(m.end);
                put_target(&mut buf, m.target);
            }
            Message::LogEntry(m) => {
                buf.put_u32_le(m.time_utc);
                buf.put_u32_le(m.size);
                buf.put_u16_le(m.id);
                buf.put_u16_le(m.num_logs);
                buf.put_u16_le(m.last_log_num);
            }
        }
        Ok(buf)
    }

    /// Decode a payload for the given message id.
    pub fn decode(msg_id: u8, payload: &[u8]) -> WireResult<Message> {
        let nominal = payload_len(msg_id).ok_or(WireError::UnknownMessage(msg_id))?;
        if payload.len() > MAX_PAYLOAD_LEN {
            return Err(WireError::PayloadTooLong {
                msg_id,
                len: payload.len(),
                max: MAX_PAYLOAD_LEN,
            });
        }

        // Zero-extend so every read below stays in bounds.
        let mut padded = payload.to_vec();
        if padded.len() < nominal {
            padded.resize(nominal, 0);
        }
        let mut buf = &padded[..];

        let message = match msg_id {
            MSG_ID_HEARTBEAT => Message::Heartbeat(Heartbeat {
                custom_mode: buf.get_u32_le(),
                mav_type: buf.get_u8(),
                autopilot: buf.get_u8(),
                base_mode: buf.get_u8(),
                system_status: buf.get_u8(),
                mavlink_version: buf.get_u8(),
            }),
            MSG_ID_SET_MODE => Message::SetMode(SetMode {
                custom_mode: buf.get_u32_le(),
                target_system: buf.get_u8(),
                base_mode: buf.get_u8(),
            }),
            MSG_ID_PARAM_REQUEST_READ => Message::ParamRequestRead(ParamRequestRead {
                param_index: buf.get_i16_le(),
                target: get_target(&mut buf),
                param_id: get_param_id(&mut buf),
            }),
            MSG_ID_PARAM_REQUEST_LIST => Message::ParamRequestList(get_target(&mut buf)),
            MSG_ID_PARAM_VALUE => Message::ParamValue(ParamValue {
                param_value: buf.get_f32_le(),
                param_count: buf.get_u16_le(),
                param_index: buf.get_u16_le(),
                param_id: get_param_id(&mut buf),
                param_type: buf.get_u8(),
            }),
            MSG_ID_PARAM_SET => Message::ParamSet(ParamSet {
                param_value: buf.get_f32_le(),
                target: get_target(&mut buf),
                param_id: get_param_id(&mut buf),
                param_type: buf.get_u8(),
            }),
            MSG_ID_MISSION_ITEM => Message::MissionItem(MissionItem {
                param1: buf.get_f32_le(),
                param2: buf.get_f32_le(),
                param3: buf.get_f32_le(),
                param4: buf.get_f32_le(),
                x: buf.get_f32_le(),
                y: buf.get_f32_le(),
                z: buf.get_f32_le(),
                seq: buf.get_u16_le(),
                command: buf.get_u16_le(),
                target: get_target(&mut buf),
                frame: buf.get_u8(),
                current: buf.get_u8(),
                autocontinue: buf.get_u8(),
            }),
            MSG_ID_MISSION_REQUEST => Message::MissionRequest(get_mission_seq(&mut buf)),
            MSG_ID_MISSION_SET_CURRENT => Message::MissionSetCurrent(get_mission_seq(&mut buf)),
            MSG_ID_MISSION_CURRENT => Message::MissionCurrent { seq: buf.get_u16_le() },
            MSG_ID_MISSION_REQUEST_LIST => Message::MissionRequestList(get_target(&mut buf)),
            MSG_ID_MISSION_COUNT => Message::MissionCount(MissionCount {
                count: buf.get_u16_le(),
                target: get_target(&mut buf),
            }),
            MSG_ID_MISSION_CLEAR_ALL => Message::MissionClearAll(get_target(&mut buf)),
            MSG_ID_MISSION_ITEM_REACHED => Message::MissionItemReached { seq: buf.get_u16_le() },
            MSG_ID_MISSION_ACK => Message::MissionAck(MissionAck {
                target: get_target(&mut buf),
                result: buf.get_u8(),
            }),
            MSG_ID_SET_GPS_GLOBAL_ORIGIN => Message::SetGpsGlobalOrigin(SetGpsGlobalOrigin {
                latitude: buf.get_i32_le(),
                longitude: buf.get_i32_le(),
                altitude: buf.get_i32_le(),
                target_system: buf.get_u8(),
            }),
            MSG_ID_GPS_GLOBAL_ORIGIN => Message::GpsGlobalOrigin(GpsGlobalOrigin {
                latitude: buf.get_i32_le(),
                longitude: buf.get_i32_le(),
                altitude: buf.get_i32_le(),
            }),
            MSG_ID_SAFETY_SET_ALLOWED_AREA => {
                let corners = get_area_corners(&mut buf);
                let target = get_target(&mut buf);
                let frame = buf.get_u8();
                Message::SafetySetAllowedArea(SafetySetAllowedArea {
                    area: area_from(corners, frame),
                    target,
                })
            }
            MSG_ID_SAFETY_ALLOWED_AREA => {
                let corners = get_area_corners(&mut buf);
                let frame = buf.get_u8();
                Message::SafetyAllowedArea(area_from(corners, frame))
            }
            MSG_ID_REQUEST_DATA_STREAM => Message::RequestDataStream(RequestDataStream {
                req_message_rate: buf.get_u16_le(),
                target: get_target(&mut buf),
                req_stream_id: buf.get_u8(),
                start_stop: buf.get_u8(),
            }),
            MSG_ID_COMMAND_LONG => {
                let mut params = [0f32; 7];
                for param in params.iter_mut() {
                    *param = buf.get_f32_le();
                }
                Message::CommandLong(CommandLong {
                    params,
                    command: buf.get_u16_le(),
                    target: get_target(&mut buf),
                    confirmation: buf.get_u8(),
                })
            }
            MSG_ID_COMMAND_ACK => Message::CommandAck(CommandAck {
                command: buf.get_u16_le(),
                result: buf.get_u8(),
            }),
            MSG_ID_LOG_REQUEST_LIST => Message::LogRequestList(LogRequestList {
                start: buf.get_u16_le(),
                end: buf.get_u16_le(),
                target: get_target(&mut buf),
            }),
            MSG_ID_LOG_ENTRY => Message::LogEntry(LogEntry {
                time_utc: buf.get_u32_le(),
                size: buf.get_u32_le(),
                id: buf.get_u16_le(),
                num_logs: buf.get_u16_le(),
                last_log_num: buf.get_u16_le(),
            }),
            other => return Err(WireError::UnknownMessage(other)),
        };
        Ok(message)
    }
}

// ============================================================================
// Field helpers
// ============================================================================

fn put_target(buf: &mut Vec<u8>, target: Target) {
    buf.put_u8(target.system);
    buf.put_u8(target.component);
}

fn get_target(buf: &mut &[u8]) -> Target {
    let system = buf.get_u8();
    let component = buf.get_u8();
    Target { system, component }
}

fn get_mission_seq(buf: &mut &[u8]) -> MissionSeq {
    let seq = buf.get_u16_le();
    MissionSeq {
        seq,
        target: get_target(buf),
    }
}

fn get_param_id(buf: &mut &[u8]) -> String {
    let mut id = [0u8; PARAM_ID_LEN];
    buf.copy_to_slice(&mut id);
    decode_param_id(&id)
}

fn put_area_corners(buf: &mut Vec<u8>, area: &AllowedArea) {
    for value in [area.p1x, area.p1y, area.p1z, area.p2x, area.p2y, area.p2z] {
        buf.put_f32_le(value);
    }
}

fn get_area_corners(buf: &mut &[u8]) -> [f32; 6] {
    let mut corners = [0f32; 6];
    for corner in corners.iter_mut() {
        *corner = buf.get_f32_le();
    }
    corners
}

fn area_from(corners: [f32; 6], frame: u8) -> AllowedArea {
    let [p1x, p1y, p1z, p2x, p2y, p2z] = corners;
    AllowedArea {
        p1x,
        p1y,
        p1z,
        p2x,
        p2y,
        p2z,
        frame,
    }
}
