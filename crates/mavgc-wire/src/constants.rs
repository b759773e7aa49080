//! Wire-level constants for the MAVLink v1 common dialect subset.

use mavlink::common::MavMessage as CommonMessage;
use mavlink::Message as _;

// ============================================================================
// Framing
// ============================================================================

/// Start-of-frame marker for MAVLink v1.
pub const STX: u8 = 0xFE;

/// Number of header bytes after the start marker (len, seq, sys, comp, msgid).
pub const HEADER_LEN: usize = 5;

/// Number of checksum bytes at the end of a frame.
pub const CHECKSUM_LEN: usize = 2;

/// Maximum payload length.
pub const MAX_PAYLOAD_LEN: usize = 255;

/// Smallest possible frame (empty payload).
pub const MIN_FRAME_LEN: usize = 1 + HEADER_LEN + CHECKSUM_LEN;

/// Largest possible frame.
pub const MAX_FRAME_LEN: usize = MIN_FRAME_LEN + MAX_PAYLOAD_LEN;

/// Protocol version advertised in heartbeats.
pub const MAVLINK_VERSION: u8 = 3;

// ============================================================================
// Message IDs
// ============================================================================

pub const MSG_ID_HEARTBEAT: u8 = 0;
pub const MSG_ID_SET_MODE: u8 = 11;
pub const MSG_ID_PARAM_REQUEST_READ: u8 = 20;
pub const MSG_ID_PARAM_REQUEST_LIST: u8 = 21;
pub const MSG_ID_PARAM_VALUE: u8 = 22;
pub const MSG_ID_PARAM_SET: u8 = 23;
pub const MSG_ID_MISSION_ITEM: u8 = 39;
pub const MSG_ID_MISSION_REQUEST: u8 = 40;
pub const MSG_ID_MISSION_SET_CURRENT: u8 = 41;
pub const MSG_ID_MISSION_CURRENT: u8 = 42;
pub const MSG_ID_MISSION_REQUEST_LIST: u8 = 43;
pub const MSG_ID_MISSION_COUNT: u8 = 44;
pub const MSG_ID_MISSION_CLEAR_ALL: u8 = 45;
pub const MSG_ID_MISSION_ITEM_REACHED: u8 = 46;
pub const MSG_ID_MISSION_ACK: u8 = 47;
pub const MSG_ID_SET_GPS_GLOBAL_ORIGIN: u8 = 48;
pub const MSG_ID_GPS_GLOBAL_ORIGIN: u8 = 49;
pub const MSG_ID_SAFETY_SET_ALLOWED_AREA: u8 = 54;
pub const MSG_ID_SAFETY_ALLOWED_AREA: u8 = 55;
pub const MSG_ID_REQUEST_DATA_STREAM: u8 = 66;
pub const MSG_ID_COMMAND_LONG: u8 = 76;
pub const MSG_ID_COMMAND_ACK: u8 = 77;
pub const MSG_ID_LOG_REQUEST_LIST: u8 = 117;
pub const MSG_ID_LOG_ENTRY: u8 = 118;

/// Messages this crate encodes and decodes, with their v1 payload length.
///
/// Extension fields are not part of a v1 payload.
const MESSAGE_TABLE: &[(u8, usize)] = &[
    (MSG_ID_HEARTBEAT, 9),
    (MSG_ID_SET_MODE, 6),
    (MSG_ID_PARAM_REQUEST_READ, 20),
    (MSG_ID_PARAM_REQUEST_LIST, 2),
    (MSG_ID_PARAM_VALUE, 25),
    (MSG_ID_PARAM_SET, 23),
    (MSG_ID_MISSION_ITEM, 37),
    (MSG_ID_MISSION_REQUEST, 4),
    (MSG_ID_MISSION_SET_CURRENT, 4),
    (MSG_ID_MISSION_CURRENT, 2),
    (MSG_ID_MISSION_REQUEST_LIST, 2),
    (MSG_ID_MISSION_COUNT, 4),
    (MSG_ID_MISSION_CLEAR_ALL, 2),
    (MSG_ID_MISSION_ITEM_REACHED, 2),
    (MSG_ID_MISSION_ACK, 3),
    (MSG_ID_SET_GPS_GLOBAL_ORIGIN, 13),
    (MSG_ID_GPS_GLOBAL_ORIGIN, 12),
    (MSG_ID_SAFETY_SET_ALLOWED_AREA, 27),
    (MSG_ID_SAFETY_ALLOWED_AREA, 25),
    (MSG_ID_REQUEST_DATA_STREAM, 6),
    (MSG_ID_COMMAND_LONG, 33),
    (MSG_ID_COMMAND_ACK, 3),
    (MSG_ID_LOG_REQUEST_LIST, 6),
    (MSG_ID_LOG_ENTRY, 14),
];

/// Look up the CRC extra byte for a message id. `None` for unknown ids.
///
/// The byte is folded into the checksum so that sender and receiver agree
/// on the field layout; it comes from the common dialect definitions.
pub fn crc_extra(msg_id: u8) -> Option<u8> {
    payload_len(msg_id).map(|_| CommonMessage::extra_crc(u32::from(msg_id)))
}

/// Look up the v1 payload length for a message id.
pub fn payload_len(msg_id: u8) -> Option<usize> {
    MESSAGE_TABLE
        .iter()
        .find(|(id, _)| *id == msg_id)
        .map(|(_, len)| *len)
}

/// Ids of every message this crate knows.
pub fn known_message_ids() -> impl Iterator<Item = u8> {
    MESSAGE_TABLE.iter().map(|(id, _)| *id)
}

// ============================================================================
// Commands (MAV_CMD)
// ============================================================================

pub const MAV_CMD_DO_SET_MODE: u16 = 176;
pub const MAV_CMD_PREFLIGHT_REBOOT_SHUTDOWN: u16 = 246;
pub const MAV_CMD_COMPONENT_ARM_DISARM: u16 = 400;

/// Magic param2 value that forces arming/disarming regardless of checks.
pub const ARM_FORCE_MAGIC: f32 = 21196.0;

// ============================================================================
// Enumerations
// ============================================================================

/// `MAV_RESULT_ACCEPTED`.
pub const MAV_RESULT_ACCEPTED: u8 = 0;

/// `MAV_MODE_FLAG_CUSTOM_MODE_ENABLED`.
pub const MAV_MODE_FLAG_CUSTOM_MODE_ENABLED: u8 = 1;

/// `MAV_MISSION_ACCEPTED`.
pub const MAV_MISSION_ACCEPTED: u8 = 0;

/// `MAV_TYPE_GCS`.
pub const MAV_TYPE_GCS: u8 = 6;

/// `MAV_AUTOPILOT_INVALID`.
pub const MAV_AUTOPILOT_INVALID: u8 = 8;

/// Length of a parameter id on the wire (null padded).
pub const PARAM_ID_LEN: usize = 16;
