//! Shared value types: targets, mission results, flight modes, parameter ids.

use serde::{Deserialize, Serialize};

use crate::constants::PARAM_ID_LEN;
use crate::error::{WireError, WireResult};

/// A (system, component) address on the link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Target {
    /// System id (vehicle).
    pub system: u8,
    /// Component id (autopilot, camera, ...).
    pub component: u8,
}

impl Target {
    /// Create a target address.
    pub const fn new(system: u8, component: u8) -> Self {
        Target { system, component }
    }
}

impl std::fmt::Display for Target {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.system, self.component)
    }
}

// ============================================================================
// Mission results
// ============================================================================

/// Outcome carried by a `MISSION_ACK`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MissionResult {
    Accepted,
    Error,
    UnsupportedFrame,
    Unsupported,
    NoSpace,
    Invalid,
    InvalidParam1,
    InvalidParam2,
    InvalidParam3,
    InvalidParam4,
    InvalidParam5X,
    InvalidParam6Y,
    InvalidParam7,
    InvalidSequence,
    /// Vehicle refuses mission commands from this partner.
    EnumEnd,
    /// Any code outside the known table.
    Unknown(u8),
}

/// Numeric code to result, in code order.
const MISSION_RESULTS: [(MissionResult, &str); 15] = [
    (MissionResult::Accepted, "MISSION_ACCEPTED"),
    (MissionResult::Error, "MISSION_ERROR"),
    (MissionResult::UnsupportedFrame, "MISSION_UNSUPPORTED_FRAME"),
    (MissionResult::Unsupported, "MISSION_UNSUPPORTED"),
    (MissionResult::NoSpace, "MISSION_NO_SPACE"),
    (MissionResult::Invalid, "MISSION_INVALID"),
    (MissionResult::InvalidParam1, "MISSION_INVALID_PARAM1"),
    (MissionResult::InvalidParam2, "MISSION_INVALID_PARAM2"),
    (MissionResult::InvalidParam3, "MISSION_INVALID_PARAM3"),
    (MissionResult::InvalidParam4, "MISSION_INVALID_PARAM4"),
    (MissionResult::InvalidParam5X, "MISSION_INVALID_PARAM5_X"),
    (MissionResult::InvalidParam6Y, "MISSION_INVALID_PARAM6_Y"),
    (MissionResult::InvalidParam7, "MISSION_INVALID_PARAM7"),
    (MissionResult::InvalidSequence, "MISSION_INVALID_SEQUENCE"),
    (MissionResult::EnumEnd, "MISSION_RESULT_ENUM_END"),
];

impl MissionResult {
    /// Map a wire code to a result.
    pub fn from_code(code: u8) -> Self {
        MISSION_RESULTS
            .get(code as usize)
            .map(|(result, _)| *result)
            .unwrap_or(MissionResult::Unknown(code))
    }

    /// The wire code.
    pub fn code(&self) -> u8 {
        match self {
            MissionResult::Unknown(code) => *code,
            known => MISSION_RESULTS
                .iter()
                .position(|(result, _)| result == known)
                .map_or(u8::MAX, |idx| idx as u8),
        }
    }

    /// Outcome tag reported to the mission source.
    pub fn name(&self) -> &'static str {
        match self {
            MissionResult::Unknown(_) => "MISSION_RESULT_UNKNOWN",
            known => MISSION_RESULTS
                .iter()
                .find(|(result, _)| result == known)
                .map_or("MISSION_RESULT_UNKNOWN", |(_, name)| name),
        }
    }

    /// Whether the vehicle accepted the mission.
    pub fn is_accepted(&self) -> bool {
        matches!(self, MissionResult::Accepted)
    }
}

impl std::fmt::Display for MissionResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

// ============================================================================
// Flight modes
// ============================================================================

/// ArduCopter custom modes, addressed by name in `SET_MODE`.
pub const FLIGHT_MODES: &[(&str, u32)] = &[
    ("STABILIZE", 0),
    ("ACRO", 1),
    ("ALT_HOLD", 2),
    ("AUTO", 3),
    ("GUIDED", 4),
    ("LOITER", 5),
    ("RTL", 6),
    ("CIRCLE", 7),
    ("LAND", 9),
    ("DRIFT", 11),
    ("SPORT", 13),
    ("FLIP", 14),
    ("AUTOTUNE", 15),
    ("POSHOLD", 16),
    ("BRAKE", 17),
];

/// Resolve a mode name (case-insensitive) or a raw numeric custom mode.
pub fn custom_mode(name: &str) -> Option<u32> {
    let name = name.trim();
    FLIGHT_MODES
        .iter()
        .find(|(mode, _)| mode.eq_ignore_ascii_case(name))
        .map(|(_, value)| *value)
        .or_else(|| name.parse().ok())
}

/// Name of a custom mode, if it is in the table.
pub fn mode_name(custom_mode: u32) -> Option<&'static str> {
    FLIGHT_MODES
        .iter()
        .find(|(_, value)| *value == custom_mode)
        .map(|(mode, _)| *mode)
}

// ============================================================================
// Parameter ids
// ============================================================================

/// Pack a parameter name into its 16-byte, null-padded wire form.
///
/// A name of exactly 16 bytes carries no terminator.
pub fn encode_param_id(name: &str) -> WireResult<[u8; PARAM_ID_LEN]> {
    if name.is_empty() || name.len() > PARAM_ID_LEN || !name.is_ascii() {
        return Err(WireError::InvalidParamId(name.to_string()));
    }
    let mut id = [0u8; PARAM_ID_LEN];
    id[..name.len()].copy_from_slice(name.as_bytes());
    Ok(id)
}

/// Unpack a wire parameter id, stopping at the first null.
pub fn decode_param_id(id: &[u8; PARAM_ID_LEN]) -> String {
    let end = id.iter().position(|&b| b == 0).unwrap_or(PARAM_ID_LEN);
    String::from_utf8_lossy(&id[..end]).into_owned()
}
