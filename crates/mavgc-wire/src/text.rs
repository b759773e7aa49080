//! Text records exchanged with file-backed collaborators.
//!
//! Mission lines carry 12 fields: `index current frame command param1..4
//! x y z autocontinue`, separated by tabs, commas or spaces. Parameter lines
//! are `<name> <value>`.

use crate::error::{WireError, WireResult};
use crate::messages::MissionItem;
use crate::types::Target;

/// Header line of a waypoint file.
pub const WAYPOINT_FILE_HEADER: &str = "QGC WPL 110";

const MISSION_FIELDS: usize = 12;

fn split_fields(line: &str) -> Vec<&str> {
    line.split(|c: char| c == ',' || c.is_whitespace())
        .filter(|field| !field.is_empty())
        .collect()
}

fn parse_field<T: std::str::FromStr>(field: &'static str, value: &str) -> WireResult<T> {
    value.parse().map_err(|_| WireError::InvalidField {
        field,
        value: value.to_string(),
    })
}

/// Parse one mission line. The target is left at 0/0 for the sender to fill in.
pub fn parse_mission_line(line: &str) -> WireResult<MissionItem> {
    let fields = split_fields(line);
    if fields.len() != MISSION_FIELDS {
        return Err(WireError::FieldCount {
            expected: MISSION_FIELDS,
            actual: fields.len(),
        });
    }

    Ok(MissionItem {
        seq: parse_field("index", fields[0])?,
        current: parse_field("current", fields[1])?,
        frame: parse_field("frame", fields[2])?,
        command: parse_field("command", fields[3])?,
        param1: parse_field("param1", fields[4])?,
        param2: parse_field("param2", fields[5])?,
        param3: parse_field("param3", fields[6])?,
        param4: parse_field("param4", fields[7])?,
        x: parse_field("x", fields[8])?,
        y: parse_field("y", fields[9])?,
        z: parse_field("z", fields[10])?,
        autocontinue: parse_field("autocontinue", fields[11])?,
        target: Target::default(),
    })
}

/// Format a mission item as a tab-separated line.
pub fn format_mission_line(item: &MissionItem) -> String {
    format!(
        "{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}",
        item.seq,
        item.current,
        item.frame,
        item.command,
        item.param1,
        item.param2,
        item.param3,
        item.param4,
        item.x,
        item.y,
        item.z,
        item.autocontinue
    )
}

/// Parse a `<name> <value>` parameter line.
pub fn parse_param_line(line: &str) -> WireResult<(String, f32)> {
    let fields = split_fields(line);
    if fields.len() != 2 {
        return Err(WireError::FieldCount {
            expected: 2,
            actual: fields.len(),
        });
    }
    let value = parse_field("value", fields[1])?;
    Ok((fields[0].to_string(), value))
}
