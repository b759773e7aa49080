//! Waypoint and parameter files.
//!
//! Waypoint files start with the `QGC WPL 110` header followed by one
//! 12-field mission line per item. Parameter files hold `<name> <value>`
//! lines; blank lines and `#` comments are skipped in both.

use std::path::{Path, PathBuf};
use std::time::Duration;

use mavgc_command_protocol::{Reply, Request};
use mavgc_core::{CommandClient, MissionSource};
use mavgc_wire::{
    format_mission_line, parse_mission_line, parse_param_line, MissionItem, MissionResult,
    WAYPOINT_FILE_HEADER,
};
use parking_lot::Mutex;
use tracing::{info, warn};

use crate::error::{RunnerError, RunnerResult};

fn content_lines(text: &str) -> impl Iterator<Item = (usize, &str)> {
    text.lines()
        .enumerate()
        .map(|(idx, line)| (idx + 1, line.trim()))
        .filter(|(_, line)| !line.is_empty() && !line.starts_with('#'))
}

/// Parse a waypoint file. Items are renumbered in file order.
pub fn parse_waypoints(name: &str, text: &str) -> RunnerResult<Vec<MissionItem>> {
    let mut lines = content_lines(text);
    match lines.next() {
        Some((_, header)) if header == WAYPOINT_FILE_HEADER => {}
        Some((line, header)) => {
            return Err(RunnerError::Config(format!(
                "{} line {}: expected '{}', found '{}'",
                name, line, WAYPOINT_FILE_HEADER, header
            )))
        }
        None => return Ok(Vec::new()),
    }

    lines
        .enumerate()
        .map(|(seq, (line, text))| {
            let mut item = parse_mission_line(text).map_err(|source| RunnerError::FileLine {
                file: name.to_string(),
                line,
                source,
            })?;
            item.seq = seq as u16;
            Ok(item)
        })
        .collect()
}

/// Render items as a waypoint file.
pub fn format_waypoints(items: &[MissionItem]) -> String {
    let mut text = String::from(WAYPOINT_FILE_HEADER);
    text.push('\n');
    for item in items {
        text.push_str(&format_mission_line(item));
        text.push('\n');
    }
    text
}

pub fn save_waypoints(path: &Path, items: &[MissionItem]) -> RunnerResult<()> {
    std::fs::write(path, format_waypoints(items))?;
    Ok(())
}

pub fn parse_params(name: &str, text: &str) -> RunnerResult<Vec<(String, f32)>> {
    content_lines(text)
        .map(|(line, text)| {
            parse_param_line(text).map_err(|source| RunnerError::FileLine {
                file: name.to_string(),
                line,
                source,
            })
        })
        .collect()
}

pub fn load_params(path: &Path) -> RunnerResult<Vec<(String, f32)>> {
    let text = std::fs::read_to_string(path)?;
    parse_params(&path.display().to_string(), &text)
}

/// Set each parameter in turn through the command client.
///
/// Returns the names whose `SET_PARAMETER` did not succeed.
pub fn apply_params(client: &CommandClient, params: &[(String, f32)]) -> Vec<String> {
    let mut failed = Vec::new();
    for (name, value) in params {
        let line = Request::SetParameter {
            name: name.clone(),
            value: *value,
            target: None,
        }
        .to_line();
        let reply = client.call(&line);
        if reply != Reply::ok() {
            warn!("Params: {} = {} -> {}", name, value, reply);
            failed.push(name.clone());
        }
    }
    info!("Params: applied {} of {}", params.len() - failed.len(), params.len());
    failed
}

/// Mission source backed by a waypoint file, re-read at every upload.
pub struct WaypointFileSource {
    path: PathBuf,
    items: Mutex<Option<Vec<MissionItem>>>,
    outcome: Mutex<Option<MissionResult>>,
}

impl WaypointFileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        WaypointFileSource {
            path: path.into(),
            items: Mutex::new(None),
            outcome: Mutex::new(None),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Outcome of the last upload.
    pub fn outcome(&self) -> Option<MissionResult> {
        *self.outcome.lock()
    }

    fn load(&self) -> RunnerResult<Vec<MissionItem>> {
        let text = std::fs::read_to_string(&self.path)?;
        parse_waypoints(&self.path.display().to_string(), &text)
    }
}

impl MissionSource for WaypointFileSource {
    fn start(&self) {
        *self.outcome.lock() = None;
        let items = match self.load() {
            Ok(items) => {
                info!("Mission: {} item(s) from {}", items.len(), self.path.display());
                Some(items)
            }
            Err(e) => {
                warn!("Mission: cannot read {}: {}", self.path.display(), e);
                None
            }
        };
        *self.items.lock() = items;
    }

    fn count(&self, _timeout: Duration) -> Option<u16> {
        self.items
            .lock()
            .as_ref()
            .and_then(|items| u16::try_from(items.len()).ok())
    }

    fn item(&self, seq: u16) -> Option<MissionItem> {
        self.items.lock().as_ref()?.get(seq as usize).copied()
    }

    fn finished(&self, result: MissionResult) {
        *self.outcome.lock() = Some(result);
    }
}
