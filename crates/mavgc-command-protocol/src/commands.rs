//! Commands accepted on the text surface.
//!
//! A command line is `<ordinal>=<arg1>=<arg2>...`. The ordinal selects one of
//! 24 command kinds; each kind accepts a small fixed set of argument counts.
//! Lines are turned into a typed [`Request`] exactly once, here, so nothing
//! downstream re-parses strings.

use mavgc_wire::{custom_mode, mode_name, Target};

use crate::error::{CommandError, CommandResult};

/// Separator between the ordinal and each argument.
pub const ARG_SEPARATOR: char = '=';

/// The 24 command kinds, in ordinal order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandKind {
    Heartbeat,
    ReadMission,
    GetMission,
    WriteMission,
    SetCurrentActiveWp,
    ClearMission,
    Arm,
    ReadParameterListStart,
    GetParameterList,
    GetParameter,
    SetParameter,
    AutopilotReboot,
    AutopilotShutdown,
    BootloaderReboot,
    SystemShutdown,
    SystemReboot,
    SetMode,
    SetAllowedArea,
    SetGpsOrigin,
    ReadLogEntry,
    GetLogEntry,
    SendCommand,
    ReadDatastream,
    UpdateTarget,
}

/// Ordinal order; index == ordinal.
const KINDS: [(CommandKind, &str, &[usize]); 24] = [
    (CommandKind::Heartbeat, "HEARTBEAT", &[0]),
    (CommandKind::ReadMission, "READ_MISSION", &[0, 2]),
    (CommandKind::GetMission, "GET_MISSION", &[0]),
    (CommandKind::WriteMission, "WRITE_MISSION", &[0, 2]),
    (CommandKind::SetCurrentActiveWp, "SET_CURRENT_ACTIVE_WP", &[1, 3]),
    (CommandKind::ClearMission, "CLEAR_MISSION", &[0, 2]),
    (CommandKind::Arm, "ARM", &[0, 1, 2, 3]),
    (CommandKind::ReadParameterListStart, "READ_PARAMETER_LIST_START", &[0, 2]),
    (CommandKind::GetParameterList, "GET_PARAMETER_LIST", &[0]),
    (CommandKind::GetParameter, "GET_PARAMETER", &[1, 3]),
    (CommandKind::SetParameter, "SET_PARAMETER", &[2, 4]),
    (CommandKind::AutopilotReboot, "AUTOPILOT_REBOOT", &[0, 2]),
    (CommandKind::AutopilotShutdown, "AUTOPILOT_SHUTDOWN", &[0, 2]),
    (CommandKind::BootloaderReboot, "BOOTLOADER_REBOOT", &[0, 2]),
    (CommandKind::SystemShutdown, "SYSTEM_SHUTDOWN", &[0, 2]),
    (CommandKind::SystemReboot, "SYSTEM_REBOOT", &[0, 2]),
    (CommandKind::SetMode, "SET_MODE", &[1, 2]),
    (CommandKind::SetAllowedArea, "SET_ALLOWED_AREA", &[7, 9]),
    (CommandKind::SetGpsOrigin, "SET_GPS_ORIGIN", &[3, 4]),
    (CommandKind::ReadLogEntry, "READ_LOG_ENTRY", &[0, 2]),
    (CommandKind::GetLogEntry, "GET_LOG_ENTRY", &[0]),
    (CommandKind::SendCommand, "SEND_COMMAND", &[8, 10]),
    (CommandKind::ReadDatastream, "READ_DATASTREAM", &[2, 4, 5]),
    (CommandKind::UpdateTarget, "UPDATE_TARGET", &[1, 2]),
];

impl CommandKind {
    /// Look up a kind by ordinal.
    pub fn from_ordinal(ordinal: u8) -> Option<CommandKind> {
        KINDS.get(ordinal as usize).map(|(kind, _, _)| *kind)
    }

    /// The ordinal used on the wire.
    pub fn ordinal(&self) -> u8 {
        KINDS
            .iter()
            .position(|(kind, _, _)| kind == self)
            .map_or(u8::MAX, |idx| idx as u8)
    }

    /// Upper-case command name.
    pub fn name(&self) -> &'static str {
        self.entry().1
    }

    /// Accepted argument counts (the ordinal itself not included).
    pub fn arities(&self) -> &'static [usize] {
        self.entry().2
    }

    fn entry(&self) -> &'static (CommandKind, &'static str, &'static [usize]) {
        &KINDS[self.ordinal() as usize]
    }
}

/// Reboot and shutdown variants, all carried by `PREFLIGHT_REBOOT_SHUTDOWN`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerAction {
    AutopilotReboot,
    AutopilotShutdown,
    BootloaderReboot,
    SystemShutdown,
    SystemReboot,
}

/// A parsed, typed command.
///
/// `target` fields are `None` when the caller relies on the default target.
#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    /// Return the last heartbeat seen.
    Heartbeat,
    /// Download the mission from the vehicle.
    ReadMission { target: Option<Target> },
    /// Return the last downloaded mission.
    GetMission,
    /// Upload the mission supplied by the mission source.
    WriteMission { target: Option<Target> },
    SetCurrentWaypoint { seq: u16, target: Option<Target> },
    ClearMission { target: Option<Target> },
    Arm { arm: bool, target: Option<Target> },
    /// Bulk read of every parameter.
    ReadParameterList { target: Option<Target> },
    /// Return the cached parameter map.
    GetParameterList,
    /// With a target the value is read from the vehicle, otherwise from the cache.
    GetParameter { name: String, target: Option<Target> },
    SetParameter { name: String, value: f32, target: Option<Target> },
    Power { action: PowerAction, target: Option<Target> },
    /// Only the system id can be overridden for mode changes.
    SetMode { custom_mode: u32, system: Option<u8> },
    SetAllowedArea {
        min: [f32; 3],
        max: [f32; 3],
        frame: u8,
        target: Option<Target>,
    },
    /// Degrees and meters.
    SetGpsOrigin {
        longitude: f64,
        latitude: f64,
        altitude: f64,
        system: Option<u8>,
    },
    ReadLogEntries { target: Option<Target> },
    GetLogEntries,
    SendCommand {
        command: u16,
        params: [f32; 7],
        target: Option<Target>,
    },
    RequestDataStream {
        stream_id: u8,
        rate: u16,
        start: bool,
        target: Option<Target>,
    },
    UpdateTarget { system: u8, component: Option<u8> },
}

/// Positional argument reader with typed accessors.
struct Args<'a> {
    tokens: &'a [&'a str],
}

impl<'a> Args<'a> {
    fn len(&self) -> usize {
        self.tokens.len()
    }

    fn text(&self, idx: usize, name: &'static str) -> CommandResult<&'a str> {
        let value = self.tokens.get(idx).copied().unwrap_or_default().trim();
        if value.is_empty() {
            return Err(CommandError::InvalidArgument {
                name,
                value: value.to_string(),
            });
        }
        Ok(value)
    }

    fn num<T: std::str::FromStr>(&self, idx: usize, name: &'static str) -> CommandResult<T> {
        let value = self.text(idx, name)?;
        value.parse().map_err(|_| CommandError::InvalidArgument {
            name,
            value: value.to_string(),
        })
    }

    fn flag(&self, idx: usize, name: &'static str) -> CommandResult<bool> {
        let value = self.text(idx, name)?;
        match value.to_ascii_lowercase().as_str() {
            "true" | "1" => Ok(true),
            "false" | "0" => Ok(false),
            _ => Err(CommandError::InvalidArgument {
                name,
                value: value.to_string(),
            }),
        }
    }

    fn target(&self, idx: usize) -> CommandResult<Target> {
        Ok(Target::new(self.num(idx, "system")?, self.num(idx + 1, "component")?))
    }

    /// Target at `idx` when the argument list is long enough to carry one.
    fn target_if(&self, present: bool, idx: usize) -> CommandResult<Option<Target>> {
        if present {
            self.target(idx).map(Some)
        } else {
            Ok(None)
        }
    }
}

impl Request {
    /// Parse a command line.
    pub fn parse(line: &str) -> CommandResult<Request> {
        let line = line.trim();
        if line.is_empty() {
            return Err(CommandError::Empty);
        }
        let tokens: Vec<&str> = line.split(ARG_SEPARATOR).collect();
        let kind = tokens[0]
            .trim()
            .parse::<u8>()
            .ok()
            .and_then(CommandKind::from_ordinal)
            .ok_or_else(|| CommandError::UnknownCommand(tokens[0].to_string()))?;

        let args = Args { tokens: &tokens[1..] };
        if !kind.arities().contains(&args.len()) {
            return Err(CommandError::WrongArity {
                command: kind.name(),
                actual: args.len(),
            });
        }
        let n = args.len();

        let request = match kind {
            CommandKind::Heartbeat => Request::Heartbeat,
            CommandKind::ReadMission => Request::ReadMission {
                target: args.target_if(n == 2, 0)?,
            },
            CommandKind::GetMission => Request::GetMission,
            CommandKind::WriteMission => Request::WriteMission {
                target: args.target_if(n == 2, 0)?,
            },
            CommandKind::SetCurrentActiveWp => Request::SetCurrentWaypoint {
                seq: args.num(0, "seq")?,
                target: args.target_if(n == 3, 1)?,
            },
            CommandKind::ClearMission => Request::ClearMission {
                target: args.target_if(n == 2, 0)?,
            },
            CommandKind::Arm => match n {
                0 => Request::Arm {
                    arm: true,
                    target: None,
                },
                1 => Request::Arm {
                    arm: args.flag(0, "arm")?,
                    target: None,
                },
                2 => Request::Arm {
                    arm: true,
                    target: Some(args.target(0)?),
                },
                _ => Request::Arm {
                    arm: args.flag(0, "arm")?,
                    target: Some(args.target(1)?),
                },
            },
            CommandKind::ReadParameterListStart => Request::ReadParameterList {
                target: args.target_if(n == 2, 0)?,
            },
            CommandKind::GetParameterList => Request::GetParameterList,
            CommandKind::GetParameter => Request::GetParameter {
                name: args.text(0, "name")?.to_string(),
                target: args.target_if(n == 3, 1)?,
            },
            CommandKind::SetParameter => Request::SetParameter {
                name: args.text(0, "name")?.to_string(),
                value: args.num(1, "value")?,
                target: args.target_if(n == 4, 2)?,
            },
            CommandKind::AutopilotReboot
            | CommandKind::AutopilotShutdown
            | CommandKind::BootloaderReboot
            | CommandKind::SystemShutdown
            | CommandKind::SystemReboot => Request::Power {
                action: match kind {
                    CommandKind::AutopilotReboot => PowerAction::AutopilotReboot,
                    CommandKind::AutopilotShutdown => PowerAction::AutopilotShutdown,
                    CommandKind::BootloaderReboot => PowerAction::BootloaderReboot,
                    CommandKind::SystemShutdown => PowerAction::SystemShutdown,
                    _ => PowerAction::SystemReboot,
                },
                target: args.target_if(n == 2, 0)?,
            },
            CommandKind::SetMode => {
                let mode = args.text(0, "mode")?;
                Request::SetMode {
                    custom_mode: custom_mode(mode).ok_or_else(|| CommandError::InvalidArgument {
                        name: "mode",
                        value: mode.to_string(),
                    })?,
                    system: if n == 2 { Some(args.num(1, "system")?) } else { None },
                }
            }
            CommandKind::SetAllowedArea => Request::SetAllowedArea {
                min: [args.num(0, "min_x")?, args.num(1, "min_y")?, args.num(2, "min_z")?],
                max: [args.num(3, "max_x")?, args.num(4, "max_y")?, args.num(5, "max_z")?],
                frame: args.num(6, "frame")?,
                target: args.target_if(n == 9, 7)?,
            },
            CommandKind::SetGpsOrigin => Request::SetGpsOrigin {
                longitude: args.num(0, "longitude")?,
                latitude: args.num(1, "latitude")?,
                altitude: args.num(2, "altitude")?,
                system: if n == 4 { Some(args.num(3, "system")?) } else { None },
            },
            CommandKind::ReadLogEntry => Request::ReadLogEntries {
                target: args.target_if(n == 2, 0)?,
            },
            CommandKind::GetLogEntry => Request::GetLogEntries,
            CommandKind::SendCommand => {
                let mut params = [0f32; 7];
                for (idx, param) in params.iter_mut().enumerate() {
                    *param = args.num(idx + 1, "param")?;
                }
                Request::SendCommand {
                    command: args.num(0, "command")?,
                    params,
                    target: args.target_if(n == 10, 8)?,
                }
            }
            CommandKind::ReadDatastream => Request::RequestDataStream {
                stream_id: args.num(0, "stream_id")?,
                rate: args.num(1, "rate")?,
                start: if n == 5 { args.flag(2, "start_stop")? } else { true },
                target: match n {
                    4 => Some(args.target(2)?),
                    5 => Some(args.target(3)?),
                    _ => None,
                },
            },
            CommandKind::UpdateTarget => Request::UpdateTarget {
                system: args.num(0, "system")?,
                component: if n == 2 { Some(args.num(1, "component")?) } else { None },
            },
        };
        Ok(request)
    }

    /// The command kind of this request.
    pub fn kind(&self) -> CommandKind {
        match self {
            Request::Heartbeat => CommandKind::Heartbeat,
            Request::ReadMission { .. } => CommandKind::ReadMission,
            Request::GetMission => CommandKind::GetMission,
            Request::WriteMission { .. } => CommandKind::WriteMission,
            Request::SetCurrentWaypoint { .. } => CommandKind::SetCurrentActiveWp,
            Request::ClearMission { .. } => CommandKind::ClearMission,
            Request::Arm { .. } => CommandKind::Arm,
            Request::ReadParameterList { .. } => CommandKind::ReadParameterListStart,
            Request::GetParameterList => CommandKind::GetParameterList,
            Request::GetParameter { .. } => CommandKind::GetParameter,
            Request::SetParameter { .. } => CommandKind::SetParameter,
            Request::Power { action, .. } => match action {
                PowerAction::AutopilotReboot => CommandKind::AutopilotReboot,
                PowerAction::AutopilotShutdown => CommandKind::AutopilotShutdown,
                PowerAction::BootloaderReboot => CommandKind::BootloaderReboot,
                PowerAction::SystemShutdown => CommandKind::SystemShutdown,
                PowerAction::SystemReboot => CommandKind::SystemReboot,
            },
            Request::SetMode { .. } => CommandKind::SetMode,
            Request::SetAllowedArea { .. } => CommandKind::SetAllowedArea,
            Request::SetGpsOrigin { .. } => CommandKind::SetGpsOrigin,
            Request::ReadLogEntries { .. } => CommandKind::ReadLogEntry,
            Request::GetLogEntries => CommandKind::GetLogEntry,
            Request::SendCommand { .. } => CommandKind::SendCommand,
            Request::RequestDataStream { .. } => CommandKind::ReadDatastream,
            Request::UpdateTarget { .. } => CommandKind::UpdateTarget,
        }
    }

    /// True for requests answered from local state without vehicle traffic.
    pub fn is_local(&self) -> bool {
        matches!(
            self,
            Request::Heartbeat
                | Request::GetMission
                | Request::GetParameterList
                | Request::GetParameter { target: None, .. }
                | Request::GetLogEntries
                | Request::UpdateTarget { .. }
        )
    }

    /// Render the request as a command line (without terminator).
    pub fn to_line(&self) -> String {
        let mut parts: Vec<String> = vec![self.kind().ordinal().to_string()];
        let push_target = |parts: &mut Vec<String>, target: &Option<Target>| {
            if let Some(t) = target {
                parts.push(t.system.to_string());
                parts.push(t.component.to_string());
            }
        };

        match self {
            Request::Heartbeat
            | Request::GetMission
            | Request::GetParameterList
            | Request::GetLogEntries => {}
            Request::ReadMission { target }
            | Request::WriteMission { target }
            | Request::ClearMission { target }
            | Request::ReadParameterList { target }
            | Request::Power { target, .. }
            | Request::ReadLogEntries { target } => push_target(&mut parts, target),
            Request::SetCurrentWaypoint { seq, target } => {
                parts.push(seq.to_string());
                push_target(&mut parts, target);
            }
            Request::Arm { arm, target } => {
                parts.push(arm.to_string());
                push_target(&mut parts, target);
            }
            Request::GetParameter { name, target } => {
                parts.push(name.clone());
                push_target(&mut parts, target);
            }
            Request::SetParameter { name, value, target } => {
                parts.push(name.clone());
                parts.push(value.to_string());
                push_target(&mut parts, target);
            }
            Request::SetMode { custom_mode, system } => {
                parts.push(
                    mode_name(*custom_mode)
                        .map(str::to_string)
                        .unwrap_or_else(|| custom_mode.to_string()),
                );
                parts.extend(system.map(|s| s.to_string()));
            }
            Request::SetAllowedArea {
                min,
                max,
                frame,
                target,
            } => {
                parts.extend(min.iter().chain(max.iter()).map(|v| v.to_string()));
                parts.push(frame.to_string());
                push_target(&mut parts, target);
            }
            Request::SetGpsOrigin {
                longitude,
                latitude,
                altitude,
                system,
            } => {
                parts.push(longitude.to_string());
                parts.push(latitude.to_string());
                parts.push(altitude.to_string());
                parts.extend(system.map(|s| s.to_string()));
            }
            Request::SendCommand {
                command,
                params,
                target,
            } => {
                parts.push(command.to_string());
                parts.extend(params.iter().map(|p| p.to_string()));
                push_target(&mut parts, target);
            }
            Request::RequestDataStream {
                stream_id,
                rate,
                start,
                target,
            } => {
                parts.push(stream_id.to_string());
                parts.push(rate.to_string());
                if target.is_some() {
                    parts.push(start.to_string());
                }
                push_target(&mut parts, target);
            }
            Request::UpdateTarget { system, component } => {
                parts.push(system.to_string());
                parts.extend(component.map(|c| c.to_string()));
            }
        }
        parts.join(&ARG_SEPARATOR.to_string())
    }
}
