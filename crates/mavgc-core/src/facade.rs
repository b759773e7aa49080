//! Text command surface.
//!
//! [`CommandFacade::execute`] parses one command line into a typed
//! [`Request`], runs it against the [`Link`] and renders the outcome as a
//! [`Reply`]. This is the only place where errors become reply words.

use std::sync::Arc;

use tracing::{debug, warn};

use mavgc_command_protocol::{Reply, Request, BUSY_CODE};
use mavgc_wire::{mode_name, AllowedArea, LogEntry, MissionItem, Target};

use crate::error::{LinkError, LinkResult};
use crate::link::{HeartbeatRecord, Link};
use crate::params::ParamEntry;
use crate::ports::MissionSource;

/// Component id assumed when `UPDATE_TARGET` names only a system.
const DEFAULT_COMPONENT: u8 = 1;

/// Executes text commands against a link.
pub struct CommandFacade {
    link: Arc<Link>,
    mission_source: Arc<dyn MissionSource>,
}

impl CommandFacade {
    pub fn new(link: Arc<Link>, mission_source: Arc<dyn MissionSource>) -> Self {
        CommandFacade {
            link,
            mission_source,
        }
    }

    pub fn link(&self) -> &Arc<Link> {
        &self.link
    }

    /// Run one command line.
    ///
    /// Lines that do not parse are answered with `BADCMD` and have no effect.
    pub fn execute(&self, line: &str) -> Reply {
        let request = match Request::parse(line) {
            Ok(request) => request,
            Err(e) => {
                debug!("Facade: rejected '{}': {}", line.trim(), e);
                return Reply::BadCommand;
            }
        };
        self.execute_request(&request)
    }

    /// Run an already parsed request.
    pub fn execute_request(&self, request: &Request) -> Reply {
        let name = request.kind().name();
        match self.dispatch(request) {
            Ok(reply) => {
                debug!("Facade: {} -> {}", name, reply);
                reply
            }
            Err(e) => {
                warn!("Facade: {} failed: {}", name, e);
                reply_for_error(&e)
            }
        }
    }

    fn dispatch(&self, request: &Request) -> LinkResult<Reply> {
        let link = &self.link;
        match request {
            Request::Heartbeat => Ok(link
                .take_heartbeat()
                .map(|record| Reply::with_records([heartbeat_fields(&record)]))
                .unwrap_or(Reply::Null)),
            Request::ReadMission { target } => {
                link.download_mission(link.resolve_target(*target)?)?;
                Ok(Reply::ok())
            }
            Request::GetMission => Ok(link
                .missions()
                .mission()
                .map(|items| Reply::with_records(items.iter().map(mission_fields)))
                .unwrap_or(Reply::Null)),
            Request::WriteMission { target } => {
                link.upload_mission(link.resolve_target(*target)?, self.mission_source.as_ref())?;
                Ok(Reply::ok())
            }
            Request::SetCurrentWaypoint { seq, target } => {
                link.set_current_waypoint(*seq, link.resolve_target(*target)?)?;
                Ok(Reply::ok())
            }
            Request::ClearMission { target } => {
                link.clear_mission(link.resolve_target(*target)?)?;
                Ok(Reply::ok())
            }
            Request::Arm { arm, target } => {
                link.arm(*arm, link.resolve_target(*target)?)?;
                Ok(Reply::ok())
            }
            Request::ReadParameterList { target } => {
                link.read_parameter_list(link.resolve_target(*target)?)?;
                Ok(Reply::ok())
            }
            Request::GetParameterList => {
                let params = link.params().snapshot();
                if params.is_empty() {
                    return Ok(Reply::Null);
                }
                Ok(Reply::with_records(
                    params.iter().map(|(name, entry)| param_fields(name, entry)),
                ))
            }
            Request::GetParameter { name, target: None } => Ok(link
                .params()
                .get(name)
                .map(|entry| Reply::Success(Some(entry.value.to_string())))
                .unwrap_or(Reply::Null)),
            Request::GetParameter {
                name,
                target: Some(target),
            } => {
                let entry = link.read_parameter(name, *target)?;
                Ok(Reply::Success(Some(entry.value.to_string())))
            }
            Request::SetParameter {
                name,
                value,
                target,
            } => {
                link.set_parameter(name, *value, link.resolve_target(*target)?)?;
                Ok(Reply::ok())
            }
            Request::Power { action, target } => {
                link.power(*action, link.resolve_target(*target)?)?;
                Ok(Reply::ok())
            }
            Request::SetMode {
                custom_mode,
                system,
            } => {
                let system = self.resolve_system(*system)?;
                link.set_mode(*custom_mode, system)?;
                Ok(Reply::ok())
            }
            Request::SetAllowedArea {
                min,
                max,
                frame,
                target,
            } => {
                let area = AllowedArea {
                    p1x: min[0],
                    p1y: min[1],
                    p1z: min[2],
                    p2x: max[0],
                    p2y: max[1],
                    p2z: max[2],
                    frame: *frame,
                };
                link.set_allowed_area(area, link.resolve_target(*target)?)?;
                Ok(Reply::ok())
            }
            Request::SetGpsOrigin {
                longitude,
                latitude,
                altitude,
                system,
            } => {
                let system = self.resolve_system(*system)?;
                link.set_gps_origin(*latitude, *longitude, *altitude, system)?;
                Ok(Reply::ok())
            }
            Request::ReadLogEntries { target } => {
                link.read_log_entries(link.resolve_target(*target)?)?;
                Ok(Reply::ok())
            }
            Request::GetLogEntries => {
                let entries = link.logs().entries();
                if entries.is_empty() {
                    return Ok(Reply::Null);
                }
                Ok(Reply::with_records(entries.iter().map(log_fields)))
            }
            Request::SendCommand {
                command,
                params,
                target,
            } => {
                link.command_long(*command, *params, link.resolve_target(*target)?)?;
                Ok(Reply::ok())
            }
            Request::RequestDataStream {
                stream_id,
                rate,
                start,
                target,
            } => {
                link.request_data_stream(*stream_id, *rate, *start, link.resolve_target(*target)?)?;
                Ok(Reply::ok())
            }
            Request::UpdateTarget { system, component } => {
                let component = component
                    .or_else(|| link.liveness().default_target().map(|t| t.component))
                    .unwrap_or(DEFAULT_COMPONENT);
                link.liveness()
                    .set_default_target(Target::new(*system, component));
                Ok(Reply::ok())
            }
        }
    }

    fn resolve_system(&self, system: Option<u8>) -> LinkResult<u8> {
        match system {
            Some(system) => Ok(system),
            None => self.link.resolve_target(None).map(|t| t.system),
        }
    }
}

/// Render an operation error as a reply.
pub fn reply_for_error(error: &LinkError) -> Reply {
    match error {
        LinkError::BadCommand(_) => Reply::BadCommand,
        LinkError::NoData(_) => Reply::Null,
        LinkError::Busy(_) => Reply::Fail(Some(BUSY_CODE)),
        LinkError::Rejected { code } => Reply::Fail(Some(i32::from(*code))),
        LinkError::MissionRejected(result) => Reply::Fail(Some(i32::from(result.code()))),
        LinkError::Timeout { .. }
        | LinkError::UnknownParameter(_)
        | LinkError::NoTarget
        | LinkError::Transport(_)
        | LinkError::Source(_)
        | LinkError::Wire(_) => Reply::Fail(None),
    }
}

fn heartbeat_fields(record: &HeartbeatRecord) -> Vec<String> {
    let hb = &record.heartbeat;
    vec![
        record.source.system.to_string(),
        record.source.component.to_string(),
        hb.mav_type.to_string(),
        hb.autopilot.to_string(),
        hb.base_mode.to_string(),
        mode_name(hb.custom_mode)
            .map(str::to_string)
            .unwrap_or_else(|| hb.custom_mode.to_string()),
        hb.system_status.to_string(),
        hb.mavlink_version.to_string(),
    ]
}

/// The 12 mission line fields in file order.
fn mission_fields(item: &MissionItem) -> Vec<String> {
    vec![
        item.seq.to_string(),
        item.current.to_string(),
        item.frame.to_string(),
        item.command.to_string(),
        item.param1.to_string(),
        item.param2.to_string(),
        item.param3.to_string(),
        item.param4.to_string(),
        item.x.to_string(),
        item.y.to_string(),
        item.z.to_string(),
        item.autocontinue.to_string(),
    ]
}

fn param_fields(name: &str, entry: &ParamEntry) -> Vec<String> {
    vec![
        name.to_string(),
        entry.value.to_string(),
        entry.param_type.to_string(),
    ]
}

fn log_fields(entry: &LogEntry) -> Vec<String> {
    vec![
        entry.id.to_string(),
        entry.num_logs.to_string(),
        entry.last_log_num.to_string(),
        entry.time_utc.to_string(),
        entry.size.to_string(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LinkConfig;
    use crate::ports::{NullTelemetry, VecMissionSource};
    use crate::rendezvous::CommandClass;
    use crossbeam_channel::{unbounded, Receiver};
    use mavgc_wire::{Frame, Heartbeat, Message, MissionResult, ParamValue};

    fn facade() -> (CommandFacade, Receiver<Vec<u8>>) {
        let (tx, rx) = unbounded::<Vec<u8>>();
        let link = Arc::new(Link::new(
            LinkConfig::default(),
            Arc::new(tx),
            Arc::new(NullTelemetry),
        ));
        (
            CommandFacade::new(link, Arc::new(VecMissionSource::default())),
            rx,
        )
    }

    fn heartbeat_frame() -> Frame {
        Frame {
            seq: 0,
            system_id: 1,
            component_id: 1,
            message: Message::Heartbeat(Heartbeat {
                custom_mode: 4,
                mav_type: 2,
                autopilot: 3,
                base_mode: 0x51,
                system_status: 4,
                mavlink_version: 3,
            }),
        }
    }

    #[test]
    fn test_malformed_lines_are_badcmd_without_traffic() {
        let (facade, rx) = facade();
        facade.link().handle_frame(heartbeat_frame());
        assert_eq!(facade.execute("6=true=abc=1"), Reply::BadCommand);
        assert_eq!(facade.execute("6=true=1=1=1"), Reply::BadCommand);
        assert_eq!(facade.execute("99"), Reply::BadCommand);
        assert_eq!(facade.execute(""), Reply::BadCommand);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_missing_target_fails_without_traffic() {
        let (facade, rx) = facade();
        assert_eq!(facade.execute("6"), Reply::Fail(None));
        assert_eq!(facade.execute("16=LOITER"), Reply::Fail(None));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_heartbeat_is_returned_once() {
        let (facade, _rx) = facade();
        assert_eq!(facade.execute("0"), Reply::Null);
        facade.link().handle_frame(heartbeat_frame());
        assert_eq!(
            facade.execute("0"),
            Reply::Success(Some("1,1,2,3,81,GUIDED,4,3".to_string()))
        );
        assert_eq!(facade.execute("0"), Reply::Null);
    }

    #[test]
    fn test_cached_reads() {
        let (facade, _rx) = facade();
        assert_eq!(facade.execute("2"), Reply::Null);
        assert_eq!(facade.execute("8"), Reply::Null);
        assert_eq!(facade.execute("9=RTL_ALT"), Reply::Null);
        assert_eq!(facade.execute("20"), Reply::Null);

        facade.link().handle_frame(Frame {
            seq: 0,
            system_id: 1,
            component_id: 1,
            message: Message::ParamValue(ParamValue {
                param_value: 1500.0,
                param_count: 2,
                param_index: 0,
                param_id: "RTL_ALT".into(),
                param_type: 9,
            }),
        });
        assert_eq!(facade.execute("9=RTL_ALT"), Reply::Success(Some("1500".into())));
        assert_eq!(facade.execute("8"), Reply::Success(Some("RTL_ALT,1500,9".into())));
    }

    #[test]
    fn test_set_unknown_parameter_fails_without_traffic() {
        let (facade, rx) = facade();
        facade.link().handle_frame(heartbeat_frame());
        assert_eq!(facade.execute("10=NOPE=1"), Reply::Fail(None));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_update_target_and_datastream() {
        let (facade, rx) = facade();
        assert_eq!(facade.execute("23=3"), Reply::ok());
        assert_eq!(
            facade.link().liveness().default_target(),
            Some(Target::new(3, DEFAULT_COMPONENT))
        );
        assert_eq!(facade.execute("22=0=4"), Reply::ok());
        let frame = rx.try_recv().unwrap();
        assert_eq!(frame[5], 66);
    }

    #[test]
    fn test_busy_class_reports_busy_code() {
        let (facade, _rx) = facade();
        facade.link().handle_frame(heartbeat_frame());
        let _held = facade.link().rendezvous.claim(CommandClass::Command).unwrap();
        assert_eq!(facade.execute("6"), Reply::Fail(Some(BUSY_CODE)));
    }

    #[test]
    fn test_error_mapping() {
        assert_eq!(
            reply_for_error(&LinkError::Timeout {
                operation: "x",
                attempts: 4
            }),
            Reply::Fail(None)
        );
        assert_eq!(
            reply_for_error(&LinkError::Rejected { code: 4 }),
            Reply::Fail(Some(4))
        );
        assert_eq!(
            reply_for_error(&LinkError::MissionRejected(MissionResult::NoSpace)),
            Reply::Fail(Some(4))
        );
        assert_eq!(reply_for_error(&LinkError::NoData("mission")), Reply::Null);
        assert_eq!(
            reply_for_error(&LinkError::BadCommand("x".into())),
            Reply::BadCommand
        );
    }
}
