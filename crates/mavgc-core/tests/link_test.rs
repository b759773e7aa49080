//! Link operations against a simulated vehicle.

mod common;

use std::collections::HashMap;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use common::{fast_config, waypoint, SimConfig, SimVehicle};
use mavgc_command_protocol::PowerAction;
use mavgc_core::{CommandClass, LinkError, MissionSource, VecMissionSource};
use mavgc_wire::*;

fn target() -> Target {
    Target::new(1, 1)
}

fn three_waypoints() -> Vec<MissionItem> {
    vec![
        waypoint(0, 47.0, 8.0, 0.0),
        waypoint(1, 47.1, 8.1, 20.0),
        waypoint(2, 47.2, 8.2, 30.0),
    ]
}

fn params(n: usize) -> Vec<(String, f32)> {
    (0..n).map(|i| (format!("PARAM_{}", i), i as f32)).collect()
}

// ============================================================================
// Mission download
// ============================================================================

#[test]
fn test_download_empty_mission() {
    let sim = SimVehicle::start(fast_config(), SimConfig::default());

    let items = sim.link.download_mission(target()).unwrap();
    assert!(items.is_empty());
    assert_eq!(sim.link.missions().mission(), Some(vec![]));

    // Give the sim a moment to record the ack.
    assert!(common::wait_until(Duration::from_secs(1), || {
        sim.sent_count(|m| matches!(m, Message::MissionAck(a) if a.result == MAV_MISSION_ACCEPTED)) == 1
    }));
    assert_eq!(sim.sent_count(|m| matches!(m, Message::MissionRequest(_))), 0);
}

#[test]
fn test_download_three_items_with_duplicate() {
    let sim = SimVehicle::start(
        fast_config(),
        SimConfig {
            mission: three_waypoints(),
            duplicate_item: Some(1),
            ..SimConfig::default()
        },
    );

    let items = sim.link.download_mission(target()).unwrap();
    assert_eq!(items.iter().map(|i| i.seq).collect::<Vec<_>>(), vec![0, 1, 2]);
    assert_eq!(items[1].z, 20.0);

    let requested: Vec<u16> = sim
        .sent()
        .iter()
        .filter_map(|m| match m {
            Message::MissionRequest(r) => Some(r.seq),
            _ => None,
        })
        .collect();
    assert_eq!(requested, vec![0, 1, 2]);
}

#[test]
fn test_download_retries_lost_request() {
    let sim = SimVehicle::start(
        fast_config(),
        SimConfig {
            mission: three_waypoints(),
            ignore_first: HashMap::from([(MSG_ID_MISSION_REQUEST_LIST, 1), (MSG_ID_MISSION_REQUEST, 1)]),
            ..SimConfig::default()
        },
    );

    let items = sim.link.download_mission(target()).unwrap();
    assert_eq!(items.len(), 3);
    assert_eq!(sim.sent_count(|m| matches!(m, Message::MissionRequestList(_))), 2);
}

#[test]
fn test_download_timeout_stores_nothing() {
    // A vehicle that never answers item requests.
    let sim = SimVehicle::start(
        fast_config(),
        SimConfig {
            mission: three_waypoints(),
            ignore_first: HashMap::from([(MSG_ID_MISSION_REQUEST, usize::MAX)]),
            ..SimConfig::default()
        },
    );
    let result = sim.link.download_mission(target());
    assert!(matches!(
        result,
        Err(LinkError::Timeout {
            operation: "mission item",
            attempts: 3
        })
    ));
    assert!(sim.link.missions().mission().is_none());
    assert_eq!(sim.sent_count(|m| matches!(m, Message::MissionRequest(_))), 3);
}

// ============================================================================
// Mission upload, clear, set current
// ============================================================================

#[test]
fn test_upload_accepted() {
    let sim = SimVehicle::start(fast_config(), SimConfig::default());
    let source = VecMissionSource::new(three_waypoints());

    let result = sim.link.upload_mission(target(), &source).unwrap();
    assert_eq!(result, MissionResult::Accepted);
    assert_eq!(source.outcome(), Some(MissionResult::Accepted));

    let uploaded = sim.uploaded();
    assert_eq!(uploaded.len(), 3);
    assert!(uploaded.iter().all(|i| i.target == target()));
    assert_eq!(uploaded[2].x, 47.2);
}

#[test]
fn test_upload_rejected_reports_outcome() {
    let sim = SimVehicle::start(
        fast_config(),
        SimConfig {
            upload_result: 4,
            ..SimConfig::default()
        },
    );
    let source = VecMissionSource::new(three_waypoints());

    let result = sim.link.upload_mission(target(), &source);
    assert!(matches!(
        result,
        Err(LinkError::MissionRejected(MissionResult::NoSpace))
    ));
    assert_eq!(source.outcome(), Some(MissionResult::NoSpace));
}

#[test]
fn test_upload_without_final_ack_times_out() {
    let sim = SimVehicle::start(
        fast_config(),
        SimConfig {
            withhold_upload_ack: true,
            ..SimConfig::default()
        },
    );
    let source = VecMissionSource::new(three_waypoints());

    let result = sim.link.upload_mission(target(), &source);
    assert!(matches!(
        result,
        Err(LinkError::Timeout {
            operation: "mission ack",
            attempts: 1
        })
    ));
    assert_eq!(sim.uploaded().len(), 3);
    assert_eq!(source.outcome(), None);
    // The mission class is free again.
    sim.link.clear_mission(target()).unwrap();
}

#[test]
fn test_upload_request_past_end_fails() {
    let sim = SimVehicle::start(
        fast_config(),
        SimConfig {
            overrun_upload: true,
            ..SimConfig::default()
        },
    );
    let source = VecMissionSource::new(three_waypoints());

    let result = sim.link.upload_mission(target(), &source);
    assert!(matches!(result, Err(LinkError::Source(_))), "{:?}", result);
    assert_eq!(sim.uploaded().len(), 3);
    assert_eq!(
        sim.sent_count(|m| matches!(m, Message::MissionItem(item) if item.seq == 3)),
        0
    );
    assert_eq!(source.outcome(), None);
    sim.link.clear_mission(target()).unwrap();
}

#[test]
fn test_upload_empty_mission() {
    let sim = SimVehicle::start(fast_config(), SimConfig::default());
    let source = VecMissionSource::default();
    assert!(source.count(Duration::ZERO) == Some(0));
    assert_eq!(
        sim.link.upload_mission(target(), &source).unwrap(),
        MissionResult::Accepted
    );
    assert!(sim.uploaded().is_empty());
}

#[test]
fn test_clear_and_set_current() {
    let sim = SimVehicle::start(fast_config(), SimConfig::default());
    sim.link.clear_mission(target()).unwrap();
    sim.link.set_current_waypoint(2, target()).unwrap();
    assert_eq!(
        sim.sent_count(|m| matches!(m, Message::MissionSetCurrent(s) if s.seq == 2)),
        1
    );
}

// ============================================================================
// Parameters
// ============================================================================

#[test]
fn test_parameter_list_completes_on_count_minus_one() {
    let sim = SimVehicle::start(
        fast_config(),
        SimConfig {
            params: params(5),
            ..SimConfig::default()
        },
    );

    let received = sim.link.read_parameter_list(target()).unwrap();
    assert_eq!(received, 4);
    assert!(sim.link.params().get("PARAM_3").is_some());
}

#[test]
fn test_parameter_list_retries_then_times_out() {
    let sim = SimVehicle::start(
        fast_config(),
        SimConfig {
            params: params(3),
            ignore_first: HashMap::from([(MSG_ID_PARAM_REQUEST_LIST, usize::MAX)]),
            ..SimConfig::default()
        },
    );
    let result = sim.link.read_parameter_list(target());
    assert!(matches!(result, Err(LinkError::Timeout { attempts: 3, .. })));
    assert_eq!(sim.sent_count(|m| matches!(m, Message::ParamRequestList(_))), 3);
}

#[test]
fn test_parameter_read_and_set() {
    let sim = SimVehicle::start(
        fast_config(),
        SimConfig {
            params: params(3),
            ..SimConfig::default()
        },
    );

    let entry = sim.link.read_parameter("PARAM_2", target()).unwrap();
    assert_eq!(entry.value, 2.0);
    assert_eq!(entry.index, 2);

    let (name, entry) = sim.link.read_parameter_index(1, target()).unwrap();
    assert_eq!(name, "PARAM_1");
    assert_eq!(entry.value, 1.0);

    sim.link.set_parameter("PARAM_2", 42.5, target()).unwrap();
    assert_eq!(sim.link.params().get("PARAM_2").map(|p| p.value), Some(42.5));
}

#[test]
fn test_set_unknown_parameter_sends_nothing() {
    let sim = SimVehicle::start(fast_config(), SimConfig::default());
    let result = sim.link.set_parameter("NOT_CACHED", 1.0, target());
    assert!(matches!(result, Err(LinkError::UnknownParameter(_))));
    thread::sleep(Duration::from_millis(50));
    assert_eq!(sim.sent_count(|m| matches!(m, Message::ParamSet(_))), 0);
}

#[test]
fn test_same_class_is_busy_while_pending() {
    let mut config = fast_config();
    config.param_list_window_ms = 2_000;
    config.retries = 0;
    let sim = SimVehicle::start(
        config,
        SimConfig {
            params: params(3),
            ignore_first: HashMap::from([(MSG_ID_PARAM_REQUEST_LIST, usize::MAX)]),
            ..SimConfig::default()
        },
    );
    let link = Arc::clone(&sim.link);

    let pending = thread::spawn(move || link.read_parameter_list(Target::new(1, 1)));
    assert!(common::wait_until(Duration::from_secs(1), || {
        sim.sent_count(|m| matches!(m, Message::ParamRequestList(_))) == 1
    }));

    let second = sim.link.read_parameter("PARAM_0", target());
    assert!(matches!(second, Err(LinkError::Busy(CommandClass::Parameter))));
    // A different class is unaffected.
    sim.link.arm(true, target()).unwrap();

    assert!(matches!(pending.join().unwrap(), Err(LinkError::Timeout { .. })));
}

// ============================================================================
// Vehicle commands and logs
// ============================================================================

#[test]
fn test_arm_sends_force_and_maps_result() {
    let sim = SimVehicle::start(
        fast_config(),
        SimConfig {
            command_results: HashMap::from([(MAV_CMD_PREFLIGHT_REBOOT_SHUTDOWN, 4)]),
            ..SimConfig::default()
        },
    );
    sim.link.arm(true, target()).unwrap();
    let arm = sim.sent().into_iter().find_map(|m| match m {
        Message::CommandLong(c) => Some(c),
        _ => None,
    });
    let arm = arm.unwrap();
    assert_eq!(arm.command, MAV_CMD_COMPONENT_ARM_DISARM);
    assert_eq!(arm.params[0], 1.0);
    assert_eq!(arm.params[1], ARM_FORCE_MAGIC);

    let result = sim.link.power(PowerAction::AutopilotReboot, target());
    assert!(matches!(result, Err(LinkError::Rejected { code: 4 })));
}

#[test]
fn test_mode_area_origin_round_trip() {
    let sim = SimVehicle::start(fast_config(), SimConfig::default());
    sim.link.set_mode(4, 1).unwrap();

    let area = AllowedArea {
        p1x: -10.0,
        p1y: -10.0,
        p1z: 0.0,
        p2x: 10.0,
        p2y: 10.0,
        p2z: 50.0,
        frame: 1,
    };
    sim.link.set_allowed_area(area, target()).unwrap();
    sim.link.set_gps_origin(47.3769, 8.5417, 408.0, 1).unwrap();

    let origin = sim.sent().into_iter().find_map(|m| match m {
        Message::SetGpsGlobalOrigin(o) => Some(o),
        _ => None,
    });
    assert_eq!(origin.map(|o| (o.latitude, o.altitude)), Some((473_769_000, 408_000)));
}

#[test]
fn test_log_listing_collects_all_entries() {
    let sim = SimVehicle::start(
        fast_config(),
        SimConfig {
            logs: 3,
            ..SimConfig::default()
        },
    );
    let entries = sim.link.read_log_entries(target()).unwrap();
    assert_eq!(entries.iter().map(|e| e.id).collect::<Vec<_>>(), vec![1, 2, 3]);
    assert_eq!(entries[1].size, 2048);
}

#[test]
fn test_log_listing_without_logs() {
    let sim = SimVehicle::start(fast_config(), SimConfig::default());
    assert!(sim.link.read_log_entries(target()).unwrap().is_empty());
}

#[test]
fn test_fire_and_forget_requests() {
    let sim = SimVehicle::start(fast_config(), SimConfig::default());
    sim.link.request_data_stream(2, 4, true, target()).unwrap();
    sim.link.request_data_stream(2, 0, false, target()).unwrap();
    assert!(common::wait_until(Duration::from_secs(1), || sim.sent().len() == 2));
    assert!(matches!(
        sim.sent()[1],
        Message::RequestDataStream(RequestDataStream {
            req_stream_id: 2,
            start_stop: 0,
            ..
        })
    ));
}

#[test]
fn test_heartbeat_latches_default_target() {
    let sim = SimVehicle::start(fast_config(), SimConfig::default());
    assert!(sim.link.resolve_target(None).is_err());
    sim.heartbeat();
    assert_eq!(sim.link.resolve_target(None).unwrap(), target());
}
