//! End-to-end runs of the station against a scripted vehicle socket.

use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::unbounded;
use mavgc_command_protocol::Reply;
use mavgc_core::{CommandClient, CommandFacade, Link, LinkConfig, NullTelemetry, VecMissionSource};
use mavgc_runner::console::run_console;
use mavgc_runner::{RunnerConfig, Station, TransportConfig, TransportKind};
use mavgc_wire::*;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, UdpSocket};

fn heartbeat() -> Message {
    Message::Heartbeat(Heartbeat {
        custom_mode: 5,
        mav_type: 2,
        autopilot: 3,
        base_mode: 0x59,
        system_status: 4,
        mavlink_version: MAVLINK_VERSION,
    })
}

/// Acknowledge every COMMAND_LONG as accepted.
fn answer(codec: &mut FrameCodec, encoder: &mut FrameEncoder, bytes: &[u8]) -> Vec<Vec<u8>> {
    codec.push(bytes);
    let mut replies = Vec::new();
    while let Some(frame) = codec.decode() {
        if let Message::CommandLong(command) = frame.message {
            let ack = Message::CommandAck(CommandAck {
                command: command.command,
                result: MAV_RESULT_ACCEPTED,
            });
            replies.push(encoder.encode(&ack).unwrap());
        }
    }
    replies
}

fn fast_link() -> LinkConfig {
    LinkConfig {
        attempt_timeout_ms: 200,
        retries: 1,
        ..LinkConfig::default()
    }
}

async fn wait_for_target(station: &Station) {
    for _ in 0..200 {
        if station.link().liveness().default_target().is_some() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("no heartbeat routed");
}

#[tokio::test(flavor = "multi_thread")]
async fn test_tcp_station_arms_latched_vehicle() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap().to_string();

    let vehicle = tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        let mut codec = FrameCodec::new();
        let mut encoder = FrameEncoder::new(1, 1);
        stream.write_all(&encoder.encode(&heartbeat()).unwrap()).await.unwrap();

        let mut buf = [0u8; 512];
        loop {
            let n = stream.read(&mut buf).await.unwrap();
            if n == 0 {
                break;
            }
            for reply in answer(&mut codec, &mut encoder, &buf[..n]) {
                stream.write_all(&reply).await.unwrap();
            }
        }
    });

    let config = RunnerConfig {
        link: fast_link(),
        transport: TransportConfig {
            kind: TransportKind::Tcp,
            address,
            ..TransportConfig::default()
        },
        ..RunnerConfig::default()
    };
    let station = Station::start(&config).await.unwrap();
    wait_for_target(&station).await;

    let reply = station.call("0").await.unwrap();
    let records = reply.records();
    assert_eq!(records[0][0], "1");
    assert_eq!(records[0][5], "LOITER");

    assert_eq!(station.call("6").await.unwrap(), Reply::ok());
    assert_eq!(station.call("2").await.unwrap(), Reply::Null);

    station.shutdown().await;
    vehicle.abort();
}

#[tokio::test(flavor = "multi_thread")]
async fn test_udp_station_answers_configured_peer() {
    let vehicle_socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let peer = vehicle_socket.local_addr().unwrap().to_string();

    let vehicle = tokio::spawn(async move {
        let mut codec = FrameCodec::new();
        let mut encoder = FrameEncoder::new(1, 1);
        let mut buf = [0u8; 512];
        loop {
            let (n, from) = vehicle_socket.recv_from(&mut buf).await.unwrap();
            for reply in answer(&mut codec, &mut encoder, &buf[..n]) {
                vehicle_socket.send_to(&reply, from).await.unwrap();
            }
        }
    });

    let config = RunnerConfig {
        link: fast_link(),
        transport: TransportConfig {
            kind: TransportKind::Udp,
            bind: "127.0.0.1:0".to_string(),
            peer: Some(peer),
            ..TransportConfig::default()
        },
        ..RunnerConfig::default()
    };
    let station = Station::start(&config).await.unwrap();

    // No heartbeat yet, so an explicit target is required.
    assert_eq!(station.call("6").await.unwrap(), Reply::Fail(None));
    assert_eq!(station.call("6=false=1=1").await.unwrap(), Reply::ok());

    station.shutdown().await;
    vehicle.abort();
}

#[tokio::test(flavor = "multi_thread")]
async fn test_console_replies_line_per_command() {
    let (frames_tx, _frames_rx) = unbounded::<Vec<u8>>();
    let link = Arc::new(Link::new(fast_link(), Arc::new(frames_tx), Arc::new(NullTelemetry)));
    let facade = Arc::new(CommandFacade::new(link, Arc::new(VecMissionSource::default())));
    let client = Arc::new(CommandClient::spawn(facade, Duration::from_secs(2)).unwrap());

    let input: &[u8] = b"0\r\n\n99\n23=3\nquit\n6\n";
    let mut output = Vec::new();
    let executed = run_console(client, input, &mut output).await.unwrap();

    assert_eq!(executed, 3);
    assert_eq!(String::from_utf8(output).unwrap(), "NULL\nBADCMD\nSUCCESS\n");
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

#[tokio::test(flavor = "multi_thread")]
async fn test_param_file_waits_for_slow_list_read() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap().to_string();

    // Answers the list read only after more than the facade timeout.
    let vehicle = tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        let mut codec = FrameCodec::new();
        let mut encoder = FrameEncoder::new(1, 1);
        stream.write_all(&encoder.encode(&heartbeat()).unwrap()).await.unwrap();

        let mut buf = [0u8; 512];
        loop {
            let n = stream.read(&mut buf).await.unwrap();
            if n == 0 {
                break;
            }
            codec.push(&buf[..n]);
            while let Some(frame) = codec.decode() {
                let replies = match frame.message {
                    Message::ParamRequestList(_) => {
                        tokio::time::sleep(Duration::from_millis(1_000)).await;
                        vec![
                            param_value("RTL_ALT", 1500.0, 0, 3),
                            param_value("WPNAV_SPEED", 500.0, 1, 3),
                        ]
                    }
                    Message::ParamSet(set) => {
                        vec![param_value(&set.param_id, set.param_value, 0, 3)]
                    }
                    _ => vec![],
                };
                for reply in replies {
                    stream.write_all(&encoder.encode(&reply).unwrap()).await.unwrap();
                }
            }
        }
    });

    let config = RunnerConfig {
        link: LinkConfig {
            retries: 0,
            param_list_window_ms: 3_000,
            facade_timeout_ms: 300,
            ..fast_link()
        },
        transport: TransportConfig {
            kind: TransportKind::Tcp,
            address,
            ..TransportConfig::default()
        },
        ..RunnerConfig::default()
    };
    let station = Station::start(&config).await.unwrap();
    wait_for_target(&station).await;

    let path = std::env::temp_dir().join(format!("mavgc-station-params-{}.txt", std::process::id()));
    std::fs::write(&path, "# tuned\nRTL_ALT 2000\nWPNAV_SPEED 750\n").unwrap();
    let failed = station.apply_param_file(&path).await.unwrap();
    std::fs::remove_file(&path).unwrap();

    assert!(failed.is_empty(), "failed: {:?}", failed);
    assert_eq!(station.link().params().get("RTL_ALT").unwrap().value, 2000.0);
    assert!(!station.client().is_busy());

    station.shutdown().await;
    vehicle.abort();
}
