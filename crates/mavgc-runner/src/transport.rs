//! Socket glue between the vehicle and the dispatcher thread.
//!
//! Bytes read from the socket are handed to the dispatcher over a
//! crossbeam channel; frames produced by the link reach the socket task
//! through an unbounded tokio channel wrapped as a [`FrameSink`].

use std::io;
use std::net::SocketAddr;

use crossbeam_channel::Sender;
use mavgc_core::FrameSink;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpStream, UdpSocket};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::{TransportConfig, TransportKind};
use crate::error::{RunnerError, RunnerResult};

/// Outbound half handed to the link.
#[derive(Debug, Clone)]
pub struct TokioSink {
    tx: mpsc::UnboundedSender<Vec<u8>>,
}

impl FrameSink for TokioSink {
    fn send(&self, bytes: &[u8]) -> io::Result<()> {
        self.tx
            .send(bytes.to_vec())
            .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "transport closed"))
    }
}

/// An open transport.
pub struct Transport {
    pub sink: TokioSink,
    /// Inbound byte chunks for the dispatcher.
    pub inbound: crossbeam_channel::Receiver<Vec<u8>>,
    /// The socket task; the inbound channel disconnects when it ends.
    pub task: JoinHandle<()>,
    pub local_addr: SocketAddr,
}

/// Open the configured socket and start pumping bytes.
pub async fn open(config: &TransportConfig) -> RunnerResult<Transport> {
    let (out_tx, out_rx) = mpsc::unbounded_channel::<Vec<u8>>();
    let (in_tx, in_rx) = crossbeam_channel::unbounded::<Vec<u8>>();

    let (task, local_addr) = match config.kind {
        TransportKind::Tcp => {
            let stream = TcpStream::connect(&config.address).await?;
            stream.set_nodelay(true)?;
            let local_addr = stream.local_addr()?;
            info!("Transport: connected to tcp://{}", config.address);
            let task = tokio::spawn(async move {
                if let Err(e) = pump_tcp(stream, out_rx, in_tx).await {
                    warn!("Transport: tcp connection error: {}", e);
                }
                info!("Transport: tcp connection closed");
            });
            (task, local_addr)
        }
        TransportKind::Udp => {
            let socket = UdpSocket::bind(&config.bind).await?;
            let peer = match &config.peer {
                Some(peer) => Some(resolve(peer).await?),
                None => None,
            };
            let local_addr = socket.local_addr()?;
            info!("Transport: listening on udp://{}", local_addr);
            let task = tokio::spawn(async move {
                if let Err(e) = pump_udp(socket, peer, out_rx, in_tx).await {
                    warn!("Transport: udp socket error: {}", e);
                }
            });
            (task, local_addr)
        }
    };

    Ok(Transport {
        sink: TokioSink { tx: out_tx },
        inbound: in_rx,
        task,
        local_addr,
    })
}

async fn resolve(address: &str) -> RunnerResult<SocketAddr> {
    tokio::net::lookup_host(address)
        .await?
        .next()
        .ok_or_else(|| RunnerError::Config(format!("cannot resolve {}", address)))
}

async fn pump_tcp(
    mut stream: TcpStream,
    mut outbound: mpsc::UnboundedReceiver<Vec<u8>>,
    inbound: Sender<Vec<u8>>,
) -> io::Result<()> {
    let (mut reader, mut writer) = stream.split();
    let mut read_buf = [0u8; 1024];

    loop {
        tokio::select! {
            result = reader.read(&mut read_buf) => {
                match result? {
                    0 => return Ok(()),
                    n => {
                        if inbound.send(read_buf[..n].to_vec()).is_err() {
                            return Ok(());
                        }
                    }
                }
            }

            data = outbound.recv() => {
                let Some(data) = data else { return Ok(()) };
                writer.write_all(&data).await?;
                writer.flush().await?;
            }
        }
    }
}

async fn pump_udp(
    socket: UdpSocket,
    mut peer: Option<SocketAddr>,
    mut outbound: mpsc::UnboundedReceiver<Vec<u8>>,
    inbound: Sender<Vec<u8>>,
) -> io::Result<()> {
    let mut read_buf = [0u8; 2048];

    loop {
        tokio::select! {
            result = socket.recv_from(&mut read_buf) => {
                let (n, from) = match result {
                    Ok(received) => received,
                    // Reported after an ICMP unreachable for an earlier send.
                    Err(e) if matches!(
                        e.kind(),
                        io::ErrorKind::ConnectionRefused | io::ErrorKind::ConnectionReset
                    ) => {
                        debug!("Transport: udp receive error: {}", e);
                        continue;
                    }
                    Err(e) => return Err(e),
                };
                if peer != Some(from) {
                    info!("Transport: udp peer is now {}", from);
                    peer = Some(from);
                }
                if inbound.send(read_buf[..n].to_vec()).is_err() {
                    return Ok(());
                }
            }

            data = outbound.recv() => {
                let Some(data) = data else { return Ok(()) };
                match peer {
                    Some(addr) => {
                        if let Err(e) = socket.send_to(&data, addr).await {
                            warn!("Transport: udp send to {} failed: {}", addr, e);
                        }
                    }
                    None => debug!("Transport: no udp peer yet, dropped {} bytes", data.len()),
                }
            }
        }
    }
}
