//! A running ground station: transport, dispatcher, liveness monitor and
//! the command client, wired together.

use std::path::Path;
use std::sync::Arc;
use std::thread::JoinHandle;

use mavgc_command_protocol::{Reply, Request};
use mavgc_core::{
    spawn_dispatcher, CommandClient, CommandFacade, Link, LivenessMonitor, MissionSource,
    NullTelemetry, TelemetrySink, VecMissionSource,
};
use mavgc_wire::CodecStats;
use tracing::{info, warn};

use crate::config::RunnerConfig;
use crate::error::{RunnerError, RunnerResult};
use crate::files::{apply_params, load_params, WaypointFileSource};
use crate::telemetry::JsonTelemetry;
use crate::transport;

pub struct Station {
    link: Arc<Link>,
    client: Arc<CommandClient>,
    monitor: Option<LivenessMonitor>,
    dispatcher: Option<JoinHandle<CodecStats>>,
    transport: tokio::task::JoinHandle<()>,
}

impl Station {
    /// Open the transport and start every worker.
    pub async fn start(config: &RunnerConfig) -> RunnerResult<Self> {
        let transport = transport::open(&config.transport).await?;

        let telemetry: Arc<dyn TelemetrySink> = if config.telemetry {
            Arc::new(JsonTelemetry::new(std::io::stdout(), config.telemetry_messages))
        } else {
            Arc::new(NullTelemetry)
        };
        let link = Arc::new(Link::new(
            config.link.clone(),
            Arc::new(transport.sink),
            telemetry,
        ));
        let dispatcher = spawn_dispatcher(Arc::clone(&link), transport.inbound)?;
        let monitor = LivenessMonitor::spawn(
            Arc::clone(link.liveness()),
            Arc::clone(link.telemetry()),
            &config.link.liveness,
        );

        let source: Arc<dyn MissionSource> = match &config.mission_file {
            Some(path) => Arc::new(WaypointFileSource::new(path)),
            None => Arc::new(VecMissionSource::default()),
        };
        let facade = Arc::new(CommandFacade::new(Arc::clone(&link), source));
        let client = Arc::new(CommandClient::spawn(facade, config.link.facade_timeout())?);

        info!(
            "Station: up as {}/{}",
            config.link.gcs_system_id, config.link.gcs_component_id
        );
        Ok(Station {
            link,
            client,
            monitor: Some(monitor),
            dispatcher: Some(dispatcher),
            transport: transport.task,
        })
    }

    pub fn link(&self) -> &Arc<Link> {
        &self.link
    }

    pub fn client(&self) -> &Arc<CommandClient> {
        &self.client
    }

    /// Run one command line off the async runtime.
    pub async fn call(&self, line: &str) -> RunnerResult<Reply> {
        let client = Arc::clone(&self.client);
        let line = line.to_string();
        Ok(tokio::task::spawn_blocking(move || client.call(&line)).await?)
    }

    /// Read the parameter list, then set every parameter in `path`.
    ///
    /// Returns the names that could not be set.
    pub async fn apply_param_file(&self, path: &Path) -> RunnerResult<Vec<String>> {
        let params = load_params(path)?;
        let client = Arc::clone(&self.client);
        tokio::task::spawn_blocking(move || {
            let list = Request::ReadParameterList { target: None }.to_line();
            match client.call(&list) {
                Reply::Success(_) => Ok(apply_params(&client, &params)),
                reply => Err(RunnerError::Config(format!(
                    "parameter list read failed: {}",
                    reply
                ))),
            }
        })
        .await?
    }

    /// Stop the workers and close the socket.
    pub async fn shutdown(mut self) {
        if let Some(monitor) = self.monitor.take() {
            monitor.stop();
        }
        self.transport.abort();
        if let Some(dispatcher) = self.dispatcher.take() {
            match tokio::task::spawn_blocking(move || dispatcher.join()).await {
                Ok(Ok(stats)) => info!(
                    "Station: {} frame(s) decoded, {} dropped",
                    stats.frames_decoded,
                    stats.dropped()
                ),
                _ => warn!("Station: dispatcher did not stop cleanly"),
            }
        }
    }
}
