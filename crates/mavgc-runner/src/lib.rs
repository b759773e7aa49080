//! The `mavgc` ground station binary, as a library.
//!
//! [`run`] resolves the configuration, installs logging, opens the
//! transport and then either executes `--exec` commands or serves the
//! stdin console until input ends or Ctrl-C.

pub mod config;
pub mod console;
pub mod error;
pub mod files;
pub mod logging;
pub mod station;
pub mod telemetry;
pub mod transport;

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::sync::Notify;
use tracing::{info, warn};

pub use config::{Cli, RunnerConfig, TransportConfig, TransportKind};
pub use error::{RunnerError, RunnerResult};
pub use station::Station;

/// Run the ground station described by `cli`.
pub async fn run(cli: Cli) -> RunnerResult<()> {
    let config = cli.resolve()?;
    logging::init_tracing(config.log_level.as_deref())?;
    match config.metrics_listen {
        Some(addr) => install_metrics(addr)?,
        None => mavgc_metrics::describe_metrics(),
    }

    let station = Station::start(&config).await?;

    if let Some(path) = &config.param_file {
        let failed = station.apply_param_file(path).await?;
        if !failed.is_empty() {
            warn!("Params: not applied: {}", failed.join(", "));
        }
    }

    if cli.exec.is_empty() {
        let interrupted = Arc::new(Notify::new());
        {
            let interrupted = Arc::clone(&interrupted);
            ctrlc::set_handler(move || interrupted.notify_one())
                .map_err(|e| RunnerError::Config(format!("Ctrl-C handler: {}", e)))?;
        }

        let console = console::run_console(
            Arc::clone(station.client()),
            tokio::io::stdin(),
            tokio::io::stdout(),
        );
        tokio::select! {
            result = console => info!("Console: input closed after {} command(s)", result?),
            _ = interrupted.notified() => info!("Station: interrupted"),
        }
    } else {
        for line in &cli.exec {
            let reply = station.call(line).await?;
            println!("{}", reply);
        }
    }

    if let Some(path) = &cli.save_mission {
        match station.link().missions().mission() {
            Some(items) => {
                files::save_waypoints(path, &items)?;
                info!("Mission: saved {} item(s) to {}", items.len(), path.display());
            }
            None => warn!("Mission: nothing downloaded, {} not written", path.display()),
        }
    }

    station.shutdown().await;
    Ok(())
}

#[cfg(feature = "prometheus")]
fn install_metrics(addr: SocketAddr) -> RunnerResult<()> {
    mavgc_metrics::install_prometheus(addr)
        .map_err(|e| RunnerError::Config(format!("metrics exporter: {}", e)))?;
    info!("Metrics: serving on http://{}/metrics", addr);
    Ok(())
}

#[cfg(not(feature = "prometheus"))]
fn install_metrics(addr: SocketAddr) -> RunnerResult<()> {
    warn!("Metrics: built without the prometheus feature, {} ignored", addr);
    mavgc_metrics::describe_metrics();
    Ok(())
}
