//! `renderctl-monitor`: supervise the configured services until Ctrl-C
//!
//! Usage: `renderctl-monitor [CONFIG]`

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use service_monitor::{
    init_logging_from_env, HttpHealthProbe, MonitorConfig, RestartExecutor, Supervisor, SupervisorSettings,
};
use tokio::sync::watch;
use tracing::{error, info};

#[tokio::main]
async fn main() -> ExitCode {
    if let Err(e) = init_logging_from_env() {
        eprintln!("renderctl-monitor: {e}");
        return ExitCode::FAILURE;
    }

    let cli_path = std::env::args_os().nth(1).map(PathBuf::from);
    let config = match MonitorConfig::load(cli_path.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "[Monitor] cannot start");
            eprintln!("renderctl-monitor: {e}");
            return ExitCode::FAILURE;
        }
    };

    let settings = SupervisorSettings::from(&config);
    let probe = Arc::new(HttpHealthProbe::new(config.probe_timeout()));
    let executor = Arc::new(RestartExecutor::new(config.port_release_timeout()));
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let handles: Vec<_> = config
        .services
        .iter()
        .cloned()
        .map(|service| {
            let supervisor = Supervisor::new(service, Arc::clone(&probe), Arc::clone(&executor), settings);
            tokio::spawn(supervisor.run(shutdown_rx.clone()))
        })
        .collect();

    info!(services = handles.len(), "[Monitor] started");

    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "[Monitor] cannot listen for Ctrl-C, stopping");
    }

    info!("[Monitor] shutting down");
    // Receivers stop on any change, so a closed channel is fine here
    let _ = shutdown_tx.send(true);
    for handle in handles {
        if let Err(e) = handle.await {
            error!(error = %e, "[Monitor] supervisor task ended abnormally");
        }
    }

    ExitCode::SUCCESS
}
