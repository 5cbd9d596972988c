//! Execution Core Binary
//!
//! Loads configuration, reconciles with the venue, then keeps reconciling on
//! a fixed interval until shutdown.
//!
//! # Usage
//!
//! ```bash
//! execution-core --config config.yaml
//! ```
//!
//! # Environment Variables
//!
//! - `EXECUTION_CORE_CONFIG`: config path when `--config` is not given
//! - `RUST_LOG`: log filter, overriding `logging.level`
//!
//! Values in the YAML file may reference environment variables with
//! `${VAR}` or `${VAR:-default}`.

use std::sync::Arc;

use anyhow::{Context, bail};
use execution_core::application::ports::BrokerVenuePort;
use execution_core::application::use_cases::{ReconciliationEngine, RunOutcome};
use execution_core::config::{Config, load_config};
use execution_core::telemetry::init_tracing;
use execution_core::{
    ExecutionContext, HttpVenueClient, InMemoryGateStore, InMemoryStore, SimulatedVenue,
    SystemClock,
};
use tokio::signal;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config_path = parse_args()?;
    let config = load_config(config_path.as_deref()).context("loading configuration")?;
    init_tracing(&config.logging);

    tracing::info!(
        environment = %config.environment,
        dry_run = config.dry_run,
        venue = ?config.venue.kind,
        "Starting execution core"
    );

    let ctx = Arc::new(build_context(config)?);
    let engine = ReconciliationEngine::new(ctx);

    match engine
        .run_startup()
        .await
        .context("startup reconciliation failed; refusing to accept orders")?
    {
        RunOutcome::Completed(run) => {
            if run.has_drift() {
                tracing::warn!(
                    symbols = run.drift.len(),
                    "Startup reconciliation found position drift; review before trading"
                );
            }
        }
        RunOutcome::Skipped => bail!("startup reconciliation was skipped"),
    }

    tracing::info!("Execution core ready");
    engine.run_periodic(shutdown_signal()).await;
    tracing::info!("Execution core stopped");
    Ok(())
}

/// `--config <path>` is the only argument.
fn parse_args() -> anyhow::Result<Option<String>> {
    let mut args = std::env::args().skip(1);
    let mut path = None;
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" | "-c" => {
                path = Some(args.next().context("--config requires a path")?);
            }
            other => bail!("unrecognized argument: {other}"),
        }
    }
    Ok(path)
}

/// Wire ports to adapters.
fn build_context(config: Config) -> anyhow::Result<ExecutionContext> {
    let clock = Arc::new(SystemClock);
    let venue: Arc<dyn BrokerVenuePort> = if config.uses_simulated_venue() {
        tracing::info!("Using simulated venue");
        Arc::new(SimulatedVenue::new(clock.clone()))
    } else {
        tracing::info!(base_url = %config.venue.base_url, "Using HTTP venue");
        Arc::new(HttpVenueClient::new(&config.venue).context("building venue client")?)
    };

    Ok(ExecutionContext::new(
        Arc::new(InMemoryStore::new()),
        venue,
        Arc::new(InMemoryGateStore::new()),
        clock,
        config,
    ))
}

/// Resolve on Ctrl+C or SIGTERM.
///
/// If a handler cannot be installed the signal is treated as received, so
/// the process shuts down instead of running without a way to stop it.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => tracing::error!(error = %e, "Failed to install SIGTERM handler"),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => tracing::info!("Received Ctrl+C, initiating shutdown"),
        () = terminate => tracing::info!("Received SIGTERM, initiating shutdown"),
    }
}
