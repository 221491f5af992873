//! Flow Controller Daemon
//!
//! Main entry point for flowctld. Accepts OpenFlow switch connections and
//! serves the REST management API until interrupted.

use anyhow::Context;
use clap::Parser;
use flowctl_daemon::{router, southbound, ApiState, Config, DatapathRegistry, FlowController};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::parse();
    init_logging(&config.log_level)?;

    info!("flowctld: Starting flow controller");

    match run_daemon(config).await {
        Ok(()) => {
            info!("flowctld: Daemon exiting normally");
            Ok(())
        }
        Err(e) => {
            error!(error = %e, "flowctld: Daemon exiting with error");
            Err(e)
        }
    }
}

/// Initialize structured logging; RUST_LOG wins over `--log-level`.
fn init_logging(default_level: &str) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .context("invalid log filter")?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .compact()
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to set logger: {}", e))?;

    Ok(())
}

async fn run_daemon(config: Config) -> anyhow::Result<()> {
    let addrs = config.listen_addrs()?;

    let registry = Arc::new(DatapathRegistry::new());
    let controller = FlowController::new(Arc::clone(&registry));

    let ofp_listener = TcpListener::bind(addrs.ofp)
        .await
        .with_context(|| format!("failed to bind OpenFlow listener on {}", addrs.ofp))?;
    info!(addr = %addrs.ofp, "flowctld: Listening for switches");

    let southbound_task = tokio::spawn(async move {
        if let Err(e) = southbound::serve(ofp_listener, controller).await {
            error!(error = %e, "flowctld: OpenFlow listener stopped");
        }
    });

    let rest_listener = TcpListener::bind(addrs.rest)
        .await
        .with_context(|| format!("failed to bind REST API on {}", addrs.rest))?;
    info!(addr = %addrs.rest, "flowctld: REST API listening");

    axum::serve(rest_listener, router(ApiState::new(registry)))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("REST API server failed")?;

    southbound_task.abort();
    info!("flowctld: Graceful shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    match signal::ctrl_c().await {
        Ok(()) => info!("flowctld: Received SIGINT"),
        Err(e) => {
            error!(error = %e, "flowctld: Cannot listen for SIGINT; running until killed");
            std::future::pending::<()>().await;
        }
    }
}
