//! Demo HTTP service.
//!
//! # Architecture Overview
//!
//! ```text
//!                ┌───────────────────────────── Supervisor ─────────────────────────────┐
//!                │                                                                      │
//!   clients ─────┼─▶ api     :8081  /v1/demo            (auth, limit, gzip, metrics)    │
//!   prometheus ──┼─▶ metrics :8085  /metrics                                            │
//!   kubelet ─────┼─▶ private :8089  /health/liveness, /health/readiness                 │
//!                │                                                                      │
//!                │   SIGINT/SIGTERM or first server failure                             │
//!                │       → shutdown fires → every server drains within the deadline     │
//!                └──────────────────────────────────────────────────────────────────────┘
//! ```

use clap::Parser;

use demo_service::config::{read_config, validate_config, ConfigError, ServiceArgs, ServiceConfig};
use demo_service::lifecycle::{build_services, spawn_signal_bridge, Shutdown};
use demo_service::observability::init_logging;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = ServiceArgs::parse();

    let mut config = match &args.config {
        Some(path) => read_config(path)?,
        None => ServiceConfig::default(),
    };
    args.apply(&mut config);
    validate_config(&config).map_err(ConfigError::Validation)?;

    init_logging(&config.logging)?;
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "demo-service starting");

    let shutdown = Shutdown::new();
    let services = build_services(&config, shutdown.clone())?;
    let _signals = spawn_signal_bridge(shutdown)?;

    if let Err(e) = services.supervisor.run().await {
        tracing::error!(error = %e, "Service terminated with error");
        return Err(e.into());
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
