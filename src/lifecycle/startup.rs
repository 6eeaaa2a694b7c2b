//! Startup orchestration.
//!
//! # Responsibilities
//! - Build the shared contexts (metrics recorder, auth client)
//! - Build one HTTP server per enabled section of the configuration
//! - Register every server with a supervisor sharing one shutdown signal
//!
//! # Design Decisions
//! - Fail fast: any construction error is fatal, nothing is bound yet
//! - Servers bind inside their start action, so a bind failure surfaces
//!   through the supervisor like any other task failure

use std::sync::Arc;

use crate::api;
use crate::auth::{AuthError, Authenticator, ExternalClient};
use crate::config::ServiceConfig;
use crate::health;
use crate::http::{HttpServer, HttpServerConfig, SharedHttpServer};
use crate::lifecycle::{LifecycleError, Shutdown, Supervisor, SupervisorConfig};
use crate::observability::metrics::{self, Metrics};

pub const API_SERVER: &str = "api";
pub const METRICS_SERVER: &str = "metrics";
pub const PRIVATE_SERVER: &str = "private";

#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("failed to build metrics recorder: {0}")]
    Metrics(#[from] metrics_exporter_prometheus::BuildError),
    #[error("failed to build auth client: {0}")]
    Auth(#[from] AuthError),
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),
}

/// Supervisor with every configured server registered, plus handles to them.
pub struct Services {
    pub supervisor: Supervisor,
    pub api: Option<SharedHttpServer>,
    pub metrics_server: Option<SharedHttpServer>,
    pub private: SharedHttpServer,
}

impl Services {
    /// Every registered server.
    pub fn servers(&self) -> impl Iterator<Item = &SharedHttpServer> {
        self.api
            .iter()
            .chain(self.metrics_server.iter())
            .chain(std::iter::once(&self.private))
    }
}

fn server_config(config: &ServiceConfig, name: &str, bind_address: &str) -> HttpServerConfig {
    HttpServerConfig {
        name: name.to_string(),
        bind_address: bind_address.to_string(),
        max_connections: config.max_connections,
        read_timeout: config.timeouts.read(),
        write_timeout: config.timeouts.write(),
    }
}

/// Build and register the servers described by `config`.
///
/// `config` is expected to be validated already.
pub fn build_services(config: &ServiceConfig, shutdown: Shutdown) -> Result<Services, StartupError> {
    let supervisor = Supervisor::with_shutdown(
        SupervisorConfig {
            shutdown_deadline: config.lifecycle.shutdown_deadline(),
        },
        shutdown.clone(),
    );
    let metrics = Metrics::new()?;

    let api = if config.api.enabled {
        let client = ExternalClient::new(&config.auth)?;
        let auth = Authenticator::new(config.api.auth, Arc::new(client));
        let router = api::router(&config.api, config.enable_gzip, metrics.clone(), auth);
        let server = Arc::new(HttpServer::new(
            server_config(config, API_SERVER, &config.api.bind_address),
            router,
        ));
        supervisor.register_arc(server.clone())?;
        tracing::info!(address = %config.api.bind_address, auth = ?config.api.auth, "API server configured");
        Some(server)
    } else {
        tracing::info!("API server disabled");
        None
    };

    let metrics_server = if config.metrics.enabled {
        let server = Arc::new(HttpServer::new(
            server_config(config, METRICS_SERVER, &config.metrics.bind_address),
            metrics::router(metrics.clone()),
        ));
        supervisor.register_arc(server.clone())?;
        tracing::info!(address = %config.metrics.bind_address, "Metrics server configured");
        Some(server)
    } else {
        tracing::info!("Metrics server disabled");
        None
    };

    let private = Arc::new(HttpServer::new(
        server_config(config, PRIVATE_SERVER, &config.private.bind_address),
        health::router(shutdown, config.enable_gzip),
    ));
    supervisor.register_arc(private.clone())?;
    tracing::info!(address = %config.private.bind_address, "Private server configured");

    Ok(Services {
        supervisor,
        api,
        metrics_server,
        private,
    })
}
