//! Command-line flags layered over the configuration file.

use std::path::PathBuf;

use clap::Parser;

use crate::config::schema::{AuthMode, ServiceConfig};

#[derive(Debug, Parser)]
#[command(name = "demo-service")]
#[command(about = "Demo HTTP service with API, metrics and health servers", long_about = None)]
pub struct ServiceArgs {
    /// TOML configuration file. Defaults apply when omitted.
    #[arg(short, long, env = "CONFIG_FILE")]
    pub config: Option<PathBuf>,

    /// Log at debug level
    #[arg(long, env = "DEBUG")]
    pub debug: bool,

    /// Human-readable logs instead of JSON
    #[arg(long, env = "DEV_MODE")]
    pub dev_mode: bool,

    /// Port of the API server
    #[arg(long)]
    pub api_port: Option<u16>,

    /// Do not run the API server
    #[arg(long)]
    pub no_api: bool,

    /// Port of the metrics server
    #[arg(long)]
    pub metrics_port: Option<u16>,

    /// Do not run the metrics server
    #[arg(long)]
    pub no_metrics: bool,

    /// Port of the private (health) server
    #[arg(long)]
    pub private_port: Option<u16>,

    /// Base URL of the session service
    #[arg(long, env = "AUTH_HOST")]
    pub auth_host: Option<String>,

    /// Base URL of the token validation service
    #[arg(long, env = "PRIVATE_HOST")]
    pub private_host: Option<String>,

    /// Compress API responses with gzip
    #[arg(long)]
    pub enable_gzip: Option<bool>,

    /// Authentication mode of the API
    #[arg(long, value_enum)]
    pub api_auth: Option<AuthMode>,
}

impl ServiceArgs {
    /// Override `config` with every flag that was given.
    pub fn apply(&self, config: &mut ServiceConfig) {
        config.logging.debug |= self.debug;
        config.logging.dev_mode |= self.dev_mode;

        if let Some(port) = self.api_port {
            config.api.bind_address = with_port(&config.api.bind_address, port);
        }
        if self.no_api {
            config.api.enabled = false;
        }
        if let Some(port) = self.metrics_port {
            config.metrics.bind_address = with_port(&config.metrics.bind_address, port);
        }
        if self.no_metrics {
            config.metrics.enabled = false;
        }
        if let Some(port) = self.private_port {
            config.private.bind_address = with_port(&config.private.bind_address, port);
        }
        if let Some(host) = &self.auth_host {
            config.auth.auth_host = host.clone();
        }
        if let Some(host) = &self.private_host {
            config.auth.private_host = host.clone();
        }
        if let Some(enabled) = self.enable_gzip {
            config.enable_gzip = enabled;
        }
        if let Some(mode) = self.api_auth {
            config.api.auth = mode;
        }
    }
}

/// Replace the port of `address`, keeping its host.
fn with_port(address: &str, port: u16) -> String {
    let host = address
        .rsplit_once(':')
        .map(|(host, _)| host)
        .filter(|host| !host.is_empty())
        .unwrap_or("0.0.0.0");
    format!("{host}:{port}")
}
