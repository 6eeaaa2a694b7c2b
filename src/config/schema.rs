//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the service.
//! All types derive Serde traits for deserialization from config files.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root configuration for the service.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ServiceConfig {
    /// Public API server.
    pub api: ApiConfig,

    /// Prometheus metrics server.
    pub metrics: MetricsConfig,

    /// Private server with health probes. Always enabled.
    pub private: PrivateConfig,

    /// Timeouts shared by every server.
    pub timeouts: TimeoutConfig,

    /// External auth service settings.
    pub auth: AuthConfig,

    /// Logging settings.
    pub logging: LoggingConfig,

    /// Shutdown settings.
    pub lifecycle: LifecycleConfig,

    /// Compress API responses with gzip.
    pub enable_gzip: bool,

    /// Maximum concurrent connections per server (backpressure).
    pub max_connections: usize,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            api: ApiConfig::default(),
            metrics: MetricsConfig::default(),
            private: PrivateConfig::default(),
            timeouts: TimeoutConfig::default(),
            auth: AuthConfig::default(),
            logging: LoggingConfig::default(),
            lifecycle: LifecycleConfig::default(),
            enable_gzip: true,
            max_connections: 10_000,
        }
    }
}

/// How the API authenticates requests.
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum AuthMode {
    /// Every request is anonymous.
    #[default]
    Disabled,
    /// Identity attached when the session resolves, anonymous otherwise.
    Optional,
    /// Requests without a valid session are rejected with 401.
    Required,
}

/// API server configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ApiConfig {
    /// Run the API server.
    pub enabled: bool,

    /// Bind address (e.g., "0.0.0.0:8081").
    pub bind_address: String,

    /// Maximum requests handled at once; further requests queue.
    pub max_in_flight: usize,

    /// Authentication mode for API routes.
    pub auth: AuthMode,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            bind_address: "0.0.0.0:8081".to_string(),
            max_in_flight: 400,
            auth: AuthMode::Disabled,
        }
    }
}

/// Metrics server configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct MetricsConfig {
    /// Enable Prometheus metrics exporter.
    pub enabled: bool,

    /// Metrics endpoint bind address.
    pub bind_address: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            bind_address: "0.0.0.0:8085".to_string(),
        }
    }
}

/// Private server configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct PrivateConfig {
    /// Bind address for health probes.
    pub bind_address: String,
}

impl Default for PrivateConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8089".to_string(),
        }
    }
}

/// Timeout configuration for HTTP servers.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Time allowed to receive a request body, in seconds.
    pub read_secs: u64,

    /// Time allowed to produce a response, in seconds.
    pub write_secs: u64,
}

impl TimeoutConfig {
    pub fn read(&self) -> Duration {
        Duration::from_secs(self.read_secs)
    }

    pub fn write(&self) -> Duration {
        Duration::from_secs(self.write_secs)
    }
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            read_secs: 5,
            write_secs: 10,
        }
    }
}

/// External auth service configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct AuthConfig {
    /// Base URL of the session service.
    pub auth_host: String,

    /// Base URL of the private API that validates API tokens.
    pub private_host: String,

    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            auth_host: "http://api-private-auth:8081".to_string(),
            private_host: "http://api-private:8081".to_string(),
            timeout_secs: 10,
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log at debug level.
    pub debug: bool,

    /// Human-readable output instead of JSON.
    pub dev_mode: bool,
}

/// Shutdown configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct LifecycleConfig {
    /// Time each server gets to drain after shutdown begins, in seconds.
    pub shutdown_deadline_secs: u64,
}

impl LifecycleConfig {
    pub fn shutdown_deadline(&self) -> Duration {
        Duration::from_secs(self.shutdown_deadline_secs)
    }
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            shutdown_deadline_secs: crate::lifecycle::DEFAULT_SHUTDOWN_DEADLINE.as_secs(),
        }
    }
}
