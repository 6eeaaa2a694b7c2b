//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, addresses parse)
//! - Detect servers competing for the same address
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ServiceConfig → Result<(), Vec<ValidationError>>

use std::net::SocketAddr;

use crate::config::schema::ServiceConfig;

/// Upper bound of every timeout and deadline setting, in seconds.
pub const MAX_DURATION_SECS: u64 = 86_400;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("{field}: invalid socket address {value:?}")]
    InvalidAddress { field: &'static str, value: String },

    #[error("{first} and {second} both bind {address}")]
    DuplicateAddress {
        first: &'static str,
        second: &'static str,
        address: SocketAddr,
    },

    #[error("{field} must be greater than zero")]
    Zero { field: &'static str },

    #[error("{field} must be at most {max} seconds")]
    TooLarge { field: &'static str, max: u64 },

    #[error("{field}: invalid URL {value:?}")]
    InvalidUrl { field: &'static str, value: String },
}

/// Check `config`, returning every problem found.
pub fn validate_config(config: &ServiceConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    let mut servers = vec![("private.bind_address", &config.private.bind_address)];
    if config.api.enabled {
        servers.push(("api.bind_address", &config.api.bind_address));
    }
    if config.metrics.enabled {
        servers.push(("metrics.bind_address", &config.metrics.bind_address));
    }

    let mut bound: Vec<(&'static str, SocketAddr)> = Vec::new();
    for (field, value) in servers {
        match value.parse::<SocketAddr>() {
            Ok(addr) => {
                // Port 0 asks the OS for a fresh port, so it never collides.
                if addr.port() != 0 {
                    if let Some((first, _)) = bound.iter().find(|(_, other)| *other == addr) {
                        errors.push(ValidationError::DuplicateAddress {
                            first,
                            second: field,
                            address: addr,
                        });
                    }
                }
                bound.push((field, addr));
            }
            Err(_) => errors.push(ValidationError::InvalidAddress {
                field,
                value: value.clone(),
            }),
        }
    }

    let durations = [
        ("timeouts.read_secs", config.timeouts.read_secs),
        ("timeouts.write_secs", config.timeouts.write_secs),
        ("auth.timeout_secs", config.auth.timeout_secs),
        ("lifecycle.shutdown_deadline_secs", config.lifecycle.shutdown_deadline_secs),
    ];
    for (field, value) in durations {
        if value == 0 {
            errors.push(ValidationError::Zero { field });
        } else if value > MAX_DURATION_SECS {
            errors.push(ValidationError::TooLarge {
                field,
                max: MAX_DURATION_SECS,
            });
        }
    }

    for (field, value) in [
        ("api.max_in_flight", config.api.max_in_flight),
        ("max_connections", config.max_connections),
    ] {
        if value == 0 {
            errors.push(ValidationError::Zero { field });
        }
    }

    for (field, value) in [
        ("auth.auth_host", &config.auth.auth_host),
        ("auth.private_host", &config.auth.private_host),
    ] {
        let valid = url::Url::parse(value)
            .map(|url| matches!(url.scheme(), "http" | "https") && url.has_host())
            .unwrap_or(false);
        if !valid {
            errors.push(ValidationError::InvalidUrl {
                field,
                value: value.clone(),
            });
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
