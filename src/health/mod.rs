//! Liveness and readiness probes served by the private server.
//!
//! # Design Decisions
//! - Liveness answers 200 for as long as the process can serve at all
//! - Readiness flips to 503 the moment shutdown fires, so load balancers
//!   stop routing here while the servers drain
//! - Compressed like the API when gzip is enabled

use axum::{extract::State, http::StatusCode, routing::get, Router};

use crate::http::gzip;
use crate::lifecycle::Shutdown;

pub const LIVENESS_PATH: &str = "/health/liveness";
pub const READINESS_PATH: &str = "/health/readiness";

async fn liveness() -> StatusCode {
    StatusCode::OK
}

async fn readiness(State(shutdown): State<Shutdown>) -> StatusCode {
    if shutdown.is_triggered() {
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        StatusCode::OK
    }
}

/// Probe router reporting on `shutdown`.
pub fn router(shutdown: Shutdown, enable_gzip: bool) -> Router {
    let router = Router::new()
        .route(LIVENESS_PATH, get(liveness))
        .route(READINESS_PATH, get(readiness))
        .with_state(shutdown);

    if enable_gzip {
        router.layer(gzip())
    } else {
        router
    }
}
