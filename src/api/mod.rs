//! Public API server.
//!
//! # Layer Order (outermost first)
//! ```text
//! request metrics
//!     → gzip compression (optional)
//!     → throttle (max_in_flight concurrent requests, 429 beyond, no backlog)
//!     → authentication (matched routes only)
//!     → handler
//! ```
//! Request ID, tracing, timeouts and trailing-slash handling are added by
//! [`crate::http::HttpServer`] around the whole router.

pub mod demo;

use axum::{
    error_handling::HandleErrorLayer, http::StatusCode, middleware, routing::get, BoxError, Router,
};
use tower::{
    limit::GlobalConcurrencyLimitLayer,
    load_shed::{error::Overloaded, LoadShedLayer},
    ServiceBuilder,
};

use crate::auth::{authenticate, Authenticator};
use crate::config::ApiConfig;
use crate::http::gzip;
use crate::observability::metrics::{track_metrics, Metrics};

/// Build the API router.
pub fn router(
    config: &ApiConfig,
    enable_gzip: bool,
    metrics: Metrics,
    auth: Authenticator,
) -> Router {
    let router = Router::new()
        .route(demo::DEMO_PATH, get(demo::get_demo))
        .route_layer(middleware::from_fn_with_state(auth, authenticate));
    let router = throttle(router, config.max_in_flight);

    let router = if enable_gzip {
        router.layer(gzip())
    } else {
        router
    };

    router.layer(middleware::from_fn_with_state(metrics, track_metrics))
}

/// Serve at most `max_in_flight` requests at once; answer the rest with 429.
fn throttle(router: Router, max_in_flight: usize) -> Router {
    router.layer(
        ServiceBuilder::new()
            .layer(HandleErrorLayer::new(overloaded))
            .layer(LoadShedLayer::new())
            .layer(GlobalConcurrencyLimitLayer::new(max_in_flight)),
    )
}

async fn overloaded(err: BoxError) -> StatusCode {
    if err.is::<Overloaded>() {
        tracing::debug!("Request rejected, too many in flight");
        StatusCode::TOO_MANY_REQUESTS
    } else {
        tracing::error!(error = %err, "Unhandled middleware error");
        StatusCode::INTERNAL_SERVER_ERROR
    }
}
