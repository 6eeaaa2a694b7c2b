//! Demo API handlers.

use axum::Extension;

use crate::auth::RequestIdentity;

pub const DEMO_PATH: &str = "/v1/demo";

/// `GET /v1/demo`
pub async fn get_demo(Extension(identity): Extension<RequestIdentity>) -> &'static str {
    tracing::debug!(user_id = ?identity.user_id, "Serving demo");
    "Hello World!"
}
