//! In-process stand-in for the identity services, for local runs and tests.
//!
//! Every session and API token resolves to user `2`.

use axum::{
    extract::Path,
    http::{header, StatusCode},
    response::IntoResponse,
    routing::any,
    Json, Router,
};
use serde::Serialize;
use uuid::Uuid;

use super::client::{
    Entity, EntityResponse, SessionResponse, API_TOKEN_PATH, SESSION_COOKIE_NAME,
    SESSION_TOKEN_PATH,
};

/// User every token resolves to.
pub const MOCK_USER_ID: u64 = 2;

/// Default bind address of the mock server.
pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:9090";

#[derive(Debug, Serialize)]
struct AccountResponse {
    id: u64,
}

async fn cookie() -> impl IntoResponse {
    (
        [(header::SET_COOKIE, format!("{SESSION_COOKIE_NAME}={MOCK_USER_ID}"))],
        StatusCode::OK,
    )
}

async fn session() -> Json<SessionResponse> {
    Json(SessionResponse {
        user_id: MOCK_USER_ID,
    })
}

async fn account(Path(_id): Path<String>) -> Json<AccountResponse> {
    Json(AccountResponse { id: MOCK_USER_ID })
}

async fn validate() -> Json<EntityResponse> {
    Json(EntityResponse {
        id: Uuid::from_u128(MOCK_USER_ID as u128),
        name: "mock".to_string(),
        owner_type: Entity::User,
        owner_id: MOCK_USER_ID.to_string(),
        created_at: "1970-01-01T00:00:00Z".to_string(),
        last_used_at: None,
    })
}

/// Router of the mock identity server. Unknown paths answer 404.
pub fn router() -> Router {
    Router::new()
        .route("/cookie", any(cookie))
        .route(SESSION_TOKEN_PATH, any(session))
        .route("/v1/accounts/{id}", any(account))
        .route(API_TOKEN_PATH, any(validate))
}
