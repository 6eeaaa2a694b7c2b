//! Session authentication middleware.
//!
//! Every request passing through gets a [`RequestIdentity`] extension, so
//! handlers read the caller explicitly instead of probing for a context key.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{header, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};

use super::client::{AuthClient, SESSION_COOKIE_NAME};
use crate::config::AuthMode;

/// Caller of a request, as resolved by [`authenticate`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RequestIdentity {
    pub user_id: Option<u64>,
}

impl RequestIdentity {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn user(user_id: u64) -> Self {
        Self {
            user_id: Some(user_id),
        }
    }
}

/// State of the [`authenticate`] middleware.
#[derive(Clone)]
pub struct Authenticator {
    mode: AuthMode,
    client: Arc<dyn AuthClient>,
}

impl Authenticator {
    pub fn new(mode: AuthMode, client: Arc<dyn AuthClient>) -> Self {
        Self { mode, client }
    }

    async fn resolve(&self, token: Option<String>) -> Result<u64, &'static str> {
        let token = token.ok_or("failed to extract required session cookie")?;
        self.client.get_user_id(&token).await.map_err(|e| {
            tracing::debug!(error = %e, "Session lookup failed");
            "failed to get user ID for session"
        })
    }
}

impl std::fmt::Debug for Authenticator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Authenticator")
            .field("mode", &self.mode)
            .finish_non_exhaustive()
    }
}

/// Value of the session cookie, if the request carries one.
pub fn session_cookie(request: &Request<Body>) -> Option<&str> {
    request
        .headers()
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE_NAME)
        .map(|(_, value)| value.trim_matches('"'))
}

/// Resolve the caller and attach a [`RequestIdentity`].
///
/// In `required` mode a request without a resolvable session is rejected with
/// 401 before reaching the handler. In `optional` mode it passes through as
/// anonymous.
pub async fn authenticate(
    State(auth): State<Authenticator>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    // Owned: `Body` is not `Sync`.
    let token = session_cookie(&request).map(str::to_owned);
    let identity = match auth.mode {
        AuthMode::Disabled => RequestIdentity::anonymous(),
        AuthMode::Optional => auth
            .resolve(token)
            .await
            .map(RequestIdentity::user)
            .unwrap_or_default(),
        AuthMode::Required => match auth.resolve(token).await {
            Ok(user_id) => RequestIdentity::user(user_id),
            Err(reason) => {
                tracing::debug!(reason, "Rejecting unauthenticated request");
                return StatusCode::UNAUTHORIZED.into_response();
            }
        },
    };

    request.extensions_mut().insert(identity);
    next.run(request).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::client::{AuthError, Entity};
    use async_trait::async_trait;
    use axum::{routing::get, Extension, Router};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tower::ServiceExt;

    /// Accepts the token "good" as user 2.
    #[derive(Default)]
    struct StubClient {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl AuthClient for StubClient {
        async fn get_user_id(&self, token: &str) -> Result<u64, AuthError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match token {
                "good" => Ok(2),
                _ => Err(AuthError::NotFound),
            }
        }

        async fn get_entity_id(&self, _token: &str) -> Result<(Entity, String), AuthError> {
            Err(AuthError::NotFound)
        }
    }

    fn app(mode: AuthMode, client: Arc<StubClient>) -> Router {
        Router::new()
            .route(
                "/",
                get(|Extension(identity): Extension<RequestIdentity>| async move {
                    match identity.user_id {
                        Some(id) => format!("user {id}"),
                        None => "anonymous".to_string(),
                    }
                }),
            )
            .layer(axum::middleware::from_fn_with_state(
                Authenticator::new(mode, client),
                authenticate,
            ))
    }

    async fn call(app: Router, cookie: Option<&str>) -> (StatusCode, String) {
        let mut builder = Request::builder().uri("/");
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        let response = app.oneshot(builder.body(Body::empty()).unwrap()).await.unwrap();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, String::from_utf8(body.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn required_rejects_missing_cookie() {
        let client = Arc::new(StubClient::default());
        let (status, _) = call(app(AuthMode::Required, client.clone()), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(client.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn required_rejects_unknown_session() {
        let client = Arc::new(StubClient::default());
        let (status, _) = call(app(AuthMode::Required, client), Some("SID=bad")).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn required_attaches_user() {
        let client = Arc::new(StubClient::default());
        let (status, body) = call(
            app(AuthMode::Required, client),
            Some("theme=dark; SID=good"),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "user 2");
    }

    #[tokio::test]
    async fn optional_passes_anonymous_through() {
        let client = Arc::new(StubClient::default());
        let (status, body) = call(app(AuthMode::Optional, client.clone()), Some("SID=bad")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "anonymous");

        let (_, body) = call(app(AuthMode::Optional, client), Some("SID=good")).await;
        assert_eq!(body, "user 2");
    }

    #[tokio::test]
    async fn disabled_never_calls_client() {
        let client = Arc::new(StubClient::default());
        let (status, body) = call(app(AuthMode::Disabled, client.clone()), Some("SID=good")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "anonymous");
        assert_eq!(client.calls.load(Ordering::SeqCst), 0);
    }
}
