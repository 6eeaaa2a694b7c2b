//! Client for the external identity services.
//!
//! Session tokens are resolved by the auth host, API tokens by the private
//! host. Both take the token as `{"jwtToken": ...}` in a POST body.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use url::Url;
use uuid::Uuid;

use crate::config::AuthConfig;

/// Name of the cookie carrying a session token.
pub const SESSION_COOKIE_NAME: &str = "SID";

pub const SESSION_TOKEN_PATH: &str = "/v1/session/token/user";
pub const API_TOKEN_PATH: &str = "/v1/tokens/validate";

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("session request failed: {0}")]
    Request(#[source] reqwest::Error),
    #[error("could not find session")]
    NotFound,
    #[error("session request was not successful: status {0}")]
    Status(StatusCode),
    #[error("invalid session response body: {0}")]
    Decode(#[source] serde_json::Error),
    #[error("invalid auth host {host:?}: {source}")]
    InvalidUrl {
        host: String,
        #[source]
        source: url::ParseError,
    },
}

/// Kind of entity an API token belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Entity {
    User,
    Robot,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SessionRequest<'a> {
    #[serde(rename = "jwtToken")]
    pub jwt_token: &'a str,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SessionResponse {
    #[serde(rename = "userID")]
    pub user_id: u64,
}

/// Token validation response of the private host.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityResponse {
    pub id: Uuid,
    pub name: String,
    pub owner_type: Entity,
    #[serde(rename = "ownerID")]
    pub owner_id: String,
    pub created_at: String,
    #[serde(default)]
    pub last_used_at: Option<String>,
}

/// Resolves tokens to identities.
#[async_trait]
pub trait AuthClient: Send + Sync {
    /// User ID owning a session token.
    async fn get_user_id(&self, token: &str) -> Result<u64, AuthError>;

    /// Entity kind and owner ID of an API token.
    async fn get_entity_id(&self, token: &str) -> Result<(Entity, String), AuthError>;
}

/// [`AuthClient`] backed by the external HTTP services.
#[derive(Debug, Clone)]
pub struct ExternalClient {
    auth_host: Url,
    private_host: Url,
    client: reqwest::Client,
}

impl ExternalClient {
    pub fn new(config: &AuthConfig) -> Result<Self, AuthError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(AuthError::Request)?;

        Ok(Self {
            auth_host: parse_host(&config.auth_host)?,
            private_host: parse_host(&config.private_host)?,
            client,
        })
    }

    async fn post_token<T: DeserializeOwned>(
        &self,
        host: &Url,
        path: &str,
        token: &str,
    ) -> Result<T, AuthError> {
        let mut url = host.clone();
        url.set_path(path);

        let response = self
            .client
            .post(url)
            .json(&SessionRequest { jwt_token: token })
            .send()
            .await
            .map_err(|e| {
                tracing::debug!(error = %e, path, "Token request failed");
                AuthError::Request(e)
            })?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            tracing::debug!(path, "Token not found");
            return Err(AuthError::NotFound);
        }
        if !status.is_success() {
            tracing::debug!(path, status = status.as_u16(), "Token request was not successful");
            return Err(AuthError::Status(status));
        }

        let body = response.bytes().await.map_err(AuthError::Request)?;
        serde_json::from_slice(&body).map_err(|e| {
            tracing::debug!(error = %e, path, "Invalid token response body");
            AuthError::Decode(e)
        })
    }
}

fn parse_host(host: &str) -> Result<Url, AuthError> {
    Url::parse(host).map_err(|source| AuthError::InvalidUrl {
        host: host.to_string(),
        source,
    })
}

#[async_trait]
impl AuthClient for ExternalClient {
    async fn get_user_id(&self, token: &str) -> Result<u64, AuthError> {
        let session: SessionResponse = self
            .post_token(&self.auth_host, SESSION_TOKEN_PATH, token)
            .await?;
        Ok(session.user_id)
    }

    async fn get_entity_id(&self, token: &str) -> Result<(Entity, String), AuthError> {
        let entity: EntityResponse = self
            .post_token(&self.private_host, API_TOKEN_PATH, token)
            .await?;
        Ok((entity.owner_type, entity.owner_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{http::StatusCode as AxumStatus, routing::post, Json, Router};

    async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, router).await.unwrap() });
        format!("http://{addr}")
    }

    fn client(host: &str) -> ExternalClient {
        ExternalClient::new(&AuthConfig {
            auth_host: host.to_string(),
            private_host: host.to_string(),
            timeout_secs: 5,
        })
        .unwrap()
    }

    #[tokio::test]
    async fn resolves_session_token() {
        let router = Router::new().route(
            SESSION_TOKEN_PATH,
            post(|Json(body): Json<serde_json::Value>| async move {
                assert_eq!(body["jwtToken"], "tok");
                Json(serde_json::json!({ "userID": 7 }))
            }),
        );
        let host = serve(router).await;

        assert_eq!(client(&host).get_user_id("tok").await.unwrap(), 7);
    }

    #[tokio::test]
    async fn resolves_api_token() {
        let router = Router::new().route(
            API_TOKEN_PATH,
            post(|| async {
                Json(serde_json::json!({
                    "id": "67e55044-10b1-426f-9247-bb680e5fe0c8",
                    "name": "ci",
                    "ownerType": "robot",
                    "ownerID": "42",
                    "createdAt": "2024-01-01T00:00:00Z",
                    "lastUsedAt": null,
                }))
            }),
        );
        let host = serve(router).await;

        let (entity, owner) = client(&host).get_entity_id("tok").await.unwrap();
        assert_eq!(entity, Entity::Robot);
        assert_eq!(owner, "42");
    }

    #[tokio::test]
    async fn maps_failure_statuses() {
        let router = Router::new()
            .route(SESSION_TOKEN_PATH, post(|| async { AxumStatus::BAD_GATEWAY }))
            .route(API_TOKEN_PATH, post(|| async { "not json" }));
        let host = serve(router).await;
        let client = client(&host);

        assert!(matches!(
            client.get_user_id("tok").await,
            Err(AuthError::Status(s)) if s == StatusCode::BAD_GATEWAY
        ));
        assert!(matches!(
            client.get_entity_id("tok").await,
            Err(AuthError::Decode(_))
        ));
    }

    #[tokio::test]
    async fn unknown_token_is_not_found() {
        let host = serve(Router::new()).await;
        assert!(matches!(
            client(&host).get_user_id("tok").await,
            Err(AuthError::NotFound)
        ));
    }

    #[test]
    fn rejects_invalid_host() {
        let err = ExternalClient::new(&AuthConfig {
            auth_host: "not a url".into(),
            ..AuthConfig::default()
        })
        .unwrap_err();
        assert!(matches!(err, AuthError::InvalidUrl { .. }));
    }
}
