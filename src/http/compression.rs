//! Response compression shared by the public and private routers.

use tower_http::compression::{
    predicate::{NotForContentType, Predicate, SizeAbove},
    CompressionLayer,
};

/// Gzip for every non-empty response, except gRPC, images and event streams.
///
/// The default predicate skips bodies under 32 bytes, which covers most
/// responses of this service.
pub fn gzip() -> CompressionLayer<impl Predicate> {
    let predicate = SizeAbove::new(1)
        .and(NotForContentType::GRPC)
        .and(NotForContentType::IMAGES)
        .and(NotForContentType::SSE);
    CompressionLayer::new().gzip(true).compress_when(predicate)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::{header, Request, StatusCode},
        routing::get,
        Router,
    };
    use tower::ServiceExt;

    async fn fetch(router: Router, accept: &str) -> axum::response::Response {
        router
            .oneshot(
                Request::builder()
                    .uri("/")
                    .header(header::ACCEPT_ENCODING, accept)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn compresses_short_bodies() {
        let router = Router::new().route("/", get(|| async { "ok" })).layer(gzip());
        let response = fetch(router, "gzip").await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers().get(header::CONTENT_ENCODING).unwrap(), "gzip");
    }

    #[tokio::test]
    async fn skips_empty_bodies() {
        let router = Router::new()
            .route("/", get(|| async { StatusCode::NO_CONTENT }))
            .layer(gzip());
        let response = fetch(router, "gzip").await;

        assert!(response.headers().get(header::CONTENT_ENCODING).is_none());
    }

    #[tokio::test]
    async fn leaves_identity_requests_alone() {
        let router = Router::new().route("/", get(|| async { "ok" })).layer(gzip());
        let response = fetch(router, "identity").await;

        assert!(response.headers().get(header::CONTENT_ENCODING).is_none());
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&body[..], b"ok");
    }
}
