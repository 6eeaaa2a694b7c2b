//! End-to-end tests of the HTTP servers running under the supervisor.

use std::sync::Arc;
use std::time::Duration;

use axum::{routing::get, Router};
use demo_service::auth::mock;
use demo_service::config::AuthMode;
use demo_service::http::{HttpServer, HttpServerConfig, X_REQUEST_ID};
use demo_service::lifecycle::{
    build_services, LifecycleError, Shutdown, Supervisor, SupervisorConfig, TaskError,
};
use reqwest::StatusCode;
use tokio::sync::Notify;

mod common;
use common::local_config;

fn server_config(name: &str) -> HttpServerConfig {
    HttpServerConfig {
        name: name.into(),
        bind_address: "127.0.0.1:0".into(),
        max_connections: 64,
        read_timeout: Duration::from_secs(5),
        write_timeout: Duration::from_secs(10),
    }
}

#[tokio::test]
async fn all_servers_serve_then_shut_down() {
    let shutdown = Shutdown::new();
    let services = Arc::new(build_services(&local_config(), shutdown.clone()).unwrap());
    let running = {
        let services = Arc::clone(&services);
        tokio::spawn(async move { services.supervisor.run().await })
    };

    let api = services.api.as_ref().unwrap().wait_bound().await.unwrap();
    let metrics = services.metrics_server.as_ref().unwrap().wait_bound().await.unwrap();
    let private = services.private.wait_bound().await.unwrap();

    let response = reqwest::get(format!("http://{api}/v1/demo/")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key(X_REQUEST_ID));
    assert_eq!(response.text().await.unwrap(), "Hello World!");

    let missing = reqwest::get(format!("http://{api}/v1/other")).await.unwrap();
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);

    let exposition = reqwest::get(format!("http://{metrics}/metrics"))
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert!(exposition.contains("http_request_started_total"));
    assert!(exposition.contains("status=\"404\""));

    for probe in ["/health/liveness", "/health/readiness"] {
        let response = reqwest::get(format!("http://{private}{probe}")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK, "{probe}");
    }

    shutdown.trigger();
    running.await.unwrap().unwrap();

    assert!(reqwest::get(format!("http://{api}/v1/demo")).await.is_err());
    assert!(services.servers().all(|s| s.open_connections() == 0));
}

#[tokio::test]
async fn bind_conflict_fails_run_and_stops_siblings() {
    let occupied = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let mut config = local_config();
    config.metrics.bind_address = occupied.local_addr().unwrap().to_string();

    let services = build_services(&config, Shutdown::new()).unwrap();
    let err = services.supervisor.run().await.unwrap_err();

    assert_eq!(err.task(), Some("metrics"));
    assert!(matches!(
        err.task_error(),
        Some(TaskError::BindOrAcceptFailure(_))
    ));
    assert!(services.supervisor.shutdown_signal().is_triggered());
}

#[tokio::test]
async fn session_auth_against_mock_server() {
    let auth_supervisor = Arc::new(Supervisor::default());
    let auth_server = Arc::new(HttpServer::new(server_config("mock-auth"), mock::router()));
    auth_supervisor.register_arc(auth_server.clone()).unwrap();
    let auth_running = {
        let supervisor = Arc::clone(&auth_supervisor);
        tokio::spawn(async move { supervisor.run().await })
    };
    let auth_addr = auth_server.wait_bound().await.unwrap();

    let mut config = local_config();
    config.api.auth = AuthMode::Required;
    config.auth.auth_host = format!("http://{auth_addr}");
    config.auth.private_host = format!("http://{auth_addr}");

    let shutdown = Shutdown::new();
    let services = Arc::new(build_services(&config, shutdown.clone()).unwrap());
    let running = {
        let services = Arc::clone(&services);
        tokio::spawn(async move { services.supervisor.run().await })
    };
    let api = services.api.as_ref().unwrap().wait_bound().await.unwrap();

    let anonymous = reqwest::get(format!("http://{api}/v1/demo")).await.unwrap();
    assert_eq!(anonymous.status(), StatusCode::UNAUTHORIZED);

    let cookie = reqwest::get(format!("http://{auth_addr}/cookie"))
        .await
        .unwrap()
        .headers()
        .get(reqwest::header::SET_COOKIE)
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    assert_eq!(cookie, "SID=2");

    let authenticated = reqwest::Client::new()
        .get(format!("http://{api}/v1/demo"))
        .header(reqwest::header::COOKIE, cookie)
        .send()
        .await
        .unwrap();
    assert_eq!(authenticated.status(), StatusCode::OK);

    shutdown.trigger();
    running.await.unwrap().unwrap();
    auth_supervisor.shutdown_signal().trigger();
    auth_running.await.unwrap().unwrap();
}

/// Router whose handler signals `entered` and then takes `delay` to answer.
fn slow_router(entered: Arc<Notify>, delay: Duration) -> Router {
    Router::new().route(
        "/slow",
        get(move || {
            let entered = Arc::clone(&entered);
            async move {
                entered.notify_one();
                tokio::time::sleep(delay).await;
                "done"
            }
        }),
    )
}

#[tokio::test]
async fn in_flight_request_drains_before_stop() {
    let entered = Arc::new(Notify::new());
    let server = Arc::new(HttpServer::new(
        server_config("slow"),
        slow_router(Arc::clone(&entered), Duration::from_millis(200)),
    ));
    let supervisor = Arc::new(Supervisor::default());
    supervisor.register_arc(server.clone()).unwrap();
    let running = {
        let supervisor = Arc::clone(&supervisor);
        tokio::spawn(async move { supervisor.run().await })
    };
    let addr = server.wait_bound().await.unwrap();

    let request = tokio::spawn(async move {
        reqwest::get(format!("http://{addr}/slow"))
            .await?
            .text()
            .await
    });
    entered.notified().await;
    assert_eq!(server.open_connections(), 1);

    supervisor.shutdown_signal().trigger();
    assert_eq!(request.await.unwrap().unwrap(), "done");
    running.await.unwrap().unwrap();
    assert_eq!(server.open_connections(), 0);
}

#[tokio::test]
async fn stuck_request_is_aborted_at_deadline() {
    let entered = Arc::new(Notify::new());
    let server = Arc::new(HttpServer::new(
        server_config("stuck"),
        slow_router(Arc::clone(&entered), Duration::from_secs(5)),
    ));
    let supervisor = Arc::new(Supervisor::new(SupervisorConfig {
        shutdown_deadline: Duration::from_millis(200),
    }));
    supervisor.register_arc(server.clone()).unwrap();
    let running = {
        let supervisor = Arc::clone(&supervisor);
        tokio::spawn(async move { supervisor.run().await })
    };
    let addr = server.wait_bound().await.unwrap();

    let request = tokio::spawn(async move { reqwest::get(format!("http://{addr}/slow")).await });
    entered.notified().await;

    let started = std::time::Instant::now();
    supervisor.shutdown_signal().trigger();
    let err = running.await.unwrap().unwrap_err();

    assert!(started.elapsed() < Duration::from_secs(2));
    assert!(matches!(
        err,
        LifecycleError::Stop {
            source: TaskError::ShutdownTimeout(_),
            ..
        }
    ));
    assert!(request.await.unwrap().is_err());
}
