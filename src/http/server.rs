//! HTTP server adapter for the supervisor.
//!
//! # Responsibilities
//! - Bind the listener and run the accept loop (`Task::start`)
//! - Serve each connection with hyper, HTTP/1.1 and HTTP/2
//! - Apply read/write timeouts and trailing-slash normalisation
//! - Close connections that send no complete request head within the read timeout
//! - Drain open connections on stop, abort them at the deadline (`Task::stop`)

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::{http::Request, Router};
use hyper::body::Incoming;
use hyper_util::{
    rt::{TokioExecutor, TokioIo, TokioTimer},
    server::conn::auto,
    service::TowerToHyperService,
};
use tokio::net::TcpStream;
use tokio::sync::{watch, Notify};
use tokio::task::JoinSet;
use tokio::time::Instant;
use tower::{Layer, ServiceExt};
use tower_http::{
    normalize_path::{NormalizePath, NormalizePathLayer},
    timeout::{RequestBodyTimeoutLayer, TimeoutLayer},
};

use crate::http::request::with_request_tracing;
use crate::lifecycle::{Shutdown, Task, TaskError};
use crate::net::{ConnectionPermit, ConnectionTracker, Listener};

/// Settings of one HTTP server.
#[derive(Debug, Clone)]
pub struct HttpServerConfig {
    /// Name used in logs and supervisor errors.
    pub name: String,
    /// Bind address (e.g., "0.0.0.0:8081").
    pub bind_address: String,
    /// Maximum concurrent connections (backpressure).
    pub max_connections: usize,
    /// Maximum time to receive a request head, and then its body.
    pub read_timeout: Duration,
    /// Maximum time to produce a response.
    pub write_timeout: Duration,
}

/// An HTTP server run as a supervised [`Task`].
pub struct HttpServer {
    name: String,
    config: HttpServerConfig,
    service: NormalizePath<Router>,
    tracker: ConnectionTracker,
    /// Fired by `stop`: stop accepting and close connections gracefully.
    stopping: Shutdown,
    /// Fired by `stop` at the deadline: drop every remaining connection.
    aborting: Shutdown,
    /// Fired when `start` has returned, whatever the reason.
    closed: Shutdown,
    local_addr: watch::Sender<Option<SocketAddr>>,
}

impl HttpServer {
    /// Create a server for `router`. Nothing is bound until the task starts.
    #[allow(deprecated)]
    pub fn new(config: HttpServerConfig, router: Router) -> Self {
        let router = with_request_tracing(router)
            .layer(RequestBodyTimeoutLayer::new(config.read_timeout))
            .layer(TimeoutLayer::new(config.write_timeout));
        let service = NormalizePathLayer::trim_trailing_slash().layer(router);
        let (local_addr, _) = watch::channel(None);

        Self {
            name: config.name.clone(),
            config,
            service,
            tracker: ConnectionTracker::new(),
            stopping: Shutdown::new(),
            aborting: Shutdown::new(),
            closed: Shutdown::new(),
            local_addr,
        }
    }

    /// Server settings.
    pub fn config(&self) -> &HttpServerConfig {
        &self.config
    }

    /// Number of connections currently open.
    pub fn open_connections(&self) -> u64 {
        self.tracker.active_count()
    }

    /// Wait until the listener is bound and return its address.
    ///
    /// Returns `None` if the server closed without binding.
    pub async fn wait_bound(&self) -> Option<SocketAddr> {
        let mut rx = self.local_addr.subscribe();
        tokio::select! {
            bound = rx.wait_for(Option::is_some) => bound.ok().and_then(|addr| *addr),
            _ = self.closed.wait() => *self.local_addr.borrow(),
        }
    }

    async fn serve(&self) -> Result<(), TaskError> {
        if self.stopping.is_triggered() {
            tracing::debug!(server = %self.name, "Stopped before binding");
            return Ok(());
        }

        let listener = Listener::bind(&self.config.bind_address, self.config.max_connections).await?;
        let addr = listener.local_addr().map_err(TaskError::BindOrAcceptFailure)?;
        self.local_addr.send_replace(Some(addr));

        tracing::info!(server = %self.name, address = %addr, "HTTP server listening");

        let mut connections = JoinSet::new();
        let accepted = loop {
            tokio::select! {
                _ = self.stopping.wait() => break Ok(()),
                res = listener.accept() => match res {
                    Ok((stream, peer, permit)) => {
                        self.spawn_connection(&mut connections, stream, peer, permit);
                    }
                    Err(e) if e.is_transient() => {
                        tracing::debug!(server = %self.name, error = %e, "Transient accept error");
                    }
                    Err(e) => break Err(TaskError::from(e)),
                },
                Some(_) = connections.join_next(), if !connections.is_empty() => {}
            }
        };
        drop(listener);

        tracing::debug!(
            server = %self.name,
            open_connections = connections.len(),
            "Draining connections"
        );

        loop {
            tokio::select! {
                joined = connections.join_next() => {
                    if joined.is_none() {
                        break;
                    }
                }
                _ = self.aborting.wait() => {
                    tracing::warn!(
                        server = %self.name,
                        open_connections = connections.len(),
                        "Aborting connections still open at deadline"
                    );
                    connections.shutdown().await;
                    break;
                }
            }
        }

        accepted
    }

    fn spawn_connection(
        &self,
        connections: &mut JoinSet<()>,
        stream: TcpStream,
        peer: SocketAddr,
        permit: ConnectionPermit,
    ) {
        let first_request = Arc::new(Notify::new());
        let seen = Arc::clone(&first_request);
        let service = TowerToHyperService::new(self.service.clone().map_request(
            move |request: Request<Incoming>| {
                seen.notify_one();
                request
            },
        ));
        let read_timeout = self.config.read_timeout;
        let stopping = self.stopping.clone();
        let guard = self.tracker.track();
        let server = self.name.clone();

        connections.spawn(async move {
            let _permit = permit;
            let mut builder = auto::Builder::new(TokioExecutor::new());
            builder
                .http1()
                .timer(TokioTimer::new())
                .header_read_timeout(read_timeout);
            let conn = builder.serve_connection(TokioIo::new(stream), service);
            tokio::pin!(conn);

            // Protocol detection has no timeout of its own, so the first
            // request is timed here. Hyper times the heads of later ones.
            let first_deadline = tokio::time::sleep(read_timeout);
            tokio::pin!(first_deadline);
            let mut awaiting_request = true;

            let result = loop {
                tokio::select! {
                    res = conn.as_mut() => break res,
                    _ = stopping.wait() => {
                        conn.as_mut().graceful_shutdown();
                        break conn.as_mut().await;
                    }
                    _ = first_request.notified(), if awaiting_request => {
                        awaiting_request = false;
                    }
                    _ = &mut first_deadline, if awaiting_request => {
                        tracing::debug!(
                            server = %server,
                            connection_id = %guard.id(),
                            peer_addr = %peer,
                            "No request within read timeout, closing connection"
                        );
                        return;
                    }
                }
            };

            if let Err(e) = result {
                tracing::debug!(
                    server = %server,
                    connection_id = %guard.id(),
                    peer_addr = %peer,
                    error = %e,
                    "Connection ended with error"
                );
            }
        });
    }
}

#[async_trait]
impl Task for HttpServer {
    fn name(&self) -> &str {
        &self.name
    }

    async fn start(&self) -> Result<(), TaskError> {
        let result = self.serve().await;
        self.closed.trigger();
        tracing::info!(server = %self.name, "HTTP server stopped");
        result
    }

    async fn stop(&self, deadline: Instant) -> Result<(), TaskError> {
        let limit = deadline.saturating_duration_since(Instant::now());
        tracing::debug!(
            server = %self.name,
            open_connections = self.open_connections(),
            "Shutting down server"
        );
        self.stopping.trigger();

        // Also aborts if this future is dropped by an outer deadline.
        let abort = AbortOnDrop(Some(&self.aborting));
        if tokio::time::timeout_at(deadline, self.closed.wait()).await.is_ok() {
            abort.disarm();
            return Ok(());
        }

        Err(TaskError::ShutdownTimeout(limit))
    }
}

impl std::fmt::Debug for HttpServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpServer")
            .field("name", &self.name)
            .field("config", &self.config)
            .finish()
    }
}

struct AbortOnDrop<'a>(Option<&'a Shutdown>);

impl AbortOnDrop<'_> {
    fn disarm(mut self) {
        self.0 = None;
    }
}

impl Drop for AbortOnDrop<'_> {
    fn drop(&mut self) {
        if let Some(aborting) = self.0 {
            aborting.trigger();
        }
    }
}

/// Shared handle to a server, as registered with the supervisor.
pub type SharedHttpServer = Arc<HttpServer>;
