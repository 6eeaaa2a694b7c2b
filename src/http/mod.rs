//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection (net::Listener)
//!     → server.rs (hyper auto protocol, graceful drain)
//!     → trailing-slash normalisation, timeouts
//!     → request.rs (request ID, request span)
//!     → router of the server (api, metrics, health)
//!         → compression.rs (optional gzip, api and health)
//! ```

pub mod compression;
pub mod request;
pub mod server;

pub use compression::gzip;
pub use request::{request_id, with_request_tracing, X_REQUEST_ID};
pub use server::{HttpServer, HttpServerConfig, SharedHttpServer};
