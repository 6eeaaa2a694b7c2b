//! Demo HTTP service: API, metrics and health servers run under one supervisor.

pub mod api;
pub mod auth;
pub mod config;
pub mod health;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;

pub use config::ServiceConfig;
pub use http::HttpServer;
pub use lifecycle::{Shutdown, Supervisor, Task};
