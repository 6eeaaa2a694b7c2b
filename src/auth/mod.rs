//! Authentication against the external identity services.
//!
//! # Data Flow
//! ```text
//! request with SID cookie
//!     → middleware.rs (extract cookie, mode decides on failure)
//!     → client.rs (POST token to the auth host)
//!     → RequestIdentity extension → handler
//! ```

pub mod client;
pub mod middleware;
pub mod mock;

pub use client::{AuthClient, AuthError, Entity, ExternalClient, SESSION_COOKIE_NAME};
pub use middleware::{authenticate, Authenticator, RequestIdentity};
