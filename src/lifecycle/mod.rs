//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Validated config → Build servers → Register with supervisor
//!
//! Supervision (supervisor.rs):
//!     Start every task → first failure or signal fires shutdown
//!     → Stop every task against one deadline → Report first failure
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown (once)
//! ```
//!
//! # Design Decisions
//! - One shutdown signal per process, fired at most once
//! - Shutdown has a deadline: stops still running at the deadline fail
//! - Start failures take precedence over stop failures when reporting

pub mod error;
pub mod shutdown;
pub mod signals;
pub mod startup;
pub mod supervisor;
pub mod task;

pub use error::{BoxError, LifecycleError, TaskError};
pub use shutdown::Shutdown;
pub use signals::{spawn_signal_bridge, TerminationSignal};
pub use startup::{build_services, Services, StartupError};
pub use supervisor::{Supervisor, SupervisorConfig, DEFAULT_SHUTDOWN_DEADLINE};
pub use task::{FnTask, Task};
