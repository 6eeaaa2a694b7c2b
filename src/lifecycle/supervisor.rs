//! Coordinated start and shutdown of a group of tasks.
//!
//! # Data Flow
//! ```text
//! register(task)*  →  run()
//!     spawn every start action
//!     wait: shutdown fired  OR  a start action failed  OR  every start returned
//!     fire shutdown (idempotent)
//!     spawn every stop action with deadline = fired_at + shutdown_deadline
//!     join stops, abandon starts still running
//!     return first start failure, else first stop failure, else Ok
//! ```

use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use futures_util::FutureExt;
use tokio::task::JoinSet;
use tokio::time::Instant;

use super::error::{LifecycleError, TaskError};
use super::shutdown::Shutdown;
use super::task::Task;

/// Deadline given to every stop action, measured from the moment shutdown fired.
pub const DEFAULT_SHUTDOWN_DEADLINE: Duration = Duration::from_secs(30);

/// Stand-in deadline when `fired_at + shutdown_deadline` is not representable.
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

/// Supervisor settings.
#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    /// Time each stop action gets after shutdown fires.
    pub shutdown_deadline: Duration,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            shutdown_deadline: DEFAULT_SHUTDOWN_DEADLINE,
        }
    }
}

enum Registry {
    Open(Vec<Arc<dyn Task>>),
    Closed,
}

/// First-failure-wins record of task errors.
///
/// Start and stop failures are kept apart so a start failure always wins,
/// whatever order the two were observed in.
#[derive(Default)]
struct Outcome {
    start: Mutex<Option<LifecycleError>>,
    stop: Mutex<Option<LifecycleError>>,
}

impl Outcome {
    fn record(slot: &Mutex<Option<LifecycleError>>, err: LifecycleError) {
        let mut slot = slot.lock().unwrap_or_else(PoisonError::into_inner);
        match slot.as_ref() {
            None => *slot = Some(err),
            Some(first) => tracing::debug!(
                error = %err,
                first = %first,
                "Additional task failure not reported"
            ),
        }
    }

    fn record_start(&self, task: &str, source: TaskError) {
        Self::record(
            &self.start,
            LifecycleError::Start {
                task: task.to_owned(),
                source,
            },
        );
    }

    fn record_stop(&self, task: &str, source: TaskError) {
        Self::record(
            &self.stop,
            LifecycleError::Stop {
                task: task.to_owned(),
                source,
            },
        );
    }

    fn take(&self) -> Result<(), LifecycleError> {
        let start = self
            .start
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let stop = self
            .stop
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        match start.or(stop) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

/// Owns a group of tasks and runs them under one shutdown signal.
pub struct Supervisor {
    config: SupervisorConfig,
    shutdown: Shutdown,
    registry: Mutex<Registry>,
}

impl Supervisor {
    /// Create an empty supervisor with its own shutdown signal.
    pub fn new(config: SupervisorConfig) -> Self {
        Self::with_shutdown(config, Shutdown::new())
    }

    /// Create an empty supervisor driven by an existing shutdown signal.
    pub fn with_shutdown(config: SupervisorConfig, shutdown: Shutdown) -> Self {
        Self {
            config,
            shutdown,
            registry: Mutex::new(Registry::Open(Vec::new())),
        }
    }

    /// Handle to the shared shutdown signal. Triggering it stops every task.
    pub fn shutdown_signal(&self) -> Shutdown {
        self.shutdown.clone()
    }

    /// Add a task. Fails with [`LifecycleError::AlreadyRunning`] once `run` began.
    pub fn register<T>(&self, task: T) -> Result<(), LifecycleError>
    where
        T: Task + 'static,
    {
        self.register_arc(Arc::new(task))
    }

    /// Add a shared task.
    pub fn register_arc(&self, task: Arc<dyn Task>) -> Result<(), LifecycleError> {
        let mut registry = self.registry.lock().unwrap_or_else(PoisonError::into_inner);
        match &mut *registry {
            Registry::Open(tasks) => {
                tracing::debug!(task = %task.name(), "Registering task");
                tasks.push(task);
                Ok(())
            }
            Registry::Closed => {
                tracing::warn!(task = %task.name(), "Registration rejected, supervisor is running");
                Err(LifecycleError::AlreadyRunning)
            }
        }
    }

    /// Number of tasks registered so far (zero once `run` began).
    pub fn len(&self) -> usize {
        match &*self.registry.lock().unwrap_or_else(PoisonError::into_inner) {
            Registry::Open(tasks) => tasks.len(),
            Registry::Closed => 0,
        }
    }

    /// Whether no tasks are registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn close_registration(&self) -> Result<Vec<Arc<dyn Task>>, LifecycleError> {
        let mut registry = self.registry.lock().unwrap_or_else(PoisonError::into_inner);
        match std::mem::replace(&mut *registry, Registry::Closed) {
            Registry::Open(tasks) => Ok(tasks),
            Registry::Closed => Err(LifecycleError::AlreadyRunning),
        }
    }

    /// Run every registered task until shutdown, then stop them all.
    ///
    /// Shutdown begins when the shared signal is triggered, when any start
    /// action fails, or when every start action has returned. Each stop action
    /// then runs concurrently with a deadline of `shutdown_deadline` from the
    /// moment shutdown fired.
    ///
    /// Returns the start failure that triggered shutdown if there is one,
    /// otherwise the first stop failure, otherwise `Ok`.
    pub async fn run(&self) -> Result<(), LifecycleError> {
        let tasks = self.close_registration()?;
        let outcome = Arc::new(Outcome::default());

        tracing::info!(tasks = tasks.len(), "Supervisor starting");
        if tasks.is_empty() {
            tracing::info!("No tasks registered, nothing to supervise");
            self.shutdown.trigger();
        }

        let running = Arc::new(AtomicUsize::new(tasks.len()));
        let mut starts = JoinSet::new();
        for task in &tasks {
            let task = Arc::clone(task);
            let shutdown = self.shutdown.clone();
            let outcome = Arc::clone(&outcome);
            let running = Arc::clone(&running);

            starts.spawn(async move {
                let name = task.name();
                tracing::debug!(task = %name, "Starting task");

                match guarded(task.start()).await {
                    Ok(()) => tracing::info!(task = %name, "Task exited"),
                    Err(err) => {
                        tracing::error!(task = %name, error = %err, "Task failed serving");
                        outcome.record_start(name, err);
                        if shutdown.trigger() {
                            tracing::info!(task = %name, "Shutdown triggered by task failure");
                        }
                    }
                }

                if running.fetch_sub(1, Ordering::AcqRel) == 1 && shutdown.trigger() {
                    tracing::info!("All tasks exited, shutting down");
                }
            });
        }

        self.shutdown.wait().await;
        let limit = self.config.shutdown_deadline;
        let fired_at = self.shutdown.fired_at().unwrap_or_else(Instant::now);
        let deadline = fired_at
            .checked_add(limit)
            .unwrap_or_else(|| fired_at + FAR_FUTURE);
        tracing::info!(deadline_secs = limit.as_secs_f64(), "Shutting down tasks");

        let mut stops = JoinSet::new();
        for task in tasks {
            let outcome = Arc::clone(&outcome);

            stops.spawn(async move {
                let name = task.name();
                tracing::debug!(task = %name, "Shutting down task");

                let result = tokio::time::timeout_at(deadline, guarded(task.stop(deadline)))
                    .await
                    .unwrap_or_else(|_| Err(TaskError::ShutdownTimeout(limit)));

                match result {
                    Ok(()) => tracing::debug!(task = %name, "Shutdown successful"),
                    Err(err) => {
                        tracing::warn!(task = %name, error = %err, "Task failed shutdown");
                        outcome.record_stop(name, err);
                    }
                }
            });
        }

        while let Some(joined) = stops.join_next().await {
            if let Err(err) = joined {
                tracing::error!(error = %err, "Stop action aborted");
            }
        }

        // A start still pending after its stop finished has nothing left to serve.
        starts.abort_all();
        while let Some(joined) = starts.join_next().await {
            match joined {
                Ok(()) => {}
                Err(err) if err.is_cancelled() => {
                    tracing::debug!("Task start abandoned after shutdown")
                }
                Err(err) => tracing::error!(error = %err, "Start action aborted"),
            }
        }

        let result = outcome.take();
        match &result {
            Ok(()) => tracing::info!("Supervisor stopped"),
            Err(err) => tracing::error!(error = %err, "Supervisor stopped with error"),
        }
        result
    }
}

impl Default for Supervisor {
    fn default() -> Self {
        Self::new(SupervisorConfig::default())
    }
}

/// Run a task action, turning a panic into [`TaskError::Panicked`].
async fn guarded<F>(action: F) -> Result<(), TaskError>
where
    F: Future<Output = Result<(), TaskError>>,
{
    AssertUnwindSafe(action)
        .catch_unwind()
        .await
        .unwrap_or_else(|panic| Err(TaskError::Panicked(panic_message(panic.as_ref()))))
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(msg) = panic.downcast_ref::<&str>() {
        (*msg).to_owned()
    } else if let Some(msg) = panic.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_owned()
    }
}
