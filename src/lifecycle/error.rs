//! Error types for supervised tasks.

use std::time::Duration;

/// Boxed error produced by task-defined failures.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Failure of a single task action (start or stop).
#[derive(Debug, thiserror::Error)]
pub enum TaskError {
    /// The task could not begin serving (bind, accept or serve failure).
    #[error("failed to bind or accept: {0}")]
    BindOrAcceptFailure(#[source] std::io::Error),

    /// The stop action did not finish before its deadline.
    #[error("shutdown exceeded deadline of {0:?}")]
    ShutdownTimeout(Duration),

    /// The action panicked.
    #[error("task panicked: {0}")]
    Panicked(String),

    /// Any other task-defined failure.
    #[error(transparent)]
    Failed(BoxError),
}

impl TaskError {
    /// Wrap an arbitrary error as a task failure.
    pub fn failed<E>(err: E) -> Self
    where
        E: Into<BoxError>,
    {
        TaskError::Failed(err.into())
    }
}

/// Error returned by [`Supervisor`](super::Supervisor) operations.
#[derive(Debug, thiserror::Error)]
pub enum LifecycleError {
    /// Registration was attempted after `run` began.
    #[error("supervisor is already running")]
    AlreadyRunning,

    /// A task's start action failed.
    #[error("task {task} failed serving: {source}")]
    Start {
        task: String,
        #[source]
        source: TaskError,
    },

    /// A task's stop action failed.
    #[error("task {task} failed shutdown: {source}")]
    Stop {
        task: String,
        #[source]
        source: TaskError,
    },
}

impl LifecycleError {
    /// Name of the task that produced this error, if any.
    pub fn task(&self) -> Option<&str> {
        match self {
            LifecycleError::AlreadyRunning => None,
            LifecycleError::Start { task, .. } | LifecycleError::Stop { task, .. } => Some(task),
        }
    }

    /// The underlying task failure, if any.
    pub fn task_error(&self) -> Option<&TaskError> {
        match self {
            LifecycleError::AlreadyRunning => None,
            LifecycleError::Start { source, .. } | LifecycleError::Stop { source, .. } => {
                Some(source)
            }
        }
    }
}
