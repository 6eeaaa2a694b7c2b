//! The unit of supervised work.

use std::future::Future;

use async_trait::async_trait;
use futures_util::future::{BoxFuture, FutureExt};
use tokio::time::Instant;

use super::error::TaskError;

/// A supervised unit of work with a start action and an optional stop action.
///
/// `start` runs for the lifetime of the task and only returns when the task
/// was stopped (`Ok`) or could not run (`Err`). `stop` is invoked once, after
/// the shared shutdown signal fired, with an absolute deadline.
#[async_trait]
pub trait Task: Send + Sync {
    /// Identifier used in logs and errors.
    fn name(&self) -> &str;

    /// Run the task until it is stopped or fails.
    async fn start(&self) -> Result<(), TaskError>;

    /// Stop the task, finishing before `deadline`.
    async fn stop(&self, _deadline: Instant) -> Result<(), TaskError> {
        Ok(())
    }
}

type StartFn = Box<dyn Fn() -> BoxFuture<'static, Result<(), TaskError>> + Send + Sync>;
type StopFn = Box<dyn Fn(Instant) -> BoxFuture<'static, Result<(), TaskError>> + Send + Sync>;

/// A [`Task`] assembled from closures.
pub struct FnTask {
    name: String,
    start: StartFn,
    stop: Option<StopFn>,
}

impl FnTask {
    /// Create a task from a start closure. The task has no stop action.
    pub fn new<F, Fut>(name: impl Into<String>, start: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), TaskError>> + Send + 'static,
    {
        Self {
            name: name.into(),
            start: Box::new(move || start().boxed()),
            stop: None,
        }
    }

    /// Attach a stop closure, called with the shutdown deadline.
    pub fn with_stop<F, Fut>(mut self, stop: F) -> Self
    where
        F: Fn(Instant) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), TaskError>> + Send + 'static,
    {
        self.stop = Some(Box::new(move |deadline| stop(deadline).boxed()));
        self
    }
}

impl std::fmt::Debug for FnTask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnTask")
            .field("name", &self.name)
            .field("has_stop", &self.stop.is_some())
            .finish()
    }
}

#[async_trait]
impl Task for FnTask {
    fn name(&self) -> &str {
        &self.name
    }

    async fn start(&self) -> Result<(), TaskError> {
        (self.start)().await
    }

    async fn stop(&self, deadline: Instant) -> Result<(), TaskError> {
        match &self.stop {
            Some(stop) => stop(deadline).await,
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn fn_task_without_stop_is_noop() {
        let task = FnTask::new("noop", || async { Ok(()) });
        assert_eq!(task.name(), "noop");
        assert!(task.start().await.is_ok());
        assert!(task.stop(Instant::now()).await.is_ok());
    }

    #[tokio::test]
    async fn fn_task_calls_stop() {
        let stopped = Arc::new(AtomicBool::new(false));
        let flag = stopped.clone();
        let task = FnTask::new("worker", || async { Ok(()) }).with_stop(move |_| {
            let flag = flag.clone();
            async move {
                flag.store(true, Ordering::SeqCst);
                Ok(())
            }
        });

        task.stop(Instant::now()).await.unwrap();
        assert!(stopped.load(Ordering::SeqCst));
    }
}
