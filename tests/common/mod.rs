//! Shared utilities for integration tests.
#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use demo_service::config::ServiceConfig;
use demo_service::lifecycle::{FnTask, TaskError};
use tokio::time::Instant;

/// Stop calls observed across tasks: task name and the deadline it was given.
#[derive(Clone, Default)]
pub struct StopLog(Arc<Mutex<Vec<(String, Instant)>>>);

impl StopLog {
    pub fn record(&self, name: &str, deadline: Instant) {
        self.0.lock().unwrap().push((name.to_string(), deadline));
    }

    pub fn calls(&self, name: &str) -> usize {
        self.0.lock().unwrap().iter().filter(|(n, _)| n == name).count()
    }

    pub fn deadline(&self, name: &str) -> Option<Instant> {
        self.0
            .lock()
            .unwrap()
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, deadline)| *deadline)
    }

    pub fn len(&self) -> usize {
        self.0.lock().unwrap().len()
    }
}

/// Task whose start blocks forever and whose stop succeeds at once.
pub fn blocking_task(name: &str, log: &StopLog) -> FnTask {
    with_logged_stop(FnTask::new(name, || std::future::pending()), name, log)
}

/// Task whose start fails at once with `message`.
pub fn failing_task(name: &str, message: &'static str, log: &StopLog) -> FnTask {
    with_logged_stop(
        FnTask::new(name, move || async move { Err(TaskError::failed(message)) }),
        name,
        log,
    )
}

/// Task whose start blocks forever and whose stop takes `delay`.
pub fn slow_stop_task(name: &str, delay: Duration, log: &StopLog) -> FnTask {
    let log = log.clone();
    let task_name = name.to_string();
    FnTask::new(name, || std::future::pending()).with_stop(move |deadline| {
        log.record(&task_name, deadline);
        async move {
            tokio::time::sleep(delay).await;
            Ok(())
        }
    })
}

fn with_logged_stop(task: FnTask, name: &str, log: &StopLog) -> FnTask {
    let log = log.clone();
    let name = name.to_string();
    task.with_stop(move |deadline| {
        log.record(&name, deadline);
        async { Ok(()) }
    })
}

/// Default configuration with every server on an ephemeral local port.
pub fn local_config() -> ServiceConfig {
    let mut config = ServiceConfig::default();
    config.api.bind_address = "127.0.0.1:0".into();
    config.metrics.bind_address = "127.0.0.1:0".into();
    config.private.bind_address = "127.0.0.1:0".into();
    config.logging.debug = true;
    config
}
