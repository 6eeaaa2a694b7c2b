//! Open-connection bookkeeping for one HTTP server.
//!
//! Each accepted connection holds a [`ConnectionGuard`] for as long as its
//! task lives. The guard carries an ID for log correlation and keeps the
//! server's open-connection count, which drain and abort logs report.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Process-wide source of connection IDs.
static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// Log identifier of an accepted connection, shown as `conn-<n>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    fn next() -> Self {
        // Relaxed: only uniqueness matters.
        Self(NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Shared open-connection count of one server.
#[derive(Debug, Clone, Default)]
pub struct ConnectionTracker {
    open: Arc<AtomicU64>,
}

impl ConnectionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count a newly accepted connection until the returned guard drops.
    pub fn track(&self) -> ConnectionGuard {
        self.open.fetch_add(1, Ordering::SeqCst);
        let guard = ConnectionGuard {
            open: Arc::clone(&self.open),
            id: ConnectionId::next(),
        };
        tracing::trace!(connection_id = %guard.id, "Connection opened");
        guard
    }

    pub fn active_count(&self) -> u64 {
        self.open.load(Ordering::SeqCst)
    }
}

/// Membership of one connection in its server's count.
#[derive(Debug)]
pub struct ConnectionGuard {
    open: Arc<AtomicU64>,
    id: ConnectionId,
}

impl ConnectionGuard {
    pub fn id(&self) -> ConnectionId {
        self.id
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.open.fetch_sub(1, Ordering::SeqCst);
        tracing::trace!(connection_id = %self.id, "Connection closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guards_get_distinct_ids() {
        let tracker = ConnectionTracker::new();
        let a = tracker.track();
        let b = tracker.track();
        assert_ne!(a.id(), b.id());
        assert!(a.id().to_string().starts_with("conn-"));
    }

    #[test]
    fn clones_share_one_count() {
        let tracker = ConnectionTracker::new();
        let held = tracker.clone().track();
        assert_eq!(tracker.active_count(), 1);

        drop(held);
        assert_eq!(tracker.active_count(), 0);
    }

    #[tokio::test]
    async fn aborted_connection_task_releases_its_slot() {
        let tracker = ConnectionTracker::new();
        let guard = tracker.track();
        let task = tokio::spawn(async move {
            let _guard = guard;
            std::future::pending::<()>().await;
        });
        assert_eq!(tracker.active_count(), 1);

        task.abort();
        assert!(task.await.unwrap_err().is_cancelled());
        assert_eq!(tracker.active_count(), 0);
    }
}
