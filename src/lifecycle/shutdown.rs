//! Shutdown coordination for the service.

use std::sync::Arc;

use tokio::sync::watch;
use tokio::time::Instant;

/// Single-fire shutdown signal shared by every supervised task.
///
/// Once triggered it stays triggered. Triggering again is a no-op, so any
/// number of clones may race to fire it. The instant of the first trigger
/// is kept, so deadlines can be measured from it.
#[derive(Debug, Clone)]
pub struct Shutdown {
    tx: Arc<watch::Sender<Option<Instant>>>,
}

impl Shutdown {
    /// Create a new, untriggered shutdown signal.
    pub fn new() -> Self {
        let (tx, _) = watch::channel(None);
        Self { tx: Arc::new(tx) }
    }

    /// Trigger the shutdown signal.
    ///
    /// Returns `true` only for the call that actually fired it.
    pub fn trigger(&self) -> bool {
        self.tx.send_if_modified(|fired| {
            if fired.is_some() {
                false
            } else {
                *fired = Some(Instant::now());
                true
            }
        })
    }

    /// Whether the signal has fired.
    pub fn is_triggered(&self) -> bool {
        self.tx.borrow().is_some()
    }

    /// When the signal fired, if it has.
    pub fn fired_at(&self) -> Option<Instant> {
        *self.tx.borrow()
    }

    /// Wait until the signal fires. Returns immediately if it already has.
    pub async fn wait(&self) {
        let mut rx = self.tx.subscribe();
        // The sender lives as long as `self`, so this cannot observe a closed channel.
        let _ = rx.wait_for(Option::is_some).await;
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}
