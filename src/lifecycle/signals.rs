//! OS signal handling.
//!
//! SIGINT and SIGTERM trigger the shared shutdown signal. Only the first
//! signal does anything; the bridge keeps listening so repeats are logged
//! instead of falling through to the default handler.

use tokio::task::JoinHandle;

use super::shutdown::Shutdown;

/// Which termination request arrived.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationSignal {
    Interrupt,
    Terminate,
}

impl std::fmt::Display for TerminationSignal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TerminationSignal::Interrupt => write!(f, "SIGINT"),
            TerminationSignal::Terminate => write!(f, "SIGTERM"),
        }
    }
}

/// Source of termination requests.
struct Signals {
    #[cfg(unix)]
    terminate: tokio::signal::unix::Signal,
}

impl Signals {
    fn install() -> std::io::Result<Self> {
        Ok(Self {
            #[cfg(unix)]
            terminate: tokio::signal::unix::signal(
                tokio::signal::unix::SignalKind::terminate(),
            )?,
        })
    }

    #[cfg(unix)]
    async fn recv(&mut self) -> std::io::Result<TerminationSignal> {
        tokio::select! {
            res = tokio::signal::ctrl_c() => res.map(|()| TerminationSignal::Interrupt),
            _ = self.terminate.recv() => Ok(TerminationSignal::Terminate),
        }
    }

    #[cfg(not(unix))]
    async fn recv(&mut self) -> std::io::Result<TerminationSignal> {
        tokio::signal::ctrl_c()
            .await
            .map(|()| TerminationSignal::Interrupt)
    }
}

/// Install signal handlers and forward the first termination request to `shutdown`.
///
/// Fails only if the handlers cannot be registered. The returned task runs
/// until the process exits.
pub fn spawn_signal_bridge(shutdown: Shutdown) -> std::io::Result<JoinHandle<()>> {
    let mut signals = Signals::install()?;

    Ok(tokio::spawn(async move {
        loop {
            match signals.recv().await {
                Ok(signal) => {
                    if shutdown.trigger() {
                        tracing::info!(signal = %signal, "Shutdown signal received");
                    } else {
                        tracing::info!(signal = %signal, "Shutdown already in progress, signal ignored");
                    }
                }
                Err(e) => {
                    tracing::error!(error = %e, "Signal handler failed, bridge exiting");
                    return;
                }
            }
        }
    }))
}
