//! Shutdown coordination.
//!
//! The server owns one [`ShutdownSignal`]. `stop()`, the circuit breaker
//! threshold and (in the binary) SIGINT/SIGTERM all cancel it; the accept
//! loop, the poll loop and every open connection watch it.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;
use tracing::{info, warn};
use utilisync_core::CancelToken;

/// Server-wide shutdown token. Request contexts carry a clone.
pub type ShutdownSignal = CancelToken;

/// Resolves on SIGINT or SIGTERM.
///
/// If the SIGTERM handler cannot be installed, only Ctrl+C is watched.
pub async fn os_shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = sigterm.recv() => info!("received SIGTERM, shutting down"),
                    _ = ctrl_c() => info!("received SIGINT, shutting down"),
                }
                return;
            }
            Err(e) => warn!(error = %e, "failed to install SIGTERM handler"),
        }
    }

    ctrl_c().await;
    info!("received SIGINT, shutting down");
}

async fn ctrl_c() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for Ctrl+C");
        std::future::pending::<()>().await;
    }
}

/// Counts open connections so shutdown can wait for them.
#[derive(Debug, Clone, Default)]
pub struct ConnectionTracker {
    active: Arc<AtomicUsize>,
    notify: Arc<Notify>,
}

impl ConnectionTracker {
    /// Creates a tracker with no connections.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a connection until the token is dropped.
    #[must_use]
    pub fn acquire(&self) -> ConnectionToken {
        self.active.fetch_add(1, Ordering::SeqCst);
        ConnectionToken {
            active: Arc::clone(&self.active),
            notify: Arc::clone(&self.notify),
        }
    }

    /// Number of open connections.
    #[must_use]
    pub fn active_connections(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    /// Resolves once every token has been dropped.
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.notify.notified();
            if self.active.load(Ordering::SeqCst) == 0 {
                return;
            }
            notified.await;
        }
    }
}

/// One open connection. Dropping it releases the slot.
#[derive(Debug)]
pub struct ConnectionToken {
    active: Arc<AtomicUsize>,
    notify: Arc<Notify>,
}

impl Drop for ConnectionToken {
    fn drop(&mut self) {
        if self.active.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.notify.notify_waiters();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_tracker_counts() {
        let tracker = ConnectionTracker::new();
        let a = tracker.acquire();
        let b = tracker.acquire();
        assert_eq!(tracker.active_connections(), 2);

        drop(a);
        assert_eq!(tracker.active_connections(), 1);
        drop(b);
        assert_eq!(tracker.active_connections(), 0);
    }

    #[tokio::test]
    async fn test_wait_idle_immediate() {
        let tracker = ConnectionTracker::new();
        tokio::time::timeout(Duration::from_millis(50), tracker.wait_idle())
            .await
            .expect("no connections means idle");
    }

    #[tokio::test]
    async fn test_wait_idle_after_release() {
        let tracker = ConnectionTracker::new();
        let token = tracker.acquire();

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            drop(token);
        });

        tokio::time::timeout(Duration::from_secs(1), tracker.wait_idle())
            .await
            .expect("should become idle");
    }

    #[tokio::test]
    async fn test_wait_idle_blocks_while_open() {
        let tracker = ConnectionTracker::new();
        let _token = tracker.acquire();
        let result = tokio::time::timeout(Duration::from_millis(20), tracker.wait_idle()).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_shutdown_signal_is_shared() {
        let signal = ShutdownSignal::new();
        let clone = signal.clone();
        signal.cancel();
        tokio::time::timeout(Duration::from_millis(50), clone.cancelled())
            .await
            .expect("clone observes cancel");
    }
}
