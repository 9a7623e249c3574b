//! Cooperative cancellation.
//!
//! A [`CancelToken`] is a cloneable flag with async notification. The server
//! uses one token for its own shutdown and hands a clone to every request
//! context, so long-running collaborators can abandon work once the process
//! is stopping.
//!
//! # Example
//!
//! ```rust,ignore
//! use utilisync_core::CancelToken;
//! use std::time::Duration;
//!
//! let token = CancelToken::new();
//! tokio::select! {
//!     _ = token.cancelled() => println!("cancelled"),
//!     _ = tokio::time::sleep(Duration::from_secs(5)) => println!("finished"),
//! }
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::broadcast;

/// Cloneable cancellation flag. All clones observe the same state.
#[derive(Debug, Clone)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
    sender: broadcast::Sender<()>,
}

impl CancelToken {
    /// Creates a token that has not been cancelled.
    #[must_use]
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(1);
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
            sender,
        }
    }

    /// Cancels the token, waking every pending [`CancelToken::cancelled`] call.
    ///
    /// Returns `true` for the call that actually flipped the flag.
    pub fn cancel(&self) -> bool {
        if self
            .cancelled
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
        {
            // no receivers is fine
            let _ = self.sender.send(());
            true
        } else {
            false
        }
    }

    /// Returns `true` once the token has been cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Completes when the token is cancelled.
    pub async fn cancelled(&self) {
        let mut receiver = self.sender.subscribe();
        if self.is_cancelled() {
            return;
        }
        // any outcome, including a closed channel, means stop waiting
        let _ = receiver.recv().await;
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_new_token_is_not_cancelled() {
        let token = CancelToken::new();
        assert!(!token.is_cancelled());
    }

    #[test]
    fn test_cancel_is_idempotent() {
        let token = CancelToken::new();
        assert!(token.cancel());
        assert!(!token.cancel());
        assert!(token.is_cancelled());
    }

    #[test]
    fn test_clones_share_state() {
        let token = CancelToken::new();
        let clone = token.clone();
        clone.cancel();
        assert!(token.is_cancelled());
    }

    #[tokio::test]
    async fn test_cancelled_completes_when_cancelled_later() {
        let token = CancelToken::new();
        let clone = token.clone();

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            clone.cancel();
        });

        tokio::time::timeout(Duration::from_secs(1), token.cancelled())
            .await
            .expect("cancelled should complete");
    }

    #[tokio::test]
    async fn test_cancelled_completes_immediately_if_already_cancelled() {
        let token = CancelToken::new();
        token.cancel();

        tokio::time::timeout(Duration::from_millis(10), token.cancelled())
            .await
            .expect("cancelled should complete immediately");
    }

    #[tokio::test]
    async fn test_cancelled_stays_pending_without_cancel() {
        let token = CancelToken::new();
        let result = tokio::time::timeout(Duration::from_millis(20), token.cancelled()).await;
        assert!(result.is_err());
    }
}
