//! Circuit breaker probes for the service's dependencies.

use async_trait::async_trait;
use std::sync::Arc;
use utilisync_server::{Probe, ProbeError};

use crate::users::UserStore;

/// Pings the user store.
pub struct StoreProbe {
    store: Arc<dyn UserStore>,
}

impl StoreProbe {
    /// Probe name used in logs and metrics.
    pub const NAME: &'static str = "user-store";

    /// Creates a probe for `store`.
    pub fn new(store: Arc<dyn UserStore>) -> Self {
        Self { store }
    }
}

impl std::fmt::Debug for StoreProbe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreProbe").finish_non_exhaustive()
    }
}

#[async_trait]
impl Probe for StoreProbe {
    fn name(&self) -> &str {
        Self::NAME
    }

    async fn check(&self) -> Result<(), ProbeError> {
        self.store
            .ping()
            .await
            .map_err(|e| ProbeError::new("user store ping failed").with_source(e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::users::InMemoryUserStore;
    use std::error::Error as _;

    #[tokio::test]
    async fn test_store_probe() {
        let store = Arc::new(InMemoryUserStore::new());
        let probe = StoreProbe::new(store.clone());
        assert_eq!(probe.name(), "user-store");
        assert!(probe.check().await.is_ok());

        store.set_offline(true);
        let err = probe.check().await.unwrap_err();
        assert_eq!(err.to_string(), "user store ping failed");
        assert_eq!(
            err.source().map(ToString::to_string).as_deref(),
            Some("user store unavailable")
        );
    }
}
