//! Server lifecycle state machine.
//!
//! ```text
//! Unstarted --start--> Starting --listen--> Ready <--trip/recover--> Live
//!                                             |                        |
//!                                             +-------begin_stop-------+--> Stopping
//! ```
//!
//! Only `Ready` serves business routes. `Live` means at least one circuit
//! breaker probe is failing; `listen` (or a clean poll) brings it back.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::info;
use utilisync_telemetry::metrics::record_server_state;

/// Lifecycle state of a [`Server`](crate::Server).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServerState {
    /// Constructed, nothing bound yet.
    #[default]
    Unstarted,
    /// Listener bound, routes not yet open.
    Starting,
    /// Serving business routes.
    Ready,
    /// Degraded: a dependency probe is failing, business routes answer 503.
    Live,
    /// Shutting down. Terminal.
    Stopping,
}

impl ServerState {
    /// Returns the wire name of the state.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Unstarted => "unstarted",
            Self::Starting => "starting",
            Self::Ready => "ready",
            Self::Live => "live",
            Self::Stopping => "stopping",
        }
    }
}

impl fmt::Display for ServerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Default)]
struct Inner {
    state: ServerState,
    failures: u32,
}

/// Shared lifecycle state plus the consecutive probe failure counter.
///
/// Both live behind one lock so a poll tick observes and updates them
/// atomically with respect to `listen` and `stop`.
#[derive(Debug, Default)]
pub struct Lifecycle {
    inner: Mutex<Inner>,
}

impl Lifecycle {
    /// Creates a lifecycle in [`ServerState::Unstarted`].
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> ServerState {
        self.inner.lock().state
    }

    /// Consecutive failed polls since the last reset.
    #[must_use]
    pub fn failures(&self) -> u32 {
        self.inner.lock().failures
    }

    /// Unstarted → Starting.
    pub fn start(&self) -> bool {
        self.transition(&[ServerState::Unstarted], ServerState::Starting, false)
    }

    /// Starting or Live → Ready.
    pub fn listen(&self) -> bool {
        self.transition(
            &[ServerState::Starting, ServerState::Live],
            ServerState::Ready,
            true,
        )
    }

    /// Ready or Live → Stopping.
    pub fn begin_stop(&self) -> bool {
        self.transition(
            &[ServerState::Ready, ServerState::Live],
            ServerState::Stopping,
            false,
        )
    }

    /// Ready → Live, on the first failed probe.
    pub fn trip(&self) -> bool {
        self.transition(&[ServerState::Ready], ServerState::Live, false)
    }

    /// Live → Ready with the failure counter reset, once every probe passes.
    pub fn recover(&self) -> bool {
        self.transition(&[ServerState::Live], ServerState::Ready, true)
    }

    /// Counts one more failed poll and returns the new total.
    pub fn record_failure(&self) -> u32 {
        let mut inner = self.inner.lock();
        inner.failures = inner.failures.saturating_add(1);
        inner.failures
    }

    fn transition(&self, from: &[ServerState], to: ServerState, reset: bool) -> bool {
        let mut inner = self.inner.lock();
        if !from.contains(&inner.state) {
            return false;
        }
        let previous = inner.state;
        inner.state = to;
        if reset {
            inner.failures = 0;
        }
        drop(inner);

        record_server_state(to.as_str());
        info!(from = %previous, to = %to, "server state changed");
        true
    }
}
