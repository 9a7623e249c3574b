//! Circuit breaker probes and the poll loop that drives the lifecycle.
//!
//! Every `wait` the monitor runs the registered probes:
//!
//! - In `Ready`, probes run in order and the first failure trips the
//!   server to `Live`.
//! - In `Live`, every probe runs. A clean pass recovers to `Ready`; otherwise
//!   the failure counter grows and, at the threshold, the server stops.
//!
//! Any other state is left alone.

use async_trait::async_trait;
use std::error::Error as StdError;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, info, warn};
use utilisync_core::CancelToken;
use utilisync_telemetry::metrics::record_probe_failure;

use crate::lifecycle::{Lifecycle, ServerState};

/// A failed probe run.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct ProbeError {
    message: String,
    #[source]
    source: Option<Box<dyn StdError + Send + Sync + 'static>>,
}

impl ProbeError {
    /// Creates a probe error with a message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    /// Attaches the underlying error.
    #[must_use]
    pub fn with_source(mut self, source: impl Into<Box<dyn StdError + Send + Sync>>) -> Self {
        self.source = Some(source.into());
        self
    }
}

/// A dependency health check.
#[async_trait]
pub trait Probe: Send + Sync + 'static {
    /// Name used in logs and metrics.
    fn name(&self) -> &str;

    /// Checks the dependency once.
    async fn check(&self) -> Result<(), ProbeError>;
}

/// Adapts an async closure into a [`Probe`].
///
/// ```
/// use utilisync_server::{FnProbe, ProbeError};
///
/// let probe = FnProbe::new("always-up", || async { Ok::<(), ProbeError>(()) });
/// ```
pub struct FnProbe<F> {
    name: String,
    check: F,
}

impl<F> FnProbe<F> {
    /// Wraps `check` under `name`.
    pub fn new(name: impl Into<String>, check: F) -> Self {
        Self {
            name: name.into(),
            check,
        }
    }
}

#[async_trait]
impl<F, Fut> Probe for FnProbe<F>
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), ProbeError>> + Send + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn check(&self) -> Result<(), ProbeError> {
        (self.check)().await
    }
}

/// Ordered probe registry. Written during startup, read by the poll loop.
#[derive(Clone, Default)]
pub struct CircuitBreakers {
    probes: Vec<Arc<dyn Probe>>,
}

impl CircuitBreakers {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a probe.
    pub fn add(&mut self, probe: impl Probe) {
        self.probes.push(Arc::new(probe));
    }

    /// Appends already shared probes, keeping their order.
    pub fn extend(&mut self, probes: impl IntoIterator<Item = Arc<dyn Probe>>) {
        self.probes.extend(probes);
    }

    /// Number of registered probes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.probes.len()
    }

    /// Whether no probe is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.probes.is_empty()
    }

    /// Probes in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn Probe>> {
        self.probes.iter()
    }
}

impl std::fmt::Debug for CircuitBreakers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.probes.iter().map(|p| p.name()))
            .finish()
    }
}

/// What a single poll did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// The server was neither Ready nor Live; nothing ran.
    Idle,
    /// Ready and every probe passed.
    Healthy,
    /// Ready → Live on a failed probe.
    Tripped,
    /// Live → Ready, every probe passed.
    Recovered,
    /// Still Live; `attempt` consecutive failed polls so far.
    StillFailing {
        /// Consecutive failed polls.
        attempt: u32,
    },
    /// The threshold was reached. The caller should stop the server.
    ThresholdReached,
}

/// Drives [`Lifecycle`] from the probe results.
#[derive(Debug, Clone)]
pub struct CircuitMonitor {
    lifecycle: Arc<Lifecycle>,
    breakers: CircuitBreakers,
    wait: Duration,
    threshold: u32,
}

impl CircuitMonitor {
    /// Creates a monitor polling every `wait`, giving up after `threshold`
    /// consecutive failed polls while Live.
    #[must_use]
    pub fn new(
        lifecycle: Arc<Lifecycle>,
        breakers: CircuitBreakers,
        wait: Duration,
        threshold: u32,
    ) -> Self {
        Self {
            lifecycle,
            breakers,
            wait,
            threshold: threshold.max(1),
        }
    }

    /// Runs one poll.
    pub async fn tick(&self) -> TickOutcome {
        match self.lifecycle.state() {
            ServerState::Ready => self.tick_ready().await,
            ServerState::Live => self.tick_live().await,
            _ => TickOutcome::Idle,
        }
    }

    async fn tick_ready(&self) -> TickOutcome {
        for probe in self.breakers.iter() {
            if let Err(e) = probe.check().await {
                probe_failed(probe.as_ref(), &e);
                if self.lifecycle.trip() {
                    return TickOutcome::Tripped;
                }
                // lost a race with stop
                return TickOutcome::Idle;
            }
        }
        TickOutcome::Healthy
    }

    async fn tick_live(&self) -> TickOutcome {
        let mut failed = false;
        for probe in self.breakers.iter() {
            if let Err(e) = probe.check().await {
                probe_failed(probe.as_ref(), &e);
                failed = true;
            }
        }

        if !failed {
            if self.lifecycle.recover() {
                info!("circuit breakers reset.");
                return TickOutcome::Recovered;
            }
            return TickOutcome::Idle;
        }

        let attempt = self.lifecycle.record_failure();
        warn!(attempt, threshold = self.threshold, "circuits in error");
        if attempt >= self.threshold {
            error!("circuit breaker threshold reached. stopping server.");
            TickOutcome::ThresholdReached
        } else {
            TickOutcome::StillFailing { attempt }
        }
    }

    /// Polls until `shutdown` fires.
    ///
    /// Reaching the threshold moves the lifecycle to `Stopping` and cancels
    /// `shutdown`, which also ends the accept loop.
    pub async fn run(self, shutdown: CancelToken) {
        debug!(
            wait = ?self.wait,
            threshold = self.threshold,
            probes = self.breakers.len(),
            "circuit breaker poll loop started"
        );

        loop {
            tokio::select! {
                () = shutdown.cancelled() => break,
                () = tokio::time::sleep(self.wait) => {}
            }

            if self.tick().await == TickOutcome::ThresholdReached {
                self.lifecycle.begin_stop();
                shutdown.cancel();
                break;
            }
        }

        debug!("circuit breaker poll loop stopped");
    }
}

fn probe_failed(probe: &dyn Probe, err: &ProbeError) {
    record_probe_failure(probe.name());
    warn!(probe = probe.name(), error = %err, "circuit breaker probe failed");
}
