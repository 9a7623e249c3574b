//! Wiring: configuration in, running server out.

use anyhow::Context as _;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info};
use utilisync_config::{Environment, LogFormat, UtilisyncConfig};
use utilisync_core::TokenVerifier;
use utilisync_server::{HttpsOnly, Server, ServerConfig};
use utilisync_telemetry::{LogConfig, LogOutput, MetricsConfig, TelemetryConfig};

use crate::password::{ConstantPassword, Passphrase, PasswordGenerator};
use crate::probes::StoreProbe;
use crate::token::{JwtTokens, TokenSettings};
use crate::users::{register_user_routes, InMemoryUserStore, LogNotifier, UserService};

/// A fully wired, not yet started service.
#[derive(Debug)]
pub struct Application {
    /// The HTTP server with every route, middleware and probe registered.
    pub server: Server,
    /// The user service behind the `/users/*` routes.
    pub users: Arc<UserService>,
    /// The backing store.
    pub store: Arc<InMemoryUserStore>,
    /// Token issuer and verifier.
    pub tokens: Arc<JwtTokens>,
}

/// Maps the `server` section onto the server's own configuration.
#[must_use]
pub fn server_config(config: &UtilisyncConfig) -> ServerConfig {
    let server = &config.server;
    ServerConfig::builder()
        .http_addr(server.http_addr.clone())
        .api_prefix(server.api_prefix.clone())
        .circuit_breaker_wait(Duration::from_secs(server.circuit_breaker_wait_secs))
        .circuit_breaker_threshold(server.circuit_breaker_threshold)
        .shutdown_timeout(Duration::from_secs(server.shutdown_timeout_secs))
        .request_timeout(Duration::from_millis(server.request_timeout_ms))
        .build()
}

/// Maps the `telemetry` section onto the telemetry crate's configuration.
#[must_use]
pub fn telemetry_config(config: &UtilisyncConfig) -> TelemetryConfig {
    let section = &config.telemetry;
    let output = match section.logging.format {
        LogFormat::Json => LogOutput::Json,
        LogFormat::Pretty => LogOutput::Pretty,
    };
    let logging = LogConfig {
        enabled: section.logging.enabled,
        filter: section.logging.level.clone(),
        output,
        source_location: section.logging.include_location,
        service_name: section.service_name.clone(),
    };
    let metrics = MetricsConfig {
        enabled: section.metrics.enabled,
        addr: section.metrics.addr.clone(),
        service_name: section.service_name.clone(),
        duration_buckets: section.metrics.histogram_buckets.clone(),
    };

    TelemetryConfig::new(&section.service_name, config.environment.as_str())
        .with_logging(logging)
        .with_metrics(metrics)
}

fn password_generator(environment: Environment, cost: u32) -> Arc<dyn PasswordGenerator> {
    match environment {
        Environment::Development => Arc::new(ConstantPassword::default().with_cost(cost)),
        _ => Arc::new(Passphrase::default().with_cost(cost)),
    }
}

/// Builds the server and its services from configuration.
///
/// # Errors
///
/// Fails if the configuration does not validate.
pub fn build(config: &UtilisyncConfig) -> anyhow::Result<Application> {
    config.validate().context("invalid configuration")?;

    let auth = &config.auth;
    let tokens = Arc::new(JwtTokens::new(&TokenSettings {
        signing_key: config.signing_key().to_string(),
        token_ttl: Duration::from_secs(auth.token_ttl_secs),
        override_ttl: Duration::from_secs(auth.override_ttl_secs),
    }));
    let store = Arc::new(InMemoryUserStore::new());
    let users = Arc::new(
        UserService::new(
            store.clone(),
            tokens.clone(),
            Arc::new(LogNotifier),
            password_generator(config.environment, config.auth.password_cost),
        )
        .with_reset_ttl(Duration::from_secs(auth.reset_token_ttl_secs)),
    );

    let mut server = Server::new(server_config(config));
    let verifier: Arc<dyn TokenVerifier> = tokens.clone();
    register_user_routes(&mut server, Arc::clone(&users), verifier);
    if config.server.https_only {
        server.use_middleware(HttpsOnly);
    }
    server.add_circuit_breaker(StoreProbe::new(store.clone()));

    Ok(Application {
        server,
        users,
        store,
        tokens,
    })
}

/// Runs the service until `shutdown` resolves or the circuit breakers stop
/// it.
///
/// # Errors
///
/// Fails if the server cannot start, or when it was stopped by the
/// circuit breakers rather than `shutdown`.
pub async fn run(config: &UtilisyncConfig, shutdown: impl Future<Output = ()>) -> anyhow::Result<()> {
    let started = Instant::now();
    let Application { mut server, .. } = build(config)?;

    let addr = server.start().await.context("failed to start server")?;
    server.listen();
    info!(
        %addr,
        environment = config.environment.as_str(),
        startup = ?started.elapsed(),
        "listening"
    );

    let tripped = tokio::select! {
        () = shutdown => false,
        () = server.stopped() => true,
    };

    server.stop().await;

    if tripped {
        error!("server stopped by circuit breakers");
        anyhow::bail!("server stopped by circuit breakers");
    }
    info!("server stopped");
    Ok(())
}
