//! Endpoint middleware.
//!
//! Middleware wraps the endpoint stage of a [`RouteHandler`](crate::RouteHandler)
//! and keeps its signature, so any number can be stacked. Each call to
//! `use_middleware` wraps the current chain, which makes the last one added
//! the outermost.

use std::sync::Arc;
use std::time::Instant;
use tracing::info;
use utilisync_core::{DomainResult, RequestContext};
use utilisync_telemetry::metrics::{record_endpoint, record_endpoint_error};

use crate::handler::{BoxFuture, Endpoint};

/// Wraps an endpoint with a cross-cutting concern.
pub trait EndpointMiddleware: Send + Sync + 'static {
    /// Name used in logs.
    fn name(&self) -> &'static str;

    /// Returns `next` wrapped by this middleware.
    fn wrap<Req, Res>(&self, next: Endpoint<Req, Res>) -> Endpoint<Req, Res>
    where
        Req: Send + 'static,
        Res: Send + 'static;
}

/// Logs "completed request" with timing and request line details after
/// every endpoint call.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingMiddleware;

impl EndpointMiddleware for LoggingMiddleware {
    fn name(&self) -> &'static str {
        "logging"
    }

    fn wrap<Req, Res>(&self, next: Endpoint<Req, Res>) -> Endpoint<Req, Res>
    where
        Req: Send + 'static,
        Res: Send + 'static,
    {
        Arc::new(move |ctx: RequestContext, req: Req| -> BoxFuture<'static, DomainResult<Res>> {
            let next = next.clone();
            Box::pin(async move {
                let started = Instant::now();
                let summary = ctx.clone();
                let result = next(ctx, req).await;

                info!(
                    took = started.elapsed().as_secs_f64(),
                    path = summary.path(),
                    method = summary.method(),
                    host = summary.host(),
                    proto = summary.proto(),
                    ua = summary.user_agent(),
                    request_id = %summary.request_id(),
                    "completed request"
                );
                result
            })
        })
    }
}

/// Records endpoint latency and failures by kind, labelled by request path.
#[derive(Debug, Clone, Copy, Default)]
pub struct MetricsMiddleware;

impl EndpointMiddleware for MetricsMiddleware {
    fn name(&self) -> &'static str {
        "metrics"
    }

    fn wrap<Req, Res>(&self, next: Endpoint<Req, Res>) -> Endpoint<Req, Res>
    where
        Req: Send + 'static,
        Res: Send + 'static,
    {
        Arc::new(move |ctx: RequestContext, req: Req| -> BoxFuture<'static, DomainResult<Res>> {
            let next = next.clone();
            let route = ctx.path().to_string();
            Box::pin(async move {
                let started = Instant::now();
                let result = next(ctx, req).await;
                record_endpoint(&route, started.elapsed());
                if let Err(err) = &result {
                    record_endpoint_error(&route, err.kind().as_str());
                }
                result
            })
        })
    }
}
