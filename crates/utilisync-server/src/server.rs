//! HTTP server.
//!
//! The server owns the lifecycle, the API router and the two background
//! tasks started by [`Server::start`]: the accept loop and the circuit
//! breaker poll loop.
//!
//! Dispatch order for every request:
//!
//! 1. The status path is answered in every state.
//! 2. Anything else gets `503` unless the server is `Ready`.
//! 3. The body is collected, server middleware runs, and the route mounted
//!    at the exact path serves the request. Unknown paths get an empty `404`.
//!
//! # Example
//!
//! ```rust,ignore
//! use utilisync_server::{Server, ServerConfig};
//!
//! let mut server = Server::new(ServerConfig::builder().http_addr("127.0.0.1:8080").build());
//! server.handle("/users/get", get_user_route);
//! server.start().await?;
//! server.listen();
//! server.stopped().await;
//! server.stop().await;
//! ```

use std::collections::HashMap;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use http::{header, HeaderValue, Request, StatusCode};
use http_body_util::BodyExt;
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use thiserror::Error;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use utilisync_core::{DomainError, RequestContext, RequestId};
use utilisync_telemetry::metrics::{record_request, InFlightGuard};

use crate::circuit::{CircuitBreakers, CircuitMonitor, Probe};
use crate::config::ServerConfig;
use crate::encode::{empty_response, encode_error, json_response, HttpResponse, DEFAULT_ERROR_DATA};
use crate::handler::{Route, RouteRequest};
use crate::layer::{Next, ServerMiddleware};
use crate::lifecycle::{Lifecycle, ServerState};
use crate::shutdown::{ConnectionTracker, ShutdownSignal};
use crate::status::StatusReport;

/// Request header carrying a caller-supplied request ID.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Query parameter carrying the confirmation token.
pub const CONFIRMATION_PARAM: &str = "conf";

const UNMATCHED_ROUTE: &str = "unmatched";

/// Server errors.
#[derive(Debug, Error)]
pub enum ServerError {
    /// The listener could not be bound.
    #[error("failed to bind: {0}")]
    Bind(String),

    /// Other I/O failure.
    #[error("I/O error: {0}")]
    Io(String),
}

/// The Utilisync HTTP server.
pub struct Server {
    config: ServerConfig,
    lifecycle: Arc<Lifecycle>,
    shutdown: ShutdownSignal,
    created_at: Instant,
    routes: HashMap<String, Arc<dyn Route>>,
    middleware: Vec<Arc<dyn ServerMiddleware>>,
    breakers: CircuitBreakers,
    local_addr: Option<SocketAddr>,
    accept_task: Option<JoinHandle<()>>,
    poll_task: Option<JoinHandle<()>>,
    done: watch::Sender<bool>,
}

impl Server {
    /// Creates an unstarted server.
    #[must_use]
    pub fn new(config: ServerConfig) -> Self {
        let (done, _) = watch::channel(false);
        Self {
            config,
            lifecycle: Arc::new(Lifecycle::new()),
            shutdown: ShutdownSignal::new(),
            created_at: Instant::now(),
            routes: HashMap::new(),
            middleware: Vec::new(),
            breakers: CircuitBreakers::new(),
            local_addr: None,
            accept_task: None,
            poll_task: None,
            done,
        }
    }

    /// Configuration.
    #[must_use]
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> ServerState {
        self.lifecycle.state()
    }

    /// Bound address, once started.
    #[must_use]
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    /// The server's shutdown token.
    #[must_use]
    pub fn shutdown_signal(&self) -> ShutdownSignal {
        self.shutdown.clone()
    }

    fn frozen(&self, what: &str) -> bool {
        if self.local_addr.is_some() {
            warn!(what, "server already started, registration ignored");
            return true;
        }
        false
    }

    /// Mounts `route` at `api_prefix + path`.
    pub fn handle(&mut self, path: &str, route: impl Route) {
        self.handle_shared(path, Arc::new(route));
    }

    /// Mounts an already shared route.
    pub fn handle_shared(&mut self, path: &str, route: Arc<dyn Route>) {
        if self.frozen("route") {
            return;
        }
        let full = if path.starts_with('/') {
            format!("{}{path}", self.config.api_prefix())
        } else {
            format!("{}/{path}", self.config.api_prefix())
        };
        debug!(path = %full, "route mounted");
        if self.routes.insert(full.clone(), route).is_some() {
            warn!(path = %full, "route replaced");
        }
    }

    /// Adds server middleware. The first added is the outermost.
    pub fn use_middleware(&mut self, middleware: impl ServerMiddleware) {
        if self.frozen("middleware") {
            return;
        }
        self.middleware.push(Arc::new(middleware));
    }

    /// Registers circuit breaker probes, polled in order.
    pub fn add_circuit_breakers(&mut self, probes: impl IntoIterator<Item = Arc<dyn Probe>>) {
        if self.frozen("circuit breaker") {
            return;
        }
        self.breakers.extend(probes);
    }

    /// Registers one circuit breaker probe.
    pub fn add_circuit_breaker(&mut self, probe: impl Probe) {
        if self.frozen("circuit breaker") {
            return;
        }
        self.breakers.add(probe);
    }

    /// Binds the listener, moves to `Starting` and spawns the accept and
    /// poll loops. Business routes stay closed until [`Server::listen`].
    ///
    /// Calling it again returns the address already bound.
    pub async fn start(&mut self) -> Result<SocketAddr, ServerError> {
        if let Some(addr) = self.local_addr {
            return Ok(addr);
        }
        if self.lifecycle.state() != ServerState::Unstarted {
            return Err(ServerError::Bind("server cannot be restarted".to_string()));
        }

        let addr = self.config.socket_addr().map_err(|e| {
            ServerError::Bind(format!("invalid address {}: {e}", self.config.http_addr()))
        })?;
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| ServerError::Bind(format!("{addr}: {e}")))?;
        let local_addr = listener
            .local_addr()
            .map_err(|e| ServerError::Io(e.to_string()))?;

        self.lifecycle.start();

        let dispatcher = Arc::new(Dispatcher {
            lifecycle: Arc::clone(&self.lifecycle),
            shutdown: self.shutdown.clone(),
            created_at: self.created_at,
            status_path: self.config.status_path().to_string(),
            request_timeout: self.config.request_timeout(),
            routes: std::mem::take(&mut self.routes),
            middleware: std::mem::take(&mut self.middleware),
        });

        let monitor = CircuitMonitor::new(
            Arc::clone(&self.lifecycle),
            std::mem::take(&mut self.breakers),
            self.config.circuit_breaker_wait(),
            self.config.circuit_breaker_threshold(),
        );
        self.poll_task = Some(tokio::spawn(monitor.run(self.shutdown.clone())));

        self.accept_task = Some(tokio::spawn(accept_loop(
            listener,
            dispatcher,
            self.shutdown.clone(),
            self.config.shutdown_timeout(),
            self.done.clone(),
        )));

        self.local_addr = Some(local_addr);
        info!(addr = %local_addr, "server started");
        Ok(local_addr)
    }

    /// Opens business routes. Also clears a degraded state.
    pub fn listen(&self) -> bool {
        let applied = self.lifecycle.listen();
        if applied {
            info!("server listening");
        }
        applied
    }

    /// Moves to `Stopping`, closes the listener and waits for the
    /// background tasks. A no-op before [`Server::listen`].
    pub async fn stop(&mut self) -> bool {
        let applied = self.lifecycle.begin_stop();
        if applied {
            info!("stopping server");
            self.shutdown.cancel();
        }

        if self.shutdown.is_cancelled() {
            if let Some(task) = self.accept_task.take() {
                if let Err(e) = task.await {
                    warn!(error = %e, "accept loop failed");
                }
            }
            if let Some(task) = self.poll_task.take() {
                if let Err(e) = task.await {
                    warn!(error = %e, "circuit breaker poll loop failed");
                }
            }
        }
        applied
    }

    /// Resolves once the accept loop has exited, whether through
    /// [`Server::stop`] or the circuit breaker threshold.
    pub async fn stopped(&self) {
        let mut done = self.done.subscribe();
        let _ = done.wait_for(|finished| *finished).await;
    }
}

impl Drop for Server {
    fn drop(&mut self) {
        if self.accept_task.is_some() || self.poll_task.is_some() {
            self.shutdown.cancel();
        }
    }
}

impl std::fmt::Debug for Server {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Server")
            .field("config", &self.config)
            .field("state", &self.lifecycle.state())
            .field("local_addr", &self.local_addr)
            .field("breakers", &self.breakers)
            .finish_non_exhaustive()
    }
}

async fn accept_loop(
    listener: TcpListener,
    dispatcher: Arc<Dispatcher>,
    shutdown: ShutdownSignal,
    shutdown_timeout: Duration,
    done: watch::Sender<bool>,
) {
    let tracker = ConnectionTracker::new();

    loop {
        tokio::select! {
            () = shutdown.cancelled() => break,
            accepted = listener.accept() => match accepted {
                Ok((stream, remote)) => {
                    let token = tracker.acquire();
                    let dispatcher = Arc::clone(&dispatcher);
                    let shutdown = shutdown.clone();
                    tokio::spawn(async move {
                        let _token = token;
                        serve_connection(stream, remote, dispatcher, shutdown).await;
                    });
                }
                Err(e) => warn!(error = %e, "failed to accept connection"),
            }
        }
    }

    drop(listener);
    info!(
        active = tracker.active_connections(),
        "listener closed, draining connections"
    );
    if tokio::time::timeout(shutdown_timeout, tracker.wait_idle())
        .await
        .is_err()
    {
        warn!(
            active = tracker.active_connections(),
            "shutdown timeout elapsed with open connections"
        );
    }

    done.send_replace(true);
    info!("server stopped");
}

async fn serve_connection(
    stream: TcpStream,
    remote: SocketAddr,
    dispatcher: Arc<Dispatcher>,
    shutdown: ShutdownSignal,
) {
    let io = TokioIo::new(stream);
    let service = service_fn(move |req: Request<Incoming>| {
        let dispatcher = Arc::clone(&dispatcher);
        async move { Ok::<_, Infallible>(dispatcher.dispatch(req, remote).await) }
    });

    let conn = http1::Builder::new().serve_connection(io, service);
    let mut conn = std::pin::pin!(conn);
    let mut cancelled = std::pin::pin!(shutdown.cancelled());
    let mut draining = false;

    loop {
        tokio::select! {
            result = conn.as_mut() => {
                if let Err(e) = result {
                    debug!(error = %e, %remote, "connection closed with error");
                }
                return;
            }
            () = &mut cancelled, if !draining => {
                draining = true;
                conn.as_mut().graceful_shutdown();
            }
        }
    }
}

/// Frozen routing state shared by every connection.
struct Dispatcher {
    lifecycle: Arc<Lifecycle>,
    shutdown: ShutdownSignal,
    created_at: Instant,
    status_path: String,
    request_timeout: Duration,
    routes: HashMap<String, Arc<dyn Route>>,
    middleware: Vec<Arc<dyn ServerMiddleware>>,
}

impl Dispatcher {
    async fn dispatch(&self, req: Request<Incoming>, remote: SocketAddr) -> HttpResponse {
        let path = req.uri().path().to_string();

        if path == self.status_path {
            let report = StatusReport::new(self.lifecycle.state(), self.created_at.elapsed());
            return json_response(StatusCode::OK, &report);
        }

        if self.lifecycle.state() != ServerState::Ready {
            return empty_response(StatusCode::SERVICE_UNAVAILABLE);
        }

        let started = Instant::now();
        let _in_flight = InFlightGuard::new();
        let response = self.dispatch_ready(req, remote).await;

        let label = if self.routes.contains_key(&path) {
            path.as_str()
        } else {
            UNMATCHED_ROUTE
        };
        record_request(label, response.status().as_u16(), started.elapsed());
        response
    }

    async fn dispatch_ready(&self, req: Request<Incoming>, remote: SocketAddr) -> HttpResponse {
        let (parts, body) = req.into_parts();
        let body = match tokio::time::timeout(self.request_timeout, body.collect()).await {
            Ok(Ok(collected)) => collected.to_bytes(),
            Ok(Err(e)) => {
                let err = DomainError::bad_request("failed to read request body")
                    .with_cause(e)
                    .with_origin("server");
                return encode_error(&RequestContext::new(), DEFAULT_ERROR_DATA, &err);
            }
            Err(_) => {
                debug!(path = parts.uri.path(), "timed out reading request body");
                return empty_response(StatusCode::REQUEST_TIMEOUT);
            }
        };
        let request = Request::from_parts(parts, body);

        let next = Next::chain(&self.middleware, move |req| {
            Box::pin(self.route(req, remote))
        });
        next.run(request).await
    }

    async fn route(&self, req: RouteRequest, remote: SocketAddr) -> HttpResponse {
        let Some(route) = self.routes.get(req.uri().path()).cloned() else {
            info!(path = req.uri().path(), method = %req.method(), "route not found");
            return empty_response(StatusCode::NOT_FOUND);
        };

        let ctx = self.context(&req, remote);
        let request_id = ctx.request_id();

        let mut response = match tokio::time::timeout(self.request_timeout, route.serve(ctx, req)).await {
            Ok(response) => response,
            Err(_) => {
                warn!(%request_id, "route timed out");
                empty_response(StatusCode::GATEWAY_TIMEOUT)
            }
        };

        if let Ok(value) = HeaderValue::from_str(&request_id.to_string()) {
            response.headers_mut().insert(REQUEST_ID_HEADER, value);
        }
        response
    }

    fn context(&self, req: &RouteRequest, remote: SocketAddr) -> RequestContext {
        let headers = req.headers();
        let header_str = |name: &str| {
            headers
                .get(name)
                .and_then(|value| value.to_str().ok())
                .unwrap_or_default()
                .to_string()
        };

        let request_id = headers
            .get(REQUEST_ID_HEADER)
            .and_then(|value| value.to_str().ok())
            .and_then(RequestId::parse)
            .unwrap_or_default();

        let host = match header_str(header::HOST.as_str()) {
            host if host.is_empty() => remote.to_string(),
            host => host,
        };

        RequestContext::with_request_id(request_id)
            .with_token(header_str(header::AUTHORIZATION.as_str()))
            .with_confirmation_token(confirmation_token(req.uri().query()))
            .with_request_line(
                req.method().as_str(),
                req.uri().path(),
                format!("{:?}", req.version()),
            )
            .with_client(host, header_str(header::USER_AGENT.as_str()))
            .with_cancel_token(self.shutdown.clone())
    }
}

/// Extracts the `conf` query parameter, or an empty string.
pub fn confirmation_token(query: Option<&str>) -> String {
    query
        .and_then(|query| serde_urlencoded::from_str::<Vec<(String, String)>>(query).ok())
        .and_then(|pairs| {
            pairs
                .into_iter()
                .find(|(key, _)| key == CONFIRMATION_PARAM)
                .map(|(_, value)| value)
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::AuthGate;
    use crate::circuit::{FnProbe, ProbeError};
    use crate::handler::{empty_decoder, endpoint, RouteHandler, RouteOptions};
    use crate::layer::HttpsOnly;
    use bytes::Bytes;
    use http_body_util::Full;
    use hyper_util::client::legacy::connect::HttpConnector;
    use hyper_util::client::legacy::Client;
    use hyper_util::rt::TokioExecutor;
    use std::sync::atomic::{AtomicBool, Ordering};
    use utilisync_core::{TokenError, TokenVerifier, VerifiedClaims};

    struct StaticVerifier;

    impl TokenVerifier for StaticVerifier {
        fn verify(&self, token: &str) -> Result<VerifiedClaims, TokenError> {
            if token == "good" {
                Ok(VerifiedClaims::new("acct-9"))
            } else {
                Err(TokenError::Invalid("bad signature".to_string()))
            }
        }
    }

    fn echo_route(options: RouteOptions) -> RouteHandler<(), serde_json::Value> {
        RouteHandler::builder(
            empty_decoder::<()>(),
            endpoint(|ctx: RequestContext, ()| async move {
                Ok::<_, DomainError>(serde_json::json!({
                    "user": ctx.user_key(),
                    "conf": ctx.confirmation_token(),
                    "method": ctx.method(),
                    "proto": ctx.proto(),
                    "request_id": ctx.request_id().to_string(),
                }))
            }),
        )
        .options(options)
        .gate(AuthGate::new(Arc::new(StaticVerifier)))
        .build()
    }

    fn test_config() -> ServerConfig {
        ServerConfig::builder()
            .http_addr("127.0.0.1:0")
            .circuit_breaker_wait(Duration::from_secs(60))
            .shutdown_timeout(Duration::from_secs(2))
            .build()
    }

    fn client() -> Client<HttpConnector, Full<Bytes>> {
        Client::builder(TokioExecutor::new()).build_http()
    }

    async fn send(
        addr: SocketAddr,
        method: &str,
        path: &str,
        headers: &[(&str, &str)],
    ) -> (StatusCode, http::HeaderMap, Bytes) {
        let mut builder = Request::builder()
            .method(method)
            .uri(format!("http://{addr}{path}"));
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        let request = builder.body(Full::new(Bytes::new())).unwrap();
        let response = client().request(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.into_body().collect().await.unwrap().to_bytes();
        (status, headers, body)
    }

    #[tokio::test]
    async fn test_status_answered_in_every_state() {
        let mut server = Server::new(test_config());
        let addr = server.start().await.unwrap();

        let (status, _, body) = send(addr, "GET", "/health/GetStatus", &[]).await;
        assert_eq!(status, StatusCode::OK);
        let report: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(report["state"], "starting");
        assert!(report["uptime"].is_string());

        server.listen();
        let (_, _, body) = send(addr, "GET", "/health/GetStatus", &[]).await;
        let report: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(report["state"], "ready");

        server.lifecycle.trip();
        let (status, _, body) = send(addr, "GET", "/health/GetStatus", &[]).await;
        assert_eq!(status, StatusCode::OK);
        let report: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(report["state"], "live");

        server.stop().await;
    }

    #[tokio::test]
    async fn test_unavailable_until_listen() {
        let mut server = Server::new(test_config());
        server.handle("/echo", echo_route(RouteOptions::anonymous()));
        let addr = server.start().await.unwrap();

        let (status, _, body) = send(addr, "POST", "/api/echo", &[]).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert!(body.is_empty());

        assert!(server.listen());
        let (status, headers, body) = send(addr, "POST", "/api/echo", &[]).await;
        assert_eq!(status, StatusCode::OK);
        assert!(headers.contains_key(REQUEST_ID_HEADER));
        let echo: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(echo["method"], "POST");
        assert_eq!(echo["proto"], "HTTP/1.1");

        server.stop().await;
    }

    #[tokio::test]
    async fn test_unknown_path_is_empty_404() {
        let mut server = Server::new(test_config());
        server.handle("/echo", echo_route(RouteOptions::anonymous()));
        let addr = server.start().await.unwrap();
        server.listen();

        let (status, _, body) = send(addr, "POST", "/api/nope", &[]).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body.is_empty());

        // mounted under the prefix only
        let (status, _, _) = send(addr, "POST", "/echo", &[]).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        server.stop().await;
    }

    #[tokio::test]
    async fn test_token_and_confirmation_reach_context() {
        let mut server = Server::new(test_config());
        server.handle(
            "/secure",
            echo_route(RouteOptions::authenticated().with_confirmation_token_required(true)),
        );
        let addr = server.start().await.unwrap();
        server.listen();

        let request_id = RequestId::new().to_string();
        let (status, _, body) = send(
            addr,
            "POST",
            "/api/secure?conf=abc%20123",
            &[
                ("authorization", "Bearer Authorization:good"),
                (REQUEST_ID_HEADER, request_id.as_str()),
            ],
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let echo: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(echo["user"], "acct-9");
        assert_eq!(echo["conf"], "abc 123");
        assert_eq!(echo["request_id"], request_id);

        let (status, _, body) = send(addr, "POST", "/api/secure?conf=abc", &[]).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let err: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(err["error"]["message"], "token is required");

        server.stop().await;
    }

    #[tokio::test]
    async fn test_degraded_server_returns_503() {
        let mut server = Server::new(test_config());
        server.handle("/echo", echo_route(RouteOptions::anonymous()));
        let addr = server.start().await.unwrap();
        server.listen();

        server.lifecycle.trip();
        let (status, _, _) = send(addr, "POST", "/api/echo", &[]).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

        assert!(server.listen());
        let (status, _, _) = send(addr, "POST", "/api/echo", &[]).await;
        assert_eq!(status, StatusCode::OK);

        server.stop().await;
    }

    #[tokio::test]
    async fn test_threshold_stops_server() {
        let healthy = Arc::new(AtomicBool::new(false));
        let probe_health = healthy.clone();

        let config = ServerConfig::builder()
            .http_addr("127.0.0.1:0")
            .circuit_breaker_wait(Duration::from_millis(10))
            .circuit_breaker_threshold(2)
            .build();
        let mut server = Server::new(config);
        server.add_circuit_breaker(FnProbe::new("store", move || {
            let healthy = probe_health.load(Ordering::SeqCst);
            async move {
                if healthy {
                    Ok(())
                } else {
                    Err(ProbeError::new("store unreachable"))
                }
            }
        }));
        let addr = server.start().await.unwrap();
        server.listen();

        tokio::time::timeout(Duration::from_secs(5), server.stopped())
            .await
            .expect("threshold should stop the server");
        assert_eq!(server.state(), ServerState::Stopping);
        assert!(server.shutdown_signal().is_cancelled());
        assert!(!server.listen());
        assert!(TcpStream::connect(addr).await.is_err());

        // already stopping; stop only joins the tasks
        assert!(!server.stop().await);
    }

    #[tokio::test]
    async fn test_stop_is_noop_while_starting() {
        let mut server = Server::new(test_config());
        server.start().await.unwrap();
        assert!(!server.stop().await);
        assert_eq!(server.state(), ServerState::Starting);

        server.listen();
        assert!(server.stop().await);
        assert_eq!(server.state(), ServerState::Stopping);
        assert!(!server.listen());
        tokio::time::timeout(Duration::from_secs(1), server.stopped())
            .await
            .expect("accept loop finished");
    }

    #[tokio::test]
    async fn test_drop_before_listen_releases_tasks() {
        let mut server = Server::new(test_config());
        let addr = server.start().await.unwrap();
        let signal = server.shutdown_signal();
        let mut done = server.done.subscribe();
        assert_eq!(server.state(), ServerState::Starting);

        drop(server);
        assert!(signal.is_cancelled());
        tokio::time::timeout(Duration::from_secs(1), done.wait_for(|finished| *finished))
            .await
            .expect("accept loop exits after drop")
            .unwrap();
        assert!(TcpStream::connect(addr).await.is_err());
    }

    #[tokio::test]
    async fn test_start_is_idempotent() {
        let mut server = Server::new(test_config());
        let first = server.start().await.unwrap();
        let second = server.start().await.unwrap();
        assert_eq!(first, second);
        assert_eq!(server.local_addr(), Some(first));
        server.listen();
        server.stop().await;
    }

    #[tokio::test]
    async fn test_bind_failure() {
        let mut first = Server::new(test_config());
        let addr = first.start().await.unwrap();

        let config = ServerConfig::builder().http_addr(addr.to_string()).build();
        let mut second = Server::new(config);
        assert!(matches!(second.start().await, Err(ServerError::Bind(_))));
        assert_eq!(second.state(), ServerState::Unstarted);

        first.listen();
        first.stop().await;
    }

    #[tokio::test]
    async fn test_https_only_middleware() {
        let mut server = Server::new(test_config());
        server.use_middleware(HttpsOnly);
        server.handle("/echo", echo_route(RouteOptions::anonymous()));
        let addr = server.start().await.unwrap();
        server.listen();

        let (status, headers, _) = send(addr, "POST", "/api/echo", &[]).await;
        assert_eq!(status, StatusCode::UPGRADE_REQUIRED);
        assert_eq!(headers.get(header::UPGRADE).unwrap(), "TLS/1.3, HTTP/1.1");

        let (status, _, _) =
            send(addr, "POST", "/api/echo", &[("x-forwarded-proto", "https")]).await;
        assert_eq!(status, StatusCode::OK);

        // the status path sits outside the middleware
        let (status, _, _) = send(addr, "GET", "/health/GetStatus", &[]).await;
        assert_eq!(status, StatusCode::OK);

        server.stop().await;
    }

    #[tokio::test]
    async fn test_registration_after_start_is_ignored() {
        let mut server = Server::new(test_config());
        let addr = server.start().await.unwrap();
        server.listen();
        server.handle("/late", echo_route(RouteOptions::anonymous()));

        let (status, _, _) = send(addr, "POST", "/api/late", &[]).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        server.stop().await;
    }

    #[test]
    fn test_confirmation_token_parsing() {
        assert_eq!(confirmation_token(None), "");
        assert_eq!(confirmation_token(Some("")), "");
        assert_eq!(confirmation_token(Some("conf=abc")), "abc");
        assert_eq!(confirmation_token(Some("a=1&conf=x%2By&b=2")), "x+y");
        assert_eq!(confirmation_token(Some("confirm=abc")), "");
    }
}
