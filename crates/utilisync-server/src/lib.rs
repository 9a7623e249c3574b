//! # Utilisync Server
//!
//! HTTP plumbing for the Utilisync service.
//!
//! - [`RouteHandler`] - Decode → authenticate → confirm → endpoint → encode pipeline
//! - [`AuthGate`] - Bearer token gate in front of every route
//! - [`EndpointMiddleware`] - Wrappers around the endpoint stage (logging, metrics)
//! - [`ServerMiddleware`] - HTTP-level layers around the router (HTTPS enforcement)
//! - [`Server`] - Lifecycle-gated hyper server with circuit breaker polling
//!
//! ## Lifecycle
//!
//! `start()` binds and moves to `Starting`; `listen()` opens business routes
//! (`Ready`). A failing probe degrades the server to `Live`, where business
//! routes answer 503 until every probe passes again. Too many failed polls
//! in a row stop the server. The status path answers in every state.
//!
//! ## Example
//!
//! ```rust,ignore
//! use utilisync_server::{Server, ServerConfig};
//!
//! let mut server = Server::new(ServerConfig::default());
//! server.handle("/users/get", get_user);
//! server.start().await?;
//! server.listen();
//! ```

#![doc(html_root_url = "https://docs.rs/utilisync-server/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod auth;
pub mod circuit;
pub mod config;
pub mod encode;
pub mod handler;
pub mod layer;
pub mod lifecycle;
pub mod middleware;
mod server;
pub mod shutdown;
pub mod status;

pub use auth::{check_confirmation, AuthGate, BEARER_PREFIX};
pub use circuit::{CircuitBreakers, CircuitMonitor, FnProbe, Probe, ProbeError, TickOutcome};
pub use config::{ServerConfig, ServerConfigBuilder};
pub use encode::{
    empty_response, encode_error, encode_error_html, encode_html, encode_json, log_error,
    HttpResponse, CONTENT_TYPE_HTML, CONTENT_TYPE_JSON, DEFAULT_ERROR_DATA,
};
pub use handler::{
    empty_decoder, endpoint, json_decoder, BoxFuture, DecodeFn, EncodeFn, Endpoint,
    ErrorEncodeFn, ErrorHookFn, Route, RouteHandler, RouteHandlerBuilder, RouteOptions,
    RouteRequest,
};
pub use layer::{HttpsOnly, Next, ServerMiddleware};
pub use lifecycle::{Lifecycle, ServerState};
pub use middleware::{EndpointMiddleware, LoggingMiddleware, MetricsMiddleware};
pub use server::{confirmation_token, Server, ServerError, CONFIRMATION_PARAM, REQUEST_ID_HEADER};
pub use shutdown::{os_shutdown_signal, ConnectionToken, ConnectionTracker, ShutdownSignal};
pub use status::{format_uptime, StatusReport};
