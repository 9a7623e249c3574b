//! Route handler pipeline.
//!
//! Every business route is a [`RouteHandler`]: decode → authenticate →
//! confirmation check → endpoint → encode. The first failing stage
//! short-circuits to the error hook and the error encoder, which run exactly
//! once each.
//!
//! # Example
//!
//! ```
//! use serde::{Deserialize, Serialize};
//! use utilisync_server::{endpoint, json_decoder, AuthGate, RouteHandler, RouteOptions};
//!
//! #[derive(Deserialize)]
//! struct Echo { text: String }
//!
//! #[derive(Serialize)]
//! struct Reply { text: String }
//!
//! let handler = RouteHandler::builder(
//!     json_decoder::<Echo>("invalid echo request"),
//!     endpoint(|_ctx, req: Echo| async move {
//!         Ok::<_, utilisync_core::DomainError>(Reply { text: req.text })
//!     }),
//! )
//! .options(RouteOptions::authenticated())
//! .gate(AuthGate::deny_all())
//! .build();
//! # let _ = handler;
//! ```

use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt::Display;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tracing::debug;
use utilisync_core::{DomainError, DomainResult, RequestContext, TokenVerifier};

use crate::auth::{check_confirmation, AuthGate};
use crate::encode::{
    encode_error, encode_error_html, encode_html, encode_json, log_error, HttpResponse,
    DEFAULT_ERROR_DATA,
};
use crate::middleware::EndpointMiddleware;

/// Boxed future used across the pipeline.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// A request with its body already collected.
pub type RouteRequest = http::Request<Bytes>;

/// Business logic call.
pub type Endpoint<Req, Res> =
    Arc<dyn Fn(RequestContext, Req) -> BoxFuture<'static, DomainResult<Res>> + Send + Sync>;

/// Decode stage. May raise the requirement flags on the context.
pub type DecodeFn<Req> =
    Arc<dyn Fn(&mut RequestContext, &RouteRequest) -> DomainResult<Req> + Send + Sync>;

/// Encode stage for a successful response.
pub type EncodeFn<Res> =
    Arc<dyn Fn(&RequestContext, &Res) -> DomainResult<HttpResponse> + Send + Sync>;

/// Encode stage for a failure. Carries the endpoint's response when the
/// failure happened while encoding it, `None` for earlier stages.
pub type ErrorEncodeFn<Res> =
    Arc<dyn Fn(&RequestContext, Option<&Res>, &DomainError) -> HttpResponse + Send + Sync>;

/// Hook run on every failure before the error encoder.
pub type ErrorHookFn = Arc<dyn Fn(&RequestContext, &DomainError) + Send + Sync>;

/// Wraps an async function as an [`Endpoint`].
pub fn endpoint<Req, Res, F, Fut>(f: F) -> Endpoint<Req, Res>
where
    F: Fn(RequestContext, Req) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = DomainResult<Res>> + Send + 'static,
{
    Arc::new(move |ctx: RequestContext, req: Req| -> BoxFuture<'static, DomainResult<Res>> {
        Box::pin(f(ctx, req))
    })
}

/// Decodes the body as JSON. An empty body is read as `{}`.
pub fn json_decoder<T>(message: impl Into<String>) -> DecodeFn<T>
where
    T: DeserializeOwned + Send + 'static,
{
    let message = message.into();
    Arc::new(move |_ctx: &mut RequestContext, req: &RouteRequest| {
        let body: &[u8] = if req.body().is_empty() {
            b"{}"
        } else {
            req.body()
        };
        serde_json::from_slice(body).map_err(|e| {
            DomainError::bad_request(message.clone())
                .with_cause(e)
                .with_origin("decode")
        })
    })
}

/// Ignores the body and yields `T::default()`.
pub fn empty_decoder<T>() -> DecodeFn<T>
where
    T: Default + Send + 'static,
{
    Arc::new(|_ctx: &mut RequestContext, _req: &RouteRequest| Ok(T::default()))
}

fn json_encode<Res: Serialize>(ctx: &RequestContext, res: &Res) -> DomainResult<HttpResponse> {
    encode_json(ctx, res)
}

fn html_encode<Res: Display>(ctx: &RequestContext, res: &Res) -> DomainResult<HttpResponse> {
    encode_html(ctx, res)
}

fn json_error<Res>(ctx: &RequestContext, _response: Option<&Res>, err: &DomainError) -> HttpResponse {
    encode_error(ctx, DEFAULT_ERROR_DATA, err)
}

fn html_error<Res: Display>(
    ctx: &RequestContext,
    response: Option<&Res>,
    err: &DomainError,
) -> HttpResponse {
    match response {
        Some(res) => encode_error_html(ctx, &res.to_string(), err),
        None => encode_error_html(ctx, DEFAULT_ERROR_DATA, err),
    }
}

/// Gates a route declares at registration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RouteOptions {
    /// A verified bearer token must be present.
    pub token_required: bool,
    /// A non-empty `conf` query parameter must be present.
    pub confirmation_token_required: bool,
}

impl RouteOptions {
    /// Open route.
    #[must_use]
    pub const fn anonymous() -> Self {
        Self {
            token_required: false,
            confirmation_token_required: false,
        }
    }

    /// Route that needs a bearer token.
    #[must_use]
    pub const fn authenticated() -> Self {
        Self {
            token_required: true,
            confirmation_token_required: false,
        }
    }

    /// Route that needs a confirmation token.
    #[must_use]
    pub const fn confirmed() -> Self {
        Self {
            token_required: false,
            confirmation_token_required: true,
        }
    }

    /// Sets whether a token is required.
    #[must_use]
    pub const fn with_token_required(mut self, required: bool) -> Self {
        self.token_required = required;
        self
    }

    /// Sets whether a confirmation token is required.
    #[must_use]
    pub const fn with_confirmation_token_required(mut self, required: bool) -> Self {
        self.confirmation_token_required = required;
        self
    }
}

/// Type-erased route, as stored by the router.
pub trait Route: Send + Sync + 'static {
    /// Serves one request.
    fn serve(&self, ctx: RequestContext, req: RouteRequest) -> BoxFuture<'_, HttpResponse>;
}

/// One route's pipeline.
pub struct RouteHandler<Req, Res> {
    options: RouteOptions,
    gate: AuthGate,
    decode: DecodeFn<Req>,
    endpoint: Endpoint<Req, Res>,
    encode: EncodeFn<Res>,
    error_encode: ErrorEncodeFn<Res>,
    on_error: ErrorHookFn,
}

impl<Req, Res> RouteHandler<Req, Res>
where
    Req: Send + 'static,
    Res: Send + 'static,
{
    /// Starts a JSON route.
    pub fn builder(decode: DecodeFn<Req>, endpoint: Endpoint<Req, Res>) -> RouteHandlerBuilder<Req, Res>
    where
        Res: Serialize,
    {
        RouteHandlerBuilder::new(
            decode,
            endpoint,
            Arc::new(json_encode::<Res>),
            Arc::new(json_error::<Res>),
        )
    }

    /// Starts an HTML route.
    pub fn html_builder(
        decode: DecodeFn<Req>,
        endpoint: Endpoint<Req, Res>,
    ) -> RouteHandlerBuilder<Req, Res>
    where
        Res: Display,
    {
        RouteHandlerBuilder::new(
            decode,
            endpoint,
            Arc::new(html_encode::<Res>),
            Arc::new(html_error::<Res>),
        )
    }

    /// Declared options.
    #[must_use]
    pub fn options(&self) -> RouteOptions {
        self.options
    }

    /// Wraps the endpoint with `middleware`. The most recently added
    /// middleware runs first.
    pub fn use_middleware<M: EndpointMiddleware>(&mut self, middleware: M) {
        debug!(middleware = middleware.name(), "wrapping endpoint");
        self.endpoint = middleware.wrap(self.endpoint.clone());
    }

    /// Runs the pipeline for one request.
    pub async fn serve_request(&self, mut ctx: RequestContext, req: RouteRequest) -> HttpResponse {
        if self.options.token_required {
            ctx.set_token_required(true);
        }
        if self.options.confirmation_token_required {
            ctx.set_confirmation_token_required(true);
        }

        let response = match self.invoke(&mut ctx, &req).await {
            Ok(response) => response,
            Err(err) => return self.fail(&ctx, None, &err),
        };

        match (self.encode)(&ctx, &response) {
            Ok(encoded) => {
                debug!(request_id = %ctx.request_id(), "encoded response");
                encoded
            }
            Err(err) => self.fail(&ctx, Some(&response), &err),
        }
    }

    async fn invoke(&self, ctx: &mut RequestContext, req: &RouteRequest) -> DomainResult<Res> {
        let decoded = (self.decode)(ctx, req)?;
        debug!(request_id = %ctx.request_id(), "decoded request");

        self.gate.authenticate(ctx)?;
        check_confirmation(ctx)?;

        let response = (self.endpoint)(ctx.clone(), decoded).await?;
        debug!(request_id = %ctx.request_id(), "got response");
        Ok(response)
    }

    fn fail(&self, ctx: &RequestContext, response: Option<&Res>, err: &DomainError) -> HttpResponse {
        (self.on_error)(ctx, err);
        (self.error_encode)(ctx, response, err)
    }
}

impl<Req, Res> Route for RouteHandler<Req, Res>
where
    Req: Send + 'static,
    Res: Send + 'static,
{
    fn serve(&self, ctx: RequestContext, req: RouteRequest) -> BoxFuture<'_, HttpResponse> {
        Box::pin(self.serve_request(ctx, req))
    }
}

impl<Req, Res> std::fmt::Debug for RouteHandler<Req, Res> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RouteHandler")
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

/// Builder for [`RouteHandler`].
pub struct RouteHandlerBuilder<Req, Res> {
    options: RouteOptions,
    gate: AuthGate,
    decode: DecodeFn<Req>,
    endpoint: Endpoint<Req, Res>,
    encode: EncodeFn<Res>,
    error_encode: ErrorEncodeFn<Res>,
    on_error: ErrorHookFn,
}

impl<Req, Res> RouteHandlerBuilder<Req, Res>
where
    Req: Send + 'static,
    Res: Send + 'static,
{
    fn new(
        decode: DecodeFn<Req>,
        endpoint: Endpoint<Req, Res>,
        encode: EncodeFn<Res>,
        error_encode: ErrorEncodeFn<Res>,
    ) -> Self {
        Self {
            options: RouteOptions::default(),
            gate: AuthGate::deny_all(),
            decode,
            endpoint,
            encode,
            error_encode,
            on_error: Arc::new(log_error),
        }
    }

    /// Sets the route's gates.
    pub fn options(mut self, options: RouteOptions) -> Self {
        self.options = options;
        self
    }

    /// Verifies tokens with `verifier`.
    pub fn verifier(mut self, verifier: Arc<dyn TokenVerifier>) -> Self {
        self.gate = AuthGate::new(verifier);
        self
    }

    /// Uses an existing gate.
    pub fn gate(mut self, gate: AuthGate) -> Self {
        self.gate = gate;
        self
    }

    /// Replaces the success encoder.
    pub fn encoder<F>(mut self, encode: F) -> Self
    where
        F: Fn(&RequestContext, &Res) -> DomainResult<HttpResponse> + Send + Sync + 'static,
    {
        self.encode = Arc::new(encode);
        self
    }

    /// Replaces the error encoder.
    pub fn error_encoder<F>(mut self, error_encode: F) -> Self
    where
        F: Fn(&RequestContext, Option<&Res>, &DomainError) -> HttpResponse + Send + Sync + 'static,
    {
        self.error_encode = Arc::new(error_encode);
        self
    }

    /// Replaces the error hook.
    pub fn on_error<F>(mut self, on_error: F) -> Self
    where
        F: Fn(&RequestContext, &DomainError) + Send + Sync + 'static,
    {
        self.on_error = Arc::new(on_error);
        self
    }

    /// Wraps the endpoint with `middleware`.
    pub fn middleware<M: EndpointMiddleware>(mut self, middleware: M) -> Self {
        self.endpoint = middleware.wrap(self.endpoint);
        self
    }

    /// Builds the handler.
    pub fn build(self) -> RouteHandler<Req, Res> {
        RouteHandler {
            options: self.options,
            gate: self.gate,
            decode: self.decode,
            endpoint: self.endpoint,
            encode: self.encode,
            error_encode: self.error_encode,
            on_error: self.on_error,
        }
    }
}
