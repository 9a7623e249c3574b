//! Request context types.
//!
//! The [`RequestContext`] is created fresh for every inbound request and
//! carried through decode, authentication, the endpoint and the encoder.
//! Only the [`CancelToken`] inside it is shared with anything else.

use crate::cancel::CancelToken;
use crate::identity::CallerIdentity;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use uuid::Uuid;

/// A unique identifier for each request, using UUID v7.
///
/// # Example
///
/// ```
/// use utilisync_core::RequestId;
///
/// let id = RequestId::new();
/// assert_eq!(id.to_string().len(), 36);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(Uuid);

impl RequestId {
    /// Creates a new time-ordered request ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Parses a request ID supplied by an upstream proxy.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        Uuid::parse_str(value.trim()).ok().map(Self)
    }

    /// Returns the underlying UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for RequestId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

/// Per-request state flowing through the handler pipeline.
///
/// The two requirement flags tell the pipeline which gates to enforce. They
/// start out from the route's declared options and may be raised by the
/// decode stage; the pipeline reads them from here and nowhere else.
///
/// # Example
///
/// ```
/// use utilisync_core::RequestContext;
///
/// let ctx = RequestContext::new()
///     .with_token("Bearer Authorization:abc")
///     .with_token_required(true);
/// assert!(ctx.token_required());
/// assert_eq!(ctx.user_key(), "");
/// ```
#[derive(Debug, Clone)]
pub struct RequestContext {
    request_id: RequestId,
    identity: CallerIdentity,

    /// Raw Authorization header before authentication, stripped token after.
    token: String,
    token_required: bool,

    /// Value of the `conf` query parameter.
    confirmation_token: String,
    confirmation_token_required: bool,

    method: String,
    path: String,
    host: String,
    proto: String,
    user_agent: String,

    started_at: Instant,
    cancel: CancelToken,
}

impl RequestContext {
    /// Creates an anonymous context with a fresh request ID.
    #[must_use]
    pub fn new() -> Self {
        Self::with_request_id(RequestId::new())
    }

    /// Creates an anonymous context with the given request ID.
    #[must_use]
    pub fn with_request_id(request_id: RequestId) -> Self {
        Self {
            request_id,
            identity: CallerIdentity::Anonymous,
            token: String::new(),
            token_required: false,
            confirmation_token: String::new(),
            confirmation_token_required: false,
            method: String::new(),
            path: String::new(),
            host: String::new(),
            proto: String::new(),
            user_agent: String::new(),
            started_at: Instant::now(),
            cancel: CancelToken::new(),
        }
    }

    /// Returns the request ID.
    #[must_use]
    pub const fn request_id(&self) -> RequestId {
        self.request_id
    }

    /// Returns the caller identity.
    #[must_use]
    pub const fn identity(&self) -> &CallerIdentity {
        &self.identity
    }

    /// Sets the caller identity.
    pub fn set_identity(&mut self, identity: CallerIdentity) {
        self.identity = identity;
    }

    /// Returns a new context with the specified identity.
    #[must_use]
    pub fn with_identity(mut self, identity: CallerIdentity) -> Self {
        self.identity = identity;
        self
    }

    /// Returns the resolved user key, empty until authenticated.
    #[must_use]
    pub fn user_key(&self) -> &str {
        self.identity.user_key()
    }

    /// Returns the bearer token.
    #[must_use]
    pub fn token(&self) -> &str {
        &self.token
    }

    /// Sets the bearer token.
    pub fn set_token(&mut self, token: impl Into<String>) {
        self.token = token.into();
    }

    /// Returns a new context with the specified bearer token.
    #[must_use]
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = token.into();
        self
    }

    /// Returns whether the route requires a bearer token.
    #[must_use]
    pub const fn token_required(&self) -> bool {
        self.token_required
    }

    /// Sets whether the route requires a bearer token.
    pub fn set_token_required(&mut self, required: bool) {
        self.token_required = required;
    }

    /// Returns a new context with the token requirement set.
    #[must_use]
    pub fn with_token_required(mut self, required: bool) -> Self {
        self.token_required = required;
        self
    }

    /// Returns the confirmation token.
    #[must_use]
    pub fn confirmation_token(&self) -> &str {
        &self.confirmation_token
    }

    /// Returns a new context with the specified confirmation token.
    #[must_use]
    pub fn with_confirmation_token(mut self, token: impl Into<String>) -> Self {
        self.confirmation_token = token.into();
        self
    }

    /// Returns whether the route requires a confirmation token.
    #[must_use]
    pub const fn confirmation_token_required(&self) -> bool {
        self.confirmation_token_required
    }

    /// Sets whether the route requires a confirmation token.
    pub fn set_confirmation_token_required(&mut self, required: bool) {
        self.confirmation_token_required = required;
    }

    /// Returns a new context with the confirmation token requirement set.
    #[must_use]
    pub fn with_confirmation_token_required(mut self, required: bool) -> Self {
        self.confirmation_token_required = required;
        self
    }

    /// Returns a new context carrying request metadata used for logging.
    #[must_use]
    pub fn with_request_line(
        mut self,
        method: impl Into<String>,
        path: impl Into<String>,
        proto: impl Into<String>,
    ) -> Self {
        self.method = method.into();
        self.path = path.into();
        self.proto = proto.into();
        self
    }

    /// Returns a new context with the host and user agent set.
    #[must_use]
    pub fn with_client(mut self, host: impl Into<String>, user_agent: impl Into<String>) -> Self {
        self.host = host.into();
        self.user_agent = user_agent.into();
        self
    }

    /// HTTP method of the request.
    #[must_use]
    pub fn method(&self) -> &str {
        &self.method
    }

    /// Request path.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Host header.
    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Protocol version, e.g. `HTTP/1.1`.
    #[must_use]
    pub fn proto(&self) -> &str {
        &self.proto
    }

    /// User-Agent header.
    #[must_use]
    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    /// Returns the cancellation token for this request.
    #[must_use]
    pub const fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    /// Returns a new context bound to the given cancellation token.
    #[must_use]
    pub fn with_cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Returns `true` if the request has been cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Returns the elapsed time since the request started.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }
}

impl Default for RequestContext {
    fn default() -> Self {
        Self::new()
    }
}
