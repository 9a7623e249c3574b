//! Error taxonomy for Utilisync.
//!
//! Every failure in the handler pipeline is a [`DomainError`]: a closed
//! [`ErrorKind`], an optional wrapped cause and an optional user-facing
//! message override. The kind alone decides the HTTP status and the default
//! message, so clients see a stable contract regardless of the cause.
//!
//! | Kind | Status |
//! |---|---|
//! | `bad_request`, `conflict`, `forbidden`, `invalid`, `not_found` | 400 |
//! | `authenticate` | 401 |
//! | `todo` | 501 |
//! | `external` | 502 |
//! | `internal` | 500 |
//!
//! `not_found` deliberately maps to 400, not 404. Clients depend on it.

use http::StatusCode;
use serde::{Deserialize, Serialize};
use std::error::Error as StdError;
use std::fmt;

/// Result type alias using [`DomainError`].
pub type DomainResult<T> = Result<T, DomainError>;

type Cause = Box<dyn StdError + Send + Sync + 'static>;

const MSG_BAD_REQUEST: &str = "We were unable to process your request.";
const MSG_AUTHENTICATE: &str = "An authentication error occurred.";
const MSG_TODO: &str = "This feature is not yet ready.";
const MSG_EXTERNAL: &str = "An unexpected external error occurred.";
const MSG_INTERNAL: &str = "An unexpected error occurred.";

/// The closed set of error kinds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// The caller could not be authenticated.
    Authenticate,
    /// The request was malformed or missing data.
    BadRequest,
    /// The request conflicts with existing state.
    Conflict,
    /// A downstream collaborator failed.
    External,
    /// The caller may not perform the action.
    Forbidden,
    /// Unexpected failure inside the service.
    #[default]
    Internal,
    /// The request was understood but its content is invalid.
    Invalid,
    /// A referenced resource does not exist.
    NotFound,
    /// The feature is not implemented yet.
    Todo,
}

impl ErrorKind {
    /// Every kind, in wire-name order.
    pub const ALL: [Self; 9] = [
        Self::Authenticate,
        Self::BadRequest,
        Self::Conflict,
        Self::External,
        Self::Forbidden,
        Self::Internal,
        Self::Invalid,
        Self::NotFound,
        Self::Todo,
    ];

    /// Returns the wire name of the kind.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Authenticate => "authenticate",
            Self::BadRequest => "bad_request",
            Self::Conflict => "conflict",
            Self::External => "external",
            Self::Forbidden => "forbidden",
            Self::Internal => "internal",
            Self::Invalid => "invalid",
            Self::NotFound => "not_found",
            Self::Todo => "todo",
        }
    }

    /// Parses a wire name. Unknown or empty names resolve to [`ErrorKind::Internal`].
    #[must_use]
    pub fn parse(name: &str) -> Self {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == name)
            .unwrap_or_default()
    }

    /// Returns the HTTP status code for this kind.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::BadRequest | Self::Conflict | Self::Forbidden | Self::Invalid | Self::NotFound => {
                StatusCode::BAD_REQUEST
            }
            Self::Authenticate => StatusCode::UNAUTHORIZED,
            Self::Todo => StatusCode::NOT_IMPLEMENTED,
            Self::External => StatusCode::BAD_GATEWAY,
            Self::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Returns the message shown to clients when no override is given.
    #[must_use]
    pub const fn default_message(&self) -> &'static str {
        match self {
            Self::BadRequest | Self::Conflict | Self::Forbidden | Self::Invalid | Self::NotFound => {
                MSG_BAD_REQUEST
            }
            Self::Authenticate => MSG_AUTHENTICATE,
            Self::Todo => MSG_TODO,
            Self::External => MSG_EXTERNAL,
            Self::Internal => MSG_INTERNAL,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured error used throughout the handler pipeline.
///
/// A `DomainError` is built once at the point of failure and then only
/// moved. The consuming `with_*` builders exist for construction sites.
///
/// # Example
///
/// ```
/// use utilisync_core::{DomainError, ErrorKind};
///
/// let err = DomainError::bad_request("email is required").with_origin("users.create");
/// assert_eq!(err.kind(), ErrorKind::BadRequest);
/// assert_eq!(err.code().as_u16(), 400);
/// assert_eq!(err.message(), "email is required");
/// ```
pub struct DomainError {
    kind: ErrorKind,
    origin: Option<String>,
    message: Option<String>,
    cause: Option<Cause>,
}

impl DomainError {
    /// Creates an error from all of its parts.
    #[must_use]
    pub fn new(kind: ErrorKind, cause: Option<Cause>, message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            kind,
            origin: None,
            message: (!message.is_empty()).then_some(message),
            cause,
        }
    }

    /// Creates an error of the given kind with no cause and the default message.
    #[must_use]
    pub const fn from_kind(kind: ErrorKind) -> Self {
        Self {
            kind,
            origin: None,
            message: None,
            cause: None,
        }
    }

    /// Creates a `bad_request` error.
    #[must_use]
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::BadRequest, None, message)
    }

    /// Creates an `authenticate` error.
    #[must_use]
    pub fn authenticate(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Authenticate, None, message)
    }

    /// Creates a `conflict` error.
    #[must_use]
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Conflict, None, message)
    }

    /// Creates an `external` error.
    #[must_use]
    pub fn external(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::External, None, message)
    }

    /// Creates a `forbidden` error.
    #[must_use]
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Forbidden, None, message)
    }

    /// Creates an `internal` error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, None, message)
    }

    /// Creates an `invalid` error.
    #[must_use]
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Invalid, None, message)
    }

    /// Creates a `not_found` error.
    #[must_use]
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, None, message)
    }

    /// Creates a `todo` error.
    #[must_use]
    pub fn todo(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Todo, None, message)
    }

    /// Attaches the underlying cause.
    #[must_use]
    pub fn with_cause(mut self, cause: impl Into<Cause>) -> Self {
        self.cause = Some(cause.into());
        self
    }

    /// Attaches the operation tag that produced the error.
    #[must_use]
    pub fn with_origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = Some(origin.into());
        self
    }

    /// Returns the error kind.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Returns the HTTP status code for this error.
    #[must_use]
    pub const fn code(&self) -> StatusCode {
        self.kind.status_code()
    }

    /// Returns the message override, or the kind's default message.
    #[must_use]
    pub fn message(&self) -> &str {
        self.message
            .as_deref()
            .unwrap_or_else(|| self.kind.default_message())
    }

    /// Returns the operation tag, if any.
    #[must_use]
    pub fn origin(&self) -> Option<&str> {
        self.origin.as_deref()
    }

    /// Returns the wrapped cause, if any.
    #[must_use]
    pub fn cause(&self) -> Option<&(dyn StdError + Send + Sync + 'static)> {
        self.cause.as_deref()
    }

    /// Builds the client-facing envelope. Causes never leave the process.
    #[must_use]
    pub fn to_envelope(&self) -> ErrorEnvelope {
        ErrorEnvelope {
            error: ErrorBody {
                kind: self.kind,
                message: self.message().to_string(),
            },
        }
    }
}

impl From<ErrorKind> for DomainError {
    fn from(kind: ErrorKind) -> Self {
        Self::from_kind(kind)
    }
}

impl fmt::Display for DomainError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(origin) = &self.origin {
            write!(f, "{origin}: ")?;
        }
        f.write_str(self.kind.as_str())?;
        if let Some(cause) = &self.cause {
            write!(f, ": {cause}")?;
        } else if let Some(message) = &self.message {
            write!(f, ": {message}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for DomainError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DomainError")
            .field("kind", &self.kind)
            .field("origin", &self.origin)
            .field("message", &self.message)
            .field("cause", &self.cause.as_ref().map(ToString::to_string))
            .finish()
    }
}

impl StdError for DomainError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.cause
            .as_deref()
            .map(|cause| cause as &(dyn StdError + 'static))
    }
}

/// Serializable error envelope for HTTP responses.
///
/// Serializes to exactly `{"error":{"kind":"...","message":"..."}}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    /// The error details.
    pub error: ErrorBody,
}

/// Error detail within an envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Machine-readable error kind.
    pub kind: ErrorKind,
    /// Human-readable error message.
    pub message: String,
}
