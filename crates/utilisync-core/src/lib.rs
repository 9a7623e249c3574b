//! # Utilisync Core
//!
//! Core types shared by every Utilisync crate.
//!
//! - [`DomainError`] / [`ErrorKind`] - The closed error taxonomy and its HTTP mapping
//! - [`RequestContext`] - Per-request state carried through the handler pipeline
//! - [`RequestId`] - UUID v7 request identifier
//! - [`CallerIdentity`] - Resolved caller (anonymous or an authenticated user key)
//! - [`TokenVerifier`] - Seam for bearer token verification
//! - [`CancelToken`] - Cloneable cancellation flag shared between tasks

#![doc(html_root_url = "https://docs.rs/utilisync-core/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod cancel;
mod context;
mod error;
mod identity;

pub use cancel::CancelToken;
pub use context::{RequestContext, RequestId};
pub use error::{DomainError, DomainResult, ErrorBody, ErrorEnvelope, ErrorKind};
pub use identity::{CallerIdentity, TokenError, TokenVerifier, VerifiedClaims};
