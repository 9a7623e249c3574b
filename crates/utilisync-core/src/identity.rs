//! Caller identity and the token verification seam.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The resolved identity of a caller.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CallerIdentity {
    /// No token was presented.
    #[default]
    Anonymous,
    /// A verified bearer token resolved to this user.
    User {
        /// The user key taken from the token's subject claim.
        user_key: String,
    },
}

impl CallerIdentity {
    /// Creates a user identity.
    #[must_use]
    pub fn user(user_key: impl Into<String>) -> Self {
        Self::User {
            user_key: user_key.into(),
        }
    }

    /// Returns the user key, or an empty string for anonymous callers.
    #[must_use]
    pub fn user_key(&self) -> &str {
        match self {
            Self::Anonymous => "",
            Self::User { user_key } => user_key,
        }
    }

    /// Returns `true` if no user has been resolved.
    #[must_use]
    pub const fn is_anonymous(&self) -> bool {
        matches!(self, Self::Anonymous)
    }

    /// Returns a string for log correlation.
    #[must_use]
    pub fn log_id(&self) -> String {
        match self {
            Self::Anonymous => "anonymous".to_string(),
            Self::User { user_key } => format!("user:{user_key}"),
        }
    }
}

/// Claims extracted from a verified token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedClaims {
    /// The subject (user key).
    pub subject: String,
    /// Reason given when an operator issued the token on a user's behalf.
    pub override_reason: Option<String>,
}

impl VerifiedClaims {
    /// Creates claims for a subject with no override.
    #[must_use]
    pub fn new(subject: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            override_reason: None,
        }
    }
}

/// Errors reported by a [`TokenVerifier`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenError {
    /// The token was signed with an algorithm the verifier does not accept.
    #[error("unexpected signing method: {0}")]
    InvalidSigningMethod(String),

    /// The token has expired.
    #[error("token has expired")]
    Expired,

    /// The token could not be parsed or its signature did not match.
    #[error("invalid token: {0}")]
    Invalid(String),

    /// A required claim was missing or had the wrong type.
    #[error("missing claim: {0}")]
    MissingClaim(&'static str),

    /// A token could not be signed.
    #[error("failed to sign token: {0}")]
    Signing(String),
}

/// Verifies raw bearer tokens.
///
/// Implementations receive the token with the bearer prefix already removed.
pub trait TokenVerifier: Send + Sync {
    /// Verifies `token` and returns its claims.
    fn verify(&self, token: &str) -> Result<VerifiedClaims, TokenError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_anonymous_has_empty_user_key() {
        let identity = CallerIdentity::default();
        assert!(identity.is_anonymous());
        assert_eq!(identity.user_key(), "");
        assert_eq!(identity.log_id(), "anonymous");
    }

    #[test]
    fn test_user_identity() {
        let identity = CallerIdentity::user("42");
        assert!(!identity.is_anonymous());
        assert_eq!(identity.user_key(), "42");
        assert_eq!(identity.log_id(), "user:42");
    }

    #[test]
    fn test_identity_serialization() {
        let json = serde_json::to_value(CallerIdentity::user("7")).expect("serialize");
        assert_eq!(json["type"], "user");
        assert_eq!(json["user_key"], "7");
    }

    #[test]
    fn test_token_error_display() {
        assert_eq!(TokenError::Expired.to_string(), "token has expired");
        assert_eq!(
            TokenError::InvalidSigningMethod("RS256".into()).to_string(),
            "unexpected signing method: RS256"
        );
    }
}
