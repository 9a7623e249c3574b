//! Bearer token gate.
//!
//! Clients send `Authorization: Bearer Authorization:<jwt>`. The gate strips
//! that prefix, hands the rest to a [`TokenVerifier`] and records the caller
//! on the [`RequestContext`].

use std::sync::Arc;
use tracing::debug;
use utilisync_core::{CallerIdentity, DomainError, RequestContext, TokenError, TokenVerifier, VerifiedClaims};

/// Prefix clients put in front of the token.
pub const BEARER_PREFIX: &str = "Bearer Authorization:";

const MSG_TOKEN_REQUIRED: &str = "token is required";
const MSG_TOKEN_INVALID: &str = "bearer token is missing or invalid";
const MSG_TOKEN_ERROR: &str = "token error";
const MSG_CONFIRMATION_INVALID: &str = "confirmation token is missing or invalid";

/// Resolves the caller from the raw `Authorization` header on the context.
#[derive(Clone)]
pub struct AuthGate {
    verifier: Arc<dyn TokenVerifier>,
}

impl AuthGate {
    /// Creates a gate backed by `verifier`.
    pub fn new(verifier: Arc<dyn TokenVerifier>) -> Self {
        Self { verifier }
    }

    /// A gate that rejects every presented token. Anonymous routes still pass.
    pub fn deny_all() -> Self {
        Self::new(Arc::new(DenyAll))
    }

    /// Authenticates the request.
    ///
    /// Every failure is `bad_request`, including verification failures.
    pub fn authenticate(&self, ctx: &mut RequestContext) -> Result<(), DomainError> {
        let required = ctx.token_required();
        let header = ctx.token().to_string();

        if header.is_empty() {
            if required {
                return Err(DomainError::bad_request(MSG_TOKEN_REQUIRED).with_origin("auth"));
            }
            ctx.set_identity(CallerIdentity::Anonymous);
            return Ok(());
        }

        let token = match header.strip_prefix(BEARER_PREFIX) {
            Some(rest) => rest.trim(),
            None if required => {
                return Err(DomainError::bad_request(MSG_TOKEN_INVALID).with_origin("auth"));
            }
            None => header.trim(),
        };

        if token.is_empty() {
            if required {
                return Err(DomainError::bad_request(MSG_TOKEN_INVALID).with_origin("auth"));
            }
            ctx.set_identity(CallerIdentity::Anonymous);
            return Ok(());
        }

        let claims = self.verifier.verify(token).map_err(|e| {
            DomainError::bad_request(MSG_TOKEN_ERROR)
                .with_cause(e)
                .with_origin("auth")
        })?;

        debug!(user_key = %claims.subject, "authenticated request");
        ctx.set_token(token);
        ctx.set_identity(CallerIdentity::user(claims.subject));
        Ok(())
    }

    /// Fails when a confirmation token is required but absent.
    pub fn check_confirmation(&self, ctx: &RequestContext) -> Result<(), DomainError> {
        check_confirmation(ctx)
    }
}

impl std::fmt::Debug for AuthGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthGate").finish_non_exhaustive()
    }
}

/// Fails with `bad_request` when a required confirmation token is empty.
/// Whether the token is valid is up to the endpoint.
pub fn check_confirmation(ctx: &RequestContext) -> Result<(), DomainError> {
    if ctx.confirmation_token_required() && ctx.confirmation_token().is_empty() {
        return Err(DomainError::bad_request(MSG_CONFIRMATION_INVALID).with_origin("auth"));
    }
    Ok(())
}

struct DenyAll;

impl TokenVerifier for DenyAll {
    fn verify(&self, _token: &str) -> Result<VerifiedClaims, TokenError> {
        Err(TokenError::Invalid("no token verifier configured".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use utilisync_core::ErrorKind;

    struct StaticVerifier;

    impl TokenVerifier for StaticVerifier {
        fn verify(&self, token: &str) -> Result<VerifiedClaims, TokenError> {
            match token {
                "good" => Ok(VerifiedClaims::new("user-1")),
                "old" => Err(TokenError::Expired),
                other => Err(TokenError::Invalid(other.to_string())),
            }
        }
    }

    fn gate() -> AuthGate {
        AuthGate::new(Arc::new(StaticVerifier))
    }

    #[test]
    fn test_anonymous_when_not_required() {
        let mut ctx = RequestContext::new();
        gate().authenticate(&mut ctx).unwrap();
        assert!(ctx.identity().is_anonymous());
    }

    #[test]
    fn test_missing_token_when_required() {
        let mut ctx = RequestContext::new().with_token_required(true);
        let err = gate().authenticate(&mut ctx).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BadRequest);
        assert_eq!(err.message(), "token is required");
    }

    #[test]
    fn test_missing_prefix_when_required() {
        let mut ctx = RequestContext::new()
            .with_token("good")
            .with_token_required(true);
        let err = gate().authenticate(&mut ctx).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BadRequest);
        assert_eq!(err.message(), "bearer token is missing or invalid");
    }

    #[test]
    fn test_prefix_only_when_required() {
        let mut ctx = RequestContext::new()
            .with_token("Bearer Authorization:   ")
            .with_token_required(true);
        let err = gate().authenticate(&mut ctx).unwrap_err();
        assert_eq!(err.message(), "bearer token is missing or invalid");
    }

    #[test]
    fn test_valid_token_sets_identity() {
        let mut ctx = RequestContext::new()
            .with_token("Bearer Authorization: good")
            .with_token_required(true);
        gate().authenticate(&mut ctx).unwrap();
        assert_eq!(ctx.user_key(), "user-1");
        assert_eq!(ctx.token(), "good");
    }

    #[test]
    fn test_verification_failure_is_bad_request() {
        let mut ctx = RequestContext::new()
            .with_token("Bearer Authorization:old")
            .with_token_required(true);
        let err = gate().authenticate(&mut ctx).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BadRequest);
        assert_eq!(err.message(), "token error");
        assert!(err.to_string().contains("token has expired"));
        assert!(ctx.identity().is_anonymous());
    }

    #[test]
    fn test_presented_token_verified_when_optional() {
        let mut ctx = RequestContext::new().with_token("Bearer Authorization:forged");
        assert!(gate().authenticate(&mut ctx).is_err());

        let mut ctx = RequestContext::new().with_token("Bearer Authorization:good");
        gate().authenticate(&mut ctx).unwrap();
        assert_eq!(ctx.user_key(), "user-1");
    }

    #[test]
    fn test_deny_all_gate() {
        let gate = AuthGate::deny_all();
        let mut ctx = RequestContext::new();
        assert!(gate.authenticate(&mut ctx).is_ok());

        let mut ctx = RequestContext::new().with_token("Bearer Authorization:good");
        assert!(gate.authenticate(&mut ctx).is_err());
    }

    #[test]
    fn test_confirmation_check() {
        let ctx = RequestContext::new();
        assert!(check_confirmation(&ctx).is_ok());

        let ctx = RequestContext::new().with_confirmation_token_required(true);
        let err = check_confirmation(&ctx).unwrap_err();
        assert_eq!(err.message(), "confirmation token is missing or invalid");

        let ctx = ctx.with_confirmation_token("abc");
        assert!(check_confirmation(&ctx).is_ok());
    }
}
