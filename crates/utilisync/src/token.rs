//! Bearer tokens.
//!
//! Tokens are HS256 JWTs carrying the user ID in `sub`. Override tokens,
//! issued to support staff acting on a user's behalf, carry the reason in
//! `ovr` and expire sooner.

use jsonwebtoken::errors::ErrorKind as JwtErrorKind;
use jsonwebtoken::{decode, decode_header, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use utilisync_core::{TokenError, TokenVerifier, VerifiedClaims};

/// Default lifetime of a user token.
pub const DEFAULT_TOKEN_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Default lifetime of an override token.
pub const DEFAULT_OVERRIDE_TTL: Duration = Duration::from_secs(4 * 60 * 60);

const HMAC_ALGORITHMS: [Algorithm; 3] = [Algorithm::HS256, Algorithm::HS384, Algorithm::HS512];

/// Signing key and lifetimes.
#[derive(Clone)]
pub struct TokenSettings {
    /// HMAC secret.
    pub signing_key: String,
    /// Lifetime of a user token.
    pub token_ttl: Duration,
    /// Lifetime of an override token.
    pub override_ttl: Duration,
}

impl TokenSettings {
    /// Settings with the default lifetimes.
    pub fn new(signing_key: impl Into<String>) -> Self {
        Self {
            signing_key: signing_key.into(),
            token_ttl: DEFAULT_TOKEN_TTL,
            override_ttl: DEFAULT_OVERRIDE_TTL,
        }
    }
}

impl fmt::Debug for TokenSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenSettings")
            .field("signing_key", &"[REDACTED]")
            .field("token_ttl", &self.token_ttl)
            .field("override_ttl", &self.override_ttl)
            .finish()
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: String,
    exp: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    ovr: Option<String>,
}

/// Issues and verifies JWTs.
pub struct JwtTokens {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    token_ttl: Duration,
    override_ttl: Duration,
}

impl JwtTokens {
    /// Creates the issuer/verifier.
    pub fn new(settings: &TokenSettings) -> Self {
        let secret = settings.signing_key.as_bytes();

        let mut validation = Validation::new(Algorithm::HS256);
        validation.algorithms = HMAC_ALGORITHMS.to_vec();
        validation.set_required_spec_claims(&["exp", "sub"]);
        validation.leeway = 0;

        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            validation,
            token_ttl: settings.token_ttl,
            override_ttl: settings.override_ttl,
        }
    }

    /// Issues a token for `uid`. An override reason shortens the lifetime
    /// and is recorded in the token.
    pub fn issue(&self, uid: &str, override_reason: Option<&str>) -> Result<String, TokenError> {
        let override_reason = override_reason.filter(|reason| !reason.is_empty());
        let ttl = if override_reason.is_some() {
            self.override_ttl
        } else {
            self.token_ttl
        };

        let claims = Claims {
            sub: uid.to_string(),
            exp: unix_now().saturating_add(ttl.as_secs()),
            ovr: override_reason.map(str::to_string),
        };
        self.sign(&claims)
    }

    fn sign(&self, claims: &Claims) -> Result<String, TokenError> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding)
            .map_err(|e| TokenError::Signing(e.to_string()))
    }

    /// Verifies `token`, with or without a leading `Bearer `.
    pub fn verify(&self, token: &str) -> Result<VerifiedClaims, TokenError> {
        let token = token.strip_prefix("Bearer ").unwrap_or(token);

        let header = decode_header(token).map_err(|e| TokenError::Invalid(e.to_string()))?;
        if !HMAC_ALGORITHMS.contains(&header.alg) {
            return Err(TokenError::InvalidSigningMethod(format!("{:?}", header.alg)));
        }

        let data = decode::<Claims>(token, &self.decoding, &self.validation).map_err(|e| {
            match e.kind() {
                JwtErrorKind::ExpiredSignature => TokenError::Expired,
                JwtErrorKind::InvalidAlgorithm => {
                    TokenError::InvalidSigningMethod(format!("{:?}", header.alg))
                }
                JwtErrorKind::MissingRequiredClaim(claim) if claim == "sub" => {
                    TokenError::MissingClaim("sub")
                }
                JwtErrorKind::MissingRequiredClaim(_) => TokenError::MissingClaim("exp"),
                _ => TokenError::Invalid(e.to_string()),
            }
        })?;

        Ok(VerifiedClaims {
            subject: data.claims.sub,
            override_reason: data.claims.ovr,
        })
    }
}

impl TokenVerifier for JwtTokens {
    fn verify(&self, token: &str) -> Result<VerifiedClaims, TokenError> {
        Self::verify(self, token)
    }
}

impl fmt::Debug for JwtTokens {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JwtTokens")
            .field("token_ttl", &self.token_ttl)
            .field("override_ttl", &self.override_ttl)
            .finish_non_exhaustive()
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;
    use base64::Engine as _;

    fn tokens() -> JwtTokens {
        JwtTokens::new(&TokenSettings::new("unit-test-key"))
    }

    fn payload(token: &str) -> serde_json::Value {
        let part = token.split('.').nth(1).unwrap();
        serde_json::from_slice(&URL_SAFE_NO_PAD.decode(part).unwrap()).unwrap()
    }

    #[test]
    fn test_issue_and_verify() {
        let tokens = tokens();
        let token = tokens.issue("user-1", None).unwrap();

        let claims = tokens.verify(&token).unwrap();
        assert_eq!(claims.subject, "user-1");
        assert_eq!(claims.override_reason, None);
    }

    #[test]
    fn test_bearer_prefix_is_stripped() {
        let tokens = tokens();
        let token = tokens.issue("user-1", None).unwrap();
        assert!(tokens.verify(&format!("Bearer {token}")).is_ok());
    }

    #[test]
    fn test_expiry_windows() {
        let tokens = tokens();
        let now = unix_now();

        let normal = payload(&tokens.issue("user-1", None).unwrap());
        let exp = normal["exp"].as_u64().unwrap();
        assert!(exp >= now + DEFAULT_TOKEN_TTL.as_secs() - 5);
        assert!(normal.get("ovr").is_none());

        let override_token = tokens.issue("user-1", Some("support ticket 12")).unwrap();
        let claims = payload(&override_token);
        let exp = claims["exp"].as_u64().unwrap();
        assert!(exp <= now + DEFAULT_OVERRIDE_TTL.as_secs() + 5);
        assert_eq!(claims["ovr"], "support ticket 12");

        let verified = tokens.verify(&override_token).unwrap();
        assert_eq!(verified.override_reason.as_deref(), Some("support ticket 12"));
    }

    #[test]
    fn test_empty_override_reason_is_ignored() {
        let tokens = tokens();
        let claims = payload(&tokens.issue("user-1", Some("")).unwrap());
        assert!(claims.get("ovr").is_none());
    }

    #[test]
    fn test_expired_token() {
        let tokens = tokens();
        let token = tokens
            .sign(&Claims {
                sub: "user-1".to_string(),
                exp: unix_now() - 120,
                ovr: None,
            })
            .unwrap();
        assert_eq!(tokens.verify(&token), Err(TokenError::Expired));
    }

    #[test]
    fn test_wrong_key() {
        let other = JwtTokens::new(&TokenSettings::new("another-key"));
        let token = other.issue("user-1", None).unwrap();
        assert!(matches!(tokens().verify(&token), Err(TokenError::Invalid(_))));
    }

    #[test]
    fn test_non_hmac_algorithm_rejected() {
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"RS256","typ":"JWT"}"#);
        let body = URL_SAFE_NO_PAD.encode(br#"{"sub":"user-1","exp":9999999999}"#);
        let token = format!("{header}.{body}.c2lnbmF0dXJl");
        assert!(matches!(
            tokens().verify(&token),
            Err(TokenError::InvalidSigningMethod(_))
        ));
    }

    #[test]
    fn test_missing_subject() {
        let tokens = tokens();
        let token = encode(
            &Header::new(Algorithm::HS256),
            &serde_json::json!({ "exp": unix_now() + 60 }),
            &tokens.encoding,
        )
        .unwrap();
        assert!(tokens.verify(&token).is_err());
    }

    #[test]
    fn test_garbage() {
        assert!(matches!(tokens().verify("not.a.jwt"), Err(TokenError::Invalid(_))));
        assert!(tokens().verify("").is_err());
    }

    #[test]
    fn test_settings_debug_redacts_key() {
        let debug = format!("{:?}", TokenSettings::new("super-secret"));
        assert!(!debug.contains("super-secret"));
    }
}
