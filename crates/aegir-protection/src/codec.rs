//! Signed self-contained token codec.
//!
//! Tokens are compact JWTs signed with HMAC-SHA256. Every token carries a
//! private purpose claim (`aegir_prp`) restricting it to one specific use:
//! verification with a mismatched purpose fails even when the signature is
//! valid, preventing cross-use token replay.

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ProtectionError;

/// Name of the private purpose claim.
pub const PURPOSE_CLAIM: &str = "aegir_prp";

/// Claims carried by a self-contained aegir token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Issuer (the service's own base URI).
    pub iss: String,

    /// Audience (the service's own base URI for internal tokens).
    pub aud: String,

    /// Expiration time (Unix timestamp).
    pub exp: i64,

    /// Issued at time (Unix timestamp).
    pub iat: i64,

    /// Private purpose marker restricting the token to one use.
    #[serde(rename = "aegir_prp")]
    pub purpose: String,

    /// Payload claims (request parameters, principal claims, ...).
    #[serde(flatten)]
    pub payload: Map<String, Value>,
}

impl TokenClaims {
    /// Create claims issued now with the given lifetime.
    #[must_use]
    pub fn new(
        issuer: impl Into<String>,
        audience: impl Into<String>,
        purpose: impl Into<String>,
        lifetime: Duration,
    ) -> Self {
        let now = Utc::now();
        Self {
            iss: issuer.into(),
            aud: audience.into(),
            exp: (now + lifetime).timestamp(),
            iat: now.timestamp(),
            purpose: purpose.into(),
            payload: Map::new(),
        }
    }

    /// Attach a payload claim.
    #[must_use]
    pub fn claim(mut self, name: impl Into<String>, value: Value) -> Self {
        self.payload.insert(name.into(), value);
        self
    }
}

/// Issues and verifies signed self-contained tokens.
pub struct TokenCodec {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl TokenCodec {
    /// Create a codec over a shared signing secret.
    ///
    /// # Errors
    ///
    /// Returns [`ProtectionError::InvalidKey`] for an empty secret; this is
    /// a configuration fault caught at construction time.
    pub fn new(secret: &[u8]) -> Result<Self, ProtectionError> {
        if secret.is_empty() {
            return Err(ProtectionError::InvalidKey(
                "signing secret must not be empty".into(),
            ));
        }
        Ok(Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
        })
    }

    /// Sign claims into a compact token string.
    ///
    /// # Errors
    ///
    /// Returns [`ProtectionError::Crypto`] when encoding fails.
    pub fn issue(&self, claims: &TokenClaims) -> Result<String, ProtectionError> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding)
            .map_err(|e| ProtectionError::Crypto(format!("token encoding failed: {e}")))
    }

    /// Verify a token's signature, issuer, audience, expiry, and purpose.
    ///
    /// The purpose claim must be one of `allowed_purposes`; a valid
    /// signature with the wrong purpose is still an invalid token.
    ///
    /// # Errors
    ///
    /// Returns [`ProtectionError::InvalidToken`] for any expected per-token
    /// failure: malformed input, bad signature, expiry, issuer/audience
    /// mismatch, or purpose mismatch.
    pub fn verify(
        &self,
        token: &str,
        issuer: &str,
        audience: &str,
        allowed_purposes: &[&str],
    ) -> Result<TokenClaims, ProtectionError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[issuer]);
        validation.set_audience(&[audience]);

        let data = decode::<TokenClaims>(token, &self.decoding, &validation)
            .map_err(|e| ProtectionError::InvalidToken(format!("verification failed: {e}")))?;

        let claims = data.claims;
        if !allowed_purposes.contains(&claims.purpose.as_str()) {
            tracing::debug!(
                purpose = %claims.purpose,
                "token purpose not in allowed set"
            );
            return Err(ProtectionError::InvalidToken(format!(
                "unexpected token purpose '{}'",
                claims.purpose
            )));
        }
        Ok(claims)
    }
}

impl std::fmt::Debug for TokenCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenCodec").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const ISSUER: &str = "https://id.example.com";

    fn codec() -> TokenCodec {
        TokenCodec::new(b"test-signing-secret-at-least-32-bytes").unwrap()
    }

    #[test]
    fn test_empty_secret_fails_fast() {
        assert!(matches!(
            TokenCodec::new(b""),
            Err(ProtectionError::InvalidKey(_))
        ));
    }

    #[test]
    fn test_issue_and_verify_round_trip() {
        let codec = codec();
        let claims = TokenClaims::new(ISSUER, ISSUER, "logout_request", Duration::minutes(15))
            .claim("client_id", json!("app"));

        let token = codec.issue(&claims).unwrap();
        let verified = codec
            .verify(&token, ISSUER, ISSUER, &["logout_request"])
            .unwrap();

        assert_eq!(verified.purpose, "logout_request");
        assert_eq!(verified.payload.get("client_id"), Some(&json!("app")));
    }

    #[test]
    fn test_wrong_purpose_is_invalid() {
        let codec = codec();
        let claims = TokenClaims::new(ISSUER, ISSUER, "logout_request", Duration::minutes(15));
        let token = codec.issue(&claims).unwrap();

        let result = codec.verify(&token, ISSUER, ISSUER, &["access_token"]);
        assert!(matches!(result, Err(ProtectionError::InvalidToken(_))));
    }

    #[test]
    fn test_wrong_issuer_is_invalid() {
        let codec = codec();
        let claims = TokenClaims::new(ISSUER, ISSUER, "logout_request", Duration::minutes(15));
        let token = codec.issue(&claims).unwrap();

        let result = codec.verify(&token, "https://other.example.com", ISSUER, &["logout_request"]);
        assert!(matches!(result, Err(ProtectionError::InvalidToken(_))));
    }

    #[test]
    fn test_expired_token_is_invalid() {
        let codec = codec();
        // Issued long enough in the past to defeat the default leeway.
        let claims = TokenClaims::new(ISSUER, ISSUER, "logout_request", Duration::minutes(-10));
        let token = codec.issue(&claims).unwrap();

        let result = codec.verify(&token, ISSUER, ISSUER, &["logout_request"]);
        assert!(matches!(result, Err(ProtectionError::InvalidToken(_))));
    }

    #[test]
    fn test_tampered_token_is_invalid() {
        let codec = codec();
        let claims = TokenClaims::new(ISSUER, ISSUER, "logout_request", Duration::minutes(15));
        let mut token = codec.issue(&claims).unwrap();
        token.push('x');

        let result = codec.verify(&token, ISSUER, ISSUER, &["logout_request"]);
        assert!(matches!(result, Err(ProtectionError::InvalidToken(_))));
    }

    #[test]
    fn test_garbage_input_is_invalid() {
        let codec = codec();
        let result = codec.verify("not-a-token", ISSUER, ISSUER, &["logout_request"]);
        assert!(matches!(result, Err(ProtectionError::InvalidToken(_))));
    }
}
