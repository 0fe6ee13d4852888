//! Format-dispatching token validation.
//!
//! A [`TokenValidator`] holds an ordered list of format validators. Each
//! format advertises a cheap structural `quick_check` so the chain avoids
//! expensive failed unprotection attempts across every registered format;
//! the probe is provider-specific and pluggable, not a universal contract.
//! The first validator to resolve a principal wins — ordering encodes
//! format-precedence policy. Formats that do not support the requested
//! token kinds report `NotApplicable`, never rejection.

use std::sync::Arc;

use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::Duration;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::codec::{TokenClaims, TokenCodec};
use crate::error::ProtectionError;
use crate::protector::DataProtector;

/// Kinds of security token the engine works with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenKind {
    /// OAuth2 access token.
    AccessToken,
    /// OAuth2 refresh token.
    RefreshToken,
    /// Authorization code.
    AuthorizationCode,
    /// OIDC ID token.
    IdToken,
}

impl TokenKind {
    /// Wire name of the kind, matching `token_type_hint` values.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::AccessToken => "access_token",
            Self::RefreshToken => "refresh_token",
            Self::AuthorizationCode => "authorization_code",
            Self::IdToken => "id_token",
        }
    }

    /// Parse a `token_type_hint` value.
    #[must_use]
    pub fn from_hint(hint: &str) -> Option<Self> {
        match hint {
            "access_token" => Some(Self::AccessToken),
            "refresh_token" => Some(Self::RefreshToken),
            "authorization_code" => Some(Self::AuthorizationCode),
            "id_token" => Some(Self::IdToken),
            _ => None,
        }
    }
}

impl std::fmt::Display for TokenKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Wire format of a token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenFormat {
    /// Signed JWT carrying its own claims.
    SelfContained,
    /// Opaque reference payload sealed by the data protector.
    Reference,
}

impl TokenFormat {
    /// Purpose-label form of the format.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::SelfContained => "self-contained",
            Self::Reference => "reference",
        }
    }
}

/// Purpose labels scoping protection of one `(kind, format)` pair.
///
/// The same labels must be used at issuance and validation; unprotection
/// with a mismatched purpose set fails rather than silently succeeding.
#[must_use]
pub fn purpose_labels(kind: TokenKind, format: TokenFormat) -> [&'static str; 3] {
    ["aegir", kind.as_str(), format.label()]
}

/// Claims set reconstituted from a validated token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Principal {
    /// Resolved token kind.
    pub kind: TokenKind,
    /// Claims carried by the token.
    pub claims: Map<String, Value>,
}

impl Principal {
    /// Get a claim value by name.
    #[must_use]
    pub fn claim(&self, name: &str) -> Option<&Value> {
        self.claims.get(name)
    }
}

/// Result of one format validator's attempt at a token.
#[derive(Debug)]
pub enum ValidationOutcome {
    /// This format does not handle the token or the requested kinds; the
    /// chain continues. Not an error.
    NotApplicable,
    /// The token matched this format structurally but failed verification;
    /// the chain continues and the caller eventually rejects.
    Invalid,
    /// The token verified and a principal was reconstituted.
    Valid(Principal),
}

/// One token format's validation capability.
#[async_trait]
pub trait TokenFormatValidator: Send + Sync {
    /// Wire format this validator handles.
    fn format(&self) -> TokenFormat;

    /// Cheap structural probe: whether this format's unprotection routine
    /// should attempt the token at all.
    fn quick_check(&self, token: &str) -> bool;

    /// Attempt to validate the token for one of the acceptable kinds.
    ///
    /// # Errors
    ///
    /// Only unexpected conditions (key faults, crypto infrastructure
    /// failures) are returned as `Err`; expected per-token failures are
    /// [`ValidationOutcome::Invalid`].
    async fn validate(
        &self,
        token: &str,
        hints: &[TokenKind],
    ) -> Result<ValidationOutcome, ProtectionError>;
}

/// Resolve which of this validator's supported kinds the caller accepts.
///
/// An empty hint set is unrestricted and selects the access-token path.
fn resolve_kind(supported: &[TokenKind], hints: &[TokenKind]) -> Option<TokenKind> {
    if hints.is_empty() {
        return supported
            .contains(&TokenKind::AccessToken)
            .then_some(TokenKind::AccessToken);
    }
    supported.iter().copied().find(|k| hints.contains(k))
}

/// Validates signed self-contained tokens (JWTs).
pub struct SelfContainedTokenValidator {
    codec: Arc<TokenCodec>,
    issuer: String,
}

impl SelfContainedTokenValidator {
    const SUPPORTED: &'static [TokenKind] = &[TokenKind::AccessToken, TokenKind::IdToken];

    /// Create a validator over the given codec and expected issuer.
    #[must_use]
    pub fn new(codec: Arc<TokenCodec>, issuer: impl Into<String>) -> Self {
        Self {
            codec,
            issuer: issuer.into(),
        }
    }

    /// Purpose claim value for a self-contained token of the given kind.
    #[must_use]
    pub fn purpose(kind: TokenKind) -> String {
        purpose_labels(kind, TokenFormat::SelfContained).join(":")
    }

    /// Issue a self-contained token of the given kind. The counterpart of
    /// [`TokenFormatValidator::validate`] for this format.
    ///
    /// # Errors
    ///
    /// Propagates codec failures.
    pub fn seal(
        &self,
        kind: TokenKind,
        claims: Map<String, Value>,
        lifetime: Duration,
    ) -> Result<String, ProtectionError> {
        let mut token_claims =
            TokenClaims::new(&self.issuer, &self.issuer, Self::purpose(kind), lifetime);
        token_claims.payload = claims;
        self.codec.issue(&token_claims)
    }
}

#[async_trait]
impl TokenFormatValidator for SelfContainedTokenValidator {
    fn format(&self) -> TokenFormat {
        TokenFormat::SelfContained
    }

    fn quick_check(&self, token: &str) -> bool {
        // Compact JOSE: base64url header starting with '{"' ("ey") and
        // exactly two dot separators.
        token.starts_with("ey") && token.bytes().filter(|b| *b == b'.').count() == 2
    }

    async fn validate(
        &self,
        token: &str,
        hints: &[TokenKind],
    ) -> Result<ValidationOutcome, ProtectionError> {
        let Some(kind) = resolve_kind(Self::SUPPORTED, hints) else {
            return Ok(ValidationOutcome::NotApplicable);
        };

        let purpose = Self::purpose(kind);
        match self
            .codec
            .verify(token, &self.issuer, &self.issuer, &[purpose.as_str()])
        {
            Ok(claims) => {
                let mut principal_claims = claims.payload;
                principal_claims.insert("iss".into(), Value::String(claims.iss));
                principal_claims.insert("aud".into(), Value::String(claims.aud));
                principal_claims.insert("exp".into(), claims.exp.into());
                principal_claims.insert("iat".into(), claims.iat.into());
                Ok(ValidationOutcome::Valid(Principal {
                    kind,
                    claims: principal_claims,
                }))
            }
            Err(e) if e.is_invalid_token() => {
                tracing::debug!(error = %e, "self-contained token failed verification");
                Ok(ValidationOutcome::Invalid)
            }
            Err(e) => Err(e),
        }
    }
}

/// Validates opaque reference tokens sealed by the data protector.
///
/// Wire form: base64url of a 4-byte magic prefix followed by the protected
/// claims payload.
pub struct ReferenceTokenValidator {
    protector: Arc<dyn DataProtector>,
}

impl ReferenceTokenValidator {
    const SUPPORTED: &'static [TokenKind] = &[
        TokenKind::AccessToken,
        TokenKind::RefreshToken,
        TokenKind::AuthorizationCode,
    ];

    /// Magic prefix identifying this issuer's reference tokens.
    pub const MAGIC: &'static [u8; 4] = b"agr1";

    /// Create a validator over the given protector.
    #[must_use]
    pub fn new(protector: Arc<dyn DataProtector>) -> Self {
        Self { protector }
    }

    /// Issue a reference token of the given kind. The counterpart of
    /// [`TokenFormatValidator::validate`] for this format.
    ///
    /// # Errors
    ///
    /// Propagates protector failures.
    pub fn seal(
        &self,
        kind: TokenKind,
        claims: &Map<String, Value>,
    ) -> Result<String, ProtectionError> {
        let plaintext = serde_json::to_vec(claims)
            .map_err(|e| ProtectionError::Crypto(format!("claims serialization failed: {e}")))?;
        let protected = self
            .protector
            .protect(&purpose_labels(kind, TokenFormat::Reference), &plaintext)?;

        let mut payload = Vec::with_capacity(Self::MAGIC.len() + protected.len());
        payload.extend_from_slice(Self::MAGIC);
        payload.extend_from_slice(&protected);
        Ok(URL_SAFE_NO_PAD.encode(payload))
    }
}

#[async_trait]
impl TokenFormatValidator for ReferenceTokenValidator {
    fn format(&self) -> TokenFormat {
        TokenFormat::Reference
    }

    fn quick_check(&self, token: &str) -> bool {
        URL_SAFE_NO_PAD
            .decode(token)
            .map(|bytes| bytes.starts_with(Self::MAGIC))
            .unwrap_or(false)
    }

    async fn validate(
        &self,
        token: &str,
        hints: &[TokenKind],
    ) -> Result<ValidationOutcome, ProtectionError> {
        let Some(kind) = resolve_kind(Self::SUPPORTED, hints) else {
            return Ok(ValidationOutcome::NotApplicable);
        };

        let Ok(payload) = URL_SAFE_NO_PAD.decode(token) else {
            return Ok(ValidationOutcome::Invalid);
        };
        let Some(protected) = payload.strip_prefix(Self::MAGIC.as_slice()) else {
            return Ok(ValidationOutcome::Invalid);
        };

        match self
            .protector
            .unprotect(&purpose_labels(kind, TokenFormat::Reference), protected)
        {
            Ok(plaintext) => match serde_json::from_slice::<Map<String, Value>>(&plaintext) {
                Ok(claims) => Ok(ValidationOutcome::Valid(Principal { kind, claims })),
                Err(e) => {
                    tracing::debug!(error = %e, "reference token payload is not a claims set");
                    Ok(ValidationOutcome::Invalid)
                }
            },
            Err(e) if e.is_invalid_token() => {
                tracing::debug!(error = %e, "reference token failed unprotection");
                Ok(ValidationOutcome::Invalid)
            }
            Err(e) => Err(e),
        }
    }
}

/// Ordered chain of format validators; the first to resolve a principal
/// wins.
pub struct TokenValidator {
    validators: Vec<Arc<dyn TokenFormatValidator>>,
}

impl TokenValidator {
    /// Create a chain. Order encodes format precedence.
    #[must_use]
    pub fn new(validators: Vec<Arc<dyn TokenFormatValidator>>) -> Self {
        Self { validators }
    }

    /// Run the chain against a token.
    ///
    /// No-ops when a principal was already resolved by an earlier caller.
    /// `expected_format`, when pre-declared, restricts the chain to the
    /// matching validators. Returns `Ok(None)` when no validator resolves a
    /// principal; the caller decides how to reject.
    ///
    /// # Errors
    ///
    /// Propagates fatal conditions from the underlying crypto capability.
    pub async fn validate(
        &self,
        token: &str,
        hints: &[TokenKind],
        expected_format: Option<TokenFormat>,
        existing: Option<&Principal>,
    ) -> Result<Option<Principal>, ProtectionError> {
        if existing.is_some() {
            // First validator to succeed wins; nothing left to do.
            return Ok(None);
        }

        for validator in &self.validators {
            if let Some(expected) = expected_format {
                if validator.format() != expected {
                    continue;
                }
            }
            if !validator.quick_check(token) {
                tracing::trace!(format = ?validator.format(), "quick check declined token");
                continue;
            }

            match validator.validate(token, hints).await? {
                ValidationOutcome::Valid(principal) => {
                    tracing::debug!(
                        format = ?validator.format(),
                        kind = %principal.kind,
                        "token validated"
                    );
                    return Ok(Some(principal));
                }
                ValidationOutcome::Invalid | ValidationOutcome::NotApplicable => continue,
            }
        }
        Ok(None)
    }
}
