//! Logout request caching: sign-then-cache-then-restore correlation.
//!
//! Browser redirects impose practical length limits, so a logout request
//! with parameters is replaced by a short opaque `request_id`; the original
//! parameters are signed into a token, persisted server-side under a
//! namespaced cache key, replayed on the follow-up request, and deleted
//! when the response is applied.

use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

use aegir_core::{param_names, ErrorCode, ParameterMap, ProtocolError};
use aegir_pipeline::{Handler, PipelineError, Transaction};
use aegir_protection::{DataProtector, TokenClaims};

use crate::options::ServerOptions;

/// Cache key namespace for cached logout requests.
pub const LOGOUT_REQUEST_CACHE_PREFIX: &str = "oidc:logout-request:";

/// Private purpose marker carried by cached-request tokens.
const LOGOUT_REQUEST_PURPOSE: &str = "logout_request";

/// Purpose chain for the optional encryption envelope around the token.
const ENVELOPE_PURPOSES: [&str; 3] = ["aegir", "logout-request", "envelope"];

/// Claim name under which the parameter triples are embedded.
const PARAMS_CLAIM: &str = "params";

/// Correlation identifier length in bytes (32 bytes = 256 bits).
const REQUEST_ID_LENGTH: usize = 32;

/// JSON value kind of a cached parameter, preserved so restoration is
/// lossless.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
enum ClaimKind {
    String,
    Integer,
    Boolean,
    Null,
    Array,
    Object,
}

/// One request parameter projected into a `(name, value, kind)` triple.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct CachedClaim {
    name: String,
    value: String,
    kind: ClaimKind,
}

impl CachedClaim {
    /// Project a parameter value, recording its JSON shape.
    fn project(name: &str, value: &Value) -> Self {
        let (value, kind) = match value {
            Value::String(s) => (s.clone(), ClaimKind::String),
            Value::Number(n) => (n.to_string(), ClaimKind::Integer),
            Value::Bool(b) => (b.to_string(), ClaimKind::Boolean),
            Value::Null => (String::new(), ClaimKind::Null),
            Value::Array(_) => (value.to_string(), ClaimKind::Array),
            Value::Object(_) => (value.to_string(), ClaimKind::Object),
        };
        Self {
            name: name.to_string(),
            value,
            kind,
        }
    }

    /// Reconstruct the original JSON value from the triple.
    fn restore(&self) -> Option<Value> {
        match self.kind {
            ClaimKind::String => Some(Value::String(self.value.clone())),
            ClaimKind::Integer => self
                .value
                .parse::<serde_json::Number>()
                .ok()
                .map(Value::Number),
            ClaimKind::Boolean => self.value.parse::<bool>().ok().map(Value::Bool),
            ClaimKind::Null => Some(Value::Null),
            ClaimKind::Array | ClaimKind::Object => serde_json::from_str(&self.value).ok(),
        }
    }
}

/// Namespaced cache key for a correlation identifier.
fn cache_key(request_id: &str) -> String {
    format!("{LOGOUT_REQUEST_CACHE_PREFIX}{request_id}")
}

/// Generate a fresh correlation identifier: 256 random bits, base64url.
fn generate_request_id() -> String {
    let mut bytes = [0u8; REQUEST_ID_LENGTH];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// The rejection used for any unusable correlation identifier.
///
/// "Not found" and "invalid" are deliberately indistinguishable to callers.
fn unusable_request_id() -> ProtocolError {
    ProtocolError::new(
        ErrorCode::InvalidRequest,
        format!(
            "the '{}' parameter is invalid or has expired",
            param_names::REQUEST_ID
        ),
    )
}

fn cache_fault(handler: &'static str, err: impl std::fmt::Display) -> PipelineError {
    PipelineError::Handler {
        handler,
        message: format!("distributed cache operation failed: {err}"),
    }
}

/// Replaces a parameter-carrying logout request with a cached correlation
/// entry and redirects back to the same endpoint with only `request_id`.
///
/// Extract phase, ordered after [`RestoreCachedLogoutRequest`].
pub struct CacheLogoutRequest {
    options: Arc<ServerOptions>,
}

impl CacheLogoutRequest {
    /// Registry identity of this handler.
    pub const NAME: &'static str = "cache_logout_request";

    /// Create the handler over frozen options.
    #[must_use]
    pub fn new(options: Arc<ServerOptions>) -> Self {
        Self { options }
    }
}

#[async_trait]
impl Handler for CacheLogoutRequest {
    async fn handle(&self, txn: &mut Transaction) -> Result<(), PipelineError> {
        // Idempotence: a restored request already carries its identifier,
        // and an empty request has nothing worth caching.
        if txn.request.contains(param_names::REQUEST_ID) || txn.request.is_empty() {
            return Ok(());
        }

        let request_id = generate_request_id();
        let issuer = self.options.issuer_str();

        let triples: Vec<Value> = txn
            .request
            .iter()
            .map(|(name, value)| {
                serde_json::to_value(CachedClaim::project(name, value))
                    .unwrap_or(Value::Null)
            })
            .collect();

        let claims = TokenClaims::new(
            issuer,
            issuer,
            LOGOUT_REQUEST_PURPOSE,
            self.options.request_cache_ttl,
        )
        .claim(PARAMS_CLAIM, Value::Array(triples));

        let token = self.options.codec.issue(&claims).map_err(|e| {
            PipelineError::Handler {
                handler: Self::NAME,
                message: format!("cached request token issuance failed: {e}"),
            }
        })?;

        let stored = if self.options.encrypt_cached_requests {
            let protected = self
                .options
                .protector
                .protect(&ENVELOPE_PURPOSES, token.as_bytes())
                .map_err(|e| PipelineError::Handler {
                    handler: Self::NAME,
                    message: format!("cached request encryption failed: {e}"),
                })?;
            URL_SAFE_NO_PAD.encode(protected)
        } else {
            token
        };

        let cache = self
            .options
            .require_cache()
            .map_err(|e| cache_fault(Self::NAME, e))?;
        cache
            .set_string(&cache_key(&request_id), &stored, self.options.request_cache_ttl)
            .await
            .map_err(|e| cache_fault(Self::NAME, e))?;

        tracing::debug!(
            trace_id = %txn.trace_id,
            parameters = txn.request.len(),
            "logout request cached"
        );

        // The redirect back to this endpoint, carrying only the
        // correlation identifier, is the response.
        txn.response.redirect_target = Some(txn.request_uri.clone());
        txn.response.params = ParameterMap::new();
        txn.response
            .params
            .insert(param_names::REQUEST_ID, Value::String(request_id));
        txn.handle_request();
        Ok(())
    }
}

/// Restores the original parameters of a previously cached logout request.
///
/// Extract phase, ordered before [`CacheLogoutRequest`] so a replayed
/// request is rehydrated before any other extraction logic runs.
pub struct RestoreCachedLogoutRequest {
    options: Arc<ServerOptions>,
}

impl RestoreCachedLogoutRequest {
    /// Registry identity of this handler.
    pub const NAME: &'static str = "restore_cached_logout_request";

    /// Create the handler over frozen options.
    #[must_use]
    pub fn new(options: Arc<ServerOptions>) -> Self {
        Self { options }
    }

    fn unwrap_stored(&self, stored: &str) -> Option<String> {
        if !self.options.encrypt_cached_requests {
            return Some(stored.to_string());
        }
        let payload = URL_SAFE_NO_PAD.decode(stored).ok()?;
        let plaintext = self
            .options
            .protector
            .unprotect(&ENVELOPE_PURPOSES, &payload)
            .ok()?;
        String::from_utf8(plaintext).ok()
    }
}

#[async_trait]
impl Handler for RestoreCachedLogoutRequest {
    async fn handle(&self, txn: &mut Transaction) -> Result<(), PipelineError> {
        let Some(request_id) = txn
            .request
            .get_str(param_names::REQUEST_ID)
            .map(str::to_owned)
        else {
            return Ok(());
        };

        let cache = self
            .options
            .require_cache()
            .map_err(|e| cache_fault(Self::NAME, e))?;
        let stored = cache
            .get_string(&cache_key(&request_id))
            .await
            .map_err(|e| cache_fault(Self::NAME, e))?;

        let Some(stored) = stored else {
            tracing::debug!(trace_id = %txn.trace_id, "no cache entry for request_id");
            txn.reject(unusable_request_id());
            return Ok(());
        };

        let Some(token) = self.unwrap_stored(&stored) else {
            tracing::debug!(trace_id = %txn.trace_id, "cached entry failed unwrapping");
            txn.reject(unusable_request_id());
            return Ok(());
        };

        let issuer = self.options.issuer_str();
        let claims = match self
            .options
            .codec
            .verify(&token, issuer, issuer, &[LOGOUT_REQUEST_PURPOSE])
        {
            Ok(claims) => claims,
            Err(e) => {
                tracing::debug!(trace_id = %txn.trace_id, error = %e, "cached token rejected");
                txn.reject(unusable_request_id());
                return Ok(());
            }
        };

        let Some(Value::Array(entries)) = claims.payload.get(PARAMS_CLAIM) else {
            txn.reject(unusable_request_id());
            return Ok(());
        };

        let mut restored = 0usize;
        for entry in entries {
            let Ok(claim) = serde_json::from_value::<CachedClaim>(entry.clone()) else {
                txn.reject(unusable_request_id());
                return Ok(());
            };
            let Some(value) = claim.restore() else {
                txn.reject(unusable_request_id());
                return Ok(());
            };
            // Parameters added after caching must not be overwritten.
            if txn.request.insert_missing(claim.name, value) {
                restored += 1;
            }
        }

        tracing::debug!(trace_id = %txn.trace_id, restored, "cached logout request restored");
        Ok(())
    }
}

/// Deletes the cache entry once the response for a correlated request has
/// been produced, success or failure alike.
///
/// Apply phase, ordered first so cleanup happens regardless of how the
/// response is shaped. Absence of the entry is not an error.
pub struct RemoveCachedRequest {
    options: Arc<ServerOptions>,
}

impl RemoveCachedRequest {
    /// Registry identity of this handler.
    pub const NAME: &'static str = "remove_cached_request";

    /// Create the handler over frozen options.
    #[must_use]
    pub fn new(options: Arc<ServerOptions>) -> Self {
        Self { options }
    }
}

#[async_trait]
impl Handler for RemoveCachedRequest {
    async fn handle(&self, txn: &mut Transaction) -> Result<(), PipelineError> {
        let Some(request_id) = txn.request.get_str(param_names::REQUEST_ID) else {
            return Ok(());
        };

        let cache = self
            .options
            .require_cache()
            .map_err(|e| cache_fault(Self::NAME, e))?;
        cache
            .remove(&cache_key(request_id))
            .await
            .map_err(|e| cache_fault(Self::NAME, e))?;

        tracing::debug!(trace_id = %txn.trace_id, "cached logout request removed");
        Ok(())
    }
}
