//! Server options: frozen configuration negotiated once at startup.
//!
//! The builder validates everything it can at build time so that missing
//! collaborators (no cache while caching is enabled, empty key material,
//! relative issuer) surface as configuration errors, never as request-time
//! failures.

use std::sync::Arc;

use aegir_core::DistributedCache;
use aegir_protection::{
    AesGcmProtector, ProtectionError, ReferenceTokenValidator, SelfContainedTokenValidator,
    TokenCodec, TokenValidator,
};
use chrono::Duration;
use thiserror::Error;
use url::Url;

/// Default lifetime of a cached request entry (15 minutes).
const REQUEST_CACHE_TTL_SECS: i64 = 900;

/// Configuration faults raised when building [`ServerOptions`].
#[derive(Debug, Error)]
pub enum OptionsError {
    /// A required collaborator or setting is missing.
    #[error("missing required option: {0}")]
    Missing(&'static str),

    /// The issuer is not an absolute URI.
    #[error("issuer must be an absolute URI: {0}")]
    InvalidIssuer(String),

    /// Key material was rejected by the protection layer.
    #[error(transparent)]
    Protection(#[from] ProtectionError),
}

/// Frozen server configuration shared by all handlers.
///
/// Built once, wrapped in an `Arc`, and read concurrently without locking.
pub struct ServerOptions {
    /// The service's own base URI; issuer and audience of internal tokens.
    pub issuer: Url,
    /// Whether logout requests are replaced by cached correlation entries.
    pub enable_logout_request_caching: bool,
    /// Whether cached request tokens are additionally encrypted with the
    /// data protector before being stored.
    pub encrypt_cached_requests: bool,
    /// Lifetime of a cached request entry.
    pub request_cache_ttl: Duration,
    /// Distributed cache backing request correlation. Required when
    /// caching is enabled.
    pub cache: Option<Arc<dyn DistributedCache>>,
    /// Signed token codec for self-contained tokens.
    pub codec: Arc<TokenCodec>,
    /// Purpose-scoped protector for reference tokens and cached-request
    /// envelopes.
    pub protector: Arc<AesGcmProtector>,
    /// Format-dispatching token validator chain.
    pub token_validator: Arc<TokenValidator>,
}

impl ServerOptions {
    /// Start building options for the given issuer.
    #[must_use]
    pub fn builder(issuer: impl Into<String>) -> ServerOptionsBuilder {
        ServerOptionsBuilder {
            issuer: issuer.into(),
            enable_logout_request_caching: false,
            encrypt_cached_requests: false,
            request_cache_ttl: Duration::seconds(REQUEST_CACHE_TTL_SECS),
            cache: None,
            signing_key: None,
            protection_root_key: None,
        }
    }

    /// Canonical issuer string: the base URI without a trailing slash.
    ///
    /// Used for both issuance and verification so the two always agree.
    #[must_use]
    pub fn issuer_str(&self) -> &str {
        self.issuer.as_str().trim_end_matches('/')
    }

    /// The distributed cache, or a configuration error when absent.
    ///
    /// Handlers gated on caching call this; the builder guarantees it
    /// succeeds whenever caching is enabled.
    pub fn require_cache(&self) -> Result<&Arc<dyn DistributedCache>, OptionsError> {
        self.cache
            .as_ref()
            .ok_or(OptionsError::Missing("distributed cache"))
    }
}

impl std::fmt::Debug for ServerOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerOptions")
            .field("issuer", &self.issuer.as_str())
            .field(
                "enable_logout_request_caching",
                &self.enable_logout_request_caching,
            )
            .field("encrypt_cached_requests", &self.encrypt_cached_requests)
            .field("request_cache_ttl", &self.request_cache_ttl)
            .finish_non_exhaustive()
    }
}

/// Fluent builder for [`ServerOptions`].
pub struct ServerOptionsBuilder {
    issuer: String,
    enable_logout_request_caching: bool,
    encrypt_cached_requests: bool,
    request_cache_ttl: Duration,
    cache: Option<Arc<dyn DistributedCache>>,
    signing_key: Option<Vec<u8>>,
    protection_root_key: Option<Vec<u8>>,
}

impl ServerOptionsBuilder {
    /// Enable logout request caching.
    #[must_use]
    pub fn enable_logout_request_caching(mut self) -> Self {
        self.enable_logout_request_caching = true;
        self
    }

    /// Additionally encrypt cached request tokens at rest.
    #[must_use]
    pub fn encrypt_cached_requests(mut self) -> Self {
        self.encrypt_cached_requests = true;
        self
    }

    /// Override the cached-request lifetime.
    #[must_use]
    pub fn request_cache_ttl(mut self, ttl: Duration) -> Self {
        self.request_cache_ttl = ttl;
        self
    }

    /// Plug in the distributed cache.
    #[must_use]
    pub fn cache(mut self, cache: Arc<dyn DistributedCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Set the shared signing secret for self-contained tokens.
    #[must_use]
    pub fn signing_key(mut self, key: impl Into<Vec<u8>>) -> Self {
        self.signing_key = Some(key.into());
        self
    }

    /// Set the root key for the purpose-scoped data protector.
    #[must_use]
    pub fn protection_root_key(mut self, key: impl Into<Vec<u8>>) -> Self {
        self.protection_root_key = Some(key.into());
        self
    }

    /// Validate and freeze the options.
    ///
    /// # Errors
    ///
    /// Fails fast on a relative issuer, missing or empty key material, or
    /// caching enabled without a cache.
    pub fn build(self) -> Result<Arc<ServerOptions>, OptionsError> {
        let issuer = Url::parse(&self.issuer)
            .map_err(|_| OptionsError::InvalidIssuer(self.issuer.clone()))?;
        if issuer.cannot_be_a_base() {
            return Err(OptionsError::InvalidIssuer(self.issuer));
        }

        let signing_key = self.signing_key.ok_or(OptionsError::Missing("signing key"))?;
        let protection_root_key = self
            .protection_root_key
            .ok_or(OptionsError::Missing("protection root key"))?;

        if self.enable_logout_request_caching && self.cache.is_none() {
            return Err(OptionsError::Missing(
                "distributed cache (required when logout request caching is enabled)",
            ));
        }

        let codec = Arc::new(TokenCodec::new(&signing_key)?);
        let protector = Arc::new(AesGcmProtector::new(protection_root_key)?);

        let token_validator = Arc::new(TokenValidator::new(vec![
            Arc::new(SelfContainedTokenValidator::new(
                Arc::clone(&codec),
                issuer.as_str().trim_end_matches('/'),
            )),
            Arc::new(ReferenceTokenValidator::new(
                Arc::clone(&protector) as Arc<dyn aegir_protection::DataProtector>
            )),
        ]));

        Ok(Arc::new(ServerOptions {
            issuer,
            enable_logout_request_caching: self.enable_logout_request_caching,
            encrypt_cached_requests: self.encrypt_cached_requests,
            request_cache_ttl: self.request_cache_ttl,
            cache: self.cache,
            codec,
            protector,
            token_validator,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aegir_core::InMemoryCache;

    fn builder() -> ServerOptionsBuilder {
        ServerOptions::builder("https://id.example.com")
            .signing_key(b"test-signing-secret-32-bytes-min".to_vec())
            .protection_root_key(b"root-key".to_vec())
    }

    #[test]
    fn test_minimal_build() {
        let options = builder().build().unwrap();
        assert!(!options.enable_logout_request_caching);
        assert_eq!(options.request_cache_ttl, Duration::seconds(900));
    }

    #[test]
    fn test_relative_issuer_fails_fast() {
        let result = ServerOptions::builder("not a url")
            .signing_key(b"k".to_vec())
            .protection_root_key(b"k".to_vec())
            .build();
        assert!(matches!(result, Err(OptionsError::InvalidIssuer(_))));
    }

    #[test]
    fn test_missing_signing_key_fails_fast() {
        let result = ServerOptions::builder("https://id.example.com")
            .protection_root_key(b"k".to_vec())
            .build();
        assert!(matches!(result, Err(OptionsError::Missing(_))));
    }

    #[test]
    fn test_caching_without_cache_fails_fast() {
        let result = builder().enable_logout_request_caching().build();
        assert!(matches!(result, Err(OptionsError::Missing(_))));
    }

    #[test]
    fn test_caching_with_cache_builds() {
        let options = builder()
            .enable_logout_request_caching()
            .cache(Arc::new(InMemoryCache::new()))
            .build()
            .unwrap();
        assert!(options.enable_logout_request_caching);
        assert!(options.require_cache().is_ok());
    }

    #[test]
    fn test_empty_signing_key_fails_fast() {
        let result = ServerOptions::builder("https://id.example.com")
            .signing_key(Vec::new())
            .protection_root_key(b"k".to_vec())
            .build();
        assert!(matches!(result, Err(OptionsError::Protection(_))));
    }
}
