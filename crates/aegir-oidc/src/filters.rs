//! Filters gating the default handler set.
//!
//! Filters only read frozen options and transaction state; they never
//! mutate anything.

use std::sync::Arc;

use aegir_pipeline::{Filter, Outcome, Transaction};

use crate::options::ServerOptions;

/// Applies only when logout request caching is enabled.
pub struct RequireLogoutCachingEnabled {
    options: Arc<ServerOptions>,
}

impl RequireLogoutCachingEnabled {
    /// Create the filter over frozen options.
    #[must_use]
    pub fn new(options: Arc<ServerOptions>) -> Self {
        Self { options }
    }
}

impl Filter for RequireLogoutCachingEnabled {
    fn applies(&self, _txn: &Transaction) -> bool {
        self.options.enable_logout_request_caching
    }
}

/// Applies only when the transaction was rejected; gates error rendering.
pub struct RequireRejectedOutcome;

impl Filter for RequireRejectedOutcome {
    fn applies(&self, txn: &Transaction) -> bool {
        matches!(txn.outcome(), Outcome::Rejected(_))
    }
}

/// Applies only when a redirect target has been set on the response.
pub struct RequireRedirectTarget;

impl Filter for RequireRedirectTarget {
    fn applies(&self, txn: &Transaction) -> bool {
        txn.response.redirect_target.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aegir_core::{ErrorCode, InMemoryCache, ProtocolError};

    fn options(caching: bool) -> Arc<ServerOptions> {
        let builder = ServerOptions::builder("https://id.example.com")
            .signing_key(b"test-signing-secret-32-bytes-min".to_vec())
            .protection_root_key(b"root-key".to_vec());
        let builder = if caching {
            builder
                .enable_logout_request_caching()
                .cache(Arc::new(InMemoryCache::new()))
        } else {
            builder
        };
        builder.build().unwrap()
    }

    fn txn() -> Transaction {
        Transaction::new("https://id.example.com", "https://id.example.com/logout")
    }

    #[test]
    fn test_caching_filter_follows_options() {
        let txn = txn();
        assert!(RequireLogoutCachingEnabled::new(options(true)).applies(&txn));
        assert!(!RequireLogoutCachingEnabled::new(options(false)).applies(&txn));
    }

    #[test]
    fn test_rejected_outcome_filter() {
        let mut txn = txn();
        assert!(!RequireRejectedOutcome.applies(&txn));

        txn.reject(ProtocolError::new(ErrorCode::InvalidRequest, "bad"));
        assert!(RequireRejectedOutcome.applies(&txn));
    }

    #[test]
    fn test_redirect_target_filter() {
        let mut txn = txn();
        assert!(!RequireRedirectTarget.applies(&txn));

        txn.response.redirect_target = Some("https://app.example.com/cb".into());
        assert!(RequireRedirectTarget.applies(&txn));
    }
}
