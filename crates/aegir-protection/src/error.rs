//! Protection error taxonomy.
//!
//! `InvalidToken` covers every expected per-token failure (bad signature,
//! wrong purpose, expired, malformed); validators convert it into a
//! "not valid for me" result and let the next format attempt the token.
//! `InvalidKey` and `Crypto` are configuration and infrastructure faults
//! and always propagate.

use thiserror::Error;

/// Failures of the token protection capabilities.
#[derive(Debug, Error)]
pub enum ProtectionError {
    /// The token is malformed, expired, carries the wrong purpose, or fails
    /// signature/authentication checks. Expected during validation; never
    /// fatal.
    #[error("invalid token: {0}")]
    InvalidToken(String),

    /// Key material is unusable. Configuration fault; fails fast.
    #[error("invalid key material: {0}")]
    InvalidKey(String),

    /// Unexpected cryptographic failure. Propagates unhandled.
    #[error("cryptographic failure: {0}")]
    Crypto(String),
}

impl ProtectionError {
    /// Whether this failure is an expected per-token miss rather than an
    /// infrastructure fault.
    #[must_use]
    pub fn is_invalid_token(&self) -> bool {
        matches!(self, Self::InvalidToken(_))
    }
}
