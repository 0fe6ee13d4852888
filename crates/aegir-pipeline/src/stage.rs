//! Stage tags identifying which handler chain processes a transaction.
//!
//! Handlers are registered against an explicit `(endpoint, phase)` tag
//! rather than a context type resolved by reflection; unknown tags are a
//! registration-time error, not a request-time surprise.

use serde::{Deserialize, Serialize};

/// Protocol endpoint being processed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Endpoint {
    /// OAuth2 authorization endpoint.
    Authorization,
    /// OAuth2 token endpoint.
    Token,
    /// OIDC RP-Initiated Logout (end-session) endpoint.
    Logout,
    /// RFC 7662 token introspection endpoint.
    Introspection,
}

/// Phase of processing within one endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Read and normalize the inbound request.
    Extract,
    /// Apply protocol logic to the validated request.
    Handle,
    /// Shape and emit the outbound response.
    Apply,
}

/// A stage tag: one endpoint's phase, keying one ordered handler chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Stage {
    /// The endpoint this stage belongs to.
    pub endpoint: Endpoint,
    /// The processing phase.
    pub phase: Phase,
}

impl Stage {
    /// Create a stage tag.
    #[must_use]
    pub fn new(endpoint: Endpoint, phase: Phase) -> Self {
        Self { endpoint, phase }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}/{:?}", self.endpoint, self.phase)
    }
}
