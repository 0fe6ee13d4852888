//! aegir Core Library
//!
//! Shared types for the aegir protocol engine.
//!
//! # Modules
//!
//! - [`error`] - Protocol error codes and rejection payloads (`ProtocolError`)
//! - [`params`] - Insertion-ordered, JSON-shaped parameter map (`ParameterMap`)
//! - [`cache`] - Distributed cache capability (`DistributedCache`) and an
//!   in-memory TTL implementation for tests and single-node deployments
//!
//! # Example
//!
//! ```
//! use aegir_core::{ErrorCode, ParameterMap, ProtocolError};
//!
//! let mut params = ParameterMap::new();
//! params.insert("client_id", "my-client".into());
//!
//! let rejection = ProtocolError::new(ErrorCode::InvalidRequest, "missing redirect URI");
//! assert_eq!(rejection.error.to_string(), "invalid_request");
//! ```

pub mod cache;
pub mod error;
pub mod params;

pub use cache::{CacheError, DistributedCache, InMemoryCache};
pub use error::{ErrorCode, ProtocolError};
pub use params::ParameterMap;

/// Well-known protocol parameter names.
pub mod param_names {
    /// Correlation identifier standing in for a cached request.
    pub const REQUEST_ID: &str = "request_id";
    /// Previously issued ID token passed as a logout hint.
    pub const ID_TOKEN_HINT: &str = "id_token_hint";
    /// URI the user agent is sent to after logout completes.
    pub const POST_LOGOUT_REDIRECT_URI: &str = "post_logout_redirect_uri";
    /// Opaque RP state echoed back on the post-logout callback.
    pub const STATE: &str = "state";
    /// OAuth2 client identifier.
    pub const CLIENT_ID: &str = "client_id";
    /// Token under introspection.
    pub const TOKEN: &str = "token";
    /// Caller hint about the introspected token's kind.
    pub const TOKEN_TYPE_HINT: &str = "token_type_hint";
}
