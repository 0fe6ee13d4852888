//! OAuth 2.0 / OpenID Connect protocol engine.
//!
//! Assembles the pipeline, protection, and core crates into a runnable
//! server: frozen [`ServerOptions`], the built-in handler sets for the
//! authorization, token, logout, and introspection endpoints, and the
//! [`ProtocolServer`] facade that drives one exchange through its phases.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use aegir_core::{InMemoryCache, ParameterMap};
//! use aegir_oidc::{Endpoint, ProtocolServer, ServerOptions};
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let options = ServerOptions::builder("https://id.example.com")
//!     .signing_key(b"a-secret-of-sufficient-length!!!".to_vec())
//!     .protection_root_key(b"another-secret".to_vec())
//!     .enable_logout_request_caching()
//!     .cache(Arc::new(InMemoryCache::new()))
//!     .build()?;
//!
//! let server = ProtocolServer::new(options)?;
//! let result = server
//!     .run(
//!         Endpoint::Logout,
//!         "https://id.example.com/logout",
//!         ParameterMap::new(),
//!     )
//!     .await?;
//! # let _ = result;
//! # Ok(())
//! # }
//! ```

pub mod filters;
pub mod handlers;
pub mod options;
pub mod server;

pub use aegir_pipeline::{Endpoint, Outcome, Phase, PipelineError, Stage};

pub use filters::{RequireLogoutCachingEnabled, RequireRedirectTarget, RequireRejectedOutcome};
pub use handlers::default_registry;
pub use options::{OptionsError, ServerOptions, ServerOptionsBuilder};
pub use server::{ExchangeResult, ProtocolResponse, ProtocolServer};
