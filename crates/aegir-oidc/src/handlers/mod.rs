//! Default handler sets for each endpoint.
//!
//! Orders are spaced so host applications can slot custom handlers between
//! the built-in ones without renumbering.

pub mod introspection;
pub mod logout;
pub mod logout_cache;
pub mod respond;

use std::sync::Arc;

use aegir_pipeline::{
    Endpoint, HandlerDescriptor, Phase, PipelineError, RegistryBuilder, Stage,
};

use crate::filters::{RequireLogoutCachingEnabled, RequireRedirectTarget, RequireRejectedOutcome};
use crate::options::ServerOptions;

pub use introspection::{
    ExtractIntrospectionRequest, RenderIntrospectionResponse, ValidateToken, PRINCIPAL_PROPERTY,
};
pub use logout::{AttachPostLogoutRedirect, CompleteLogout, ValidateLogoutParameters};
pub use logout_cache::{
    CacheLogoutRequest, RemoveCachedRequest, RestoreCachedLogoutRequest,
    LOGOUT_REQUEST_CACHE_PREFIX,
};
pub use respond::{ApplyRedirectResponse, RenderErrorResponse};

/// Execution orders of the built-in handlers.
pub mod order {
    /// Restore a cached request before anything else sees it.
    pub const RESTORE_CACHED_REQUEST: i32 = 100;
    /// Validate inbound parameters (original or restored).
    pub const VALIDATE_PARAMETERS: i32 = 200;
    /// Replace a parameter-carrying request with a correlation entry.
    pub const CACHE_REQUEST: i32 = 300;
    /// First handle-phase slot.
    pub const HANDLE: i32 = 100;
    /// Terminal handle-phase fallback.
    pub const HANDLE_FALLBACK: i32 = 900;
    /// Cleanup runs before any response shaping.
    pub const REMOVE_CACHED_REQUEST: i32 = 100;
    /// Error rendering precedes success shaping.
    pub const RENDER_ERROR: i32 = 200;
    /// Final response assembly.
    pub const APPLY_RESPONSE: i32 = 300;
}

/// Build the default registry for all endpoints.
///
/// The returned builder can be extended with host registrations
/// (additions, overrides by identity, removals) before freezing.
///
/// # Errors
///
/// Propagates descriptor configuration errors; these indicate a bug in the
/// default set and surface at startup.
pub fn default_registry(options: &Arc<ServerOptions>) -> Result<RegistryBuilder, PipelineError> {
    let caching = || Arc::new(RequireLogoutCachingEnabled::new(Arc::clone(options)));

    let logout_extract = Stage::new(Endpoint::Logout, Phase::Extract);
    let logout_handle = Stage::new(Endpoint::Logout, Phase::Handle);
    let logout_apply = Stage::new(Endpoint::Logout, Phase::Apply);
    let intro_extract = Stage::new(Endpoint::Introspection, Phase::Extract);
    let intro_handle = Stage::new(Endpoint::Introspection, Phase::Handle);
    let intro_apply = Stage::new(Endpoint::Introspection, Phase::Apply);

    let mut descriptors = vec![
        HandlerDescriptor::builder(logout_extract, RestoreCachedLogoutRequest::NAME)
            .order(order::RESTORE_CACHED_REQUEST)
            .built_in()
            .filter(caching())
            .use_singleton(Arc::new(RestoreCachedLogoutRequest::new(Arc::clone(
                options,
            ))))
            .build()?,
        HandlerDescriptor::builder(logout_extract, ValidateLogoutParameters::NAME)
            .order(order::VALIDATE_PARAMETERS)
            .built_in()
            .use_singleton(Arc::new(ValidateLogoutParameters))
            .build()?,
        HandlerDescriptor::builder(logout_extract, CacheLogoutRequest::NAME)
            .order(order::CACHE_REQUEST)
            .built_in()
            .filter(caching())
            .use_singleton(Arc::new(CacheLogoutRequest::new(Arc::clone(options))))
            .build()?,
        HandlerDescriptor::builder(logout_handle, AttachPostLogoutRedirect::NAME)
            .order(order::HANDLE)
            .built_in()
            .use_singleton(Arc::new(AttachPostLogoutRedirect))
            .build()?,
        HandlerDescriptor::builder(logout_handle, CompleteLogout::NAME)
            .order(order::HANDLE_FALLBACK)
            .built_in()
            .use_singleton(Arc::new(CompleteLogout))
            .build()?,
        HandlerDescriptor::builder(logout_apply, RemoveCachedRequest::NAME)
            .order(order::REMOVE_CACHED_REQUEST)
            .built_in()
            .filter(caching())
            .use_singleton(Arc::new(RemoveCachedRequest::new(Arc::clone(options))))
            .build()?,
        HandlerDescriptor::builder(intro_extract, ExtractIntrospectionRequest::NAME)
            .order(order::VALIDATE_PARAMETERS)
            .built_in()
            .use_singleton(Arc::new(ExtractIntrospectionRequest))
            .build()?,
        HandlerDescriptor::builder(intro_handle, ValidateToken::NAME)
            .order(order::HANDLE)
            .built_in()
            .use_singleton(Arc::new(ValidateToken::new(Arc::clone(options))))
            .build()?,
        HandlerDescriptor::builder(intro_apply, RenderIntrospectionResponse::NAME)
            .order(order::APPLY_RESPONSE)
            .built_in()
            .use_singleton(Arc::new(RenderIntrospectionResponse))
            .build()?,
    ];

    // Error rendering and response assembly are uniform across endpoints.
    for endpoint in [
        Endpoint::Authorization,
        Endpoint::Token,
        Endpoint::Logout,
        Endpoint::Introspection,
    ] {
        let apply = Stage::new(endpoint, Phase::Apply);
        descriptors.push(
            HandlerDescriptor::builder(apply, RenderErrorResponse::NAME)
                .order(order::RENDER_ERROR)
                .built_in()
                .filter(Arc::new(RequireRejectedOutcome))
                .use_singleton(Arc::new(RenderErrorResponse))
                .build()?,
        );
    }
    for endpoint in [Endpoint::Authorization, Endpoint::Logout] {
        let apply = Stage::new(endpoint, Phase::Apply);
        descriptors.push(
            HandlerDescriptor::builder(apply, ApplyRedirectResponse::NAME)
                .order(order::APPLY_RESPONSE)
                .built_in()
                .filter(Arc::new(RequireRedirectTarget))
                .use_singleton(Arc::new(ApplyRedirectResponse))
                .build()?,
        );
    }

    Ok(RegistryBuilder::with_defaults(descriptors))
}
