//! Introspection endpoint handlers: token validation hosted as ordinary
//! pipeline steps.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use aegir_core::{param_names, ErrorCode, ProtocolError};
use aegir_pipeline::{Handler, PipelineError, Transaction};
use aegir_protection::{Principal, TokenKind};

use crate::options::ServerOptions;

/// Transaction property under which the resolved principal is stored.
pub const PRINCIPAL_PROPERTY: &str = "principal";

/// Requires the `token` parameter on an introspection request.
///
/// Extract phase.
pub struct ExtractIntrospectionRequest;

impl ExtractIntrospectionRequest {
    /// Registry identity of this handler.
    pub const NAME: &'static str = "extract_introspection_request";
}

#[async_trait]
impl Handler for ExtractIntrospectionRequest {
    async fn handle(&self, txn: &mut Transaction) -> Result<(), PipelineError> {
        if txn.request.get_str(param_names::TOKEN).is_none() {
            txn.reject(ProtocolError::new(
                ErrorCode::InvalidRequest,
                format!("the '{}' parameter is required", param_names::TOKEN),
            ));
        }
        Ok(())
    }
}

/// Runs the format-dispatching validator chain against the presented token.
///
/// Handle phase. The `token_type_hint` parameter narrows the acceptable
/// kinds; unknown hints are ignored per RFC 7662. When no registered
/// format resolves a principal the request is rejected with
/// `invalid_token`.
pub struct ValidateToken {
    options: Arc<ServerOptions>,
}

impl ValidateToken {
    /// Registry identity of this handler.
    pub const NAME: &'static str = "validate_token";

    /// Create the handler over frozen options.
    #[must_use]
    pub fn new(options: Arc<ServerOptions>) -> Self {
        Self { options }
    }
}

#[async_trait]
impl Handler for ValidateToken {
    async fn handle(&self, txn: &mut Transaction) -> Result<(), PipelineError> {
        let Some(token) = txn.request.get_str(param_names::TOKEN).map(str::to_owned) else {
            return Ok(());
        };

        let hints: Vec<TokenKind> = txn
            .request
            .get_str(param_names::TOKEN_TYPE_HINT)
            .and_then(TokenKind::from_hint)
            .into_iter()
            .collect();

        let existing = txn
            .properties
            .get(PRINCIPAL_PROPERTY)
            .and_then(|v| serde_json::from_value::<Principal>(v.clone()).ok());

        let resolved = self
            .options
            .token_validator
            .validate(&token, &hints, None, existing.as_ref())
            .await
            .map_err(|e| PipelineError::Handler {
                handler: Self::NAME,
                message: format!("token validation failed unexpectedly: {e}"),
            })?;

        match resolved {
            Some(principal) => {
                let value =
                    serde_json::to_value(&principal).map_err(|e| PipelineError::Handler {
                        handler: Self::NAME,
                        message: format!("principal serialization failed: {e}"),
                    })?;
                txn.properties.insert(PRINCIPAL_PROPERTY.to_string(), value);
            }
            None if existing.is_none() => {
                txn.reject(ProtocolError::new(
                    ErrorCode::InvalidToken,
                    "the token is invalid, expired, or of an unknown format",
                ));
            }
            None => {}
        }
        Ok(())
    }
}

/// Shapes the RFC 7662 introspection response from the resolved principal.
///
/// Apply phase.
pub struct RenderIntrospectionResponse;

impl RenderIntrospectionResponse {
    /// Registry identity of this handler.
    pub const NAME: &'static str = "render_introspection_response";
}

#[async_trait]
impl Handler for RenderIntrospectionResponse {
    async fn handle(&self, txn: &mut Transaction) -> Result<(), PipelineError> {
        let Some(principal) = txn
            .properties
            .get(PRINCIPAL_PROPERTY)
            .and_then(|v| serde_json::from_value::<Principal>(v.clone()).ok())
        else {
            return Ok(());
        };

        txn.response.params.insert("active", Value::Bool(true));
        txn.response.params.insert(
            "token_type",
            Value::String(principal.kind.as_str().to_string()),
        );
        for (name, value) in &principal.claims {
            txn.response.params.insert_missing(name.clone(), value.clone());
        }

        txn.handle_request();
        Ok(())
    }
}
