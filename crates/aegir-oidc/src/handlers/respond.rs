//! Response-apply handlers shared by all endpoints: error rendering and
//! redirect assembly.

use async_trait::async_trait;
use serde_json::Value;
use url::Url;

use aegir_core::ProtocolError;
use aegir_pipeline::{Handler, Outcome, PipelineError, Transaction};

/// Renders a protocol rejection into the response parameters.
///
/// Apply phase, gated by the rejected-outcome filter, so a failed
/// transaction is rendered exactly once. Any redirect target set before
/// the rejection is discarded: errors are never delivered to an RP
/// destination that was not validated.
pub struct RenderErrorResponse;

impl RenderErrorResponse {
    /// Registry identity of this handler.
    pub const NAME: &'static str = "render_error_response";
}

#[async_trait]
impl Handler for RenderErrorResponse {
    async fn handle(&self, txn: &mut Transaction) -> Result<(), PipelineError> {
        let Outcome::Rejected(error) = txn.outcome() else {
            return Ok(());
        };
        let ProtocolError {
            error,
            error_description,
            error_uri,
        } = error.clone();

        txn.response.redirect_target = None;
        txn.response
            .params
            .insert("error", Value::String(error.to_string()));
        if let Some(description) = error_description {
            txn.response
                .params
                .insert("error_description", Value::String(description));
        }
        if let Some(uri) = error_uri {
            txn.response.params.insert("error_uri", Value::String(uri));
        }

        tracing::debug!(trace_id = %txn.trace_id, error = %error, "error response rendered");
        Ok(())
    }
}

/// Assembles the final redirect location from the target and the response
/// parameters.
///
/// Apply phase, gated by the redirect-target filter. Only non-empty
/// parameters are appended as query pairs; the rewritten target replaces
/// the raw one on the response.
pub struct ApplyRedirectResponse;

impl ApplyRedirectResponse {
    /// Registry identity of this handler.
    pub const NAME: &'static str = "apply_redirect_response";
}

#[async_trait]
impl Handler for ApplyRedirectResponse {
    async fn handle(&self, txn: &mut Transaction) -> Result<(), PipelineError> {
        let Some(target) = txn.response.redirect_target.clone() else {
            return Ok(());
        };

        let mut location = Url::parse(&target).map_err(|e| PipelineError::Handler {
            handler: Self::NAME,
            message: format!("redirect target is not a valid URL: {e}"),
        })?;

        {
            let mut pairs = location.query_pairs_mut();
            for (name, value) in txn.response.params.iter() {
                let rendered = match value {
                    Value::String(s) => s.clone(),
                    Value::Null => String::new(),
                    other => other.to_string(),
                };
                if rendered.is_empty() {
                    continue;
                }
                pairs.append_pair(name, &rendered);
            }
        }

        tracing::debug!(trace_id = %txn.trace_id, location = %location, "redirect assembled");
        txn.response.redirect_target = Some(location.to_string());
        txn.handle_request();
        Ok(())
    }
}
