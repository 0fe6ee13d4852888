//! Logout endpoint handlers: parameter validation and redirect selection.

use async_trait::async_trait;
use serde_json::Value;

use aegir_core::{param_names, ErrorCode, ProtocolError};
use aegir_pipeline::{Handler, PipelineError, Transaction};

/// Maximum accepted `id_token_hint` length.
const MAX_ID_TOKEN_HINT_LEN: usize = 8192;

/// Maximum accepted `state` length.
const MAX_STATE_LEN: usize = 512;

/// Maximum accepted `post_logout_redirect_uri` length.
const MAX_REDIRECT_URI_LEN: usize = 2048;

/// Rejects logout requests with oversized parameters.
///
/// Extract phase. Input length validation prevents abuse of the cache and
/// of downstream token validation.
pub struct ValidateLogoutParameters;

impl ValidateLogoutParameters {
    /// Registry identity of this handler.
    pub const NAME: &'static str = "validate_logout_parameters";
}

#[async_trait]
impl Handler for ValidateLogoutParameters {
    async fn handle(&self, txn: &mut Transaction) -> Result<(), PipelineError> {
        let limits = [
            (param_names::ID_TOKEN_HINT, MAX_ID_TOKEN_HINT_LEN),
            (param_names::STATE, MAX_STATE_LEN),
            (param_names::POST_LOGOUT_REDIRECT_URI, MAX_REDIRECT_URI_LEN),
        ];
        for (name, limit) in limits {
            if let Some(value) = txn.request.get_str(name) {
                if value.len() > limit {
                    txn.reject(ProtocolError::new(
                        ErrorCode::InvalidRequest,
                        format!("{name} too large"),
                    ));
                    return Ok(());
                }
            }
        }
        Ok(())
    }
}

/// Selects the post-logout redirect destination.
///
/// Handle phase. When a `post_logout_redirect_uri` is present it becomes
/// the redirect target and the RP's `state` is echoed as a response
/// parameter; the request is then handled. Without one, processing
/// continues to [`CompleteLogout`].
pub struct AttachPostLogoutRedirect;

impl AttachPostLogoutRedirect {
    /// Registry identity of this handler.
    pub const NAME: &'static str = "attach_post_logout_redirect";
}

#[async_trait]
impl Handler for AttachPostLogoutRedirect {
    async fn handle(&self, txn: &mut Transaction) -> Result<(), PipelineError> {
        let Some(redirect_uri) = txn
            .request
            .get_str(param_names::POST_LOGOUT_REDIRECT_URI)
            .map(str::to_owned)
        else {
            return Ok(());
        };

        txn.response.redirect_target = Some(redirect_uri);
        if let Some(state) = txn.request.get_str(param_names::STATE).map(str::to_owned) {
            txn.response
                .params
                .insert(param_names::STATE, Value::String(state));
        }

        tracing::debug!(trace_id = %txn.trace_id, "post-logout redirect attached");
        txn.handle_request();
        Ok(())
    }
}

/// Terminal logout handler when no redirect destination applies.
///
/// Handle phase, ordered last: shapes a plain confirmation body.
pub struct CompleteLogout;

impl CompleteLogout {
    /// Registry identity of this handler.
    pub const NAME: &'static str = "complete_logout";
}

#[async_trait]
impl Handler for CompleteLogout {
    async fn handle(&self, txn: &mut Transaction) -> Result<(), PipelineError> {
        txn.response.params.insert(
            "message",
            Value::String("Logged out successfully".to_string()),
        );
        txn.handle_request();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aegir_core::ParameterMap;
    use aegir_pipeline::Outcome;
    use serde_json::json;

    fn txn_with(params: ParameterMap) -> Transaction {
        Transaction::new("https://id.example.com", "https://id.example.com/logout")
            .with_request(params)
    }

    #[tokio::test]
    async fn test_oversized_state_is_rejected() {
        let params: ParameterMap = [(param_names::STATE, json!("s".repeat(513)))]
            .into_iter()
            .collect();
        let mut txn = txn_with(params);
        ValidateLogoutParameters.handle(&mut txn).await.unwrap();

        match txn.outcome() {
            Outcome::Rejected(err) => assert_eq!(err.error, ErrorCode::InvalidRequest),
            other => panic!("expected rejection, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_within_limits_continues() {
        let params: ParameterMap = [
            (param_names::STATE, json!("abc123")),
            (param_names::POST_LOGOUT_REDIRECT_URI, json!("https://app/cb")),
        ]
        .into_iter()
        .collect();
        let mut txn = txn_with(params);
        ValidateLogoutParameters.handle(&mut txn).await.unwrap();

        assert_eq!(*txn.outcome(), Outcome::Continue);
    }

    #[tokio::test]
    async fn test_redirect_attached_with_state_echo() {
        let params: ParameterMap = [
            (param_names::POST_LOGOUT_REDIRECT_URI, json!("https://app/cb")),
            (param_names::STATE, json!("xyz")),
        ]
        .into_iter()
        .collect();
        let mut txn = txn_with(params);
        AttachPostLogoutRedirect.handle(&mut txn).await.unwrap();

        assert_eq!(txn.response.redirect_target.as_deref(), Some("https://app/cb"));
        assert_eq!(txn.response.params.get_str(param_names::STATE), Some("xyz"));
        assert_eq!(*txn.outcome(), Outcome::HandleRequest);
    }

    #[tokio::test]
    async fn test_no_redirect_uri_continues() {
        let mut txn = txn_with(ParameterMap::new());
        AttachPostLogoutRedirect.handle(&mut txn).await.unwrap();

        assert!(txn.response.redirect_target.is_none());
        assert_eq!(*txn.outcome(), Outcome::Continue);
    }

    #[tokio::test]
    async fn test_complete_logout_shapes_confirmation() {
        let mut txn = txn_with(ParameterMap::new());
        CompleteLogout.handle(&mut txn).await.unwrap();

        assert_eq!(
            txn.response.params.get_str("message"),
            Some("Logged out successfully")
        );
        assert_eq!(*txn.outcome(), Outcome::HandleRequest);
    }
}
