//! Endpoint-facing facade: drives a transaction through the extract,
//! handle, and apply phases and shapes the terminal response.

use std::sync::Arc;

use aegir_core::ParameterMap;
use aegir_pipeline::{Endpoint, HandlerRegistry, Outcome, Phase, Pipeline, PipelineError, Stage, Transaction};
use serde_json::{Map, Value};

use crate::handlers::default_registry;
use crate::options::ServerOptions;

/// Terminal response of one exchange, ready for the transport layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProtocolResponse {
    /// Redirect to the given absolute URL (parameters already appended).
    Redirect(String),
    /// Render the parameters as a body (JSON or form, host's choice).
    Body(Map<String, Value>),
    /// Emit nothing; the host decides what a skipped exchange looks like.
    Empty,
}

/// Outcome and shaped response of one exchange.
#[derive(Debug)]
pub struct ExchangeResult {
    /// The transaction's terminal outcome flag.
    pub outcome: Outcome,
    /// The response to deliver.
    pub response: ProtocolResponse,
}

/// Protocol engine bound to frozen options and a frozen handler registry.
///
/// Cheap to clone and safe to share across tasks.
#[derive(Clone)]
pub struct ProtocolServer {
    pipeline: Pipeline,
    options: Arc<ServerOptions>,
}

impl ProtocolServer {
    /// Create a server with the built-in handler set.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when the built-in descriptor set
    /// fails to assemble.
    pub fn new(options: Arc<ServerOptions>) -> Result<Self, PipelineError> {
        let registry = default_registry(&options)?.build();
        Ok(Self::with_registry(options, registry))
    }

    /// Create a server over a custom (typically extended) registry.
    #[must_use]
    pub fn with_registry(options: Arc<ServerOptions>, registry: HandlerRegistry) -> Self {
        Self {
            pipeline: Pipeline::new(Arc::new(registry)),
            options,
        }
    }

    /// The frozen options this server runs with.
    #[must_use]
    pub fn options(&self) -> &Arc<ServerOptions> {
        &self.options
    }

    /// Process one inbound exchange.
    ///
    /// Runs the extract phase, then the handle phase unless the request
    /// already resolved, then the apply phase so cleanup and error
    /// rendering always execute. A skipped request bypasses the apply
    /// phase and response shaping entirely.
    ///
    /// # Errors
    ///
    /// Propagates unexpected handler faults. Protocol-level failures are
    /// not errors; they surface as `Outcome::Rejected` with a rendered
    /// error response.
    pub async fn run(
        &self,
        endpoint: Endpoint,
        request_uri: &str,
        request: ParameterMap,
    ) -> Result<ExchangeResult, PipelineError> {
        let mut txn =
            Transaction::new(self.options.issuer_str(), request_uri).with_request(request);
        tracing::debug!(trace_id = %txn.trace_id, ?endpoint, "exchange started");

        self.pipeline
            .execute(Stage::new(endpoint, Phase::Extract), &mut txn)
            .await?;

        if !txn.outcome().is_terminal() {
            self.pipeline
                .execute(Stage::new(endpoint, Phase::Handle), &mut txn)
                .await?;
        }

        if *txn.outcome() == Outcome::SkipRequest {
            tracing::debug!(trace_id = %txn.trace_id, ?endpoint, "exchange skipped");
            return Ok(ExchangeResult {
                outcome: Outcome::SkipRequest,
                response: ProtocolResponse::Empty,
            });
        }

        self.pipeline
            .execute(Stage::new(endpoint, Phase::Apply), &mut txn)
            .await?;

        let response = match txn.response.redirect_target.take() {
            Some(location) => ProtocolResponse::Redirect(location),
            None if txn.response.params.is_empty() => ProtocolResponse::Empty,
            None => {
                let mut body = Map::new();
                for (name, value) in txn.response.params.iter() {
                    body.insert(name.to_string(), value.clone());
                }
                ProtocolResponse::Body(body)
            }
        };

        tracing::debug!(
            trace_id = %txn.trace_id,
            ?endpoint,
            outcome = ?txn.outcome(),
            "exchange finished"
        );
        Ok(ExchangeResult {
            outcome: txn.outcome().clone(),
            response,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aegir_core::{ErrorCode, InMemoryCache, ProtocolError};
    use aegir_pipeline::{Handler, HandlerDescriptor, RegistryBuilder};
    use async_trait::async_trait;
    use serde_json::json;

    fn options() -> Arc<ServerOptions> {
        ServerOptions::builder("https://id.example.com")
            .signing_key(b"test-signing-secret-32-bytes-min".to_vec())
            .protection_root_key(b"root-key".to_vec())
            .cache(Arc::new(InMemoryCache::new()))
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn test_rejected_exchange_renders_error_body() {
        struct AlwaysReject;

        #[async_trait]
        impl Handler for AlwaysReject {
            async fn handle(&self, txn: &mut Transaction) -> Result<(), PipelineError> {
                txn.reject(ProtocolError::new(ErrorCode::InvalidClient, "unknown client"));
                Ok(())
            }
        }

        let options = options();
        let registry = default_registry(&options)
            .unwrap()
            .register(
                HandlerDescriptor::builder(
                    Stage::new(Endpoint::Token, Phase::Extract),
                    "always_reject",
                )
                .order(100)
                .use_singleton(Arc::new(AlwaysReject))
                .build()
                .unwrap(),
            )
            .build();
        let server = ProtocolServer::with_registry(options, registry);

        let result = server
            .run(
                Endpoint::Token,
                "https://id.example.com/token",
                ParameterMap::new(),
            )
            .await
            .unwrap();

        assert!(matches!(result.outcome, Outcome::Rejected(_)));
        match result.response {
            ProtocolResponse::Body(body) => {
                assert_eq!(body["error"], json!("invalid_client"));
                assert_eq!(body["error_description"], json!("unknown client"));
            }
            other => panic!("expected body, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_skipped_exchange_yields_empty_response() {
        struct Skip;

        #[async_trait]
        impl Handler for Skip {
            async fn handle(&self, txn: &mut Transaction) -> Result<(), PipelineError> {
                txn.skip_request();
                Ok(())
            }
        }

        let registry = RegistryBuilder::new()
            .register(
                HandlerDescriptor::builder(
                    Stage::new(Endpoint::Authorization, Phase::Extract),
                    "skip",
                )
                .order(100)
                .use_singleton(Arc::new(Skip))
                .build()
                .unwrap(),
            )
            .build();
        let server = ProtocolServer::with_registry(options(), registry);

        let result = server
            .run(
                Endpoint::Authorization,
                "https://id.example.com/authorize",
                ParameterMap::new(),
            )
            .await
            .unwrap();

        assert_eq!(result.outcome, Outcome::SkipRequest);
        assert_eq!(result.response, ProtocolResponse::Empty);
    }
}
