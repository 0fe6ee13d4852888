//! Per-request transaction state threaded through a stage's handler chain.
//!
//! A transaction is created when an inbound request reaches an endpoint,
//! owned exclusively by one pipeline run, and discarded once the exchange
//! completes. It is never shared across requests.

use std::collections::HashMap;

use aegir_core::{ParameterMap, ProtocolError};
use serde_json::Value;
use uuid::Uuid;

/// Terminal state of a stage's handler chain.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Outcome {
    /// Keep running handlers; the request is not yet resolved.
    #[default]
    Continue,
    /// The request was fully handled; the current response is the answer.
    /// Remaining handlers in the stage do not run, later phases still do.
    HandleRequest,
    /// Stop all processing for this exchange, including response emission.
    SkipRequest,
    /// The request was rejected with a protocol error; error-rendering
    /// handlers in the apply phase will shape the response.
    Rejected(ProtocolError),
}

impl Outcome {
    /// Whether this outcome terminates the current stage.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Outcome::Continue)
    }
}

/// Outbound response under construction.
#[derive(Debug, Clone, Default)]
pub struct OutboundResponse {
    /// Redirect destination, when the response is a redirect. Response
    /// parameters are appended to it as a query string by the apply phase.
    pub redirect_target: Option<String>,
    /// Response parameters (query string or JSON body, host's choice).
    pub params: ParameterMap,
}

/// Mutable per-request state shared by one stage's handler chain.
#[derive(Debug)]
pub struct Transaction {
    /// Trace identifier for log correlation.
    pub trace_id: Uuid,
    /// The service's own base URI (issuer).
    pub base_uri: String,
    /// Absolute URI of the endpoint being processed.
    pub request_uri: String,
    /// Inbound request parameters.
    pub request: ParameterMap,
    /// Outbound response under construction.
    pub response: OutboundResponse,
    /// Open-ended side channel for host- and handler-specific data.
    pub properties: HashMap<String, Value>,
    outcome: Outcome,
}

impl Transaction {
    /// Create a transaction for one inbound exchange.
    #[must_use]
    pub fn new(base_uri: impl Into<String>, request_uri: impl Into<String>) -> Self {
        Self {
            trace_id: Uuid::new_v4(),
            base_uri: base_uri.into(),
            request_uri: request_uri.into(),
            request: ParameterMap::new(),
            response: OutboundResponse::default(),
            properties: HashMap::new(),
            outcome: Outcome::Continue,
        }
    }

    /// Attach inbound request parameters.
    #[must_use]
    pub fn with_request(mut self, request: ParameterMap) -> Self {
        self.request = request;
        self
    }

    /// Current outcome flag.
    #[must_use]
    pub fn outcome(&self) -> &Outcome {
        &self.outcome
    }

    /// Mark the request as fully handled: the response as currently shaped
    /// is the answer.
    pub fn handle_request(&mut self) {
        if matches!(self.outcome, Outcome::Continue) {
            self.outcome = Outcome::HandleRequest;
        }
    }

    /// Abort all processing for this exchange, including response emission.
    pub fn skip_request(&mut self) {
        if matches!(self.outcome, Outcome::Continue) {
            self.outcome = Outcome::SkipRequest;
        }
    }

    /// Reject the request with a protocol error.
    ///
    /// The first rejection wins; later calls are ignored so the error
    /// rendered to the caller is the one that terminated processing.
    pub fn reject(&mut self, error: ProtocolError) {
        if matches!(self.outcome, Outcome::Continue) {
            tracing::debug!(
                trace_id = %self.trace_id,
                error = %error,
                "transaction rejected"
            );
            self.outcome = Outcome::Rejected(error);
        }
    }
}
