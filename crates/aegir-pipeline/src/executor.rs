//! Sequential stage execution with short-circuiting.
//!
//! Handlers run one at a time in registry order; each may suspend on I/O.
//! A stage short-circuits when a handler transitions the transaction's
//! outcome to a terminal state. A stage entered with an already-terminal
//! outcome still runs its handlers: apply-phase cleanup and error rendering
//! must execute for rejected transactions.

use std::sync::Arc;

use crate::descriptor::PipelineError;
use crate::registry::HandlerRegistry;
use crate::stage::Stage;
use crate::transaction::{Outcome, Transaction};

/// Executes stage handler chains against transactions.
///
/// Cheap to clone; holds only a shared reference to the frozen registry.
#[derive(Debug, Clone)]
pub struct Pipeline {
    registry: Arc<HandlerRegistry>,
}

impl Pipeline {
    /// Create an executor over a frozen registry.
    #[must_use]
    pub fn new(registry: Arc<HandlerRegistry>) -> Self {
        Self { registry }
    }

    /// The registry backing this executor.
    #[must_use]
    pub fn registry(&self) -> &HandlerRegistry {
        &self.registry
    }

    /// Run one stage's handler chain against the transaction.
    ///
    /// For each descriptor in order: evaluate its filters (all must pass),
    /// invoke the handler, then inspect the outcome. If the handler
    /// transitioned the outcome to `HandleRequest`, `SkipRequest`, or
    /// `Rejected`, the stage stops; remaining handlers do not run.
    ///
    /// # Errors
    ///
    /// Propagates unexpected handler failures unchanged. Protocol failures
    /// are recorded on the transaction, never returned as `Err`.
    pub async fn execute(&self, stage: Stage, txn: &mut Transaction) -> Result<(), PipelineError> {
        let entry_outcome = txn.outcome().clone();

        for descriptor in self.registry.stage(stage) {
            if !descriptor.applies_to(txn) {
                tracing::trace!(
                    trace_id = %txn.trace_id,
                    %stage,
                    handler = descriptor.name(),
                    "handler filtered out"
                );
                continue;
            }

            tracing::debug!(
                trace_id = %txn.trace_id,
                %stage,
                handler = descriptor.name(),
                order = descriptor.order(),
                "invoking handler"
            );
            descriptor.invoke(txn).await?;

            let outcome = txn.outcome();
            if outcome.is_terminal() && *outcome != entry_outcome {
                tracing::debug!(
                    trace_id = %txn.trace_id,
                    %stage,
                    handler = descriptor.name(),
                    outcome = ?outcome,
                    "stage short-circuited"
                );
                break;
            }
        }

        if let Outcome::SkipRequest = txn.outcome() {
            tracing::debug!(trace_id = %txn.trace_id, %stage, "request skipped");
        }
        Ok(())
    }
}
