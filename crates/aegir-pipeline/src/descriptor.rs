//! Handler descriptors: metadata describing one unit of pipeline logic.
//!
//! A descriptor binds a handler to a stage tag with an execution order, a
//! filter set, a lifetime (singleton or transient), and an identity used for
//! override/removal during registry construction. Descriptors are immutable
//! once built; misconfiguration fails at build time, not at request time.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::stage::Stage;
use crate::transaction::Transaction;

/// Errors raised by the pipeline engine itself.
///
/// Protocol-level failures never surface here; handlers record those on the
/// transaction via `reject`. Anything returned as `Err` crosses stage
/// boundaries unhandled.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Invalid descriptor or registry configuration, raised at build time.
    #[error("pipeline configuration error: {0}")]
    Configuration(String),

    /// Unexpected handler failure (infrastructure fault, bug).
    #[error("handler '{handler}' failed: {message}")]
    Handler {
        /// Identity of the failing handler.
        handler: &'static str,
        /// Failure description.
        message: String,
    },
}

/// One unit of pipeline logic.
///
/// Handlers may suspend on I/O (cache reads, cryptographic verification).
/// Singleton handlers are invoked concurrently across in-flight transactions
/// and must not retain per-request mutable state.
#[async_trait]
pub trait Handler: Send + Sync {
    /// Process the transaction. Protocol failures go through
    /// [`Transaction::reject`]; `Err` is reserved for unexpected conditions.
    async fn handle(&self, txn: &mut Transaction) -> Result<(), PipelineError>;
}

/// Side-effect-free predicate deciding whether a handler applies to a
/// transaction. A descriptor's filters compose by logical AND.
pub trait Filter: Send + Sync {
    /// Whether the handler should run for this transaction.
    fn applies(&self, txn: &Transaction) -> bool;
}

/// Whether a descriptor ships with the engine or was supplied by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HandlerKind {
    /// Registered by the engine's default handler set.
    BuiltIn,
    /// Registered by the host application.
    #[default]
    Custom,
}

/// Handler lifetime: a shared stateless instance, or a factory invoked per
/// transaction.
pub enum Activation {
    /// One shared instance, reused across all transactions.
    Singleton(Arc<dyn Handler>),
    /// A fresh handler constructed for each invocation.
    Transient(Box<dyn Fn() -> Box<dyn Handler> + Send + Sync>),
}

impl std::fmt::Debug for Activation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Singleton(_) => f.write_str("Singleton"),
            Self::Transient(_) => f.write_str("Transient"),
        }
    }
}

/// Immutable metadata describing one registered handler.
#[derive(Debug)]
pub struct HandlerDescriptor {
    name: &'static str,
    stage: Stage,
    order: i32,
    kind: HandlerKind,
    filters: Vec<Arc<dyn Filter>>,
    activation: Activation,
}

impl HandlerDescriptor {
    /// Start building a descriptor for the given stage under a stable
    /// identity. The name is the override/removal key during registry
    /// construction.
    #[must_use]
    pub fn builder(stage: Stage, name: &'static str) -> HandlerDescriptorBuilder {
        HandlerDescriptorBuilder {
            name,
            stage,
            order: 0,
            kind: HandlerKind::Custom,
            filters: Vec::new(),
            activation: None,
        }
    }

    /// Stable identity of this handler within its stage.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Stage tag this handler is bound to.
    #[must_use]
    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// Execution order; lower runs earlier, ties keep registration order.
    #[must_use]
    pub fn order(&self) -> i32 {
        self.order
    }

    /// Built-in or host-supplied.
    #[must_use]
    pub fn kind(&self) -> HandlerKind {
        self.kind
    }

    /// Filters gating this handler, composed by logical AND.
    #[must_use]
    pub fn filters(&self) -> &[Arc<dyn Filter>] {
        &self.filters
    }

    /// Whether every filter accepts the transaction. An empty filter set is
    /// always applicable.
    #[must_use]
    pub fn applies_to(&self, txn: &Transaction) -> bool {
        self.filters.iter().all(|f| f.applies(txn))
    }

    /// Invoke the handler: reuse the singleton or construct a transient
    /// instance for this call.
    pub async fn invoke(&self, txn: &mut Transaction) -> Result<(), PipelineError> {
        match &self.activation {
            Activation::Singleton(handler) => handler.handle(txn).await,
            Activation::Transient(factory) => factory().handle(txn).await,
        }
    }
}

impl std::fmt::Debug for dyn Filter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Filter")
    }
}

/// Fluent builder for [`HandlerDescriptor`].
pub struct HandlerDescriptorBuilder {
    name: &'static str,
    stage: Stage,
    order: i32,
    kind: HandlerKind,
    filters: Vec<Arc<dyn Filter>>,
    activation: Option<Activation>,
}

impl HandlerDescriptorBuilder {
    /// Set the execution order.
    #[must_use]
    pub fn order(mut self, order: i32) -> Self {
        self.order = order;
        self
    }

    /// Mark the descriptor as part of the engine's default set.
    #[must_use]
    pub fn built_in(mut self) -> Self {
        self.kind = HandlerKind::BuiltIn;
        self
    }

    /// Add a filter. Filters are evaluated in the order they were added.
    #[must_use]
    pub fn filter(mut self, filter: Arc<dyn Filter>) -> Self {
        self.filters.push(filter);
        self
    }

    /// Use one shared handler instance. The instance must be stateless or
    /// internally synchronized: it runs concurrently across transactions.
    #[must_use]
    pub fn use_singleton(mut self, handler: Arc<dyn Handler>) -> Self {
        self.activation = Some(Activation::Singleton(handler));
        self
    }

    /// Construct a fresh handler per invocation.
    #[must_use]
    pub fn use_transient<F>(mut self, factory: F) -> Self
    where
        F: Fn() -> Box<dyn Handler> + Send + Sync + 'static,
    {
        self.activation = Some(Activation::Transient(Box::new(factory)));
        self
    }

    /// Freeze the descriptor.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Configuration`] when no handler was supplied
    /// or the name is empty; these are caller bugs and fail fast.
    pub fn build(self) -> Result<HandlerDescriptor, PipelineError> {
        if self.name.is_empty() {
            return Err(PipelineError::Configuration(
                "handler descriptor requires a non-empty name".into(),
            ));
        }
        let activation = self.activation.ok_or_else(|| {
            PipelineError::Configuration(format!(
                "handler '{}' has no singleton instance or transient factory",
                self.name
            ))
        })?;

        Ok(HandlerDescriptor {
            name: self.name,
            stage: self.stage,
            order: self.order,
            kind: self.kind,
            filters: self.filters,
            activation,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stage::{Endpoint, Phase};

    struct Noop;

    #[async_trait]
    impl Handler for Noop {
        async fn handle(&self, _txn: &mut Transaction) -> Result<(), PipelineError> {
            Ok(())
        }
    }

    fn stage() -> Stage {
        Stage::new(Endpoint::Logout, Phase::Extract)
    }

    #[test]
    fn test_build_without_activation_fails_fast() {
        let result = HandlerDescriptor::builder(stage(), "no_activation").build();
        assert!(matches!(result, Err(PipelineError::Configuration(_))));
    }

    #[test]
    fn test_build_with_empty_name_fails_fast() {
        let result = HandlerDescriptor::builder(stage(), "")
            .use_singleton(Arc::new(Noop))
            .build();
        assert!(matches!(result, Err(PipelineError::Configuration(_))));
    }

    #[test]
    fn test_builder_defaults() {
        let descriptor = HandlerDescriptor::builder(stage(), "noop")
            .use_singleton(Arc::new(Noop))
            .build()
            .unwrap();

        assert_eq!(descriptor.name(), "noop");
        assert_eq!(descriptor.order(), 0);
        assert_eq!(descriptor.kind(), HandlerKind::Custom);
        assert!(descriptor.filters().is_empty());
    }

    #[test]
    fn test_empty_filter_set_always_applies() {
        let descriptor = HandlerDescriptor::builder(stage(), "noop")
            .use_singleton(Arc::new(Noop))
            .build()
            .unwrap();

        let txn = Transaction::new("https://id.example.com", "https://id.example.com/logout");
        assert!(descriptor.applies_to(&txn));
    }

    #[test]
    fn test_filters_compose_with_logical_and() {
        struct Always(bool);
        impl Filter for Always {
            fn applies(&self, _txn: &Transaction) -> bool {
                self.0
            }
        }

        let descriptor = HandlerDescriptor::builder(stage(), "gated")
            .filter(Arc::new(Always(true)))
            .filter(Arc::new(Always(false)))
            .use_singleton(Arc::new(Noop))
            .build()
            .unwrap();

        let txn = Transaction::new("https://id.example.com", "https://id.example.com/logout");
        assert!(!descriptor.applies_to(&txn));
    }

    #[tokio::test]
    async fn test_transient_factory_constructs_per_invocation() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        static CONSTRUCTED: AtomicUsize = AtomicUsize::new(0);

        struct Counting;

        #[async_trait]
        impl Handler for Counting {
            async fn handle(&self, _txn: &mut Transaction) -> Result<(), PipelineError> {
                Ok(())
            }
        }

        let descriptor = HandlerDescriptor::builder(stage(), "counting")
            .use_transient(|| {
                CONSTRUCTED.fetch_add(1, Ordering::SeqCst);
                Box::new(Counting)
            })
            .build()
            .unwrap();

        let mut txn = Transaction::new("https://id.example.com", "https://id.example.com/logout");
        descriptor.invoke(&mut txn).await.unwrap();
        descriptor.invoke(&mut txn).await.unwrap();

        assert_eq!(CONSTRUCTED.load(Ordering::SeqCst), 2);
    }
}
