//! Registry construction: default handler sets merged with host overrides.
//!
//! The registry is built once at configuration time and frozen. Overrides
//! match by `(stage, name)` identity: a matching registration replaces the
//! existing descriptor in place (keeping its slot so order tie-breaks stay
//! stable), a non-matching one is appended, and removals drop by identity.
//! After merging, each stage's chain is stable-sorted by ascending order.

use std::collections::HashMap;
use std::sync::Arc;

use crate::descriptor::HandlerDescriptor;
use crate::stage::Stage;

/// Frozen, read-only mapping from stage tag to its ordered handler chain.
///
/// Built once; concurrent lookups need no synchronization.
#[derive(Debug, Default)]
pub struct HandlerRegistry {
    by_stage: HashMap<Stage, Vec<Arc<HandlerDescriptor>>>,
}

impl HandlerRegistry {
    /// The ordered handler chain for a stage. Stages with no registered
    /// handlers yield an empty slice.
    #[must_use]
    pub fn stage(&self, stage: Stage) -> &[Arc<HandlerDescriptor>] {
        self.by_stage.get(&stage).map_or(&[], Vec::as_slice)
    }

    /// Total number of registered descriptors across all stages.
    #[must_use]
    pub fn len(&self) -> usize {
        self.by_stage.values().map(Vec::len).sum()
    }

    /// Whether no descriptors are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Builder merging default descriptors with host additions, replacements,
/// and removals.
#[derive(Debug, Default)]
pub struct RegistryBuilder {
    descriptors: Vec<HandlerDescriptor>,
}

impl RegistryBuilder {
    /// Start from an empty descriptor list.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from a default descriptor list (typically the engine's
    /// built-in handler set for an endpoint).
    #[must_use]
    pub fn with_defaults(descriptors: Vec<HandlerDescriptor>) -> Self {
        Self { descriptors }
    }

    /// Register a descriptor.
    ///
    /// When a descriptor with the same `(stage, name)` identity already
    /// exists it is replaced in place: the override's order, filters, and
    /// behavior win, but the slot is preserved so that equal-order
    /// tie-breaking remains stable. Otherwise the descriptor is appended.
    #[must_use]
    pub fn register(mut self, descriptor: HandlerDescriptor) -> Self {
        let identity = (descriptor.stage(), descriptor.name());
        match self
            .descriptors
            .iter_mut()
            .find(|d| (d.stage(), d.name()) == identity)
        {
            Some(slot) => {
                tracing::debug!(
                    stage = %descriptor.stage(),
                    handler = descriptor.name(),
                    "replacing handler registration"
                );
                *slot = descriptor;
            }
            None => self.descriptors.push(descriptor),
        }
        self
    }

    /// Remove a descriptor by identity. Removing an unknown identity is a
    /// no-op.
    #[must_use]
    pub fn remove(mut self, stage: Stage, name: &str) -> Self {
        self.descriptors
            .retain(|d| !(d.stage() == stage && d.name() == name));
        self
    }

    /// Sort and freeze the registry.
    ///
    /// Each stage's chain is sorted by ascending order; `sort_by_key` is
    /// stable, so descriptors with equal orders keep their registration
    /// order.
    #[must_use]
    pub fn build(self) -> HandlerRegistry {
        let mut by_stage: HashMap<Stage, Vec<Arc<HandlerDescriptor>>> = HashMap::new();
        for descriptor in self.descriptors {
            by_stage
                .entry(descriptor.stage())
                .or_default()
                .push(Arc::new(descriptor));
        }
        for chain in by_stage.values_mut() {
            chain.sort_by_key(|d| d.order());
        }
        HandlerRegistry { by_stage }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::{Handler, PipelineError};
    use crate::stage::{Endpoint, Phase};
    use crate::transaction::Transaction;
    use async_trait::async_trait;

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

    fn descriptor(name: &'static str, order: i32) -> HandlerDescriptor {
        HandlerDescriptor::builder(stage(), name)
            .order(order)
            .use_singleton(Arc::new(Noop))
            .build()
            .unwrap()
    }

    #[test]
    fn test_chain_sorted_by_ascending_order() {
        let registry = RegistryBuilder::new()
            .register(descriptor("c", 300))
            .register(descriptor("a", 100))
            .register(descriptor("b", 200))
            .build();

        let names: Vec<&str> = registry.stage(stage()).iter().map(|d| d.name()).collect();
        assert_eq!(names, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_equal_orders_keep_registration_order() {
        // Deliberately colliding orders: stable sort must preserve the
        // registration sequence within each collision group.
        let registry = RegistryBuilder::new()
            .register(descriptor("first", 100))
            .register(descriptor("second", 100))
            .register(descriptor("third", 100))
            .register(descriptor("earlier", 50))
            .build();

        let names: Vec<&str> = registry.stage(stage()).iter().map(|d| d.name()).collect();
        assert_eq!(names, vec!["earlier", "first", "second", "third"]);
    }

    #[test]
    fn test_override_replaces_without_growing() {
        let builder = RegistryBuilder::with_defaults(vec![
            descriptor("restore", 100),
            descriptor("cache", 200),
        ]);

        // Same identity, new order: replaces in place.
        let registry = builder.register(descriptor("cache", 50)).build();

        assert_eq!(registry.len(), 2);
        let chain = registry.stage(stage());
        assert_eq!(chain[0].name(), "cache");
        assert_eq!(chain[0].order(), 50);
    }

    #[test]
    fn test_new_identity_grows_by_one() {
        let registry = RegistryBuilder::with_defaults(vec![descriptor("restore", 100)])
            .register(descriptor("audit", 500))
            .build();

        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_remove_by_identity() {
        let registry = RegistryBuilder::with_defaults(vec![
            descriptor("restore", 100),
            descriptor("cache", 200),
        ])
        .remove(stage(), "cache")
        .build();

        assert_eq!(registry.len(), 1);
        assert_eq!(registry.stage(stage())[0].name(), "restore");
    }

    #[test]
    fn test_same_name_on_different_stages_is_distinct() {
        let other = Stage::new(Endpoint::Logout, Phase::Apply);
        let registry = RegistryBuilder::new()
            .register(descriptor("render", 100))
            .register(
                HandlerDescriptor::builder(other, "render")
                    .order(100)
                    .use_singleton(Arc::new(Noop))
                    .build()
                    .unwrap(),
            )
            .build();

        assert_eq!(registry.len(), 2);
        assert_eq!(registry.stage(stage()).len(), 1);
        assert_eq!(registry.stage(other).len(), 1);
    }

    #[test]
    fn test_unknown_stage_yields_empty_chain() {
        let registry = RegistryBuilder::new().build();
        assert!(registry
            .stage(Stage::new(Endpoint::Token, Phase::Handle))
            .is_empty());
    }
}
