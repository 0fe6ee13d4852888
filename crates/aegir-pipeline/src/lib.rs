//! aegir Pipeline Engine
//!
//! A small, general-purpose rules engine that runs ordered, filterable
//! handlers against a per-request [`Transaction`]. Every protocol endpoint
//! (authorization, token, logout, introspection) is processed by executing
//! the handler chain registered for each of its stages.
//!
//! # Modules
//!
//! - [`stage`] - Stage tags (`Endpoint` × `Phase`)
//! - [`transaction`] - Per-request mutable state and the `Outcome` flag
//! - [`descriptor`] - Handler metadata, lifetimes, and the fail-fast builder
//! - [`registry`] - Merge-by-identity registry construction and freezing
//! - [`executor`] - Sequential execution with short-circuiting
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use aegir_pipeline::{
//!     Endpoint, Handler, HandlerDescriptor, Phase, Pipeline, PipelineError,
//!     RegistryBuilder, Stage, Transaction,
//! };
//! use async_trait::async_trait;
//!
//! struct Greet;
//!
//! #[async_trait]
//! impl Handler for Greet {
//!     async fn handle(&self, txn: &mut Transaction) -> Result<(), PipelineError> {
//!         txn.response.params.insert("greeting", "hello".into());
//!         Ok(())
//!     }
//! }
//!
//! # async fn run() -> Result<(), PipelineError> {
//! let stage = Stage::new(Endpoint::Logout, Phase::Handle);
//! let descriptor = HandlerDescriptor::builder(stage, "greet")
//!     .order(100)
//!     .use_singleton(Arc::new(Greet))
//!     .build()?;
//!
//! let registry = RegistryBuilder::new().register(descriptor).build();
//! let pipeline = Pipeline::new(Arc::new(registry));
//!
//! let mut txn = Transaction::new("https://id.example.com", "https://id.example.com/logout");
//! pipeline.execute(stage, &mut txn).await?;
//! # Ok(())
//! # }
//! ```

pub mod descriptor;
pub mod executor;
pub mod registry;
pub mod stage;
pub mod transaction;

pub use descriptor::{Activation, Filter, Handler, HandlerDescriptor, HandlerKind, PipelineError};
pub use executor::Pipeline;
pub use registry::{HandlerRegistry, RegistryBuilder};
pub use stage::{Endpoint, Phase, Stage};
pub use transaction::{Outcome, OutboundResponse, Transaction};
