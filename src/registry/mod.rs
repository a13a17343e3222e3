//! Compiled schema registries and cross-scope lookup.
//!
//! Once parsed and validated, models are compiled into a [`TenantGraph`]: an
//! immutable index from namespace prefixes and URIs to the models that own
//! them. Graphs are snapshots; registering or withdrawing a model produces a
//! new graph and the old one stays valid for readers that still hold it.
//!
//! A [`SchemaChain`] stacks graphs in lookup order, tenant first and common
//! registry last, and resolves every qualified name against the first graph
//! that knows it. The chain is also where class flattening lives: walking a
//! type's parent lineage and mandatory aspects into a single merged
//! definition.
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use content_model_engine::model::{ClassDef, Model, Namespace};
//! use content_model_engine::registry::{SchemaChain, TenantGraph};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let model = Model {
//!     name: "t:docs".to_string(),
//!     namespaces: vec![Namespace::new("t", "http://example.com/model/docs/1.0")],
//!     types: vec![ClassDef {
//!         name: "t:doc".to_string(),
//!         ..ClassDef::default()
//!     }],
//!     ..Model::default()
//! };
//!
//! let graph = TenantGraph::new("acme").with_model(Arc::new(model))?;
//! let chain = SchemaChain::single(Arc::new(graph));
//!
//! let flat = chain.flat_type("t:doc", &[])?;
//! assert_eq!(flat.name, "t:doc");
//! # Ok(())
//! # }
//! ```

pub mod chain;
pub mod graph;

pub use chain::SchemaChain;
pub use graph::TenantGraph;
