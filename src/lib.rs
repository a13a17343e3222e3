//! Multi-tenant content model engine for Rust.
//!
//! Provides an async content-model registry with per-tenant schema chains,
//! pluggable model storage and search index schema reconciliation.
//!
//! # Core Components
//!
//! - [`ModelEngine`] - Deployment lifecycle and the per-tenant registry cache
//! - [`ModelStore`] - Trait for implementing model storage backends
//! - [`SchemaChain`] - Tenant-first resolution and class flattening
//! - [`IndexReconciler`] - Keeps index collections aligned with deployed models
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use content_model_engine::{ModelEngine, ModelRecord};
//! use content_model_engine::storage::InMemoryModelStore;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let engine = ModelEngine::new(InMemoryModelStore::new());
//!
//! let record = ModelRecord {
//!     tenant: "acme".to_string(),
//!     name: "t:docs".to_string(),
//!     data: r#"{"name":"t:docs","namespaces":[{"prefix":"t","uri":"http://example.com/model/docs/1.0"}]}"#.to_string(),
//!     format: "compact".to_string(),
//!     active: true,
//! };
//! engine.deploy("acme", record).await?;
//! # Ok(())
//! # }
//! ```

pub mod constraints;
pub mod engine;
pub mod error;
pub mod index;
pub mod model;
pub mod registry;
pub mod storage;

// Re-export commonly used types for convenience
pub use constraints::{ConstraintRegistry, ConstraintValidator, ConstraintViolation};
pub use engine::{ANY_TENANT, EngineConfig, EngineStats, ModelEngine};
pub use error::{
    EngineError, EngineResult, IndexError, ParseError, ReconcileError, ValidationError,
};
pub use model::{ClassDef, ClassKind, Constraint, DataType, Model, ModelFormat, Property};
pub use registry::{SchemaChain, TenantGraph};
pub use storage::{InMemoryModelStore, ModelRecord, ModelScope, ModelStore};

// Index integration re-exports
pub use index::{
    CollectionNaming, HttpIndexClient, IndexConfig, IndexMode, IndexReconciler, InMemoryIndex,
    SearchIndexApi, SyncReport,
};
