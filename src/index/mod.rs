//! Search index integration: field mapping, naming and reconciliation.
//!
//! The engine does not write documents into the search index; it keeps the
//! index's *schema* aligned with the deployed models. Each tenant owns a
//! collection (plus a security-group companion) whose concrete and dynamic
//! fields are derived from the indexed properties visible through the
//! tenant's schema chain. [`IndexReconciler`] computes and applies the
//! difference through the [`SearchIndexApi`] seam, implemented over HTTP by
//! [`HttpIndexClient`] and in memory by [`InMemoryIndex`].
//!
//! ## Example
//!
//! ```rust
//! use content_model_engine::index::{CollectionNaming, index_field_name, index_type};
//! use content_model_engine::model::DataType;
//!
//! let naming = CollectionNaming::new();
//! assert_eq!(naming.collection_for("Acme::EU"), "acme_eu");
//! assert_eq!(naming.security_collection_for("Acme::EU"), "acme_eu-sg");
//!
//! assert_eq!(index_field_name("t:title"), "@t:title");
//! assert_eq!(index_type(DataType::Text, true, "en").as_deref(), Some("text_en"));
//! ```

pub mod client;
pub mod fake;
pub mod fields;
pub mod naming;
pub mod reconciler;

pub use client::{HttpIndexClient, HttpIndexConfig, SearchIndexApi};
pub use fake::{IndexCallCounts, InMemoryIndex};
pub use fields::{
    CoreFieldFile, DynamicIndexField, IndexField, core_index_fields, field_for_property,
    index_field_name, index_type,
};
pub use naming::CollectionNaming;
pub use reconciler::{IndexConfig, IndexMode, IndexReconciler, SyncReport, SyncState};
