//! In-memory search index for tests and development.
//!
//! [`InMemoryIndex`] implements [`SearchIndexApi`] over a shared map and
//! counts every mutating call, so tests can assert not just the final schema
//! but how many remote calls a reconciliation pass would have made.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::error::{IndexError, IndexResult};
use crate::index::client::SearchIndexApi;
use crate::index::fields::IndexField;

/// Per-operation mutation counters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexCallCounts {
    pub collections_created: usize,
    pub collections_deleted: usize,
    pub config_sets_created: usize,
    pub config_sets_deleted: usize,
    pub fields_added: usize,
    pub fields_replaced: usize,
    pub dynamic_added: usize,
    pub dynamic_replaced: usize,
}

impl IndexCallCounts {
    /// Total mutations across every kind.
    pub fn total(&self) -> usize {
        self.collections_created
            + self.collections_deleted
            + self.config_sets_created
            + self.config_sets_deleted
            + self.fields_added
            + self.fields_replaced
            + self.dynamic_added
            + self.dynamic_replaced
    }
}

#[derive(Debug, Default)]
struct CollectionSchema {
    fields: HashMap<String, IndexField>,
    // Evaluation order, most specific first.
    dynamic: Vec<IndexField>,
}

#[derive(Debug, Default)]
struct IndexState {
    collections: HashMap<String, CollectionSchema>,
    // Config set name to the base set it was copied from.
    config_sets: HashMap<String, Option<String>>,
    counts: IndexCallCounts,
}

/// In-memory [`SearchIndexApi`] implementation.
///
/// Cloning is cheap and all clones share the same state, so a test can hand
/// one clone to the reconciler and inspect the other.
#[derive(Debug, Clone, Default)]
pub struct InMemoryIndex {
    state: Arc<RwLock<IndexState>>,
}

impl InMemoryIndex {
    /// Create an empty index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the mutation counters.
    pub async fn counts(&self) -> IndexCallCounts {
        self.state.read().await.counts.clone()
    }

    /// Zero the mutation counters, keeping the schema state.
    pub async fn reset_counts(&self) {
        self.state.write().await.counts = IndexCallCounts::default();
    }

    /// Whether a collection exists.
    pub async fn has_collection(&self, name: &str) -> bool {
        self.state.read().await.collections.contains_key(name)
    }

    /// Whether a config set exists.
    pub async fn has_config_set(&self, name: &str) -> bool {
        self.state.read().await.config_sets.contains_key(name)
    }

    /// A concrete field by name, if the collection and field exist.
    pub async fn field(&self, collection: &str, name: &str) -> Option<IndexField> {
        let state = self.state.read().await;
        state
            .collections
            .get(collection)
            .and_then(|schema| schema.fields.get(name))
            .cloned()
    }

    /// Dynamic fields of a collection in evaluation order.
    pub async fn dynamic_fields(&self, collection: &str) -> Vec<IndexField> {
        let state = self.state.read().await;
        state
            .collections
            .get(collection)
            .map(|schema| schema.dynamic.clone())
            .unwrap_or_default()
    }
}

impl SearchIndexApi for InMemoryIndex {
    async fn list_collections(&self) -> IndexResult<Vec<String>> {
        let state = self.state.read().await;
        let mut names: Vec<String> = state.collections.keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    async fn create_collection(&self, name: &str, config_set: &str) -> IndexResult<()> {
        let mut state = self.state.write().await;
        if !state.config_sets.contains_key(config_set) {
            return Err(IndexError::from_status(
                400,
                format!("Config set '{config_set}' does not exist"),
            ));
        }
        if state.collections.contains_key(name) {
            return Err(IndexError::from_status(
                400,
                format!("Collection '{name}' already exists"),
            ));
        }
        state
            .collections
            .insert(name.to_string(), CollectionSchema::default());
        state.counts.collections_created += 1;
        Ok(())
    }

    async fn delete_collection(&self, name: &str) -> IndexResult<()> {
        let mut state = self.state.write().await;
        if state.collections.remove(name).is_none() {
            return Err(IndexError::from_status(
                404,
                format!("Collection '{name}' does not exist"),
            ));
        }
        state.counts.collections_deleted += 1;
        Ok(())
    }

    async fn list_config_sets(&self) -> IndexResult<Vec<String>> {
        let state = self.state.read().await;
        let mut names: Vec<String> = state.config_sets.keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    async fn create_config_set(&self, name: &str, base: Option<&str>) -> IndexResult<()> {
        let mut state = self.state.write().await;
        if state.config_sets.contains_key(name) {
            return Err(IndexError::from_status(
                400,
                format!("Config set '{name}' already exists"),
            ));
        }
        if let Some(base) = base {
            if !state.config_sets.contains_key(base) {
                return Err(IndexError::from_status(
                    400,
                    format!("Base config set '{base}' does not exist"),
                ));
            }
        }
        state
            .config_sets
            .insert(name.to_string(), base.map(str::to_string));
        state.counts.config_sets_created += 1;
        Ok(())
    }

    async fn upload_config_set(&self, name: &str, _archive: &[u8]) -> IndexResult<()> {
        let mut state = self.state.write().await;
        if state.config_sets.contains_key(name) {
            return Err(IndexError::from_status(
                400,
                format!("Config set '{name}' already exists"),
            ));
        }
        state.config_sets.insert(name.to_string(), None);
        state.counts.config_sets_created += 1;
        Ok(())
    }

    async fn delete_config_set(&self, name: &str) -> IndexResult<()> {
        let mut state = self.state.write().await;
        if state.config_sets.remove(name).is_none() {
            return Err(IndexError::from_status(
                404,
                format!("Config set '{name}' does not exist"),
            ));
        }
        state.counts.config_sets_deleted += 1;
        Ok(())
    }

    async fn list_fields(&self, collection: &str) -> IndexResult<Vec<IndexField>> {
        let state = self.state.read().await;
        let schema = state
            .collections
            .get(collection)
            .ok_or_else(|| unknown_collection(collection))?;
        let mut fields: Vec<IndexField> = schema.fields.values().cloned().collect();
        fields.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(fields)
    }

    async fn list_dynamic_fields(&self, collection: &str) -> IndexResult<Vec<IndexField>> {
        let state = self.state.read().await;
        let schema = state
            .collections
            .get(collection)
            .ok_or_else(|| unknown_collection(collection))?;
        Ok(schema.dynamic.clone())
    }

    async fn add_field(&self, collection: &str, field: &IndexField) -> IndexResult<()> {
        let mut state = self.state.write().await;
        let schema = state
            .collections
            .get_mut(collection)
            .ok_or_else(|| unknown_collection(collection))?;
        if schema.fields.contains_key(&field.name) {
            return Err(IndexError::from_status(
                400,
                format!("Field '{}' already exists", field.name),
            ));
        }
        schema.fields.insert(field.name.clone(), field.clone());
        state.counts.fields_added += 1;
        Ok(())
    }

    async fn replace_field(&self, collection: &str, field: &IndexField) -> IndexResult<()> {
        let mut state = self.state.write().await;
        let schema = state
            .collections
            .get_mut(collection)
            .ok_or_else(|| unknown_collection(collection))?;
        if !schema.fields.contains_key(&field.name) {
            return Err(IndexError::from_status(
                400,
                format!("Field '{}' does not exist", field.name),
            ));
        }
        schema.fields.insert(field.name.clone(), field.clone());
        state.counts.fields_replaced += 1;
        Ok(())
    }

    async fn add_dynamic_field(&self, collection: &str, field: &IndexField) -> IndexResult<()> {
        let mut state = self.state.write().await;
        let schema = state
            .collections
            .get_mut(collection)
            .ok_or_else(|| unknown_collection(collection))?;
        if schema.dynamic.iter().any(|f| f.name == field.name) {
            return Err(IndexError::from_status(
                400,
                format!("Dynamic field '{}' already exists", field.name),
            ));
        }
        // Newest fields are the narrower ones; keep them first in
        // evaluation order.
        schema.dynamic.insert(0, field.clone());
        state.counts.dynamic_added += 1;
        Ok(())
    }

    async fn replace_dynamic_field(&self, collection: &str, field: &IndexField) -> IndexResult<()> {
        let mut state = self.state.write().await;
        let schema = state
            .collections
            .get_mut(collection)
            .ok_or_else(|| unknown_collection(collection))?;
        let Some(existing) = schema.dynamic.iter_mut().find(|f| f.name == field.name) else {
            return Err(IndexError::from_status(
                400,
                format!("Dynamic field '{}' does not exist", field.name),
            ));
        };
        *existing = field.clone();
        state.counts.dynamic_replaced += 1;
        Ok(())
    }
}

fn unknown_collection(name: &str) -> IndexError {
    IndexError::from_status(404, format!("Collection '{name}' does not exist"))
}
