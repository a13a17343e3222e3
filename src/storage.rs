//! Persistence layer for serialized model definitions.
//!
//! The engine never compiles models straight off the wire: every deployed
//! model is written to a [`ModelStore`] first and parsed from there, so a
//! restart (or another node) can rebuild the same registry from storage
//! alone. The store deals in opaque [`ModelRecord`]s and knows nothing about
//! model semantics; parsing and validation live in [`crate::model`].
//!
//! Records sit in one of two scopes: [`ModelScope::Common`] for models shared
//! by every tenant, [`ModelScope::Tenant`] for models private to one tenant.
//! Implementations must keep the scopes isolated from each other.
//!
//! [`InMemoryModelStore`] is the bundled implementation, suitable for tests
//! and single-process deployments.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::RwLock;

/// Visibility of a stored model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModelScope {
    /// Shared by every tenant; forms the base layer of each schema chain.
    Common,
    /// Private to a single tenant.
    Tenant,
}

/// A serialized model as it sits in storage.
///
/// `data` holds the raw document and `format` names the syntax it is written
/// in (see [`crate::model::ModelFormat`]); parsing is deferred until the
/// owning tenant's registry is built. Records saved with `active` unset are
/// retained but excluded from compilation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelRecord {
    /// Tenant the record belongs to; ignored in the common scope.
    pub tenant: String,
    /// Qualified model name, unique within its scope.
    pub name: String,
    /// Raw model document.
    pub data: String,
    /// Format tag describing `data`.
    pub format: String,
    /// Whether the record takes part in schema compilation.
    pub active: bool,
}

/// Errors surfaced by [`ModelStore`] implementations.
///
/// [`InMemoryModelStore`] never produces these; they exist for backends that
/// sit on a database or remote service.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The backend is temporarily unreachable.
    #[error("Store unavailable: {message}")]
    Unavailable { message: String },

    /// A record was found but could not be read back.
    #[error("Corrupt record for model '{name}': {reason}")]
    CorruptRecord { name: String, reason: String },
}

impl StoreError {
    /// Create an [`StoreError::Unavailable`] error.
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable {
            message: message.into(),
        }
    }

    /// Create a [`StoreError::CorruptRecord`] error.
    pub fn corrupt_record(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::CorruptRecord {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Whether retrying the operation might succeed.
    pub fn is_temporary(&self) -> bool {
        matches!(self, StoreError::Unavailable { .. })
    }
}

/// Pluggable persistence for serialized models.
///
/// The method set mirrors how the engine consumes storage: a bulk load when a
/// tenant registry is (re)built, point reads and writes when individual
/// models are deployed or withdrawn. All methods return futures so
/// implementations can be backed by databases or remote services.
pub trait ModelStore: Send + Sync {
    /// Error type produced by this store implementation.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Load every record in the given scope.
    ///
    /// With `active_only` set, records whose [`ModelRecord::active`] flag is
    /// false are filtered out. `tenant` is ignored for the common scope.
    fn load_schema(
        &self,
        tenant: &str,
        scope: ModelScope,
        active_only: bool,
    ) -> impl Future<Output = Result<Vec<ModelRecord>, Self::Error>> + Send;

    /// Fetch a single record by model name.
    fn get_model(
        &self,
        tenant: &str,
        scope: ModelScope,
        name: &str,
    ) -> impl Future<Output = Result<Option<ModelRecord>, Self::Error>> + Send;

    /// Insert or overwrite a record, keyed by its model name.
    fn save_model(
        &self,
        scope: ModelScope,
        record: ModelRecord,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send;

    /// Remove a record, reporting whether it existed.
    fn delete_model(
        &self,
        tenant: &str,
        scope: ModelScope,
        name: &str,
    ) -> impl Future<Output = Result<bool, Self::Error>> + Send;
}

/// In-memory [`ModelStore`] backed by a `HashMap` behind an async lock.
///
/// Records are partitioned per scope, one bucket for common models and one
/// per tenant, so tenants can never observe each other's private models.
/// Cloning is cheap and all clones share the same data.
#[derive(Debug, Clone)]
pub struct InMemoryModelStore {
    records: Arc<RwLock<HashMap<String, HashMap<String, ModelRecord>>>>,
}

impl InMemoryModelStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self {
            records: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Number of records across all scopes.
    pub async fn record_count(&self) -> usize {
        let records = self.records.read().await;
        records.values().map(HashMap::len).sum()
    }

    /// Drop every record. Intended for tests.
    pub async fn clear(&self) {
        let mut records = self.records.write().await;
        records.clear();
    }

    fn partition(tenant: &str, scope: ModelScope) -> String {
        match scope {
            ModelScope::Common => "common".to_string(),
            ModelScope::Tenant => format!("tenant:{tenant}"),
        }
    }
}

impl Default for InMemoryModelStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ModelStore for InMemoryModelStore {
    type Error = StoreError;

    async fn load_schema(
        &self,
        tenant: &str,
        scope: ModelScope,
        active_only: bool,
    ) -> Result<Vec<ModelRecord>, Self::Error> {
        let records = self.records.read().await;
        let mut found: Vec<ModelRecord> = records
            .get(&Self::partition(tenant, scope))
            .map(|bucket| {
                bucket
                    .values()
                    .filter(|record| record.active || !active_only)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        // Stable order keeps bulk loads reproducible across runs.
        found.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(found)
    }

    async fn get_model(
        &self,
        tenant: &str,
        scope: ModelScope,
        name: &str,
    ) -> Result<Option<ModelRecord>, Self::Error> {
        let records = self.records.read().await;
        Ok(records
            .get(&Self::partition(tenant, scope))
            .and_then(|bucket| bucket.get(name))
            .cloned())
    }

    async fn save_model(&self, scope: ModelScope, record: ModelRecord) -> Result<(), Self::Error> {
        let mut records = self.records.write().await;
        let bucket = records
            .entry(Self::partition(&record.tenant, scope))
            .or_default();
        bucket.insert(record.name.clone(), record);
        Ok(())
    }

    async fn delete_model(
        &self,
        tenant: &str,
        scope: ModelScope,
        name: &str,
    ) -> Result<bool, Self::Error> {
        let mut records = self.records.write().await;
        let existed = records
            .get_mut(&Self::partition(tenant, scope))
            .map(|bucket| bucket.remove(name).is_some())
            .unwrap_or(false);
        Ok(existed)
    }
}
