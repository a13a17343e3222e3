//! Reconciliation of deployed model schemas into index collections.
//!
//! A reconciliation pass reads the collection's current schema, derives the
//! desired fields from every model visible through the tenant's schema
//! chain, and pushes the difference through [`SearchIndexApi`]. Passes are
//! idempotent: a second pass over an unchanged model set makes no remote
//! calls. A failed remote call aborts the rest of the pass with no rollback;
//! rerunning the pass completes the remainder.
//!
//! Dynamic fields are order-sensitive. The index evaluates them most
//! specific first, and the pass keeps its local view in that order by
//! prepending every dynamic field it adds, so decisions later in the same
//! pass see the narrowed state.

use std::collections::HashMap;

use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use chrono::{DateTime, Utc};
use log::{debug, warn};
use sha2::{Digest, Sha256};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::{ReconcileError, ReconcileResult};
use crate::index::client::SearchIndexApi;
use crate::index::fields::{CoreFieldFile, DynamicIndexField, IndexField, field_for_property};
use crate::index::naming::CollectionNaming;
use crate::registry::SchemaChain;

/// How the reconciler treats the remote index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexMode {
    /// The engine owns the index schema; passes make remote calls.
    Managed,
    /// The index schema is managed out of band, as in older deployments;
    /// passes record bookkeeping but never call out.
    RetroCompatible,
    /// No index behind the engine at all; bookkeeping only.
    Fake,
}

/// Configuration for [`IndexReconciler`].
#[derive(Debug, Clone)]
pub struct IndexConfig {
    /// Collection naming scheme.
    pub naming: CollectionNaming,
    /// Config set that per-tenant config sets are copied from.
    pub base_config_set: String,
    /// Push the embedded core field definitions before model-driven ones.
    pub sync_core_fields: bool,
    /// Locale for text typing when a model sets no tokenization.
    pub default_tokenization: String,
    /// Remote behavior of reconciliation passes.
    pub mode: IndexMode,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            naming: CollectionNaming::default(),
            base_config_set: "_default".to_string(),
            sync_core_fields: true,
            default_tokenization: "en".to_string(),
            mode: IndexMode::Managed,
        }
    }
}

/// Bookkeeping for a tenant's last reconciliation pass.
#[derive(Debug, Clone, Default)]
pub struct SyncState {
    /// When the last pass finished.
    pub last_pass: Option<DateTime<Utc>>,
    /// Digest of the model set the last pass saw.
    pub last_digest: Option<String>,
}

/// Outcome of one reconciliation pass.
#[derive(Debug, Clone)]
pub struct SyncReport {
    /// Unique id of this pass, for log correlation.
    pub pass_id: Uuid,
    pub tenant: String,
    pub collection: String,
    pub started_at: DateTime<Utc>,
    pub fields_created: usize,
    pub fields_updated: usize,
    pub dynamic_created: usize,
    pub dynamic_updated: usize,
    /// Properties left alone because no safe change existed.
    pub skipped: usize,
    /// Whether the pass pushed the core field definitions.
    pub core_synced: bool,
}

impl SyncReport {
    fn new(tenant: &str, collection: &str) -> Self {
        Self {
            pass_id: Uuid::new_v4(),
            tenant: tenant.to_string(),
            collection: collection.to_string(),
            started_at: Utc::now(),
            fields_created: 0,
            fields_updated: 0,
            dynamic_created: 0,
            dynamic_updated: 0,
            skipped: 0,
            core_synced: false,
        }
    }

    /// Total remote schema mutations made by the pass.
    pub fn mutations(&self) -> usize {
        self.fields_created + self.fields_updated + self.dynamic_created + self.dynamic_updated
    }
}

/// Reconciles deployed model schemas into search index collections.
///
/// # Type Parameters
///
/// * `A` - The index admin API, usually
///   [`HttpIndexClient`](crate::index::client::HttpIndexClient) in production
///   and [`InMemoryIndex`](crate::index::fake::InMemoryIndex) in tests
pub struct IndexReconciler<A> {
    api: A,
    config: IndexConfig,
    state: RwLock<HashMap<String, SyncState>>,
}

impl<A: SearchIndexApi> IndexReconciler<A> {
    /// Creates a reconciler with the default configuration.
    pub fn new(api: A) -> Self {
        Self::with_config(api, IndexConfig::default())
    }

    /// Creates a reconciler with an explicit configuration.
    pub fn with_config(api: A, config: IndexConfig) -> Self {
        Self {
            api,
            config,
            state: RwLock::new(HashMap::new()),
        }
    }

    /// Get a reference to the underlying index API.
    pub fn api(&self) -> &A {
        &self.api
    }

    /// Get a reference to the reconciler configuration.
    pub fn config(&self) -> &IndexConfig {
        &self.config
    }

    /// Bookkeeping recorded for a tenant, if any pass ran.
    pub async fn sync_state(&self, tenant: &str) -> SyncState {
        self.state
            .read()
            .await
            .get(tenant)
            .cloned()
            .unwrap_or_default()
    }

    /// Whether the chain's model set differs from the last recorded pass.
    pub async fn needs_sync(&self, tenant: &str, chain: &SchemaChain) -> bool {
        let digest = Self::digest(chain);
        let state = self.state.read().await;
        state.get(tenant).and_then(|s| s.last_digest.as_deref()) != Some(digest.as_str())
    }

    /// Run one reconciliation pass for a tenant.
    ///
    /// Non-[`Managed`](IndexMode::Managed) modes short-circuit before any
    /// remote call and only record bookkeeping.
    pub async fn reconcile(
        &self,
        tenant: &str,
        chain: &SchemaChain,
    ) -> ReconcileResult<SyncReport> {
        let collection = self.config.naming.collection_for(tenant);
        let mut report = SyncReport::new(tenant, &collection);

        if self.config.mode != IndexMode::Managed {
            debug!(
                "Index mode {:?}: pass {} for '{}' records bookkeeping only",
                self.config.mode, report.pass_id, tenant
            );
            self.record_pass(tenant, chain).await;
            return Ok(report);
        }

        let mut fields: HashMap<String, IndexField> = self
            .api
            .list_fields(&collection)
            .await?
            .into_iter()
            .map(|field| (field.name.clone(), field))
            .collect();
        let mut dynamic: Vec<DynamicIndexField> = Vec::new();
        for field in self.api.list_dynamic_fields(&collection).await? {
            match DynamicIndexField::compile(field) {
                Ok(compiled) => dynamic.push(compiled),
                Err(error) => warn!("Ignoring dynamic field in '{collection}': {error}"),
            }
        }

        if self.config.sync_core_fields {
            self.sync_core(&collection, &mut fields, &mut dynamic, &mut report)
                .await?;
        }

        for model in chain.models() {
            let locale = model
                .default_tokenization
                .as_deref()
                .unwrap_or(&self.config.default_tokenization);

            for property in &model.properties {
                if !property.indexed {
                    continue;
                }
                let Some(wanted) = field_for_property(property, locale) else {
                    continue;
                };
                self.sync_property(&collection, wanted, &mut fields, &dynamic, &mut report)
                    .await?;
            }

            for dynamic_property in &model.dynamic_properties {
                if !dynamic_property.property.indexed {
                    continue;
                }
                let Some(wanted) = field_for_property(&dynamic_property.property, locale) else {
                    continue;
                };
                self.sync_dynamic_property(
                    &collection,
                    wanted,
                    dynamic_property.predefined,
                    &mut dynamic,
                    &mut report,
                )
                .await?;
            }
        }

        self.record_pass(tenant, chain).await;
        debug!(
            "Pass {} for '{}' ({}): {} fields added, {} replaced, {} dynamic added, {} replaced, {} skipped",
            report.pass_id,
            tenant,
            collection,
            report.fields_created,
            report.fields_updated,
            report.dynamic_created,
            report.dynamic_updated,
            report.skipped
        );
        Ok(report)
    }

    /// Create the tenant's config set, primary collection and security
    /// collection. Existing objects are left alone and remote failures are
    /// logged rather than returned, so provisioning can be retried any time.
    pub async fn provision_tenant(&self, tenant: &str) {
        if self.config.mode != IndexMode::Managed {
            debug!(
                "Index mode {:?}: skipping provisioning for '{}'",
                self.config.mode, tenant
            );
            return;
        }
        let collection = self.config.naming.collection_for(tenant);
        let security = self.config.naming.security_collection_for(tenant);

        let config_sets = match self.api.list_config_sets().await {
            Ok(sets) => sets,
            Err(error) => {
                warn!("Cannot list config sets while provisioning '{tenant}': {error}");
                return;
            }
        };
        if !config_sets.contains(&collection) {
            if let Err(error) = self
                .api
                .create_config_set(&collection, Some(&self.config.base_config_set))
                .await
            {
                warn!("Cannot create config set '{collection}': {error}");
                return;
            }
        }

        let collections = match self.api.list_collections().await {
            Ok(collections) => collections,
            Err(error) => {
                warn!("Cannot list collections while provisioning '{tenant}': {error}");
                return;
            }
        };
        for name in [&collection, &security] {
            if !collections.contains(name) {
                if let Err(error) = self.api.create_collection(name, &collection).await {
                    warn!("Cannot create collection '{name}': {error}");
                }
            }
        }
    }

    /// Delete the tenant's collections and config set, security collection
    /// first. Missing objects are no-ops and remote failures are logged,
    /// mirroring provisioning.
    pub async fn teardown_tenant(&self, tenant: &str) {
        let collection = self.config.naming.collection_for(tenant);
        let security = self.config.naming.security_collection_for(tenant);

        if self.config.mode == IndexMode::Managed {
            match self.api.list_collections().await {
                Ok(collections) => {
                    for name in [&security, &collection] {
                        if collections.contains(name) {
                            if let Err(error) = self.api.delete_collection(name).await {
                                warn!("Cannot delete collection '{name}': {error}");
                            }
                        }
                    }
                }
                Err(error) => {
                    warn!("Cannot list collections while tearing down '{tenant}': {error}");
                }
            }
            match self.api.list_config_sets().await {
                Ok(config_sets) => {
                    if config_sets.contains(&collection) {
                        if let Err(error) = self.api.delete_config_set(&collection).await {
                            warn!("Cannot delete config set '{collection}': {error}");
                        }
                    }
                }
                Err(error) => {
                    warn!("Cannot list config sets while tearing down '{tenant}': {error}");
                }
            }
        }

        self.state.write().await.remove(tenant);
    }

    /// Bring the embedded core fields up to date before the model-driven
    /// ones, so model properties covered by core definitions need no calls.
    async fn sync_core(
        &self,
        collection: &str,
        fields: &mut HashMap<String, IndexField>,
        dynamic: &mut Vec<DynamicIndexField>,
        report: &mut SyncReport,
    ) -> ReconcileResult<()> {
        let core = CoreFieldFile::load()?;
        for wanted in core.fields {
            match fields.get(&wanted.name) {
                Some(existing) if existing.same_shape(&wanted) => {}
                Some(_) => {
                    self.api.replace_field(collection, &wanted).await?;
                    report.fields_updated += 1;
                    fields.insert(wanted.name.clone(), wanted);
                }
                None => {
                    self.api.add_field(collection, &wanted).await?;
                    report.fields_created += 1;
                    fields.insert(wanted.name.clone(), wanted);
                }
            }
        }
        // Core dynamic fields are identity-managed: matched by exact name,
        // never by pattern.
        for wanted in core.dynamic_fields {
            match dynamic.iter().position(|d| d.name() == wanted.name) {
                Some(position) if dynamic[position].field().same_shape(&wanted) => {}
                Some(position) => {
                    self.api.replace_dynamic_field(collection, &wanted).await?;
                    report.dynamic_updated += 1;
                    dynamic[position] = DynamicIndexField::compile(wanted)?;
                }
                None => {
                    self.api.add_dynamic_field(collection, &wanted).await?;
                    report.dynamic_created += 1;
                    dynamic.insert(0, DynamicIndexField::compile(wanted)?);
                }
            }
        }
        report.core_synced = true;
        Ok(())
    }

    async fn sync_property(
        &self,
        collection: &str,
        wanted: IndexField,
        fields: &mut HashMap<String, IndexField>,
        dynamic: &[DynamicIndexField],
        report: &mut SyncReport,
    ) -> ReconcileResult<()> {
        if let Some(existing) = fields.get(&wanted.name) {
            if existing.same_shape(&wanted) {
                return Ok(());
            }
            self.api.replace_field(collection, &wanted).await?;
            report.fields_updated += 1;
            fields.insert(wanted.name.clone(), wanted);
            return Ok(());
        }

        // The first matching dynamic field is the one the index would apply;
        // if it produces the right shape, no concrete field is needed.
        if let Some(covering) = dynamic.iter().find(|d| d.matches(&wanted.name)) {
            if covering.field().same_shape(&wanted) {
                return Ok(());
            }
        }

        self.api.add_field(collection, &wanted).await?;
        report.fields_created += 1;
        fields.insert(wanted.name.clone(), wanted);
        Ok(())
    }

    async fn sync_dynamic_property(
        &self,
        collection: &str,
        wanted: IndexField,
        predefined: bool,
        dynamic: &mut Vec<DynamicIndexField>,
        report: &mut SyncReport,
    ) -> ReconcileResult<()> {
        let Some(position) = dynamic.iter().position(|d| d.matches(&wanted.name)) else {
            if predefined {
                return Err(ReconcileError::PredefinedFieldMissing {
                    pattern: wanted.name,
                    collection: collection.to_string(),
                });
            }
            self.api.add_dynamic_field(collection, &wanted).await?;
            report.dynamic_created += 1;
            dynamic.insert(0, DynamicIndexField::compile(wanted)?);
            return Ok(());
        };

        if dynamic[position].field().same_shape(&wanted) {
            return Ok(());
        }
        if dynamic[position].name() == wanted.name {
            self.api.replace_dynamic_field(collection, &wanted).await?;
            report.dynamic_updated += 1;
            dynamic[position] = DynamicIndexField::compile(wanted)?;
            return Ok(());
        }

        let wanted_stem = wanted.name.trim_end_matches('*');
        let matched_stem = dynamic[position].stem();
        if wanted_stem.starts_with(matched_stem) && wanted_stem.len() > matched_stem.len() {
            // The wanted pattern is strictly narrower than the field that
            // currently covers it; shadow it instead of widening the change.
            self.api.add_dynamic_field(collection, &wanted).await?;
            report.dynamic_created += 1;
            dynamic.insert(0, DynamicIndexField::compile(wanted)?);
            return Ok(());
        }

        warn!(
            "Dynamic field '{}' in '{}' covers '{}' with a different shape and cannot be narrowed; leaving it alone",
            dynamic[position].name(),
            collection,
            wanted.name
        );
        report.skipped += 1;
        Ok(())
    }

    async fn record_pass(&self, tenant: &str, chain: &SchemaChain) {
        let mut state = self.state.write().await;
        let entry = state.entry(tenant.to_string()).or_default();
        entry.last_pass = Some(Utc::now());
        entry.last_digest = Some(Self::digest(chain));
    }

    /// Content digest of the chain's visible model set.
    fn digest(chain: &SchemaChain) -> String {
        let mut hasher = Sha256::new();
        for model in chain.models() {
            hasher.update(model.name.as_bytes());
            hasher.update([0u8]);
            if let Ok(serialized) = serde_json::to_vec(model.as_ref()) {
                hasher.update(&serialized);
            }
            hasher.update([0u8]);
        }
        BASE64.encode(hasher.finalize())
    }
}
