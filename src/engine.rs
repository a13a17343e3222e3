//! Model deployment lifecycle and the per-tenant registry cache.
//!
//! [`ModelEngine`] ties the other modules together. It pulls serialized
//! records out of a [`ModelStore`], runs them through the parser and
//! validator, and caches the compiled [`TenantGraph`] per tenant, with the
//! shared common registry stored under [`ANY_TENANT`]. Graphs are immutable
//! snapshots: a deployment publishes a new graph and swaps the map entry, so
//! readers holding the old one keep a coherent view.
//!
//! Registry loads are lazy. The first request for a tenant reads that scope's
//! records from storage and compiles them; records are retried until no
//! further model registers, so storage order never decides whether an import
//! resolves. Records that still fail after the retry loop are logged and
//! skipped rather than poisoning the whole tenant.

use std::collections::HashMap;
use std::sync::Arc;

use log::{debug, warn};
use tokio::sync::RwLock;

use crate::constraints::ConstraintRegistry;
use crate::error::{EngineError, EngineResult};
use crate::model::{Model, ModelFormat, ModelParser, ModelValidator};
use crate::registry::{SchemaChain, TenantGraph};
use crate::storage::{ModelRecord, ModelScope, ModelStore};

/// Pseudo tenant id addressing the shared common registry.
pub const ANY_TENANT: &str = "-any-";

/// Tuning knobs for [`ModelEngine`].
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Re-validate every registered model after a registry rebuild and
    /// unregister the ones that no longer hold, instead of trusting what
    /// storage returned.
    pub strict_validation: bool,
    /// Root of the type hierarchy; the only type allowed to omit a parent.
    pub root_type: String,
    /// Locale assumed for index typing when a model sets no tokenization.
    pub default_tokenization: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            strict_validation: false,
            root_type: "sys:base".to_string(),
            default_tokenization: "en".to_string(),
        }
    }
}

/// Aggregate counts over the graphs currently cached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineStats {
    /// Cached graphs, the common registry included.
    pub tenants: usize,
    /// Registered namespaces across all cached graphs.
    pub namespaces: usize,
    /// Distinct models across all cached graphs.
    pub models: usize,
}

/// Content model engine: deployment, compilation and cross-tenant lookup.
///
/// The engine coordinates between model storage and the compiled registries,
/// handling parsing, validation, namespace registration and tenant isolation.
/// Models are deployed at runtime; nothing about a tenant's schema is fixed
/// at startup.
///
/// # Type Parameters
///
/// * `S` - The storage backend that implements [`ModelStore`]
///
/// # Examples
///
/// ```rust
/// use content_model_engine::engine::ModelEngine;
/// use content_model_engine::storage::{InMemoryModelStore, ModelRecord};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let engine = ModelEngine::new(InMemoryModelStore::new());
///
/// let record = ModelRecord {
///     tenant: "acme".to_string(),
///     name: "t:docs".to_string(),
///     data: r#"{"name":"t:docs","namespaces":[{"prefix":"t","uri":"http://example.com/model/docs/1.0"}]}"#.to_string(),
///     format: "compact".to_string(),
///     active: true,
/// };
/// engine.deploy("acme", record).await?;
///
/// let chain = engine.chain("acme").await?;
/// assert!(chain.resolve_prefix("t").is_some());
/// # Ok(())
/// # }
/// ```
pub struct ModelEngine<S> {
    store: S,
    constraints: Arc<ConstraintRegistry>,
    config: EngineConfig,
    graphs: RwLock<HashMap<String, Arc<TenantGraph>>>,
}

impl<S: ModelStore> ModelEngine<S> {
    /// Creates an engine over the given store with the built-in constraint
    /// registry and default configuration.
    pub fn new(store: S) -> Self {
        Self::with_config(
            store,
            Arc::new(ConstraintRegistry::new()),
            EngineConfig::default(),
        )
    }

    /// Creates an engine with an explicit constraint registry and
    /// configuration.
    pub fn with_config(
        store: S,
        constraints: Arc<ConstraintRegistry>,
        config: EngineConfig,
    ) -> Self {
        Self {
            store,
            constraints,
            config,
            graphs: RwLock::new(HashMap::new()),
        }
    }

    /// Get a reference to the underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Get a reference to the engine configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Get the constraint registry models are checked against.
    pub fn constraints(&self) -> &Arc<ConstraintRegistry> {
        &self.constraints
    }

    /// Compiled common registry, loading it from storage on first use.
    pub async fn common_graph(&self) -> EngineResult<Arc<TenantGraph>> {
        self.graph_for(ANY_TENANT).await
    }

    /// Compiled registry for one tenant, loading it from storage on first
    /// use. Passing [`ANY_TENANT`] returns the common registry.
    pub async fn tenant_graph(&self, tenant: &str) -> EngineResult<Arc<TenantGraph>> {
        self.graph_for(tenant).await
    }

    /// Resolution chain for a tenant: its own graph first, the common
    /// registry behind it. For [`ANY_TENANT`] the chain is the common
    /// registry alone.
    pub async fn chain(&self, tenant: &str) -> EngineResult<SchemaChain> {
        if tenant == ANY_TENANT {
            return Ok(SchemaChain::single(self.graph_for(ANY_TENANT).await?));
        }
        let tenant_graph = self.graph_for(tenant).await?;
        let common = self.graph_for(ANY_TENANT).await?;
        Ok(SchemaChain::new(vec![tenant_graph, common]))
    }

    /// Validate, persist and register a model, publishing a new graph
    /// snapshot for the tenant. Deploying under [`ANY_TENANT`] targets the
    /// common registry.
    ///
    /// Validation and registration are two steps, not one atomic operation;
    /// concurrent deployments to the same tenant must be serialized by the
    /// caller.
    ///
    /// # Errors
    ///
    /// [`EngineError::UnknownFormat`] when the record carries a format tag
    /// the parser does not know; parse and validation failures are returned
    /// as-is.
    pub async fn deploy(&self, tenant: &str, record: ModelRecord) -> EngineResult<Arc<TenantGraph>> {
        let Some(format) = ModelFormat::from_tag(&record.format) else {
            return Err(EngineError::UnknownFormat {
                format: record.format.clone(),
            });
        };
        let parser = ModelParser::new(&self.constraints);
        let model = parser.parse_source(&record.data, format)?;

        let current = self.graph_for(tenant).await?;
        let common = self.common_context(tenant).await?;
        let validator = ModelValidator::new(&self.constraints, &self.config.root_type);
        validator.validate(&model, &current, &common)?;

        let mut record = record;
        record.tenant = tenant.to_string();
        self.store
            .save_model(Self::scope_for(tenant), record)
            .await
            .map_err(EngineError::store)?;

        let next = Arc::new(current.with_model(Arc::new(model))?);
        let mut graphs = self.graphs.write().await;
        graphs.insert(tenant.to_string(), next.clone());
        debug!(
            "Deployed model to tenant '{}': {} namespaces registered",
            tenant,
            next.namespace_count()
        );
        Ok(next)
    }

    /// Withdraw a model: drop its namespaces from the tenant's graph and
    /// delete the persisted record.
    ///
    /// # Errors
    ///
    /// [`EngineError::ModelNotFound`] when the model is neither registered
    /// nor stored for this tenant.
    pub async fn undeploy(&self, tenant: &str, name: &str) -> EngineResult<Arc<TenantGraph>> {
        let current = self.graph_for(tenant).await?;
        let registered = current.contains_model(name);
        let stored = self
            .store
            .delete_model(tenant, Self::scope_for(tenant), name)
            .await
            .map_err(EngineError::store)?;
        if !registered && !stored {
            return Err(EngineError::model_not_found(tenant, name));
        }

        let next = Arc::new(current.without_model(name));
        let mut graphs = self.graphs.write().await;
        graphs.insert(tenant.to_string(), next.clone());
        debug!("Withdrew model '{}' from tenant '{}'", name, tenant);
        Ok(next)
    }

    /// Drop a tenant's cached graph; the next read rebuilds it from storage.
    pub async fn invalidate(&self, tenant: &str) {
        let mut graphs = self.graphs.write().await;
        graphs.remove(tenant);
    }

    /// Drop every cached graph, the common registry included.
    pub async fn invalidate_all(&self) {
        let mut graphs = self.graphs.write().await;
        graphs.clear();
    }

    /// Aggregate counts over the graphs currently cached. Tenants that have
    /// never been read are not counted.
    pub async fn stats(&self) -> EngineStats {
        let graphs = self.graphs.read().await;
        let mut stats = EngineStats {
            tenants: 0,
            namespaces: 0,
            models: 0,
        };
        for graph in graphs.values() {
            stats.tenants += 1;
            stats.namespaces += graph.namespace_count();
            stats.models += graph.models().len();
        }
        stats
    }

    fn scope_for(tenant: &str) -> ModelScope {
        if tenant == ANY_TENANT {
            ModelScope::Common
        } else {
            ModelScope::Tenant
        }
    }

    /// Common graph used as validation context for `tenant`. The common
    /// registry itself is validated against an empty context.
    async fn common_context(&self, tenant: &str) -> EngineResult<Arc<TenantGraph>> {
        if tenant == ANY_TENANT {
            Ok(Arc::new(TenantGraph::new(ANY_TENANT)))
        } else {
            self.graph_for(ANY_TENANT).await
        }
    }

    async fn graph_for(&self, tenant: &str) -> EngineResult<Arc<TenantGraph>> {
        if let Some(graph) = self.lookup(tenant).await {
            return Ok(graph);
        }

        // The common registry is the validation context for every tenant
        // build, so it must exist first.
        let common = if tenant == ANY_TENANT {
            Arc::new(TenantGraph::new(ANY_TENANT))
        } else {
            match self.lookup(ANY_TENANT).await {
                Some(graph) => graph,
                None => {
                    let empty = TenantGraph::new(ANY_TENANT);
                    let built = self.build_graph(ANY_TENANT, &empty).await?;
                    self.install(ANY_TENANT, built).await
                }
            }
        };

        // Built outside the lock; racing first reads may compile twice, but
        // both snapshots come from the same records and the last insert wins.
        let graph = self.build_graph(tenant, &common).await?;
        Ok(self.install(tenant, graph).await)
    }

    async fn lookup(&self, tenant: &str) -> Option<Arc<TenantGraph>> {
        self.graphs.read().await.get(tenant).cloned()
    }

    async fn install(&self, tenant: &str, graph: TenantGraph) -> Arc<TenantGraph> {
        let graph = Arc::new(graph);
        let mut graphs = self.graphs.write().await;
        graphs.insert(tenant.to_string(), graph.clone());
        graph
    }

    /// Compile one scope's stored records into a graph.
    async fn build_graph(&self, tenant: &str, common: &TenantGraph) -> EngineResult<TenantGraph> {
        let records = self
            .store
            .load_schema(tenant, Self::scope_for(tenant), true)
            .await
            .map_err(EngineError::store)?;

        let parser = ModelParser::new(&self.constraints);
        let mut pending: Vec<Model> = Vec::new();
        for record in &records {
            match parser.parse(record) {
                Ok(Some(model)) => pending.push(model),
                Ok(None) => {}
                Err(error) => {
                    warn!(
                        "Skipping unparseable model '{}' for tenant '{}': {}",
                        record.name, tenant, error
                    );
                }
            }
        }

        let validator = ModelValidator::new(&self.constraints, &self.config.root_type);
        let mut graph = TenantGraph::new(tenant);

        // Storage order says nothing about import order. Keep retrying the
        // leftovers until a full pass registers nothing new.
        loop {
            let mut retry = Vec::new();
            let mut progressed = false;
            for model in pending {
                match validator.validate(&model, &graph, common) {
                    Ok(()) => {
                        graph = graph.with_model(Arc::new(model))?;
                        progressed = true;
                    }
                    Err(_) => retry.push(model),
                }
            }
            pending = retry;
            if pending.is_empty() || !progressed {
                break;
            }
        }
        for model in &pending {
            // One more run to put the real failure in the log.
            if let Err(error) = validator.validate(model, &graph, common) {
                warn!(
                    "Model '{}' for tenant '{}' failed validation and was skipped: {}",
                    model.name, tenant, error
                );
            }
        }

        if self.config.strict_validation {
            graph = self.strict_sweep(tenant, graph, common);
        }

        debug!(
            "Compiled registry for tenant '{}': {} namespaces, {} models",
            tenant,
            graph.namespace_count(),
            graph.models().len()
        );
        Ok(graph)
    }

    /// Re-validate every registered model and unregister the failures. The
    /// graph stays queryable even when parts of the model set are broken.
    fn strict_sweep(
        &self,
        tenant: &str,
        mut graph: TenantGraph,
        common: &TenantGraph,
    ) -> TenantGraph {
        let validator = ModelValidator::new(&self.constraints, &self.config.root_type);
        for model in graph.models() {
            if let Err(error) = validator.validate(&model, &graph, common) {
                warn!(
                    "Unregistering model '{}' for tenant '{}': {}",
                    model.name, tenant, error
                );
                graph = graph.without_model(&model.name);
            }
        }
        graph
    }
}
