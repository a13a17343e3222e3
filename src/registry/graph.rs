//! Immutable per-tenant namespace graph.
//!
//! A [`TenantGraph`] maps every registered namespace prefix to the model
//! that owns it, plus a bijective prefix/URI pair of maps so both directions
//! resolve without scanning. Graphs are never edited: [`TenantGraph::with_model`]
//! and [`TenantGraph::without_model`] return a new graph, and the engine
//! swaps whole `Arc<TenantGraph>` snapshots so concurrent readers always see
//! a complete graph.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::error::{ValidationError, ValidationResult};
use crate::model::{
    Association, ClassDef, ClassKind, Constraint, DynamicProperty, Model, Property, split_name,
};

/// One tenant's registered namespaces and models.
#[derive(Debug, Clone, Default)]
pub struct TenantGraph {
    tenant_id: String,
    namespace_to_model: HashMap<String, Arc<Model>>,
    prefix_to_uri: HashMap<String, String>,
    uri_to_prefix: HashMap<String, String>,
}

impl TenantGraph {
    /// Create an empty graph for a tenant.
    pub fn new(tenant_id: impl Into<String>) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            namespace_to_model: HashMap::new(),
            prefix_to_uri: HashMap::new(),
            uri_to_prefix: HashMap::new(),
        }
    }

    /// The tenant this graph belongs to.
    pub fn tenant_id(&self) -> &str {
        &self.tenant_id
    }

    /// True when no namespace is registered.
    pub fn is_empty(&self) -> bool {
        self.namespace_to_model.is_empty()
    }

    /// Number of registered namespace prefixes.
    pub fn namespace_count(&self) -> usize {
        self.namespace_to_model.len()
    }

    /// True when the prefix is registered here.
    pub fn owns_prefix(&self, prefix: &str) -> bool {
        self.namespace_to_model.contains_key(prefix)
    }

    /// The model owning a prefix.
    pub fn model_for_prefix(&self, prefix: &str) -> Option<&Arc<Model>> {
        self.namespace_to_model.get(prefix)
    }

    /// The URI bound to a prefix.
    pub fn uri_for_prefix(&self, prefix: &str) -> Option<&str> {
        self.prefix_to_uri.get(prefix).map(String::as_str)
    }

    /// The prefix bound to a URI.
    pub fn prefix_for_uri(&self, uri: &str) -> Option<&str> {
        self.uri_to_prefix.get(uri).map(String::as_str)
    }

    /// True when a model with this name is registered.
    pub fn contains_model(&self, name: &str) -> bool {
        self.namespace_to_model.values().any(|m| m.name == name)
    }

    /// The distinct registered models, ordered by name.
    pub fn models(&self) -> Vec<Arc<Model>> {
        let mut seen = HashSet::new();
        let mut out: Vec<Arc<Model>> = self
            .namespace_to_model
            .values()
            .filter(|m| seen.insert(m.name.clone()))
            .cloned()
            .collect();
        out.sort_by(|a, b| a.name.cmp(&b.name));
        out
    }

    /// Register a model, producing a new graph.
    ///
    /// An already-registered model with the same name is replaced wholesale
    /// first, so a redeploy keeps its own prefixes. A prefix or URI bound to
    /// a *different* model is a conflict and fails registration.
    pub fn with_model(&self, model: Arc<Model>) -> ValidationResult<Self> {
        let mut next = self.without_model(&model.name);
        for ns in &model.namespaces {
            if let Some(owner) = next.namespace_to_model.get(&ns.prefix) {
                return Err(ValidationError::NamespaceForbidden {
                    prefix: ns.prefix.clone(),
                    owner: owner.name.clone(),
                });
            }
            if let Some(bound) = next.uri_to_prefix.get(&ns.uri) {
                return Err(ValidationError::DuplicateNamespaceUri {
                    uri: ns.uri.clone(),
                    prefix: bound.clone(),
                });
            }
            next.namespace_to_model
                .insert(ns.prefix.clone(), Arc::clone(&model));
            next.prefix_to_uri.insert(ns.prefix.clone(), ns.uri.clone());
            next.uri_to_prefix.insert(ns.uri.clone(), ns.prefix.clone());
        }
        Ok(next)
    }

    /// Remove a model's namespaces, producing a new graph.
    ///
    /// Removing an unregistered name yields an unchanged copy.
    pub fn without_model(&self, name: &str) -> Self {
        let mut next = Self::new(self.tenant_id.clone());
        for (prefix, model) in &self.namespace_to_model {
            if model.name == name {
                continue;
            }
            next.namespace_to_model
                .insert(prefix.clone(), Arc::clone(model));
            if let Some(uri) = self.prefix_to_uri.get(prefix) {
                next.prefix_to_uri.insert(prefix.clone(), uri.clone());
                next.uri_to_prefix.insert(uri.clone(), prefix.clone());
            }
        }
        next
    }

    fn model_for_name(&self, name: &str) -> Option<&Arc<Model>> {
        let (prefix, _) = split_name(name)?;
        self.namespace_to_model.get(prefix)
    }

    /// Look up a class of either kind by qualified name.
    pub fn class(&self, kind: ClassKind, name: &str) -> Option<&ClassDef> {
        self.model_for_name(name)?.class(kind, name)
    }

    /// Look up a type by qualified name.
    pub fn get_type(&self, name: &str) -> Option<&ClassDef> {
        self.class(ClassKind::Type, name)
    }

    /// Look up an aspect by qualified name.
    pub fn get_aspect(&self, name: &str) -> Option<&ClassDef> {
        self.class(ClassKind::Aspect, name)
    }

    /// Look up a property by qualified name.
    pub fn get_property(&self, name: &str) -> Option<&Property> {
        self.model_for_name(name)?.get_property(name)
    }

    /// Look up a dynamic property by its exact wildcard name.
    pub fn get_dynamic_property(&self, name: &str) -> Option<&DynamicProperty> {
        self.model_for_name(name)?.get_dynamic_property(name)
    }

    /// Look up a constraint by qualified name.
    pub fn get_constraint(&self, name: &str) -> Option<&Constraint> {
        self.model_for_name(name)?.get_constraint(name)
    }

    /// Look up an association by qualified name.
    pub fn get_association(&self, name: &str) -> Option<&Association> {
        self.model_for_name(name)?.get_association(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Namespace;

    fn model(name: &str, prefix: &str, uri: &str) -> Arc<Model> {
        Arc::new(Model {
            name: name.to_string(),
            namespaces: vec![Namespace::new(prefix, uri)],
            ..Default::default()
        })
    }

    #[test]
    fn registration_binds_prefix_and_uri_both_ways() {
        let graph = TenantGraph::new("acme")
            .with_model(model("acme:m", "acme", "http://acme.example/1.0"))
            .unwrap();

        assert!(graph.owns_prefix("acme"));
        assert_eq!(graph.uri_for_prefix("acme"), Some("http://acme.example/1.0"));
        assert_eq!(graph.prefix_for_uri("http://acme.example/1.0"), Some("acme"));
        assert_eq!(graph.model_for_prefix("acme").unwrap().name, "acme:m");
    }

    #[test]
    fn conflicting_prefix_is_rejected() {
        let graph = TenantGraph::new("acme")
            .with_model(model("acme:m", "acme", "http://acme.example/1.0"))
            .unwrap();
        let err = graph
            .with_model(model("other:m", "acme", "http://other.example/1.0"))
            .unwrap_err();

        assert!(matches!(err, ValidationError::NamespaceForbidden { .. }));
    }

    #[test]
    fn conflicting_uri_is_rejected() {
        let graph = TenantGraph::new("acme")
            .with_model(model("acme:m", "acme", "http://acme.example/1.0"))
            .unwrap();
        let err = graph
            .with_model(model("other:m", "other", "http://acme.example/1.0"))
            .unwrap_err();

        assert!(matches!(err, ValidationError::DuplicateNamespaceUri { .. }));
    }

    #[test]
    fn redeploy_replaces_the_model_wholesale() {
        let graph = TenantGraph::new("acme")
            .with_model(model("acme:m", "acme", "http://acme.example/1.0"))
            .unwrap();
        let graph = graph
            .with_model(model("acme:m", "acme", "http://acme.example/2.0"))
            .unwrap();

        assert_eq!(graph.namespace_count(), 1);
        assert_eq!(graph.uri_for_prefix("acme"), Some("http://acme.example/2.0"));
        assert_eq!(graph.prefix_for_uri("http://acme.example/1.0"), None);
    }

    #[test]
    fn without_model_drops_only_its_namespaces() {
        let graph = TenantGraph::new("acme")
            .with_model(model("acme:m", "acme", "http://acme.example/1.0"))
            .unwrap()
            .with_model(model("beta:m", "beta", "http://beta.example/1.0"))
            .unwrap();
        let graph = graph.without_model("acme:m");

        assert!(!graph.owns_prefix("acme"));
        assert!(graph.owns_prefix("beta"));
        assert_eq!(graph.prefix_for_uri("http://acme.example/1.0"), None);
    }

    #[test]
    fn lookups_resolve_through_the_owning_model() {
        let owner = Arc::new(Model {
            name: "acme:m".to_string(),
            namespaces: vec![Namespace::new("acme", "http://acme.example/1.0")],
            types: vec![ClassDef {
                name: "acme:doc".to_string(),
                parent: Some("sys:base".to_string()),
                ..Default::default()
            }],
            properties: vec![Property {
                name: "acme:title".to_string(),
                property_type: "d:text".to_string(),
                ..Default::default()
            }],
            ..Default::default()
        });
        let graph = TenantGraph::new("acme").with_model(owner).unwrap();

        assert!(graph.get_type("acme:doc").is_some());
        assert!(graph.get_aspect("acme:doc").is_none());
        assert!(graph.get_property("acme:title").is_some());
        assert!(graph.get_type("other:doc").is_none());
        assert!(graph.get_type("no-prefix").is_none());
    }
}
