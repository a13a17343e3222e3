//! Ordered schema resolution over a list of tenant graphs.
//!
//! A [`SchemaChain`] is built per request from `Arc` snapshots, most
//! specific graph first (tenant, then common). Every lookup walks the list
//! and returns the first hit, so a tenant definition shadows a common one
//! with the same name; a miss is `None`, never an error.
//!
//! Flattening is the one place where a missing entity *is* an error: the
//! effective shape of a class unions the property and aspect sets of its
//! whole parent lineage, and every name on that path must resolve. The
//! traversal carries a visited set, so a cyclic hierarchy fails with
//! [`ValidationError::CyclicHierarchy`] instead of recursing forever, while
//! an aspect reachable twice over different paths merges once.

use std::collections::HashSet;
use std::sync::Arc;

use crate::error::{ValidationError, ValidationResult};
use crate::model::{
    Association, ClassDef, ClassKind, Constraint, DynamicProperty, Model, Property,
};
use crate::registry::graph::TenantGraph;

/// Ordered, first-match-wins view over tenant graphs.
#[derive(Debug, Clone, Default)]
pub struct SchemaChain {
    graphs: Vec<Arc<TenantGraph>>,
}

impl SchemaChain {
    /// Build a chain; graphs are consulted in the given order.
    pub fn new(graphs: Vec<Arc<TenantGraph>>) -> Self {
        Self { graphs }
    }

    /// A chain over a single graph.
    pub fn single(graph: Arc<TenantGraph>) -> Self {
        Self {
            graphs: vec![graph],
        }
    }

    /// The graphs in resolution order.
    pub fn graphs(&self) -> &[Arc<TenantGraph>] {
        &self.graphs
    }

    /// Look up a class of either kind, first match wins.
    pub fn class(&self, kind: ClassKind, name: &str) -> Option<&ClassDef> {
        self.graphs.iter().find_map(|g| g.class(kind, name))
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
        self.graphs.iter().find_map(|g| g.get_property(name))
    }

    /// Look up a dynamic property by its exact wildcard name.
    pub fn get_dynamic_property(&self, name: &str) -> Option<&DynamicProperty> {
        self.graphs.iter().find_map(|g| g.get_dynamic_property(name))
    }

    /// Look up a constraint by qualified name.
    pub fn get_constraint(&self, name: &str) -> Option<&Constraint> {
        self.graphs.iter().find_map(|g| g.get_constraint(name))
    }

    /// Look up an association by qualified name.
    pub fn get_association(&self, name: &str) -> Option<&Association> {
        self.graphs.iter().find_map(|g| g.get_association(name))
    }

    /// The model owning a prefix, first match wins.
    pub fn resolve_prefix(&self, prefix: &str) -> Option<&Arc<Model>> {
        self.graphs.iter().find_map(|g| g.model_for_prefix(prefix))
    }

    /// The prefix bound to a URI, first match wins.
    pub fn prefix_for_uri(&self, uri: &str) -> Option<&str> {
        self.graphs.iter().find_map(|g| g.prefix_for_uri(uri))
    }

    /// The URI bound to a prefix, first match wins.
    pub fn uri_for_prefix(&self, prefix: &str) -> Option<&str> {
        self.graphs.iter().find_map(|g| g.uri_for_prefix(prefix))
    }

    /// Distinct visible models; a tenant model shadows a common one with the
    /// same name.
    pub fn models(&self) -> Vec<Arc<Model>> {
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        for graph in &self.graphs {
            for model in graph.models() {
                if seen.insert(model.name.clone()) {
                    out.push(model);
                }
            }
        }
        out
    }

    /// The effective shape of a type, with extra applied aspects merged in.
    ///
    /// `ancestors` of the result lists the parent lineage nearest-first and
    /// excludes the type itself; `mandatory_aspects` holds the transitive
    /// closure of every aspect encountered.
    pub fn flat_type(&self, name: &str, extra_aspects: &[String]) -> ValidationResult<ClassDef> {
        Flattener::run(self, ClassKind::Type, name, extra_aspects)
    }

    /// The effective shape of an aspect.
    pub fn flat_aspect(&self, name: &str) -> ValidationResult<ClassDef> {
        Flattener::run(self, ClassKind::Aspect, name, &[])
    }
}

/// Two-color DFS over a class hierarchy: `visiting` holds the current walk
/// stack (revisit = cycle), `merged` the completed classes (revisit = skip).
struct Flattener<'c> {
    chain: &'c SchemaChain,
    visiting: HashSet<String>,
    merged: HashSet<String>,
    flat: ClassDef,
}

impl<'c> Flattener<'c> {
    fn run(
        chain: &'c SchemaChain,
        kind: ClassKind,
        name: &str,
        extra_aspects: &[String],
    ) -> ValidationResult<ClassDef> {
        let target = chain
            .class(kind, name)
            .ok_or_else(|| ValidationError::unknown_class(name))?;
        let mut flattener = Self {
            chain,
            visiting: HashSet::new(),
            merged: HashSet::new(),
            flat: ClassDef {
                name: target.name.clone(),
                parent: target.parent.clone(),
                title: target.title.clone(),
                managed: target.managed,
                hidden: target.hidden,
                ..Default::default()
            },
        };
        flattener.walk(kind, target, true)?;
        for aspect in extra_aspects {
            flattener.merge_aspect(aspect)?;
        }
        Ok(flattener.flat)
    }

    fn walk(&mut self, kind: ClassKind, class: &'c ClassDef, lineage: bool) -> ValidationResult<()> {
        if self.visiting.contains(&class.name) {
            return Err(ValidationError::CyclicHierarchy {
                name: class.name.clone(),
            });
        }
        if self.merged.contains(&class.name) {
            return Ok(());
        }
        self.visiting.insert(class.name.clone());

        merge_names(&mut self.flat.mandatory_properties, &class.mandatory_properties);
        merge_names(&mut self.flat.suggested_properties, &class.suggested_properties);
        for aspect in &class.mandatory_aspects {
            self.merge_aspect(aspect)?;
        }

        if let Some(parent) = non_blank(class.parent.as_deref()) {
            let parent_def =
                self.chain
                    .class(kind, parent)
                    .ok_or_else(|| ValidationError::UnresolvedParent {
                        class: class.name.clone(),
                        parent: parent.to_string(),
                    })?;
            if lineage {
                self.flat.ancestors.push(parent_def.name.clone());
            }
            self.walk(kind, parent_def, lineage)?;
        }

        self.visiting.remove(&class.name);
        self.merged.insert(class.name.clone());
        Ok(())
    }

    fn merge_aspect(&mut self, name: &str) -> ValidationResult<()> {
        let aspect = self
            .chain
            .get_aspect(name)
            .ok_or_else(|| ValidationError::unknown_class(name))?;
        if !self.flat.mandatory_aspects.iter().any(|a| a == name) {
            self.flat.mandatory_aspects.push(name.to_string());
        }
        self.walk(ClassKind::Aspect, aspect, false)
    }
}

fn merge_names(into: &mut Vec<String>, from: &[String]) {
    for name in from {
        if !into.iter().any(|n| n == name) {
            into.push(name.clone());
        }
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|s| !s.is_empty())
}
