//! Structural validation of candidate models.
//!
//! A model is validated against the tenant graph it is being deployed into
//! and the common graph beneath it, before anything is registered or
//! persisted. Validation is read-only and fail-fast: the first violation is
//! returned, in a fixed check order, so a broken model always fails the same
//! way. The checks:
//!
//! 1. the model has a name;
//! 2. its declared namespaces collide with nothing (same-name redeploys are
//!    allowed in the tenant graph, nothing may ever shadow the common graph);
//! 3. every imported prefix resolves to a registered model;
//! 4. constraint declarations are unique and owned by the model;
//! 5. properties: unique, owned, known data type, resolvable constraints;
//! 6. dynamic properties: the same, plus wildcard shape and stem ambiguity;
//! 7. types and aspects: unique, owned, parents and referenced properties
//!    and aspects all resolve, and every type except the root has a parent.

use std::collections::{HashMap, HashSet};

use crate::constraints::{ConstraintRegistry, kind};
use crate::error::{ValidationError, ValidationResult};
use crate::model::types::{ClassDef, ClassKind, DataType, Model, split_name};
use crate::registry::TenantGraph;

/// Map from visible prefix to the model that owns it; the candidate's own
/// prefixes always map to the candidate.
type ImportMap<'v> = HashMap<&'v str, &'v Model>;

/// Validates candidate models before deployment.
pub struct ModelValidator<'a> {
    constraints: &'a ConstraintRegistry,
    root_type: &'a str,
}

impl<'a> ModelValidator<'a> {
    /// Create a validator; `root_type` is the single type name allowed to
    /// omit a parent.
    pub fn new(constraints: &'a ConstraintRegistry, root_type: &'a str) -> Self {
        Self {
            constraints,
            root_type,
        }
    }

    /// Validate a candidate against the current tenant and common graphs.
    ///
    /// For a deploy into the common graph itself, pass the common graph as
    /// `tenant` and an empty graph as `common`.
    pub fn validate(
        &self,
        model: &Model,
        tenant: &TenantGraph,
        common: &TenantGraph,
    ) -> ValidationResult<()> {
        if model.name.trim().is_empty() {
            return Err(ValidationError::AnonymousModel);
        }
        self.check_namespaces(model, tenant, common)?;
        let imports = self.build_import_map(model, tenant, common)?;
        self.check_constraint_declarations(model)?;
        self.check_properties(model, &imports)?;
        self.check_dynamic_properties(model, &imports)?;
        self.check_classes(model, &imports)?;
        Ok(())
    }

    fn check_namespaces(
        &self,
        model: &Model,
        tenant: &TenantGraph,
        common: &TenantGraph,
    ) -> ValidationResult<()> {
        let mut declared = HashSet::new();
        for ns in &model.namespaces {
            if !declared.insert(ns.prefix.as_str()) {
                return Err(ValidationError::duplicate("namespace", &ns.prefix));
            }
            // Redeploys keep their own prefixes; anything else is a clash.
            if let Some(owner) = tenant.model_for_prefix(&ns.prefix) {
                if owner.name != model.name {
                    return Err(ValidationError::NamespaceForbidden {
                        prefix: ns.prefix.clone(),
                        owner: owner.name.clone(),
                    });
                }
            }
            if let Some(prefix) = tenant.prefix_for_uri(&ns.uri) {
                let owner = tenant.model_for_prefix(prefix);
                if owner.map(|m| m.name.as_str()) != Some(model.name.as_str()) {
                    return Err(ValidationError::DuplicateNamespaceUri {
                        uri: ns.uri.clone(),
                        prefix: prefix.to_string(),
                    });
                }
            }
            // The common graph can never be shadowed, same name or not.
            if let Some(owner) = common.model_for_prefix(&ns.prefix) {
                return Err(ValidationError::NamespaceForbidden {
                    prefix: ns.prefix.clone(),
                    owner: owner.name.clone(),
                });
            }
            if let Some(prefix) = common.prefix_for_uri(&ns.uri) {
                return Err(ValidationError::DuplicateNamespaceUri {
                    uri: ns.uri.clone(),
                    prefix: prefix.to_string(),
                });
            }
        }
        Ok(())
    }

    fn build_import_map<'v>(
        &self,
        model: &'v Model,
        tenant: &'v TenantGraph,
        common: &'v TenantGraph,
    ) -> ValidationResult<ImportMap<'v>> {
        let mut imports: ImportMap<'v> = HashMap::new();
        for ns in &model.namespaces {
            imports.insert(ns.prefix.as_str(), model);
        }
        for prefix in &model.imports {
            if imports.contains_key(prefix.as_str()) {
                continue;
            }
            let resolved = tenant
                .model_for_prefix(prefix)
                .or_else(|| common.model_for_prefix(prefix));
            match resolved {
                Some(owner) => {
                    imports.insert(prefix.as_str(), owner.as_ref());
                }
                None => {
                    return Err(ValidationError::UnresolvedImport {
                        model: model.name.clone(),
                        prefix: prefix.clone(),
                    });
                }
            }
        }
        Ok(imports)
    }

    fn check_constraint_declarations(&self, model: &Model) -> ValidationResult<()> {
        let mut seen = HashSet::new();
        for constraint in &model.constraints {
            if !seen.insert(constraint.name.as_str()) {
                return Err(ValidationError::duplicate("constraint", &constraint.name));
            }
            let (prefix, _) = split_name(&constraint.name).ok_or_else(|| {
                ValidationError::MalformedName {
                    name: constraint.name.clone(),
                }
            })?;
            if !model.owns_prefix(prefix) {
                return Err(ValidationError::ForeignNamespace {
                    name: constraint.name.clone(),
                    prefix: prefix.to_string(),
                });
            }
        }
        Ok(())
    }

    fn check_properties(&self, model: &Model, imports: &ImportMap<'_>) -> ValidationResult<()> {
        let mut seen = HashSet::new();
        for property in &model.properties {
            if !seen.insert(property.name.as_str()) {
                return Err(ValidationError::duplicate("property", &property.name));
            }
            self.check_property_shape(
                model,
                imports,
                &property.name,
                &property.property_type,
                &property.constraints,
            )?;
        }
        Ok(())
    }

    fn check_dynamic_properties(
        &self,
        model: &Model,
        imports: &ImportMap<'_>,
    ) -> ValidationResult<()> {
        let mut seen = HashSet::new();
        for dynamic in &model.dynamic_properties {
            if !seen.insert(dynamic.name()) {
                return Err(ValidationError::duplicate("dynamic property", dynamic.name()));
            }
            if !dynamic.has_valid_pattern() {
                return Err(ValidationError::MalformedWildcard {
                    name: dynamic.name().to_string(),
                });
            }
            self.check_property_shape(
                model,
                imports,
                dynamic.name(),
                &dynamic.property.property_type,
                &dynamic.property.constraints,
            )?;
        }
        for (i, a) in model.dynamic_properties.iter().enumerate() {
            for b in model.dynamic_properties.iter().skip(i + 1) {
                let (sa, sb) = (a.stem(), b.stem());
                if sa != sb && (sa.starts_with(sb) || sb.starts_with(sa)) {
                    return Err(ValidationError::AmbiguousWildcard {
                        name: a.name().to_string(),
                        other: b.name().to_string(),
                    });
                }
            }
        }
        Ok(())
    }

    /// Checks shared by concrete and dynamic properties: owning namespace,
    /// data type, and constraint references.
    fn check_property_shape(
        &self,
        model: &Model,
        imports: &ImportMap<'_>,
        name: &str,
        declared_type: &str,
        constraint_refs: &[String],
    ) -> ValidationResult<()> {
        let (prefix, _) = split_name(name).ok_or_else(|| ValidationError::MalformedName {
            name: name.to_string(),
        })?;
        if !model.owns_prefix(prefix) {
            return Err(ValidationError::ForeignNamespace {
                name: name.to_string(),
                prefix: prefix.to_string(),
            });
        }

        let unknown_type = || ValidationError::UnknownPropertyType {
            property: name.to_string(),
            declared: declared_type.to_string(),
        };
        let (type_prefix, type_local) = split_name(declared_type).ok_or_else(unknown_type)?;
        if !imports.contains_key(type_prefix) {
            return Err(unknown_type());
        }
        let data_type = DataType::from_local(type_local).ok_or_else(unknown_type)?;
        if data_type.is_deprecated() {
            log::warn!(
                "Property '{}' uses deprecated data type '{}'",
                name,
                declared_type
            );
        }

        for reference in constraint_refs {
            let unresolved = || ValidationError::UnresolvedConstraint {
                property: name.to_string(),
                constraint: reference.clone(),
            };
            let (cprefix, _) = split_name(reference).ok_or_else(unresolved)?;
            let owner = imports.get(cprefix).ok_or_else(unresolved)?;
            let declaration = owner.get_constraint(reference).ok_or_else(unresolved)?;
            if !self.constraints.contains(&declaration.constraint_type) {
                return Err(ValidationError::UnknownConstraintKind {
                    constraint: declaration.name.clone(),
                    kind: declaration.constraint_type.clone(),
                });
            }
            if declaration.constraint_type == kind::CLASS {
                let class = declaration.param_str("class").unwrap_or_default();
                if !self.constraints.has_class(class) {
                    return Err(ValidationError::UnregisteredConstraintClass {
                        constraint: declaration.name.clone(),
                        class: class.to_string(),
                    });
                }
            }
        }
        Ok(())
    }

    fn check_classes(&self, model: &Model, imports: &ImportMap<'_>) -> ValidationResult<()> {
        let mut seen = HashSet::new();
        let types = model.types.iter().map(|c| (ClassKind::Type, c));
        let aspects = model.aspects.iter().map(|c| (ClassKind::Aspect, c));
        for (class_kind, class) in types.chain(aspects) {
            // Types and aspects share one name space.
            if !seen.insert(class.name.as_str()) {
                return Err(ValidationError::duplicate("class", &class.name));
            }
            let (prefix, _) =
                split_name(&class.name).ok_or_else(|| ValidationError::MalformedName {
                    name: class.name.clone(),
                })?;
            if !model.owns_prefix(prefix) {
                return Err(ValidationError::ForeignNamespace {
                    name: class.name.clone(),
                    prefix: prefix.to_string(),
                });
            }
            self.check_parent(class, class_kind, imports)?;

            for property in class
                .mandatory_properties
                .iter()
                .chain(class.suggested_properties.iter())
            {
                let unresolved = || ValidationError::UnresolvedPropertyReference {
                    class: class.name.clone(),
                    property: property.clone(),
                };
                let (pprefix, _) = split_name(property).ok_or_else(unresolved)?;
                let owner = imports.get(pprefix).ok_or_else(unresolved)?;
                if owner.get_property(property).is_none() {
                    return Err(unresolved());
                }
            }

            for aspect in &class.mandatory_aspects {
                let unresolved = || ValidationError::UnresolvedAspectReference {
                    class: class.name.clone(),
                    aspect: aspect.clone(),
                };
                let (aprefix, _) = split_name(aspect).ok_or_else(unresolved)?;
                let owner = imports.get(aprefix).ok_or_else(unresolved)?;
                if owner.get_aspect(aspect).is_none() {
                    return Err(unresolved());
                }
            }
        }
        Ok(())
    }

    fn check_parent(
        &self,
        class: &ClassDef,
        class_kind: ClassKind,
        imports: &ImportMap<'_>,
    ) -> ValidationResult<()> {
        let parent = class
            .parent
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty());
        let Some(parent) = parent else {
            // Aspects may stand alone; only the root type may.
            if class_kind == ClassKind::Type && class.name != self.root_type {
                return Err(ValidationError::MissingParent {
                    class: class.name.clone(),
                });
            }
            return Ok(());
        };
        let unresolved = || ValidationError::UnresolvedParent {
            class: class.name.clone(),
            parent: parent.to_string(),
        };
        let (prefix, _) = split_name(parent).ok_or_else(unresolved)?;
        let owner = imports.get(prefix).ok_or_else(unresolved)?;
        if owner.class(class_kind, parent).is_none() {
            return Err(unresolved());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::types::{Constraint, DynamicProperty, Namespace, Property};
    use std::sync::Arc;

    fn dictionary() -> Arc<Model> {
        Arc::new(Model {
            name: "d:dictionary".to_string(),
            namespaces: vec![Namespace::new("d", "http://example.com/model/dictionary/1.0")],
            ..Default::default()
        })
    }

    fn system() -> Arc<Model> {
        Arc::new(Model {
            name: "sys:system".to_string(),
            namespaces: vec![Namespace::new("sys", "http://example.com/model/system/1.0")],
            types: vec![ClassDef {
                name: "sys:base".to_string(),
                ..Default::default()
            }],
            ..Default::default()
        })
    }

    fn common_graph() -> TenantGraph {
        TenantGraph::new("")
            .with_model(dictionary())
            .unwrap()
            .with_model(system())
            .unwrap()
    }

    fn property(name: &str, property_type: &str) -> Property {
        Property {
            name: name.to_string(),
            property_type: property_type.to_string(),
            ..Default::default()
        }
    }

    fn candidate() -> Model {
        Model {
            name: "t:docs".to_string(),
            namespaces: vec![Namespace::new("t", "http://tenant.example/model/docs/1.0")],
            imports: vec!["d".to_string(), "sys".to_string()],
            ..Default::default()
        }
    }

    fn validate(model: &Model) -> ValidationResult<()> {
        let registry = ConstraintRegistry::new();
        let validator = ModelValidator::new(&registry, "sys:base");
        validator.validate(model, &TenantGraph::new("acme"), &common_graph())
    }

    #[test]
    fn anonymous_model_is_rejected() {
        let mut model = candidate();
        model.name = "  ".to_string();
        assert!(matches!(validate(&model), Err(ValidationError::AnonymousModel)));
    }

    #[test]
    fn common_prefix_cannot_be_redeclared() {
        let mut model = candidate();
        model
            .namespaces
            .push(Namespace::new("d", "http://tenant.example/model/other/1.0"));
        assert!(matches!(
            validate(&model),
            Err(ValidationError::NamespaceForbidden { .. })
        ));
    }

    #[test]
    fn unresolved_import_is_rejected() {
        let mut model = candidate();
        model.imports.push("missing".to_string());
        let err = validate(&model).unwrap_err();
        assert!(matches!(err, ValidationError::UnresolvedImport { .. }));
    }

    #[test]
    fn duplicate_property_name_is_rejected() {
        let mut model = candidate();
        model.properties.push(property("t:title", "d:text"));
        model.properties.push(property("t:title", "d:text"));
        assert!(matches!(
            validate(&model),
            Err(ValidationError::DuplicateName { .. })
        ));
    }

    #[test]
    fn property_under_foreign_prefix_is_rejected() {
        let mut model = candidate();
        model.properties.push(property("d:rogue", "d:text"));
        assert!(matches!(
            validate(&model),
            Err(ValidationError::ForeignNamespace { .. })
        ));
    }

    #[test]
    fn unknown_data_type_is_rejected() {
        let mut model = candidate();
        model.properties.push(property("t:title", "d:blob"));
        assert!(matches!(
            validate(&model),
            Err(ValidationError::UnknownPropertyType { .. })
        ));

        let mut model = candidate();
        model.properties.push(property("t:title", "x:text"));
        assert!(matches!(
            validate(&model),
            Err(ValidationError::UnknownPropertyType { .. })
        ));
    }

    #[test]
    fn constraint_reference_must_resolve_to_declaration() {
        let mut model = candidate();
        let mut p = property("t:status", "d:text");
        p.constraints.push("t:statusValues".to_string());
        model.properties.push(p);
        assert!(matches!(
            validate(&model),
            Err(ValidationError::UnresolvedConstraint { .. })
        ));

        model.constraints.push(Constraint {
            name: "t:statusValues".to_string(),
            constraint_type: "ENUM".to_string(),
            parameters: serde_json::Map::new(),
        });
        assert!(validate(&model).is_ok());
    }

    #[test]
    fn constraint_with_unknown_kind_is_rejected() {
        let mut model = candidate();
        let mut p = property("t:status", "d:text");
        p.constraints.push("t:odd".to_string());
        model.properties.push(p);
        model.constraints.push(Constraint {
            name: "t:odd".to_string(),
            constraint_type: "LENGTH".to_string(),
            parameters: serde_json::Map::new(),
        });
        assert!(matches!(
            validate(&model),
            Err(ValidationError::UnknownConstraintKind { .. })
        ));
    }

    #[test]
    fn class_constraint_requires_registered_implementation() {
        let mut model = candidate();
        let mut p = property("t:code", "d:text");
        p.constraints.push("t:codeCheck".to_string());
        model.properties.push(p);
        let mut parameters = serde_json::Map::new();
        parameters.insert(
            "class".to_string(),
            serde_json::Value::String("acme.CodeCheck".to_string()),
        );
        model.constraints.push(Constraint {
            name: "t:codeCheck".to_string(),
            constraint_type: "CLASS".to_string(),
            parameters,
        });

        assert!(matches!(
            validate(&model),
            Err(ValidationError::UnregisteredConstraintClass { .. })
        ));

        let mut registry = ConstraintRegistry::new();
        struct Accept;
        impl crate::constraints::ConstraintValidator for Accept {
            fn validate(
                &self,
                _c: &Constraint,
                _v: &serde_json::Value,
            ) -> Result<(), crate::constraints::ConstraintViolation> {
                Ok(())
            }
        }
        registry.register_class("acme.CodeCheck", Arc::new(Accept));
        let validator = ModelValidator::new(&registry, "sys:base");
        assert!(
            validator
                .validate(&model, &TenantGraph::new("acme"), &common_graph())
                .is_ok()
        );
    }

    #[test]
    fn wildcard_shape_is_enforced() {
        let cases = [
            ("t:abc*d", false),
            ("t:ab**", false),
            ("t:abc", false),
            ("t:abc*", true),
        ];
        for (name, ok) in cases {
            let mut model = candidate();
            model.dynamic_properties.push(DynamicProperty {
                property: property(name, "d:text"),
                predefined: false,
            });
            let result = validate(&model);
            if ok {
                assert!(result.is_ok(), "{name} should pass: {result:?}");
            } else {
                assert!(
                    matches!(result, Err(ValidationError::MalformedWildcard { .. })),
                    "{name} should fail as malformed"
                );
            }
        }
    }

    #[test]
    fn overlapping_wildcard_stems_are_rejected() {
        let mut model = candidate();
        model.dynamic_properties.push(DynamicProperty {
            property: property("t:a*", "d:text"),
            predefined: false,
        });
        model.dynamic_properties.push(DynamicProperty {
            property: property("t:ab*", "d:text"),
            predefined: false,
        });
        assert!(matches!(
            validate(&model),
            Err(ValidationError::AmbiguousWildcard { .. })
        ));
    }

    #[test]
    fn non_root_type_requires_a_parent() {
        let mut model = candidate();
        model.types.push(ClassDef {
            name: "t:doc".to_string(),
            ..Default::default()
        });
        assert!(matches!(
            validate(&model),
            Err(ValidationError::MissingParent { .. })
        ));

        let mut model = candidate();
        model.types.push(ClassDef {
            name: "t:doc".to_string(),
            parent: Some("sys:base".to_string()),
            ..Default::default()
        });
        assert!(validate(&model).is_ok());
    }

    #[test]
    fn aspect_may_stand_alone() {
        let mut model = candidate();
        model.aspects.push(ClassDef {
            name: "t:audited".to_string(),
            ..Default::default()
        });
        assert!(validate(&model).is_ok());
    }

    #[test]
    fn type_parent_must_be_a_type() {
        let mut model = candidate();
        model.aspects.push(ClassDef {
            name: "t:audited".to_string(),
            ..Default::default()
        });
        model.types.push(ClassDef {
            name: "t:doc".to_string(),
            parent: Some("t:audited".to_string()),
            ..Default::default()
        });
        assert!(matches!(
            validate(&model),
            Err(ValidationError::UnresolvedParent { .. })
        ));
    }

    #[test]
    fn mandatory_aspect_must_resolve() {
        let mut model = candidate();
        model.types.push(ClassDef {
            name: "t:doc".to_string(),
            parent: Some("sys:base".to_string()),
            mandatory_aspects: vec!["t:gone".to_string()],
            ..Default::default()
        });
        assert!(matches!(
            validate(&model),
            Err(ValidationError::UnresolvedAspectReference { .. })
        ));
    }

    #[test]
    fn mandatory_property_must_resolve() {
        let mut model = candidate();
        model.types.push(ClassDef {
            name: "t:doc".to_string(),
            parent: Some("sys:base".to_string()),
            mandatory_properties: vec!["t:title".to_string()],
            ..Default::default()
        });
        assert!(matches!(
            validate(&model),
            Err(ValidationError::UnresolvedPropertyReference { .. })
        ));

        model.properties.push(property("t:title", "d:text"));
        assert!(validate(&model).is_ok());
    }

    #[test]
    fn redeploy_into_tenant_graph_is_allowed() {
        let registry = ConstraintRegistry::new();
        let validator = ModelValidator::new(&registry, "sys:base");
        let model = candidate();
        let tenant = TenantGraph::new("acme")
            .with_model(Arc::new(model.clone()))
            .unwrap();
        assert!(validator.validate(&model, &tenant, &common_graph()).is_ok());
    }
}
