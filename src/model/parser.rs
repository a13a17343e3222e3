//! Parsing of stored model documents.
//!
//! Two source formats produce the same [`Model`]:
//!
//! - **compact**: the engine's own JSON shape, deserialized directly.
//! - **definition**: the verbose model-definition document exported by the
//!   repository tools. Property definitions are nested inside their class
//!   there; the walker hoists each one to a model-level [`Property`] and
//!   leaves only its name on the class (`mandatory: true` lands in
//!   `mandatory_properties`, everything else in `suggested_properties`).
//!
//! Records with an unrecognized format tag are skipped, not failed, so one
//! odd record never blocks a batch load. After either walk, [`remap`]
//! normalization runs: system-marker names become managed, and constraint
//! kinds are checked against the registry (unknown legacy-vendor kinds are
//! downgraded to `NONE`, other unknown kinds fail the parse).
//!
//! [`remap`]: ModelParser::parse_source

use serde_json::{Map, Value};

use crate::constraints::{ConstraintRegistry, kind};
use crate::error::{ParseError, ParseResult};
use crate::model::types::{
    Association, ClassDef, Constraint, DynamicProperty, Model, Namespace, Property,
    SYSTEM_NAME_MARKER, split_name,
};
use crate::storage::ModelRecord;

/// Source formats of a stored model document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelFormat {
    /// Direct JSON shape of [`Model`]
    Compact,
    /// Verbose model-definition document with nested properties
    Definition,
}

impl ModelFormat {
    /// Map a record's format tag to a format, case-insensitively.
    ///
    /// Unknown tags yield `None`; the caller decides whether that means
    /// skip (batch load) or error (explicit deploy).
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag.trim().to_ascii_lowercase().as_str() {
            "compact" => Some(Self::Compact),
            "definition" => Some(Self::Definition),
            _ => None,
        }
    }

    /// Canonical format tag.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Compact => "compact",
            Self::Definition => "definition",
        }
    }
}

/// Parses stored model documents into [`Model`] values.
///
/// Holds a borrow of the constraint registry so constraint kind tags can be
/// checked and legacy kinds downgraded during normalization.
pub struct ModelParser<'a> {
    constraints: &'a ConstraintRegistry,
}

impl<'a> ModelParser<'a> {
    /// Create a parser over the given constraint registry.
    pub fn new(constraints: &'a ConstraintRegistry) -> Self {
        Self { constraints }
    }

    /// Parse one stored record.
    ///
    /// Returns `Ok(None)` when the record's format tag is unknown; batch
    /// loads log and move on.
    pub fn parse(&self, record: &ModelRecord) -> ParseResult<Option<Model>> {
        let Some(format) = ModelFormat::from_tag(&record.format) else {
            log::debug!(
                "Skipping model '{}' with unrecognized format '{}'",
                record.name,
                record.format
            );
            return Ok(None);
        };
        self.parse_source(&record.data, format).map(Some)
    }

    /// Parse raw document text in a known format, then normalize.
    pub fn parse_source(&self, data: &str, format: ModelFormat) -> ParseResult<Model> {
        let mut model = match format {
            ModelFormat::Compact => serde_json::from_str(data)?,
            ModelFormat::Definition => self.parse_definition(data)?,
        };
        self.remap(&mut model)?;
        Ok(model)
    }

    /// Walk a verbose model-definition document.
    fn parse_definition(&self, data: &str) -> ParseResult<Model> {
        let root: Value = serde_json::from_str(data)?;
        let doc = root.get("model").unwrap_or(&root);
        let doc = as_object(doc, "model")?;

        let mut model = Model {
            name: req_str(doc, "name", "model")?.to_string(),
            description: opt_string(doc, "description"),
            author: opt_string(doc, "author"),
            version: opt_string(doc, "version"),
            default_tokenization: opt_string(doc, "defaultTokenization"),
            ..Default::default()
        };

        for (i, item) in list(doc, "namespaces")?.iter().enumerate() {
            let ctx = format!("namespaces[{i}]");
            let obj = as_object(item, &ctx)?;
            model.namespaces.push(Namespace::new(
                req_str(obj, "prefix", &ctx)?,
                req_str(obj, "uri", &ctx)?,
            ));
        }

        for (i, item) in list(doc, "imports")?.iter().enumerate() {
            let ctx = format!("imports[{i}]");
            let prefix = match item {
                Value::String(prefix) => prefix.clone(),
                Value::Object(obj) => req_str(obj, "prefix", &ctx)?.to_string(),
                _ => return Err(ParseError::invalid(ctx, "expected a prefix")),
            };
            model.imports.push(prefix);
        }

        for (i, item) in list(doc, "constraints")?.iter().enumerate() {
            let ctx = format!("constraints[{i}]");
            let obj = as_object(item, &ctx)?;
            model.constraints.push(Constraint {
                name: req_str(obj, "name", &ctx)?.to_string(),
                constraint_type: req_str(obj, "type", &ctx)?.to_string(),
                parameters: obj
                    .get("parameters")
                    .and_then(Value::as_object)
                    .cloned()
                    .unwrap_or_default(),
            });
        }

        self.parse_classes(doc, "types", &mut model)?;
        self.parse_classes(doc, "aspects", &mut model)?;

        for (i, item) in list(doc, "dynamicProperties")?.iter().enumerate() {
            let ctx = format!("dynamicProperties[{i}]");
            let (property, _) = parse_property_def(item, &ctx)?;
            let predefined = item
                .get("predefined")
                .and_then(Value::as_bool)
                .unwrap_or(false);
            model
                .dynamic_properties
                .push(DynamicProperty { property, predefined });
        }

        for (i, item) in list(doc, "childAssociations")?.iter().enumerate() {
            let ctx = format!("childAssociations[{i}]");
            let obj = as_object(item, &ctx)?;
            model.associations.push(Association {
                name: req_str(obj, "name", &ctx)?.to_string(),
                parent_type: req_str(obj, "parent", &ctx)?.to_string(),
                child_type: req_str(obj, "child", &ctx)?.to_string(),
                light: false,
            });
        }

        Ok(model)
    }

    /// Walk one class list, hoisting nested property definitions.
    fn parse_classes(
        &self,
        doc: &Map<String, Value>,
        key: &'static str,
        model: &mut Model,
    ) -> ParseResult<()> {
        for (i, item) in list(doc, key)?.iter().enumerate() {
            let ctx = format!("{key}[{i}]");
            let obj = as_object(item, &ctx)?;
            let mut class = ClassDef {
                name: req_str(obj, "name", &ctx)?.to_string(),
                parent: opt_string(obj, "parent"),
                title: opt_string(obj, "title"),
                managed: opt_bool(obj, "managed", false),
                hidden: opt_bool(obj, "hidden", false),
                ..Default::default()
            };
            for (j, item) in list(obj, "properties")?.iter().enumerate() {
                let pctx = format!("{ctx}.properties[{j}]");
                let (property, mandatory) = parse_property_def(item, &pctx)?;
                if mandatory {
                    class.mandatory_properties.push(property.name.clone());
                } else {
                    class.suggested_properties.push(property.name.clone());
                }
                model.properties.push(property);
            }
            for (j, item) in list(obj, "mandatoryAspects")?.iter().enumerate() {
                let actx = format!("{ctx}.mandatoryAspects[{j}]");
                let name = item
                    .as_str()
                    .ok_or_else(|| ParseError::invalid(actx, "expected an aspect name"))?;
                class.mandatory_aspects.push(name.to_string());
            }
            if key == "types" {
                model.types.push(class);
            } else {
                model.aspects.push(class);
            }
        }
        Ok(())
    }

    /// Post-parse normalization shared by both formats.
    ///
    /// Forces `managed` on system-marker names and reconciles constraint
    /// kind tags with the registry.
    fn remap(&self, model: &mut Model) -> ParseResult<()> {
        for class in model.types.iter_mut().chain(model.aspects.iter_mut()) {
            if is_system_name(&class.name) {
                class.managed = true;
            }
        }
        for property in &mut model.properties {
            if is_system_name(&property.name) {
                property.managed = true;
            }
        }
        for dynamic in &mut model.dynamic_properties {
            if is_system_name(&dynamic.property.name) {
                dynamic.property.managed = true;
            }
        }

        let declared = std::mem::take(&mut model.constraints);
        for mut constraint in declared {
            let tag = constraint.constraint_type.trim().to_string();
            let upper = tag.to_ascii_uppercase();
            if self.constraints.contains(&tag) {
                constraint.constraint_type = tag;
            } else if self.constraints.contains(&upper) {
                constraint.constraint_type = upper;
            } else if self.constraints.is_legacy_kind(&tag) {
                log::warn!(
                    "Downgrading constraint '{}' with legacy kind '{}' to {}",
                    constraint.name,
                    tag,
                    kind::NONE
                );
                constraint.constraint_type = kind::NONE.to_string();
            } else {
                return Err(ParseError::UnknownConstraintType {
                    constraint: constraint.name,
                    kind: tag,
                });
            }
            model.constraints.push(constraint);
        }
        Ok(())
    }
}

fn is_system_name(name: &str) -> bool {
    matches!(split_name(name), Some((_, local)) if local.starts_with(SYSTEM_NAME_MARKER))
}

/// Parse one nested property definition; the bool is its `mandatory` flag.
fn parse_property_def(value: &Value, ctx: &str) -> ParseResult<(Property, bool)> {
    let obj = as_object(value, ctx)?;
    let mut property = Property {
        name: req_str(obj, "name", ctx)?.to_string(),
        property_type: req_str(obj, "type", ctx)?.to_string(),
        ..Default::default()
    };
    property.multiple = opt_bool(obj, "multiple", false);
    property.managed = opt_bool(obj, "managed", false);
    property.hidden = opt_bool(obj, "hidden", false);
    property.opaque = opt_bool(obj, "opaque", false);
    property.default_value = obj.get("default").cloned();

    if let Some(index) = obj.get("index") {
        let ictx = format!("{ctx}.index");
        let index = as_object(index, &ictx)?;
        property.indexed = opt_bool(index, "enabled", true);
        property.stored = opt_bool(index, "stored", false);
        property.tokenized = opt_bool(index, "tokenized", true);
        property.reverse_tokenized = opt_bool(index, "reverseTokenized", false);
    }

    for (i, item) in list(obj, "constraints")?.iter().enumerate() {
        let cctx = format!("{ctx}.constraints[{i}]");
        let name = item
            .as_str()
            .ok_or_else(|| ParseError::invalid(cctx, "expected a constraint name"))?;
        property.constraints.push(name.to_string());
    }

    let mandatory = opt_bool(obj, "mandatory", false);
    Ok((property, mandatory))
}

fn as_object<'v>(value: &'v Value, ctx: &str) -> ParseResult<&'v Map<String, Value>> {
    value
        .as_object()
        .ok_or_else(|| ParseError::invalid(ctx, "expected an object"))
}

fn req_str<'v>(obj: &'v Map<String, Value>, key: &str, ctx: &str) -> ParseResult<&'v str> {
    let value = obj
        .get(key)
        .ok_or_else(|| ParseError::missing(key, ctx))?;
    value
        .as_str()
        .ok_or_else(|| ParseError::invalid(format!("{ctx}.{key}"), "expected a string"))
}

fn opt_string(obj: &Map<String, Value>, key: &str) -> Option<String> {
    obj.get(key).and_then(Value::as_str).map(str::to_string)
}

fn opt_bool(obj: &Map<String, Value>, key: &str, default: bool) -> bool {
    obj.get(key).and_then(Value::as_bool).unwrap_or(default)
}

fn list<'v>(obj: &'v Map<String, Value>, key: &str) -> ParseResult<&'v [Value]> {
    match obj.get(key) {
        None => Ok(&[]),
        Some(Value::Array(items)) => Ok(items.as_slice()),
        Some(_) => Err(ParseError::invalid(key, "expected an array")),
    }
}
