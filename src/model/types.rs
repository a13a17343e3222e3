//! Core type definitions for the content metamodel.
//!
//! This module contains the data structures that make up a content model:
//! namespaces, types, aspects, properties, constraints, and associations,
//! exactly as parsed from stored model documents. Flattened views of the
//! class hierarchy reuse [`ClassDef`] with its transitive fields filled in
//! (see [`crate::registry::SchemaChain`]).

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Entities whose local name starts with this marker are system-managed,
/// regardless of the `managed` flag in the source document.
pub const SYSTEM_NAME_MARKER: &str = "_";

/// Split a qualified name into its prefix and local part.
///
/// Returns `None` when either side is empty or the separator is missing;
/// such names are malformed everywhere in the model layer.
///
/// # Example
///
/// ```
/// use content_model_engine::model::split_name;
///
/// assert_eq!(split_name("cm:title"), Some(("cm", "title")));
/// assert_eq!(split_name("title"), None);
/// ```
pub fn split_name(name: &str) -> Option<(&str, &str)> {
    let (prefix, local) = name.split_once(':')?;
    if prefix.is_empty() || local.is_empty() {
        return None;
    }
    Some((prefix, local))
}

/// A namespace declaration binding a short prefix to a URI.
///
/// Every entity name in a model is addressed as `prefix:localName`; within
/// one tenant graph a prefix is owned by at most one model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Namespace {
    /// Short prefix used in qualified names
    pub prefix: String,
    /// Full namespace URI
    pub uri: String,
}

impl Namespace {
    /// Create a namespace declaration.
    pub fn new(prefix: impl Into<String>, uri: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            uri: uri.into(),
        }
    }
}

/// A complete content model as declared by one stored document.
///
/// A model declares namespaces it owns, imports prefixes from other models,
/// and defines types, aspects, properties, constraints, and associations
/// under its own namespaces.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Model {
    /// Qualified model name, e.g. `acme:contentModel`
    pub name: String,
    /// Human-readable description
    #[serde(default)]
    pub description: Option<String>,
    /// Document author
    #[serde(default)]
    pub author: Option<String>,
    /// Document version tag
    #[serde(default)]
    pub version: Option<String>,
    /// Namespaces owned by this model
    #[serde(default)]
    pub namespaces: Vec<Namespace>,
    /// Prefixes imported from other models
    #[serde(default)]
    pub imports: Vec<String>,
    /// Type definitions
    #[serde(default)]
    pub types: Vec<ClassDef>,
    /// Aspect definitions
    #[serde(default)]
    pub aspects: Vec<ClassDef>,
    /// Property definitions, model-level (classes reference them by name)
    #[serde(default)]
    pub properties: Vec<Property>,
    /// Wildcard property definitions
    #[serde(default)]
    pub dynamic_properties: Vec<DynamicProperty>,
    /// Named constraints referenced by properties
    #[serde(default)]
    pub constraints: Vec<Constraint>,
    /// Peer and child associations between types
    #[serde(default)]
    pub associations: Vec<Association>,
    /// Locale suffix for tokenized text index fields, e.g. `en`
    #[serde(default)]
    pub default_tokenization: Option<String>,
}

impl Model {
    /// True when this model declares the given namespace prefix.
    pub fn owns_prefix(&self, prefix: &str) -> bool {
        self.namespaces.iter().any(|ns| ns.prefix == prefix)
    }

    /// Iterate over the prefixes this model owns.
    pub fn prefixes(&self) -> impl Iterator<Item = &str> {
        self.namespaces.iter().map(|ns| ns.prefix.as_str())
    }

    /// Look up a class definition of the given kind by qualified name.
    pub fn class(&self, kind: ClassKind, name: &str) -> Option<&ClassDef> {
        let list = match kind {
            ClassKind::Type => &self.types,
            ClassKind::Aspect => &self.aspects,
        };
        list.iter().find(|c| c.name == name)
    }

    /// Look up a type definition by qualified name.
    pub fn get_type(&self, name: &str) -> Option<&ClassDef> {
        self.class(ClassKind::Type, name)
    }

    /// Look up an aspect definition by qualified name.
    pub fn get_aspect(&self, name: &str) -> Option<&ClassDef> {
        self.class(ClassKind::Aspect, name)
    }

    /// Look up a property definition by qualified name.
    pub fn get_property(&self, name: &str) -> Option<&Property> {
        self.properties.iter().find(|p| p.name == name)
    }

    /// Look up a dynamic property definition by its exact wildcard name.
    pub fn get_dynamic_property(&self, name: &str) -> Option<&DynamicProperty> {
        self.dynamic_properties
            .iter()
            .find(|p| p.property.name == name)
    }

    /// Look up a constraint definition by qualified name.
    pub fn get_constraint(&self, name: &str) -> Option<&Constraint> {
        self.constraints.iter().find(|c| c.name == name)
    }

    /// Look up an association definition by qualified name.
    pub fn get_association(&self, name: &str) -> Option<&Association> {
        self.associations.iter().find(|a| a.name == name)
    }
}

/// Discriminates the two class lists of a model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassKind {
    /// Primary, single-inheritance node types
    Type,
    /// Composable secondary characteristics
    Aspect,
}

impl ClassKind {
    /// Lowercase label for error messages and logs.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Type => "type",
            Self::Aspect => "aspect",
        }
    }
}

/// A type or aspect definition.
///
/// The raw, parsed form carries an empty `ancestors` list and only the
/// directly declared property and aspect names; the flattened form returned
/// by the schema chain fills `ancestors` with the parent lineage (nearest
/// first) and the name lists with the transitive union over that lineage.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassDef {
    /// Qualified class name
    pub name: String,
    /// Qualified parent name; only the root type may omit it
    #[serde(default)]
    pub parent: Option<String>,
    /// Human-readable title
    #[serde(default)]
    pub title: Option<String>,
    /// Properties a node of this class must carry
    #[serde(default)]
    pub mandatory_properties: Vec<String>,
    /// Properties a node of this class typically carries
    #[serde(default)]
    pub suggested_properties: Vec<String>,
    /// Aspects automatically applied with this class
    #[serde(default)]
    pub mandatory_aspects: Vec<String>,
    /// Parent lineage, nearest first; empty until flattened
    #[serde(default)]
    pub ancestors: Vec<String>,
    /// System-managed, not editable through the public surface
    #[serde(default)]
    pub managed: bool,
    /// Hidden from end-user listings
    #[serde(default)]
    pub hidden: bool,
}

/// A property definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Property {
    /// Qualified property name
    pub name: String,
    /// Qualified data type, e.g. `d:text`
    #[serde(rename = "type")]
    pub property_type: String,
    /// Whether the property holds a list of values
    #[serde(default)]
    pub multiple: bool,
    /// Whether the property is searchable at all
    #[serde(default = "default_true")]
    pub indexed: bool,
    /// Whether the raw value is stored in the index
    #[serde(default)]
    pub stored: bool,
    /// Whether text values are analyzed into tokens
    #[serde(default = "default_true")]
    pub tokenized: bool,
    /// Whether a reversed token stream is also produced
    #[serde(default)]
    pub reverse_tokenized: bool,
    /// System-managed flag
    #[serde(default)]
    pub managed: bool,
    /// Hidden from end-user listings
    #[serde(default)]
    pub hidden: bool,
    /// Value is opaque to the gateway (stored and returned verbatim)
    #[serde(default)]
    pub opaque: bool,
    /// Names of constraints applied to values of this property
    #[serde(default)]
    pub constraints: Vec<String>,
    /// Default value applied when a node omits the property
    #[serde(default)]
    pub default_value: Option<Value>,
}

impl Default for Property {
    fn default() -> Self {
        Self {
            name: String::new(),
            property_type: String::new(),
            multiple: false,
            indexed: true,
            stored: false,
            tokenized: true,
            reverse_tokenized: false,
            managed: false,
            hidden: false,
            opaque: false,
            constraints: Vec::new(),
            default_value: None,
        }
    }
}

impl Property {
    /// Resolve the local part of the qualified type to a [`DataType`].
    pub fn data_type(&self) -> Option<DataType> {
        let (_, local) = split_name(&self.property_type)?;
        DataType::from_local(local)
    }
}

fn default_true() -> bool {
    true
}

/// A wildcard property definition.
///
/// The name's local part ends in exactly one `*`; any node property whose
/// name matches the pattern takes this definition.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DynamicProperty {
    /// The underlying property definition, name included
    #[serde(flatten)]
    pub property: Property,
    /// Expected to have a matching index field already; reconciliation
    /// fails rather than creating one
    #[serde(default)]
    pub predefined: bool,
}

impl DynamicProperty {
    /// The wildcard name, e.g. `acme:custom*`.
    pub fn name(&self) -> &str {
        &self.property.name
    }

    /// The name without its trailing `*`.
    pub fn stem(&self) -> &str {
        self.property.name.trim_end_matches('*')
    }

    /// True when the name is a well-formed single trailing-`*` wildcard.
    pub fn has_valid_pattern(&self) -> bool {
        let name = &self.property.name;
        name.matches('*').count() == 1 && name.ends_with('*') && name.len() > 1
    }
}

/// A named value constraint.
///
/// The `type` tag selects a validator in the constraint registry;
/// `parameters` are passed through to it uninterpreted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Constraint {
    /// Qualified constraint name
    pub name: String,
    /// Validator kind tag, e.g. `ENUM`, `REGEX`, `MINMAX`, `CLASS`, `NONE`
    #[serde(rename = "type")]
    pub constraint_type: String,
    /// Kind-specific parameters
    #[serde(default)]
    pub parameters: serde_json::Map<String, Value>,
}

impl Constraint {
    /// Read a string parameter.
    pub fn param_str(&self, key: &str) -> Option<&str> {
        self.parameters.get(key).and_then(Value::as_str)
    }

    /// Read a boolean parameter, falling back to a default.
    pub fn param_bool(&self, key: &str, default: bool) -> bool {
        self.parameters
            .get(key)
            .and_then(Value::as_bool)
            .unwrap_or(default)
    }

    /// Read a numeric parameter.
    pub fn param_f64(&self, key: &str) -> Option<f64> {
        self.parameters.get(key).and_then(Value::as_f64)
    }

    /// Read a list parameter.
    pub fn param_list(&self, key: &str) -> Option<&Vec<Value>> {
        self.parameters.get(key).and_then(Value::as_array)
    }
}

/// An association between two types.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Association {
    /// Qualified association name
    pub name: String,
    /// Qualified name of the source type
    pub parent_type: String,
    /// Qualified name of the target type
    pub child_type: String,
    /// `true` for a plain peer association; `false` makes the target a
    /// child whose lifecycle follows the source
    #[serde(default)]
    pub light: bool,
}

/// The closed set of primitive and content data types.
///
/// Property types outside this enumeration are rejected by validation.
/// `AssocRef` and `ChildAssocRef` are accepted for older documents but
/// logged as deprecated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    /// Untyped value, indexed verbatim
    Any,
    /// Single-locale text
    Text,
    /// 32-bit integer
    Int,
    /// 64-bit integer
    Long,
    /// Boolean
    Boolean,
    /// 32-bit float
    Float,
    /// 64-bit float
    Double,
    /// Calendar date
    Date,
    /// Date and time
    DateTime,
    /// Multi-locale text
    MlText,
    /// Binary content with a MIME type; never indexed as a field
    Content,
    /// Qualified name value
    QName,
    /// Locale identifier
    Locale,
    /// Category node reference
    Category,
    /// Node reference
    NodeRef,
    /// Deprecated association reference
    AssocRef,
    /// Deprecated child association reference
    ChildAssocRef,
}

impl DataType {
    /// Parse the local part of a qualified type name, case-insensitively.
    pub fn from_local(local: &str) -> Option<Self> {
        let dt = match local.to_ascii_lowercase().as_str() {
            "any" => Self::Any,
            "text" => Self::Text,
            "int" => Self::Int,
            "long" => Self::Long,
            "boolean" => Self::Boolean,
            "float" => Self::Float,
            "double" => Self::Double,
            "date" => Self::Date,
            "datetime" => Self::DateTime,
            "mltext" => Self::MlText,
            "content" => Self::Content,
            "qname" => Self::QName,
            "locale" => Self::Locale,
            "category" => Self::Category,
            "noderef" => Self::NodeRef,
            "assocref" => Self::AssocRef,
            "childassocref" => Self::ChildAssocRef,
            _ => return None,
        };
        Some(dt)
    }

    /// Canonical lowercase name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Any => "any",
            Self::Text => "text",
            Self::Int => "int",
            Self::Long => "long",
            Self::Boolean => "boolean",
            Self::Float => "float",
            Self::Double => "double",
            Self::Date => "date",
            Self::DateTime => "datetime",
            Self::MlText => "mltext",
            Self::Content => "content",
            Self::QName => "qname",
            Self::Locale => "locale",
            Self::Category => "category",
            Self::NodeRef => "noderef",
            Self::AssocRef => "assocref",
            Self::ChildAssocRef => "childassocref",
        }
    }

    /// True for type names kept only for older documents.
    pub fn is_deprecated(&self) -> bool {
        matches!(self, Self::AssocRef | Self::ChildAssocRef)
    }
}
