//! Index field shapes and the model-to-index type mapping.
//!
//! The search index knows two kinds of fields: concrete fields addressed by
//! their full name and dynamic fields whose name carries a single `*`
//! wildcard. Model properties map onto index fields by prefixing the
//! qualified name with `@`, so index-internal fields (`id`, `tenant`) can
//! never collide with model-driven ones.

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{ReconcileError, ReconcileResult};
use crate::model::{DataType, Property};

/// A concrete field as the search index reports it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexField {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: String,
    #[serde(default)]
    pub multi_valued: bool,
    #[serde(default = "default_true")]
    pub indexed: bool,
    #[serde(default)]
    pub stored: bool,
}

impl IndexField {
    /// Whether two fields agree on everything except their name.
    pub fn same_shape(&self, other: &IndexField) -> bool {
        self.field_type == other.field_type
            && self.multi_valued == other.multi_valued
            && self.indexed == other.indexed
            && self.stored == other.stored
    }
}

/// A dynamic field together with its compiled name matcher.
///
/// The wildcard is turned into a regular expression by escaping the literal
/// part of the name, substituting `.*` for the `*`, and anchoring both ends,
/// so names containing regex metacharacters match literally.
#[derive(Debug, Clone)]
pub struct DynamicIndexField {
    field: IndexField,
    pattern: Regex,
}

impl DynamicIndexField {
    /// Compile a wildcard field. The name must contain exactly one `*`.
    pub fn compile(field: IndexField) -> ReconcileResult<Self> {
        if field.name.matches('*').count() != 1 {
            return Err(ReconcileError::InvalidFieldPattern { name: field.name });
        }
        let escaped = regex::escape(&field.name).replace("\\*", ".*");
        let pattern = match Regex::new(&format!("^{escaped}$")) {
            Ok(pattern) => pattern,
            Err(_) => return Err(ReconcileError::InvalidFieldPattern { name: field.name }),
        };
        Ok(Self { field, pattern })
    }

    /// The field definition as the index reports it.
    pub fn field(&self) -> &IndexField {
        &self.field
    }

    /// Field name, wildcard included.
    pub fn name(&self) -> &str {
        &self.field.name
    }

    /// Name with a trailing wildcard removed. Fields whose wildcard sits
    /// elsewhere keep it; they never take part in specificity comparisons.
    pub fn stem(&self) -> &str {
        self.field.name.trim_end_matches('*')
    }

    /// Whether this dynamic field covers the given name.
    pub fn matches(&self, name: &str) -> bool {
        self.pattern.is_match(name)
    }
}

/// Index-side name for a model property: the qualified name behind the `@`
/// marker, any wildcard kept.
pub fn index_field_name(name: &str) -> String {
    format!("@{name}")
}

/// Map a model data type onto an index field type.
///
/// `None` means the value has no index representation (binary content is
/// indexed through a separate text-extraction pipeline, not as a field).
pub fn index_type(data_type: DataType, tokenized: bool, locale: &str) -> Option<String> {
    let mapped = match data_type {
        DataType::Content => return None,
        DataType::Text | DataType::MlText => {
            return Some(if tokenized {
                format!("text_{locale}")
            } else {
                "string_ci".to_string()
            });
        }
        DataType::Int => "pint",
        DataType::Long => "plong",
        DataType::Float => "pfloat",
        DataType::Double => "pdouble",
        DataType::Boolean => "boolean",
        DataType::Date | DataType::DateTime => "pdate",
        DataType::Any
        | DataType::QName
        | DataType::Locale
        | DataType::Category
        | DataType::NodeRef
        | DataType::AssocRef
        | DataType::ChildAssocRef => "string",
    };
    Some(mapped.to_string())
}

/// Desired concrete field for a property, or `None` when the property has no
/// index representation (content values, unparseable declared types).
pub fn field_for_property(property: &Property, locale: &str) -> Option<IndexField> {
    let data_type = property.data_type()?;
    let field_type = index_type(data_type, property.tokenized, locale)?;
    Some(IndexField {
        name: index_field_name(&property.name),
        field_type,
        multi_valued: property.multiple,
        indexed: property.indexed,
        stored: property.stored,
    })
}

/// Parsed form of [`core_index_fields`].
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoreFieldFile {
    #[serde(default)]
    pub fields: Vec<IndexField>,
    #[serde(default)]
    pub dynamic_fields: Vec<IndexField>,
}

impl CoreFieldFile {
    /// Load the embedded canonical definitions.
    pub fn load() -> Result<Self, serde_json::Error> {
        serde_json::from_str(core_index_fields())
    }
}

/// Returns the canonical core field definitions as a JSON string.
///
/// These are the fields every collection needs regardless of the deployed
/// models: document identity, tenancy, and the audit properties of the
/// system namespace.
pub fn core_index_fields() -> &'static str {
    r#"{
  "fields": [
    {
      "name": "id",
      "type": "string",
      "multiValued": false,
      "indexed": true,
      "stored": true
    },
    {
      "name": "tenant",
      "type": "string",
      "multiValued": false,
      "indexed": true,
      "stored": true
    },
    {
      "name": "@sys:name",
      "type": "text_en",
      "multiValued": false,
      "indexed": true,
      "stored": false
    },
    {
      "name": "@sys:node-uuid",
      "type": "string",
      "multiValued": false,
      "indexed": true,
      "stored": false
    },
    {
      "name": "@sys:created",
      "type": "pdate",
      "multiValued": false,
      "indexed": true,
      "stored": false
    },
    {
      "name": "@sys:modified",
      "type": "pdate",
      "multiValued": false,
      "indexed": true,
      "stored": false
    },
    {
      "name": "@sys:creator",
      "type": "string",
      "multiValued": false,
      "indexed": true,
      "stored": false
    },
    {
      "name": "@sys:modifier",
      "type": "string",
      "multiValued": false,
      "indexed": true,
      "stored": false
    },
    {
      "name": "@sys:locale",
      "type": "string",
      "multiValued": false,
      "indexed": true,
      "stored": false
    }
  ],
  "dynamicFields": [
    {
      "name": "@sys:prop-*",
      "type": "string",
      "multiValued": true,
      "indexed": true,
      "stored": false
    }
  ]
}"#
}

fn default_true() -> bool {
    true
}
