//! Content model definitions, parsing, and validation.
//!
//! This module holds the metamodel a tenant's schema is built from and the
//! two stages every stored model document goes through before registration.
//!
//! # Key Types
//!
//! - [`Model`] - one parsed model document: namespaces, classes, properties
//! - [`ModelParser`] - compact and definition source formats, plus
//!   normalization
//! - [`ModelValidator`] - fail-fast structural validation against the
//!   tenant and common graphs
//!
//! # Examples
//!
//! ```rust
//! use content_model_engine::constraints::ConstraintRegistry;
//! use content_model_engine::model::{ModelFormat, ModelParser};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let registry = ConstraintRegistry::new();
//! let parser = ModelParser::new(&registry);
//! let model = parser.parse_source(
//!     r#"{"name": "acme:docs", "namespaces": [{"prefix": "acme", "uri": "http://acme.example/docs/1.0"}]}"#,
//!     ModelFormat::Compact,
//! )?;
//! assert!(model.owns_prefix("acme"));
//! # Ok(())
//! # }
//! ```

pub mod parser;
pub mod types;
pub mod validation;


// Re-export the main types for convenience
pub use parser::{ModelFormat, ModelParser};
pub use types::{
    Association, ClassDef, ClassKind, Constraint, DataType, DynamicProperty, Model, Namespace,
    Property, SYSTEM_NAME_MARKER, split_name,
};
pub use validation::ModelValidator;
