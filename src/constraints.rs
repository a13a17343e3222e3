//! Constraint validator registry.
//!
//! Property constraints in a model carry a kind tag (`ENUM`, `REGEX`,
//! `MINMAX`, `CLASS`, `NONE`) plus parameters; this module maps kind tags to
//! [`ConstraintValidator`] implementations. `CLASS` constraints name a
//! specific implementation which must have been registered at build time via
//! [`ConstraintRegistry::register_class`]; an unregistered name fails model
//! validation at deploy time rather than at first use.
//!
//! # Example
//!
//! ```
//! use content_model_engine::constraints::ConstraintRegistry;
//!
//! let registry = ConstraintRegistry::new();
//! assert!(registry.contains("ENUM"));
//! assert!(registry.is_legacy_kind("org.alfresco.repo.dictionary.constraint.UserNameConstraint"));
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use regex::Regex;
use serde_json::Value;

use crate::model::Constraint;

/// Well-known constraint kind tags.
pub mod kind {
    /// Value must be one of a literal set
    pub const ENUM: &str = "ENUM";
    /// Value must (or must not) match a regular expression
    pub const REGEX: &str = "REGEX";
    /// Numeric value must fall in a closed interval
    pub const MINMAX: &str = "MINMAX";
    /// Dispatch to a registered implementation by name
    pub const CLASS: &str = "CLASS";
    /// Always succeeds; the downgrade target for legacy constraints
    pub const NONE: &str = "NONE";
}

/// Vendor prefix of legacy constraint implementations that are downgraded to
/// [`kind::NONE`] instead of failing the parse.
pub const DEFAULT_LEGACY_PREFIX: &str = "org.alfresco.";

/// A single value failed a constraint check.
#[derive(Debug, thiserror::Error)]
#[error("Constraint '{constraint}' violated: {reason}")]
pub struct ConstraintViolation {
    /// Qualified name of the violated constraint
    pub constraint: String,
    /// What the value failed to satisfy
    pub reason: String,
}

impl ConstraintViolation {
    /// Create a violation for the given constraint.
    pub fn new(constraint: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            constraint: constraint.into(),
            reason: reason.into(),
        }
    }
}

/// Checks property values against one kind of constraint.
///
/// Implementations are stateless; all configuration travels in the
/// [`Constraint`] parameters.
pub trait ConstraintValidator: Send + Sync {
    /// Check one value against one constraint declaration.
    fn validate(&self, constraint: &Constraint, value: &Value) -> Result<(), ConstraintViolation>;
}

/// Registry of constraint validators, keyed by kind tag.
///
/// Holds the built-in kinds, the table of named `CLASS` implementations, and
/// the legacy vendor prefixes that the parser downgrades instead of
/// rejecting.
pub struct ConstraintRegistry {
    validators: HashMap<String, Arc<dyn ConstraintValidator>>,
    classes: HashMap<String, Arc<dyn ConstraintValidator>>,
    legacy_prefixes: Vec<String>,
}

impl ConstraintRegistry {
    /// Create a registry with the built-in kinds and the default legacy
    /// vendor prefix.
    pub fn new() -> Self {
        let mut validators: HashMap<String, Arc<dyn ConstraintValidator>> = HashMap::new();
        validators.insert(kind::ENUM.to_string(), Arc::new(EnumValidator));
        validators.insert(kind::REGEX.to_string(), Arc::new(RegexValidator));
        validators.insert(kind::MINMAX.to_string(), Arc::new(MinMaxValidator));
        validators.insert(kind::NONE.to_string(), Arc::new(NoopValidator));
        Self {
            validators,
            classes: HashMap::new(),
            legacy_prefixes: vec![DEFAULT_LEGACY_PREFIX.to_string()],
        }
    }

    /// Register (or replace) a validator for a kind tag.
    pub fn register(&mut self, kind: impl Into<String>, validator: Arc<dyn ConstraintValidator>) {
        self.validators.insert(kind.into(), validator);
    }

    /// Register a named `CLASS` implementation.
    pub fn register_class(&mut self, name: impl Into<String>, validator: Arc<dyn ConstraintValidator>) {
        self.classes.insert(name.into(), validator);
    }

    /// Add a vendor prefix whose unknown constraint kinds are downgraded
    /// instead of rejected.
    pub fn add_legacy_prefix(&mut self, prefix: impl Into<String>) {
        self.legacy_prefixes.push(prefix.into());
    }

    /// Look up the validator for a kind tag.
    ///
    /// `CLASS` has no single validator; use [`Self::validate_value`] to
    /// dispatch it.
    pub fn get_validator(&self, kind: &str) -> Option<&Arc<dyn ConstraintValidator>> {
        self.validators.get(kind)
    }

    /// True when the kind tag is usable in a deployed model.
    pub fn contains(&self, kind_tag: &str) -> bool {
        self.validators.contains_key(kind_tag) || kind_tag == kind::CLASS
    }

    /// True when a named `CLASS` implementation is registered.
    pub fn has_class(&self, name: &str) -> bool {
        self.classes.contains_key(name)
    }

    /// True when the kind tag starts with a known legacy vendor prefix.
    pub fn is_legacy_kind(&self, kind_tag: &str) -> bool {
        self.legacy_prefixes
            .iter()
            .any(|p| kind_tag.starts_with(p.as_str()))
    }

    /// Check a value against a constraint, dispatching `CLASS` constraints
    /// to their registered implementation.
    pub fn validate_value(
        &self,
        constraint: &Constraint,
        value: &Value,
    ) -> Result<(), ConstraintViolation> {
        if constraint.constraint_type == kind::CLASS {
            let class = constraint.param_str("class").ok_or_else(|| {
                ConstraintViolation::new(&constraint.name, "missing 'class' parameter")
            })?;
            let validator = self.classes.get(class).ok_or_else(|| {
                ConstraintViolation::new(
                    &constraint.name,
                    format!("implementation '{class}' is not registered"),
                )
            })?;
            return validator.validate(constraint, value);
        }
        let validator = self
            .validators
            .get(&constraint.constraint_type)
            .ok_or_else(|| {
                ConstraintViolation::new(
                    &constraint.name,
                    format!("no validator for kind '{}'", constraint.constraint_type),
                )
            })?;
        validator.validate(constraint, value)
    }
}

impl Default for ConstraintRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ConstraintRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConstraintRegistry")
            .field("kinds", &self.validators.keys().collect::<Vec<_>>())
            .field("classes", &self.classes.keys().collect::<Vec<_>>())
            .finish()
    }
}

fn value_text(value: &Value) -> String {
    match value.as_str() {
        Some(s) => s.to_string(),
        None => value.to_string(),
    }
}

/// Value must equal one of the `allowedValues` literals.
///
/// `caseSensitive` (default `true`) controls the comparison.
struct EnumValidator;

impl ConstraintValidator for EnumValidator {
    fn validate(&self, constraint: &Constraint, value: &Value) -> Result<(), ConstraintViolation> {
        let allowed = constraint.param_list("allowedValues").ok_or_else(|| {
            ConstraintViolation::new(&constraint.name, "missing 'allowedValues' parameter")
        })?;
        let case_sensitive = constraint.param_bool("caseSensitive", true);
        let candidate = value_text(value);
        let hit = allowed.iter().any(|entry| {
            let entry = value_text(entry);
            if case_sensitive {
                entry == candidate
            } else {
                entry.eq_ignore_ascii_case(&candidate)
            }
        });
        if hit {
            Ok(())
        } else {
            Err(ConstraintViolation::new(
                &constraint.name,
                format!("'{candidate}' is not an allowed value"),
            ))
        }
    }
}

/// Value must match (or, with `requiresMatch: false`, must not match) the
/// `expression` pattern.
struct RegexValidator;

impl ConstraintValidator for RegexValidator {
    fn validate(&self, constraint: &Constraint, value: &Value) -> Result<(), ConstraintViolation> {
        let expression = constraint.param_str("expression").ok_or_else(|| {
            ConstraintViolation::new(&constraint.name, "missing 'expression' parameter")
        })?;
        let requires_match = constraint.param_bool("requiresMatch", true);
        let text = value.as_str().ok_or_else(|| {
            ConstraintViolation::new(&constraint.name, "value is not text")
        })?;
        let pattern = Regex::new(expression).map_err(|e| {
            ConstraintViolation::new(&constraint.name, format!("invalid expression: {e}"))
        })?;
        if pattern.is_match(text) == requires_match {
            Ok(())
        } else if requires_match {
            Err(ConstraintViolation::new(
                &constraint.name,
                format!("'{text}' does not match '{expression}'"),
            ))
        } else {
            Err(ConstraintViolation::new(
                &constraint.name,
                format!("'{text}' matches forbidden pattern '{expression}'"),
            ))
        }
    }
}

/// Numeric value must lie within `[minValue, maxValue]`.
///
/// Missing bounds default to the widest representable interval.
struct MinMaxValidator;

impl ConstraintValidator for MinMaxValidator {
    fn validate(&self, constraint: &Constraint, value: &Value) -> Result<(), ConstraintViolation> {
        let min = constraint.param_f64("minValue").unwrap_or(f64::MIN);
        let max = constraint.param_f64("maxValue").unwrap_or(f64::MAX);
        let number = match value.as_f64() {
            Some(n) => n,
            None => value
                .as_str()
                .and_then(|s| s.parse::<f64>().ok())
                .ok_or_else(|| {
                    ConstraintViolation::new(&constraint.name, "value is not numeric")
                })?,
        };
        if number < min || number > max {
            return Err(ConstraintViolation::new(
                &constraint.name,
                format!("{number} is outside [{min}, {max}]"),
            ));
        }
        Ok(())
    }
}

/// Always succeeds. Legacy constraints are downgraded to this kind.
struct NoopValidator;

impl ConstraintValidator for NoopValidator {
    fn validate(&self, _constraint: &Constraint, _value: &Value) -> Result<(), ConstraintViolation> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn constraint(kind_tag: &str, parameters: Value) -> Constraint {
        Constraint {
            name: "acme:check".to_string(),
            constraint_type: kind_tag.to_string(),
            parameters: parameters.as_object().cloned().unwrap_or_default(),
        }
    }

    #[test]
    fn enum_accepts_listed_value() {
        let registry = ConstraintRegistry::new();
        let c = constraint(kind::ENUM, json!({"allowedValues": ["draft", "final"]}));
        assert!(registry.validate_value(&c, &json!("draft")).is_ok());
        assert!(registry.validate_value(&c, &json!("other")).is_err());
    }

    #[test]
    fn enum_case_insensitive_when_configured() {
        let registry = ConstraintRegistry::new();
        let c = constraint(
            kind::ENUM,
            json!({"allowedValues": ["Draft"], "caseSensitive": false}),
        );
        assert!(registry.validate_value(&c, &json!("draft")).is_ok());
    }

    #[test]
    fn regex_requires_match_by_default() {
        let registry = ConstraintRegistry::new();
        let c = constraint(kind::REGEX, json!({"expression": "^[a-z]+$"}));
        assert!(registry.validate_value(&c, &json!("lower")).is_ok());
        assert!(registry.validate_value(&c, &json!("UPPER")).is_err());
    }

    #[test]
    fn regex_inverted_with_requires_match_false() {
        let registry = ConstraintRegistry::new();
        let c = constraint(
            kind::REGEX,
            json!({"expression": "forbidden", "requiresMatch": false}),
        );
        assert!(registry.validate_value(&c, &json!("clean text")).is_ok());
        assert!(registry.validate_value(&c, &json!("forbidden text")).is_err());
    }

    #[test]
    fn minmax_checks_bounds() {
        let registry = ConstraintRegistry::new();
        let c = constraint(kind::MINMAX, json!({"minValue": 1, "maxValue": 10}));
        assert!(registry.validate_value(&c, &json!(5)).is_ok());
        assert!(registry.validate_value(&c, &json!(11)).is_err());
        assert!(registry.validate_value(&c, &json!("3")).is_ok());
    }

    #[test]
    fn none_always_succeeds() {
        let registry = ConstraintRegistry::new();
        let c = constraint(kind::NONE, json!({}));
        assert!(registry.validate_value(&c, &json!("anything")).is_ok());
    }

    #[test]
    fn class_dispatches_to_registered_implementation() {
        struct RejectAll;
        impl ConstraintValidator for RejectAll {
            fn validate(
                &self,
                constraint: &Constraint,
                _value: &Value,
            ) -> Result<(), ConstraintViolation> {
                Err(ConstraintViolation::new(&constraint.name, "rejected"))
            }
        }

        let mut registry = ConstraintRegistry::new();
        registry.register_class("acme.RejectAll", Arc::new(RejectAll));
        assert!(registry.has_class("acme.RejectAll"));

        let c = constraint(kind::CLASS, json!({"class": "acme.RejectAll"}));
        assert!(registry.validate_value(&c, &json!("x")).is_err());

        let missing = constraint(kind::CLASS, json!({"class": "acme.Missing"}));
        let err = registry.validate_value(&missing, &json!("x")).unwrap_err();
        assert!(err.reason.contains("not registered"));
    }

    #[test]
    fn class_kind_is_always_known() {
        let registry = ConstraintRegistry::new();
        assert!(registry.contains(kind::CLASS));
        assert!(registry.contains(kind::NONE));
        assert!(!registry.contains("LENGTH"));
    }

    #[test]
    fn legacy_prefix_is_recognized() {
        let mut registry = ConstraintRegistry::new();
        assert!(registry.is_legacy_kind("org.alfresco.repo.dictionary.constraint.NameChecker"));
        assert!(!registry.is_legacy_kind("com.example.Checker"));
        registry.add_legacy_prefix("com.example.");
        assert!(registry.is_legacy_kind("com.example.Checker"));
    }
}
