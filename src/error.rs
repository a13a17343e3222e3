//! Error types for content model engine operations.
//!
//! Parsing, validation, and index reconciliation each have their own error
//! enum so callers can react to the failure class; [`EngineError`] is the
//! umbrella type returned by [`crate::engine::ModelEngine`] operations.

/// Errors raised while parsing a stored model document.
///
/// A parse failure is local to one model record: batch loads log the failure
/// and continue with the remaining records.
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    /// The document is not well-formed JSON
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A required field is absent
    #[error("Missing field '{field}' in {context}")]
    MissingField { field: String, context: String },

    /// A field is present but carries an unusable value
    #[error("Invalid field '{field}': {reason}")]
    InvalidField { field: String, reason: String },

    /// A constraint declares a type the registry does not know and that has
    /// no legacy downgrade
    #[error("Constraint '{constraint}' has unknown type '{kind}'")]
    UnknownConstraintType { constraint: String, kind: String },
}

/// Errors raised while validating a candidate model against the tenant and
/// common graphs, or while flattening a class hierarchy.
///
/// Validation is fail-fast: the first violation is returned and the model is
/// rejected for deployment.
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    /// The model has a blank name
    #[error("Model has no name")]
    AnonymousModel,

    /// A declared namespace prefix is already owned by another model
    #[error("Namespace prefix '{prefix}' is already owned by model '{owner}'")]
    NamespaceForbidden { prefix: String, owner: String },

    /// A declared namespace URI is already bound to a different prefix
    #[error("Namespace URI '{uri}' is already bound to prefix '{prefix}'")]
    DuplicateNamespaceUri { uri: String, prefix: String },

    /// An imported prefix does not resolve to any registered model
    #[error("Model '{model}' imports unresolved namespace prefix '{prefix}'")]
    UnresolvedImport { model: String, prefix: String },

    /// Two entities of the same kind share a name
    #[error("Duplicate {kind} name '{name}'")]
    DuplicateName { kind: String, name: String },

    /// An entity name is missing its `prefix:` part
    #[error("Name '{name}' is missing a namespace prefix")]
    MalformedName { name: String },

    /// An entity is declared under a prefix the model does not own
    #[error("'{name}' uses prefix '{prefix}' that is not declared by its own model")]
    ForeignNamespace { name: String, prefix: String },

    /// A property's qualified data type does not resolve
    #[error("Property '{property}' has unknown type '{declared}'")]
    UnknownPropertyType { property: String, declared: String },

    /// A property references a constraint that is not declared
    #[error("Property '{property}' references unresolved constraint '{constraint}'")]
    UnresolvedConstraint { property: String, constraint: String },

    /// A declared constraint uses a type the registry does not know
    #[error("Constraint '{constraint}' has unregistered kind '{kind}'")]
    UnknownConstraintKind { constraint: String, kind: String },

    /// A CLASS constraint names an implementation that is not registered
    #[error("Constraint '{constraint}' names unregistered implementation '{class}'")]
    UnregisteredConstraintClass { constraint: String, class: String },

    /// A dynamic property name is not a single trailing-`*` wildcard
    #[error("Dynamic property '{name}' must end in exactly one '*'")]
    MalformedWildcard { name: String },

    /// Two dynamic property stems overlap, making matches ambiguous
    #[error("Dynamic property '{name}' is ambiguous with '{other}'")]
    AmbiguousWildcard { name: String, other: String },

    /// A non-root type has no parent
    #[error("Type '{class}' has no parent and is not the root type")]
    MissingParent { class: String },

    /// A class's parent does not resolve to a declared class of the same kind
    #[error("'{class}' has unresolved parent '{parent}'")]
    UnresolvedParent { class: String, parent: String },

    /// A class's mandatory or suggested property does not resolve
    #[error("'{class}' references unresolved property '{property}'")]
    UnresolvedPropertyReference { class: String, property: String },

    /// A class's mandatory aspect does not resolve
    #[error("'{class}' references unresolved aspect '{aspect}'")]
    UnresolvedAspectReference { class: String, aspect: String },

    /// Flattening was asked for a class that is not defined in the chain
    #[error("Unknown class '{name}'")]
    UnknownClass { name: String },

    /// A class hierarchy loops back on itself
    #[error("Cyclic hierarchy detected at '{name}'")]
    CyclicHierarchy { name: String },
}

/// Errors returned by the search engine wire contract.
#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    /// The engine rejected the request as malformed (4xx)
    #[error("Search engine rejected request ({status}): {message}")]
    BadRequest { status: u16, message: String },

    /// The engine failed the request (5xx or unexpected status)
    #[error("Search engine call failed ({status}): {message}")]
    Remote { status: u16, message: String },

    /// The HTTP status was fine but the response body reported a failure
    #[error("Search engine reported status {code}: {message}")]
    Engine { code: i64, message: String },

    /// The request never produced a response
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The response body did not have the expected shape
    #[error("Malformed engine response: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Errors raised by an index reconciliation pass.
#[derive(Debug, thiserror::Error)]
pub enum ReconcileError {
    /// A remote call failed; the pass is aborted and can be retried
    #[error("Index error: {0}")]
    Index(#[from] IndexError),

    /// A predefined dynamic property has no matching dynamic field
    #[error("Predefined dynamic property '{pattern}' has no dynamic field in collection '{collection}'")]
    PredefinedFieldMissing { pattern: String, collection: String },

    /// A dynamic field name cannot be compiled into a match pattern
    #[error("Dynamic field name '{name}' is not a valid wildcard pattern")]
    InvalidFieldPattern { name: String },

    /// The embedded core field definitions failed to parse
    #[error("Embedded core field definitions are invalid: {0}")]
    CoreFields(#[from] serde_json::Error),
}

/// Main error type for engine lifecycle operations.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Model document could not be parsed
    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    /// Model failed structural validation
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Error from the user-provided model store
    #[error("Model store error: {0}")]
    Store(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// The named model is not deployed for the tenant
    #[error("Model not found: '{model}' for tenant '{tenant}'")]
    ModelNotFound { tenant: String, model: String },

    /// The record carries a format tag the parser does not recognize
    #[error("Unknown model format '{format}'")]
    UnknownFormat { format: String },
}

impl IndexError {
    /// True when the failure is the caller's input, not the remote engine.
    pub fn is_caller_error(&self) -> bool {
        matches!(self, Self::BadRequest { .. })
    }

    /// Create a remote failure from an HTTP status and message body.
    ///
    /// 4xx statuses become [`IndexError::BadRequest`], everything else
    /// [`IndexError::Remote`].
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        if (400..500).contains(&status) {
            Self::BadRequest {
                status,
                message: message.into(),
            }
        } else {
            Self::Remote {
                status,
                message: message.into(),
            }
        }
    }
}

// Convenience methods for creating common errors
impl ParseError {
    /// Create a missing-field error with its document context
    pub fn missing(field: impl Into<String>, context: impl Into<String>) -> Self {
        Self::MissingField {
            field: field.into(),
            context: context.into(),
        }
    }

    /// Create an invalid-field error
    pub fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidField {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

impl ValidationError {
    /// Create a duplicate-name error
    pub fn duplicate(kind: impl Into<String>, name: impl Into<String>) -> Self {
        Self::DuplicateName {
            kind: kind.into(),
            name: name.into(),
        }
    }

    /// Create an unknown-class error
    pub fn unknown_class(name: impl Into<String>) -> Self {
        Self::UnknownClass { name: name.into() }
    }
}

impl EngineError {
    /// Wrap a model store error
    pub fn store<E>(error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Store(Box::new(error))
    }

    /// Create a model-not-found error
    pub fn model_not_found(tenant: impl Into<String>, model: impl Into<String>) -> Self {
        Self::ModelNotFound {
            tenant: tenant.into(),
            model: model.into(),
        }
    }
}

// Result type aliases for convenience
pub type EngineResult<T> = Result<T, EngineError>;
pub type ParseResult<T> = Result<T, ParseError>;
pub type ValidationResult<T> = Result<T, ValidationError>;
pub type IndexResult<T> = Result<T, IndexError>;
pub type ReconcileResult<T> = Result<T, ReconcileError>;
