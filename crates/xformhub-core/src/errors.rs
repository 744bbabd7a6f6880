use crate::validation::ValidationErrorSet;
use thiserror::Error;
use xformhub_core_types::RequestId;

/// Result type alias using XFormError
pub type Result<T> = std::result::Result<T, XFormError>;

// ========== Error Facility ==========

/// Canonical error kind taxonomy
///
/// Every failure surfaced by the registry, the router or the store is
/// classified into one of these kinds. Each kind maps to a stable error code
/// used by callers (the receiver pipeline, the CLI, tests) to decide whether a
/// submission or registration should be retried, rejected or reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExErrorKind {
    // Structural/Validation
    InvalidInput,
    SchemaParse,
    MissingNamespace,
    DuplicateSchema,
    IdentifierCollision,
    NotFound,
    ValidationFailed,
    InstanceParse,
    BuildFailed,

    // Integration/IO
    Io,
    Serialization,
    Persistence,
    Concurrency,

    // Internal
    Internal,
}

impl ExErrorKind {
    /// Get the stable error code for this kind
    pub fn code(&self) -> &'static str {
        match self {
            ExErrorKind::InvalidInput => "ERR_INVALID_INPUT",
            ExErrorKind::SchemaParse => "ERR_SCHEMA_PARSE",
            ExErrorKind::MissingNamespace => "ERR_MISSING_NAMESPACE",
            ExErrorKind::DuplicateSchema => "ERR_DUPLICATE_SCHEMA",
            ExErrorKind::IdentifierCollision => "ERR_IDENTIFIER_COLLISION",
            ExErrorKind::NotFound => "ERR_NOT_FOUND",
            ExErrorKind::ValidationFailed => "ERR_VALIDATION_FAILED",
            ExErrorKind::InstanceParse => "ERR_INSTANCE_PARSE",
            ExErrorKind::BuildFailed => "ERR_BUILD_FAILED",
            ExErrorKind::Io => "ERR_IO",
            ExErrorKind::Serialization => "ERR_SERIALIZATION",
            ExErrorKind::Persistence => "ERR_PERSISTENCE",
            ExErrorKind::Concurrency => "ERR_CONCURRENCY",
            ExErrorKind::Internal => "ERR_INTERNAL",
        }
    }
}

/// Canonical structured error type
///
/// This error type provides a structured representation of errors with
/// classification fields for programmatic handling and rich context for debugging.
#[derive(Debug, Clone)]
pub struct ExError {
    kind: ExErrorKind,
    op: Option<String>,
    form_id: Option<i64>,
    namespace: Option<String>,
    xpath: Option<String>,
    request_id: Option<RequestId>,
    message: String,
    source: Option<Box<ExError>>,
    validation: Option<ValidationErrorSet>,
}

impl ExError {
    /// Create a new error with the specified kind
    pub fn new(kind: ExErrorKind) -> Self {
        Self {
            kind,
            op: None,
            form_id: None,
            namespace: None,
            xpath: None,
            request_id: None,
            message: String::new(),
            source: None,
            validation: None,
        }
    }

    /// Add operation context
    pub fn with_op(mut self, op: impl Into<String>) -> Self {
        self.op = Some(op.into());
        self
    }

    /// Add registered form id context
    pub fn with_form_id(mut self, form_id: i64) -> Self {
        self.form_id = Some(form_id);
        self
    }

    /// Add target namespace context
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    /// Add schema xpath context
    pub fn with_xpath(mut self, xpath: impl Into<String>) -> Self {
        self.xpath = Some(xpath.into());
        self
    }

    /// Add request ID context
    pub fn with_request_id(mut self, request_id: RequestId) -> Self {
        self.request_id = Some(request_id);
        self
    }

    /// Add custom message
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    /// Add source error
    pub fn with_source(mut self, source: ExError) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Attach the validation result that caused a strict rejection
    pub fn with_validation(mut self, errors: ValidationErrorSet) -> Self {
        self.validation = Some(errors);
        self
    }

    /// Get the error kind
    pub fn kind(&self) -> ExErrorKind {
        self.kind
    }

    /// Get the stable error code
    pub fn code(&self) -> &'static str {
        self.kind.code()
    }

    /// Get the operation context, if any
    pub fn op(&self) -> Option<&str> {
        self.op.as_deref()
    }

    /// Get the form id context, if any
    pub fn form_id(&self) -> Option<i64> {
        self.form_id
    }

    /// Get the namespace context, if any
    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    /// Get the xpath context, if any
    pub fn xpath(&self) -> Option<&str> {
        self.xpath.as_deref()
    }

    /// Get the request ID context, if any
    pub fn request_id(&self) -> Option<&RequestId> {
        self.request_id.as_ref()
    }

    /// Get the error message
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Get the source error, if any
    pub fn source_error(&self) -> Option<&ExError> {
        self.source.as_deref()
    }

    /// Get the attached validation result, if any
    pub fn validation(&self) -> Option<&ValidationErrorSet> {
        self.validation.as_ref()
    }
}

impl std::fmt::Display for ExError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}]", self.code())?;
        if let Some(op) = &self.op {
            write!(f, " in operation '{}'", op)?;
        }
        if !self.message.is_empty() {
            write!(f, ": {}", self.message)?;
        }
        if let Some(form_id) = self.form_id {
            write!(f, " (form_id: {})", form_id)?;
        }
        if let Some(namespace) = &self.namespace {
            write!(f, " (namespace: {})", namespace)?;
        }
        if let Some(xpath) = &self.xpath {
            write!(f, " (xpath: {})", xpath)?;
        }
        if let Some(source) = &self.source {
            write!(f, " caused by {}", source)?;
        }
        Ok(())
    }
}

impl std::error::Error for ExError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_deref()
            .map(|e| e as &(dyn std::error::Error + 'static))
    }
}

// ========== End Error Facility ==========

/// Error taxonomy for the pure schema/instance layer
///
/// Parser, sanitizer, layout planner and validator return these; the store and
/// engine layers convert them into [`ExError`] at their boundary.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum XFormError {
    /// The XSD is not well-formed XML or uses constructs that cannot be mapped
    #[error("Schema could not be parsed: {message}")]
    SchemaParse { message: String },

    /// The schema root has no targetNamespace
    #[error("No target namespace (xmlns) found in schema for form '{form_name}'")]
    MissingNamespace { form_name: String },

    /// The namespace is already registered for the domain
    #[error("Schema with namespace {target_namespace} is already registered in domain '{domain}'")]
    DuplicateSchema {
        target_namespace: String,
        domain: String,
    },

    /// Two schema nodes map to the same storage identifier
    #[error("Identifier '{identifier}' for {second} collides with {first}")]
    IdentifierCollision {
        identifier: String,
        first: String,
        second: String,
    },

    /// Identifier limit leaves no room after the fixed prefix
    #[error("Identifier limit {limit} is too small for prefix '{prefix}'")]
    InvalidIdentifierLimit { limit: usize, prefix: String },

    /// The instance document is not well-formed or carries no namespace
    #[error("Instance could not be parsed: {message}")]
    InstanceParse { message: String },

    /// The instance root element does not match the schema root
    #[error("Instance root <{found}> does not match schema root <{expected}>")]
    RootMismatch { expected: String, found: String },

    /// Strict population refused an instance with validation errors
    #[error("Instance of {namespace} failed validation: {errors}")]
    ValidationFailed {
        namespace: String,
        errors: ValidationErrorSet,
    },

    /// No registered form with this id
    #[error("Schema not found: {form_id}")]
    SchemaNotFound { form_id: i64 },

    /// Submission namespace has no registered form in the domain
    #[error("Namespace {namespace} could not be matched to any registered form in domain '{domain}'")]
    FormNotRegistered { namespace: String, domain: String },

    /// Serialization error (JSON encoding/decoding)
    #[error("Serialization error: {message}")]
    Serialization { message: String },

    /// Generic internal error
    #[error("Internal error: {message}")]
    Internal { message: String },
}

/// Conversion from XFormError to ExError
impl From<XFormError> for ExError {
    fn from(err: XFormError) -> Self {
        let message = err.to_string();
        match err {
            XFormError::SchemaParse { .. } => {
                ExError::new(ExErrorKind::SchemaParse).with_message(message)
            }
            XFormError::MissingNamespace { .. } => {
                ExError::new(ExErrorKind::MissingNamespace).with_message(message)
            }
            XFormError::DuplicateSchema {
                target_namespace, ..
            } => ExError::new(ExErrorKind::DuplicateSchema)
                .with_namespace(target_namespace)
                .with_message(message),
            XFormError::IdentifierCollision { second, .. } => {
                ExError::new(ExErrorKind::IdentifierCollision)
                    .with_xpath(second)
                    .with_message(message)
            }
            XFormError::InvalidIdentifierLimit { .. } => {
                ExError::new(ExErrorKind::InvalidInput).with_message(message)
            }
            XFormError::InstanceParse { .. } => {
                ExError::new(ExErrorKind::InstanceParse).with_message(message)
            }
            XFormError::RootMismatch { .. } => {
                ExError::new(ExErrorKind::ValidationFailed).with_message(message)
            }
            XFormError::ValidationFailed { namespace, errors } => {
                ExError::new(ExErrorKind::ValidationFailed)
                    .with_namespace(namespace)
                    .with_validation(errors)
                    .with_message(message)
            }
            XFormError::SchemaNotFound { form_id } => ExError::new(ExErrorKind::NotFound)
                .with_form_id(form_id)
                .with_message("Schema not found"),
            XFormError::FormNotRegistered { namespace, .. } => {
                ExError::new(ExErrorKind::NotFound)
                    .with_namespace(namespace)
                    .with_message(message)
            }
            XFormError::Serialization { .. } => {
                ExError::new(ExErrorKind::Serialization).with_message(message)
            }
            XFormError::Internal { .. } => {
                ExError::new(ExErrorKind::Internal).with_message(message)
            }
        }
    }
}

impl From<serde_json::Error> for XFormError {
    fn from(err: serde_json::Error) -> Self {
        XFormError::Serialization {
            message: err.to_string(),
        }
    }
}
