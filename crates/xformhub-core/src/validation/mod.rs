//! Instance validation and registration-time form checks

pub mod error_set;
pub mod form_checks;
pub mod validator;

pub use error_set::{ExtraFieldPolicy, ValidationErrorSet};
pub use form_checks::{
    check_form, FormCheckOptions, IssueKind, SchemaCheck, SchemaIssue, DEFAULT_META_FIELDS,
};
pub use validator::{schema_errors, validate, validate_document};
