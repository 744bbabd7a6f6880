//! xformhub core
//!
//! Pure, storage-independent pieces of the form pipeline:
//!
//! - [`xsd`]: XSD parser producing a [`model::FormDef`]
//! - [`sanitize`]: storage identifier sanitizer
//! - [`model`]: schema arena, simple types, table layout planning, differences
//! - [`validation`]: instance validator and registration-time form checks
//! - [`router`]: namespace to handler dispatch
//! - [`errors`] and [`logging_facility`]: the ambient error and logging stack

pub mod errors;
pub mod instance;
pub mod logging_facility;
pub mod model;
pub mod router;
pub mod sanitize;
pub mod validation;
pub mod xsd;

// Used by the logging macros
pub use xformhub_core_types;

pub use errors::{ExError, ExErrorKind, Result, XFormError};
pub use model::{DataType, ElementDef, ElementId, FormDef, SchemaNode, TableLayout};
pub use router::{Attachment, FnHandler, NamespaceRouter, SubmissionHandler};
pub use sanitize::IdentifierSanitizer;
pub use validation::{ExtraFieldPolicy, ValidationErrorSet};
