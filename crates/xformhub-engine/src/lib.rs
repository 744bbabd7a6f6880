//! xformhub engine - orchestration layer
//!
//! Coordinates the pure core (parser, planner, validator, router) with the
//! store. The [`SchemaRegistry`] is the composition root: it owns the
//! connection, shares a [`NamespaceRouter`](xformhub_core::NamespaceRouter)
//! and wires a population handler per registered form.

pub mod bundle;
pub mod handler;
pub mod options;
pub mod registry;

pub use bundle::{
    validate_jar, BuildError, BuildErrorKind, BundleExtractor, BundleForm, BundleValidator,
    BundleReport, DirectoryExtractor, FormBuildError,
};
pub use handler::{handler_name, PopulationHandler};
pub use options::RegistryOptions;
pub use registry::{schema_diagnostics, SchemaRegistry, SubmitOutcome};
