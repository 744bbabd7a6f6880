//! xformhub store - SQLite persistence for registered forms
//!
//! Provides:
//! - Connection management and embedded, checksummed migrations
//! - The dynamic table manager (DDL for each form's table tree)
//! - Form metadata and instance repositories
//! - The instance populator and instance removal

pub mod db;
pub mod errors;
pub mod migrations;
pub mod populate;
pub mod repo;
pub mod tables;

pub use errors::Result;
pub use populate::{populate, remove_instance, PopulateMode, PopulateOptions, PopulateOutcome};
pub use repo::{FormRecord, FormRepo, InstanceRecord, InstanceRepo, MetaValue, NewInstance};
