//! Metadata repositories
//!
//! Persist registered forms (`form_defs`, `element_defs`) and populated
//! instances (`form_instances`, `instance_meta`).

mod form_repo;
mod instance_repo;

pub use form_repo::{FormRecord, FormRepo};
pub use instance_repo::{InstanceRecord, InstanceRepo, MetaValue, NewInstance};
