//! Subcommands

pub mod bundle;
pub mod schema;
pub mod submit;

use std::sync::Arc;

use clap::Args;
use xformhub_core::NamespaceRouter;
use xformhub_engine::{RegistryOptions, SchemaRegistry};

/// Where the registry lives and how it is configured
#[derive(Debug, Args)]
pub struct StoreArgs {
    #[arg(long, default_value = ".xformhub/store.db")]
    pub db: String,

    /// TOML file with registry options
    #[arg(long)]
    pub config: Option<String>,
}

impl StoreArgs {
    pub fn options(&self) -> Result<RegistryOptions, Box<dyn std::error::Error>> {
        match &self.config {
            Some(path) => Ok(RegistryOptions::load(path)?),
            None => Ok(RegistryOptions::default()),
        }
    }

    /// Open the registry and route every persisted form
    pub fn open(&self) -> Result<SchemaRegistry, Box<dyn std::error::Error>> {
        let registry =
            SchemaRegistry::open(&self.db, Arc::new(NamespaceRouter::new()), self.options()?)?;
        registry.restore_routes()?;
        Ok(registry)
    }
}
