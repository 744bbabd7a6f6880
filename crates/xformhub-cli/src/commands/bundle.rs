//! Bundle validation command

use std::path::Path;

use clap::{Args, Subcommand};
use xformhub_engine::{BundleValidator, DirectoryExtractor, RegistryOptions};

#[derive(Debug, Args)]
pub struct BundleArgs {
    #[command(subcommand)]
    pub command: BundleCommand,
}

#[derive(Debug, Subcommand)]
pub enum BundleCommand {
    /// Check every *.xsd file under a directory
    Validate(ValidateArgs),
}

#[derive(Debug, Args)]
pub struct ValidateArgs {
    pub dir: String,

    /// TOML file with registry options
    #[arg(long)]
    pub config: Option<String>,
}

pub fn execute(args: BundleArgs) -> Result<(), Box<dyn std::error::Error>> {
    match args.command {
        BundleCommand::Validate(args) => execute_validate(args),
    }
}

fn execute_validate(args: ValidateArgs) -> Result<(), Box<dyn std::error::Error>> {
    let options = match &args.config {
        Some(path) => RegistryOptions::load(path)?,
        None => RegistryOptions::default(),
    };
    let validator = BundleValidator::new(&options)?;

    match validator.validate(&DirectoryExtractor, Path::new(&args.dir)) {
        Ok(report) => {
            for form in &report.forms {
                println!("ok: {} ({})", form.file_name, form.namespace);
                for warning in &form.warnings {
                    println!("  warning: {}", warning);
                }
            }
            println!("{} form(s) valid", report.forms.len());
            Ok(())
        }
        Err(err) => {
            for form in &err.errors {
                println!("error: {}", form);
            }
            Err(err.into())
        }
    }
}
