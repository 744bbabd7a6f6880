//! xformhub CLI
//!
//! Command-line interface for the form schema registry

use clap::{Parser, Subcommand};
use xformhub_core::logging_facility::{init, Profile};

mod commands;

#[derive(Debug, Parser)]
#[command(name = "xformhub")]
#[command(about = "xformhub - XForm schema registry", long_about = None)]
struct Cli {
    /// Emit debug logs on stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Register, remove, list, check and compare schemas
    Schema(commands::schema::SchemaArgs),
    /// Store an instance document
    Submit(commands::submit::SubmitArgs),
    /// Validate a bundle of form schemas
    Bundle(commands::bundle::BundleArgs),
}

fn main() {
    let cli = Cli::parse();
    if cli.verbose {
        init(Profile::Development);
    }

    let result = match cli.command {
        Commands::Schema(args) => commands::schema::execute(args),
        Commands::Submit(args) => commands::submit::execute(args),
        Commands::Bundle(args) => commands::bundle::execute(args),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
