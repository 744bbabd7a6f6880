//! Schema commands

use std::fs::File;
use std::io::BufReader;

use clap::{Args, Subcommand};
use xformhub_core::xsd;
use xformhub_engine::schema_diagnostics;

use super::StoreArgs;

#[derive(Debug, Args)]
pub struct SchemaArgs {
    #[command(subcommand)]
    pub command: SchemaCommand,
}

#[derive(Debug, Subcommand)]
pub enum SchemaCommand {
    /// Register a schema and create its tables
    Add(AddArgs),
    /// Unregister a schema and drop its tables
    Remove(RemoveArgs),
    /// List registered schemas
    List(ListArgs),
    /// Report problems in a schema without registering it
    Check(CheckArgs),
    /// Compare two schemas
    Diff(DiffArgs),
}

#[derive(Debug, Args)]
pub struct AddArgs {
    /// Path to the XSD file
    pub xsd: String,

    #[arg(long)]
    pub domain: String,

    /// Display name; defaults to the form's root element name
    #[arg(long, default_value = "")]
    pub name: String,

    #[command(flatten)]
    pub store: StoreArgs,
}

#[derive(Debug, Args)]
pub struct RemoveArgs {
    pub id: i64,

    #[command(flatten)]
    pub store: StoreArgs,
}

#[derive(Debug, Args)]
pub struct ListArgs {
    #[command(flatten)]
    pub store: StoreArgs,
}

#[derive(Debug, Args)]
pub struct CheckArgs {
    pub xsd: String,

    /// TOML file with registry options
    #[arg(long)]
    pub config: Option<String>,
}

#[derive(Debug, Args)]
pub struct DiffArgs {
    pub old: String,
    pub new: String,
}

pub fn execute(args: SchemaArgs) -> Result<(), Box<dyn std::error::Error>> {
    match args.command {
        SchemaCommand::Add(args) => execute_add(args),
        SchemaCommand::Remove(args) => execute_remove(args),
        SchemaCommand::List(args) => execute_list(args),
        SchemaCommand::Check(args) => execute_check(args),
        SchemaCommand::Diff(args) => execute_diff(args),
    }
}

fn execute_add(args: AddArgs) -> Result<(), Box<dyn std::error::Error>> {
    let registry = args.store.open()?;
    let file = BufReader::new(File::open(&args.xsd)?);
    let record = registry.add_schema(&args.name, file, &args.domain)?;

    println!("Schema registered:");
    println!("  id: {}", record.id);
    println!("  namespace: {}", record.target_namespace);
    println!("  domain: {}", record.domain);
    if let Some(version) = record.version {
        println!("  version: {}", version);
    }
    println!("  tables:");
    for table in record.layout.table_names() {
        println!("    {}", table);
    }
    Ok(())
}

fn execute_remove(args: RemoveArgs) -> Result<(), Box<dyn std::error::Error>> {
    let registry = args.store.open()?;
    let record = registry.remove_schema(args.id)?;
    println!(
        "Schema {} removed ({} tables dropped)",
        record.id,
        record.layout.tables.len()
    );
    Ok(())
}

fn execute_list(args: ListArgs) -> Result<(), Box<dyn std::error::Error>> {
    let registry = args.store.open()?;
    let records = registry.list_schemas()?;
    if records.is_empty() {
        println!("No schemas registered");
        return Ok(());
    }
    for record in records {
        let version = record
            .version
            .map(|v| v.to_string())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{}\t{}\t{}\tv{}\t{}",
            record.id, record.domain, record.target_namespace, version, record.display_name
        );
    }
    Ok(())
}

fn execute_check(args: CheckArgs) -> Result<(), Box<dyn std::error::Error>> {
    let options = match &args.config {
        Some(path) => xformhub_engine::RegistryOptions::load(path)?,
        None => xformhub_engine::RegistryOptions::default(),
    };
    let form = xsd::parse(BufReader::new(File::open(&args.xsd)?))?;
    let check = schema_diagnostics(&form, &options.form_check_options(), &options.sanitizer()?);

    for error in &check.errors {
        println!("error: {}", error);
    }
    for warning in &check.warnings {
        println!("warning: {}", warning);
    }
    if !check.is_ok() {
        return Err(format!("{} has {} error(s)", args.xsd, check.errors.len()).into());
    }
    println!("{} is valid ({})", args.xsd, form.target_namespace);
    Ok(())
}

fn execute_diff(args: DiffArgs) -> Result<(), Box<dyn std::error::Error>> {
    let old = xsd::parse(BufReader::new(File::open(&args.old)?))?;
    let new = xsd::parse(BufReader::new(File::open(&args.new)?))?;
    if old.is_compatible_with(&new) {
        println!("no differences");
        return Ok(());
    }
    if old.target_namespace != new.target_namespace {
        println!("namespace: {} -> {}", old.target_namespace, new.target_namespace);
    }
    println!("{}", old.differences(&new));
    Ok(())
}
