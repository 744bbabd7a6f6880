//! Submit command

use clap::Args;
use xformhub_core::router::Attachment;

use super::StoreArgs;

#[derive(Debug, Args)]
pub struct SubmitArgs {
    /// Path to the instance XML
    pub xml: String,

    #[arg(long)]
    pub domain: String,

    /// Receiver-assigned attachment id recorded with the instance
    #[arg(long)]
    pub attachment_id: Option<String>,

    #[command(flatten)]
    pub store: StoreArgs,
}

pub fn execute(args: SubmitArgs) -> Result<(), Box<dyn std::error::Error>> {
    let registry = args.store.open()?;
    let content = std::fs::read_to_string(&args.xml)?;

    let mut attachment = Attachment::new(&args.domain, content);
    if let Some(id) = args.attachment_id {
        attachment = attachment.with_id(id);
    }

    let outcome = registry.submit(&attachment)?;
    if outcome.handlers == 0 {
        return Err(format!(
            "no schema registered for namespace {} in domain {}",
            outcome.namespace, args.domain
        )
        .into());
    }

    println!("Submission stored:");
    println!("  namespace: {}", outcome.namespace);
    if let Some(version) = outcome.version {
        println!("  version: {}", version);
    }
    println!("  request_id: {}", attachment.request_id);
    Ok(())
}
