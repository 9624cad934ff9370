//! The `pixtag classify` command.

use clap::Args;
use pixtag_core::{classify, Source};
use serde::Serialize;

/// Arguments for the `classify` command.
#[derive(Args, Debug)]
pub struct ClassifyArgs {
    /// Tags to classify
    #[arg(required = true)]
    pub tags: Vec<String>,

    /// Print one JSON object per tag
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Serialize)]
struct Classification<'a> {
    tag: &'a str,
    source: Source,
}

/// Execute the classify command.
pub fn execute(args: ClassifyArgs) -> anyhow::Result<()> {
    for tag in &args.tags {
        let source = classify(tag);
        if args.json {
            println!("{}", serde_json::to_string(&Classification { tag, source })?);
        } else {
            println!("{:<14} {}", source, tag);
        }
    }
    Ok(())
}
