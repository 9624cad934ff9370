//! Pixtag CLI - resolve image tags from the command line.
//!
//! Pixtag loads an image named by an opaque tag (photo-library asset, remote
//! URL, in-process store key, or local resource) through the same dispatcher
//! a UI would use, and reports what came back.
//!
//! # Usage
//!
//! ```bash
//! # Load a remote image scaled for a 100x100pt view at 2x
//! pixtag load https://example.com/cat.jpg --size 100x100 --scale 2 --mode aspect-fit
//!
//! # Save a photo-library image to disk
//! pixtag load ph://IMG_0001 --output photo.png
//!
//! # See which backend a tag would hit
//! pixtag classify ph://IMG_0001 https://example.com/a.gif logo
//!
//! # View configuration
//! pixtag config show
//! ```

use clap::{Parser, Subcommand};

mod cli;
mod logging;

/// Pixtag - tag-dispatched image loading.
#[derive(Parser, Debug)]
#[command(name = "pixtag")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose (debug) logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output logs in JSON format
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Load an image by tag and report the result
    Load(cli::load::LoadArgs),

    /// Show which source each tag dispatches to
    Classify(cli::classify::ClassifyArgs),

    /// View and manage configuration
    Config(cli::config::ConfigArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Logging isn't initialized yet, so use eprintln for config warnings.
    let config = match pixtag_core::Config::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!(
                "Warning: Failed to load config: {e}\n  \
                 Using default configuration. Check your config file with `pixtag config path`."
            );
            pixtag_core::Config::default()
        }
    };
    logging::init_from_config(&config, cli.verbose, cli.json_logs);

    tracing::debug!("Pixtag v{}", pixtag_core::VERSION);

    match cli.command {
        Commands::Load(args) => cli::load::execute(args, &config).await,
        Commands::Classify(args) => cli::classify::execute(args),
        Commands::Config(args) => cli::config::execute(args).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_parses_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["pixtag", "classify", "logo", "--verbose"]).unwrap();
        assert!(cli.verbose);
        assert!(!cli.json_logs);
        assert!(matches!(cli.command, Commands::Classify(_)));
    }

    #[test]
    fn cli_requires_subcommand() {
        assert!(Cli::try_parse_from(["pixtag"]).is_err());
    }
}
