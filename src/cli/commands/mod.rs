//! CLI commands implementation.
//!
//! This module contains the CLI parser and dispatches to command-specific modules.

mod check;
mod extract;
mod normalize;
mod parse;
mod preprocess;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use timingboard::ExtractionConfig;

#[derive(Parser)]
#[command(name = "timingboard")]
#[command(about = "Extract departures from photos of bus timing boards")]
#[command(version)]
pub struct Cli {
    /// Config file path (overrides $TIMINGBOARD_CONFIG and auto-discovery)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Check if verbose mode is enabled (for early logging setup).
pub fn is_verbose() -> bool {
    std::env::args().any(|arg| arg == "-v" || arg == "--verbose")
}

#[derive(Subcommand)]
enum Commands {
    /// Extract timings from a board photo (remote chain, then local OCR)
    Extract {
        /// Image path or http(s) URL
        image: String,
        /// Where the board is, if known
        #[arg(short, long)]
        origin: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Parse raw OCR text of a board (use - for stdin)
    ParseText {
        file: PathBuf,
        /// Where the board is, if known
        #[arg(short, long)]
        origin: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Parse a vision model's line-protocol response (use - for stdin)
    ParseProtocol {
        file: PathBuf,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Binarize an image the way local OCR sees it
    Preprocess {
        /// Image path or http(s) URL
        image: String,
        /// Where to write the binarized image (format from extension)
        output: PathBuf,
    },

    /// Show which extraction engines are usable
    Check {
        /// Also print the effective configuration (secrets masked)
        #[arg(long)]
        show_config: bool,
    },

    /// Print canonical names for place names
    Normalize {
        #[arg(required = true)]
        names: Vec<String>,
    },
}

/// Run the CLI.
pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = ExtractionConfig::load(cli.config.as_deref()).await?;

    match cli.command {
        Commands::Extract {
            image,
            origin,
            json,
        } => extract::cmd_extract(&config, &image, origin.as_deref(), json).await,
        Commands::ParseText { file, origin, json } => {
            parse::cmd_parse_text(&config, &file, origin.as_deref(), json)
        }
        Commands::ParseProtocol { file, json } => parse::cmd_parse_protocol(&file, json),
        Commands::Preprocess { image, output } => {
            preprocess::cmd_preprocess(&config, &image, &output).await
        }
        Commands::Check { show_config } => check::cmd_check(&config, show_config).await,
        Commands::Normalize { names } => normalize::cmd_normalize(&names),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_extract_args() {
        let cli = Cli::try_parse_from([
            "timingboard",
            "-v",
            "extract",
            "board.jpg",
            "--origin",
            "Madurai",
            "--json",
        ])
        .unwrap();
        assert!(cli.verbose);
        match cli.command {
            Commands::Extract {
                image,
                origin,
                json,
            } => {
                assert_eq!(image, "board.jpg");
                assert_eq!(origin.as_deref(), Some("Madurai"));
                assert!(json);
            }
            _ => panic!("expected extract"),
        }
    }

    #[test]
    fn test_normalize_requires_a_name() {
        assert!(Cli::try_parse_from(["timingboard", "normalize"]).is_err());
    }
}
