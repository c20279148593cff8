//! Root CLI structure with global options.

use std::path::PathBuf;

use clap::Parser;

use crate::commands::Commands;

/// Download vendor product files and `HuggingFace` models with live progress.
#[derive(Parser)]
#[command(name = "tilefetch")]
#[command(about = "Download product files and AI models with progress and cancellation")]
#[command(version)]
pub struct Cli {
    /// Use this config file instead of ~/.tilefetch/config.json
    #[arg(long = "config", global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose/debug output
    #[arg(short = 'v', long = "verbose", global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_parser_builds() {
        Cli::command().debug_assert();
    }

    #[test]
    fn global_args_after_subcommand() {
        let cli = Cli::parse_from(["tilefetch", "config", "show", "-v", "--config", "/tmp/c.json"]);
        assert!(cli.verbose);
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/c.json")));
    }
}
