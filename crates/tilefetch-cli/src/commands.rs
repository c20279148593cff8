//! Top-level subcommands.

use std::path::PathBuf;

use clap::Subcommand;

use crate::config_commands::ConfigCommand;

#[derive(Subcommand)]
pub enum Commands {
    /// Download a product file with the om CLI
    Product {
        /// Product slug, e.g. elastic-runtime
        slug: String,
        /// Release id
        release_id: i64,
        /// Product file id
        file_id: i64,
        /// Catalog snapshot (JSON) to resolve the release and file from
        #[arg(long)]
        catalog: PathBuf,
        /// Output directory (defaults to the configured download location)
        #[arg(short = 'o', long)]
        output: Option<PathBuf>,
    },
    /// Download a GGUF model from HuggingFace and merge its parts
    Gguf {
        /// Folder URL, e.g. https://huggingface.co/owner/repo/tree/main/Q4_K_M
        url: String,
        /// Model name; used for the directory and merged file name
        name: String,
    },
    /// Download a vLLM model from HuggingFace and package it as .tar.gz
    Vllm {
        /// Repository URL, e.g. https://huggingface.co/owner/repo
        url: String,
        /// Model name; used for the archive name
        name: String,
    },
    /// Browse a catalog snapshot
    Catalog {
        /// Catalog snapshot (JSON)
        #[arg(long)]
        catalog: PathBuf,
        #[command(subcommand)]
        command: CatalogCommand,
    },
    /// Show or change configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

/// Catalog browsing commands.
#[derive(Subcommand)]
pub enum CatalogCommand {
    /// List products
    Products,
    /// List releases of a product
    Releases {
        /// Product slug
        slug: String,
    },
    /// Show files, EULA, and dependencies of a release
    Release {
        /// Product slug
        slug: String,
        /// Release id
        release_id: i64,
    },
}

#[cfg(test)]
mod tests {
    use crate::Cli;
    use clap::Parser;

    use super::*;

    #[test]
    fn product_requires_catalog() {
        assert!(Cli::try_parse_from(["tilefetch", "product", "cf", "1", "2"]).is_err());
        let cli = Cli::parse_from([
            "tilefetch", "product", "cf", "1", "2", "--catalog", "c.json", "-o", "/dl",
        ]);
        match cli.command {
            Commands::Product {
                slug,
                release_id,
                file_id,
                output,
                ..
            } => {
                assert_eq!(slug, "cf");
                assert_eq!((release_id, file_id), (1, 2));
                assert_eq!(output, Some(PathBuf::from("/dl")));
            }
            _ => panic!("expected product command"),
        }
    }

    #[test]
    fn catalog_release_takes_slug_and_id() {
        let cli = Cli::parse_from([
            "tilefetch", "catalog", "--catalog", "c.json", "release", "cf", "10",
        ]);
        assert!(matches!(
            cli.command,
            Commands::Catalog {
                command: CatalogCommand::Release { release_id: 10, .. },
                ..
            }
        ));
    }

    #[test]
    fn model_commands_take_url_and_name() {
        let cli = Cli::parse_from(["tilefetch", "vllm", "https://huggingface.co/o/r", "r"]);
        assert!(matches!(cli.command, Commands::Vllm { ref name, .. } if name == "r"));
    }
}
