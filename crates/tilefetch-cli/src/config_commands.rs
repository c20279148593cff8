//! Configuration management subcommands.

use std::path::PathBuf;

use clap::Subcommand;

/// Configuration management commands.
#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Show the current configuration (token masked)
    Show,
    /// Store the catalog API token
    SetToken {
        /// API token
        token: String,
    },
    /// Set the download location
    SetDir {
        /// Directory downloads are written into
        path: PathBuf,
    },
    /// Set an explicit path to the om CLI
    SetOmPath {
        /// Path to the om binary
        path: PathBuf,
    },
}
