//! Command-line frontend for tilefetch.
#![deny(unsafe_code)]
#![deny(unused_crate_dependencies)]

// Used by the binary only
use dotenvy as _;
use tracing_subscriber as _;

pub mod catalog_file;
pub mod commands;
pub mod config_commands;
pub mod handlers;
pub mod parser;
pub mod sink;

pub use catalog_file::{CatalogSnapshot, FileCatalog};
pub use commands::{CatalogCommand, Commands};
pub use config_commands::ConfigCommand;
pub use parser::Cli;
pub use sink::JsonLinesSink;
