//! CLI entry point.

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use tilefetch_cli::{Cli, Commands, FileCatalog, JsonLinesSink, handlers};
use tilefetch_core::ConfigStore;
use tilefetch_download::DownloadService;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    // Logs go to stderr; stdout carries the event stream
    let default_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let store = match cli.config {
        Some(path) => ConfigStore::at_path(path),
        None => ConfigStore::at_home()?,
    };
    let config = store.load()?.with_env_overrides();

    match cli.command {
        Commands::Config { command } => handlers::config::execute(&store, &config, command)?,
        Commands::Catalog { catalog, command } => {
            let catalog = FileCatalog::load(&catalog)
                .with_context(|| format!("Failed to load catalog {}", catalog.display()))?;
            handlers::catalog::execute(&catalog, command, &mut std::io::stdout().lock()).await?;
        }
        Commands::Product {
            slug,
            release_id,
            file_id,
            catalog,
            output,
        } => {
            let service = DownloadService::new(config, Arc::new(JsonLinesSink::stdout()));
            handlers::download::execute_product(
                &service,
                &slug,
                release_id,
                file_id,
                &catalog,
                output.as_deref(),
            )
            .await?;
        }
        Commands::Gguf { url, name } => {
            let service = DownloadService::new(config, Arc::new(JsonLinesSink::stdout()));
            handlers::download::execute_gguf(&service, &url, &name).await?;
        }
        Commands::Vllm { url, name } => {
            let service = DownloadService::new(config, Arc::new(JsonLinesSink::stdout()));
            handlers::download::execute_vllm(&service, &url, &name).await?;
        }
    }

    Ok(())
}
