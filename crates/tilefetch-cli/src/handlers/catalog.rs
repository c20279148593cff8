//! Catalog browsing handler.

use std::io::Write;

use anyhow::Result;
use tilefetch_core::CatalogPort;

use crate::commands::CatalogCommand;

/// Execute a catalog command, printing to `out`.
pub async fn execute(
    catalog: &dyn CatalogPort,
    command: CatalogCommand,
    out: &mut impl Write,
) -> Result<()> {
    match command {
        CatalogCommand::Products => {
            for product in catalog.list_products().await? {
                writeln!(out, "{:<8} {:<32} {}", product.id, product.slug, product.name)?;
            }
        }
        CatalogCommand::Releases { slug } => {
            for release in catalog.list_releases(&slug).await? {
                writeln!(
                    out,
                    "{:<8} {:<16} {}",
                    release.id, release.version, release.release_date
                )?;
            }
        }
        CatalogCommand::Release { slug, release_id } => {
            show_release(catalog, &slug, release_id, out).await?;
        }
    }
    Ok(())
}

async fn show_release(
    catalog: &dyn CatalogPort,
    slug: &str,
    release_id: i64,
    out: &mut impl Write,
) -> Result<()> {
    writeln!(out, "Files:")?;
    for file in catalog.release_files(slug, release_id).await? {
        writeln!(out, "  {:<8} {}", file.id, file.name)?;
    }

    match catalog.release_eula(slug, release_id).await? {
        Some(eula) => writeln!(out, "EULA: {} ({})", eula.name, eula.slug)?,
        None => writeln!(out, "EULA: none")?,
    }

    let dependencies = catalog.release_dependencies(slug, release_id).await?;
    if !dependencies.is_empty() {
        writeln!(out, "Depends on releases:")?;
        for dependency in dependencies {
            writeln!(
                out,
                "  {:<8} {}",
                dependency.release.id, dependency.release.version
            )?;
        }
    }

    let specifiers = catalog
        .release_dependency_specifiers(slug, release_id)
        .await?;
    if !specifiers.is_empty() {
        writeln!(out, "Requires:")?;
        for spec in specifiers {
            writeln!(out, "  {} {}", spec.product.slug, spec.specifier)?;
        }
    }
    Ok(())
}
