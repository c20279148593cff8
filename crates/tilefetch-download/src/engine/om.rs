//! Product file downloads through the vendor `om` CLI.

use std::path::{Path, PathBuf};

use tilefetch_core::{CatalogPort, JobId, JobKind, ProductFile, TransferError};
use tracing::debug;

use crate::process::CommandSpec;
use crate::session::TransferRequest;

/// How a product's files are named and selected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProductCategory {
    Stemcell,
    OpsManager,
    Tile,
}

impl ProductCategory {
    /// Classify by product slug.
    #[must_use]
    pub fn from_slug(slug: &str) -> Self {
        let slug = slug.to_lowercase();
        if slug.contains("stemcell") {
            Self::Stemcell
        } else if slug.contains("ops-manager") {
            Self::OpsManager
        } else {
            Self::Tile
        }
    }
}

/// IaaS named in a stemcell file name; vSphere when none is recognized.
#[must_use]
pub fn stemcell_iaas(file_name: &str) -> &'static str {
    let name = file_name.to_lowercase();
    ["vsphere", "aws", "azure", "google"]
        .into_iter()
        .find(|iaas| name.contains(iaas))
        .unwrap_or("vsphere")
}

/// IaaS named in an Ops Manager file name; vSphere when none is recognized.
#[must_use]
pub fn ops_manager_iaas(file_name: &str) -> &'static str {
    let name = file_name.to_lowercase();
    if name.contains("vsphere") {
        "vsphere"
    } else if name.contains("aws") {
        "aws"
    } else if name.contains("azure") {
        "azure"
    } else if name.contains("gcp") || name.contains("google") {
        "gcp"
    } else if name.contains("openstack") {
        "openstack"
    } else {
        "vsphere"
    }
}

/// The `-f` glob `om` should match for this file.
#[must_use]
pub fn select_file_glob(category: ProductCategory, file: &ProductFile) -> String {
    match category {
        ProductCategory::Stemcell => format!("*{}*", stemcell_iaas(&file.name)),
        ProductCategory::OpsManager => format!("*{}*", ops_manager_iaas(&file.name)),
        ProductCategory::Tile => {
            let key_name = file
                .aws_object_key
                .rsplit('/')
                .next()
                .filter(|name| !name.is_empty());
            if let Some(name) = key_name {
                name.to_string()
            } else if file.name.contains('*') || file.name.ends_with(".pivotal") {
                file.name.clone()
            } else {
                "*.pivotal".to_string()
            }
        }
    }
}

/// A resolved product file download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductDownload {
    pub file_id: i64,
    pub slug: String,
    pub version: String,
    pub file_name: String,
    pub category: ProductCategory,
    pub file_glob: String,
    pub output_dir: PathBuf,
}

impl ProductDownload {
    /// `om download-product` invocation.
    #[must_use]
    pub fn command(&self, om: &Path, token: &str) -> CommandSpec {
        let output_dir = self.output_dir.display().to_string();
        CommandSpec::new(om).args([
            "download-product",
            "-t",
            token,
            "-p",
            self.slug.as_str(),
            "--product-version",
            self.version.as_str(),
            "-f",
            self.file_glob.as_str(),
            "-o",
            output_dir.as_str(),
        ])
    }

    /// Session request; progress comes from the tool's stderr.
    #[must_use]
    pub fn into_request(self, om: &Path, token: &str) -> TransferRequest {
        let command = self.command(om, token);
        TransferRequest::new(
            JobId::from(self.file_id),
            JobKind::SingleFile,
            command,
            self.output_dir,
        )
    }
}

/// Resolve release version and file through the catalog and pick the glob.
pub async fn plan_product_download(
    catalog: &dyn CatalogPort,
    token: &str,
    slug: &str,
    release_id: i64,
    file_id: i64,
    output_dir: &Path,
) -> Result<ProductDownload, TransferError> {
    if token.trim().is_empty() {
        return Err(TransferError::invalid("API token not set"));
    }

    let releases = catalog
        .list_releases(slug)
        .await
        .map_err(|e| TransferError::Catalog(format!("failed to get releases: {e}")))?;
    let version = releases
        .into_iter()
        .find(|release| release.id == release_id)
        .map(|release| release.version)
        .filter(|version| !version.is_empty())
        .ok_or_else(|| {
            TransferError::invalid(format!("could not find release version for ID {release_id}"))
        })?;

    let files = catalog
        .release_files(slug, release_id)
        .await
        .map_err(|e| TransferError::Catalog(format!("failed to get files: {e}")))?;
    let file = files
        .into_iter()
        .find(|file| file.id == file_id)
        .filter(|file| !file.name.is_empty())
        .ok_or_else(|| TransferError::invalid(format!("could not find file name for ID {file_id}")))?;

    let category = ProductCategory::from_slug(slug);
    let file_glob = select_file_glob(category, &file);
    debug!(%slug, %version, ?category, %file_glob, "Planned product download");

    Ok(ProductDownload {
        file_id,
        slug: slug.to_string(),
        version,
        file_name: file.name,
        category,
        file_glob,
        output_dir: output_dir.to_path_buf(),
    })
}
