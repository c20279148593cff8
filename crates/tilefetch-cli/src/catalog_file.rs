//! Catalog backed by a JSON snapshot file.
//!
//! Lets product downloads be planned without a live catalog connection:
//!
//! ```json
//! {
//!   "products": [{"id": 1, "slug": "cf", "name": "TAS"}],
//!   "releases": {"cf": [{"id": 10, "version": "6.0.1"}]},
//!   "files": {"cf/10": [{"id": 100, "name": "TAS", "aws_object_key": "x/cf-6.0.1.pivotal"}]}
//! }
//! ```
//!
//! Per-release maps are keyed by `<slug>/<release_id>`.

use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;
use serde::Deserialize;
use tilefetch_core::{
    CatalogError, CatalogPort, Dependency, DependencySpecifier, Eula, Product, ProductFile,
    Release,
};

/// Deserialized snapshot contents.
#[derive(Debug, Default, Deserialize)]
pub struct CatalogSnapshot {
    #[serde(default)]
    pub products: Vec<Product>,
    #[serde(default)]
    pub releases: HashMap<String, Vec<Release>>,
    #[serde(default)]
    pub files: HashMap<String, Vec<ProductFile>>,
    #[serde(default)]
    pub eulas: HashMap<String, Eula>,
    #[serde(default)]
    pub dependencies: HashMap<String, Vec<Dependency>>,
    #[serde(default)]
    pub dependency_specifiers: HashMap<String, Vec<DependencySpecifier>>,
}

/// [`CatalogPort`] over a [`CatalogSnapshot`].
#[derive(Debug, Default)]
pub struct FileCatalog {
    snapshot: CatalogSnapshot,
}

fn release_key(slug: &str, release_id: i64) -> String {
    format!("{slug}/{release_id}")
}

impl FileCatalog {
    pub const fn new(snapshot: CatalogSnapshot) -> Self {
        Self { snapshot }
    }

    /// Read a snapshot from disk.
    pub fn load(path: &Path) -> Result<Self, CatalogError> {
        let data = std::fs::read_to_string(path)
            .map_err(|e| CatalogError::Transport(format!("{}: {e}", path.display())))?;
        let snapshot =
            serde_json::from_str(&data).map_err(|e| CatalogError::Decode(e.to_string()))?;
        Ok(Self::new(snapshot))
    }

    fn per_release<T: Clone>(
        map: &HashMap<String, Vec<T>>,
        slug: &str,
        release_id: i64,
    ) -> Vec<T> {
        map.get(&release_key(slug, release_id))
            .cloned()
            .unwrap_or_default()
    }
}

#[async_trait]
impl CatalogPort for FileCatalog {
    async fn list_products(&self) -> Result<Vec<Product>, CatalogError> {
        Ok(self.snapshot.products.clone())
    }

    async fn list_releases(&self, product_slug: &str) -> Result<Vec<Release>, CatalogError> {
        Ok(self
            .snapshot
            .releases
            .get(product_slug)
            .cloned()
            .unwrap_or_default())
    }

    async fn release_eula(
        &self,
        product_slug: &str,
        release_id: i64,
    ) -> Result<Option<Eula>, CatalogError> {
        Ok(self
            .snapshot
            .eulas
            .get(&release_key(product_slug, release_id))
            .cloned())
    }

    async fn release_files(
        &self,
        product_slug: &str,
        release_id: i64,
    ) -> Result<Vec<ProductFile>, CatalogError> {
        Ok(Self::per_release(&self.snapshot.files, product_slug, release_id))
    }

    async fn release_dependencies(
        &self,
        product_slug: &str,
        release_id: i64,
    ) -> Result<Vec<Dependency>, CatalogError> {
        Ok(Self::per_release(
            &self.snapshot.dependencies,
            product_slug,
            release_id,
        ))
    }

    async fn release_dependency_specifiers(
        &self,
        product_slug: &str,
        release_id: i64,
    ) -> Result<Vec<DependencySpecifier>, CatalogError> {
        Ok(Self::per_release(
            &self.snapshot.dependency_specifiers,
            product_slug,
            release_id,
        ))
    }
}
