//! Vendor catalog port.
//!
//! The catalog is an external collaborator: a request/response API that
//! lists products, releases, files, and license agreements given an auth
//! token. The download pipeline only consumes already-resolved values from
//! it, so this module defines the trait and the shapes of its answers.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A catalog product.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: i64,
    pub slug: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
}

/// A product release.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Release {
    pub id: i64,
    pub version: String,
    #[serde(default)]
    pub release_date: String,
    #[serde(default)]
    pub description: String,
}

/// A downloadable file attached to a release.
///
/// Checksums are carried as metadata only; nothing in the pipeline verifies
/// them.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductFile {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub aws_object_key: String,
    #[serde(default)]
    pub file_type: String,
    #[serde(default)]
    pub file_version: String,
    #[serde(default)]
    pub md5: String,
    #[serde(default)]
    pub sha256: String,
}

/// End user license agreement for a release.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Eula {
    pub id: i64,
    pub slug: String,
    pub name: String,
    #[serde(default)]
    pub content: String,
}

/// A release this release depends on.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dependency {
    pub release: Release,
}

/// Product reference inside a dependency specifier.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpecifiedProduct {
    pub id: i64,
    pub slug: String,
    pub name: String,
}

/// Version constraint on a dependent product.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencySpecifier {
    pub id: i64,
    pub specifier: String,
    pub product: SpecifiedProduct,
}

/// Errors reported by a catalog implementation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CatalogError {
    /// No API token configured.
    #[error("API token not set")]
    TokenNotSet,

    /// The catalog answered with a non-success status.
    #[error("API request failed with status {status}: {body}")]
    Http { status: u16, body: String },

    /// The request could not be sent or the response could not be read.
    #[error("Catalog request failed: {0}")]
    Transport(String),

    /// The response body did not have the expected shape.
    #[error("Failed to decode catalog response: {0}")]
    Decode(String),
}

/// Read-only access to the vendor catalog.
#[async_trait]
pub trait CatalogPort: Send + Sync {
    /// List all products.
    async fn list_products(&self) -> Result<Vec<Product>, CatalogError>;

    /// List releases of a product.
    async fn list_releases(&self, product_slug: &str) -> Result<Vec<Release>, CatalogError>;

    /// Fetch the license agreement for a release, if it has one.
    async fn release_eula(
        &self,
        product_slug: &str,
        release_id: i64,
    ) -> Result<Option<Eula>, CatalogError>;

    /// List downloadable files of a release.
    async fn release_files(
        &self,
        product_slug: &str,
        release_id: i64,
    ) -> Result<Vec<ProductFile>, CatalogError>;

    /// List releases this release depends on.
    async fn release_dependencies(
        &self,
        product_slug: &str,
        release_id: i64,
    ) -> Result<Vec<Dependency>, CatalogError>;

    /// List dependency version constraints of a release.
    async fn release_dependency_specifiers(
        &self,
        product_slug: &str,
        release_id: i64,
    ) -> Result<Vec<DependencySpecifier>, CatalogError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn product_file_tolerates_missing_optional_fields() {
        let file: ProductFile =
            serde_json::from_str(r#"{"id": 12, "name": "Tanzu Application Service"}"#).unwrap();
        assert_eq!(file.id, 12);
        assert!(file.aws_object_key.is_empty());
        assert!(file.sha256.is_empty());
    }

    #[test]
    fn http_error_message_includes_body() {
        let err = CatalogError::Http {
            status: 403,
            body: "forbidden".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "API request failed with status 403: forbidden"
        );
    }
}
