//! Job identity and classification.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Opaque identifier for one in-flight transfer.
///
/// Caller-supplied and unique among concurrently active jobs. Product file
/// downloads use the numeric catalog file id; model downloads use the model
/// name chosen by the user.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(String);

impl JobId {
    /// Create a job id from any string-like value.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for JobId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for JobId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<i64> for JobId {
    fn from(value: i64) -> Self {
        Self(value.to_string())
    }
}

/// What a job downloads, which decides how progress is observed and
/// whether a post-processing step runs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    /// One product file fetched by the vendor CLI; progress parsed from stderr.
    SingleFile,
    /// GGUF model split into parts; concatenated after download.
    MultiPartModel,
    /// Directory of model weights; packaged into a flattened archive.
    DirectoryModel,
}

impl JobKind {
    /// Whether progress comes from polling the destination size rather than
    /// parsing the tool's output.
    #[must_use]
    pub const fn uses_size_probe(self) -> bool {
        matches!(self, Self::MultiPartModel | Self::DirectoryModel)
    }

    /// Notification family this kind reports through.
    #[must_use]
    pub const fn family(self) -> JobFamily {
        match self {
            Self::SingleFile => JobFamily::ProductFile,
            Self::MultiPartModel | Self::DirectoryModel => JobFamily::AiModel,
        }
    }
}

/// Notification family, which selects the event channel names.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobFamily {
    /// Catalog product files (tiles, stemcells, ops manager images).
    ProductFile,
    /// HuggingFace model weights.
    AiModel,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn job_id_from_numeric_file_id() {
        let id = JobId::from(4242_i64);
        assert_eq!(id.as_str(), "4242");
        assert_eq!(id.to_string(), "4242");
    }

    #[test]
    fn job_id_serializes_as_plain_string() {
        let id = JobId::new("llama-70b");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"llama-70b\"");
    }

    #[test]
    fn model_kinds_use_size_probe() {
        assert!(!JobKind::SingleFile.uses_size_probe());
        assert!(JobKind::MultiPartModel.uses_size_probe());
        assert!(JobKind::DirectoryModel.uses_size_probe());
    }

    #[test]
    fn kinds_map_to_families() {
        assert_eq!(JobKind::SingleFile.family(), JobFamily::ProductFile);
        assert_eq!(JobKind::DirectoryModel.family(), JobFamily::AiModel);
    }
}
