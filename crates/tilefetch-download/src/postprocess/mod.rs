//! Post-download assembly steps.
//!
//! Both steps are blocking filesystem work and run on the blocking pool.
//! They observe the job's cancellation signal and write their output under
//! a `.partial` name that is renamed into place only on success.

mod archive;
mod cancellable;
mod concat;

use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tilefetch_core::{ProgressSample, TransferError};
use tokio_util::sync::CancellationToken;
use tracing::warn;

pub use archive::{collect_root_files, write_flat_archive};
pub use cancellable::{CancellableReader, DEFAULT_CHECK_INTERVAL, ReadCancelled, is_cancelled_read};
pub use concat::{concatenate_parts, find_part_files};

/// Extension of model part files.
pub const GGUF_EXTENSION: &str = "gguf";

/// Suffix appended to outputs while they are being written.
pub const PARTIAL_SUFFIX: &str = ".partial";

/// Errors from a post-processing step.
#[derive(Debug, Error)]
pub enum PostProcessError {
    /// The job's signal fired mid-operation; partial output was removed.
    #[error("post-processing cancelled")]
    Cancelled,

    /// Nothing to assemble.
    #[error("No artifacts found in {}", .0.display())]
    NoArtifacts(PathBuf),

    /// Filesystem failure.
    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: io::Error,
    },

    /// The blocking task panicked or was aborted.
    #[error("post-processing task failed: {0}")]
    Task(String),
}

impl PostProcessError {
    /// Classify an I/O error: reads aborted by the cancel token become
    /// `Cancelled`.
    pub(crate) fn from_io(context: impl Into<String>, source: io::Error) -> Self {
        if is_cancelled_read(&source) {
            Self::Cancelled
        } else {
            Self::Io {
                context: context.into(),
                source,
            }
        }
    }

    /// Convert into the pipeline error. `None` for cancellation, which is an
    /// outcome rather than an error.
    #[must_use]
    pub fn into_transfer_error(self) -> Option<TransferError> {
        match self {
            Self::Cancelled => None,
            Self::NoArtifacts(path) => Some(TransferError::no_artifacts(&path)),
            Self::Io { context, source } => Some(TransferError::from_io(context, &source)),
            Self::Task(message) => Some(TransferError::Io {
                context: "post-processing".to_string(),
                kind: "Other".to_string(),
                message,
            }),
        }
    }
}

/// Progress callback for post-processing steps.
pub type PostProgress = Box<dyn Fn(ProgressSample) + Send + 'static>;

/// The assembly step a model job needs after its download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PostProcessor {
    /// Merge `*.gguf` parts under the destination into `<name>.gguf`.
    ConcatenateParts {
        /// Base name of the merged file, without extension.
        output_name: String,
    },
    /// Pack the destination root's files into a flat `.tar.gz`.
    FlattenArchive {
        /// Archive path.
        output: PathBuf,
        /// Bytes between cancellation checks while copying.
        check_interval: u64,
    },
}

impl PostProcessor {
    /// Concatenation into `<source>/<output_name>.gguf`.
    pub fn concatenate(output_name: impl Into<String>) -> Self {
        Self::ConcatenateParts {
            output_name: output_name.into(),
        }
    }

    /// Flat archive at `output`.
    pub fn archive(output: impl Into<PathBuf>) -> Self {
        Self::FlattenArchive {
            output: output.into(),
            check_interval: DEFAULT_CHECK_INTERVAL,
        }
    }

    /// Run the step over `source` on the blocking pool.
    pub async fn run(
        &self,
        source: &Path,
        cancel: CancellationToken,
        progress: PostProgress,
    ) -> Result<PathBuf, PostProcessError> {
        let step = self.clone();
        let source = source.to_path_buf();

        tokio::task::spawn_blocking(move || match step {
            PostProcessor::ConcatenateParts { output_name } => {
                concatenate_parts(&source, &output_name, &cancel, |index, count| {
                    progress(concat_progress(index, count));
                })
            }
            PostProcessor::FlattenArchive {
                output,
                check_interval,
            } => write_flat_archive(&source, &output, &cancel, check_interval),
        })
        .await
        .map_err(|e| PostProcessError::Task(e.to_string()))?
    }
}

/// Status for the `index`-th (1-based) of `count` parts: 90-95%.
#[allow(clippy::cast_precision_loss)]
fn concat_progress(index: usize, count: usize) -> ProgressSample {
    let pct = 90 + index * 5 / count.max(1);
    ProgressSample::percent(
        pct as f64,
        format!("Concatenating file {index} of {count}..."),
    )
}

/// `<path>.partial`
pub(crate) fn partial_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(PARTIAL_SUFFIX);
    PathBuf::from(name)
}

/// Remove a partial output, logging (not failing) if that is impossible.
pub(crate) fn discard_partial(path: &Path) {
    match std::fs::remove_file(path) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => warn!(path = %path.display(), error = %e, "Failed to remove partial output"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn concat_progress_spans_ninety_to_ninety_five() {
        let first = concat_progress(1, 4);
        assert_eq!(first.percentage, Some(91.0));
        assert_eq!(first.status, "Concatenating file 1 of 4...");
        assert_eq!(concat_progress(4, 4).percentage, Some(95.0));
    }

    #[test]
    fn partial_path_appends_suffix() {
        assert_eq!(
            partial_path(Path::new("/dl/model.tar.gz")),
            PathBuf::from("/dl/model.tar.gz.partial")
        );
    }

    #[test]
    fn cancellation_has_no_transfer_error() {
        assert!(PostProcessError::Cancelled.into_transfer_error().is_none());
        let err = PostProcessError::NoArtifacts(PathBuf::from("/dl/m"));
        assert!(matches!(
            err.into_transfer_error(),
            Some(TransferError::NoArtifactsFound { .. })
        ));
    }

    #[tokio::test]
    async fn run_concatenates_on_blocking_pool() {
        let temp = tempfile::tempdir().unwrap();
        std::fs::write(temp.path().join("m-00001.gguf"), b"ab").unwrap();
        std::fs::write(temp.path().join("m-00002.gguf"), b"cd").unwrap();

        let out = PostProcessor::concatenate("m")
            .run(temp.path(), CancellationToken::new(), Box::new(|_| {}))
            .await
            .unwrap();
        assert_eq!(std::fs::read(out).unwrap(), b"abcd");
    }
}
