//! Transfer error types.
//!
//! Like the notification payloads, these errors are serializable and do not
//! hold `std::io::Error` directly. I/O failures are captured as kind and
//! message strings so the error can cross the GUI boundary unchanged.
//!
//! Cancellation is deliberately absent: a cancelled job is a terminal
//! outcome (`TransferOutcome::Cancelled`), never an error.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::job::JobId;

/// Error type for download, registry, and post-processing operations.
#[derive(Clone, Debug, Error, Serialize, Deserialize, PartialEq, Eq)]
pub enum TransferError {
    /// The external tool is missing or could not be spawned.
    #[error("Failed to launch {program}: {message}")]
    Launch {
        /// Program name or path that was attempted.
        program: String,
        /// What went wrong, including remediation when known.
        message: String,
    },

    /// Post-processing found nothing to act on.
    #[error("No artifacts found in {}", path.display())]
    NoArtifactsFound {
        /// Directory that was searched.
        path: PathBuf,
    },

    /// A job with this id is already active.
    #[error("A download is already active for {id}")]
    DuplicateJob {
        /// The conflicting job id.
        id: JobId,
    },

    /// No active job with this id.
    #[error("No active download found for {id}")]
    NotFound {
        /// The requested job id.
        id: JobId,
    },

    /// The tool exited unsuccessfully without being cancelled.
    #[error("Download failed ({status}){}", format_stderr(stderr))]
    ProcessFailure {
        /// Exit status description.
        status: String,
        /// Verbatim error-stream text from the process.
        stderr: String,
    },

    /// I/O error during file operations.
    #[error("I/O error ({kind}) during {context}: {message}")]
    Io {
        /// What the pipeline was doing.
        context: String,
        /// The kind of I/O error.
        kind: String,
        /// Detailed error message.
        message: String,
    },

    /// The request is missing a prerequisite or is malformed.
    #[error("{0}")]
    InvalidRequest(String),

    /// The catalog collaborator failed to resolve the request.
    #[error("Catalog error: {0}")]
    Catalog(String),
}

fn format_stderr(stderr: &str) -> String {
    if stderr.is_empty() {
        String::new()
    } else {
        format!(": {stderr}")
    }
}

impl TransferError {
    /// Create a launch error.
    pub fn launch(program: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Launch {
            program: program.into(),
            message: message.into(),
        }
    }

    /// Create an I/O error from a `std::io::Error`, capturing kind and message.
    pub fn from_io(context: impl Into<String>, err: &std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            kind: format!("{:?}", err.kind()),
            message: err.to_string(),
        }
    }

    /// Create a no-artifacts error for a searched directory.
    #[must_use]
    pub fn no_artifacts(path: &Path) -> Self {
        Self::NoArtifactsFound {
            path: path.to_path_buf(),
        }
    }

    /// Create an invalid-request error.
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidRequest(message.into())
    }
}
