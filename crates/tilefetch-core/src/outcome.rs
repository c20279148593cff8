//! Terminal outcome of a transfer.

use std::path::PathBuf;

use crate::errors::TransferError;

/// The final, single, irreversible classification of a job.
///
/// Exactly one outcome is produced per job. `Cancelled` is not an error and
/// is never folded into `Failed`, even when the forced kill made the tool
/// exit unsuccessfully.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TransferOutcome {
    /// Transfer (and post-processing, if any) finished.
    Completed {
        /// The artifact the caller should look at.
        result_path: PathBuf,
    },
    /// Cancellation was signaled before the job finished.
    Cancelled,
    /// The job failed.
    Failed {
        /// What went wrong.
        error: TransferError,
    },
}

impl TransferOutcome {
    /// Convert into the caller-facing result: failures become errors,
    /// completion and cancellation are both `Ok`.
    pub fn into_result(self) -> Result<Self, TransferError> {
        match self {
            Self::Failed { error } => Err(error),
            other => Ok(other),
        }
    }

    /// Whether this outcome is a cancellation.
    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// The result path of a completed job.
    #[must_use]
    pub fn result_path(&self) -> Option<&PathBuf> {
        match self {
            Self::Completed { result_path } => Some(result_path),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancellation_is_not_an_error() {
        let result = TransferOutcome::Cancelled.into_result();
        assert_eq!(result, Ok(TransferOutcome::Cancelled));
    }

    #[test]
    fn failure_becomes_error() {
        let outcome = TransferOutcome::Failed {
            error: TransferError::invalid("API token not set"),
        };
        assert_eq!(
            outcome.into_result(),
            Err(TransferError::invalid("API token not set"))
        );
    }

    #[test]
    fn completed_exposes_path() {
        let outcome = TransferOutcome::Completed {
            result_path: PathBuf::from("/tmp/model.gguf"),
        };
        assert_eq!(
            outcome.result_path(),
            Some(&PathBuf::from("/tmp/model.gguf"))
        );
        assert!(!outcome.is_cancelled());
    }
}
