//! Notification events - discriminated union for everything the pipeline
//! reports outward.
//!
//! The GUI consumes these as a TypeScript discriminated union:
//!
//! ```typescript
//! type TransferEvent =
//!   | { type: "status"; job_id: string; family: Family; percentage?: number; status?: string; total_bytes?: number }
//!   | { type: "completed"; job_id: string; family: Family; path: string }
//!   | { type: "cancelled"; job_id: string; family: Family };
//! ```
//!
//! Failures are never emitted; they surface through the caller's result.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::job::{JobFamily, JobId};
use crate::progress::ProgressSample;

/// Named event channel the GUI listens on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EventChannel {
    /// Product file progress.
    DownloadProgress,
    /// Product file finished.
    DownloadComplete,
    /// Product file cancellation acknowledged.
    DownloadCancelled,
    /// Model status / progress.
    AiModelStatus,
    /// Model finished.
    AiModelComplete,
    /// Model cancellation acknowledged.
    AiModelCancelled,
}

impl EventChannel {
    /// Wire name of the channel.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::DownloadProgress => "download-progress",
            Self::DownloadComplete => "download-complete",
            Self::DownloadCancelled => "download-cancelled",
            Self::AiModelStatus => "ai-model-status",
            Self::AiModelComplete => "ai-model-complete",
            Self::AiModelCancelled => "ai-model-cancelled",
        }
    }
}

/// Single discriminated union for all transfer notifications.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TransferEvent {
    /// Status / progress update.
    Status {
        /// Job the update belongs to.
        job_id: JobId,
        /// Notification family.
        family: JobFamily,
        /// Percentage, omitted when indeterminate.
        #[serde(skip_serializing_if = "Option::is_none")]
        percentage: Option<f64>,
        /// Optional status text.
        #[serde(skip_serializing_if = "Option::is_none")]
        status: Option<String>,
        /// Total transfer size when known.
        #[serde(skip_serializing_if = "Option::is_none")]
        total_bytes: Option<u64>,
    },

    /// The job finished successfully.
    Completed {
        /// Job that finished.
        job_id: JobId,
        /// Notification family.
        family: JobFamily,
        /// Result artifact path.
        path: PathBuf,
    },

    /// Cancellation was acknowledged; no completion will follow.
    Cancelled {
        /// Job that was cancelled.
        job_id: JobId,
        /// Notification family.
        family: JobFamily,
    },
}

impl TransferEvent {
    /// Create a status event from a progress sample.
    #[must_use]
    pub fn from_sample(job_id: JobId, family: JobFamily, sample: ProgressSample) -> Self {
        Self::Status {
            job_id,
            family,
            percentage: sample.percentage,
            status: Some(sample.status),
            total_bytes: sample.total_bytes,
        }
    }

    /// Create a status event with a fixed milestone percentage.
    pub fn milestone(
        job_id: JobId,
        family: JobFamily,
        percentage: f64,
        status: impl Into<String>,
    ) -> Self {
        Self::Status {
            job_id,
            family,
            percentage: Some(percentage),
            status: Some(status.into()),
            total_bytes: None,
        }
    }

    /// Create a completion event.
    pub fn completed(job_id: JobId, family: JobFamily, path: impl Into<PathBuf>) -> Self {
        Self::Completed {
            job_id,
            family,
            path: path.into(),
        }
    }

    /// Create a cancellation-acknowledged event.
    #[must_use]
    pub const fn cancelled(job_id: JobId, family: JobFamily) -> Self {
        Self::Cancelled { job_id, family }
    }

    /// Job this event belongs to.
    #[must_use]
    pub const fn job_id(&self) -> &JobId {
        match self {
            Self::Status { job_id, .. }
            | Self::Completed { job_id, .. }
            | Self::Cancelled { job_id, .. } => job_id,
        }
    }

    /// Whether this is a terminal (completed or cancelled) event.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed { .. } | Self::Cancelled { .. })
    }

    /// Channel this event is published on.
    #[must_use]
    pub const fn channel(&self) -> EventChannel {
        match self {
            Self::Status { family, .. } => match family {
                JobFamily::ProductFile => EventChannel::DownloadProgress,
                JobFamily::AiModel => EventChannel::AiModelStatus,
            },
            Self::Completed { family, .. } => match family {
                JobFamily::ProductFile => EventChannel::DownloadComplete,
                JobFamily::AiModel => EventChannel::AiModelComplete,
            },
            Self::Cancelled { family, .. } => match family {
                JobFamily::ProductFile => EventChannel::DownloadCancelled,
                JobFamily::AiModel => EventChannel::AiModelCancelled,
            },
        }
    }
}
