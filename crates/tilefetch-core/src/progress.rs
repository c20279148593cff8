//! Normalized progress samples.

use serde::{Deserialize, Serialize};

/// One normalized progress observation.
///
/// Ephemeral: samples are forwarded to the notification sink and never
/// persisted. A `None` percentage means indeterminate progress (activity
/// without a quantifiable fraction).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProgressSample {
    /// Progress percentage (0.0 - 100.0), or `None` when indeterminate.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub percentage: Option<f64>,
    /// Total transfer size in bytes, when the tool reports it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_bytes: Option<u64>,
    /// Human-readable status line.
    pub status: String,
}

impl ProgressSample {
    /// A sample with a known percentage.
    pub fn percent(percentage: f64, status: impl Into<String>) -> Self {
        Self {
            percentage: Some(percentage.clamp(0.0, 100.0)),
            total_bytes: None,
            status: status.into(),
        }
    }

    /// A sample that signals activity without a percentage.
    pub fn indeterminate(status: impl Into<String>) -> Self {
        Self {
            percentage: None,
            total_bytes: None,
            status: status.into(),
        }
    }

    /// Attach the total transfer size.
    #[must_use]
    pub const fn with_total_bytes(mut self, total_bytes: u64) -> Self {
        self.total_bytes = Some(total_bytes);
        self
    }

    /// Whether this sample carries no percentage.
    #[must_use]
    pub const fn is_indeterminate(&self) -> bool {
        self.percentage.is_none()
    }
}
