//! Directory-size progress estimation.
//!
//! The `HuggingFace` fetcher prints nothing useful when its output is not a
//! terminal, so model downloads are tracked by polling the size of the
//! destination directory. The fraction is a rough logarithmic-looking curve
//! that tops out at 85%; the remaining band belongs to post-processing.

use std::path::{Path, PathBuf};
use std::time::Duration;

use tilefetch_core::ProgressSample;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use walkdir::WalkDir;

/// Polling interval.
pub const PROBE_INTERVAL: Duration = Duration::from_secs(1);

/// Consecutive unchanged ticks that still produce a "Processing..." sample.
pub const MAX_QUIET_TICKS: u32 = 3;

/// Highest percentage the estimate ever reports.
pub const PERCENT_CEILING: f64 = 85.0;

const MIB: f64 = 1024.0 * 1024.0;
const GIB: f64 = 1024.0 * 1024.0 * 1024.0;

/// Piecewise breakpoints: (upper bound in MiB, base percent, band width in
/// MiB, band percent span). The last band is open-ended and capped.
const BANDS: &[(f64, f64, f64, f64)] = &[
    (100.0, 20.0, 100.0, 5.0),
    (500.0, 25.0, 400.0, 15.0),
    (1024.0, 40.0, 524.0, 10.0),
    (5120.0, 50.0, 4096.0, 15.0),
    (10240.0, 65.0, 5120.0, 15.0),
    (f64::INFINITY, 80.0, 10240.0, 5.0),
];

/// Map a downloaded byte count onto the 20-85% band.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn estimate_percentage(bytes: u64) -> f64 {
    let size_mb = bytes as f64 / MIB;
    let mut lower = 0.0;
    for &(upper, base, width, span) in BANDS {
        if size_mb < upper {
            let pct = base + ((size_mb - lower) / width * span).floor();
            return pct.min(PERCENT_CEILING);
        }
        lower = upper;
    }
    PERCENT_CEILING
}

/// Recursive sum of regular file sizes under `root`. Unreadable entries
/// are skipped.
#[must_use]
pub fn directory_size(root: &Path) -> u64 {
    WalkDir::new(root)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .filter_map(|entry| entry.metadata().ok())
        .map(|meta| meta.len())
        .sum()
}

#[allow(clippy::cast_precision_loss)]
fn gigabytes(bytes: u64) -> f64 {
    bytes as f64 / GIB
}

/// Tick-to-tick state of the probe.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ProbeState {
    last_size: u64,
    quiet_ticks: u32,
}

impl ProbeState {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one size observation, returning the sample to emit, if any.
    ///
    /// A shrinking directory (temporary files being moved into place) is
    /// ignored until it grows past the previous high-water mark.
    pub fn observe(&mut self, size: u64) -> Option<ProgressSample> {
        if size > self.last_size {
            self.last_size = size;
            self.quiet_ticks = 0;
            return Some(ProgressSample::percent(
                estimate_percentage(size),
                format!("Downloading... ({:.2} GB)", gigabytes(size)),
            ));
        }

        if size == self.last_size && size > 0 && self.quiet_ticks < MAX_QUIET_TICKS {
            self.quiet_ticks += 1;
            return Some(ProgressSample::indeterminate(format!(
                "Processing... ({:.2} GB)",
                gigabytes(size)
            )));
        }

        None
    }
}

/// Polls a directory's size on a fixed interval.
#[derive(Debug, Clone)]
pub struct DirectorySizeProbe {
    root: PathBuf,
    interval: Duration,
}

impl DirectorySizeProbe {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            interval: PROBE_INTERVAL,
        }
    }

    #[must_use]
    pub const fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Start polling. The task ends as soon as either token fires.
    pub fn spawn<F>(
        self,
        cancel: CancellationToken,
        done: CancellationToken,
        on_sample: F,
    ) -> JoinHandle<std::io::Result<String>>
    where
        F: Fn(ProgressSample) + Send + 'static,
    {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately; skip it so the first
            // sample reflects a full interval of transfer.
            ticker.tick().await;

            let mut state = ProbeState::new();
            loop {
                tokio::select! {
                    biased;
                    () = cancel.cancelled() => break,
                    () = done.cancelled() => break,
                    _ = ticker.tick() => {
                        let root = self.root.clone();
                        let size = match tokio::task::spawn_blocking(move || directory_size(&root)).await {
                            Ok(size) => size,
                            Err(e) => {
                                debug!(path = %self.root.display(), error = %e, "Size probe tick failed");
                                continue;
                            }
                        };
                        if cancel.is_cancelled() || done.is_cancelled() {
                            break;
                        }
                        if let Some(sample) = state.observe(size) {
                            on_sample(sample);
                        }
                    }
                }
            }

            debug!(path = %self.root.display(), "Size probe exiting");
            Ok(String::new())
        })
    }
}
