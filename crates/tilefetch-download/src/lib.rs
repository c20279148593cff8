//! Subprocess-driven download pipeline for tilefetch.
//!
//! - `process` - spawning, streaming, and killing external tools
//! - `progress` - output parsing and directory-size estimation
//! - `registry` - active jobs and their cancellation handles
//! - `session` - one job from launch to terminal outcome
//! - `postprocess` - part concatenation and flat archiving
//! - `engine` - `om` and `HuggingFace` request planning
//! - `service` - facade for frontends
#![deny(unused_crate_dependencies)]

pub mod engine;
pub mod postprocess;
pub mod process;
pub mod progress;
pub mod registry;
pub mod session;

mod service;

pub use engine::{ModelDownload, ProductCategory, ProductDownload};
pub use postprocess::{PostProcessError, PostProcessor};
pub use process::{CommandSpec, KillSwitch, RunningProcess, spawn};
pub use progress::{DirectorySizeProbe, parse_chunk};
pub use registry::{CancellationRegistry, Registration};
pub use service::DownloadService;
pub use session::{Milestones, SessionState, TransferRequest, TransferSession};

// Re-export core types for convenience
pub use tilefetch_core::{JobId, JobKind, ProgressSample, TransferError, TransferEvent, TransferOutcome};

