//! Core domain types and port definitions for tilefetch.
//!
//! This crate holds everything the download pipeline and its adapters agree
//! on: job identity, progress samples, terminal outcomes, notification
//! events, error taxonomy, persisted configuration, and the ports
//! (`NotificationSink`, `CatalogPort`) that keep transport and HTTP details
//! out of the pipeline.
#![deny(unused_crate_dependencies)]

pub mod config;
pub mod errors;
pub mod events;
pub mod job;
pub mod outcome;
pub mod ports;
pub mod progress;

pub use config::{AppConfig, ConfigError, ConfigStore};
pub use errors::TransferError;
pub use events::{EventChannel, TransferEvent};
pub use job::{JobFamily, JobId, JobKind};
pub use outcome::TransferOutcome;
pub use ports::{
    CatalogError, CatalogPort, Dependency, DependencySpecifier, Eula, NoopSink, NotificationSink,
    Product, ProductFile, Release, SpecifiedProduct,
};
pub use progress::ProgressSample;
