//! Port definitions (trait abstractions) for external collaborators.
//!
//! Ports define the interfaces the download pipeline expects from the
//! outside world. They contain no transport or HTTP details and use only
//! domain types.

pub mod catalog;
pub mod notification_sink;

pub use catalog::{
    CatalogError, CatalogPort, Dependency, DependencySpecifier, Eula, Product, ProductFile,
    Release, SpecifiedProduct,
};
pub use notification_sink::{NoopSink, NotificationSink};
