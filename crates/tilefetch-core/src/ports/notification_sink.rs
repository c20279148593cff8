//! Notification sink port.
//!
//! The pipeline reports progress and terminal events through this port
//! without knowing whether they end up in a desktop shell, a terminal, or a
//! test buffer.

use crate::events::TransferEvent;

/// One-way, fire-and-forget event sink.
///
/// The pipeline never reads a response. Implementations must not block:
/// `emit` is called from stream-reader tasks while a transfer is running.
pub trait NotificationSink: Send + Sync {
    /// Emit a transfer event.
    fn emit(&self, event: TransferEvent);

    /// Clone this sink into a boxed trait object.
    ///
    /// This enables cloning of `Arc<dyn NotificationSink>` holders without
    /// requiring the underlying type to implement Clone.
    fn clone_box(&self) -> Box<dyn NotificationSink>;
}

/// A sink that discards every event.
///
/// Suitable for tests and for callers that only care about the returned
/// outcome.
#[derive(Debug, Clone, Default)]
pub struct NoopSink;

impl NoopSink {
    /// Create a new no-op sink.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl NotificationSink for NoopSink {
    fn emit(&self, _event: TransferEvent) {}

    fn clone_box(&self) -> Box<dyn NotificationSink> {
        Box::new(self.clone())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::job::{JobFamily, JobId};

    #[derive(Clone, Default)]
    struct Recording {
        events: Arc<Mutex<Vec<TransferEvent>>>,
    }

    impl NotificationSink for Recording {
        fn emit(&self, event: TransferEvent) {
            self.events.lock().unwrap().push(event);
        }

        fn clone_box(&self) -> Box<dyn NotificationSink> {
            Box::new(self.clone())
        }
    }

    #[test]
    fn noop_sink_accepts_events() {
        let sink: Arc<dyn NotificationSink> = Arc::new(NoopSink::new());
        sink.emit(TransferEvent::cancelled(
            JobId::new("1"),
            JobFamily::ProductFile,
        ));
        let _boxed = sink.clone_box();
    }

    #[test]
    fn boxed_clone_shares_underlying_buffer() {
        let sink = Recording::default();
        let boxed = sink.clone_box();
        boxed.emit(TransferEvent::cancelled(JobId::new("2"), JobFamily::AiModel));
        assert_eq!(sink.events.lock().unwrap().len(), 1);
    }
}
