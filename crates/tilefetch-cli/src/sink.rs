//! Notification sink that prints events as JSON lines.

use std::io::Write;
use std::sync::{Arc, Mutex, PoisonError};

use serde::Serialize;
use tilefetch_core::{NotificationSink, TransferEvent};
use tracing::debug;

#[derive(Serialize)]
struct Line<'a> {
    channel: &'static str,
    #[serde(flatten)]
    event: &'a TransferEvent,
}

/// Writes one `{"channel": ..., "type": ..., ...}` object per event.
#[derive(Clone)]
pub struct JsonLinesSink {
    out: Arc<Mutex<Box<dyn Write + Send>>>,
}

impl JsonLinesSink {
    /// Sink writing to stdout.
    pub fn stdout() -> Self {
        Self::new(Box::new(std::io::stdout()))
    }

    pub fn new(out: Box<dyn Write + Send>) -> Self {
        Self {
            out: Arc::new(Mutex::new(out)),
        }
    }
}

/// Render an event as one JSON line (without the newline).
pub fn render(event: &TransferEvent) -> serde_json::Result<String> {
    serde_json::to_string(&Line {
        channel: event.channel().as_str(),
        event,
    })
}

impl NotificationSink for JsonLinesSink {
    fn emit(&self, event: TransferEvent) {
        let line = match render(&event) {
            Ok(line) => line,
            Err(e) => {
                debug!(error = %e, "Failed to serialize event");
                return;
            }
        };
        let mut out = self.out.lock().unwrap_or_else(PoisonError::into_inner);
        if let Err(e) = writeln!(out, "{line}").and_then(|()| out.flush()) {
            debug!(error = %e, "Failed to write event");
        }
    }

    fn clone_box(&self) -> Box<dyn NotificationSink> {
        Box::new(self.clone())
    }
}
