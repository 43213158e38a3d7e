use std::sync::Mutex;

use crate::engine::events::DiagnosticEvent;
use crate::engine::sink::DiagnosticSink;

/// An in-memory diagnostic sink used to collect events during a single
/// command invocation.
///
/// Intentionally simple; mainly useful in tests that assert on what the
/// engine reported through the side channel.
#[derive(Debug, Default)]
pub struct CollectingSink {
    events: Mutex<Vec<DiagnosticEvent>>,
}

impl CollectingSink {
    /// Create a new, empty collecting sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Clone out all collected events.
    pub fn events(&self) -> Vec<DiagnosticEvent> {
        self.events
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Consume the sink and return the collected events.
    pub fn into_events(self) -> Vec<DiagnosticEvent> {
        self.events.into_inner().unwrap_or_else(|e| e.into_inner())
    }

    pub fn len(&self) -> usize {
        self.events.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl DiagnosticSink for CollectingSink {
    fn emit(&self, event: DiagnosticEvent) {
        self.events
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(event);
    }
}
