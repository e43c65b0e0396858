//! Test cue sink — records every event it receives.

use std::sync::Mutex;

use psyche_core::cue::CueSink;
use psyche_core::event::DomainEvent;

/// A cue sink that records event types and payloads in arrival order.
#[derive(Debug, Default)]
pub struct RecordingCueSink {
    received: Mutex<Vec<(String, serde_json::Value)>>,
}

impl RecordingCueSink {
    /// Creates an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Event types received so far.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn event_types(&self) -> Vec<String> {
        self.received
            .lock()
            .unwrap()
            .iter()
            .map(|(t, _)| t.clone())
            .collect()
    }

    /// Number of received events of the given type.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn count_of(&self, event_type: &str) -> usize {
        self.received
            .lock()
            .unwrap()
            .iter()
            .filter(|(t, _)| t == event_type)
            .count()
    }

    /// Payloads of received events of the given type.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn payloads_of(&self, event_type: &str) -> Vec<serde_json::Value> {
        self.received
            .lock()
            .unwrap()
            .iter()
            .filter(|(t, _)| t == event_type)
            .map(|(_, p)| p.clone())
            .collect()
    }
}

impl CueSink for RecordingCueSink {
    fn on_event(&self, event: &dyn DomainEvent) {
        self.received
            .lock()
            .unwrap()
            .push((event.event_type().to_owned(), event.to_payload()));
    }
}
