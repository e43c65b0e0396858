//! Cue sink abstraction.
//!
//! Collaborators outside the sequencer (audio cue players, progress bars,
//! analytics) observe transitions through this trait.

use crate::event::DomainEvent;

/// Receives every event recorded by a running sequence.
pub trait CueSink: Send + Sync {
    /// Called once per event, in recording order.
    fn on_event(&self, event: &dyn DomainEvent);
}
