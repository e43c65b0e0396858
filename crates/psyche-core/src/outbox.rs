//! Event outbox abstraction.

use crate::event::DomainEvent;

/// Trait for state machines that record events while handling operations
/// and hand them to a driver afterwards.
pub trait EventSource: Send {
    /// The event type this source produces.
    type Event: DomainEvent;

    /// Returns the number of events produced so far (drained or not).
    fn version(&self) -> i64;

    /// Returns events recorded since the last drain.
    fn uncommitted_events(&self) -> &[Self::Event];

    /// Removes and returns events recorded since the last drain.
    fn drain_events(&mut self) -> Vec<Self::Event>;
}
