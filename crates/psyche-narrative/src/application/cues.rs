//! Cue sinks.

use psyche_core::cue::CueSink;
use psyche_core::event::DomainEvent;
use tracing::{debug, info};

use crate::domain::events::PHASE_TRANSITION;

/// Logs every sequencer event. Phase transitions, which external audio cue
/// players react to, are logged at `info`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingCueSink;

impl CueSink for TracingCueSink {
    fn on_event(&self, event: &dyn DomainEvent) {
        let meta = event.metadata();
        if event.event_type() == PHASE_TRANSITION {
            info!(
                run_id = %meta.run_id,
                sequence_number = meta.sequence_number,
                payload = %event.to_payload(),
                "phase transition cue"
            );
        } else {
            debug!(
                run_id = %meta.run_id,
                event_type = event.event_type(),
                "sequencer event"
            );
        }
    }
}
