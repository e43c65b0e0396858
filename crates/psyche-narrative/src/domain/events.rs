//! Domain events for the phase sequencer.

use psyche_core::event::{DomainEvent, EventMetadata};
use serde::{Deserialize, Serialize};

use super::sequencer::TransitionMode;

/// Event type of [`SequenceStarted`].
pub const SEQUENCE_STARTED: &str = "sequencer.sequence_started";
/// Event type of [`PhaseRendered`].
pub const PHASE_RENDERED: &str = "sequencer.phase_rendered";
/// Event type of [`ContinueEnabled`].
pub const CONTINUE_ENABLED: &str = "sequencer.continue_enabled";
/// Event type of [`PhaseTransition`]; this is the audio cue.
pub const PHASE_TRANSITION: &str = "sequencer.phase_transition";
/// Event type of [`PhaseTornDown`].
pub const PHASE_TORN_DOWN: &str = "sequencer.phase_torn_down";
/// Event type of [`PhaseSkipped`].
pub const PHASE_SKIPPED: &str = "sequencer.phase_skipped";
/// Event type of [`RenderRejected`].
pub const RENDER_REJECTED: &str = "sequencer.render_rejected";
/// Event type of [`SequenceCompleted`].
pub const SEQUENCE_COMPLETED: &str = "sequencer.sequence_completed";
/// Event type of [`SequenceCancelled`].
pub const SEQUENCE_CANCELLED: &str = "sequencer.sequence_cancelled";

/// Emitted when a run starts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SequenceStarted {
    /// Number of phases in the sequence.
    pub phase_count: usize,
    /// How phases advance.
    pub mode: TransitionMode,
}

/// Emitted when a phase overlay is mounted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhaseRendered {
    /// The phase id.
    pub phase_id: String,
    /// Position in the sequence.
    pub index: usize,
    /// Number of overlay nodes mounted.
    pub node_count: usize,
}

/// Emitted when the continue control of a manual phase becomes actionable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContinueEnabled {
    /// The phase id.
    pub phase_id: String,
}

/// Emitted on every advance, before teardown.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhaseTransition {
    /// The phase being left.
    pub from: String,
    /// The next phase, or `None` when the sequence is about to complete.
    pub to: Option<String>,
}

/// Emitted once every node of a phase overlay has been removed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhaseTornDown {
    /// The phase id.
    pub phase_id: String,
}

/// Emitted when a phase could not be mounted and was passed over.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhaseSkipped {
    /// The phase id.
    pub phase_id: String,
    /// Surface error message.
    pub reason: String,
}

/// Emitted when a render is requested while a phase is still on screen.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderRejected {
    /// The phase that is on screen.
    pub phase_id: String,
    /// The state the request arrived in.
    pub state: String,
}

/// Emitted once per run when the last phase has been left.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SequenceCompleted {
    /// Phases that were mounted.
    pub phases_rendered: usize,
    /// Phases that were skipped.
    pub phases_skipped: usize,
}

/// Emitted when a run is stopped or replaced before completing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SequenceCancelled {
    /// The phase that was on screen, if any.
    pub phase_id: Option<String>,
}

/// Event payload variants for the phase sequencer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SequencerEventKind {
    /// A run has started.
    SequenceStarted(SequenceStarted),
    /// A phase has been mounted.
    PhaseRendered(PhaseRendered),
    /// The continue control is actionable.
    ContinueEnabled(ContinueEnabled),
    /// The sequencer is moving past a phase.
    PhaseTransition(PhaseTransition),
    /// A phase overlay has been removed.
    PhaseTornDown(PhaseTornDown),
    /// A phase was skipped.
    PhaseSkipped(PhaseSkipped),
    /// A render request was rejected.
    RenderRejected(RenderRejected),
    /// The run has completed.
    SequenceCompleted(SequenceCompleted),
    /// The run was cancelled.
    SequenceCancelled(SequenceCancelled),
}

impl SequencerEventKind {
    /// Returns the event type name for this payload.
    #[must_use]
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::SequenceStarted(_) => SEQUENCE_STARTED,
            Self::PhaseRendered(_) => PHASE_RENDERED,
            Self::ContinueEnabled(_) => CONTINUE_ENABLED,
            Self::PhaseTransition(_) => PHASE_TRANSITION,
            Self::PhaseTornDown(_) => PHASE_TORN_DOWN,
            Self::PhaseSkipped(_) => PHASE_SKIPPED,
            Self::RenderRejected(_) => RENDER_REJECTED,
            Self::SequenceCompleted(_) => SEQUENCE_COMPLETED,
            Self::SequenceCancelled(_) => SEQUENCE_CANCELLED,
        }
    }
}

/// Domain event envelope for the phase sequencer.
#[derive(Debug, Clone)]
pub struct SequencerEvent {
    /// Event metadata.
    pub metadata: EventMetadata,
    /// Event-specific payload.
    pub kind: SequencerEventKind,
}

impl DomainEvent for SequencerEvent {
    fn event_type(&self) -> &'static str {
        self.kind.event_type()
    }

    fn to_payload(&self) -> serde_json::Value {
        // Serialization of derived Serialize types to Value is infallible.
        serde_json::to_value(&self.kind).expect("SequencerEventKind serialization is infallible")
    }

    fn metadata(&self) -> &EventMetadata {
        &self.metadata
    }
}
