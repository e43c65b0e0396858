//! The loaded narrative.

use std::time::Duration;

use psyche_narrative::domain::sequence::Sequence;
use psyche_narrative::domain::sequencer::TransitionMode;
use serde::Serialize;

/// A validated narrative ready to play.
#[derive(Debug, Clone)]
pub struct Narrative {
    /// Unique name.
    pub name: String,
    /// Default transition mode.
    pub mode: TransitionMode,
    /// Fade-out between phases, if the document sets one.
    pub fade_out: Option<Duration>,
    /// The phases.
    pub sequence: Sequence,
    /// SHA-256 of the source document, hex encoded.
    pub version_hash: String,
}

impl Narrative {
    /// A short description for listings.
    #[must_use]
    pub fn summary(&self) -> NarrativeSummary {
        NarrativeSummary {
            name: self.name.clone(),
            mode: self.mode,
            phase_count: self.sequence.len(),
            total_duration_ms: self.sequence.total_duration_ms(),
            version_hash: self.version_hash.clone(),
        }
    }
}

/// Listing entry for a narrative.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NarrativeSummary {
    /// Unique name.
    pub name: String,
    /// Default transition mode.
    pub mode: TransitionMode,
    /// Number of phases.
    pub phase_count: usize,
    /// Sum of phase durations.
    pub total_duration_ms: u64,
    /// SHA-256 of the source document.
    pub version_hash: String,
}
