//! The sequence: an ordered, immutable list of phases.

use std::collections::HashSet;
use std::sync::Arc;

use psyche_core::error::DomainError;

use super::phase::{Phase, PhaseId};

/// An ordered, immutable list of phases. Cloning is cheap.
#[derive(Debug, Clone)]
pub struct Sequence {
    phases: Arc<[Phase]>,
}

impl Sequence {
    /// Builds a sequence, keeping the given order.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` if two phases share an id.
    pub fn new(phases: Vec<Phase>) -> Result<Self, DomainError> {
        let mut seen = HashSet::with_capacity(phases.len());
        for phase in &phases {
            if !seen.insert(phase.id.as_str()) {
                return Err(DomainError::Validation(format!(
                    "duplicate phase id: {}",
                    phase.id
                )));
            }
        }
        Ok(Self {
            phases: phases.into(),
        })
    }

    /// An empty sequence.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            phases: Vec::new().into(),
        }
    }

    /// Number of phases.
    #[must_use]
    pub fn len(&self) -> usize {
        self.phases.len()
    }

    /// Whether the sequence has no phases.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.phases.is_empty()
    }

    /// The phase at `index`.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Phase> {
        self.phases.get(index)
    }

    /// Position of the phase with the given id.
    #[must_use]
    pub fn position(&self, id: &PhaseId) -> Option<usize> {
        self.phases.iter().position(|p| &p.id == id)
    }

    /// Iterates phases in order.
    pub fn iter(&self) -> std::slice::Iter<'_, Phase> {
        self.phases.iter()
    }

    /// Sum of all phase durations in milliseconds, saturating at
    /// `u64::MAX`.
    #[must_use]
    pub fn total_duration_ms(&self) -> u64 {
        self.phases
            .iter()
            .map(|p| p.duration_ms)
            .fold(0, u64::saturating_add)
    }
}

impl<'a> IntoIterator for &'a Sequence {
    type Item = &'a Phase;
    type IntoIter = std::slice::Iter<'a, Phase>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
