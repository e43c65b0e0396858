//! Domain error types.

use thiserror::Error;
use uuid::Uuid;

/// Top-level domain error type.
#[derive(Debug, Error)]
pub enum DomainError {
    /// A session or narrative was not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// A running session was not found by id.
    #[error("session not found: {0}")]
    SessionNotFound(Uuid),

    /// Content or input failed validation.
    #[error("validation error: {0}")]
    Validation(String),

    /// An operation was requested in a state that does not allow it.
    #[error("invalid transition: cannot {action} while {state}")]
    InvalidTransition {
        /// The operation that was attempted.
        action: &'static str,
        /// The state the sequencer was in.
        state: &'static str,
    },

    /// The render surface is missing or refused an overlay.
    #[error("render surface error: {0}")]
    RenderSurface(String),

    /// An infrastructure error (I/O, task failure).
    #[error("infrastructure error: {0}")]
    Infrastructure(String),
}
