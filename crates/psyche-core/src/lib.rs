//! Psyche Core — shared abstractions.
//!
//! This crate defines the traits and types every other crate depends on:
//! time, errors, the event envelope, and the render and cue seams the
//! sequencer talks through. It contains no I/O.

pub mod clock;
pub mod cue;
pub mod error;
pub mod event;
pub mod outbox;
pub mod overlay;
pub mod surface;
