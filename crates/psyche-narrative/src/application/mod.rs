//! Application layer: the async player that drives a sequencer, staged
//! orchestration, and the cue and surface implementations used by hosts.

pub mod cues;
pub mod player;
pub mod stages;
pub mod view_surface;
