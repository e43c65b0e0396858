//! Domain model: phases, sequences, overlay composition, and the sequencer
//! state machine.

pub mod events;
pub mod overlay;
pub mod phase;
pub mod sequence;
pub mod sequencer;
