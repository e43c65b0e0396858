//! Psyche lore experience — phase sequencing.
//!
//! Responsible for showing narrative phases as overlays, moving between them
//! on a timer or on confirmation, and chaining the fixed stages (intro,
//! launch video, countdown, phases, finale) of an experience.

pub mod application;
pub mod domain;
