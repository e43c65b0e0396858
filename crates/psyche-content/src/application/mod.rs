//! Application layer: document loading and the narrative library.

pub mod library;
pub mod loader;
