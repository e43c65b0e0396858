//! Domain model: the narrative and its document schema.

pub mod narrative;
pub mod schema;
