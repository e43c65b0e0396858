//! Route modules.

pub mod health;
pub mod narratives;
pub mod sessions;
