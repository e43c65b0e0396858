//! Psyche lore experience — narrative content.
//!
//! Narratives are authored as YAML documents and loaded through one
//! canonical phase schema. Field names from older phase tables (`image`,
//! `alt`, `scroll`, `banner`, `text`, `additionalImages`) are accepted as
//! aliases, and empty strings mean "absent".

pub mod application;
pub mod domain;
