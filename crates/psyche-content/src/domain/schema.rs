//! The narrative document schema as authored in YAML.
//!
//! These types mirror the document one to one. Normalization into
//! [`psyche_narrative::domain::phase::Phase`] happens in the loader.

use psyche_narrative::domain::sequencer::TransitionMode;
use serde::Deserialize;

/// A narrative document.
#[derive(Debug, Clone, Deserialize)]
pub struct NarrativeDocument {
    /// Unique narrative name.
    pub name: String,
    /// How phases advance. Defaults to `auto`.
    #[serde(default)]
    pub mode: TransitionMode,
    /// Fade-out between phases, in milliseconds.
    #[serde(default)]
    pub fade_out_ms: Option<u64>,
    /// Either a list of phases, each with an `id`, or an ordered mapping of
    /// phase id to phase.
    #[serde(default)]
    pub phases: serde_yaml::Value,
}

/// Caption text: a single line or a list of lines.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum CaptionText {
    /// A single line.
    Line(String),
    /// Several lines.
    Lines(Vec<String>),
}

impl CaptionText {
    /// The text as lines.
    #[must_use]
    pub fn into_lines(self) -> Vec<String> {
        match self {
            Self::Line(line) => vec![line],
            Self::Lines(lines) => lines,
        }
    }
}

/// A phase as authored.
#[derive(Debug, Clone, Deserialize)]
pub struct RawPhase {
    /// Phase id. Required in list form; the key is used in mapping form.
    #[serde(default)]
    pub id: Option<String>,
    /// Heading text.
    #[serde(default)]
    pub title: Option<String>,
    /// Main illustration.
    #[serde(default, alias = "image")]
    pub primary_image: Option<String>,
    /// Accessibility description.
    #[serde(default, alias = "alt")]
    pub alt_text: Option<String>,
    /// Duration in milliseconds.
    #[serde(alias = "duration")]
    pub duration_ms: u64,
    /// Caption banner.
    #[serde(default, alias = "banner", alias = "scroll")]
    pub caption_banner: Option<String>,
    /// Caption lines.
    #[serde(default, alias = "text")]
    pub caption_lines: Option<CaptionText>,
    /// Stacked images.
    #[serde(default, alias = "additionalImages", alias = "additional_images")]
    pub overlay_images: Vec<RawOverlayImage>,
}

/// A stacked image as authored.
#[derive(Debug, Clone, Deserialize)]
pub struct RawOverlayImage {
    /// Image path or handle.
    #[serde(alias = "src")]
    pub handle: String,
    /// Element id.
    #[serde(default)]
    pub id: String,
    /// Positioning scheme.
    #[serde(default)]
    pub position: Option<String>,
    /// Top offset.
    #[serde(default)]
    pub top: Option<String>,
    /// Left offset.
    #[serde(default)]
    pub left: Option<String>,
    /// Stacking order.
    #[serde(default, alias = "z_index", alias = "zIndex")]
    pub stacking_order: i32,
}
