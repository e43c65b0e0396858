//! The phase: a single narrative beat.

use std::fmt;
use std::time::Duration;

use psyche_core::overlay::{AssetHandle, Placement};
use serde::{Deserialize, Serialize};

/// Unique phase key. Insertion order of phases, not the key, defines
/// traversal order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PhaseId(String);

impl PhaseId {
    /// Creates a phase id.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PhaseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A secondary image stacked above the primary image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OverlayImage {
    /// Author-supplied element id.
    pub id: String,
    /// Image asset.
    pub handle: AssetHandle,
    /// Placement hint.
    pub placement: Placement,
    /// Stacking order; higher values render on top.
    pub stacking_order: i32,
}

/// A single narrative beat.
///
/// Every visual field is optional. A phase with no primary image, no banner
/// and no non-empty caption line is a blank beat that only holds time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Phase {
    /// Unique key.
    pub id: PhaseId,
    /// Short heading text.
    pub title: Option<String>,
    /// Main illustration.
    pub primary_image: Option<AssetHandle>,
    /// Accessibility description of the primary image.
    pub alt_text: String,
    /// Auto-advance delay, or minimum dwell before the continue control is
    /// enabled.
    pub duration_ms: u64,
    /// Banner graphic framing the caption.
    pub caption_banner: Option<AssetHandle>,
    /// Caption lines; empty strings are allowed.
    pub caption_lines: Vec<String>,
    /// Images stacked on top of the primary image.
    pub overlay_images: Vec<OverlayImage>,
}

impl Phase {
    /// Creates a blank beat with the given id and duration.
    #[must_use]
    pub fn new(id: impl Into<String>, duration_ms: u64) -> Self {
        Self {
            id: PhaseId::new(id),
            title: None,
            primary_image: None,
            alt_text: String::new(),
            duration_ms,
            caption_banner: None,
            caption_lines: Vec::new(),
            overlay_images: Vec::new(),
        }
    }

    /// Sets the title. Blank titles are dropped.
    #[must_use]
    pub fn with_title(mut self, title: &str) -> Self {
        self.title = Some(title.trim().to_owned()).filter(|t| !t.is_empty());
        self
    }

    /// Sets the primary image and its alt text.
    #[must_use]
    pub fn with_primary_image(mut self, handle: &str, alt_text: &str) -> Self {
        self.primary_image = AssetHandle::parse(handle);
        alt_text.clone_into(&mut self.alt_text);
        self
    }

    /// Sets the caption banner.
    #[must_use]
    pub fn with_banner(mut self, handle: &str) -> Self {
        self.caption_banner = AssetHandle::parse(handle);
        self
    }

    /// Sets the caption lines.
    #[must_use]
    pub fn with_caption<I, S>(mut self, lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.caption_lines = lines.into_iter().map(Into::into).collect();
        self
    }

    /// Appends a stacked image.
    #[must_use]
    pub fn with_overlay_image(mut self, image: OverlayImage) -> Self {
        self.overlay_images.push(image);
        self
    }

    /// The phase duration.
    #[must_use]
    pub fn duration(&self) -> Duration {
        Duration::from_millis(self.duration_ms)
    }

    /// Whether at least one caption line has visible text.
    #[must_use]
    pub fn has_caption(&self) -> bool {
        self.caption_lines.iter().any(|line| !line.trim().is_empty())
    }

    /// Whether the phase shows nothing and only holds time.
    #[must_use]
    pub fn is_blank_beat(&self) -> bool {
        self.primary_image.is_none() && self.caption_banner.is_none() && !self.has_caption()
    }
}
