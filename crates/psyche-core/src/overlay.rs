//! Overlay vocabulary shared by producers (sequencer, stages) and render
//! surfaces.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Opaque handle to a renderable asset (image path, URL, texture key).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AssetHandle(String);

impl AssetHandle {
    /// Creates a handle. Returns `None` for blank input, which content
    /// authors use to mean "no asset".
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_owned()))
        }
    }

    /// Returns the handle as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AssetHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Placement hint for a stacked image. Values are passed through to the
/// surface uninterpreted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Placement {
    /// Positioning scheme, e.g. `absolute`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<String>,
    /// Top offset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top: Option<String>,
    /// Left offset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub left: Option<String>,
}

/// A single element of an overlay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OverlayNode {
    /// Short heading text.
    Title {
        /// Heading text.
        text: String,
    },
    /// The main illustration.
    PrimaryImage {
        /// Image asset.
        handle: AssetHandle,
        /// Accessibility description.
        alt_text: String,
    },
    /// Banner graphic framing the caption.
    Banner {
        /// Banner asset.
        handle: AssetHandle,
    },
    /// Caption text block.
    Caption {
        /// Caption lines in display order.
        lines: Vec<String>,
    },
    /// Secondary image stacked above the primary image.
    StackedImage {
        /// Author-supplied element id.
        id: String,
        /// Image asset.
        handle: AssetHandle,
        /// Placement hint.
        placement: Placement,
        /// Stacking order; higher values render on top.
        stacking_order: i32,
    },
    /// Embedded media such as the launch video.
    Media {
        /// Media source.
        source: String,
    },
    /// The "continue" control of a user-advanced phase.
    ContinueControl {
        /// Whether the control is actionable.
        enabled: bool,
    },
    /// A labelled action such as "Restart the Journey".
    Action {
        /// Action identifier.
        id: String,
        /// Button label.
        label: String,
    },
}

/// A full-screen overlay: an ordered list of nodes mounted and unmounted
/// together under one key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Overlay {
    /// Key used to unmount the overlay (the phase id for phases).
    pub key: String,
    /// Nodes in mount order.
    pub nodes: Vec<OverlayNode>,
}

impl Overlay {
    /// Creates an empty overlay.
    #[must_use]
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            nodes: Vec::new(),
        }
    }

    /// Appends a node.
    #[must_use]
    pub fn with_node(mut self, node: OverlayNode) -> Self {
        self.nodes.push(node);
        self
    }

    /// Returns `true` if the overlay has a caption node.
    #[must_use]
    pub fn has_caption(&self) -> bool {
        self.nodes
            .iter()
            .any(|node| matches!(node, OverlayNode::Caption { .. }))
    }

    /// Returns the state of the continue control, if the overlay has one.
    #[must_use]
    pub fn continue_control(&self) -> Option<bool> {
        self.nodes.iter().find_map(|node| match node {
            OverlayNode::ContinueControl { enabled } => Some(*enabled),
            _ => None,
        })
    }

    /// Enables or disables the continue control, if present.
    pub fn set_continue_enabled(&mut self, value: bool) {
        for node in &mut self.nodes {
            if let OverlayNode::ContinueControl { enabled } = node {
                *enabled = value;
            }
        }
    }
}
