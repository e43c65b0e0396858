//! Overlay composition for phases.

use psyche_core::overlay::{Overlay, OverlayNode};

use super::phase::Phase;
use super::sequencer::TransitionMode;

/// Builds the overlay for a phase.
///
/// Nodes are added only for fields that are present: title, primary image,
/// banner, caption (only if a line has visible text), stacked images in
/// ascending stacking order, and in manual mode a continue control that
/// starts disabled.
#[must_use]
pub fn compose(phase: &Phase, mode: TransitionMode) -> Overlay {
    let mut overlay = Overlay::new(phase.id.as_str());

    if let Some(title) = &phase.title {
        overlay.nodes.push(OverlayNode::Title {
            text: title.clone(),
        });
    }
    if let Some(handle) = &phase.primary_image {
        overlay.nodes.push(OverlayNode::PrimaryImage {
            handle: handle.clone(),
            alt_text: phase.alt_text.clone(),
        });
    }
    if let Some(handle) = &phase.caption_banner {
        overlay.nodes.push(OverlayNode::Banner {
            handle: handle.clone(),
        });
    }
    if phase.has_caption() {
        overlay.nodes.push(OverlayNode::Caption {
            lines: phase.caption_lines.clone(),
        });
    }

    let mut stacked: Vec<_> = phase.overlay_images.iter().collect();
    // Stable sort: equal stacking orders keep authoring order.
    stacked.sort_by_key(|image| image.stacking_order);
    overlay
        .nodes
        .extend(stacked.into_iter().map(|image| OverlayNode::StackedImage {
            id: image.id.clone(),
            handle: image.handle.clone(),
            placement: image.placement.clone(),
            stacking_order: image.stacking_order,
        }));

    if mode == TransitionMode::Manual {
        overlay
            .nodes
            .push(OverlayNode::ContinueControl { enabled: false });
    }

    overlay
}
