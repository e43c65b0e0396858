//! In-memory render surface for remote clients.
//!
//! Hosts that do not draw anything themselves (the HTTP API) render into a
//! `ViewSurface` and hand its [`SurfaceView`] to clients, which draw the
//! overlays they are given.

use psyche_core::error::DomainError;
use psyche_core::overlay::Overlay;
use psyche_core::surface::RenderSurface;
use serde::Serialize;

/// What a client should currently draw.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SurfaceView {
    /// Mounted overlays, bottom first.
    pub overlays: Vec<Overlay>,
    /// Incremented on every change.
    pub revision: u64,
}

/// Keeps mounted overlays in memory.
#[derive(Debug, Default)]
pub struct ViewSurface {
    view: SurfaceView,
}

impl ViewSurface {
    /// Creates an empty surface.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A copy of what is mounted.
    #[must_use]
    pub fn view(&self) -> SurfaceView {
        self.view.clone()
    }
}

impl RenderSurface for ViewSurface {
    fn mount(&mut self, overlay: &Overlay) -> Result<(), DomainError> {
        if self.view.overlays.iter().any(|o| o.key == overlay.key) {
            return Err(DomainError::RenderSurface(format!(
                "overlay {} is already mounted",
                overlay.key
            )));
        }
        self.view.overlays.push(overlay.clone());
        self.view.revision += 1;
        Ok(())
    }

    fn update(&mut self, overlay: &Overlay) -> Result<(), DomainError> {
        match self.view.overlays.iter_mut().find(|o| o.key == overlay.key) {
            Some(existing) => {
                existing.clone_from(overlay);
                self.view.revision += 1;
                Ok(())
            }
            None => self.mount(overlay),
        }
    }

    fn set_continue_enabled(&mut self, key: &str, enabled: bool) {
        if let Some(overlay) = self.view.overlays.iter_mut().find(|o| o.key == key) {
            overlay.set_continue_enabled(enabled);
            self.view.revision += 1;
        }
    }

    fn unmount(&mut self, key: &str) {
        let before = self.view.overlays.len();
        self.view.overlays.retain(|o| o.key != key);
        if self.view.overlays.len() != before {
            self.view.revision += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use psyche_core::overlay::OverlayNode;

    use super::*;

    fn caption(key: &str, text: &str) -> Overlay {
        Overlay::new(key).with_node(OverlayNode::Caption {
            lines: vec![text.to_owned()],
        })
    }

    #[test]
    fn test_mount_and_unmount_track_revision() {
        // Arrange
        let mut surface = ViewSurface::new();

        // Act
        surface.mount(&caption("a", "hi")).unwrap();
        surface.unmount("a");
        surface.unmount("a");

        // Assert
        let view = surface.view();
        assert!(view.overlays.is_empty());
        assert_eq!(view.revision, 2);
    }

    #[test]
    fn test_duplicate_mount_is_refused() {
        let mut surface = ViewSurface::new();
        surface.mount(&caption("a", "hi")).unwrap();

        let result = surface.mount(&caption("a", "again"));

        assert!(matches!(result, Err(DomainError::RenderSurface(_))));
        assert_eq!(surface.view().overlays.len(), 1);
    }

    #[test]
    fn test_update_replaces_in_place() {
        let mut surface = ViewSurface::new();
        surface.mount(&caption("intro", "P")).unwrap();
        surface.mount(&caption("other", "x")).unwrap();

        surface.update(&caption("intro", "Ps")).unwrap();

        let view = surface.view();
        assert_eq!(view.overlays[0], caption("intro", "Ps"));
        assert_eq!(view.overlays[1].key, "other");
    }

    #[test]
    fn test_set_continue_enabled_updates_control() {
        let mut surface = ViewSurface::new();
        surface
            .mount(&Overlay::new("only").with_node(OverlayNode::ContinueControl { enabled: false }))
            .unwrap();

        surface.set_continue_enabled("only", true);

        assert_eq!(surface.view().overlays[0].continue_control(), Some(true));
    }
}
