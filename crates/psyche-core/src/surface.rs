//! Render surface abstraction.

use std::sync::{Arc, Mutex};

use crate::error::DomainError;
use crate::overlay::Overlay;

/// The layer that actually shows overlays (DOM, egui, a kiosk client).
///
/// Implementations must remove every node of an overlay on `unmount`.
pub trait RenderSurface: Send {
    /// Whether the surface can show anything at all. A sequence cannot start
    /// on an unavailable surface.
    fn is_available(&self) -> bool {
        true
    }

    /// Mounts an overlay.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::RenderSurface` if the overlay cannot be shown.
    fn mount(&mut self, overlay: &Overlay) -> Result<(), DomainError>;

    /// Replaces a mounted overlay with a new version under the same key.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::RenderSurface` if the overlay cannot be shown.
    fn update(&mut self, overlay: &Overlay) -> Result<(), DomainError> {
        self.unmount(&overlay.key);
        self.mount(overlay)
    }

    /// Enables or disables the continue control of the overlay under `key`.
    fn set_continue_enabled(&mut self, key: &str, enabled: bool);

    /// Removes the overlay under `key` and all of its nodes. Unknown keys are
    /// ignored.
    fn unmount(&mut self, key: &str);
}

/// A render surface shared between the stages of an experience.
pub type SharedSurface = Arc<Mutex<dyn RenderSurface>>;

/// Locks a shared surface, mapping a poisoned lock to an infrastructure
/// error.
///
/// # Errors
///
/// Returns `DomainError::Infrastructure` if the lock is poisoned.
pub fn lock_surface(
    surface: &SharedSurface,
) -> Result<std::sync::MutexGuard<'_, dyn RenderSurface + 'static>, DomainError> {
    surface
        .lock()
        .map_err(|_| DomainError::Infrastructure("render surface lock poisoned".into()))
}
