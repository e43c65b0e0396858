//! Test surfaces — `RenderSurface` implementations that record or fail.

use std::collections::HashSet;

use psyche_core::error::DomainError;
use psyche_core::overlay::Overlay;
use psyche_core::surface::RenderSurface;

/// One call made against a `RecordingSurface`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SurfaceOp {
    /// An overlay was mounted under this key.
    Mount(String),
    /// The overlay under this key was unmounted.
    Unmount(String),
    /// The continue control under this key was toggled.
    ContinueEnabled(String, bool),
}

/// A surface that keeps every mounted overlay in memory and records each
/// call. Mounts for keys listed in `failing_on` are refused.
#[derive(Debug, Default)]
pub struct RecordingSurface {
    ops: Vec<SurfaceOp>,
    live: Vec<Overlay>,
    fail_keys: HashSet<String>,
    unavailable: bool,
}

impl RecordingSurface {
    /// Creates an empty surface.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a surface that refuses to mount the given keys.
    #[must_use]
    pub fn failing_on(keys: &[&str]) -> Self {
        Self {
            fail_keys: keys.iter().map(|k| (*k).to_owned()).collect(),
            ..Self::default()
        }
    }

    /// Makes the surface report itself available or not, as when its
    /// container is removed mid-run.
    pub fn set_available(&mut self, available: bool) {
        self.unavailable = !available;
    }

    /// Every call in order.
    #[must_use]
    pub fn ops(&self) -> &[SurfaceOp] {
        &self.ops
    }

    /// Overlays currently mounted.
    #[must_use]
    pub fn live(&self) -> &[Overlay] {
        &self.live
    }

    /// Keys of the overlays currently mounted.
    #[must_use]
    pub fn live_keys(&self) -> Vec<String> {
        self.live.iter().map(|o| o.key.clone()).collect()
    }

    /// Total number of nodes across all mounted overlays.
    #[must_use]
    pub fn live_node_count(&self) -> usize {
        self.live.iter().map(|o| o.nodes.len()).sum()
    }

    /// Keys of every successful mount, in order.
    #[must_use]
    pub fn mounted_keys(&self) -> Vec<String> {
        self.ops
            .iter()
            .filter_map(|op| match op {
                SurfaceOp::Mount(key) => Some(key.clone()),
                _ => None,
            })
            .collect()
    }

    /// The mounted overlay under `key`, if any.
    #[must_use]
    pub fn overlay(&self, key: &str) -> Option<&Overlay> {
        self.live.iter().find(|o| o.key == key)
    }
}

impl RenderSurface for RecordingSurface {
    fn is_available(&self) -> bool {
        !self.unavailable
    }

    fn mount(&mut self, overlay: &Overlay) -> Result<(), DomainError> {
        if self.fail_keys.contains(&overlay.key) {
            return Err(DomainError::RenderSurface(format!(
                "cannot mount overlay {}",
                overlay.key
            )));
        }
        self.ops.push(SurfaceOp::Mount(overlay.key.clone()));
        self.live.push(overlay.clone());
        Ok(())
    }

    fn set_continue_enabled(&mut self, key: &str, enabled: bool) {
        self.ops
            .push(SurfaceOp::ContinueEnabled(key.to_owned(), enabled));
        if let Some(overlay) = self.live.iter_mut().find(|o| o.key == key) {
            overlay.set_continue_enabled(enabled);
        }
    }

    fn unmount(&mut self, key: &str) {
        self.ops.push(SurfaceOp::Unmount(key.to_owned()));
        self.live.retain(|o| o.key != key);
    }
}

/// A surface that reports itself unavailable, as when the container element
/// is missing.
#[derive(Debug, Default)]
pub struct UnavailableSurface;

impl RenderSurface for UnavailableSurface {
    fn is_available(&self) -> bool {
        false
    }

    fn mount(&mut self, overlay: &Overlay) -> Result<(), DomainError> {
        Err(DomainError::RenderSurface(format!(
            "no surface to mount {}",
            overlay.key
        )))
    }

    fn set_continue_enabled(&mut self, _key: &str, _enabled: bool) {}

    fn unmount(&mut self, _key: &str) {}
}

/// A surface that is available but refuses every mount.
#[derive(Debug, Default)]
pub struct FailingSurface;

impl RenderSurface for FailingSurface {
    fn mount(&mut self, overlay: &Overlay) -> Result<(), DomainError> {
        Err(DomainError::RenderSurface(format!(
            "asset missing for {}",
            overlay.key
        )))
    }

    fn set_continue_enabled(&mut self, _key: &str, _enabled: bool) {}

    fn unmount(&mut self, _key: &str) {}
}
