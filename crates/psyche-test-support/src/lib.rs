//! Shared test doubles for the Psyche lore experience.

mod clock;
mod cue;
mod surface;

pub use clock::{FixedClock, ManualClock};
pub use cue::RecordingCueSink;
pub use surface::{FailingSurface, RecordingSurface, SurfaceOp, UnavailableSurface};
