//! The phase sequencer state machine.
//!
//! The sequencer is synchronous and owns no timers. Every operation takes
//! the render surface and a [`Clock`]; deadlines are stored in the state and
//! fired by [`Sequencer::poll`]. A driver (see
//! [`crate::application::player`]) sleeps until [`Sequencer::next_deadline`]
//! and then polls.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use psyche_core::clock::{Clock, deadline_after};
use psyche_core::error::DomainError;
use psyche_core::event::EventMetadata;
use psyche_core::outbox::EventSource;
use psyche_core::surface::RenderSurface;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::events::{
    ContinueEnabled, PhaseRendered, PhaseSkipped, PhaseTornDown, PhaseTransition, RenderRejected,
    SequenceCancelled, SequenceCompleted, SequenceStarted, SequencerEvent, SequencerEventKind,
};
use super::overlay::compose;
use super::phase::Phase;
use super::sequence::Sequence;

/// How phases advance.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransitionMode {
    /// Each phase advances once its duration has elapsed.
    #[default]
    Auto,
    /// A continue control is enabled once the duration has elapsed and the
    /// user confirms to advance.
    Manual,
}

impl TransitionMode {
    /// Lowercase name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::Manual => "manual",
        }
    }
}

impl fmt::Display for TransitionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// State of the current phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhaseState {
    /// Nothing is mounted; the current phase is about to render.
    Unrendered,
    /// The current phase overlay is mounted.
    Rendered,
    /// The current phase is fading out and will be unmounted.
    TearingDown,
    /// Every phase has been left. Terminal for the run.
    Complete,
    /// The run was stopped. Terminal for the run.
    Cancelled,
}

impl PhaseState {
    /// Lowercase name used in errors and events.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Unrendered => "unrendered",
            Self::Rendered => "rendered",
            Self::TearingDown => "tearing_down",
            Self::Complete => "complete",
            Self::Cancelled => "cancelled",
        }
    }

    /// Whether a phase overlay is on screen.
    #[must_use]
    pub fn is_on_screen(self) -> bool {
        matches!(self, Self::Rendered | Self::TearingDown)
    }
}

/// Sequencer tuning.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SequencerConfig {
    /// Cosmetic delay between the start of a teardown and the unmount.
    /// Zero makes teardown synchronous with the advance.
    pub fade_out: Duration,
}

impl SequencerConfig {
    /// Sets the fade-out delay.
    #[must_use]
    pub fn with_fade_out(mut self, fade_out: Duration) -> Self {
        self.fade_out = fade_out;
        self
    }
}

/// Snapshot of the run-time state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SequencerState {
    /// The current run, or `None` before the first `start`.
    pub run_id: Option<Uuid>,
    /// Index into the sequence.
    pub current_index: usize,
    /// Id of the phase at `current_index`, if in bounds.
    pub current_phase: Option<String>,
    /// State of the current phase.
    pub phase_state: PhaseState,
    /// Whether the continue control is actionable.
    pub continue_enabled: bool,
    /// How phases advance.
    pub mode: TransitionMode,
    /// Number of phases.
    pub phase_count: usize,
}

/// Passed to the completion handler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompletionReport {
    /// The run that completed.
    pub run_id: Uuid,
    /// Number of phases in the sequence.
    pub phase_count: usize,
    /// Phases that were mounted.
    pub phases_rendered: usize,
    /// Phases that could not be mounted.
    pub phases_skipped: usize,
}

/// Result of [`Sequencer::render_current_phase`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderOutcome {
    /// A phase is now mounted.
    Rendered,
    /// A phase was already on screen; nothing changed.
    Rejected,
    /// No phase was left to render and the run completed.
    Completed,
}

/// Result of [`Sequencer::advance`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdvanceOutcome {
    /// The next phase is mounted.
    Rendered,
    /// The current phase is fading out; the next one renders on a later poll.
    FadingOut,
    /// The run completed.
    Completed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TimerKind {
    Advance,
    EnableContinue,
    FinishTeardown,
}

#[derive(Debug, Clone, Copy)]
struct Timer {
    at: DateTime<Utc>,
    kind: TimerKind,
}

type CompletionHandler = Box<dyn FnMut(&CompletionReport) + Send>;

/// Drives a sequence of phases over a render surface.
///
/// All run-time state lives in the instance, so sequencers never interfere
/// with each other.
pub struct Sequencer {
    config: SequencerConfig,
    sequence: Sequence,
    mode: TransitionMode,
    run_id: Option<Uuid>,
    current_index: usize,
    phase_state: PhaseState,
    continue_enabled: bool,
    mounted_key: Option<String>,
    timer: Option<Timer>,
    phases_rendered: usize,
    phases_skipped: usize,
    completion_fired: bool,
    on_complete: Option<CompletionHandler>,
    version: i64,
    uncommitted_events: Vec<SequencerEvent>,
}

impl Sequencer {
    /// Creates an idle sequencer.
    #[must_use]
    pub fn new(config: SequencerConfig) -> Self {
        Self {
            config,
            sequence: Sequence::empty(),
            mode: TransitionMode::Auto,
            run_id: None,
            current_index: 0,
            phase_state: PhaseState::Unrendered,
            continue_enabled: false,
            mounted_key: None,
            timer: None,
            phases_rendered: 0,
            phases_skipped: 0,
            completion_fired: false,
            on_complete: None,
            version: 0,
            uncommitted_events: Vec::new(),
        }
    }

    /// Registers the completion handler, replacing any previous one. It is
    /// invoked exactly once per run.
    pub fn on_complete<F>(&mut self, handler: F)
    where
        F: FnMut(&CompletionReport) + Send + 'static,
    {
        self.on_complete = Some(Box::new(handler));
    }

    /// Starts a new run at the first phase.
    ///
    /// Any overlay left on screen by a previous run is unmounted and its
    /// pending deadlines are discarded. An empty sequence completes at once.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::RenderSurface` if the surface is unavailable.
    pub fn start(
        &mut self,
        sequence: Sequence,
        mode: TransitionMode,
        surface: &mut dyn RenderSurface,
        clock: &dyn Clock,
    ) -> Result<RenderOutcome, DomainError> {
        self.cancel(surface, clock);

        if !surface.is_available() {
            error!("render surface unavailable; sequence cannot start");
            return Err(DomainError::RenderSurface(
                "render surface unavailable".into(),
            ));
        }

        let run_id = Uuid::new_v4();
        self.sequence = sequence;
        self.mode = mode;
        self.run_id = Some(run_id);
        self.current_index = 0;
        self.phase_state = PhaseState::Unrendered;
        self.continue_enabled = false;
        self.timer = None;
        self.phases_rendered = 0;
        self.phases_skipped = 0;
        self.completion_fired = false;

        info!(
            %run_id,
            phase_count = self.sequence.len(),
            mode = %mode,
            "sequence started"
        );
        self.record(
            SequencerEventKind::SequenceStarted(SequenceStarted {
                phase_count: self.sequence.len(),
                mode,
            }),
            clock,
        );

        self.render_current_phase(surface, clock)
    }

    /// Mounts the overlay of the current phase.
    ///
    /// A request while a phase is on screen is rejected: nothing is mounted
    /// or hidden and a `RenderRejected` event is recorded. A phase the
    /// surface refuses is skipped and the next one is tried.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidTransition` before the first `start` or
    /// after the run has ended.
    pub fn render_current_phase(
        &mut self,
        surface: &mut dyn RenderSurface,
        clock: &dyn Clock,
    ) -> Result<RenderOutcome, DomainError> {
        if self.run_id.is_none() {
            return Err(DomainError::InvalidTransition {
                action: "render",
                state: "not started",
            });
        }
        match self.phase_state {
            PhaseState::Rendered | PhaseState::TearingDown => {
                let phase_id = self.mounted_key.clone().unwrap_or_default();
                warn!(
                    phase_id = %phase_id,
                    state = self.phase_state.as_str(),
                    "render rejected; a phase is already on screen"
                );
                self.record(
                    SequencerEventKind::RenderRejected(RenderRejected {
                        phase_id,
                        state: self.phase_state.as_str().to_owned(),
                    }),
                    clock,
                );
                return Ok(RenderOutcome::Rejected);
            }
            PhaseState::Complete | PhaseState::Cancelled => {
                return Err(DomainError::InvalidTransition {
                    action: "render",
                    state: self.phase_state.as_str(),
                });
            }
            PhaseState::Unrendered => {}
        }

        let sequence = self.sequence.clone();
        while let Some(phase) = sequence.get(self.current_index) {
            let overlay = compose(phase, self.mode);
            match surface.mount(&overlay) {
                Ok(()) => {
                    self.on_mounted(phase, overlay.nodes.len(), surface, clock);
                    return Ok(RenderOutcome::Rendered);
                }
                Err(err) => {
                    warn!(phase_id = %phase.id, error = %err, "phase skipped");
                    self.phases_skipped += 1;
                    self.record(
                        SequencerEventKind::PhaseSkipped(PhaseSkipped {
                            phase_id: phase.id.to_string(),
                            reason: err.to_string(),
                        }),
                        clock,
                    );
                    self.current_index += 1;
                }
            }
        }

        self.complete(clock);
        Ok(RenderOutcome::Completed)
    }

    fn on_mounted(
        &mut self,
        phase: &Phase,
        node_count: usize,
        surface: &mut dyn RenderSurface,
        clock: &dyn Clock,
    ) {
        let now = clock.now();
        self.phase_state = PhaseState::Rendered;
        self.mounted_key = Some(phase.id.to_string());
        self.phases_rendered += 1;
        debug!(phase_id = %phase.id, index = self.current_index, "phase rendered");
        self.record(
            SequencerEventKind::PhaseRendered(PhaseRendered {
                phase_id: phase.id.to_string(),
                index: self.current_index,
                node_count,
            }),
            clock,
        );

        let at = deadline_after(now, phase.duration());
        self.timer = match self.mode {
            TransitionMode::Auto => Some(Timer {
                at,
                kind: TimerKind::Advance,
            }),
            TransitionMode::Manual if phase.duration_ms == 0 => {
                self.enable_continue(surface, clock);
                None
            }
            TransitionMode::Manual => Some(Timer {
                at,
                kind: TimerKind::EnableContinue,
            }),
        };
    }

    /// Leaves the current phase.
    ///
    /// Records the phase transition, tears the overlay down and renders the
    /// next phase, or completes the run after the last one. With a fade-out
    /// configured the unmount and the next render happen on the poll at or
    /// after the fade-out deadline.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidTransition` unless a phase is rendered.
    pub fn advance(
        &mut self,
        surface: &mut dyn RenderSurface,
        clock: &dyn Clock,
    ) -> Result<AdvanceOutcome, DomainError> {
        if self.phase_state != PhaseState::Rendered {
            return Err(DomainError::InvalidTransition {
                action: "advance",
                state: self.phase_state.as_str(),
            });
        }

        let from = self.mounted_key.clone().unwrap_or_default();
        let to = self
            .sequence
            .get(self.current_index + 1)
            .map(|p| p.id.to_string());
        debug!(from = %from, to = ?to, "phase transition");
        self.record(
            SequencerEventKind::PhaseTransition(PhaseTransition { from, to }),
            clock,
        );

        self.timer = None;
        self.continue_enabled = false;
        self.phase_state = PhaseState::TearingDown;

        if self.config.fade_out.is_zero() {
            return Ok(self.finish_teardown(surface, clock));
        }
        self.timer = Some(Timer {
            at: deadline_after(clock.now(), self.config.fade_out),
            kind: TimerKind::FinishTeardown,
        });
        Ok(AdvanceOutcome::FadingOut)
    }

    fn finish_teardown(
        &mut self,
        surface: &mut dyn RenderSurface,
        clock: &dyn Clock,
    ) -> AdvanceOutcome {
        if let Some(key) = self.mounted_key.take() {
            surface.unmount(&key);
            self.record(
                SequencerEventKind::PhaseTornDown(PhaseTornDown { phase_id: key }),
                clock,
            );
        }
        self.phase_state = PhaseState::Unrendered;
        self.current_index += 1;

        // Unrendered and started, so rendering cannot be rejected or fail.
        match self.render_current_phase(surface, clock) {
            Ok(RenderOutcome::Rendered | RenderOutcome::Rejected) => AdvanceOutcome::Rendered,
            Ok(RenderOutcome::Completed) | Err(_) => AdvanceOutcome::Completed,
        }
    }

    /// Handles a user confirmation in manual mode.
    ///
    /// Due deadlines are fired first, so the continue control reflects the
    /// clock. Returns `true` if the confirmation advanced the sequence; a
    /// confirmation before the control is enabled is ignored.
    ///
    /// # Errors
    ///
    /// Propagates errors from firing due deadlines.
    pub fn confirm(
        &mut self,
        surface: &mut dyn RenderSurface,
        clock: &dyn Clock,
    ) -> Result<bool, DomainError> {
        self.poll(surface, clock)?;
        if self.mode != TransitionMode::Manual
            || self.phase_state != PhaseState::Rendered
            || !self.continue_enabled
        {
            debug!(
                state = self.phase_state.as_str(),
                continue_enabled = self.continue_enabled,
                "confirmation ignored"
            );
            return Ok(false);
        }
        self.advance(surface, clock)?;
        Ok(true)
    }

    /// Fires every deadline of the current run that is due. Returns the
    /// number of deadlines fired.
    ///
    /// # Errors
    ///
    /// Propagates errors from the operations the deadlines trigger.
    pub fn poll(
        &mut self,
        surface: &mut dyn RenderSurface,
        clock: &dyn Clock,
    ) -> Result<usize, DomainError> {
        let mut fired = 0;
        while let Some(timer) = self.timer {
            if timer.at > clock.now() {
                break;
            }
            self.timer = None;
            fired += 1;
            match timer.kind {
                TimerKind::Advance => {
                    self.advance(surface, clock)?;
                }
                TimerKind::EnableContinue => self.enable_continue(surface, clock),
                TimerKind::FinishTeardown => {
                    self.finish_teardown(surface, clock);
                }
            }
        }
        Ok(fired)
    }

    fn enable_continue(&mut self, surface: &mut dyn RenderSurface, clock: &dyn Clock) {
        let Some(key) = self.mounted_key.clone() else {
            return;
        };
        self.continue_enabled = true;
        surface.set_continue_enabled(&key, true);
        debug!(phase_id = %key, "continue enabled");
        self.record(
            SequencerEventKind::ContinueEnabled(ContinueEnabled { phase_id: key }),
            clock,
        );
    }

    /// The earliest pending deadline of the current run.
    #[must_use]
    pub fn next_deadline(&self) -> Option<DateTime<Utc>> {
        self.timer.map(|t| t.at)
    }

    /// Stops the current run: unmounts any phase on screen and drops its
    /// deadlines. Has no effect when no phase is on screen.
    pub fn cancel(&mut self, surface: &mut dyn RenderSurface, clock: &dyn Clock) {
        if !self.phase_state.is_on_screen() {
            return;
        }
        let phase_id = self.mounted_key.take();
        if let Some(key) = &phase_id {
            surface.unmount(key);
        }
        info!(phase_id = ?phase_id, "sequence cancelled");
        self.record(
            SequencerEventKind::SequenceCancelled(SequenceCancelled { phase_id }),
            clock,
        );
        self.timer = None;
        self.continue_enabled = false;
        self.phase_state = PhaseState::Cancelled;
    }

    fn complete(&mut self, clock: &dyn Clock) {
        self.phase_state = PhaseState::Complete;
        self.timer = None;
        self.continue_enabled = false;
        if self.completion_fired {
            return;
        }
        self.completion_fired = true;

        let report = CompletionReport {
            run_id: self.run_id.unwrap_or_default(),
            phase_count: self.sequence.len(),
            phases_rendered: self.phases_rendered,
            phases_skipped: self.phases_skipped,
        };
        info!(
            run_id = %report.run_id,
            phases_rendered = report.phases_rendered,
            phases_skipped = report.phases_skipped,
            "sequence completed"
        );
        self.record(
            SequencerEventKind::SequenceCompleted(SequenceCompleted {
                phases_rendered: report.phases_rendered,
                phases_skipped: report.phases_skipped,
            }),
            clock,
        );
        if let Some(handler) = self.on_complete.as_mut() {
            handler(&report);
        }
    }

    fn record(&mut self, kind: SequencerEventKind, clock: &dyn Clock) {
        self.version += 1;
        let event = SequencerEvent {
            metadata: EventMetadata {
                event_id: Uuid::new_v4(),
                event_type: kind.event_type().to_owned(),
                run_id: self.run_id.unwrap_or_default(),
                sequence_number: self.version,
                occurred_at: clock.now(),
            },
            kind,
        };
        self.uncommitted_events.push(event);
    }

    /// Snapshot of the run-time state.
    #[must_use]
    pub fn state(&self) -> SequencerState {
        SequencerState {
            run_id: self.run_id,
            current_index: self.current_index,
            current_phase: self.current_phase().map(|p| p.id.to_string()),
            phase_state: self.phase_state,
            continue_enabled: self.continue_enabled,
            mode: self.mode,
            phase_count: self.sequence.len(),
        }
    }

    /// The phase at the current index, if in bounds.
    #[must_use]
    pub fn current_phase(&self) -> Option<&Phase> {
        self.sequence.get(self.current_index)
    }

    /// State of the current phase.
    #[must_use]
    pub fn phase_state(&self) -> PhaseState {
        self.phase_state
    }

    /// The current run id.
    #[must_use]
    pub fn run_id(&self) -> Option<Uuid> {
        self.run_id
    }

    /// The sequence of the current run.
    #[must_use]
    pub fn sequence(&self) -> &Sequence {
        &self.sequence
    }

    /// The configuration.
    #[must_use]
    pub fn config(&self) -> SequencerConfig {
        self.config
    }
}

impl fmt::Debug for Sequencer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sequencer")
            .field("run_id", &self.run_id)
            .field("mode", &self.mode)
            .field("current_index", &self.current_index)
            .field("phase_state", &self.phase_state)
            .field("continue_enabled", &self.continue_enabled)
            .field("phase_count", &self.sequence.len())
            .field("version", &self.version)
            .finish_non_exhaustive()
    }
}

impl EventSource for Sequencer {
    type Event = SequencerEvent;

    fn version(&self) -> i64 {
        self.version
    }

    fn uncommitted_events(&self) -> &[Self::Event] {
        &self.uncommitted_events
    }

    fn drain_events(&mut self) -> Vec<Self::Event> {
        std::mem::take(&mut self.uncommitted_events)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use psyche_core::event::DomainEvent;
    use psyche_core::overlay::{AssetHandle, Placement};
    use psyche_test_support::{
        FailingSurface, ManualClock, RecordingSurface, SurfaceOp, UnavailableSurface,
    };

    use super::*;
    use crate::domain::events;
    use crate::domain::phase::OverlayImage;

    fn sequence(phases: Vec<Phase>) -> Sequence {
        Sequence::new(phases).unwrap()
    }

    fn scenario_one() -> Sequence {
        sequence(vec![
            Phase::new("a", 1000).with_caption(["hi"]),
            Phase::new("b", 500),
        ])
    }

    fn counting_sequencer(config: SequencerConfig) -> (Sequencer, Arc<AtomicUsize>) {
        let count = Arc::new(AtomicUsize::new(0));
        let mut sequencer = Sequencer::new(config);
        let handler_count = Arc::clone(&count);
        sequencer.on_complete(move |_| {
            handler_count.fetch_add(1, Ordering::SeqCst);
        });
        (sequencer, count)
    }

    fn event_types(sequencer: &mut Sequencer) -> Vec<&'static str> {
        sequencer
            .drain_events()
            .iter()
            .map(DomainEvent::event_type)
            .collect()
    }

    #[test]
    fn test_auto_scenario_renders_tears_down_and_completes() {
        // Arrange
        let clock = ManualClock::new();
        let mut surface = RecordingSurface::new();
        let (mut sequencer, count) = counting_sequencer(SequencerConfig::default());

        // Act / Assert: phase "a" renders immediately with its caption.
        sequencer
            .start(scenario_one(), TransitionMode::Auto, &mut surface, &clock)
            .unwrap();
        assert_eq!(surface.live_keys(), ["a"]);
        assert!(surface.overlay("a").unwrap().has_caption());

        clock.advance_ms(999);
        assert_eq!(sequencer.poll(&mut surface, &clock).unwrap(), 0);
        assert_eq!(surface.live_keys(), ["a"]);

        // t = 1000: "a" torn down, "b" rendered without caption.
        clock.advance_ms(1);
        assert_eq!(sequencer.poll(&mut surface, &clock).unwrap(), 1);
        assert_eq!(surface.live_keys(), ["b"]);
        assert!(!surface.overlay("b").unwrap().has_caption());
        let ops = surface.ops();
        let unmount_a = ops
            .iter()
            .position(|op| *op == SurfaceOp::Unmount("a".into()))
            .unwrap();
        let mount_b = ops
            .iter()
            .position(|op| *op == SurfaceOp::Mount("b".into()))
            .unwrap();
        assert!(unmount_a < mount_b);

        // t = 1500: sequence completes.
        clock.advance_ms(499);
        sequencer.poll(&mut surface, &clock).unwrap();
        assert_eq!(count.load(Ordering::SeqCst), 0);
        clock.advance_ms(1);
        sequencer.poll(&mut surface, &clock).unwrap();
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(sequencer.phase_state(), PhaseState::Complete);
        assert!(surface.live().is_empty());
        assert_eq!(sequencer.next_deadline(), None);
    }

    #[test]
    fn test_auto_scenario_records_events_in_order() {
        // Arrange
        let clock = ManualClock::new();
        let mut surface = RecordingSurface::new();
        let mut sequencer = Sequencer::new(SequencerConfig::default());

        // Act
        sequencer
            .start(scenario_one(), TransitionMode::Auto, &mut surface, &clock)
            .unwrap();
        clock.advance_ms(1500);
        sequencer.poll(&mut surface, &clock).unwrap();

        // Assert
        let run_id = sequencer.run_id().unwrap();
        let events = sequencer.drain_events();
        let types: Vec<&str> = events.iter().map(DomainEvent::event_type).collect();
        assert_eq!(
            types,
            [
                events::SEQUENCE_STARTED,
                events::PHASE_RENDERED,
                events::PHASE_TRANSITION,
                events::PHASE_TORN_DOWN,
                events::PHASE_RENDERED,
                events::PHASE_TRANSITION,
                events::PHASE_TORN_DOWN,
                events::SEQUENCE_COMPLETED,
            ]
        );
        for (i, event) in events.iter().enumerate() {
            let meta = event.metadata();
            assert_eq!(meta.run_id, run_id);
            assert_eq!(meta.sequence_number, i64::try_from(i).unwrap() + 1);
        }
        assert!(sequencer.uncommitted_events().is_empty());
        assert_eq!(sequencer.version(), 8);
    }

    #[test]
    fn test_manual_scenario_gates_continue_on_duration() {
        // Arrange
        let clock = ManualClock::new();
        let mut surface = RecordingSurface::new();
        let (mut sequencer, count) = counting_sequencer(SequencerConfig::default());
        let only = sequence(vec![Phase::new("only", 2000)]);

        // Act / Assert: the control is present but disabled.
        sequencer
            .start(only, TransitionMode::Manual, &mut surface, &clock)
            .unwrap();
        assert_eq!(surface.overlay("only").unwrap().continue_control(), Some(false));

        clock.advance_ms(1999);
        assert!(!sequencer.confirm(&mut surface, &clock).unwrap());
        assert_eq!(sequencer.phase_state(), PhaseState::Rendered);
        assert!(!sequencer.state().continue_enabled);

        clock.advance_ms(1);
        sequencer.poll(&mut surface, &clock).unwrap();
        assert_eq!(surface.overlay("only").unwrap().continue_control(), Some(true));

        assert!(sequencer.confirm(&mut surface, &clock).unwrap());
        assert_eq!(sequencer.phase_state(), PhaseState::Complete);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_manual_never_advances_without_confirmation() {
        let clock = ManualClock::new();
        let mut surface = RecordingSurface::new();
        let mut sequencer = Sequencer::new(SequencerConfig::default());
        sequencer
            .start(scenario_one(), TransitionMode::Manual, &mut surface, &clock)
            .unwrap();

        clock.advance_ms(1_000_000);
        sequencer.poll(&mut surface, &clock).unwrap();

        assert_eq!(sequencer.phase_state(), PhaseState::Rendered);
        assert_eq!(surface.live_keys(), ["a"]);
        assert_eq!(sequencer.next_deadline(), None);
    }

    #[test]
    fn test_manual_zero_duration_enables_continue_on_render() {
        let clock = ManualClock::new();
        let mut surface = RecordingSurface::new();
        let mut sequencer = Sequencer::new(SequencerConfig::default());
        sequencer
            .start(
                sequence(vec![Phase::new("quote1", 0)]),
                TransitionMode::Manual,
                &mut surface,
                &clock,
            )
            .unwrap();

        assert!(sequencer.confirm(&mut surface, &clock).unwrap());
    }

    #[test]
    fn test_confirm_in_auto_mode_is_ignored() {
        let clock = ManualClock::new();
        let mut surface = RecordingSurface::new();
        let mut sequencer = Sequencer::new(SequencerConfig::default());
        sequencer
            .start(scenario_one(), TransitionMode::Auto, &mut surface, &clock)
            .unwrap();

        assert!(!sequencer.confirm(&mut surface, &clock).unwrap());
        assert_eq!(surface.live_keys(), ["a"]);
    }

    #[test]
    fn test_empty_sequence_completes_immediately() {
        // Arrange
        let clock = ManualClock::new();
        let mut surface = RecordingSurface::new();
        let (mut sequencer, count) = counting_sequencer(SequencerConfig::default());

        // Act
        let outcome = sequencer
            .start(Sequence::empty(), TransitionMode::Auto, &mut surface, &clock)
            .unwrap();

        // Assert
        assert_eq!(outcome, RenderOutcome::Completed);
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert!(surface.mounted_keys().is_empty());
        assert_eq!(
            event_types(&mut sequencer),
            [events::SEQUENCE_STARTED, events::SEQUENCE_COMPLETED]
        );
    }

    #[test]
    fn test_advancing_len_times_completes_once() {
        // Arrange
        let clock = ManualClock::new();
        let mut surface = RecordingSurface::new();
        let (mut sequencer, count) = counting_sequencer(SequencerConfig::default());
        let phases = sequence(vec![
            Phase::new("one", 10),
            Phase::new("two", 10),
            Phase::new("three", 10),
        ]);

        // Act
        sequencer
            .start(phases, TransitionMode::Manual, &mut surface, &clock)
            .unwrap();
        let outcomes: Vec<AdvanceOutcome> = (0..3)
            .map(|_| sequencer.advance(&mut surface, &clock).unwrap())
            .collect();

        // Assert
        assert_eq!(
            outcomes,
            [
                AdvanceOutcome::Rendered,
                AdvanceOutcome::Rendered,
                AdvanceOutcome::Completed
            ]
        );
        assert_eq!(count.load(Ordering::SeqCst), 1);
        match sequencer.advance(&mut surface, &clock) {
            Err(DomainError::InvalidTransition { action, state }) => {
                assert_eq!(action, "advance");
                assert_eq!(state, "complete");
            }
            other => panic!("expected InvalidTransition, got {other:?}"),
        }
        sequencer.poll(&mut surface, &clock).unwrap();
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_restart_discards_pending_deadline() {
        // Arrange
        let clock = ManualClock::new();
        let mut surface = RecordingSurface::new();
        let (mut sequencer, count) = counting_sequencer(SequencerConfig::default());
        sequencer
            .start(scenario_one(), TransitionMode::Auto, &mut surface, &clock)
            .unwrap();
        let first_run = sequencer.run_id();
        clock.advance_ms(500);

        // Act
        sequencer
            .start(scenario_one(), TransitionMode::Auto, &mut surface, &clock)
            .unwrap();
        clock.advance_ms(600);
        let fired = sequencer.poll(&mut surface, &clock).unwrap();

        // Assert: the first run's deadline at t=1000 did not fire.
        assert_eq!(fired, 0);
        assert_ne!(sequencer.run_id(), first_run);
        assert_eq!(surface.live_keys(), ["a"]);
        assert_eq!(sequencer.state().current_index, 0);
        assert_eq!(
            sequencer.next_deadline(),
            Some(clock.origin() + chrono::TimeDelta::milliseconds(1500))
        );
        assert!(
            sequencer
                .drain_events()
                .iter()
                .any(|e| e.event_type() == events::SEQUENCE_CANCELLED)
        );
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_restart_after_complete_fires_handler_again() {
        let clock = ManualClock::new();
        let mut surface = RecordingSurface::new();
        let (mut sequencer, count) = counting_sequencer(SequencerConfig::default());

        sequencer
            .start(scenario_one(), TransitionMode::Auto, &mut surface, &clock)
            .unwrap();
        clock.advance_ms(1500);
        sequencer.poll(&mut surface, &clock).unwrap();
        sequencer
            .start(scenario_one(), TransitionMode::Auto, &mut surface, &clock)
            .unwrap();

        assert_eq!(sequencer.state().current_index, 0);
        assert_eq!(surface.live_keys(), ["a"]);
        clock.advance_ms(1500);
        sequencer.poll(&mut surface, &clock).unwrap();
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_render_while_rendered_is_rejected() {
        // Arrange
        let clock = ManualClock::new();
        let mut surface = RecordingSurface::new();
        let mut sequencer = Sequencer::new(SequencerConfig::default());
        sequencer
            .start(scenario_one(), TransitionMode::Auto, &mut surface, &clock)
            .unwrap();
        sequencer.drain_events();

        // Act
        let outcome = sequencer.render_current_phase(&mut surface, &clock).unwrap();

        // Assert: nothing hidden, nothing mounted twice.
        assert_eq!(outcome, RenderOutcome::Rejected);
        assert_eq!(surface.live_keys(), ["a"]);
        assert_eq!(surface.ops(), [SurfaceOp::Mount("a".into())]);
        assert_eq!(event_types(&mut sequencer), [events::RENDER_REJECTED]);
        assert_eq!(sequencer.phase_state(), PhaseState::Rendered);
    }

    #[test]
    fn test_render_before_start_is_invalid() {
        let clock = ManualClock::new();
        let mut surface = RecordingSurface::new();
        let mut sequencer = Sequencer::new(SequencerConfig::default());

        let result = sequencer.render_current_phase(&mut surface, &clock);

        assert!(matches!(
            result,
            Err(DomainError::InvalidTransition {
                action: "render",
                ..
            })
        ));
    }

    #[test]
    fn test_failed_mount_skips_phase() {
        // Arrange
        let clock = ManualClock::new();
        let mut surface = RecordingSurface::failing_on(&["a"]);
        let (mut sequencer, count) = counting_sequencer(SequencerConfig::default());

        // Act
        sequencer
            .start(scenario_one(), TransitionMode::Auto, &mut surface, &clock)
            .unwrap();

        // Assert
        assert_eq!(surface.live_keys(), ["b"]);
        assert_eq!(sequencer.state().current_index, 1);
        let events = sequencer.drain_events();
        let skipped = events
            .iter()
            .find(|e| e.event_type() == events::PHASE_SKIPPED)
            .unwrap();
        assert_eq!(skipped.to_payload()["phase_id"], "a");
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_all_mounts_failing_still_completes() {
        let clock = ManualClock::new();
        let mut surface = FailingSurface;
        let mut sequencer = Sequencer::new(SequencerConfig::default());
        let reports = Arc::new(std::sync::Mutex::new(Vec::new()));
        let sink = Arc::clone(&reports);
        sequencer.on_complete(move |report| sink.lock().unwrap().push(report.clone()));

        let outcome = sequencer
            .start(scenario_one(), TransitionMode::Auto, &mut surface, &clock)
            .unwrap();

        assert_eq!(outcome, RenderOutcome::Completed);
        let reports = reports.lock().unwrap();
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].phases_rendered, 0);
        assert_eq!(reports[0].phases_skipped, 2);
    }

    #[test]
    fn test_unavailable_surface_fails_fast() {
        let clock = ManualClock::new();
        let mut surface = UnavailableSurface;
        let (mut sequencer, count) = counting_sequencer(SequencerConfig::default());

        let result = sequencer.start(scenario_one(), TransitionMode::Auto, &mut surface, &clock);

        assert!(matches!(result, Err(DomainError::RenderSurface(_))));
        assert_eq!(count.load(Ordering::SeqCst), 0);
        assert_eq!(sequencer.run_id(), None);
    }

    #[test]
    fn test_restart_on_unavailable_surface_clears_previous_run() {
        // Arrange
        let clock = ManualClock::new();
        let mut surface = RecordingSurface::new();
        let mut sequencer = Sequencer::new(SequencerConfig::default());
        sequencer
            .start(scenario_one(), TransitionMode::Auto, &mut surface, &clock)
            .unwrap();
        assert!(sequencer.next_deadline().is_some());
        surface.set_available(false);

        // Act
        let result = sequencer.start(scenario_one(), TransitionMode::Auto, &mut surface, &clock);

        // Assert
        assert!(matches!(result, Err(DomainError::RenderSurface(_))));
        assert_eq!(sequencer.next_deadline(), None);
        assert_eq!(sequencer.phase_state(), PhaseState::Cancelled);
        assert!(surface.live().is_empty());
        clock.advance_ms(5_000);
        assert_eq!(sequencer.poll(&mut surface, &clock).unwrap(), 0);
    }

    #[test]
    fn test_longest_duration_never_fires() {
        // Arrange
        let clock = ManualClock::new();
        let mut surface = RecordingSurface::new();
        let mut sequencer = Sequencer::new(SequencerConfig::default());
        let forever = sequence(vec![Phase::new("forever", u64::MAX)]);

        // Act
        let outcome = sequencer.start(forever, TransitionMode::Auto, &mut surface, &clock);

        // Assert
        assert_eq!(outcome.unwrap(), RenderOutcome::Rendered);
        assert_eq!(sequencer.next_deadline(), Some(DateTime::<Utc>::MAX_UTC));
        clock.advance_ms(i64::from(u32::MAX));
        assert_eq!(sequencer.poll(&mut surface, &clock).unwrap(), 0);
        assert_eq!(surface.live_keys(), ["forever"]);
    }

    #[test]
    fn test_longest_fade_out_keeps_phase_tearing_down() {
        // Arrange
        let clock = ManualClock::new();
        let mut surface = RecordingSurface::new();
        let mut sequencer = Sequencer::new(SequencerConfig::default().with_fade_out(Duration::MAX));
        sequencer
            .start(scenario_one(), TransitionMode::Auto, &mut surface, &clock)
            .unwrap();

        // Act
        let outcome = sequencer.advance(&mut surface, &clock);

        // Assert
        assert_eq!(outcome.unwrap(), AdvanceOutcome::FadingOut);
        assert_eq!(sequencer.next_deadline(), Some(DateTime::<Utc>::MAX_UTC));
        assert_eq!(sequencer.phase_state(), PhaseState::TearingDown);
    }

    #[test]
    fn test_teardown_leaves_no_nodes_behind() {
        // Arrange
        let clock = ManualClock::new();
        let mut surface = RecordingSurface::new();
        let mut sequencer = Sequencer::new(SequencerConfig::default());
        let stacked = |id: &str, z: i32| OverlayImage {
            id: id.to_owned(),
            handle: AssetHandle::parse(&format!("{id}.png")).unwrap(),
            placement: Placement::default(),
            stacking_order: z,
        };
        let phases = sequence(vec![
            Phase::new("full", 100)
                .with_primary_image("asteroid.png", "Psyche")
                .with_banner("scroll.png")
                .with_caption(["line"])
                .with_overlay_image(stacked("butterfly", 15))
                .with_overlay_image(stacked("chrysalis", 16)),
            Phase::new("blank", 100),
        ]);

        // Act
        sequencer
            .start(phases, TransitionMode::Auto, &mut surface, &clock)
            .unwrap();
        assert_eq!(surface.live_node_count(), 5);
        clock.advance_ms(100);
        sequencer.poll(&mut surface, &clock).unwrap();

        // Assert
        assert_eq!(surface.live_keys(), ["blank"]);
        assert_eq!(surface.live_node_count(), 0);
    }

    #[test]
    fn test_fade_out_delays_unmount_and_next_render() {
        // Arrange
        let clock = ManualClock::new();
        let mut surface = RecordingSurface::new();
        let config = SequencerConfig::default().with_fade_out(Duration::from_millis(250));
        let mut sequencer = Sequencer::new(config);
        sequencer
            .start(scenario_one(), TransitionMode::Auto, &mut surface, &clock)
            .unwrap();

        // Act / Assert
        clock.advance_ms(1000);
        sequencer.poll(&mut surface, &clock).unwrap();
        assert_eq!(sequencer.phase_state(), PhaseState::TearingDown);
        assert_eq!(surface.live_keys(), ["a"]);
        assert_eq!(
            sequencer.render_current_phase(&mut surface, &clock).unwrap(),
            RenderOutcome::Rejected
        );

        clock.advance_ms(249);
        sequencer.poll(&mut surface, &clock).unwrap();
        assert_eq!(surface.live_keys(), ["a"]);

        clock.advance_ms(1);
        sequencer.poll(&mut surface, &clock).unwrap();
        assert_eq!(surface.live_keys(), ["b"]);
        assert_eq!(
            sequencer.next_deadline(),
            Some(clock.origin() + chrono::TimeDelta::milliseconds(1750))
        );
    }

    #[test]
    fn test_cancel_unmounts_and_stops_timers() {
        let clock = ManualClock::new();
        let mut surface = RecordingSurface::new();
        let (mut sequencer, count) = counting_sequencer(SequencerConfig::default());
        sequencer
            .start(scenario_one(), TransitionMode::Auto, &mut surface, &clock)
            .unwrap();

        sequencer.cancel(&mut surface, &clock);
        clock.advance_ms(5000);
        sequencer.poll(&mut surface, &clock).unwrap();

        assert_eq!(sequencer.phase_state(), PhaseState::Cancelled);
        assert!(surface.live().is_empty());
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_separate_sequencers_do_not_interfere() {
        let clock = ManualClock::new();
        let mut first_surface = RecordingSurface::new();
        let mut second_surface = RecordingSurface::new();
        let mut first = Sequencer::new(SequencerConfig::default());
        let mut second = Sequencer::new(SequencerConfig::default());

        first
            .start(scenario_one(), TransitionMode::Auto, &mut first_surface, &clock)
            .unwrap();
        clock.advance_ms(1000);
        first.poll(&mut first_surface, &clock).unwrap();
        second
            .start(scenario_one(), TransitionMode::Auto, &mut second_surface, &clock)
            .unwrap();

        assert_eq!(first.state().current_index, 1);
        assert_eq!(second.state().current_index, 0);
    }
}
