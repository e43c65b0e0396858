//! The async phase player.
//!
//! A `PhasePlayer` owns one [`Sequencer`] inside a tokio task. The task
//! sleeps until the sequencer's next deadline, polls it, and applies
//! commands sent through a [`PlayerHandle`]. After every step it drains the
//! sequencer's events to the cue sinks and the broadcast channel and
//! publishes a fresh [`PlayerSnapshot`].

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use psyche_core::clock::{Clock, to_delta};
use psyche_core::cue::CueSink;
use psyche_core::error::DomainError;
use psyche_core::outbox::EventSource;
use psyche_core::surface::{RenderSurface, SharedSurface, lock_surface};
use serde::Serialize;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::domain::events::SequencerEvent;
use crate::domain::sequence::Sequence;
use crate::domain::sequencer::{
    CompletionReport, Sequencer, SequencerConfig, SequencerState, TransitionMode,
};

const COMMAND_BUFFER: usize = 16;
const EVENT_BUFFER: usize = 64;

/// Roughly thirty years; deadlines beyond it are treated as never.
pub const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

/// A `Clock` backed by tokio's clock, so paused-time tests drive deadlines.
#[derive(Debug, Clone, Copy)]
pub struct TokioClock {
    base: DateTime<Utc>,
    origin: Instant,
}

impl TokioClock {
    /// Anchors the clock at the current wall-clock time.
    #[must_use]
    pub fn new() -> Self {
        Self {
            base: Utc::now(),
            origin: Instant::now(),
        }
    }

    /// The tokio instant at which this clock reads `at`. Times too far out
    /// for `Instant` map to [`FAR_FUTURE`] past the origin.
    #[must_use]
    pub fn instant_at(&self, at: DateTime<Utc>) -> Instant {
        let offset = at
            .signed_duration_since(self.base)
            .to_std()
            .unwrap_or(Duration::ZERO)
            .min(FAR_FUTURE);
        self.origin + offset
    }
}

impl Default for TokioClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for TokioClock {
    fn now(&self) -> DateTime<Utc> {
        self.base + to_delta(self.origin.elapsed())
    }
}

/// What a player publishes after every step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlayerSnapshot {
    /// Sequencer state.
    pub state: SequencerState,
    /// The completion report of the current run, once it has completed.
    pub completion: Option<CompletionReport>,
    /// Whether the player task is still running.
    pub running: bool,
}

enum PlayerCommand {
    Confirm(oneshot::Sender<bool>),
    Restart(oneshot::Sender<Result<PlayerSnapshot, DomainError>>),
}

impl std::fmt::Debug for PlayerCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Confirm(_) => f.write_str("Confirm"),
            Self::Restart(_) => f.write_str("Restart"),
        }
    }
}

/// Runs a sequence on a render surface in a background task.
pub struct PhasePlayer {
    sequencer: Sequencer,
    sequence: Sequence,
    mode: TransitionMode,
    surface: SharedSurface,
    clock: TokioClock,
    cues: Vec<Arc<dyn CueSink>>,
}

impl PhasePlayer {
    /// Creates a player for `sequence`.
    #[must_use]
    pub fn new(
        sequence: Sequence,
        mode: TransitionMode,
        config: SequencerConfig,
        surface: SharedSurface,
    ) -> Self {
        Self {
            sequencer: Sequencer::new(config),
            sequence,
            mode,
            surface,
            clock: TokioClock::new(),
            cues: Vec::new(),
        }
    }

    /// Adds a cue sink that receives every sequencer event.
    #[must_use]
    pub fn with_cue_sink(mut self, sink: Arc<dyn CueSink>) -> Self {
        self.cues.push(sink);
        self
    }

    /// Starts the sequence and spawns the player task.
    ///
    /// The first phase is rendered before this returns, so the returned
    /// handle already reflects it.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::RenderSurface` if the surface is unavailable,
    /// or `DomainError::Infrastructure` if its lock is poisoned.
    pub fn spawn(mut self) -> Result<PlayerHandle, DomainError> {
        let (completion_tx, completion_rx) = watch::channel(None::<CompletionReport>);
        let completion_tx = Arc::new(completion_tx);
        let handler_tx = Arc::clone(&completion_tx);
        self.sequencer.on_complete(move |report| {
            handler_tx.send_replace(Some(report.clone()));
        });

        let (events_tx, _) = broadcast::channel(EVENT_BUFFER);
        let mut task = PlayerTask {
            player: self,
            events: events_tx.clone(),
            completion: completion_tx,
            snapshot: None,
        };
        task.start()?;
        let (snapshot_tx, snapshot_rx) = watch::channel(task.snapshot(true));
        task.snapshot = Some(snapshot_tx);

        let (commands_tx, commands_rx) = mpsc::channel(COMMAND_BUFFER);
        let cancel = CancellationToken::new();
        tokio::spawn(task.run(commands_rx, cancel.clone()));

        Ok(PlayerHandle {
            commands: commands_tx,
            snapshot: snapshot_rx,
            events: events_tx,
            completion: completion_rx,
            cancel,
        })
    }
}

struct PlayerTask {
    player: PhasePlayer,
    events: broadcast::Sender<SequencerEvent>,
    completion: Arc<watch::Sender<Option<CompletionReport>>>,
    snapshot: Option<watch::Sender<PlayerSnapshot>>,
}

impl PlayerTask {
    async fn run(mut self, mut commands: mpsc::Receiver<PlayerCommand>, cancel: CancellationToken) {
        loop {
            let deadline = self
                .player
                .sequencer
                .next_deadline()
                .map(|at| self.player.clock.instant_at(at));

            tokio::select! {
                () = cancel.cancelled() => break,
                command = commands.recv() => match command {
                    Some(PlayerCommand::Confirm(reply)) => {
                        let accepted = self
                            .step(|sequencer, surface, clock| sequencer.confirm(surface, clock))
                            .unwrap_or_else(|err| {
                                warn!(error = %err, "confirmation failed");
                                false
                            });
                        let _ = reply.send(accepted);
                    }
                    Some(PlayerCommand::Restart(reply)) => {
                        let result = self.start().map(|()| self.snapshot(true));
                        let _ = reply.send(result);
                    }
                    None => break,
                },
                () = sleep_until(deadline) => {
                    let polled =
                        self.step(|sequencer, surface, clock| sequencer.poll(surface, clock));
                    if let Err(err) = polled {
                        error!(error = %err, "phase deadline failed");
                    }
                }
            }
        }

        if let Err(err) = self.step(|sequencer, surface, clock| {
            sequencer.cancel(surface, clock);
            Ok(())
        }) {
            error!(error = %err, "player teardown failed");
        }
        self.publish(false);
        debug!("player stopped");
    }

    fn start(&mut self) -> Result<(), DomainError> {
        self.completion.send_replace(None);
        let sequence = self.player.sequence.clone();
        let mode = self.player.mode;
        self.step(|sequencer, surface, clock| {
            sequencer.start(sequence, mode, surface, clock).map(|_| ())
        })?;
        info!(run_id = ?self.player.sequencer.run_id(), "player started");
        Ok(())
    }

    /// Runs one sequencer operation with the surface locked, then flushes
    /// events and publishes a snapshot. The lock is released before
    /// anything else happens.
    fn step<T>(
        &mut self,
        op: impl FnOnce(&mut Sequencer, &mut dyn RenderSurface, &dyn Clock) -> Result<T, DomainError>,
    ) -> Result<T, DomainError> {
        let result = {
            let mut surface = lock_surface(&self.player.surface)?;
            op(&mut self.player.sequencer, &mut *surface, &self.player.clock)
        };
        self.flush();
        self.publish(true);
        result
    }

    fn flush(&mut self) {
        for event in self.player.sequencer.drain_events() {
            for cue in &self.player.cues {
                cue.on_event(&event);
            }
            // No subscribers is fine.
            let _ = self.events.send(event);
        }
    }

    fn snapshot(&self, running: bool) -> PlayerSnapshot {
        PlayerSnapshot {
            state: self.player.sequencer.state(),
            completion: self.completion.borrow().clone(),
            running,
        }
    }

    fn publish(&self, running: bool) {
        if let Some(tx) = &self.snapshot {
            tx.send_replace(self.snapshot(running));
        }
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}

/// Cloneable handle to a running player.
#[derive(Debug, Clone)]
pub struct PlayerHandle {
    commands: mpsc::Sender<PlayerCommand>,
    snapshot: watch::Receiver<PlayerSnapshot>,
    events: broadcast::Sender<SequencerEvent>,
    completion: watch::Receiver<Option<CompletionReport>>,
    cancel: CancellationToken,
}

fn player_gone() -> DomainError {
    DomainError::Infrastructure("phase player has stopped".into())
}

impl PlayerHandle {
    /// Sends a user confirmation. Returns `true` if it advanced the
    /// sequence.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Infrastructure` if the player has stopped.
    pub async fn confirm(&self) -> Result<bool, DomainError> {
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(PlayerCommand::Confirm(tx))
            .await
            .map_err(|_| player_gone())?;
        rx.await.map_err(|_| player_gone())
    }

    /// Restarts the sequence from the first phase under a new run id. Every
    /// deadline of the previous run is discarded.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Infrastructure` if the player has stopped, or
    /// the error raised by starting the sequence.
    pub async fn restart(&self) -> Result<PlayerSnapshot, DomainError> {
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(PlayerCommand::Restart(tx))
            .await
            .map_err(|_| player_gone())?;
        rx.await.map_err(|_| player_gone())?
    }

    /// Stops the player. Whatever is on screen is unmounted.
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    /// Waits until the player task has exited.
    pub async fn stopped(&self) {
        self.commands.closed().await;
    }

    /// The latest snapshot.
    #[must_use]
    pub fn snapshot(&self) -> PlayerSnapshot {
        self.snapshot.borrow().clone()
    }

    /// A receiver that is notified on every published snapshot.
    #[must_use]
    pub fn watch(&self) -> watch::Receiver<PlayerSnapshot> {
        self.snapshot.clone()
    }

    /// Subscribes to sequencer events published from now on.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<SequencerEvent> {
        self.events.subscribe()
    }

    /// Waits for the current run to complete. Returns `None` if the player
    /// stopped first.
    pub async fn completed(&self) -> Option<CompletionReport> {
        let mut completion = self.completion.clone();
        let report = completion.wait_for(Option::is_some).await.ok()?;
        (*report).clone()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use psyche_core::event::DomainEvent;
    use psyche_test_support::{RecordingCueSink, RecordingSurface, UnavailableSurface};

    use super::*;
    use crate::domain::events;
    use crate::domain::phase::Phase;
    use crate::domain::sequencer::PhaseState;

    fn two_phases() -> Sequence {
        Sequence::new(vec![
            Phase::new("a", 1000).with_caption(["hi"]),
            Phase::new("b", 500),
        ])
        .unwrap()
    }

    fn recording() -> (Arc<Mutex<RecordingSurface>>, SharedSurface) {
        let surface = Arc::new(Mutex::new(RecordingSurface::new()));
        let shared: SharedSurface = surface.clone();
        (surface, shared)
    }

    #[tokio::test(start_paused = true)]
    async fn test_player_runs_auto_sequence_to_completion() {
        // Arrange
        let (surface, shared) = recording();
        let cues = Arc::new(RecordingCueSink::new());
        let player = PhasePlayer::new(
            two_phases(),
            TransitionMode::Auto,
            SequencerConfig::default(),
            shared,
        )
        .with_cue_sink(cues.clone());

        // Act
        let handle = player.spawn().unwrap();
        assert_eq!(surface.lock().unwrap().live_keys(), ["a"]);
        let started = Instant::now();
        let report = handle.completed().await.unwrap();

        // Assert
        assert!(started.elapsed() >= Duration::from_millis(1500));
        assert_eq!(report.phases_rendered, 2);
        assert!(surface.lock().unwrap().live().is_empty());
        assert_eq!(cues.count_of(events::PHASE_TRANSITION), 2);
        assert_eq!(cues.count_of(events::SEQUENCE_COMPLETED), 1);
        assert_eq!(handle.snapshot().state.phase_state, PhaseState::Complete);
    }

    #[tokio::test(start_paused = true)]
    async fn test_player_manual_confirm_is_gated() {
        // Arrange
        let (surface, shared) = recording();
        let only = Sequence::new(vec![Phase::new("only", 2000)]).unwrap();
        let handle = PhasePlayer::new(
            only,
            TransitionMode::Manual,
            SequencerConfig::default(),
            shared,
        )
        .spawn()
        .unwrap();

        // Act / Assert
        tokio::time::sleep(Duration::from_millis(1999)).await;
        assert!(!handle.confirm().await.unwrap());
        assert_eq!(surface.lock().unwrap().live_keys(), ["only"]);

        tokio::time::sleep(Duration::from_millis(1)).await;
        assert!(handle.confirm().await.unwrap());
        assert!(handle.completed().await.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_player_restart_has_no_stale_advance() {
        // Arrange
        let (surface, shared) = recording();
        let cues = Arc::new(RecordingCueSink::new());
        let handle = PhasePlayer::new(
            two_phases(),
            TransitionMode::Auto,
            SequencerConfig::default(),
            shared,
        )
        .with_cue_sink(cues.clone())
        .spawn()
        .unwrap();
        tokio::time::sleep(Duration::from_millis(600)).await;

        // Act
        let snapshot = handle.restart().await.unwrap();
        tokio::time::sleep(Duration::from_millis(600)).await;

        // Assert: the first run's deadline at 1000ms would have shown "b".
        assert_eq!(snapshot.state.current_index, 0);
        assert_eq!(surface.lock().unwrap().live_keys(), ["a"]);
        assert_eq!(cues.count_of(events::PHASE_TRANSITION), 0);
        assert_eq!(cues.count_of(events::SEQUENCE_CANCELLED), 1);

        tokio::time::sleep(Duration::from_millis(450)).await;
        assert_eq!(surface.lock().unwrap().live_keys(), ["b"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_player_stop_unmounts_and_ends_task() {
        let (surface, shared) = recording();
        let handle = PhasePlayer::new(
            two_phases(),
            TransitionMode::Auto,
            SequencerConfig::default(),
            shared,
        )
        .spawn()
        .unwrap();

        handle.stop();
        handle.stopped().await;

        assert!(surface.lock().unwrap().live().is_empty());
        assert!(!handle.snapshot().running);
        assert!(handle.completed().await.is_none());
        assert!(handle.confirm().await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_player_broadcasts_events() {
        let (_surface, shared) = recording();
        let handle = PhasePlayer::new(
            two_phases(),
            TransitionMode::Auto,
            SequencerConfig::default(),
            shared,
        )
        .spawn()
        .unwrap();
        let mut events = handle.subscribe();

        let first = events.recv().await.unwrap();

        assert_eq!(first.event_type(), events::PHASE_TRANSITION);
        assert_eq!(first.to_payload()["from"], "a");
    }

    #[tokio::test]
    async fn test_player_fails_fast_without_surface() {
        let shared: SharedSurface = Arc::new(Mutex::new(UnavailableSurface));
        let result = PhasePlayer::new(
            two_phases(),
            TransitionMode::Auto,
            SequencerConfig::default(),
            shared,
        )
        .spawn();

        assert!(matches!(result, Err(DomainError::RenderSurface(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_tokio_clock_follows_paused_time() {
        let clock = TokioClock::new();
        let start = clock.now();

        tokio::time::sleep(Duration::from_millis(250)).await;

        assert_eq!((clock.now() - start).num_milliseconds(), 250);
    }

    #[tokio::test(start_paused = true)]
    async fn test_tokio_clock_caps_unreachable_deadlines() {
        let clock = TokioClock::new();

        let instant = clock.instant_at(DateTime::<Utc>::MAX_UTC);

        assert_eq!(instant - Instant::now(), FAR_FUTURE);
    }

    #[tokio::test(start_paused = true)]
    async fn test_player_holds_phase_with_longest_duration() {
        // Arrange
        let (surface, shared) = recording();
        let forever = Sequence::new(vec![Phase::new("forever", u64::MAX)]).unwrap();
        let handle = PhasePlayer::new(
            forever,
            TransitionMode::Auto,
            SequencerConfig::default(),
            shared,
        )
        .spawn()
        .unwrap();

        // Act
        tokio::time::sleep(Duration::from_secs(3600)).await;

        // Assert
        let snapshot = handle.snapshot();
        assert!(snapshot.running);
        assert_eq!(snapshot.state.phase_state, PhaseState::Rendered);
        assert_eq!(surface.lock().unwrap().live_keys(), ["forever"]);
    }
}
