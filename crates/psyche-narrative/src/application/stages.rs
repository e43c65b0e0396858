//! Staged orchestration.
//!
//! A staged experience runs a fixed list of stages strictly in order:
//! typing intro, launch video, countdown, the phase sequence, and a finale.
//! Each stage completes exactly once and owns the overlays it mounts.

use std::time::Duration;

use async_trait::async_trait;
use psyche_core::error::DomainError;
use psyche_core::overlay::{AssetHandle, Overlay, OverlayNode};
use psyche_core::surface::{SharedSurface, lock_surface};
use serde::Serialize;
use tokio::sync::{oneshot, watch};
use tokio::time::{Instant, sleep, sleep_until};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::player::{PhasePlayer, PlayerHandle};

/// Typing speed of the intro.
pub const INTRO_CHAR_INTERVAL: Duration = Duration::from_millis(75);
/// Total time the intro stays on screen.
pub const INTRO_HOLD: Duration = Duration::from_millis(5000);
/// Delay of the countdown stage.
pub const COUNTDOWN_DELAY: Duration = Duration::from_millis(500);
/// Intro text of the satellite experience.
pub const SATELLITE_INTRO_TEXT: &str = "Psyche launched at \n10:19 a.m. EDT\nFriday, October 13, 2023.";
/// The launch video.
pub const LAUNCH_VIDEO_SOURCE: &str = "https://www.youtube.com/embed/wnAhR6AaUsI?autoplay=1&enablejsapi=1";
/// Message shown by the finale.
pub const FINALE_MESSAGE: &str = "You have come to the end of this experience.";
/// Label of the finale's restart action.
pub const RESTART_LABEL: &str = "Restart the Journey";
/// Logo shown by the finale.
pub const FINALE_LOGO: &str = "../assets/images/smp/Psyche_Icon_Color-SVG.svg";

/// Identifies a stage of an experience.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StageKind {
    /// Typing intro.
    Intro,
    /// Launch video.
    Launch,
    /// Countdown pause.
    Countdown,
    /// The phase sequence.
    Phases,
    /// Finale screen.
    Finale,
}

impl StageKind {
    /// Lowercase name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Intro => "intro",
            Self::Launch => "launch",
            Self::Countdown => "countdown",
            Self::Phases => "phases",
            Self::Finale => "finale",
        }
    }
}

/// What every stage gets to work with.
#[derive(Clone)]
pub struct StageContext {
    /// The shared render surface. Never hold its lock across an `.await`.
    pub surface: SharedSurface,
}

/// A single step of a staged experience.
#[async_trait]
pub trait Stage: Send {
    /// Which stage this is.
    fn kind(&self) -> StageKind;

    /// Runs the stage to completion.
    ///
    /// # Errors
    ///
    /// Returns `DomainError` if the stage cannot run; the runner stops.
    async fn run(&mut self, ctx: &StageContext) -> Result<(), DomainError>;

    /// Removes whatever the stage left on screen when it is cancelled
    /// mid-run.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Infrastructure` if the surface lock is poisoned.
    fn abort(&mut self, _ctx: &StageContext) -> Result<(), DomainError> {
        Ok(())
    }
}

/// How a runner finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// Every stage completed.
    Finished,
    /// The runner was cancelled during the given stage.
    Cancelled(StageKind),
}

/// Runs stages one after another.
pub struct StageRunner {
    stages: Vec<Box<dyn Stage>>,
    current: watch::Sender<Option<StageKind>>,
    cancel: CancellationToken,
}

impl StageRunner {
    /// Creates a runner for the given stages.
    #[must_use]
    pub fn new(stages: Vec<Box<dyn Stage>>) -> Self {
        let (current, _) = watch::channel(None);
        Self {
            stages,
            current,
            cancel: CancellationToken::new(),
        }
    }

    /// Receiver tracking the active stage.
    #[must_use]
    pub fn current_stage(&self) -> watch::Receiver<Option<StageKind>> {
        self.current.subscribe()
    }

    /// Token that cancels the runner.
    #[must_use]
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Runs every stage in order.
    ///
    /// # Errors
    ///
    /// Returns the first stage error; later stages do not run.
    pub async fn run(&mut self, ctx: &StageContext) -> Result<RunOutcome, DomainError> {
        for stage in &mut self.stages {
            let kind = stage.kind();
            self.current.send_replace(Some(kind));
            info!(stage = kind.as_str(), "stage entered");

            let result = tokio::select! {
                biased;
                () = self.cancel.cancelled() => None,
                result = stage.run(ctx) => Some(result),
            };
            match result {
                None => {
                    info!(stage = kind.as_str(), "stage cancelled");
                    stage.abort(ctx)?;
                    return Ok(RunOutcome::Cancelled(kind));
                }
                Some(Err(err)) => {
                    error!(stage = kind.as_str(), error = %err, "stage failed");
                    return Err(err);
                }
                Some(Ok(())) => info!(stage = kind.as_str(), "stage exited"),
            }
        }
        self.current.send_replace(None);
        Ok(RunOutcome::Finished)
    }
}

/// Types text one character at a time, then holds it.
pub struct TypingIntroStage {
    text: String,
    char_interval: Duration,
    hold: Duration,
}

impl TypingIntroStage {
    const KEY: &'static str = "intro";

    /// Creates an intro with the standard typing speed and hold time.
    #[must_use]
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            char_interval: INTRO_CHAR_INTERVAL,
            hold: INTRO_HOLD,
        }
    }

    fn overlay(typed: &str) -> Overlay {
        Overlay::new(Self::KEY).with_node(OverlayNode::Caption {
            lines: typed.split('\n').map(str::to_owned).collect(),
        })
    }
}

#[async_trait]
impl Stage for TypingIntroStage {
    fn kind(&self) -> StageKind {
        StageKind::Intro
    }

    async fn run(&mut self, ctx: &StageContext) -> Result<(), DomainError> {
        let started = Instant::now();
        lock_surface(&ctx.surface)?.mount(&Self::overlay(""))?;

        let mut typed = String::with_capacity(self.text.len());
        for ch in self.text.chars() {
            typed.push(ch);
            lock_surface(&ctx.surface)?.update(&Self::overlay(&typed))?;
            sleep(self.char_interval).await;
        }

        // The hold counts from the first character, not the last.
        sleep_until(started + self.hold).await;
        lock_surface(&ctx.surface)?.unmount(Self::KEY);
        Ok(())
    }

    fn abort(&mut self, ctx: &StageContext) -> Result<(), DomainError> {
        lock_surface(&ctx.surface)?.unmount(Self::KEY);
        Ok(())
    }
}

/// Shows a media node until playback ends.
pub struct MediaStage {
    source: String,
    ended: Option<oneshot::Receiver<()>>,
    fallback: Option<Duration>,
}

impl MediaStage {
    const KEY: &'static str = "launch";

    /// Creates a media stage that ends on the given playback-ended signal.
    #[must_use]
    pub fn new(source: impl Into<String>, ended: oneshot::Receiver<()>) -> Self {
        Self {
            source: source.into(),
            ended: Some(ended),
            fallback: None,
        }
    }

    /// Also completes after `timeout`, in case the ended signal never fires.
    #[must_use]
    pub fn with_fallback(mut self, timeout: Duration) -> Self {
        self.fallback = Some(timeout);
        self
    }
}

#[async_trait]
impl Stage for MediaStage {
    fn kind(&self) -> StageKind {
        StageKind::Launch
    }

    async fn run(&mut self, ctx: &StageContext) -> Result<(), DomainError> {
        let ended = self
            .ended
            .take()
            .ok_or_else(|| DomainError::Validation("media stage already ran".into()))?;
        let overlay = Overlay::new(Self::KEY).with_node(OverlayNode::Media {
            source: self.source.clone(),
        });
        lock_surface(&ctx.surface)?.mount(&overlay)?;

        let fallback = self.fallback;
        let timeout = async move {
            match fallback {
                Some(after) => sleep(after).await,
                None => std::future::pending().await,
            }
        };
        tokio::select! {
            signal = ended => {
                if signal.is_err() {
                    warn!("playback signal dropped; treating media as ended");
                } else {
                    debug!("playback ended");
                }
            }
            () = timeout => warn!("playback did not report its end; moving on"),
        }

        lock_surface(&ctx.surface)?.unmount(Self::KEY);
        Ok(())
    }

    fn abort(&mut self, ctx: &StageContext) -> Result<(), DomainError> {
        lock_surface(&ctx.surface)?.unmount(Self::KEY);
        Ok(())
    }
}

/// Waits a fixed delay.
pub struct CountdownStage {
    delay: Duration,
}

impl CountdownStage {
    /// A countdown with the standard delay.
    #[must_use]
    pub fn new() -> Self {
        Self {
            delay: COUNTDOWN_DELAY,
        }
    }
}

impl Default for CountdownStage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Stage for CountdownStage {
    fn kind(&self) -> StageKind {
        StageKind::Countdown
    }

    async fn run(&mut self, _ctx: &StageContext) -> Result<(), DomainError> {
        sleep(self.delay).await;
        Ok(())
    }
}

/// Runs a phase player to completion.
pub struct PhaseSequenceStage {
    player: Option<PhasePlayer>,
    handle: watch::Sender<Option<PlayerHandle>>,
}

impl PhaseSequenceStage {
    /// Creates a stage that runs `player`. The player must render on the
    /// same surface the runner was given.
    #[must_use]
    pub fn new(player: PhasePlayer) -> Self {
        let (handle, _) = watch::channel(None);
        Self {
            player: Some(player),
            handle,
        }
    }

    /// Receiver that holds the player handle once the stage has started, so
    /// confirmations can be routed to it.
    #[must_use]
    pub fn handle(&self) -> watch::Receiver<Option<PlayerHandle>> {
        self.handle.subscribe()
    }
}

#[async_trait]
impl Stage for PhaseSequenceStage {
    fn kind(&self) -> StageKind {
        StageKind::Phases
    }

    async fn run(&mut self, _ctx: &StageContext) -> Result<(), DomainError> {
        let player = self
            .player
            .take()
            .ok_or_else(|| DomainError::Validation("phase stage already ran".into()))?;
        let handle = player.spawn()?;
        self.handle.send_replace(Some(handle.clone()));

        let report = handle.completed().await;
        handle.stop();
        match report {
            Some(report) => {
                debug!(phases_rendered = report.phases_rendered, "phase stage complete");
                Ok(())
            }
            None => Err(DomainError::Infrastructure(
                "phase player stopped before completing".into(),
            )),
        }
    }

    fn abort(&mut self, _ctx: &StageContext) -> Result<(), DomainError> {
        if let Some(handle) = self.handle.borrow().as_ref() {
            handle.stop();
        }
        Ok(())
    }
}

/// Shows the closing screen with a restart action. It stays mounted after
/// the stage completes; unmount [`FinaleStage::KEY`] on restart.
pub struct FinaleStage {
    logo: Option<AssetHandle>,
    message: String,
    restart_label: String,
}

impl FinaleStage {
    /// Overlay key of the finale.
    pub const KEY: &'static str = "finale";
    /// Action id of the restart control.
    pub const RESTART_ACTION: &'static str = "restart";

    /// The standard finale.
    #[must_use]
    pub fn new() -> Self {
        Self {
            logo: AssetHandle::parse(FINALE_LOGO),
            message: FINALE_MESSAGE.to_owned(),
            restart_label: RESTART_LABEL.to_owned(),
        }
    }

    fn overlay(&self) -> Overlay {
        let mut overlay = Overlay::new(Self::KEY);
        if let Some(logo) = &self.logo {
            overlay.nodes.push(OverlayNode::PrimaryImage {
                handle: logo.clone(),
                alt_text: "Psyche logo".to_owned(),
            });
        }
        overlay
            .with_node(OverlayNode::Caption {
                lines: vec![self.message.clone()],
            })
            .with_node(OverlayNode::Action {
                id: Self::RESTART_ACTION.to_owned(),
                label: self.restart_label.clone(),
            })
    }
}

impl Default for FinaleStage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Stage for FinaleStage {
    fn kind(&self) -> StageKind {
        StageKind::Finale
    }

    async fn run(&mut self, ctx: &StageContext) -> Result<(), DomainError> {
        lock_surface(&ctx.surface)?.mount(&self.overlay())?;
        info!("experience complete");
        Ok(())
    }
}
