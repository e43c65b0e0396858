//! Routes for sequencer sessions.
//!
//! Each session owns a phase player that renders into an in-memory
//! [`ViewSurface`]. Clients poll the session and draw the overlays in its
//! view. A session whose run has completed stays readable for the
//! configured retention, then its player is stopped and it is removed.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use psyche_core::surface::SharedSurface;
use psyche_narrative::application::cues::TracingCueSink;
use psyche_narrative::application::player::{PhasePlayer, PlayerHandle, PlayerSnapshot};
use psyche_narrative::application::view_surface::{SurfaceView, ViewSurface};
use psyche_narrative::domain::sequencer::{SequencerConfig, TransitionMode};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};
use uuid::Uuid;

use crate::error::ApiError;
use crate::state::{AppState, Session, SessionRegistry};

/// Request body for POST /.
#[derive(Debug, Deserialize)]
pub struct CreateSessionRequest {
    /// Name of the narrative to play.
    pub narrative: String,
    /// Overrides the narrative's transition mode.
    #[serde(default)]
    pub mode: Option<TransitionMode>,
}

/// A session as returned to clients.
#[derive(Debug, Serialize)]
pub struct SessionResponse {
    /// Session id.
    pub session_id: Uuid,
    /// Name of the narrative being played.
    pub narrative: String,
    /// Player state.
    pub snapshot: PlayerSnapshot,
    /// What the client should draw.
    pub view: SurfaceView,
}

/// Response body for POST /{id}/continue.
#[derive(Debug, Serialize)]
pub struct ContinueResponse {
    /// Whether the confirmation advanced the sequence.
    pub accepted: bool,
}

fn session_response(
    session_id: Uuid,
    session: &Session,
    snapshot: PlayerSnapshot,
) -> Result<SessionResponse, ApiError> {
    Ok(SessionResponse {
        session_id,
        narrative: session.narrative.clone(),
        snapshot,
        view: session.view()?,
    })
}

/// POST /
#[instrument(skip(state, request), fields(narrative = %request.narrative))]
async fn create_session(
    State(state): State<AppState>,
    Json(request): Json<CreateSessionRequest>,
) -> Result<(StatusCode, Json<SessionResponse>), ApiError> {
    let narrative = state.library.get(&request.narrative)?;
    let mode = request.mode.unwrap_or(narrative.mode);
    let config = SequencerConfig::default()
        .with_fade_out(narrative.fade_out.unwrap_or(state.config.fade_out));

    let view = Arc::new(Mutex::new(ViewSurface::new()));
    let surface: SharedSurface = view.clone();
    let handle = PhasePlayer::new(narrative.sequence.clone(), mode, config, surface)
        .with_cue_sink(Arc::new(TracingCueSink))
        .spawn()?;

    let session = Session {
        narrative: narrative.name.clone(),
        handle,
        view,
    };
    let snapshot = session.handle.snapshot();
    let session_id = state.sessions.insert(session.clone())?;
    tokio::spawn(expire_when_finished(
        Arc::clone(&state.sessions),
        session_id,
        session.handle.clone(),
        state.config.session_retention,
    ));
    info!(%session_id, %mode, "session created");

    let response = session_response(session_id, &session, snapshot)?;
    Ok((StatusCode::CREATED, Json(response)))
}

/// Removes a session once its run has completed and stayed completed for
/// `retention`. A restart within the retention keeps the session alive; a
/// stopped player is removed at once.
async fn expire_when_finished(
    sessions: Arc<SessionRegistry>,
    session_id: Uuid,
    handle: PlayerHandle,
    retention: Duration,
) {
    let mut snapshots = handle.watch();
    loop {
        let completed = snapshots
            .wait_for(|s| s.completion.is_some() || !s.running)
            .await
            .is_ok_and(|s| s.running);
        if !completed {
            break;
        }
        let restarted = tokio::select! {
            () = tokio::time::sleep(retention) => false,
            snapshot = snapshots.wait_for(|s| s.completion.is_none() || !s.running) => {
                snapshot.is_ok_and(|s| s.running)
            }
        };
        if !restarted {
            break;
        }
    }

    handle.stop();
    if sessions.remove(session_id).is_ok() {
        info!(%session_id, "finished session expired");
    } else {
        debug!(%session_id, "session already removed");
    }
}

/// GET /{id}
#[instrument(skip(state))]
async fn get_session(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> Result<Json<SessionResponse>, ApiError> {
    let session = state.sessions.get(session_id)?;
    let snapshot = session.handle.snapshot();
    Ok(Json(session_response(session_id, &session, snapshot)?))
}

/// POST /{id}/continue
#[instrument(skip(state))]
async fn continue_session(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> Result<Json<ContinueResponse>, ApiError> {
    let session = state.sessions.get(session_id)?;
    let accepted = session.handle.confirm().await?;
    info!(accepted, "continue requested");
    Ok(Json(ContinueResponse { accepted }))
}

/// POST /{id}/restart
#[instrument(skip(state))]
async fn restart_session(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> Result<Json<SessionResponse>, ApiError> {
    let session = state.sessions.get(session_id)?;
    let snapshot = session.handle.restart().await?;
    info!(run_id = ?snapshot.state.run_id, "session restarted");
    Ok(Json(session_response(session_id, &session, snapshot)?))
}

/// DELETE /{id}
#[instrument(skip(state))]
async fn delete_session(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    let session = state.sessions.remove(session_id)?;
    session.handle.stop();
    session.handle.stopped().await;
    info!("session stopped");
    Ok(StatusCode::NO_CONTENT)
}

/// Returns the router for sessions.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_session))
        .route("/{id}", get(get_session).delete(delete_session))
        .route("/{id}/continue", post(continue_session))
        .route("/{id}/restart", post(restart_session))
}
