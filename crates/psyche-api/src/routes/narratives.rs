//! Narrative listing.

use axum::extract::State;
use axum::{Json, Router, routing::get};
use psyche_content::domain::narrative::NarrativeSummary;
use tracing::instrument;

use crate::state::AppState;

/// GET /
#[instrument(skip(state))]
async fn list_narratives(State(state): State<AppState>) -> Json<Vec<NarrativeSummary>> {
    Json(state.library.summaries())
}

/// Returns the router for narratives.
pub fn router() -> Router<AppState> {
    Router::new().route("/", get(list_narratives))
}
