//! Psyche lore experience — HTTP host.
//!
//! Runs phase sequencer sessions server side and serves the overlay each
//! session currently shows, for kiosk and browser clients that only draw.

pub mod config;
pub mod error;
pub mod routes;
pub mod state;

use axum::Router;

use crate::state::AppState;

/// Builds the application router.
pub fn app(state: AppState) -> Router {
    Router::new()
        .merge(routes::health::router())
        .nest("/api/v1/narratives", routes::narratives::router())
        .nest("/api/v1/sessions", routes::sessions::router())
        .with_state(state)
}
