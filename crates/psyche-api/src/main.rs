//! Psyche lore experience API server entry point.

use psyche_api::config::ServerConfig;
use psyche_api::error::AppError;
use psyche_api::state::AppState;
use psyche_content::application::library::NarrativeLibrary;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    // Initialize tracing subscriber.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    tracing::info!("Starting Psyche lore experience API server");

    let config = ServerConfig::from_env()?;

    let mut library = NarrativeLibrary::bundled()?;
    if let Some(dir) = &config.content_dir {
        library.load_dir(dir)?;
    }
    tracing::info!(narratives = library.len(), "content ready");

    let addr = config.addr()?;
    let app = psyche_api::app(AppState::new(library, config))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    tracing::info!("Listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app).await?;

    Ok(())
}
