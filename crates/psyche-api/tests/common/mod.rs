//! Shared test helpers for API integration tests.
#![allow(dead_code)]

use std::time::Duration;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use psyche_api::config::ServerConfig;
use psyche_api::state::AppState;
use psyche_content::application::library::NarrativeLibrary;
use psyche_content::application::loader::load_narrative_from_str;
use tower::ServiceExt;

/// How long finished sessions stay registered in tests.
pub const RETENTION: Duration = Duration::from_secs(60);

/// Application state with the bundled narratives and synchronous teardown.
pub fn test_state() -> AppState {
    test_state_with(&[])
}

/// Like [`test_state`], with extra narrative documents.
pub fn test_state_with(documents: &[&str]) -> AppState {
    let mut library = NarrativeLibrary::bundled().unwrap();
    for source in documents {
        library.insert(load_narrative_from_str(source).unwrap());
    }
    let config = ServerConfig {
        fade_out: Duration::ZERO,
        session_retention: RETENTION,
        ..ServerConfig::default()
    };
    AppState::new(library, config)
}

/// Build the full app router. Uses the same route structure as `main.rs`.
pub fn build_test_app(state: AppState) -> Router {
    psyche_api::app(state)
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, serde_json::Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let body_bytes = response.into_body().collect().await.unwrap().to_bytes();
    // Empty and plain-text bodies read as null.
    let json = serde_json::from_slice(&body_bytes).unwrap_or(serde_json::Value::Null);

    (status, json)
}

/// Send a POST request with a JSON body and return the response.
pub async fn post_json(
    app: Router,
    uri: &str,
    body: &serde_json::Value,
) -> (StatusCode, serde_json::Value) {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_vec(body).unwrap()))
        .unwrap();

    send(app, request).await
}

/// Send a POST request without a body and return the response.
pub async fn post_empty(app: Router, uri: &str) -> (StatusCode, serde_json::Value) {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .body(Body::empty())
        .unwrap();

    send(app, request).await
}

/// Send a GET request and return the response.
pub async fn get_json(app: Router, uri: &str) -> (StatusCode, serde_json::Value) {
    let request = Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap();

    send(app, request).await
}

/// Send a DELETE request and return the response.
pub async fn delete(app: Router, uri: &str) -> (StatusCode, serde_json::Value) {
    let request = Request::builder()
        .method("DELETE")
        .uri(uri)
        .body(Body::empty())
        .unwrap();

    send(app, request).await
}

/// Create a session for `narrative` and return its id.
pub async fn create_session(state: &AppState, body: serde_json::Value) -> String {
    let (status, json) = post_json(build_test_app(state.clone()), "/api/v1/sessions", &body).await;
    assert_eq!(status, StatusCode::CREATED);
    json["session_id"].as_str().unwrap().to_owned()
}
