//! Integration tests for the narrative listing.

mod common;

use axum::http::StatusCode;

#[tokio::test]
async fn test_list_narratives_returns_bundled_summaries() {
    // Arrange
    let app = common::build_test_app(common::test_state());

    // Act
    let (status, json) = common::get_json(app, "/api/v1/narratives").await;

    // Assert
    assert_eq!(status, StatusCode::OK);
    let narratives = json.as_array().unwrap();
    assert_eq!(narratives.len(), 2);

    assert_eq!(narratives[0]["name"], "lore");
    assert_eq!(narratives[0]["mode"], "auto");
    assert_eq!(narratives[0]["phase_count"], 12);
    assert_eq!(narratives[0]["version_hash"].as_str().unwrap().len(), 64);

    assert_eq!(narratives[1]["name"], "satellite");
    assert_eq!(narratives[1]["mode"], "manual");
    assert_eq!(narratives[1]["phase_count"], 5);
}

#[tokio::test]
async fn test_total_duration_saturates_for_longest_phases() {
    // Arrange
    let state = common::test_state_with(&[
        "name: endless\nphases:\n  a: { duration: 18446744073709551615 }\n  b: { duration: 1 }",
    ]);

    // Act
    let (status, json) =
        common::get_json(common::build_test_app(state), "/api/v1/narratives").await;

    // Assert
    assert_eq!(status, StatusCode::OK);
    let endless = json
        .as_array()
        .unwrap()
        .iter()
        .find(|n| n["name"] == "endless")
        .unwrap();
    assert_eq!(endless["total_duration_ms"], u64::MAX);
}
