//! Existence probe integration tests.
//!
//! Run with: `cargo test -p mediadrop-api --test file_exists_test`

mod helpers;

use axum::http::Method;
use helpers::{chunk_form, chunk_meta, setup_test_app};
use mediadrop_api::constants::{CHUNK_UPLOAD_PATH, FILE_EXISTS_PATH};

fn probe_query(file_name: &str) -> [(&'static str, String); 4] {
    [
        ("entityType", "event".to_string()),
        ("pictureType", "banner".to_string()),
        ("entityId", "evt-42".to_string()),
        ("fileName", file_name.to_string()),
    ]
}

#[tokio::test]
async fn test_probe_reports_merged_file() {
    let app = setup_test_app().await;
    let client = app.client();
    let png = helpers::fixtures::create_minimal_png();

    let response = client
        .post(CHUNK_UPLOAD_PATH)
        .multipart(chunk_form(&chunk_meta("pixel.png", 0, 1), &png))
        .await;
    assert_eq!(response.status_code(), 200);

    let response = client
        .get(FILE_EXISTS_PATH)
        .add_query_params(probe_query("pixel.png"))
        .await;
    assert_eq!(response.status_code(), 200);
    assert!(response.as_bytes().is_empty());

    let response = client
        .method(Method::HEAD, FILE_EXISTS_PATH)
        .add_query_params(probe_query("pixel.png"))
        .await;
    assert_eq!(response.status_code(), 200);
}

#[tokio::test]
async fn test_probe_missing_file_is_not_found() {
    let app = setup_test_app().await;

    let response = app
        .client()
        .get(FILE_EXISTS_PATH)
        .add_query_params(probe_query("never-uploaded.png"))
        .await;

    assert_eq!(response.status_code(), 404);
    assert!(response.as_bytes().is_empty());
}

#[tokio::test]
async fn test_probe_requires_parameters() {
    let app = setup_test_app().await;

    let response = app
        .client()
        .get(FILE_EXISTS_PATH)
        .add_query_param("entityType", "event")
        .await;

    assert_eq!(response.status_code(), 400);
}

#[tokio::test]
async fn test_probe_rejects_unsafe_names() {
    let app = setup_test_app().await;

    let response = app
        .client()
        .get(FILE_EXISTS_PATH)
        .add_query_params([
            ("entityType", "event"),
            ("entityId", "evt-42"),
            ("fileName", "../../etc/passwd"),
        ])
        .await;

    assert_eq!(response.status_code(), 400);
}
