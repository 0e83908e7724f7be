//! Chunked upload API integration tests.
//!
//! Run with: `cargo test -p mediadrop-api --test chunked_upload_test`

mod helpers;

use axum_test::multipart::{MultipartForm, Part};
use helpers::{chunk_form, chunk_meta, setup_test_app, setup_test_app_with};
use mediadrop_api::constants::{CHUNK_FIELD, CHUNK_UPLOAD_PATH, META_FIELD};
use mediadrop_core::{Attachment, SniffPolicy};

#[tokio::test]
async fn test_out_of_order_chunks_merge_in_index_order() {
    let app = setup_test_app_with(|c| c.sniff_policy = SniffPolicy::Disabled).await;
    let client = app.client();

    for (index, bytes) in [(2, b"CCC"), (0, b"AAA")] {
        let response = client
            .post(CHUNK_UPLOAD_PATH)
            .multipart(chunk_form(&chunk_meta("letters.bin", index, 3), bytes))
            .await;
        assert_eq!(response.status_code(), 200);
        assert!(response.json::<Vec<Attachment>>().is_empty());
    }

    let response = client
        .post(CHUNK_UPLOAD_PATH)
        .multipart(chunk_form(&chunk_meta("letters.bin", 1, 3), b"BBB"))
        .await;
    assert_eq!(response.status_code(), 200);

    let attachments = response.json::<Vec<Attachment>>();
    assert_eq!(
        attachments,
        vec![Attachment {
            filename: "letters.bin".to_string(),
            path: "event/letters.bin".to_string(),
        }]
    );

    let merged = tokio::fs::read(app.upload_root().join("event/letters.bin"))
        .await
        .unwrap();
    assert_eq!(merged, b"AAABBBCCC");

    let staging = app.staging_root().join("letters.bin_evt-42_tok-1");
    assert!(!staging.exists());
}

#[tokio::test]
async fn test_incomplete_session_keeps_parts_staged() {
    let app = setup_test_app_with(|c| c.sniff_policy = SniffPolicy::Disabled).await;
    let client = app.client();

    for index in 0..3 {
        let response = client
            .post(CHUNK_UPLOAD_PATH)
            .multipart(chunk_form(&chunk_meta("partial.bin", index, 4), b"xx"))
            .await;
        assert!(response.json::<Vec<Attachment>>().is_empty());
    }

    assert!(!app.upload_root().join("event/partial.bin").exists());
    let staging = app.staging_root().join("partial.bin_evt-42_tok-1");
    let mut parts = std::fs::read_dir(&staging)
        .unwrap()
        .map(|entry| entry.unwrap().file_name().into_string().unwrap())
        .collect::<Vec<_>>();
    parts.sort();
    assert_eq!(parts, vec!["0.part", "1.part", "2.part"]);
}

#[tokio::test]
async fn test_single_chunk_png_merges_immediately() {
    let app = setup_test_app().await;
    let png = helpers::fixtures::create_minimal_png();

    let response = app
        .client()
        .post(CHUNK_UPLOAD_PATH)
        .multipart(chunk_form(&chunk_meta("pixel.png", 0, 1), &png))
        .await;

    assert_eq!(response.status_code(), 200);
    assert_eq!(response.json::<Vec<Attachment>>().len(), 1);
    let merged = tokio::fs::read(app.upload_root().join("event/pixel.png"))
        .await
        .unwrap();
    assert_eq!(merged, png);
}

#[tokio::test]
async fn test_sniffing_checks_only_the_first_chunk() {
    let app = setup_test_app().await;
    let client = app.client();
    let jpeg = helpers::fixtures::create_jpeg_head(600);

    let response = client
        .post(CHUNK_UPLOAD_PATH)
        .multipart(chunk_form(&chunk_meta("photo.jpg", 0, 2), &jpeg))
        .await;
    assert_eq!(response.status_code(), 200);

    // Continuations carry no signature and are accepted as-is.
    let response = client
        .post(CHUNK_UPLOAD_PATH)
        .multipart(chunk_form(&chunk_meta("photo.jpg", 1, 2), b"plain tail"))
        .await;
    assert_eq!(response.status_code(), 200);
    assert_eq!(response.json::<Vec<Attachment>>().len(), 1);

    let merged = tokio::fs::read(app.upload_root().join("event/photo.jpg"))
        .await
        .unwrap();
    assert_eq!(&merged[..jpeg.len()], &jpeg[..]);
    assert_eq!(&merged[jpeg.len()..], b"plain tail");
}

#[tokio::test]
async fn test_disallowed_content_type_is_rejected_without_staging() {
    let app = setup_test_app().await;

    let response = app
        .client()
        .post(CHUNK_UPLOAD_PATH)
        .multipart(chunk_form(&chunk_meta("notes.txt", 0, 2), b"just some text"))
        .await;

    assert_eq!(response.status_code(), 415);
    let body = response.json::<serde_json::Value>();
    assert_eq!(body["code"], "UNSUPPORTED_MEDIA_TYPE");
    assert!(!app.staging_root().join("notes.txt_evt-42_tok-1").exists());
}

#[tokio::test]
async fn test_malformed_metadata_is_bad_request() {
    let app = setup_test_app().await;

    let form = MultipartForm::new()
        .add_text(META_FIELD, "{not json")
        .add_part(CHUNK_FIELD, Part::bytes(b"AAA".to_vec()));
    let response = app.client().post(CHUNK_UPLOAD_PATH).multipart(form).await;

    assert_eq!(response.status_code(), 400);
    assert_eq!(response.json::<serde_json::Value>()["code"], "INVALID_INPUT");
}

#[tokio::test]
async fn test_missing_chunk_field_is_bad_request() {
    let app = setup_test_app().await;

    let form = MultipartForm::new().add_text(META_FIELD, chunk_meta("a.png", 0, 1).to_string());
    let response = app.client().post(CHUNK_UPLOAD_PATH).multipart(form).await;

    assert_eq!(response.status_code(), 400);
}

#[tokio::test]
async fn test_path_traversal_in_file_name_is_rejected() {
    let app = setup_test_app_with(|c| c.sniff_policy = SniffPolicy::Disabled).await;

    let response = app
        .client()
        .post(CHUNK_UPLOAD_PATH)
        .multipart(chunk_form(&chunk_meta("../escape.bin", 0, 1), b"AAA"))
        .await;

    assert_eq!(response.status_code(), 400);
    assert!(!app.upload_root().join("escape.bin").exists());
}

#[tokio::test]
async fn test_chunk_index_out_of_range_is_rejected() {
    let app = setup_test_app_with(|c| c.sniff_policy = SniffPolicy::Disabled).await;

    let response = app
        .client()
        .post(CHUNK_UPLOAD_PATH)
        .multipart(chunk_form(&chunk_meta("a.bin", 3, 3), b"AAA"))
        .await;

    assert_eq!(response.status_code(), 400);
}

#[tokio::test]
async fn test_large_chunk_after_metadata_is_staged_intact() {
    let app = setup_test_app_with(|c| c.sniff_policy = SniffPolicy::Disabled).await;
    let client = app.client();
    let big: Vec<u8> = (0..8 * 1024 * 1024u32).map(|i| (i % 251) as u8).collect();

    let response = client
        .post(CHUNK_UPLOAD_PATH)
        .multipart(chunk_form(&chunk_meta("big.bin", 0, 2), &big))
        .await;
    assert_eq!(response.status_code(), 200);
    assert!(response.json::<Vec<Attachment>>().is_empty());

    let response = client
        .post(CHUNK_UPLOAD_PATH)
        .multipart(chunk_form(&chunk_meta("big.bin", 1, 2), b"end"))
        .await;
    assert_eq!(response.json::<Vec<Attachment>>().len(), 1);

    let merged = tokio::fs::read(app.upload_root().join("event/big.bin"))
        .await
        .unwrap();
    assert_eq!(merged.len(), big.len() + 3);
    assert_eq!(&merged[..big.len()], &big[..]);
    assert_eq!(&merged[big.len()..], b"end");
}

#[tokio::test]
async fn test_chunk_before_metadata_is_accepted() {
    let app = setup_test_app().await;
    let png = helpers::fixtures::create_minimal_png();

    let form = MultipartForm::new()
        .add_part(CHUNK_FIELD, Part::bytes(png.clone()))
        .add_text(META_FIELD, chunk_meta("first.png", 0, 1).to_string());
    let response = app.client().post(CHUNK_UPLOAD_PATH).multipart(form).await;

    assert_eq!(response.status_code(), 200);
    assert_eq!(response.json::<Vec<Attachment>>().len(), 1);
    let merged = tokio::fs::read(app.upload_root().join("event/first.png"))
        .await
        .unwrap();
    assert_eq!(merged, png);

    // The spool file is unnamed, so nothing is left next to the sessions.
    let leftovers = std::fs::read_dir(app.staging_root())
        .map(|entries| entries.count())
        .unwrap_or(0);
    assert_eq!(leftovers, 0);
}

#[tokio::test]
async fn test_chunk_before_metadata_still_sniffed() {
    let app = setup_test_app().await;

    let form = MultipartForm::new()
        .add_part(CHUNK_FIELD, Part::bytes(b"just some text".to_vec()))
        .add_text(META_FIELD, chunk_meta("notes.txt", 0, 2).to_string());
    let response = app.client().post(CHUNK_UPLOAD_PATH).multipart(form).await;

    assert_eq!(response.status_code(), 415);
    assert!(!app.staging_root().join("notes.txt_evt-42_tok-1").exists());
}

#[tokio::test]
async fn test_second_chunk_field_is_rejected() {
    let app = setup_test_app_with(|c| c.sniff_policy = SniffPolicy::Disabled).await;

    let form = chunk_form(&chunk_meta("twice.bin", 0, 2), b"AAA")
        .add_part(CHUNK_FIELD, Part::bytes(b"BBB".to_vec()));
    let response = app.client().post(CHUNK_UPLOAD_PATH).multipart(form).await;

    assert_eq!(response.status_code(), 400);
}

#[tokio::test]
async fn test_current_dir_entity_type_is_rejected() {
    let app = setup_test_app_with(|c| c.sniff_policy = SniffPolicy::Disabled).await;

    let mut meta = chunk_meta("dot.bin", 0, 1);
    meta["entityType"] = serde_json::json!(".");
    let response = app
        .client()
        .post(CHUNK_UPLOAD_PATH)
        .multipart(chunk_form(&meta, b"AAA"))
        .await;

    assert_eq!(response.status_code(), 400);
    assert!(!app.upload_root().join("dot.bin").exists());
}
