//! Test helpers: build AppState and router for integration tests.
//!
//! Run from workspace root: `cargo test -p mediadrop-api`.

pub mod fixtures;

use axum_test::multipart::{MultipartForm, Part};
use axum_test::TestServer;
use mediadrop_api::constants::{CHUNK_FIELD, META_FIELD};
use mediadrop_api::setup::{routes, services};
use mediadrop_api::state::AppState;
use mediadrop_core::{Config, IngestConfig, SniffPolicy};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

/// Test application: server, state, and owned temporary directories.
pub struct TestApp {
    pub server: TestServer,
    pub state: Arc<AppState>,
    pub _upload_dir: TempDir,
    pub _cache_dir: TempDir,
}

impl TestApp {
    pub fn client(&self) -> &TestServer {
        &self.server
    }

    pub fn upload_root(&self) -> &Path {
        self.state.config.upload_root()
    }

    pub fn staging_root(&self) -> PathBuf {
        self.state.config.staging_root()
    }

    pub fn cache_dir(&self) -> &Path {
        self.state.config.media_cache_dir()
    }
}

fn create_test_config(upload_root: &Path, cache_dir: &Path) -> IngestConfig {
    IngestConfig {
        upload_root: upload_root.to_path_buf(),
        media_cache_dir: cache_dir.to_path_buf(),
        allowed_content_types: vec!["image/jpeg".to_string(), "image/png".to_string()],
        sniff_policy: SniffPolicy::FirstChunkOnly,
        staging_reap_interval: Duration::ZERO,
        media_fetch_timeout: Duration::from_secs(5),
        // mockito listens on 127.0.0.1
        media_proxy_allow_private_hosts: true,
        ..IngestConfig::default()
    }
}

/// Setup test app with isolated upload and cache directories.
pub async fn setup_test_app() -> TestApp {
    setup_test_app_with(|_| {}).await
}

/// Same as [`setup_test_app`] with a hook to adjust the configuration.
pub async fn setup_test_app_with(customize: impl FnOnce(&mut IngestConfig)) -> TestApp {
    let upload_dir = tempfile::tempdir().expect("Failed to create upload directory");
    let cache_dir = tempfile::tempdir().expect("Failed to create cache directory");

    let mut ingest = create_test_config(upload_dir.path(), cache_dir.path());
    customize(&mut ingest);
    let config = Config::new(ingest);

    let state = services::initialize_services(&config)
        .await
        .expect("Failed to initialize services");
    let app = routes::setup_routes(&config, state.clone()).expect("Failed to setup routes");
    let server = TestServer::new(app.into_make_service()).expect("Failed to create test server");

    TestApp {
        server,
        state,
        _upload_dir: upload_dir,
        _cache_dir: cache_dir,
    }
}

/// Chunk metadata in the wire format the browser client sends.
pub fn chunk_meta(file_name: &str, chunk_index: u32, total_chunks: u32) -> serde_json::Value {
    serde_json::json!({
        "fileName": file_name,
        "chunkIndex": chunk_index,
        "totalChunks": total_chunks,
        "entityType": "event",
        "pictureType": "banner",
        "entityId": "evt-42",
        "token": "tok-1",
    })
}

pub fn chunk_form(meta: &serde_json::Value, bytes: &[u8]) -> MultipartForm {
    MultipartForm::new().add_text(META_FIELD, meta.to_string()).add_part(
        CHUNK_FIELD,
        Part::bytes(bytes.to_vec())
            .file_name("blob")
            .mime_type("application/octet-stream"),
    )
}

/// Wait until `path` exists; cache entries appear only once fully written.
pub async fn wait_for_file(path: &Path) {
    for _ in 0..200 {
        if tokio::fs::try_exists(path).await.unwrap_or(false) {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("{} was never written", path.display());
}
