//! Health check handler

use crate::state::AppState;
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

const TIMEOUT: Duration = Duration::from_secs(5);

#[derive(serde::Serialize)]
pub struct HealthCheckResponse {
    pub status: String,
    pub upload_root: String,
    pub cache_dir: String,
}

/// Write and remove a probe file; returns "healthy", "timeout" or "unwritable: {error}".
async fn check_writable(dir: PathBuf) -> String {
    let probe = dir.join(format!(".health-{}", Uuid::new_v4()));
    let check = async move {
        tokio::fs::write(&probe, b"ok").await?;
        tokio::fs::remove_file(&probe).await
    };

    match tokio::time::timeout(TIMEOUT, check).await {
        Ok(Ok(())) => "healthy".to_string(),
        Ok(Err(e)) => {
            tracing::error!(dir = %dir.display(), error = %e, "Directory not writable");
            format!("unwritable: {}", e)
        }
        Err(_) => "timeout".to_string(),
    }
}

pub async fn health_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let upload_root = check_writable(state.config.upload_root().to_path_buf()).await;
    let cache_dir = check_writable(state.config.media_cache_dir().to_path_buf()).await;

    let healthy = upload_root == "healthy" && cache_dir == "healthy";
    let response = HealthCheckResponse {
        status: if healthy { "healthy" } else { "degraded" }.to_string(),
        upload_root,
        cache_dir,
    };

    let status_code = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status_code, Json(response))
}
