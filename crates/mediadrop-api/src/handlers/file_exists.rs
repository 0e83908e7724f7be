//! Existence probe for merged uploads

use crate::error::HttpAppError;
use crate::state::AppState;
use axum::{
    extract::{Query, State},
    http::StatusCode,
};
use mediadrop_core::models::upload::require_segment;
use mediadrop_core::AppError;
use serde::Deserialize;
use std::sync::Arc;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileExistsQuery {
    #[serde(default)]
    pub entity_type: String,
    #[serde(default)]
    pub picture_type: String,
    #[serde(default)]
    pub entity_id: String,
    #[serde(default)]
    pub file_name: String,
}

/// 200 when the merged file is on disk, 404 when it is not. No body either way.
pub async fn file_exists(
    State(state): State<Arc<AppState>>,
    Query(query): Query<FileExistsQuery>,
) -> Result<StatusCode, HttpAppError> {
    if query.entity_type.is_empty() || query.entity_id.is_empty() || query.file_name.is_empty() {
        return Err(AppError::InvalidInput(
            "entityType, entityId and fileName are required".to_string(),
        )
        .into());
    }
    require_segment("entityId", &query.entity_id)?;

    let path = state
        .upload
        .layout
        .final_path(&query.entity_type, &query.file_name)?;

    let exists = tokio::fs::try_exists(&path).await.map_err(AppError::from)?;
    tracing::debug!(
        path = %path.display(),
        picture_type = %query.picture_type,
        exists,
        "Existence probe"
    );

    Ok(if exists {
        StatusCode::OK
    } else {
        StatusCode::NOT_FOUND
    })
}
