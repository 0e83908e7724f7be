//! Chunked upload ingest
//!
//! Each request carries one chunk (`chunk` field) and its JSON metadata
//! (`meta` field). The response lists the merged attachment once the request
//! completes the session, and is empty otherwise.
//!
//! When `meta` precedes `chunk` the chunk streams straight into staging. A
//! chunk sent first is spooled to an anonymous file under the staging root
//! until the metadata arrives, so request memory never grows with chunk size.

use crate::constants::{CHUNK_FIELD, META_FIELD};
use crate::error::HttpAppError;
use crate::state::AppState;
use axum::{
    extract::{multipart::Field, Multipart, State},
    Json,
};
use futures::TryStreamExt;
use mediadrop_core::{AppError, Attachment, ChunkMeta};
use std::io;
use std::path::Path;
use std::sync::Arc;
use tokio::io::{AsyncSeekExt, AsyncWriteExt};
use tokio_util::io::StreamReader;

#[tracing::instrument(skip(state, multipart))]
pub async fn upload_chunk(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Json<Vec<Attachment>>, HttpAppError> {
    let mut meta: Option<ChunkMeta> = None;
    let mut spooled: Option<tokio::fs::File> = None;
    let mut accepted: Option<Vec<Attachment>> = None;

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some(CHUNK_FIELD) => {
                if spooled.is_some() || accepted.is_some() {
                    return Err(AppError::InvalidInput(
                        "Only one chunk may be sent per request".to_string(),
                    )
                    .into());
                }
                match &meta {
                    Some(meta) => {
                        let reader = StreamReader::new(field.map_err(io::Error::other));
                        tokio::pin!(reader);
                        accepted =
                            Some(state.upload.coordinator.accept_chunk(meta, reader).await?);
                    }
                    None => {
                        let staging_root = state.upload.layout.staging_root();
                        spooled = Some(spool_chunk(staging_root, field).await?);
                    }
                }
            }
            Some(META_FIELD) => {
                if meta.is_some() {
                    return Err(AppError::InvalidInput(
                        "Only one metadata field may be sent per request".to_string(),
                    )
                    .into());
                }
                let text = field.text().await?;
                let parsed = serde_json::from_str::<ChunkMeta>(&text)
                    .map_err(|e| AppError::InvalidInput(format!("Invalid metadata: {}", e)))?;
                meta = Some(parsed);
            }
            _ => {
                tracing::debug!(field = ?name, "Ignoring unknown multipart field");
            }
        }
    }

    if let Some(attachments) = accepted {
        return Ok(Json(attachments));
    }

    let chunk =
        spooled.ok_or_else(|| AppError::InvalidInput("Chunk not found".to_string()))?;
    let meta = meta.ok_or_else(|| AppError::InvalidInput("Metadata not found".to_string()))?;

    tracing::debug!(
        file_name = %meta.file_name,
        chunk_index = meta.chunk_index,
        "Chunk arrived before metadata, staging from spool"
    );

    let attachments = state.upload.coordinator.accept_chunk(&meta, chunk).await?;
    Ok(Json(attachments))
}

/// Copy a chunk field into an unnamed file and rewind it for reading.
async fn spool_chunk(dir: &Path, field: Field<'_>) -> Result<tokio::fs::File, HttpAppError> {
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|e| AppError::Storage(format!("Failed to create {}: {}", dir.display(), e)))?;
    let spool_dir = dir.to_path_buf();
    let file = tokio::task::spawn_blocking(move || tempfile::tempfile_in(spool_dir))
        .await
        .map_err(anyhow::Error::from)?
        .map_err(|e| AppError::Storage(format!("Failed to create spool file: {}", e)))?;

    let mut file = tokio::fs::File::from_std(file);
    let reader = StreamReader::new(field.map_err(io::Error::other));
    tokio::pin!(reader);
    let size_bytes = tokio::io::copy(&mut reader, &mut file)
        .await
        .map_err(|e| AppError::InvalidInput(format!("Failed to read chunk: {}", e)))?;
    file.flush().await.map_err(anyhow::Error::from)?;
    file.rewind().await.map_err(anyhow::Error::from)?;

    tracing::debug!(size_bytes, "Chunk spooled");
    Ok(file)
}
