use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

use crate::error::AppError;

/// Per-request chunk metadata, sent as the JSON `meta` field of a chunk upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkMeta {
    pub file_name: String,
    /// 0-based position of this chunk in the file
    pub chunk_index: u32,
    pub total_chunks: u32,
    pub entity_type: String,
    #[serde(default)]
    pub picture_type: String,
    pub entity_id: String,
    #[serde(default)]
    pub token: String,
}

impl ChunkMeta {
    /// Key of the upload session this chunk belongs to.
    pub fn session_key(&self) -> SessionKey {
        SessionKey::new(&self.file_name, &self.entity_id, &self.token)
    }

    /// Staged filename for this chunk inside the session's staging area.
    pub fn part_file_name(&self) -> String {
        part_file_name(self.chunk_index)
    }

    /// Reject metadata that cannot be mapped onto the staging/final layout.
    ///
    /// Every name below becomes a path segment, so separators and parent
    /// references are refused outright.
    pub fn validate(&self, max_chunk_count: u32) -> Result<(), AppError> {
        require_segment("fileName", &self.file_name)?;
        require_segment("entityType", &self.entity_type)?;
        require_segment("entityId", &self.entity_id)?;
        if !self.token.is_empty() {
            require_segment("token", &self.token)?;
        }
        if !self.picture_type.is_empty() {
            require_segment("pictureType", &self.picture_type)?;
        }

        if self.total_chunks == 0 {
            return Err(AppError::InvalidInput(
                "totalChunks must be greater than 0".to_string(),
            ));
        }
        if self.total_chunks > max_chunk_count {
            return Err(AppError::InvalidInput(format!(
                "totalChunks {} exceeds maximum {}",
                self.total_chunks, max_chunk_count
            )));
        }
        if self.chunk_index >= self.total_chunks {
            return Err(AppError::InvalidInput(format!(
                "chunkIndex {} out of range for totalChunks {}",
                self.chunk_index, self.total_chunks
            )));
        }
        Ok(())
    }
}

/// Staged filename for chunk `index`.
pub fn part_file_name(index: u32) -> String {
    format!("{}.part", index)
}

/// Check that `value` is usable as a single path segment.
pub fn require_segment(field: &str, value: &str) -> Result<(), AppError> {
    if value.trim().is_empty() {
        return Err(AppError::InvalidInput(format!("{} is required", field)));
    }
    if value == "."
        || value.contains('/')
        || value.contains('\\')
        || value.contains("..")
        || value.contains('\0')
    {
        return Err(AppError::InvalidInput(format!(
            "{} contains invalid characters",
            field
        )));
    }
    Ok(())
}

/// Identity of an upload session: `{fileName}_{entityId}_{token}`.
///
/// The key doubles as the name of the session's staging directory.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionKey(String);

impl SessionKey {
    pub fn new(file_name: &str, entity_id: &str, token: &str) -> Self {
        SessionKey(format!("{}_{}_{}", file_name, entity_id, token))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Attachment record returned to the client once a session has been merged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub filename: String,
    pub path: String,
}

/// Event handed to the post-merge hook after a successful merge.
#[derive(Debug, Clone, Serialize)]
pub struct MergedUpload {
    pub entity_type: String,
    pub picture_type: String,
    pub entity_id: String,
    pub file_name: String,
    pub final_path: PathBuf,
    pub total_chunks: u32,
    pub size_bytes: u64,
    pub merged_at: DateTime<Utc>,
}
