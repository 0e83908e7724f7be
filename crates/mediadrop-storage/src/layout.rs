//! Path layout for final artifacts and staging areas

use crate::error::{StorageError, StorageResult};
use mediadrop_core::models::upload::part_file_name;
use mediadrop_core::SessionKey;
use std::path::{Path, PathBuf};

const STAGING_DIR_NAME: &str = "tmp";

/// Resolves upload paths under a single root directory.
#[derive(Debug, Clone)]
pub struct UploadLayout {
    upload_root: PathBuf,
    staging_root: PathBuf,
}

impl UploadLayout {
    pub fn new(upload_root: impl Into<PathBuf>) -> Self {
        let upload_root = upload_root.into();
        let staging_root = upload_root.join(STAGING_DIR_NAME);
        UploadLayout {
            upload_root,
            staging_root,
        }
    }

    pub fn upload_root(&self) -> &Path {
        &self.upload_root
    }

    /// Parent of every session staging directory.
    pub fn staging_root(&self) -> &Path {
        &self.staging_root
    }

    pub fn session_dir(&self, key: &SessionKey) -> StorageResult<PathBuf> {
        Ok(self.staging_root.join(segment(key.as_str())?))
    }

    pub fn part_path(&self, key: &SessionKey, chunk_index: u32) -> StorageResult<PathBuf> {
        Ok(self.session_dir(key)?.join(part_file_name(chunk_index)))
    }

    /// Directory holding the merged artifacts of one entity type.
    pub fn entity_dir(&self, entity_type: &str) -> StorageResult<PathBuf> {
        let entity_type = segment(entity_type)?;
        if entity_type == STAGING_DIR_NAME {
            return Err(StorageError::InvalidKey(format!(
                "entity type '{}' is reserved",
                STAGING_DIR_NAME
            )));
        }
        Ok(self.upload_root.join(entity_type))
    }

    pub fn final_path(&self, entity_type: &str, file_name: &str) -> StorageResult<PathBuf> {
        Ok(self.entity_dir(entity_type)?.join(segment(file_name)?))
    }
}

/// Validate a single path segment: non-empty, no separators, no `.` or `..`.
fn segment(value: &str) -> StorageResult<&str> {
    if value.is_empty()
        || value == "."
        || value.contains("..")
        || value.contains('/')
        || value.contains('\\')
        || value.contains('\0')
    {
        return Err(StorageError::InvalidKey(format!(
            "'{}' is not a valid path segment",
            value
        )));
    }
    Ok(value)
}
