//! Merge engine: concatenates staged parts into the final artifact.

use crate::error::{StorageError, StorageResult};
use crate::staging::ChunkStore;
use mediadrop_core::models::upload::part_file_name;
use mediadrop_core::ChunkMeta;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::{AsyncWriteExt, BufReader, BufWriter};
use uuid::Uuid;

/// Outcome of a merge attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeOutcome {
    /// Parts were concatenated into `final_path`; the session is gone.
    Merged { final_path: PathBuf, size_bytes: u64 },
    /// The staging directory no longer exists: a concurrent caller merged first.
    AlreadyMerged,
}

#[derive(Debug, Clone)]
pub struct MergeEngine {
    store: ChunkStore,
}

impl MergeEngine {
    pub fn new(store: ChunkStore) -> Self {
        MergeEngine { store }
    }

    /// Concatenate `0.part ..= (total_chunks - 1).part` into
    /// `{upload_root}/{entity_type}/{file_name}`.
    ///
    /// The caller must hold the session lock and have checked completeness.
    /// The staging directory is first renamed to a private name, which claims
    /// the session: a missing staging directory means another caller merged it.
    /// On success the claimed directory is removed. On failure the staging directory is put back untouched, so the
    /// failed chunk can be resent; the destination may be partially written.
    pub async fn merge(&self, meta: &ChunkMeta) -> StorageResult<MergeOutcome> {
        let key = meta.session_key();
        let layout = self.store.layout();
        let staging_dir = layout.session_dir(&key)?;
        let final_path = layout.final_path(&meta.entity_type, &meta.file_name)?;
        let claimed_dir = layout
            .staging_root()
            .join(format!(".merging-{}", Uuid::new_v4().simple()));

        match fs::rename(&staging_dir, &claimed_dir).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(session_key = %key, "Staging directory absent, session already merged");
                return Ok(MergeOutcome::AlreadyMerged);
            }
            Err(e) => {
                return Err(StorageError::MergeFailed(format!(
                    "Failed to claim staging directory {}: {}",
                    staging_dir.display(),
                    e
                )));
            }
        }

        let start = std::time::Instant::now();
        let size_bytes = match self.concatenate(meta, &claimed_dir, &final_path).await {
            Ok(size_bytes) => size_bytes,
            Err(e) => {
                if let Err(restore_err) = fs::rename(&claimed_dir, &staging_dir).await {
                    tracing::error!(
                        session_key = %key,
                        path = %claimed_dir.display(),
                        error = %restore_err,
                        "Failed to restore staging directory after merge failure"
                    );
                }
                return Err(e);
            }
        };

        if let Err(e) = fs::remove_dir_all(&claimed_dir).await {
            tracing::warn!(
                session_key = %key,
                path = %claimed_dir.display(),
                error = %e,
                "Failed to remove merged staging directory, leaving it for the reaper"
            );
        }

        tracing::info!(
            session_key = %key,
            path = %final_path.display(),
            total_chunks = meta.total_chunks,
            size_bytes,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Chunked upload merged"
        );

        Ok(MergeOutcome::Merged {
            final_path,
            size_bytes,
        })
    }

    async fn concatenate(
        &self,
        meta: &ChunkMeta,
        parts_dir: &Path,
        final_path: &Path,
    ) -> StorageResult<u64> {
        let entity_dir = self.store.layout().entity_dir(&meta.entity_type)?;
        fs::create_dir_all(&entity_dir).await.map_err(|e| {
            StorageError::MergeFailed(format!(
                "Failed to create output directory {}: {}",
                entity_dir.display(),
                e
            ))
        })?;

        let file = fs::File::create(final_path).await.map_err(|e| {
            StorageError::MergeFailed(format!("Failed to create {}: {}", final_path.display(), e))
        })?;
        let buffer_size = self.store.buffer_size();
        let mut writer = BufWriter::with_capacity(buffer_size, file);

        let mut size_bytes = 0u64;
        for index in 0..meta.total_chunks {
            let part_path = parts_dir.join(part_file_name(index));
            let part = match fs::File::open(&part_path).await {
                Ok(part) => part,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    return Err(StorageError::MissingChunk {
                        session: meta.session_key().to_string(),
                        index,
                    });
                }
                Err(e) => return Err(e.into()),
            };
            let mut reader = BufReader::with_capacity(buffer_size, part);
            size_bytes += tokio::io::copy_buf(&mut reader, &mut writer)
                .await
                .map_err(|e| {
                    StorageError::MergeFailed(format!(
                        "Failed to append chunk {} to {}: {}",
                        index,
                        final_path.display(),
                        e
                    ))
                })?;
        }

        writer.flush().await?;
        writer.get_ref().sync_all().await?;
        Ok(size_bytes)
    }
}
