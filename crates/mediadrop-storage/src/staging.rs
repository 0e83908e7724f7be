//! Chunk store: writes arriving chunks into per-session staging directories.

use crate::error::{StorageError, StorageResult};
use crate::layout::UploadLayout;
use mediadrop_core::SessionKey;
use std::path::PathBuf;
use tokio::fs;
use tokio::io::{AsyncRead, AsyncWriteExt, BufReader, BufWriter};
use uuid::Uuid;

/// Result of staging one chunk
#[derive(Debug, Clone)]
pub struct StagedChunk {
    pub staging_dir: PathBuf,
    pub part_path: PathBuf,
    pub size_bytes: u64,
}

#[derive(Debug, Clone)]
pub struct ChunkStore {
    layout: UploadLayout,
    buffer_size: usize,
}

impl ChunkStore {
    /// Create a chunk store copying through a buffer of `buffer_size` bytes.
    pub fn new(layout: UploadLayout, buffer_size: usize) -> Self {
        ChunkStore {
            layout,
            buffer_size: buffer_size.max(1),
        }
    }

    pub fn layout(&self) -> &UploadLayout {
        &self.layout
    }

    pub fn buffer_size(&self) -> usize {
        self.buffer_size
    }

    /// Write a chunk to `{staging_dir}/{chunk_index}.part`.
    ///
    /// The staging directory is created if needed. Bytes go to a temporary
    /// file that is renamed over `{chunk_index}.part` once flushed, so a part
    /// is only visible when complete. An existing part for the same index is
    /// replaced. Memory use is bounded by the buffer size.
    ///
    /// A merge may claim the directory while a duplicate chunk is in flight.
    /// If it disappears before the temp file is opened it is recreated; if
    /// it disappears before the commit, [`StorageError::SessionClaimed`] is
    /// returned and nothing is staged.
    pub async fn stage<R>(
        &self,
        key: &SessionKey,
        chunk_index: u32,
        reader: R,
    ) -> StorageResult<StagedChunk>
    where
        R: AsyncRead + Unpin,
    {
        let staging_dir = self.layout.session_dir(key)?;
        let part_path = self.layout.part_path(key, chunk_index)?;
        let start = std::time::Instant::now();

        let tmp_path = staging_dir.join(format!(
            "{}.part.{}.tmp",
            chunk_index,
            Uuid::new_v4().simple()
        ));
        let file = match self.create_tmp(&staging_dir, &tmp_path).await {
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                // The directory was claimed by a merge or the reaper between
                // creating it and opening the file.
                tracing::debug!(
                    session_key = %key,
                    chunk_index,
                    "Staging directory vanished, recreating"
                );
                self.create_tmp(&staging_dir, &tmp_path).await
            }
            other => other,
        }
        .map_err(|e| {
            StorageError::StagingFailed(format!(
                "Failed to create part file {}: {}",
                tmp_path.display(),
                e
            ))
        })?;

        let mut reader = BufReader::with_capacity(self.buffer_size, reader);
        let mut writer = BufWriter::with_capacity(self.buffer_size, file);
        let copied = tokio::io::copy_buf(&mut reader, &mut writer).await;
        let size_bytes = match copied {
            Ok(n) => match writer.flush().await {
                Ok(()) => n,
                Err(e) => return Err(discard_tmp(&tmp_path, e).await),
            },
            Err(e) => return Err(discard_tmp(&tmp_path, e).await),
        };
        drop(writer);

        match fs::rename(&tmp_path, &part_path).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                // The temp file moved away with the claimed directory.
                return Err(StorageError::SessionClaimed(key.to_string()));
            }
            Err(e) => {
                return Err(StorageError::StagingFailed(format!(
                    "Failed to commit part file {}: {}",
                    part_path.display(),
                    e
                )));
            }
        }

        tracing::debug!(
            session_key = %key,
            chunk_index,
            size_bytes,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Chunk staged"
        );

        Ok(StagedChunk {
            staging_dir,
            part_path,
            size_bytes,
        })
    }

    async fn create_tmp(
        &self,
        staging_dir: &std::path::Path,
        tmp_path: &std::path::Path,
    ) -> std::io::Result<fs::File> {
        fs::create_dir_all(staging_dir).await?;
        fs::File::create(tmp_path).await
    }

    /// True iff every index in `0..total_chunks` has a staged part.
    ///
    /// Callers must hold the session lock, otherwise two requests can both
    /// observe a complete session.
    pub async fn is_complete(&self, key: &SessionKey, total_chunks: u32) -> StorageResult<bool> {
        let staging_dir = self.layout.session_dir(key)?;
        if !fs::try_exists(&staging_dir).await? {
            return Ok(false);
        }
        for index in 0..total_chunks {
            if !fs::try_exists(self.layout.part_path(key, index)?).await? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Indices of the parts currently staged for `key`, in ascending order.
    pub async fn staged_indices(&self, key: &SessionKey) -> StorageResult<Vec<u32>> {
        let staging_dir = self.layout.session_dir(key)?;
        let mut entries = match fs::read_dir(&staging_dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut indices = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name();
            let index = name
                .to_str()
                .and_then(|n| n.strip_suffix(".part"))
                .and_then(|n| n.parse::<u32>().ok());
            if let Some(index) = index {
                indices.push(index);
            }
        }
        indices.sort_unstable();
        Ok(indices)
    }
}

async fn discard_tmp(tmp_path: &std::path::Path, err: std::io::Error) -> StorageError {
    let _ = fs::remove_file(tmp_path).await;
    StorageError::StagingFailed(format!(
        "Failed to write part file {}: {}",
        tmp_path.display(),
        err
    ))
}
