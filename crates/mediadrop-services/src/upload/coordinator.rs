//! Upload session coordinator
//!
//! Drives one chunk request through validation, staging, and (when the session
//! is complete) the merge. The completeness check and merge run under the
//! session lock so exactly one request merges a session.

use crate::upload::sniff::ContentSniffer;
use chrono::Utc;
use mediadrop_core::{
    AppError, Attachment, ChunkMeta, Config, MergedUpload, PostMergeHook, SniffPolicy,
};
use mediadrop_storage::{
    ChunkStore, LockRegistry, MergeEngine, MergeOutcome, StorageError, UploadLayout,
};
use std::io::Cursor;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt};

#[derive(Clone)]
pub struct UploadCoordinator {
    store: ChunkStore,
    merger: MergeEngine,
    locks: Arc<LockRegistry>,
    sniffer: ContentSniffer,
    sniff_policy: SniffPolicy,
    max_chunk_count: u32,
    hook: Arc<dyn PostMergeHook>,
    hook_timeout: Duration,
}

impl UploadCoordinator {
    pub fn new(config: &Config, hook: Arc<dyn PostMergeHook>) -> Self {
        let store = ChunkStore::new(
            UploadLayout::new(config.upload_root()),
            config.chunk_buffer_size_bytes(),
        );
        let locks = Arc::new(LockRegistry::new());
        Self {
            merger: MergeEngine::new(store.clone()),
            store,
            locks,
            sniffer: ContentSniffer::new(config.allowed_content_types().to_vec()),
            sniff_policy: config.sniff_policy(),
            max_chunk_count: config.max_chunk_count(),
            hook,
            hook_timeout: config.post_merge_hook_timeout(),
        }
    }

    pub fn chunk_store(&self) -> &ChunkStore {
        &self.store
    }

    pub fn locks(&self) -> &Arc<LockRegistry> {
        &self.locks
    }

    /// Accept one chunk of an upload session.
    ///
    /// Returns the attachment list for the response: empty while the upload is
    /// still in progress, one entry for the request that completed the session.
    #[tracing::instrument(
        skip(self, meta, reader),
        fields(
            file_name = %meta.file_name,
            entity_id = %meta.entity_id,
            chunk_index = meta.chunk_index,
            total_chunks = meta.total_chunks
        )
    )]
    pub async fn accept_chunk<R>(
        &self,
        meta: &ChunkMeta,
        mut reader: R,
    ) -> Result<Vec<Attachment>, AppError>
    where
        R: AsyncRead + Unpin + Send,
    {
        meta.validate(self.max_chunk_count)?;
        let key = meta.session_key();

        // Only the leading bytes of the file carry a signature.
        let head = if meta.chunk_index == 0 && self.sniff_policy == SniffPolicy::FirstChunkOnly {
            self.sniffer.sniff(&mut reader).await?
        } else {
            Vec::new()
        };

        match self
            .store
            .stage(&key, meta.chunk_index, Cursor::new(head).chain(reader))
            .await
        {
            Ok(_) => {}
            Err(StorageError::SessionClaimed(_)) => {
                // A concurrent request merged the session with its own copy of
                // this index.
                tracing::debug!(session_key = %key, "Duplicate chunk arrived after merge");
                return Ok(Vec::new());
            }
            Err(e) => {
                tracing::error!(session_key = %key, error = %e, "Failed to stage chunk");
                return Err(e.into());
            }
        }

        Ok(self.complete_if_ready(meta).await?.into_iter().collect())
    }

    /// Merge the session if every chunk is staged.
    ///
    /// A session already merged by a concurrent request yields `None`.
    /// The session's lock entry is evicted once no other request holds it.
    pub async fn complete_if_ready(&self, meta: &ChunkMeta) -> Result<Option<Attachment>, AppError> {
        let key = meta.session_key();
        let guard = self.locks.acquire(&key).await;
        let result = self.merge_if_complete(meta).await;
        drop(guard);
        self.locks.release(&key);
        result
    }

    async fn merge_if_complete(&self, meta: &ChunkMeta) -> Result<Option<Attachment>, AppError> {
        let key = meta.session_key();

        if !self.store.is_complete(&key, meta.total_chunks).await? {
            tracing::debug!(session_key = %key, "Chunk accepted, upload in progress");
            return Ok(None);
        }

        let (final_path, size_bytes) = match self.merger.merge(meta).await {
            Ok(MergeOutcome::Merged {
                final_path,
                size_bytes,
            }) => (final_path, size_bytes),
            Ok(MergeOutcome::AlreadyMerged) => return Ok(None),
            Err(e) => {
                tracing::error!(session_key = %key, error = %e, "Failed to merge chunks");
                return Err(e.into());
            }
        };

        self.spawn_post_merge_hook(MergedUpload {
            entity_type: meta.entity_type.clone(),
            picture_type: meta.picture_type.clone(),
            entity_id: meta.entity_id.clone(),
            file_name: meta.file_name.clone(),
            final_path,
            total_chunks: meta.total_chunks,
            size_bytes,
            merged_at: Utc::now(),
        });

        Ok(Some(Attachment {
            filename: meta.file_name.clone(),
            path: format!("{}/{}", meta.entity_type, meta.file_name),
        }))
    }

    /// Run the post-merge hook detached from the request, bounded by the hook timeout.
    fn spawn_post_merge_hook(&self, upload: MergedUpload) {
        let hook = self.hook.clone();
        let timeout = self.hook_timeout;
        tokio::spawn(async move {
            match tokio::time::timeout(timeout, hook.on_merged(&upload)).await {
                Ok(Ok(())) => {
                    tracing::debug!(file_name = %upload.file_name, "Post-merge hook completed");
                }
                Ok(Err(e)) => {
                    tracing::warn!(
                        file_name = %upload.file_name,
                        entity_id = %upload.entity_id,
                        error = %e,
                        "Post-merge hook failed"
                    );
                }
                Err(_) => {
                    tracing::warn!(
                        file_name = %upload.file_name,
                        entity_id = %upload.entity_id,
                        timeout_secs = timeout.as_secs(),
                        "Post-merge hook timed out"
                    );
                }
            }
        });
    }
}
