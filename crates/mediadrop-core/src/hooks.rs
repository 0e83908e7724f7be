//! Hooks invoked by the upload pipeline
//!
//! The ingest core does not persist application metadata itself. After a
//! session has been merged it hands a [`MergedUpload`] to a `PostMergeHook`,
//! which is free to update a record, notify another service, etc.

use async_trait::async_trait;

use crate::models::MergedUpload;

/// Trait for reacting to a completed merge
///
/// Hooks run on a detached task under a bounded timeout; their outcome never
/// changes the response of the request that triggered the merge.
#[async_trait]
pub trait PostMergeHook: Send + Sync {
    async fn on_merged(&self, upload: &MergedUpload) -> Result<(), anyhow::Error>;
}

/// No-op implementation used when no persistence hook is configured
pub struct NoOpPostMergeHook;

#[async_trait]
impl PostMergeHook for NoOpPostMergeHook {
    async fn on_merged(&self, _upload: &MergedUpload) -> Result<(), anyhow::Error> {
        Ok(())
    }
}
