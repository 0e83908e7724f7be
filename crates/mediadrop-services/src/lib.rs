//! Mediadrop Services Layer
//!
//! Orchestration on top of the storage crate: the upload coordinator that
//! decides when a session merges, the stale staging reaper, the media proxy
//! cache and the post-merge callback hook. Thin HTTP handling stays in
//! mediadrop-api.

pub mod cleanup;
pub mod media_cache;
pub mod upload;
pub mod webhook;

pub use cleanup::StaleSessionReaper;
pub use media_cache::{
    normalize_target_url, CachedMedia, MediaCache, MediaCacheError, MediaCacheSettings,
};
pub use mediadrop_storage::{
    ChunkStore, LockRegistry, MergeEngine, MergeOutcome, StorageError, StorageResult,
    UploadLayout,
};
pub use upload::{ContentSniffer, UploadCoordinator, ValidationError};
pub use webhook::CallbackHook;
