//! Mediadrop Storage Library
//!
//! Filesystem side of chunked uploads: the per-session lock registry, the chunk
//! store that stages parts, and the merge engine that assembles them.
//!
//! # On-disk layout
//!
//! - **Final artifacts**: `{upload_root}/{entity_type}/{file_name}`
//! - **Staging areas**: `{upload_root}/tmp/{file_name}_{entity_id}_{token}/{chunk_index}.part`
//!
//! Every path segment is validated in the `layout` module, so no caller can
//! build a path that escapes the upload root.

pub mod error;
pub mod layout;
pub mod locks;
pub mod merge;
pub mod staging;

// Re-export commonly used types
pub use error::{StorageError, StorageResult};
pub use layout::UploadLayout;
pub use locks::{LockRegistry, SessionGuard};
pub use merge::{MergeEngine, MergeOutcome};
pub use staging::{ChunkStore, StagedChunk};
