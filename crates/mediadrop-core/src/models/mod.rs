//! Domain models shared between the storage, services and API crates.

pub mod upload;

pub use upload::{Attachment, ChunkMeta, MergedUpload, SessionKey};
