//! Mediadrop Core Library
//!
//! This crate provides core domain models, error types, configuration, and hook
//! traits that are shared across all Mediadrop components.

pub mod config;
pub mod error;
pub mod hooks;
pub mod models;

// Re-export commonly used types
pub use config::{BaseConfig, Config, IngestConfig, SniffPolicy};
pub use error::{AppError, ErrorMetadata, LogLevel};
pub use hooks::{NoOpPostMergeHook, PostMergeHook};
pub use models::{Attachment, ChunkMeta, MergedUpload, SessionKey};
