//! Content-addressed disk cache fronting remote media fetches.

pub mod service;
pub mod ssrf;

pub use service::{CachedMedia, MediaCache, MediaCacheSettings};
pub use ssrf::{check_host, normalize_target_url};

use mediadrop_core::AppError;

#[derive(Debug, thiserror::Error)]
pub enum MediaCacheError {
    #[error("Invalid target URL: {0}")]
    InvalidUrl(String),

    #[error("Blocked host: {0}")]
    BlockedHost(String),

    #[error("Remote returned status {0}")]
    UpstreamStatus(u16),

    #[error("Remote fetch timed out: {0}")]
    UpstreamTimeout(String),

    #[error("Remote fetch failed: {0}")]
    Fetch(String),

    #[error("Remote body exceeds {0} bytes")]
    BodyTooLarge(usize),

    #[error("Cache IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP client error: {0}")]
    Client(String),
}

impl From<reqwest::Error> for MediaCacheError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            MediaCacheError::UpstreamTimeout(err.to_string())
        } else {
            MediaCacheError::Fetch(err.to_string())
        }
    }
}

impl From<MediaCacheError> for AppError {
    fn from(err: MediaCacheError) -> Self {
        match err {
            MediaCacheError::InvalidUrl(msg) => AppError::InvalidInput(msg),
            MediaCacheError::BlockedHost(host) => {
                AppError::Forbidden(format!("Host '{}' is not allowed", host))
            }
            MediaCacheError::UpstreamTimeout(msg) => AppError::UpstreamTimeout(msg),
            err @ (MediaCacheError::UpstreamStatus(_)
            | MediaCacheError::Fetch(_)
            | MediaCacheError::BodyTooLarge(_)) => AppError::Upstream(err.to_string()),
            MediaCacheError::Io(e) => AppError::Storage(e.to_string()),
            MediaCacheError::Client(msg) => AppError::Internal(msg),
        }
    }
}
