use super::ssrf::check_host;
use super::MediaCacheError;
use crate::upload::sniff::{ContentSniffer, SNIFF_LEN};
use bytes::{Bytes, BytesMut};
use http::{header, HeaderMap, StatusCode};
use mediadrop_core::Config;
use reqwest::Url;
use sha1::{Digest, Sha1};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::task::JoinHandle;
use uuid::Uuid;

const MAX_REDIRECTS: usize = 5;

/// Media cache settings
#[derive(Debug, Clone)]
pub struct MediaCacheSettings {
    pub cache_dir: PathBuf,
    /// An entry is served while `now - mtime < max_age`.
    pub max_age: Duration,
    pub fetch_timeout: Duration,
    pub user_agent: String,
    pub max_body_bytes: usize,
    pub allow_private_hosts: bool,
}

impl MediaCacheSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            cache_dir: config.media_cache_dir().to_path_buf(),
            max_age: config.media_cache_max_age(),
            fetch_timeout: config.media_fetch_timeout(),
            user_agent: config.media_proxy_user_agent().to_string(),
            max_body_bytes: config.media_proxy_max_body_bytes(),
            allow_private_hosts: config.media_proxy_allow_private_hosts(),
        }
    }
}

/// Result of a cache lookup
#[derive(Debug)]
pub enum CachedMedia {
    /// A fresh, complete entry is on disk.
    Hit {
        path: PathBuf,
        content_type: &'static str,
    },
    /// The entry was missing or stale and has just been fetched. `commit`
    /// resolves once the body has been written to the cache (or failed to be).
    Fetched {
        status: StatusCode,
        headers: HeaderMap,
        body: Bytes,
        commit: JoinHandle<Result<PathBuf, MediaCacheError>>,
    },
}

pub struct MediaCache {
    settings: MediaCacheSettings,
    client: reqwest::Client,
}

impl MediaCache {
    pub fn new(settings: MediaCacheSettings) -> Result<Self, MediaCacheError> {
        let allow_private_hosts = settings.allow_private_hosts;
        // Redirects are re-checked so a public host cannot bounce the fetch inward.
        let redirect_policy = reqwest::redirect::Policy::custom(move |attempt| {
            if attempt.previous().len() >= MAX_REDIRECTS {
                attempt.error("too many redirects")
            } else if check_host(attempt.url(), allow_private_hosts).is_err() {
                attempt.stop()
            } else {
                attempt.follow()
            }
        });

        let client = reqwest::Client::builder()
            .timeout(settings.fetch_timeout)
            .user_agent(settings.user_agent.clone())
            .redirect(redirect_policy)
            .build()
            .map_err(|e| MediaCacheError::Client(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { settings, client })
    }

    pub fn settings(&self) -> &MediaCacheSettings {
        &self.settings
    }

    /// Hex SHA-1 of the normalized URL string.
    pub fn cache_key(url: &Url) -> String {
        hex::encode(Sha1::digest(url.as_str().as_bytes()))
    }

    pub fn cache_path(&self, url: &Url) -> PathBuf {
        self.settings.cache_dir.join(Self::cache_key(url))
    }

    /// Serve `url` from the cache when fresh, otherwise fetch it and commit
    /// the body to the cache in the background.
    #[tracing::instrument(skip(self, url), fields(url = %url))]
    pub async fn fetch_or_serve(&self, url: &Url) -> Result<CachedMedia, MediaCacheError> {
        check_host(url, self.settings.allow_private_hosts).map_err(|e| {
            tracing::warn!(url = %url, error = %e, "Media proxy target rejected");
            e
        })?;

        let path = self.cache_path(url);
        if let Some(content_type) = self.fresh_entry(&path).await {
            tracing::debug!(path = %path.display(), "Media cache hit");
            return Ok(CachedMedia::Hit { path, content_type });
        }

        let start = std::time::Instant::now();
        let (status, headers, body) = self.fetch(url).await?;
        tracing::info!(
            status = status.as_u16(),
            size_bytes = body.len(),
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Media fetched from remote"
        );

        let cache_dir = self.settings.cache_dir.clone();
        let committed = body.clone();
        let commit = tokio::spawn(async move {
            let result = commit_entry(&cache_dir, &path, &committed).await;
            if let Err(ref e) = result {
                tracing::warn!(path = %path.display(), error = %e, "Failed to write media cache entry");
            }
            result.map(|()| path)
        });

        Ok(CachedMedia::Fetched {
            status,
            headers,
            body,
            commit,
        })
    }

    /// Content type of the entry at `path` if it exists and is within the
    /// freshness window. Any read error counts as a miss.
    async fn fresh_entry(&self, path: &Path) -> Option<&'static str> {
        let metadata = fs::metadata(path).await.ok()?;
        let age = SystemTime::now()
            .duration_since(metadata.modified().ok()?)
            .unwrap_or_default();
        if age >= self.settings.max_age {
            return None;
        }

        let file = fs::File::open(path).await.ok()?;
        let mut head = Vec::with_capacity(SNIFF_LEN);
        file.take(SNIFF_LEN as u64)
            .read_to_end(&mut head)
            .await
            .ok()?;
        Some(ContentSniffer::detect(&head))
    }

    async fn fetch(&self, url: &Url) -> Result<(StatusCode, HeaderMap, Bytes), MediaCacheError> {
        let mut response = self
            .client
            .get(url.clone())
            .header(header::ACCEPT, "*/*")
            .send()
            .await
            .map_err(|e| {
                tracing::warn!(url = %url, error = %e, "Failed to fetch remote media");
                MediaCacheError::from(e)
            })?;

        let status = response.status();
        if !status.is_success() {
            tracing::warn!(url = %url, status = status.as_u16(), "Remote media returned error status");
            return Err(MediaCacheError::UpstreamStatus(status.as_u16()));
        }

        let max = self.settings.max_body_bytes;
        if response.content_length().is_some_and(|len| len > max as u64) {
            return Err(MediaCacheError::BodyTooLarge(max));
        }

        let headers = response.headers().clone();
        let mut body = BytesMut::new();
        while let Some(chunk) = response.chunk().await? {
            if body.len() + chunk.len() > max {
                return Err(MediaCacheError::BodyTooLarge(max));
            }
            body.extend_from_slice(&chunk);
        }

        Ok((status, headers, body.freeze()))
    }
}

/// Write `body` to a temporary file in `cache_dir`, fsync it, then rename it
/// over `path`. Readers of `path` see either the previous entry or the new
/// one, never a partial file.
pub async fn commit_entry(cache_dir: &Path, path: &Path, body: &[u8]) -> Result<(), MediaCacheError> {
    fs::create_dir_all(cache_dir).await?;

    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("entry");
    let tmp_path = cache_dir.join(format!("{}.{}.tmp", file_name, Uuid::new_v4().simple()));

    let written: std::io::Result<()> = async {
        let mut file = fs::File::create(&tmp_path).await?;
        file.write_all(body).await?;
        file.sync_all().await?;
        fs::rename(&tmp_path, path).await
    }
    .await;

    if let Err(e) = written {
        let _ = fs::remove_file(&tmp_path).await;
        return Err(e.into());
    }
    Ok(())
}
