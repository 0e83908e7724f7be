//! Configuration module
//!
//! This module provides configuration structures for the ingest API and its
//! services: server settings, chunked upload limits, staging retention, content
//! sniffing policy and the media proxy cache.

use std::env;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

// Common constants
const SERVER_PORT: u16 = 4000;
const HTTP_CONCURRENCY_LIMIT: usize = 10_000;
const UPLOAD_ROOT: &str = "./uploads";
const STAGING_DIR_NAME: &str = "tmp";
const MAX_UPLOAD_SIZE_MB: usize = 50;
const CHUNK_BUFFER_SIZE_KB: usize = 256;
const MAX_CHUNK_COUNT: u32 = 10_000;
const STAGING_RETENTION_SECS: u64 = 120;
const STAGING_REAP_INTERVAL_SECS: u64 = 300;
const ALLOWED_CONTENT_TYPES: &str = "image/jpeg,image/png";
const POST_MERGE_HOOK_TIMEOUT_SECS: u64 = 10;
const MEDIA_CACHE_DIR: &str = "./cache/media";
const MEDIA_CACHE_MAX_AGE_SECS: u64 = 24 * 60 * 60;
const MEDIA_FETCH_TIMEOUT_SECS: u64 = 10;
const MEDIA_PROXY_USER_AGENT: &str = "MediaProxy/1.0";
const MEDIA_PROXY_MAX_BODY_MB: usize = 50;
const MEDIA_PROXY_CACHE_CONTROL: &str = "public, max-age=86400";

/// Which chunks of an upload are content-sniffed against the allow-list.
///
/// Only the leading bytes of a file carry a recognisable signature, so sniffing
/// later chunks would only ever reject valid continuations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SniffPolicy {
    /// Sniff chunk 0 and trust the remaining chunks of the stream.
    FirstChunkOnly,
    /// Accept any content.
    Disabled,
}

impl FromStr for SniffPolicy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "first_chunk" | "first-chunk" | "first" => Ok(SniffPolicy::FirstChunkOnly),
            "disabled" | "off" | "none" => Ok(SniffPolicy::Disabled),
            other => Err(anyhow::anyhow!(
                "CONTENT_SNIFF_POLICY must be 'first_chunk' or 'disabled', got '{}'",
                other
            )),
        }
    }
}

/// Base server configuration
#[derive(Clone, Debug)]
pub struct BaseConfig {
    pub server_port: u16,
    pub cors_origins: Vec<String>,
    pub environment: String,
    pub http_concurrency_limit: usize,
}

impl Default for BaseConfig {
    fn default() -> Self {
        Self {
            server_port: SERVER_PORT,
            cors_origins: vec!["*".to_string()],
            environment: "development".to_string(),
            http_concurrency_limit: HTTP_CONCURRENCY_LIMIT,
        }
    }
}

/// Chunked ingest and media proxy configuration
#[derive(Clone, Debug)]
pub struct IngestConfig {
    pub base: BaseConfig,
    // Chunked upload
    pub upload_root: PathBuf,
    pub max_upload_size_bytes: usize,
    pub chunk_buffer_size_bytes: usize,
    pub max_chunk_count: u32,
    pub allowed_content_types: Vec<String>,
    pub sniff_policy: SniffPolicy,
    // Stale staging cleanup. A zero interval disables the reaper.
    pub staging_retention: Duration,
    pub staging_reap_interval: Duration,
    // Post-merge hook
    pub post_merge_hook_timeout: Duration,
    pub post_merge_callback_url: Option<String>,
    // Media proxy cache
    pub media_cache_dir: PathBuf,
    pub media_cache_max_age: Duration,
    pub media_fetch_timeout: Duration,
    pub media_proxy_user_agent: String,
    pub media_proxy_max_body_bytes: usize,
    pub media_proxy_cache_control: String,
    // Lets the proxy reach loopback/private hosts (local development and tests only)
    pub media_proxy_allow_private_hosts: bool,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            base: BaseConfig::default(),
            upload_root: PathBuf::from(UPLOAD_ROOT),
            max_upload_size_bytes: MAX_UPLOAD_SIZE_MB * 1024 * 1024,
            chunk_buffer_size_bytes: CHUNK_BUFFER_SIZE_KB * 1024,
            max_chunk_count: MAX_CHUNK_COUNT,
            allowed_content_types: split_list(ALLOWED_CONTENT_TYPES),
            sniff_policy: SniffPolicy::FirstChunkOnly,
            staging_retention: Duration::from_secs(STAGING_RETENTION_SECS),
            staging_reap_interval: Duration::from_secs(STAGING_REAP_INTERVAL_SECS),
            post_merge_hook_timeout: Duration::from_secs(POST_MERGE_HOOK_TIMEOUT_SECS),
            post_merge_callback_url: None,
            media_cache_dir: PathBuf::from(MEDIA_CACHE_DIR),
            media_cache_max_age: Duration::from_secs(MEDIA_CACHE_MAX_AGE_SECS),
            media_fetch_timeout: Duration::from_secs(MEDIA_FETCH_TIMEOUT_SECS),
            media_proxy_user_agent: MEDIA_PROXY_USER_AGENT.to_string(),
            media_proxy_max_body_bytes: MEDIA_PROXY_MAX_BODY_MB * 1024 * 1024,
            media_proxy_cache_control: MEDIA_PROXY_CACHE_CONTROL.to_string(),
            media_proxy_allow_private_hosts: false,
        }
    }
}

/// Application configuration.
#[derive(Clone, Debug)]
pub struct Config(pub Box<IngestConfig>);

impl Config {
    pub fn new(config: IngestConfig) -> Self {
        Config(Box::new(config))
    }

    fn as_ingest(&self) -> &IngestConfig {
        &self.0
    }

    /// Check if the application is running in production mode
    pub fn is_production(&self) -> bool {
        is_production_env(&self.as_ingest().base.environment)
    }

    pub fn from_env() -> Result<Self, anyhow::Error> {
        let config = IngestConfig::from_env()?;
        Ok(Config(Box::new(config)))
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        self.as_ingest().validate()
    }

    pub fn server_port(&self) -> u16 {
        self.as_ingest().base.server_port
    }

    pub fn cors_origins(&self) -> &[String] {
        &self.as_ingest().base.cors_origins
    }

    pub fn environment(&self) -> &str {
        &self.as_ingest().base.environment
    }

    pub fn http_concurrency_limit(&self) -> usize {
        self.as_ingest().base.http_concurrency_limit
    }

    pub fn upload_root(&self) -> &Path {
        &self.as_ingest().upload_root
    }

    /// Directory holding one staging area per in-flight upload session.
    pub fn staging_root(&self) -> PathBuf {
        self.as_ingest().upload_root.join(STAGING_DIR_NAME)
    }

    pub fn max_upload_size_bytes(&self) -> usize {
        self.as_ingest().max_upload_size_bytes
    }

    pub fn chunk_buffer_size_bytes(&self) -> usize {
        self.as_ingest().chunk_buffer_size_bytes
    }

    pub fn max_chunk_count(&self) -> u32 {
        self.as_ingest().max_chunk_count
    }

    pub fn allowed_content_types(&self) -> &[String] {
        &self.as_ingest().allowed_content_types
    }

    pub fn sniff_policy(&self) -> SniffPolicy {
        self.as_ingest().sniff_policy
    }

    pub fn staging_retention(&self) -> Duration {
        self.as_ingest().staging_retention
    }

    pub fn staging_reap_interval(&self) -> Duration {
        self.as_ingest().staging_reap_interval
    }

    pub fn post_merge_hook_timeout(&self) -> Duration {
        self.as_ingest().post_merge_hook_timeout
    }

    pub fn post_merge_callback_url(&self) -> Option<&str> {
        self.as_ingest().post_merge_callback_url.as_deref()
    }

    pub fn media_cache_dir(&self) -> &Path {
        &self.as_ingest().media_cache_dir
    }

    pub fn media_cache_max_age(&self) -> Duration {
        self.as_ingest().media_cache_max_age
    }

    pub fn media_fetch_timeout(&self) -> Duration {
        self.as_ingest().media_fetch_timeout
    }

    pub fn media_proxy_user_agent(&self) -> &str {
        &self.as_ingest().media_proxy_user_agent
    }

    pub fn media_proxy_max_body_bytes(&self) -> usize {
        self.as_ingest().media_proxy_max_body_bytes
    }

    pub fn media_proxy_cache_control(&self) -> &str {
        &self.as_ingest().media_proxy_cache_control
    }

    pub fn media_proxy_allow_private_hosts(&self) -> bool {
        self.as_ingest().media_proxy_allow_private_hosts
    }
}

impl IngestConfig {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();

        let defaults = IngestConfig::default();

        let environment = env::var("ENVIRONMENT")
            .or_else(|_| env::var("APP_ENV"))
            .unwrap_or_else(|_| defaults.base.environment.clone());

        let cors_origins_str = env::var("CORS_ORIGINS").unwrap_or_else(|_| "*".to_string());
        if is_production_env(&environment) && cors_origins_str.trim() == "*" {
            return Err(anyhow::anyhow!(
                "CORS_ORIGINS cannot be '*' in production. Please specify explicit origins."
            ));
        }

        let base = BaseConfig {
            server_port: env::var("PORT")
                .unwrap_or_else(|_| SERVER_PORT.to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("PORT must be a valid number"))?,
            cors_origins: cors_origins_str
                .split(',')
                .map(|s| s.trim().to_string())
                .collect(),
            environment,
            http_concurrency_limit: env_or("HTTP_CONCURRENCY_LIMIT", HTTP_CONCURRENCY_LIMIT)?
                .max(1),
        };

        let sniff_policy = match env::var("CONTENT_SNIFF_POLICY") {
            Ok(value) => value.parse()?,
            Err(_) => defaults.sniff_policy,
        };

        let config = IngestConfig {
            base,
            upload_root: env::var("UPLOAD_ROOT")
                .map(PathBuf::from)
                .unwrap_or(defaults.upload_root),
            max_upload_size_bytes: scaled(
                "MAX_UPLOAD_SIZE_MB",
                env_or("MAX_UPLOAD_SIZE_MB", MAX_UPLOAD_SIZE_MB)?,
                1024 * 1024,
            )?,
            chunk_buffer_size_bytes: scaled(
                "CHUNK_BUFFER_SIZE_KB",
                env_or("CHUNK_BUFFER_SIZE_KB", CHUNK_BUFFER_SIZE_KB)?,
                1024,
            )?,
            max_chunk_count: env_or("MAX_CHUNK_COUNT", MAX_CHUNK_COUNT)?,
            allowed_content_types: env::var("ALLOWED_CONTENT_TYPES")
                .map(|s| split_list(&s))
                .unwrap_or(defaults.allowed_content_types),
            sniff_policy,
            staging_retention: Duration::from_secs(env_or(
                "STAGING_RETENTION_SECS",
                STAGING_RETENTION_SECS,
            )?),
            staging_reap_interval: Duration::from_secs(env_or(
                "STAGING_REAP_INTERVAL_SECS",
                STAGING_REAP_INTERVAL_SECS,
            )?),
            post_merge_hook_timeout: Duration::from_secs(env_or(
                "POST_MERGE_HOOK_TIMEOUT_SECS",
                POST_MERGE_HOOK_TIMEOUT_SECS,
            )?),
            post_merge_callback_url: env::var("POST_MERGE_CALLBACK_URL")
                .ok()
                .filter(|s| !s.trim().is_empty()),
            media_cache_dir: env::var("MEDIA_CACHE_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.media_cache_dir),
            media_cache_max_age: Duration::from_secs(env_or(
                "MEDIA_CACHE_MAX_AGE_SECS",
                MEDIA_CACHE_MAX_AGE_SECS,
            )?),
            media_fetch_timeout: Duration::from_secs(env_or(
                "MEDIA_FETCH_TIMEOUT_SECS",
                MEDIA_FETCH_TIMEOUT_SECS,
            )?),
            media_proxy_user_agent: env::var("MEDIA_PROXY_USER_AGENT")
                .unwrap_or(defaults.media_proxy_user_agent),
            media_proxy_max_body_bytes: scaled(
                "MEDIA_PROXY_MAX_BODY_MB",
                env_or("MEDIA_PROXY_MAX_BODY_MB", MEDIA_PROXY_MAX_BODY_MB)?,
                1024 * 1024,
            )?,
            media_proxy_cache_control: env::var("MEDIA_PROXY_CACHE_CONTROL")
                .unwrap_or(defaults.media_proxy_cache_control),
            media_proxy_allow_private_hosts: env_or("MEDIA_PROXY_ALLOW_PRIVATE_HOSTS", false)?,
        };

        Ok(config)
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.max_upload_size_bytes == 0 {
            return Err(anyhow::anyhow!("MAX_UPLOAD_SIZE_MB must be greater than 0"));
        }
        if self.chunk_buffer_size_bytes == 0 {
            return Err(anyhow::anyhow!("CHUNK_BUFFER_SIZE_KB must be greater than 0"));
        }
        if self.max_chunk_count == 0 {
            return Err(anyhow::anyhow!("MAX_CHUNK_COUNT must be greater than 0"));
        }
        if self.sniff_policy == SniffPolicy::FirstChunkOnly && self.allowed_content_types.is_empty()
        {
            return Err(anyhow::anyhow!(
                "ALLOWED_CONTENT_TYPES must not be empty when content sniffing is enabled"
            ));
        }
        if self.media_proxy_max_body_bytes == 0 {
            return Err(anyhow::anyhow!("MEDIA_PROXY_MAX_BODY_MB must be greater than 0"));
        }
        if self.media_fetch_timeout.is_zero() {
            return Err(anyhow::anyhow!("MEDIA_FETCH_TIMEOUT_SECS must be greater than 0"));
        }
        if let Some(ref url) = self.post_merge_callback_url {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(anyhow::anyhow!(
                    "POST_MERGE_CALLBACK_URL must start with http:// or https://"
                ));
            }
        }
        if is_production_env(&self.base.environment) && self.media_proxy_allow_private_hosts {
            return Err(anyhow::anyhow!(
                "MEDIA_PROXY_ALLOW_PRIVATE_HOSTS cannot be enabled in production"
            ));
        }
        Ok(())
    }
}

fn is_production_env(environment: &str) -> bool {
    let env = environment.to_lowercase();
    env == "production" || env == "prod"
}

/// Read `key` from the environment, falling back to `default` when unset.
/// A value that is set but does not parse is an error.
fn env_or<T>(key: &str, default: T) -> Result<T, anyhow::Error>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    parse_or(key, env::var(key).ok(), default)
}

fn parse_or<T>(key: &str, raw: Option<String>, default: T) -> Result<T, anyhow::Error>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match raw {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|e| anyhow::anyhow!("{} has an invalid value '{}': {}", key, value, e)),
        None => Ok(default),
    }
}

/// Convert a size given in `key`'s unit to bytes.
fn scaled(key: &str, value: usize, unit_bytes: usize) -> Result<usize, anyhow::Error> {
    value
        .checked_mul(unit_bytes)
        .ok_or_else(|| anyhow::anyhow!("{} is too large: {}", key, value))
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .collect()
}
