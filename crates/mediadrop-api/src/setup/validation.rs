//! Configuration validation
//!
//! Validates critical configuration values at startup to catch misconfigurations early.

use anyhow::Result;
use mediadrop_core::{Config, SniffPolicy};

/// Validate critical configuration values
///
/// Hard errors come from `Config::validate`; this adds the startup warnings
/// for settings that are legal but risky.
pub fn validate_config(config: &Config) -> Result<()> {
    config.validate()?;

    let is_production = config.is_production();
    let env_var = std::env::var("ENVIRONMENT")
        .or_else(|_| std::env::var("APP_ENV"))
        .ok();

    if is_production && env_var.is_none() {
        tracing::warn!(
            "Production mode detected but ENVIRONMENT/APP_ENV not set - error details may leak"
        );
    }

    if config.sniff_policy() == SniffPolicy::Disabled {
        tracing::warn!("Content sniffing is disabled - uploads are not type-checked");
    }

    if config.media_proxy_allow_private_hosts() {
        tracing::warn!("Media proxy may fetch loopback and private-network hosts");
    }

    if config.staging_reap_interval().is_zero() {
        tracing::warn!("Stale staging reaper disabled - abandoned uploads will accumulate");
    } else if config.staging_retention() < config.post_merge_hook_timeout() {
        tracing::warn!(
            retention_secs = config.staging_retention().as_secs(),
            "Staging retention is shorter than the post-merge hook timeout"
        );
    }

    if config.chunk_buffer_size_bytes() > config.max_upload_size_bytes() {
        tracing::warn!(
            buffer_bytes = config.chunk_buffer_size_bytes(),
            max_upload_bytes = config.max_upload_size_bytes(),
            "Chunk copy buffer is larger than the request body limit"
        );
    }

    Ok(())
}
