//! Service initialization and application state setup

use crate::state::{AppState, BackgroundTasks, ProxyState, UploadState};
use anyhow::{Context, Result};
use axum::http::HeaderValue;
use mediadrop_core::{Config, NoOpPostMergeHook, PostMergeHook};
use mediadrop_services::{
    CallbackHook, MediaCache, MediaCacheSettings, StaleSessionReaper, UploadCoordinator,
    UploadLayout,
};
use std::sync::Arc;

/// Initialize all services, returning the application state
///
/// Creates the upload, staging and cache directories so the first request
/// does not race on their creation.
pub async fn initialize_services(config: &Config) -> Result<Arc<AppState>> {
    for dir in [
        config.upload_root().to_path_buf(),
        config.staging_root(),
        config.media_cache_dir().to_path_buf(),
    ] {
        tokio::fs::create_dir_all(&dir)
            .await
            .with_context(|| format!("Failed to create directory {}", dir.display()))?;
    }

    let hook: Arc<dyn PostMergeHook> = match config.post_merge_callback_url() {
        Some(url) => {
            tracing::info!(url = %url, "Post-merge callback enabled");
            Arc::new(CallbackHook::new(url, config.post_merge_hook_timeout())?)
        }
        None => Arc::new(NoOpPostMergeHook),
    };

    let coordinator = UploadCoordinator::new(config, hook);
    let layout = UploadLayout::new(config.upload_root());

    let cache = MediaCache::new(MediaCacheSettings::from_config(config))
        .context("Failed to create media proxy client")?;
    let cache_control = HeaderValue::from_str(config.media_proxy_cache_control())
        .context("MEDIA_PROXY_CACHE_CONTROL is not a valid header value")?;

    tracing::info!(
        upload_root = %config.upload_root().display(),
        cache_dir = %config.media_cache_dir().display(),
        "Services initialized"
    );

    Ok(Arc::new(AppState {
        config: config.clone(),
        upload: UploadState {
            coordinator,
            layout,
        },
        proxy: ProxyState {
            cache,
            cache_control,
        },
        background: BackgroundTasks::default(),
    }))
}

/// Start the stale staging reaper unless its interval is zero
pub fn start_background_tasks(config: &Config, state: &AppState) {
    if config.staging_reap_interval().is_zero() {
        return;
    }

    let reaper = Arc::new(StaleSessionReaper::from_config(config));
    state.background.push(reaper.start());
    tracing::info!(
        retention_secs = config.staging_retention().as_secs(),
        interval_secs = config.staging_reap_interval().as_secs(),
        "Stale staging reaper started"
    );
}
