//! Application state shared by all handlers

use axum::http::HeaderValue;
use mediadrop_core::Config;
use mediadrop_services::{MediaCache, UploadCoordinator, UploadLayout};
use std::sync::{Arc, Mutex};
use tokio::task::JoinHandle;

/// Chunked upload ingest and existence probe
pub struct UploadState {
    pub coordinator: UploadCoordinator,
    pub layout: UploadLayout,
}

/// Media proxy cache
pub struct ProxyState {
    pub cache: MediaCache,
    /// Value of the `Cache-Control` header sent with every proxied response
    pub cache_control: HeaderValue,
}

/// Handles of long-running background tasks, aborted on shutdown.
#[derive(Default)]
pub struct BackgroundTasks {
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl BackgroundTasks {
    pub fn push(&self, handle: JoinHandle<()>) {
        self.handles
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(handle);
    }

    pub fn len(&self) -> usize {
        self.handles.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn shutdown(&self) {
        let handles = std::mem::take(&mut *self.handles.lock().unwrap_or_else(|e| e.into_inner()));
        for handle in handles {
            handle.abort();
        }
        tracing::debug!("Background tasks stopped");
    }
}

pub struct AppState {
    pub config: Config,
    pub upload: UploadState,
    pub proxy: ProxyState,
    pub background: BackgroundTasks,
}

pub type SharedState = Arc<AppState>;
