//! Post-merge callback delivery
//!
//! Notifies an external service that an upload has been merged, so it can
//! record the final path against its entity.

use anyhow::Context;
use async_trait::async_trait;
use mediadrop_core::{MergedUpload, PostMergeHook};
use reqwest::Client;
use std::time::Duration;

const USER_AGENT: &str = "Mediadrop-Callback/1.0";

/// `PostMergeHook` that POSTs each merge event as JSON to a fixed URL.
pub struct CallbackHook {
    url: String,
    http_client: Client,
}

impl CallbackHook {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, anyhow::Error> {
        let http_client = Client::builder()
            .timeout(timeout)
            .pool_idle_timeout(Duration::from_secs(90))
            .build()
            .context("Failed to create HTTP client for post-merge callbacks")?;

        Ok(Self {
            url: url.into(),
            http_client,
        })
    }
}

#[async_trait]
impl PostMergeHook for CallbackHook {
    async fn on_merged(&self, upload: &MergedUpload) -> Result<(), anyhow::Error> {
        let response = self
            .http_client
            .post(&self.url)
            .header("User-Agent", USER_AGENT)
            .json(upload)
            .send()
            .await
            .with_context(|| format!("Failed to deliver post-merge callback to {}", self.url))?;

        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("Post-merge callback returned status {}", status.as_u16());
        }

        tracing::debug!(
            url = %self.url,
            file_name = %upload.file_name,
            status = status.as_u16(),
            "Post-merge callback delivered"
        );
        Ok(())
    }
}
