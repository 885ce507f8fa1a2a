//! Page acquisition job: fetch a stored page over HTTP, then send its content
//! to the extraction service.
//!
//! Both stages use blocking libcurl and run on the blocking pool.

mod extract;
mod fetch;

pub use extract::{truncate_content, ExtractRequest, ExtractorClient};
pub use fetch::fetch_page;

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use crate::batch::BatchJob;
use crate::circuit::circuit_key_for_url;
use crate::config::{FetchConfig, HarvestConfig};
use crate::store::{Extraction, PageRecord};

/// Accept only absolute http(s) URLs with a host.
pub fn validate_page_url(url: &str) -> Result<()> {
    let parsed = url::Url::parse(url).with_context(|| format!("invalid URL: {url}"))?;
    anyhow::ensure!(
        matches!(parsed.scheme(), "http" | "https"),
        "unsupported scheme {:?} in {url}; only http and https pages can be fetched",
        parsed.scheme()
    );
    anyhow::ensure!(parsed.host_str().is_some(), "URL has no host: {url}");
    Ok(())
}

/// [`BatchJob`] over stored pages. Items are keyed by host.
#[derive(Debug, Clone)]
pub struct PagePipeline {
    fetch: Arc<FetchConfig>,
    extractor: Arc<ExtractorClient>,
    fields: Arc<Vec<String>>,
    max_content_bytes: usize,
}

impl PagePipeline {
    pub fn new(fetch: FetchConfig, extractor: ExtractorClient, fields: Vec<String>, max_content_bytes: usize) -> Self {
        Self {
            fetch: Arc::new(fetch),
            extractor: Arc::new(extractor),
            fields: Arc::new(fields),
            max_content_bytes,
        }
    }

    /// Build from config. Fails if no extractor endpoint is configured or the
    /// configured token variable is unset.
    pub fn from_config(cfg: &HarvestConfig) -> Result<Self> {
        let endpoint = cfg
            .extractor
            .endpoint
            .clone()
            .context("extractor.endpoint is not set in config.toml")?;
        let bearer_token = match &cfg.extractor.api_key_env {
            Some(var) => Some(
                std::env::var(var)
                    .with_context(|| format!("environment variable {var} (extractor.api_key_env) is not set"))?,
            ),
            None => None,
        };
        let extractor = ExtractorClient {
            endpoint,
            bearer_token,
            timeout: Duration::from_secs(cfg.extractor.timeout_secs),
            user_agent: cfg.fetch.user_agent.clone(),
        };
        Ok(Self::new(
            cfg.fetch.clone(),
            extractor,
            cfg.extractor.fields.clone(),
            cfg.extractor.max_content_bytes,
        ))
    }
}

#[async_trait]
impl BatchJob for PagePipeline {
    type Item = PageRecord;
    type Output = Extraction;

    fn key(&self, item: &PageRecord) -> String {
        circuit_key_for_url(&item.url)
    }

    async fn process(&self, item: &PageRecord) -> Result<Extraction> {
        let url = item.url.clone();
        let fetch_cfg = Arc::clone(&self.fetch);
        let content = tokio::task::spawn_blocking(move || fetch_page(&url, &fetch_cfg))
            .await
            .context("fetch task failed")??;
        tracing::debug!(page = item.id, bytes = content.len(), "page fetched");

        let url = item.url.clone();
        let fields = Arc::clone(&self.fields);
        let client = Arc::clone(&self.extractor);
        let max = self.max_content_bytes;
        let extraction = tokio::task::spawn_blocking(move || {
            let request = ExtractRequest {
                url: &url,
                fields: &fields,
                content: truncate_content(&content, max),
            };
            client.extract(&request)
        })
        .await
        .context("extraction task failed")??;
        tracing::debug!(page = item.id, "page extracted");
        Ok(extraction)
    }
}
