//! Extraction service client: POST page content, get fields back as JSON.

use anyhow::{Context, Result};
use serde::Serialize;
use std::time::Duration;

use crate::retry::{Stage, StageError};
use crate::store::Extraction;

/// Request body sent to the extraction endpoint.
#[derive(Debug, Serialize)]
pub struct ExtractRequest<'a> {
    pub url: &'a str,
    pub fields: &'a [String],
    pub content: &'a str,
}

/// Resolved extraction-service settings.
#[derive(Debug, Clone)]
pub struct ExtractorClient {
    pub endpoint: String,
    pub bearer_token: Option<String>,
    pub timeout: Duration,
    pub user_agent: String,
}

impl ExtractorClient {
    /// POST `request` and decode the JSON response.
    ///
    /// Runs in the current thread; call from `spawn_blocking` if used from async code.
    pub fn extract(&self, request: &ExtractRequest<'_>) -> Result<Extraction> {
        let payload = serde_json::to_vec(request)?;
        let mut body: Vec<u8> = Vec::new();

        let mut easy = curl::easy::Easy::new();
        easy.url(&self.endpoint).context("invalid extractor endpoint")?;
        easy.post(true)?;
        easy.post_fields_copy(&payload)?;
        easy.connect_timeout(Duration::from_secs(15))?;
        easy.timeout(self.timeout)?;
        easy.useragent(&self.user_agent)?;

        let mut list = curl::easy::List::new();
        list.append("Content-Type: application/json")?;
        list.append("Accept: application/json")?;
        list.append("Expect:")?;
        if let Some(token) = &self.bearer_token {
            list.append(&format!("Authorization: Bearer {}", token.trim()))?;
        }
        easy.http_headers(list)?;

        {
            let mut transfer = easy.transfer();
            transfer.write_function(|data| {
                body.extend_from_slice(data);
                Ok(data.len())
            })?;
            transfer
                .perform()
                .with_context(|| format!("POST {} failed", self.endpoint))?;
        }

        let code = easy.response_code().context("no response code")?;
        if !(200..300).contains(&code) {
            let code = u16::try_from(code).unwrap_or(0);
            let snippet = String::from_utf8_lossy(&body[..body.len().min(200)]).into_owned();
            return Err(StageError::status(Stage::Extraction, code, snippet.trim().to_string()).into());
        }

        let data: serde_json::Value =
            serde_json::from_slice(&body).context("extraction response is not valid JSON")?;
        Ok(Extraction { data })
    }
}

/// Cut `content` to at most `max_bytes`, backing off to a char boundary.
pub fn truncate_content(content: &str, max_bytes: usize) -> &str {
    if content.len() <= max_bytes {
        return content;
    }
    let mut end = max_bytes;
    while !content.is_char_boundary(end) {
        end -= 1;
    }
    &content[..end]
}
