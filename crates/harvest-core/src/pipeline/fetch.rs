//! Page fetch: a plain libcurl GET that returns the body as text.

use anyhow::{Context, Result};
use std::time::Duration;

use crate::config::FetchConfig;
use crate::retry::{Stage, StageError};

/// Fetch `url` and return its body.
///
/// Follows redirects. Transport failures keep the underlying `curl::Error`
/// in the chain so they classify as network or timeout errors.
/// Runs in the current thread; call from `spawn_blocking` if used from async code.
pub fn fetch_page(url: &str, cfg: &FetchConfig) -> Result<String> {
    let mut body: Vec<u8> = Vec::new();

    let mut easy = curl::easy::Easy::new();
    easy.url(url).context("invalid URL")?;
    easy.get(true)?;
    easy.follow_location(true)?;
    easy.max_redirections(10)?;
    easy.connect_timeout(Duration::from_secs(cfg.connect_timeout_secs))?;
    easy.timeout(Duration::from_secs(cfg.timeout_secs))?;
    easy.useragent(&cfg.user_agent)?;
    easy.accept_encoding("")?;

    {
        let mut transfer = easy.transfer();
        transfer.write_function(|data| {
            body.extend_from_slice(data);
            Ok(data.len())
        })?;
        transfer
            .perform()
            .with_context(|| format!("GET {url} failed"))?;
    }

    let code = easy.response_code().context("no response code")?;
    if !(200..300).contains(&code) {
        let code = u16::try_from(code).unwrap_or(0);
        return Err(StageError::status(Stage::Fetch, code, format!("GET {url}")).into());
    }
    if body.is_empty() {
        return Err(StageError::other(Stage::Fetch, format!("GET {url} returned an empty body")).into());
    }

    Ok(String::from_utf8_lossy(&body).into_owned())
}
