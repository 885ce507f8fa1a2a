//! `harvest import <file>` – queue every URL listed in a file.

use anyhow::{Context, Result};
use harvest_core::pipeline::validate_page_url;
use harvest_core::store::PageDb;
use std::path::Path;

/// URLs from a list file: one per line, blank lines and `#` comments skipped.
pub(crate) fn parse_url_list(text: &str) -> Vec<&str> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .collect()
}

pub async fn run_import(db: &PageDb, path: &Path) -> Result<()> {
    let text = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("reading {}", path.display()))?;

    let mut added = 0usize;
    let mut rejected = 0usize;
    for url in parse_url_list(&text) {
        if let Err(e) = validate_page_url(url) {
            tracing::warn!(url, "skipping: {e:#}");
            eprintln!("skipped {url}: {e:#}");
            rejected += 1;
            continue;
        }
        db.add_page(url).await?;
        added += 1;
    }

    println!("Imported {added} URL(s) from {} ({rejected} skipped)", path.display());
    Ok(())
}
