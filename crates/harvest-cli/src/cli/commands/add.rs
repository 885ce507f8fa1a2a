//! `harvest add <url>` – queue a page.

use anyhow::Result;
use harvest_core::pipeline::validate_page_url;
use harvest_core::store::PageDb;

pub async fn run_add(db: &PageDb, url: &str) -> Result<()> {
    validate_page_url(url)?;
    let id = db.add_page(url).await?;
    println!("Added page {id}: {url}");
    Ok(())
}
