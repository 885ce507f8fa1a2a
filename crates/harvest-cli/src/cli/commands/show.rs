//! `harvest show <id>` – one page with its latest extraction.

use anyhow::{bail, Result};
use harvest_core::store::PageDb;

pub async fn run_show(db: &PageDb, id: i64) -> Result<()> {
    let Some(page) = db.get_page(id).await? else {
        bail!("no page with id {id}");
    };

    println!("Page {}: {}", page.id, page.url);
    println!("  state:     {}", page.state);
    println!("  attempts:  {}", page.attempts);
    if let Some(at) = page.last_attempt_at {
        println!("  last try:  {at} (unix)");
    }
    if let Some(err) = &page.last_error {
        println!("  error:     {err}");
    }

    match db.latest_extraction(id).await? {
        Some(extraction) => {
            println!("  extraction {} (saved {} unix):", extraction.id, extraction.created_at);
            println!("{}", serde_json::to_string_pretty(&extraction.data)?);
        }
        None => println!("  no extraction saved"),
    }
    Ok(())
}
