//! `harvest status` – show all pages.

use anyhow::Result;
use harvest_core::store::PageDb;

pub async fn run_status(db: &PageDb) -> Result<()> {
    let pages = db.list_pages().await?;
    if pages.is_empty() {
        println!("No pages in database.");
        return Ok(());
    }

    println!("{:<6} {:<8} {:<9} {}", "ID", "STATE", "ATTEMPTS", "URL");
    for p in &pages {
        println!("{:<6} {:<8} {:<9} {}", p.id, p.state, p.attempts, p.url);
        if let Some(err) = &p.last_error {
            println!("{:<6} last error: {}", "", err);
        }
    }
    Ok(())
}
