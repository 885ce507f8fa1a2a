//! `harvest remove <id>` – remove a page and its extractions.

use anyhow::{bail, Result};
use harvest_core::store::PageDb;

pub async fn run_remove(db: &PageDb, id: i64) -> Result<()> {
    if !db.remove_page(id).await? {
        bail!("no page with id {id}");
    }
    println!("Removed page {id}");
    Ok(())
}
