//! `harvest requeue` – put failed pages back in the queue.

use anyhow::Result;
use harvest_core::store::PageDb;

pub async fn run_requeue(db: &PageDb) -> Result<()> {
    let n = db.requeue_failed().await?;
    println!("Requeued {n} failed page(s)");
    Ok(())
}
