//! `harvest run` – fetch and extract every page that is not done yet.

use anyhow::Result;
use harvest_core::batch::{BatchCoordinator, BatchReport};
use harvest_core::circuit::RunStatistics;
use harvest_core::config::{HarvestConfig, RetryOrder};
use harvest_core::pipeline::PagePipeline;
use harvest_core::retry::RetryEngine;
use harvest_core::store::{Extraction, PageDb, PageRecord};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Command-line overrides for one run.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub concurrency: Option<usize>,
    pub retry_order: Option<RetryOrder>,
    pub json: bool,
}

pub async fn run_batch(db: &PageDb, cfg: &HarvestConfig, opts: RunOptions) -> Result<()> {
    let mut cfg = cfg.clone();
    if let Some(n) = opts.concurrency {
        cfg.batch.concurrency = n;
    }
    if let Some(order) = opts.retry_order {
        cfg.batch.retry_order = order;
    }
    cfg.validate()?;

    let pipeline = Arc::new(PagePipeline::from_config(&cfg)?);
    let pages = db.pending_pages(cfg.batch.retry_order).await?;
    if pages.is_empty() {
        println!("No pending pages.");
        return Ok(());
    }

    let engine = Arc::new(RetryEngine::from_config(&cfg));
    let coordinator = BatchCoordinator::from_config(engine, &cfg.batch);

    let cancel = CancellationToken::new();
    let watcher = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                eprintln!("interrupt received; finishing up (in-flight pages fail fast)");
                tracing::info!("interrupt received; cancelling run");
                cancel.cancel();
            }
        })
    };

    let report = coordinator
        .run_with_cancel(pipeline, Arc::new(db.clone()), pages, cancel)
        .await;
    watcher.abort();

    if opts.json {
        println!("{}", serde_json::to_string_pretty(&summary_json(&report)?)?);
    } else {
        print_summary(&report);
    }
    Ok(())
}

fn summary_json(report: &BatchReport<PageRecord, Extraction>) -> Result<serde_json::Value> {
    let failures: Vec<_> = report
        .results
        .iter()
        .filter_map(|r| {
            r.error().map(|e| {
                serde_json::json!({
                    "id": r.item.id,
                    "url": r.item.url,
                    "kind": e.kind,
                    "attempt": e.attempt,
                    "retryable": e.retryable,
                    "message": e.message,
                })
            })
        })
        .collect();
    Ok(serde_json::json!({
        "processed": report.results.len(),
        "succeeded": report.succeeded(),
        "failed": report.failed(),
        "skipped_done": report.skipped_done,
        "cancelled": report.cancelled,
        "failures": failures,
        "circuits": serde_json::to_value(&report.stats)?,
    }))
}

fn print_summary(report: &BatchReport<PageRecord, Extraction>) {
    println!(
        "Processed {} page(s): {} succeeded, {} failed{}",
        report.results.len(),
        report.succeeded(),
        report.failed(),
        if report.cancelled { " (cancelled)" } else { "" }
    );
    for r in &report.results {
        if let Some(e) = r.error() {
            println!("  [{}] {} – {} (attempt {}): {}", r.item.id, r.item.url, e.kind, e.attempt, e.message);
        }
    }
    print_stats(&report.stats);
}

fn print_stats(stats: &RunStatistics) {
    println!();
    println!(
        "Circuits: {} key(s), {} open",
        stats.total_keys, stats.open_circuits
    );
    if stats.per_key.is_empty() {
        return;
    }
    println!("{:<32} {:>8} {:>9} {}", "KEY", "FAILURES", "SUCCESSES", "STATE");
    for k in &stats.per_key {
        println!(
            "{:<32} {:>8} {:>9} {}",
            k.key,
            k.failures,
            k.successes,
            if k.is_open { "open" } else { "closed" }
        );
    }
}
