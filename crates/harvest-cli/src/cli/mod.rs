//! CLI for the harvest page-acquisition pipeline.

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use harvest_core::config::{self, RetryOrder};
use harvest_core::store::PageDb;
use std::path::PathBuf;

use commands::{run_add, run_batch, run_import, run_remove, run_requeue, run_show, run_status, RunOptions};

/// Top-level CLI for harvest.
#[derive(Debug, Parser)]
#[command(name = "harvest")]
#[command(about = "harvest: resilient batch page fetching and extraction", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: CliCommand,
}

/// `--retry-order` values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum RetryOrderArg {
    /// Pages never attempted before run ahead of earlier failures.
    NeverAttemptedFirst,
    /// Earlier failures run first.
    NeverAttemptedLast,
}

impl From<RetryOrderArg> for RetryOrder {
    fn from(arg: RetryOrderArg) -> Self {
        match arg {
            RetryOrderArg::NeverAttemptedFirst => RetryOrder::NeverAttemptedFirst,
            RetryOrderArg::NeverAttemptedLast => RetryOrder::NeverAttemptedLast,
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Queue a page for acquisition.
    Add {
        /// HTTP/HTTPS URL of the page.
        url: String,
    },

    /// Queue every URL in a file (one per line; blank lines and `#` comments are skipped).
    Import {
        /// Path to the URL list.
        path: PathBuf,
    },

    /// Fetch and extract every page that is not done yet.
    Run {
        /// Pages processed concurrently per window (overrides batch.concurrency).
        #[arg(long, value_name = "N")]
        concurrency: Option<usize>,
        /// Order for pages that still need work (overrides batch.retry_order).
        #[arg(long, value_enum, value_name = "ORDER")]
        retry_order: Option<RetryOrderArg>,
        /// Print the run summary as JSON instead of a table.
        #[arg(long)]
        json: bool,
    },

    /// Show all pages and their state.
    Status,

    /// Show one page and its latest extraction.
    Show {
        /// Page identifier.
        id: i64,
    },

    /// Put failed pages back in the queue.
    Requeue,

    /// Remove a page and its extractions.
    Remove {
        /// Page identifier.
        id: i64,
    },
}

impl CliCommand {
    pub async fn run_from_args() -> Result<()> {
        let cli = Cli::parse();
        let cfg = config::load_or_init()?;
        tracing::debug!("loaded config: {:?}", cfg);
        let db = PageDb::open_default().await?;

        match cli.command {
            CliCommand::Add { url } => run_add(&db, &url).await?,
            CliCommand::Import { path } => run_import(&db, &path).await?,
            CliCommand::Run {
                concurrency,
                retry_order,
                json,
            } => {
                let opts = RunOptions {
                    concurrency,
                    retry_order: retry_order.map(Into::into),
                    json,
                };
                run_batch(&db, &cfg, opts).await?;
            }
            CliCommand::Status => run_status(&db).await?,
            CliCommand::Show { id } => run_show(&db, id).await?,
            CliCommand::Requeue => run_requeue(&db).await?,
            CliCommand::Remove { id } => run_remove(&db, id).await?,
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests;
