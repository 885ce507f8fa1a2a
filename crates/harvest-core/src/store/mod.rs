//! Persistent page database (SQLite via sqlx).
//!
//! Stores the URLs queued for acquisition, their attempt bookkeeping, and the
//! extraction results saved for them.

mod db;
mod pages;
mod results;
mod types;

pub use db::PageDb;
pub use types::*;
