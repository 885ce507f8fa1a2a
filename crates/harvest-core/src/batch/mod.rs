//! Batch coordinator.
//!
//! Drives a list of work items through the retry engine in fixed-size
//! concurrency windows: every item of a window runs at once, the whole window
//! settles before the next starts, successes are persisted as soon as they
//! land, and no single item failure stops the run.

mod job;
mod result;
mod run;

pub use job::{BatchJob, ResultStore};
pub use result::{BatchReport, WorkResult};
pub use run::{BatchCoordinator, PROCESSING_CONTEXT};
