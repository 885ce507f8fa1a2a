//! Core library for the `harvest` page-acquisition pipeline.
//!
//! Failures are classified, retried with backoff, and gated per host by
//! circuit breakers; the batch coordinator runs work items through that
//! machinery in bounded concurrency windows.

pub mod batch;
pub mod circuit;
pub mod config;
pub mod logging;
pub mod pipeline;
pub mod retry;
pub mod store;
