//! Retry and backoff policy.
//!
//! This module encapsulates error classification (timeouts, connection
//! failures, malformed payloads, extraction-service statuses) and exponential
//! backoff so that the batch coordinator and ad-hoc callers share one policy.

mod classify;
mod error;
mod policy;
mod run;

pub use classify::{classify, ClassifyContext};
pub use error::{ClassifiedError, ErrorKind, Stage, StageError};
pub use policy::{RetryDecision, RetryPolicy};
pub use run::RetryEngine;

pub(crate) use error::unix_millis;
