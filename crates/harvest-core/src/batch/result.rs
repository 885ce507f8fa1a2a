use crate::circuit::RunStatistics;
use crate::retry::{unix_millis, ClassifiedError};

/// Outcome of one item in one run. Success and error are exclusive by construction.
#[derive(Debug, Clone)]
pub struct WorkResult<I, T> {
    pub item: I,
    pub outcome: Result<T, ClassifiedError>,
    /// Unix milliseconds when the item reached its terminal state.
    pub timestamp: i64,
}

impl<I, T> WorkResult<I, T> {
    pub fn new(item: I, outcome: Result<T, ClassifiedError>) -> Self {
        Self {
            item,
            outcome,
            timestamp: unix_millis(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.outcome.is_ok()
    }

    pub fn data(&self) -> Option<&T> {
        self.outcome.as_ref().ok()
    }

    pub fn error(&self) -> Option<&ClassifiedError> {
        self.outcome.as_ref().err()
    }
}

/// Everything a run produced.
#[derive(Debug)]
pub struct BatchReport<I, T> {
    /// One entry per processed item, in window order.
    pub results: Vec<WorkResult<I, T>>,
    pub stats: RunStatistics,
    /// Items skipped because the store already had them done.
    pub skipped_done: usize,
    /// The run was cut short by a cancellation signal.
    pub cancelled: bool,
}

impl<I, T> BatchReport<I, T> {
    pub fn succeeded(&self) -> usize {
        self.results.iter().filter(|r| r.is_success()).count()
    }

    pub fn failed(&self) -> usize {
        self.results.len() - self.succeeded()
    }
}
