//! Per-key breaker state.

use tokio::time::Instant;

/// Counters for one key. Created lazily with zero counts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CircuitState {
    /// Failures since the last success.
    pub failure_count: u32,
    pub success_count: u32,
    pub last_failure_at: Option<Instant>,
}

impl CircuitState {
    /// Open iff the threshold is reached and the reset timeout has not elapsed
    /// since the last failure.
    pub fn is_open(&self, threshold: u32, reset_timeout: std::time::Duration, now: Instant) -> bool {
        if self.failure_count < threshold {
            return false;
        }
        match self.last_failure_at {
            Some(at) => now.saturating_duration_since(at) < reset_timeout,
            None => false,
        }
    }
}
