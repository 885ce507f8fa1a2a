//! Key → breaker state map with its two mutators and one query.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use tokio::time::Instant;

use crate::config::CircuitConfig;

use super::entry::CircuitState;
use super::stats::{KeyStats, RunStatistics};

/// Registry of per-key circuit breakers sharing one threshold and reset timeout.
///
/// Counters are updated under a mutex because coordinator workers run on the
/// multi-threaded runtime. The lock is never held across an await.
#[derive(Debug)]
pub struct CircuitRegistry {
    states: Mutex<HashMap<String, CircuitState>>,
    failure_threshold: u32,
    reset_timeout: Duration,
}

impl CircuitRegistry {
    pub fn new(failure_threshold: u32, reset_timeout: Duration) -> Self {
        Self {
            states: Mutex::new(HashMap::new()),
            failure_threshold: failure_threshold.max(1),
            reset_timeout,
        }
    }

    pub fn from_config(cfg: &CircuitConfig) -> Self {
        Self::new(
            cfg.failure_threshold,
            Duration::from_secs_f64(cfg.reset_timeout_secs.max(0.0)),
        )
    }

    pub fn failure_threshold(&self) -> u32 {
        self.failure_threshold
    }

    pub fn reset_timeout(&self) -> Duration {
        self.reset_timeout
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, CircuitState>> {
        // Counters stay consistent even if a holder panicked; keep going.
        self.states.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// True while `key` has at least `failure_threshold` failures since its
    /// last success and the last failure is younger than the reset timeout.
    pub fn is_open(&self, key: &str) -> bool {
        let mut states = self.lock();
        let state = states.entry(key.to_string()).or_default();
        state.is_open(self.failure_threshold, self.reset_timeout, Instant::now())
    }

    /// Count a success and close the circuit.
    pub fn record_success(&self, key: &str) {
        let mut states = self.lock();
        let state = states.entry(key.to_string()).or_default();
        state.success_count = state.success_count.saturating_add(1);
        state.failure_count = 0;
    }

    /// Count a failure at the current time. Returns true when this failure
    /// moved the circuit from closed to open, including a reopen after the
    /// reset timeout.
    pub fn record_failure(&self, key: &str) -> bool {
        let now = Instant::now();
        let mut states = self.lock();
        let state = states.entry(key.to_string()).or_default();
        let was_open = state.is_open(self.failure_threshold, self.reset_timeout, now);
        state.failure_count = state.failure_count.saturating_add(1);
        state.last_failure_at = Some(now);
        let opened = !was_open && state.is_open(self.failure_threshold, self.reset_timeout, now);
        if opened {
            tracing::warn!(
                key,
                failures = state.failure_count,
                reset_timeout_secs = self.reset_timeout.as_secs_f64(),
                "circuit opened"
            );
        }
        opened
    }

    /// Failures recorded for `key` since its last success (0 for unknown keys).
    pub fn failure_count(&self, key: &str) -> u32 {
        self.lock().get(key).map(|s| s.failure_count).unwrap_or(0)
    }

    /// Snapshot of one key's state, if it has been referenced.
    pub fn state(&self, key: &str) -> Option<CircuitState> {
        self.lock().get(key).cloned()
    }

    /// Aggregate statistics over every key referenced so far.
    pub fn stats(&self) -> RunStatistics {
        let now = Instant::now();
        let states = self.lock();
        let per_key = states
            .iter()
            .map(|(key, s)| KeyStats {
                key: key.clone(),
                failures: s.failure_count,
                successes: s.success_count,
                is_open: s.is_open(self.failure_threshold, self.reset_timeout, now),
            })
            .collect();
        RunStatistics::from_keys(per_key)
    }
}

impl Default for CircuitRegistry {
    fn default() -> Self {
        Self::from_config(&CircuitConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> CircuitRegistry {
        CircuitRegistry::new(5, Duration::from_secs(60))
    }

    #[test]
    fn unknown_key_is_closed_and_created_lazily() {
        let r = registry();
        assert!(r.state("a.example").is_none());
        assert!(!r.is_open("a.example"));
        assert_eq!(r.state("a.example"), Some(CircuitState::default()));
    }

    #[test]
    fn opens_at_threshold() {
        let r = registry();
        for _ in 0..4 {
            assert!(!r.record_failure("a.example"));
        }
        assert!(!r.is_open("a.example"));
        assert!(r.record_failure("a.example"));
        assert!(r.is_open("a.example"));
        assert!(!r.is_open("b.example"));
        // Already open: further failures are not a new transition.
        assert!(!r.record_failure("a.example"));
    }

    #[test]
    fn success_resets_failures_regardless_of_count() {
        let r = registry();
        for _ in 0..12 {
            r.record_failure("a.example");
        }
        assert!(r.is_open("a.example"));
        r.record_success("a.example");
        assert_eq!(r.failure_count("a.example"), 0);
        assert!(!r.is_open("a.example"));
        let state = r.state("a.example").unwrap();
        assert_eq!(state.success_count, 1);
        assert!(state.last_failure_at.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn closes_again_after_reset_timeout() {
        let r = registry();
        for _ in 0..5 {
            r.record_failure("a.example");
        }
        assert!(r.is_open("a.example"));

        tokio::time::advance(Duration::from_secs(59)).await;
        assert!(r.is_open("a.example"));

        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(!r.is_open("a.example"));
        // Failure count is untouched; only time closed it.
        assert_eq!(r.failure_count("a.example"), 5);

        // One more failure re-opens it immediately, and is reported as opening it.
        assert!(r.record_failure("a.example"));
        assert!(r.is_open("a.example"));
    }

    #[test]
    fn stats_aggregate_all_keys() {
        let r = registry();
        for _ in 0..5 {
            r.record_failure("b.example");
        }
        r.record_success("a.example");
        r.record_failure("c.example");
        let stats = r.stats();
        assert_eq!(stats.total_keys, 3);
        assert_eq!(stats.open_circuits, 1);
        let keys: Vec<_> = stats.per_key.iter().map(|k| k.key.as_str()).collect();
        assert_eq!(keys, ["a.example", "b.example", "c.example"]);
        let b = stats.get("b.example").unwrap();
        assert_eq!((b.failures, b.successes, b.is_open), (5, 0, true));
    }

    #[test]
    fn concurrent_failures_are_not_lost() {
        let r = std::sync::Arc::new(CircuitRegistry::new(1000, Duration::from_secs(60)));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let r = std::sync::Arc::clone(&r);
                std::thread::spawn(move || {
                    for _ in 0..100 {
                        r.record_failure("a.example");
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(r.failure_count("a.example"), 800);
    }
}
