//! Per-key circuit breakers.
//!
//! Tracks failure/success counters per key (normally the remote host) and
//! reports a key as open once its consecutive failures reach the threshold,
//! until the reset timeout has passed since the last failure. A single
//! success closes the circuit again.
//!
//! The registry is owned by one `RetryEngine`; there is no global instance.

mod entry;
mod key;
mod registry;
mod stats;

pub use entry::CircuitState;
pub use key::circuit_key_for_url;
pub use registry::CircuitRegistry;
pub use stats::{KeyStats, RunStatistics};
