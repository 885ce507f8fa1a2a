use serde::Serialize;

/// Circuit counters for one key at the time statistics were taken.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KeyStats {
    pub key: String,
    pub failures: u32,
    pub successes: u32,
    pub is_open: bool,
}

/// Read-only view over every breaker in a registry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunStatistics {
    /// Sorted by key.
    pub per_key: Vec<KeyStats>,
    pub total_keys: usize,
    pub open_circuits: usize,
}

impl RunStatistics {
    pub(super) fn from_keys(mut per_key: Vec<KeyStats>) -> Self {
        per_key.sort_by(|a, b| a.key.cmp(&b.key));
        let open_circuits = per_key.iter().filter(|k| k.is_open).count();
        Self {
            total_keys: per_key.len(),
            open_circuits,
            per_key,
        }
    }

    pub fn get(&self, key: &str) -> Option<&KeyStats> {
        self.per_key.iter().find(|k| k.key == key)
    }
}
