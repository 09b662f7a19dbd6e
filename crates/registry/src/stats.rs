use serde::{Deserialize, Serialize};
use std::time::Instant;

/// Statistics about a full reload
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReloadStats {
    /// Number of discovered entity paths
    pub paths: usize,

    /// Number of entities in the resulting registry
    pub entities: usize,

    /// Paths that parsed fine but declare no entity
    pub skipped: usize,

    /// Failed extractions, as `"<path>: <error>"`
    pub failures: Vec<String>,

    /// Time taken in milliseconds
    pub time_ms: u64,
}

impl ReloadStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_failure(&mut self, failure: String) {
        self.failures.push(failure);
    }
}

/// Statistics about an incremental update
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateStats {
    /// Number of entity paths currently discovered
    pub paths: usize,

    /// Prior entities no longer present (removed path or displaced by a new entity)
    pub unloaded_count: usize,

    /// Entities inserted from freshly extracted paths
    pub loaded_count: usize,

    /// Prior entities carried over without re-extraction
    pub retained_count: usize,

    /// Fresh paths that declare no entity
    pub skipped: usize,

    /// Failed extractions, as `"<path>: <error>"`
    pub failures: Vec<String>,

    /// Time taken in milliseconds
    pub time_ms: u64,
}

impl UpdateStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_failure(&mut self, failure: String) {
        self.failures.push(failure);
    }
}

/// Milliseconds since `start`, saturating
pub(crate) fn elapsed_ms(start: Instant) -> u64 {
    u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX)
}
