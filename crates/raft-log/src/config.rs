//! # config
//!
//! why: collect the tunables of replication batching and compaction in one place
//! relations: read by replication.rs (batch size) and log.rs (compaction policy)
//! what: LogConfig with defaults and json loading

use serde::{Deserialize, Serialize};

/// Configuration for a replicated log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Upper bound on entries shipped in one AppendEntries request
    pub max_entries_per_request: usize,
    /// Entries kept below the commit index when the log is compacted
    pub entries_retained_after_snapshot: u64,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            max_entries_per_request: 2000,
            entries_retained_after_snapshot: 200,
        }
    }
}

impl LogConfig {
    /// Parse a config from json, missing fields take their defaults
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}
