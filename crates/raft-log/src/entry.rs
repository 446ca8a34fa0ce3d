//! # entry
//!
//! why: define the unit of replication that the log stores and ships to followers
//! relations: held by log.rs, carried by message.rs, persisted via LogStorage
//! what: LogEntry struct, SnapshotMarker for the compaction boundary

use serde::{Deserialize, Serialize};
use std::fmt;

/// A single entry in the replicated log
///
/// Entries are immutable once appended; the log only ever clones them out.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    /// The term when this entry was created
    pub term: u64,
    /// The index of this entry in the log (1-indexed)
    pub index: u64,
    /// The command to be applied to the state machine
    pub command: Vec<u8>,
}

impl LogEntry {
    /// Create a new log entry
    pub fn new(term: u64, index: u64, command: Vec<u8>) -> Self {
        Self { term, index, command }
    }
}

// commands can be large, print their size instead of the bytes
impl fmt::Debug for LogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LogEntry")
            .field("term", &self.term)
            .field("index", &self.index)
            .field("command_len", &self.command.len())
            .finish()
    }
}

/// The `(index, term)` of the last entry discarded by compaction.
///
/// `(0, 0)` means the log was never compacted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotMarker {
    pub index: u64,
    pub term: u64,
}

impl SnapshotMarker {
    pub fn new(index: u64, term: u64) -> Self {
        Self { index, term }
    }
}
