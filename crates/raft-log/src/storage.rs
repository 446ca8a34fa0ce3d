//! # storage
//!
//! why: let the log persist entries without knowing the on-disk format
//! relations: called by log.rs inside its critical section, implemented in raft-log-storage
//! what: LogStorage trait

use crate::{LogEntry, SnapshotMarker};
use std::io;

/// trait for durable storage of the log
///
/// this abstraction allows the same log to run on:
/// - a real filesystem
/// - memory (testing)
///
/// Every mutating call is made before the change becomes visible in memory;
/// if it fails the in-memory log is left untouched.
pub trait LogStorage: Send {
    /// append entries to the end of the persisted log
    fn append_entries(&mut self, entries: &[LogEntry]) -> io::Result<()>;

    /// load all persisted entries (for crash recovery)
    fn load_log(&self) -> io::Result<Vec<LogEntry>>;

    /// remove every entry with index >= from_index (conflict resolution)
    fn truncate_log_from(&mut self, from_index: u64) -> io::Result<()>;

    /// remove every entry with index <= marker.index and record the marker
    fn compact_log_through(&mut self, marker: SnapshotMarker) -> io::Result<()>;

    /// load the last recorded compaction marker, `(0, 0)` if none
    fn load_snapshot_marker(&self) -> io::Result<SnapshotMarker>;

    /// clear all persisted state (for testing)
    fn clear(&mut self) -> io::Result<()>;
}
