//! # raft-log-storage
//!
//! why: provide durable persistence for the raft log using standard rust fs apis
//! relations: implements raft_log::LogStorage, handed to RaftLog::open
//! what: FileStorage implementation, InMemoryStorage for testing

use raft_log::{LogEntry, LogStorage, SnapshotMarker};
use serde::Serialize;
use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

// -- file storage implementation --

/// file-based storage implementation using std::fs
///
/// stores the log in a directory with:
/// - snapshot.json: the last compaction marker
/// - log.json: array of entries above the marker
pub struct FileStorage {
    /// directory path for storing state files
    dir: PathBuf,
}

impl FileStorage {
    /// create a new filestorage at the given directory
    /// creates the directory if it doesn't exist
    pub fn new(dir: impl Into<PathBuf>) -> io::Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// get the path to the snapshot marker file
    fn snapshot_path(&self) -> PathBuf {
        self.dir.join("snapshot.json")
    }

    /// get the path to the log file
    fn log_path(&self) -> PathBuf {
        self.dir.join("log.json")
    }

    /// atomic write: write to temp file then rename
    fn write_json<T: Serialize + ?Sized>(&self, path: PathBuf, value: &T) -> io::Result<()> {
        let json = serde_json::to_string_pretty(value)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

        let temp_path = path.with_extension("tmp");
        let mut file = File::create(&temp_path)?;
        file.write_all(json.as_bytes())?;
        file.sync_all()?;
        fs::rename(&temp_path, path)
    }

    fn write_log(&self, log: &[LogEntry]) -> io::Result<()> {
        self.write_json(self.log_path(), log)
    }
}

fn read_to_string(path: &Path) -> io::Result<Option<String>> {
    if !path.exists() {
        return Ok(None);
    }
    let mut file = File::open(path)?;
    let mut contents = String::new();
    file.read_to_string(&mut contents)?;
    Ok(Some(contents))
}

impl LogStorage for FileStorage {
    fn append_entries(&mut self, entries: &[LogEntry]) -> io::Result<()> {
        if entries.is_empty() {
            return Ok(());
        }

        // load existing log
        let mut log = self.load_log()?;

        // append new entries
        log.extend(entries.iter().cloned());

        // write entire log (simple approach - could optimize with append-only file)
        self.write_log(&log)
    }

    fn load_log(&self) -> io::Result<Vec<LogEntry>> {
        let Some(contents) = read_to_string(&self.log_path())? else {
            return Ok(Vec::new());
        };

        serde_json::from_str(&contents).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
    }

    fn truncate_log_from(&mut self, from_index: u64) -> io::Result<()> {
        let mut log = self.load_log()?;
        log.retain(|e| e.index < from_index);
        self.write_log(&log)
    }

    fn compact_log_through(&mut self, marker: SnapshotMarker) -> io::Result<()> {
        // marker first: a crash between the two writes leaves stale entries below
        // the marker, which are skipped when the log is opened
        self.write_json(self.snapshot_path(), &marker)?;

        let mut log = self.load_log()?;
        let before = log.len();
        log.retain(|e| e.index > marker.index);
        debug!(
            dir = %self.dir.display(),
            index = marker.index,
            removed = before - log.len(),
            "compacted persisted log"
        );
        self.write_log(&log)
    }

    fn load_snapshot_marker(&self) -> io::Result<SnapshotMarker> {
        let Some(contents) = read_to_string(&self.snapshot_path())? else {
            return Ok(SnapshotMarker::default()); // default for new nodes
        };

        serde_json::from_str(&contents).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
    }

    fn clear(&mut self) -> io::Result<()> {
        let _ = fs::remove_file(self.snapshot_path());
        let _ = fs::remove_file(self.log_path());
        Ok(())
    }
}

// -- in-memory storage implementation --

/// in-memory storage for testing
///
/// stores all state in memory, no persistence across restarts
#[derive(Debug, Default, Clone)]
pub struct InMemoryStorage {
    marker: SnapshotMarker,
    log: Vec<LogEntry>,
}

impl InMemoryStorage {
    /// create a new in-memory storage
    pub fn new() -> Self {
        Self::default()
    }

    /// seed storage with a marker and entries, as if written by an earlier run
    pub fn with_state(marker: SnapshotMarker, log: Vec<LogEntry>) -> Self {
        Self { marker, log }
    }
}

impl LogStorage for InMemoryStorage {
    fn append_entries(&mut self, entries: &[LogEntry]) -> io::Result<()> {
        self.log.extend(entries.iter().cloned());
        Ok(())
    }

    fn load_log(&self) -> io::Result<Vec<LogEntry>> {
        Ok(self.log.clone())
    }

    fn truncate_log_from(&mut self, from_index: u64) -> io::Result<()> {
        self.log.retain(|e| e.index < from_index);
        Ok(())
    }

    fn compact_log_through(&mut self, marker: SnapshotMarker) -> io::Result<()> {
        self.marker = marker;
        self.log.retain(|e| e.index > marker.index);
        Ok(())
    }

    fn load_snapshot_marker(&self) -> io::Result<SnapshotMarker> {
        Ok(self.marker)
    }

    fn clear(&mut self) -> io::Result<()> {
        self.marker = SnapshotMarker::default();
        self.log.clear();
        Ok(())
    }
}
