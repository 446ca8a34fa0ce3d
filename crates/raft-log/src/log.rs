//! # log
//!
//! why: manage the append-only log of commands that raft replicates, including the
//! compacted prefix that a snapshot has replaced
//! relations: replication.rs reads it for followers, state_machine.rs consumes commits,
//! storage.rs persists it
//! what: RaftLog, EntriesAfter, index arithmetic for append/commit/compact/retrieve
//!
//! All state lives behind one mutex and every public method takes it exactly once,
//! so no caller ever sees a bounds check and a read taken from different instants.

use crate::config::LogConfig;
use crate::error::{LogError, Result};
use crate::state_machine::StateMachine;
use crate::storage::LogStorage;
use crate::{LogEntry, SnapshotMarker};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::fmt;
use std::io;
use tracing::{debug, info, trace, warn};

/// A successful answer to [`RaftLog::get_entries_after`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntriesAfter {
    /// entries strictly after the requested index, in increasing index order
    pub entries: Vec<LogEntry>,
    /// term recorded at the requested index, for the log-matching check
    pub prev_log_term: u64,
}

/// In-memory replicated log with prefix compaction.
///
/// Holds the entries in `(start_index, current_index]`. Entries at or below
/// `start_index` have been folded into a snapshot and only their marker survives.
pub struct RaftLog {
    config: LogConfig,
    state: Mutex<LogState>,
}

struct LogState {
    start_index: u64,
    start_term: u64,
    entries: VecDeque<LogEntry>,
    commit_index: u64,
    state_machine: Box<dyn StateMachine>,
    storage: Option<Box<dyn LogStorage>>,
}

impl LogState {
    fn current_index(&self) -> u64 {
        self.start_index + self.entries.len() as u64
    }

    /// position in `entries` of the entry with this index, if held
    fn offset_of(&self, index: u64) -> Option<usize> {
        let distance = index.checked_sub(self.start_index)?.checked_sub(1)?;
        let offset = usize::try_from(distance).ok()?;
        (offset < self.entries.len()).then_some(offset)
    }

    fn term_at(&self, index: u64) -> Option<u64> {
        if index == self.start_index {
            return Some(self.start_term);
        }
        self.offset_of(index)
            .and_then(|offset| self.entries.get(offset))
            .map(|entry| entry.term)
    }

    fn persist<F>(&mut self, op: F) -> Result<()>
    where
        F: FnOnce(&mut dyn LogStorage) -> io::Result<()>,
    {
        if let Some(storage) = self.storage.as_mut() {
            op(&mut **storage).map_err(|e| {
                warn!(error = %e, "log storage operation failed");
                LogError::Storage(e)
            })?;
        }
        Ok(())
    }

    fn apply_through(&mut self, index: u64) -> Result<()> {
        while self.commit_index < index {
            let next = self.commit_index + 1;
            let Some(entry) = self.offset_of(next).and_then(|o| self.entries.get(o)) else {
                return Err(LogError::CommitIndexBeyondLog {
                    current_index: self.current_index(),
                    requested: index,
                });
            };

            if let Err(source) = self.state_machine.apply(entry) {
                warn!(index = next, error = %source, "state machine failed to apply entry");
                return Err(LogError::ApplyFailure { index: next, source });
            }
            self.commit_index = next;
        }
        Ok(())
    }

    fn compact(&mut self, marker: SnapshotMarker) -> Result<()> {
        if marker.index < self.start_index {
            return Err(LogError::CompactionRegression {
                start_index: self.start_index,
                requested: marker.index,
            });
        }
        if marker.index > self.commit_index {
            return Err(LogError::CompactionOfUncommitted {
                commit_index: self.commit_index,
                requested: marker.index,
            });
        }

        self.persist(|s| s.compact_log_through(marker))?;

        let discard = usize::try_from(marker.index - self.start_index)
            .unwrap_or(usize::MAX)
            .min(self.entries.len());
        self.entries.drain(..discard);
        self.start_index = marker.index;
        self.start_term = marker.term;

        info!(
            start_index = self.start_index,
            start_term = self.start_term,
            retained = self.entries.len(),
            "compacted log"
        );
        Ok(())
    }
}

impl RaftLog {
    /// Create an empty, memory-only log
    pub fn new(config: LogConfig, state_machine: impl StateMachine + 'static) -> Self {
        Self::from_state(
            config,
            LogState {
                start_index: 0,
                start_term: 0,
                entries: VecDeque::new(),
                commit_index: 0,
                state_machine: Box::new(state_machine),
                storage: None,
            },
        )
    }

    /// Rebuild a log from persisted state.
    ///
    /// Entries at or below the persisted snapshot marker are skipped; the rest must
    /// be contiguous. Nothing above the marker is considered committed until the
    /// caller commits it again.
    pub fn open(
        config: LogConfig,
        state_machine: impl StateMachine + 'static,
        storage: impl LogStorage + 'static,
    ) -> Result<Self> {
        let marker = storage.load_snapshot_marker()?;
        let persisted = storage.load_log()?;

        let mut entries = VecDeque::with_capacity(persisted.len());
        let mut expected = marker.index.saturating_add(1);
        for entry in persisted {
            if entry.index <= marker.index {
                continue;
            }
            if entry.index != expected {
                return Err(LogError::CorruptLog {
                    expected,
                    found: entry.index,
                });
            }
            expected = expected.saturating_add(1);
            entries.push_back(entry);
        }

        info!(
            start_index = marker.index,
            start_term = marker.term,
            entries = entries.len(),
            "opened log"
        );

        Ok(Self::from_state(
            config,
            LogState {
                start_index: marker.index,
                start_term: marker.term,
                entries,
                commit_index: marker.index,
                state_machine: Box::new(state_machine),
                storage: Some(Box::new(storage)),
            },
        ))
    }

    fn from_state(config: LogConfig, state: LogState) -> Self {
        Self {
            config,
            state: Mutex::new(state),
        }
    }

    pub fn config(&self) -> &LogConfig {
        &self.config
    }

    // -- append --

    /// Append the entry that directly follows the current end of the log
    pub fn append_entry(&self, entry: LogEntry) -> Result<()> {
        let mut state = self.state.lock();

        let expected = state.current_index().checked_add(1);
        if expected != Some(entry.index) {
            return Err(LogError::InvalidAppendIndex {
                expected: expected.unwrap_or(u64::MAX),
                found: entry.index,
            });
        }

        state.persist(|s| s.append_entries(std::slice::from_ref(&entry)))?;
        trace!(index = entry.index, term = entry.term, "appended entry");
        state.entries.push_back(entry);
        Ok(())
    }

    /// Append a contiguous batch; either all entries become visible or none do
    pub fn append_entries(&self, entries: Vec<LogEntry>) -> Result<()> {
        if entries.is_empty() {
            return Ok(());
        }
        let mut state = self.state.lock();

        let mut expected = state.current_index().checked_add(1);
        for entry in &entries {
            if expected != Some(entry.index) {
                return Err(LogError::InvalidAppendIndex {
                    expected: expected.unwrap_or(u64::MAX),
                    found: entry.index,
                });
            }
            expected = entry.index.checked_add(1);
        }

        state.persist(|s| s.append_entries(&entries))?;
        debug!(
            first = ?entries.first().map(|e| e.index),
            last = ?entries.last().map(|e| e.index),
            "appended entries"
        );
        state.entries.extend(entries);
        Ok(())
    }

    // -- commit / apply --

    /// Advance the commit index, applying every newly committed entry in order.
    ///
    /// If the state machine rejects an entry the commit index stops just before it
    /// and the same call can be retried.
    pub fn set_commit_index(&self, index: u64) -> Result<()> {
        let mut state = self.state.lock();

        if index < state.commit_index {
            return Err(LogError::CommitIndexRegression {
                commit_index: state.commit_index,
                requested: index,
            });
        }
        let current_index = state.current_index();
        if index > current_index {
            return Err(LogError::CommitIndexBeyondLog {
                current_index,
                requested: index,
            });
        }

        let previous = state.commit_index;
        let result = state.apply_through(index);
        if state.commit_index > previous {
            debug!(from = previous, to = state.commit_index, "advanced commit index");
        }
        result
    }

    pub fn commit_index(&self) -> u64 {
        self.state.lock().commit_index
    }

    /// index and term of the last committed entry
    pub fn commit_info(&self) -> (u64, u64) {
        let state = self.state.lock();
        let term = state.term_at(state.commit_index).unwrap_or(state.start_term);
        (state.commit_index, term)
    }

    // -- compaction --

    /// Discard every entry up to and including `index`, which a snapshot now covers
    pub fn compact(&self, index: u64, term: u64) -> Result<()> {
        self.state.lock().compact(SnapshotMarker::new(index, term))
    }

    /// Compact so that `retain` committed entries stay available for replication.
    ///
    /// Returns the new marker, or `None` if there is nothing worth discarding.
    pub fn compact_retaining(&self, retain: u64) -> Result<Option<SnapshotMarker>> {
        let mut state = self.state.lock();

        let boundary = state.commit_index.saturating_sub(retain);
        if boundary <= state.start_index {
            return Ok(None);
        }
        let Some(term) = state.term_at(boundary) else {
            return Ok(None);
        };

        let marker = SnapshotMarker::new(boundary, term);
        state.compact(marker)?;
        Ok(Some(marker))
    }

    /// Compact according to `entries_retained_after_snapshot`
    pub fn maybe_compact(&self) -> Result<Option<SnapshotMarker>> {
        self.compact_retaining(self.config.entries_retained_after_snapshot)
    }

    // -- retrieval --

    /// Entries after `index`, at most `max_count` of them, plus the term at `index`.
    ///
    /// Returns `None` when the log cannot serve the request incrementally: either
    /// `index` was compacted away or it lies beyond the end of the log (a stale
    /// `prev_log_index` observed before a truncation). Both mean the caller must
    /// fall back to a snapshot or refresh its index.
    pub fn get_entries_after(&self, index: u64, max_count: usize) -> Option<EntriesAfter> {
        let state = self.state.lock();

        if index < state.start_index {
            debug!(index, start_index = state.start_index, "index already compacted");
            return None;
        }
        let current_index = state.current_index();
        if index > current_index {
            debug!(index, current_index, "index is beyond end of log");
            return None;
        }

        // start_index <= index <= current_index, so skip <= entries.len()
        let skip = usize::try_from(index - state.start_index).ok()?;
        let prev_log_term = match skip.checked_sub(1) {
            None => state.start_term,
            Some(offset) => state.entries.get(offset)?.term,
        };

        let end = skip.saturating_add(max_count).min(state.entries.len());
        let entries = state.entries.range(skip..end).cloned().collect();

        Some(EntriesAfter {
            entries,
            prev_log_term,
        })
    }

    pub fn start_index(&self) -> u64 {
        self.state.lock().start_index
    }

    pub fn start_term(&self) -> u64 {
        self.state.lock().start_term
    }

    pub fn snapshot_marker(&self) -> SnapshotMarker {
        let state = self.state.lock();
        SnapshotMarker::new(state.start_index, state.start_term)
    }

    pub fn current_index(&self) -> u64 {
        self.state.lock().current_index()
    }

    /// term of the last entry in the log
    pub fn current_term(&self) -> u64 {
        self.last_info().1
    }

    /// index and term of the last entry in the log
    pub fn last_info(&self) -> (u64, u64) {
        let state = self.state.lock();
        match state.entries.back() {
            Some(entry) => (entry.index, entry.term),
            None => (state.start_index, state.start_term),
        }
    }

    /// term of the entry at `index`, including the snapshot marker itself
    pub fn term_at(&self, index: u64) -> Option<u64> {
        self.state.lock().term_at(index)
    }

    pub fn entry(&self, index: u64) -> Option<LogEntry> {
        let state = self.state.lock();
        state
            .offset_of(index)
            .and_then(|offset| state.entries.get(offset))
            .cloned()
    }

    /// whether the log holds an entry with this index and term
    pub fn contains_entry(&self, index: u64, term: u64) -> bool {
        let state = self.state.lock();
        state
            .offset_of(index)
            .and_then(|offset| state.entries.get(offset))
            .is_some_and(|entry| entry.term == term)
    }

    /// number of entries currently held (not counting the compacted prefix)
    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.lock().entries.is_empty()
    }

    // -- follower-side mutations --

    /// Drop every uncommitted entry after `index`, checking that `index` has `term`.
    ///
    /// Used when a follower's suffix conflicts with the leader.
    pub fn truncate(&self, index: u64, term: u64) -> Result<()> {
        let mut state = self.state.lock();

        if index < state.commit_index {
            return Err(LogError::TruncateCommitted {
                commit_index: state.commit_index,
                requested: index,
            });
        }
        let current_index = state.current_index();
        if index > current_index {
            return Err(LogError::TruncateBeyondLog {
                current_index,
                requested: index,
            });
        }

        if index != state.start_index {
            let found = state.term_at(index).unwrap_or(0);
            if found != term {
                return Err(LogError::TruncateTermMismatch {
                    index,
                    expected: term,
                    found,
                });
            }
        }
        if index == current_index {
            return Ok(());
        }

        state.persist(|s| s.truncate_log_from(index.saturating_add(1)))?;
        let keep = usize::try_from(index - state.start_index).unwrap_or(usize::MAX);
        state.entries.truncate(keep);

        info!(index, dropped = current_index - index, "truncated log");
        Ok(())
    }

    /// Replace the log with a snapshot received from the leader.
    ///
    /// If the log already holds the entry the snapshot ends at, the entries after it
    /// are kept; otherwise the whole log is discarded. A snapshot older than the
    /// current marker is already covered and is accepted without changes.
    ///
    /// When the snapshot moves the commit index forward the state machine is asked
    /// to restore from it first; a failed restore leaves the log untouched.
    pub fn install_snapshot(&self, index: u64, term: u64) -> Result<()> {
        let mut state = self.state.lock();
        let marker = SnapshotMarker::new(index, term);

        if index < state.start_index {
            debug!(index, start_index = state.start_index, "snapshot already covered");
            return Ok(());
        }

        let keep_suffix = state.term_at(index) == Some(term);
        if !keep_suffix && state.commit_index > index {
            return Err(LogError::SnapshotConflictsWithCommitted {
                index,
                commit_index: state.commit_index,
            });
        }

        if index > state.commit_index {
            if let Err(source) = state.state_machine.restore(marker) {
                warn!(index, error = %source, "state machine failed to restore snapshot");
                return Err(LogError::ApplyFailure { index, source });
            }
        }

        if keep_suffix {
            state.persist(|s| s.compact_log_through(marker))?;
            let discard = usize::try_from(index - state.start_index)
                .unwrap_or(usize::MAX)
                .min(state.entries.len());
            state.entries.drain(..discard);
        } else {
            state.persist(|s| {
                s.truncate_log_from(0)?;
                s.compact_log_through(marker)
            })?;
            state.entries.clear();
        }
        state.start_index = index;
        state.start_term = term;
        state.commit_index = state.commit_index.max(index);

        info!(
            index,
            term,
            retained = state.entries.len(),
            "installed snapshot"
        );
        Ok(())
    }
}

impl fmt::Debug for RaftLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = f.debug_struct("RaftLog");
        out.field("config", &self.config);
        // the state machine may hold the lock while formatting
        match self.state.try_lock() {
            Some(state) => out
                .field("start_index", &state.start_index)
                .field("start_term", &state.start_term)
                .field("current_index", &state.current_index())
                .field("commit_index", &state.commit_index)
                .finish(),
            None => out.finish_non_exhaustive(),
        }
    }
}
