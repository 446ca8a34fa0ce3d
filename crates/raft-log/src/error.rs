//! # error
//!
//! why: give every rejected log operation a typed, recoverable reason
//! relations: returned by log.rs operations, wraps StateMachine and LogStorage failures
//! what: LogError enum, ApplyError alias, Result alias

use std::io;
use thiserror::Error;

/// Error produced by a state machine while applying a committed entry
pub type ApplyError = Box<dyn std::error::Error + Send + Sync + 'static>;

pub type Result<T> = std::result::Result<T, LogError>;

/// Reasons a log operation was refused.
///
/// None of these are fatal: the log is left exactly as it was before the call,
/// except for `ApplyFailure`, where the commit index stops at the last applied entry.
#[derive(Debug, Error)]
pub enum LogError {
    #[error("append index {found} is not the next index {expected}")]
    InvalidAppendIndex { expected: u64, found: u64 },

    #[error("commit index {requested} is below current commit index {commit_index}")]
    CommitIndexRegression { commit_index: u64, requested: u64 },

    #[error("commit index {requested} is beyond end of log {current_index}")]
    CommitIndexBeyondLog { current_index: u64, requested: u64 },

    #[error("compaction to {requested} is below start index {start_index}")]
    CompactionRegression { start_index: u64, requested: u64 },

    #[error("compaction to {requested} would discard uncommitted entries (commit index {commit_index})")]
    CompactionOfUncommitted { commit_index: u64, requested: u64 },

    #[error("state machine failed to apply entry {index}: {source}")]
    ApplyFailure {
        index: u64,
        #[source]
        source: ApplyError,
    },

    #[error("cannot truncate to {requested}, entries up to {commit_index} are committed")]
    TruncateCommitted { commit_index: u64, requested: u64 },

    #[error("cannot truncate to {requested}, log ends at {current_index}")]
    TruncateBeyondLog { current_index: u64, requested: u64 },

    #[error("entry {index} has term {found}, expected {expected}")]
    TruncateTermMismatch { index: u64, expected: u64, found: u64 },

    #[error("snapshot at {index} conflicts with committed entries up to {commit_index}")]
    SnapshotConflictsWithCommitted { index: u64, commit_index: u64 },

    #[error("persisted log is not contiguous: expected index {expected}, found {found}")]
    CorruptLog { expected: u64, found: u64 },

    #[error("storage error: {0}")]
    Storage(#[from] io::Error),
}

impl LogError {
    /// Whether the caller may retry the same request unchanged
    pub fn is_retryable(&self) -> bool {
        matches!(self, LogError::ApplyFailure { .. } | LogError::Storage(_))
    }
}
