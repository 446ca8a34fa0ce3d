//! # state_machine
//!
//! why: decouple the log from whatever consumes committed commands
//! relations: invoked by log.rs while advancing the commit index
//! what: StateMachine trait, closure impl, NoopStateMachine

use crate::error::ApplyError;
use crate::{LogEntry, SnapshotMarker};

/// Consumer of committed entries.
///
/// The log calls `apply` once per newly committed entry, in increasing index order,
/// while holding its lock. An implementation must therefore never call back into
/// the `RaftLog` that drives it.
pub trait StateMachine: Send {
    /// apply a committed entry; an error stops the commit index before this entry
    fn apply(&mut self, entry: &LogEntry) -> Result<(), ApplyError>;

    /// replace the current state with the snapshot ending at `marker`.
    ///
    /// Called when an installed snapshot moves the commit index past what was
    /// applied; the snapshot contents themselves are transferred out of band.
    fn restore(&mut self, _marker: SnapshotMarker) -> Result<(), ApplyError> {
        Ok(())
    }
}

impl<F> StateMachine for F
where
    F: FnMut(&LogEntry) -> Result<(), ApplyError> + Send,
{
    fn apply(&mut self, entry: &LogEntry) -> Result<(), ApplyError> {
        self(entry)
    }
}

/// state machine that accepts every entry and does nothing with it
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopStateMachine;

impl StateMachine for NoopStateMachine {
    fn apply(&mut self, _entry: &LogEntry) -> Result<(), ApplyError> {
        Ok(())
    }
}
