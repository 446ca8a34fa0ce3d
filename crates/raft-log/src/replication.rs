//! # replication
//!
//! why: drive the log from both ends of a replication link
//! relations: reads and mutates log.rs, produces and consumes message.rs types
//! what: Peer (leader-side progress of one follower), follower-side request handlers
//!
//! A leader keeps one `Peer` per follower and calls `flush` from that follower's
//! replication task. Whenever the log can't serve the peer's `prev_log_index` the
//! peer is sent a snapshot instead.

use crate::error::Result;
use crate::log::RaftLog;
use crate::message::RaftMessage;
use crate::LogEntry;
use tracing::{debug, warn};

/// Replication progress of a single follower, as tracked by the leader
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Peer {
    pub id: u64,
    prev_log_index: u64,
}

impl Peer {
    /// Create a peer that is assumed to hold everything up to `prev_log_index`
    pub fn new(id: u64, prev_log_index: u64) -> Self {
        Self { id, prev_log_index }
    }

    pub fn prev_log_index(&self) -> u64 {
        self.prev_log_index
    }

    /// Build the next request for this follower
    pub fn flush(&self, log: &RaftLog, term: u64, leader_id: u64) -> RaftMessage {
        let max = log.config().max_entries_per_request;

        match log.get_entries_after(self.prev_log_index, max) {
            Some(batch) => RaftMessage::AppendEntries {
                term,
                leader_id,
                prev_log_index: self.prev_log_index,
                prev_log_term: batch.prev_log_term,
                entries: batch.entries,
                leader_commit: log.commit_index(),
            },
            None => {
                let marker = log.snapshot_marker();
                debug!(
                    peer = self.id,
                    prev_log_index = self.prev_log_index,
                    snapshot_index = marker.index,
                    "log cannot serve peer, sending snapshot"
                );
                RaftMessage::InstallSnapshot {
                    term,
                    leader_id,
                    last_included_index: marker.index,
                    last_included_term: marker.term,
                }
            }
        }
    }

    /// Reposition after an AppendEntries response.
    ///
    /// `index` and `commit_index` are the follower's last and committed indices.
    pub fn handle_append_entries_response(&mut self, success: bool, index: u64, commit_index: u64) {
        if success {
            self.prev_log_index = index;
            return;
        }

        if commit_index >= self.prev_log_index {
            // everything the follower committed matches, resume from there
            self.prev_log_index = commit_index;
        } else if self.prev_log_index > 0 {
            self.prev_log_index -= 1;
        }
        // never point past what the follower actually holds
        self.prev_log_index = self.prev_log_index.min(index);

        debug!(
            peer = self.id,
            prev_log_index = self.prev_log_index,
            "append entries rejected, backing off"
        );
    }

    /// Reposition after an InstallSnapshot response.
    ///
    /// A follower's committed entries always match the leader, so resuming from
    /// its commit index is safe whether or not the snapshot was taken.
    pub fn handle_install_snapshot_response(
        &mut self,
        success: bool,
        last_included_index: u64,
        index: u64,
        commit_index: u64,
    ) {
        self.prev_log_index = if success {
            last_included_index.max(commit_index)
        } else {
            commit_index
        }
        .min(index);

        debug!(
            peer = self.id,
            success,
            prev_log_index = self.prev_log_index,
            "snapshot response"
        );
    }
}

// -- follower side --

/// Apply an AppendEntries request to a follower's log.
///
/// The request is accepted only if the follower's log matches the leader at
/// `(prev_log_index, prev_log_term)`; any uncommitted suffix after that point
/// is replaced by `entries`.
pub fn handle_append_entries(
    log: &RaftLog,
    term: u64,
    prev_log_index: u64,
    prev_log_term: u64,
    entries: Vec<LogEntry>,
    leader_commit: u64,
) -> RaftMessage {
    let success = match accept_entries(log, prev_log_index, prev_log_term, entries) {
        Ok(()) => true,
        Err(e) => {
            debug!(prev_log_index, prev_log_term, error = %e, "rejected append entries");
            false
        }
    };

    if success {
        let commit = leader_commit.min(log.current_index());
        if commit > log.commit_index() {
            if let Err(e) = log.set_commit_index(commit) {
                warn!(commit, error = %e, "failed to advance commit index");
            }
        }
    }

    RaftMessage::AppendEntriesResponse {
        term,
        success,
        index: log.current_index(),
        commit_index: log.commit_index(),
    }
}

fn accept_entries(
    log: &RaftLog,
    prev_log_index: u64,
    prev_log_term: u64,
    entries: Vec<LogEntry>,
) -> Result<()> {
    log.truncate(prev_log_index, prev_log_term)?;
    log.append_entries(entries)
}

/// Apply an InstallSnapshot request to a follower's log
pub fn handle_install_snapshot(
    log: &RaftLog,
    term: u64,
    last_included_index: u64,
    last_included_term: u64,
) -> RaftMessage {
    let success = match log.install_snapshot(last_included_index, last_included_term) {
        Ok(()) => true,
        Err(e) => {
            warn!(last_included_index, error = %e, "failed to install snapshot");
            false
        }
    };

    RaftMessage::InstallSnapshotResponse {
        term,
        success,
        last_included_index,
        index: log.current_index(),
        commit_index: log.commit_index(),
    }
}
