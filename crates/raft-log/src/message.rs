//! # message
//!
//! why: define the replication rpc messages a leader exchanges with a follower
//! relations: built and consumed by replication.rs, serialized for the network
//! what: AppendEntries, InstallSnapshot and their responses

use serde::{Deserialize, Serialize};

/// Replication messages between a leader and one follower
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RaftMessage {
    /// Replicate log entries (also serves as heartbeat when entries is empty)
    AppendEntries {
        term: u64,
        leader_id: u64,
        prev_log_index: u64,
        prev_log_term: u64,
        entries: Vec<crate::LogEntry>,
        leader_commit: u64,
    },
    /// Response to AppendEntries
    ///
    /// `index` and `commit_index` describe the follower's log after handling the
    /// request, so the leader can reposition without probing one index at a time.
    AppendEntriesResponse {
        term: u64,
        success: bool,
        index: u64,
        commit_index: u64,
    },
    /// Sent instead of AppendEntries once the entries a follower needs are compacted
    InstallSnapshot {
        term: u64,
        leader_id: u64,
        last_included_index: u64,
        last_included_term: u64,
    },
    /// Response to InstallSnapshot
    ///
    /// Carries the follower's last and committed indices like AppendEntriesResponse,
    /// since a follower may already hold a newer snapshot than the one sent.
    InstallSnapshotResponse {
        term: u64,
        success: bool,
        last_included_index: u64,
        index: u64,
        commit_index: u64,
    },
}

impl RaftMessage {
    /// term carried by the message
    pub fn term(&self) -> u64 {
        match self {
            RaftMessage::AppendEntries { term, .. }
            | RaftMessage::AppendEntriesResponse { term, .. }
            | RaftMessage::InstallSnapshot { term, .. }
            | RaftMessage::InstallSnapshotResponse { term, .. } => *term,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::LogEntry;

    #[test]
    fn append_entries_survives_json() {
        let msg = RaftMessage::AppendEntries {
            term: 3,
            leader_id: 1,
            prev_log_index: 9,
            prev_log_term: 2,
            entries: vec![LogEntry::new(3, 10, b"cmd".to_vec())],
            leader_commit: 8,
        };

        let json = serde_json::to_string(&msg).unwrap();
        let back: RaftMessage = serde_json::from_str(&json).unwrap();
        assert_eq!(back, msg);
        assert_eq!(back.term(), 3);
    }
}
