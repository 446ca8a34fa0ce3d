//! # raft-log
//!
//! why: keep the replicated log of a raft node correct while it is appended to,
//! committed, compacted and read by many replication tasks at once
//! relations: raft-log-storage implements LogStorage for persistence
//! what: RaftLog, entry and message types, apply and storage contracts, replication

pub mod config;
pub mod entry;
pub mod error;
pub mod log;
pub mod message;
pub mod replication;
pub mod state_machine;
pub mod storage;

pub use config::LogConfig;
pub use entry::{LogEntry, SnapshotMarker};
pub use error::{ApplyError, LogError, Result};
pub use log::{EntriesAfter, RaftLog};
pub use message::RaftMessage;
pub use replication::{handle_append_entries, handle_install_snapshot, Peer};
pub use state_machine::{NoopStateMachine, StateMachine};
pub use storage::LogStorage;
