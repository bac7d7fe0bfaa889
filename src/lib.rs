//! Raft consensus core for a dynamic node-ID allocation cluster.
//!
//! Implements leader election, log replication, commit-index advancement,
//! and persistent-state management for small clusters (three or five
//! servers) sharing a broadcast bus, based on "In Search of an
//! Understandable Consensus Algorithm" (Ongaro & Ousterhout).
//!
//! The core is a single-threaded state machine. It performs no I/O of its
//! own besides synchronous writes through a pluggable key/value
//! [`StorageBackend`]; it talks to the bus by returning [`Output`] effects
//! from every entry point, and to the allocation layer through the
//! [`LeaderMonitor`] callbacks. Two adaptations suit the constrained
//! transport: election timeouts are staggered deterministically by node
//! identifier instead of randomized, and a leader that knows the cluster
//! to be fully replicated and quiescent stops issuing AppendEntries
//! entirely until new activity arrives.

pub mod cluster;
pub mod command;
pub mod error;
pub mod file_storage;
pub mod log;
pub mod raft;
pub mod sim;
pub mod state;
pub mod storage;
pub mod trace;
pub mod types;

pub use cluster::ClusterTracker;
pub use command::Output;
pub use error::Error;
pub use file_storage::FileStorage;
pub use log::PersistentLog;
pub use raft::{
    Config, LeaderMonitor, LogEntryInfo, NewEntry, RaftCore, ServerState,
    DEFAULT_BASE_ACTIVITY_TIMEOUT, DEFAULT_UPDATE_INTERVAL,
};
pub use state::PersistentState;
pub use storage::{MemoryStorage, StorageBackend};
pub use trace::{NullTracer, TraceEvent, Tracer};
pub use types::{Entry, LogIndex, Message, NodeId, Term, UniqueId};
