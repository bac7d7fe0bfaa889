use crate::raft::ServerState;
use crate::types::{LogIndex, NodeId, Term};

/// Structured events emitted by the core, one per observable decision.
/// Consumed by tests and by external observability sinks.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TraceEvent {
    CoreInited,
    StateSwitch { from: ServerState, to: ServerState },
    ActiveSwitch { active: bool },
    ElectionComplete { votes: u8 },
    VoteRequestInitiated { peer: NodeId },
    VoteRequestReceived { from: NodeId },
    VoteResponseReceived { from: NodeId },
    NewerTermInResponse { term: Term },
    AppendEntriesRejected { peer: NodeId },
    RequestIgnored { from: NodeId },
    ResponseIgnored { from: NodeId },
    NewLogEntry { node_id: NodeId },
    /// A leader committed the entry at `index` and notified its monitor.
    EntryCommitted { index: LogIndex },
    /// A follower advanced its commit index from the leader's.
    CommitIndexUpdate { index: LogIndex },
    PersistStateUpdateError,
    AppendLogIgnored,
    ServerDiscovered { node_id: NodeId },
}

/// Event sink. Implementations must not block and must not call back
/// into the core.
pub trait Tracer {
    fn trace(&mut self, event: TraceEvent);
}

/// Discards every event.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullTracer;

impl Tracer for NullTracer {
    fn trace(&mut self, _event: TraceEvent) {}
}
