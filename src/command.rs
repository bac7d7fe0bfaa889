use crate::types::{Message, NodeId};

/// Effects the core asks its embedder to apply, in order.
///
/// Cancellation precedes any new send produced by the same entry point;
/// applying outputs out of order leaks stale responses into the handlers.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Output {
    /// Submit one RPC frame to a peer. Submission failures are the
    /// embedder's to log and drop; the next tick retries naturally.
    Send { to: NodeId, message: Message },
    /// Cancel every in-flight AppendEntries call issued by this node.
    /// A cancelled call must never produce a response callback.
    CancelAppendEntries,
    /// Cancel every in-flight RequestVote call issued by this node.
    CancelRequestVotes,
}
