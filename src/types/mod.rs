mod entry;
mod message;
mod primitives;

pub use entry::Entry;
pub use message::{
    AppendEntriesRequest, AppendEntriesResponse, Message, RequestVoteRequest, RequestVoteResponse,
    MAX_ENTRIES_PER_REQUEST,
};
pub use primitives::{LogIndex, NodeId, Term, UniqueId};
