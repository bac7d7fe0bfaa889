use serde::{Deserialize, Serialize};

use super::primitives::{NodeId, Term, UniqueId};

/// One allocation record in the replicated log.
///
/// An entry binds a hardware unique identifier to the node identifier the
/// cluster allocated for it, under the term in which the entry was created.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    pub term: Term,
    pub node_id: NodeId,
    pub unique_id: UniqueId,
}

impl Entry {
    /// The reserved entry at index 0: term 0, no node, zero unique ID.
    /// Created on first initialization, always committed, never removed.
    pub const fn sentinel() -> Entry {
        Entry {
            term: Term::ZERO,
            node_id: NodeId::new(0),
            unique_id: [0; 16],
        }
    }
}
