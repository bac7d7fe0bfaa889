use crate::error::Error;
use crate::storage::{self, keys, StorageBackend};
use crate::types::{LogIndex, NodeId};

/// Largest supported cluster. Deployments use three or five servers.
pub const MAX_CLUSTER_SIZE: u8 = 5;

/// Replication bookkeeping for one remote member. Meaningful only while
/// the local server is Leader; reset on every state transition.
#[derive(Clone, Copy, Debug)]
pub struct PeerState {
    pub node_id: NodeId,
    /// Index of the next entry to send to this peer.
    pub next_index: LogIndex,
    /// Highest index known to be replicated on this peer.
    pub match_index: LogIndex,
}

/// Knows the configured cluster size and the remote members observed so
/// far, and tracks per-peer replication progress for the Leader.
///
/// The size is persisted on first initialization; on restart the stored
/// value is authoritative and a configured value, if any, must match it.
pub struct ClusterTracker {
    local_id: NodeId,
    cluster_size: u8,
    peers: Vec<PeerState>,
    discovery_activity: bool,
}

impl ClusterTracker {
    pub fn init<B: StorageBackend>(
        backend: &mut B,
        local_id: NodeId,
        configured_size: Option<u8>,
    ) -> Result<Self, Error<B::Error>> {
        let stored: Option<u8> = storage::read_value(backend, keys::CLUSTER_SIZE)?;
        let cluster_size = match (configured_size, stored) {
            (Some(configured), Some(stored)) if configured == stored => configured,
            (Some(configured), Some(stored)) => {
                return Err(Error::ClusterSizeMismatch { stored, configured })
            }
            (Some(configured), None) => {
                validate_size(configured)?;
                storage::write_value(backend, keys::CLUSTER_SIZE, &configured)?;
                configured
            }
            (None, Some(stored)) => stored,
            (None, None) => return Err(Error::ClusterSizeUnknown),
        };
        validate_size(cluster_size)?;

        Ok(Self {
            local_id,
            cluster_size,
            peers: Vec::with_capacity(cluster_size.saturating_sub(1) as usize),
            discovery_activity: false,
        })
    }

    pub fn cluster_size(&self) -> u8 {
        self.cluster_size
    }

    /// Majority of the cluster, including the local server.
    pub fn quorum_size(&self) -> u8 {
        self.cluster_size / 2 + 1
    }

    pub fn num_known_servers(&self) -> usize {
        self.peers.len()
    }

    pub fn is_known_server(&self, node_id: NodeId) -> bool {
        self.peers.iter().any(|peer| peer.node_id == node_id)
    }

    /// True once every remote member's identity has been observed.
    pub fn is_cluster_discovered(&self) -> bool {
        self.peers.len() + 1 == self.cluster_size as usize
    }

    /// Learn a remote member. Returns true if it was newly added; raises
    /// the discovery-activity flag in that case. Identifiers beyond the
    /// configured size are refused.
    pub fn add_server(&mut self, node_id: NodeId, last_log_index: LogIndex) -> bool {
        if node_id == self.local_id || self.is_known_server(node_id) {
            return false;
        }
        if self.peers.len() + 1 >= self.cluster_size as usize {
            return false;
        }
        self.peers.push(PeerState {
            node_id,
            next_index: last_log_index.next(),
            match_index: LogIndex::ZERO,
        });
        self.discovery_activity = true;
        true
    }

    /// Whether any member was learned since the last call; clears the flag.
    pub fn take_discovery_activity(&mut self) -> bool {
        std::mem::take(&mut self.discovery_activity)
    }

    /// Remote member at `ring_index` in discovery order.
    pub fn server_at(&self, ring_index: usize) -> Option<NodeId> {
        self.peers.get(ring_index).map(|peer| peer.node_id)
    }

    pub fn peer_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.peers.iter().map(|peer| peer.node_id)
    }

    pub fn peers(&self) -> impl Iterator<Item = &PeerState> {
        self.peers.iter()
    }

    pub fn next_index(&self, node_id: NodeId) -> Option<LogIndex> {
        self.peer(node_id).map(|peer| peer.next_index)
    }

    pub fn match_index(&self, node_id: NodeId) -> Option<LogIndex> {
        self.peer(node_id).map(|peer| peer.match_index)
    }

    pub fn increment_next_index_by(&mut self, node_id: NodeId, n: u32) {
        if let Some(peer) = self.peer_mut(node_id) {
            peer.next_index = peer.next_index.advanced_by(n);
        }
    }

    /// Step `next_index` back for a retry, clamped at 1 so the sentinel
    /// is never requested for transfer.
    pub fn decrement_next_index(&mut self, node_id: NodeId) {
        if let Some(peer) = self.peer_mut(node_id) {
            if peer.next_index > LogIndex::new(1) {
                peer.next_index = LogIndex::new(peer.next_index.get() - 1);
            }
        }
    }

    pub fn set_match_index(&mut self, node_id: NodeId, match_index: LogIndex) {
        if let Some(peer) = self.peer_mut(node_id) {
            peer.match_index = match_index;
        }
    }

    /// Reinitialize every peer to `{next = last_log_index + 1, match = 0}`.
    pub fn reset_replication_state(&mut self, last_log_index: LogIndex) {
        for peer in &mut self.peers {
            peer.next_index = last_log_index.next();
            peer.match_index = LogIndex::ZERO;
        }
    }

    fn peer(&self, node_id: NodeId) -> Option<&PeerState> {
        self.peers.iter().find(|peer| peer.node_id == node_id)
    }

    fn peer_mut(&mut self, node_id: NodeId) -> Option<&mut PeerState> {
        self.peers.iter_mut().find(|peer| peer.node_id == node_id)
    }
}

fn validate_size<E: std::error::Error + 'static>(size: u8) -> Result<(), Error<E>> {
    if size == 0 || size > MAX_CLUSTER_SIZE {
        return Err(Error::ClusterSizeInvalid(size));
    }
    Ok(())
}
