//! Deterministic in-process cluster simulation.
//!
//! Wires several cores together through a message queue that honors the
//! cancellation contract: every outgoing call carries an epoch, and a
//! `Cancel*` output bumps the caller's epoch so responses to cancelled
//! calls are dropped before delivery. Time is advanced manually. Used by
//! the scenario tests and the demo binary; nothing here touches a network
//! or a thread.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use crate::command::Output;
use crate::raft::{Config, LeaderMonitor, NewEntry, RaftCore, ServerState};
use crate::storage::MemoryStorage;
use crate::trace::{TraceEvent, Tracer};
use crate::types::{Entry, Message, NodeId, UniqueId};

/// Tracer that records every event for later assertion.
#[derive(Debug, Default)]
pub struct RecordingTracer {
    events: Vec<TraceEvent>,
}

impl RecordingTracer {
    pub fn events(&self) -> &[TraceEvent] {
        &self.events
    }

    pub fn contains(&self, event: TraceEvent) -> bool {
        self.events.contains(&event)
    }
}

impl Tracer for RecordingTracer {
    fn trace(&mut self, event: TraceEvent) {
        self.events.push(event);
    }
}

/// Monitor that records callbacks and can be primed with entries to
/// append upon gaining leadership.
#[derive(Debug, Default)]
pub struct RecordingMonitor {
    pub commits: Vec<Entry>,
    pub leadership_changes: Vec<bool>,
    /// Drained and appended on the next transition to Leader.
    pub append_on_gain: Vec<NewEntry>,
}

impl LeaderMonitor for RecordingMonitor {
    fn on_log_commit(&mut self, entry: &Entry) {
        self.commits.push(entry.clone());
    }

    fn on_leadership_change(&mut self, is_leader: bool) -> Vec<NewEntry> {
        self.leadership_changes.push(is_leader);
        if is_leader {
            std::mem::take(&mut self.append_on_gain)
        } else {
            Vec::new()
        }
    }
}

/// A core wired into the simulation.
pub type SimCore = RaftCore<MemoryStorage, RecordingTracer, RecordingMonitor>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum CallKind {
    AppendEntries,
    RequestVote,
}

struct InFlight {
    from: NodeId,
    to: NodeId,
    message: Message,
    /// The call this frame belongs to: for a request, the caller's epoch
    /// at send time; for a response, inherited from the request it
    /// answers. Stale epochs mean the call was cancelled.
    call: Option<(CallKind, u64)>,
}

/// Simulated cluster of `size` nodes with identifiers 1..=size.
///
/// Peer identities are seeded at construction, standing in for the bus
/// discovery protocol. Timing follows the fast test profile (100 ms
/// update interval, 500 ms base activity timeout), and nodes are ticked
/// in identifier order, so elections resolve deterministically.
pub struct SimCluster {
    nodes: Vec<SimCore>,
    storages: Vec<MemoryStorage>,
    messages: VecDeque<InFlight>,
    append_entries_epochs: Vec<u64>,
    request_vote_epochs: Vec<u64>,
    now: Instant,
    update_interval: Duration,
}

impl SimCluster {
    pub fn new(size: u8) -> Self {
        let now = Instant::now();
        let update_interval = Duration::from_millis(100);
        let mut nodes = Vec::with_capacity(size as usize);
        let mut storages = Vec::with_capacity(size as usize);

        for id in 1..=size {
            let storage = MemoryStorage::new();
            let mut config = Config::new(NodeId::new(id));
            config.update_interval = update_interval;
            config.base_activity_timeout = Duration::from_millis(500);
            config.cluster_size = Some(size);
            let core = RaftCore::init(
                config,
                storage.clone(),
                RecordingTracer::default(),
                RecordingMonitor::default(),
                now,
            )
            .expect("in-memory initialization cannot fail");
            nodes.push(core);
            storages.push(storage);
        }

        // Seed full discovery, as the bus discovery layer would.
        for index in 0..nodes.len() {
            for id in 1..=size {
                if usize::from(id) != index + 1 {
                    nodes[index].add_server(NodeId::new(id));
                }
            }
        }

        Self {
            nodes,
            storages,
            messages: VecDeque::new(),
            append_entries_epochs: vec![0; size as usize],
            request_vote_epochs: vec![0; size as usize],
            now,
            update_interval,
        }
    }

    pub fn now(&self) -> Instant {
        self.now
    }

    pub fn update_interval(&self) -> Duration {
        self.update_interval
    }

    pub fn advance(&mut self, duration: Duration) {
        self.now += duration;
    }

    pub fn node(&self, index: usize) -> &SimCore {
        &self.nodes[index]
    }

    pub fn node_mut(&mut self, index: usize) -> &mut SimCore {
        &mut self.nodes[index]
    }

    /// Shared handle to a node's backing storage, usable for failure
    /// injection and restart simulation.
    pub fn storage(&self, index: usize) -> MemoryStorage {
        self.storages[index].clone()
    }

    /// Tick one node at the current simulated time and queue its outputs.
    pub fn tick(&mut self, index: usize) {
        let outputs = self.nodes[index].tick(self.now);
        self.apply_outputs(index, outputs, None);
    }

    pub fn tick_all(&mut self) {
        for index in 0..self.nodes.len() {
            self.tick(index);
        }
    }

    /// Submit an allocation to a node's core, as the allocation layer
    /// would on the leader.
    pub fn append_log(&mut self, index: usize, node_id: NodeId, unique_id: UniqueId) {
        let outputs = self.nodes[index].append_log(self.now, node_id, unique_id);
        self.apply_outputs(index, outputs, None);
    }

    /// Deliver every queued frame, including frames queued by deliveries.
    pub fn deliver_all(&mut self) {
        while let Some(inflight) = self.messages.pop_front() {
            self.deliver(inflight);
        }
    }

    /// Drop every queued frame, simulating a partition or a lossy bus.
    pub fn drop_messages(&mut self) {
        self.messages.clear();
    }

    pub fn queued_messages(&self) -> usize {
        self.messages.len()
    }

    pub fn queued_append_entries_requests(&self) -> usize {
        self.messages
            .iter()
            .filter(|m| matches!(m.message, Message::AppendEntries(_)))
            .count()
    }

    /// One full update round: advance the clock by the update interval,
    /// tick every node, and deliver all traffic.
    pub fn run_ticks(&mut self, rounds: u32) {
        for _ in 0..rounds {
            self.advance(self.update_interval);
            self.tick_all();
            self.deliver_all();
        }
    }

    pub fn leader(&self) -> Option<usize> {
        self.nodes.iter().position(|node| node.is_leader())
    }

    /// (followers, candidates, leaders)
    pub fn role_counts(&self) -> (usize, usize, usize) {
        let mut counts = (0, 0, 0);
        for node in &self.nodes {
            match node.server_state() {
                ServerState::Follower => counts.0 += 1,
                ServerState::Candidate => counts.1 += 1,
                ServerState::Leader => counts.2 += 1,
            }
        }
        counts
    }

    fn index_of(&self, id: NodeId) -> Option<usize> {
        let value = usize::from(id.get());
        (1..=self.nodes.len()).contains(&value).then(|| value - 1)
    }

    /// Queue a node's outputs. `reply_context` is set while delivering a
    /// request so the solicited response inherits the request's call tag.
    fn apply_outputs(
        &mut self,
        from_index: usize,
        outputs: Vec<Output>,
        reply_context: Option<(CallKind, u64, NodeId)>,
    ) {
        let from = NodeId::new(from_index as u8 + 1);
        for output in outputs {
            match output {
                Output::Send { to, message } => {
                    let call = match &message {
                        Message::AppendEntries(_) => Some((
                            CallKind::AppendEntries,
                            self.append_entries_epochs[from_index],
                        )),
                        Message::RequestVote(_) => Some((
                            CallKind::RequestVote,
                            self.request_vote_epochs[from_index],
                        )),
                        Message::AppendEntriesResponse(_) => reply_context
                            .filter(|(kind, _, requester)| {
                                *kind == CallKind::AppendEntries && *requester == to
                            })
                            .map(|(kind, epoch, _)| (kind, epoch)),
                        Message::RequestVoteResponse(_) => reply_context
                            .filter(|(kind, _, requester)| {
                                *kind == CallKind::RequestVote && *requester == to
                            })
                            .map(|(kind, epoch, _)| (kind, epoch)),
                    };
                    self.messages.push_back(InFlight {
                        from,
                        to,
                        message,
                        call,
                    });
                }
                Output::CancelAppendEntries => {
                    self.append_entries_epochs[from_index] += 1;
                }
                Output::CancelRequestVotes => {
                    self.request_vote_epochs[from_index] += 1;
                }
            }
        }
    }

    fn deliver(&mut self, inflight: InFlight) {
        let Some(to_index) = self.index_of(inflight.to) else {
            return;
        };

        // A response to a cancelled call produces no callback.
        if let Some((kind, epoch)) = inflight.call {
            let is_response = matches!(
                inflight.message,
                Message::AppendEntriesResponse(_) | Message::RequestVoteResponse(_)
            );
            if is_response {
                let current = match kind {
                    CallKind::AppendEntries => self.append_entries_epochs[to_index],
                    CallKind::RequestVote => self.request_vote_epochs[to_index],
                };
                if epoch != current {
                    return;
                }
            }
        }

        let reply_context = match &inflight.message {
            Message::AppendEntries(_) | Message::RequestVote(_) => inflight
                .call
                .map(|(kind, epoch)| (kind, epoch, inflight.from)),
            _ => None,
        };

        let outputs = self.nodes[to_index].handle_message(self.now, inflight.from, inflight.message);
        self.apply_outputs(to_index, outputs, reply_context);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{LogIndex, Term};

    /// Three-node happy path: staggered timeout elects node 1, an
    /// allocation replicates to both peers, commits on a quorum, and the
    /// quiescent cluster goes passive.
    #[test]
    fn three_node_election_replication_and_passivation() {
        let mut cluster = SimCluster::new(3);

        // Node 1 has the shortest effective timeout (500 ms) and wins the
        // election two rounds later.
        cluster.run_ticks(8);
        assert_eq!(cluster.leader(), Some(0));
        assert_eq!(cluster.role_counts(), (2, 0, 1));
        assert_eq!(
            cluster.node(0).persistent_state().current_term(),
            Term::new(1)
        );
        assert_eq!(cluster.node(0).monitor().leadership_changes, vec![true]);

        cluster.append_log(0, NodeId::new(42), [0x01; 16]);
        cluster.run_ticks(6);

        // Committed on the leader, exactly one monitor notification.
        assert_eq!(cluster.node(0).commit_index(), LogIndex::new(1));
        assert!(cluster.node(0).are_all_entries_committed());
        let commits = &cluster.node(0).monitor().commits;
        assert_eq!(commits.len(), 1);
        assert_eq!(commits[0].node_id, NodeId::new(42));
        assert_eq!(commits[0].unique_id, [0x01; 16]);

        // Replicated and committed everywhere.
        for index in 0..3 {
            assert_eq!(cluster.node(index).num_allocations(), 1);
            assert_eq!(cluster.node(index).commit_index(), LogIndex::new(1));
        }

        // Fully replicated and discovered: the leader is passive and a
        // further tick issues no AppendEntries at all.
        assert!(!cluster.node(0).is_active_mode());
        cluster.advance(cluster.update_interval());
        cluster.tick(0);
        assert_eq!(cluster.queued_append_entries_requests(), 0);
        assert_eq!(cluster.queued_messages(), 0);
    }

    #[test]
    fn allocation_activity_reactivates_a_passive_leader() {
        let mut cluster = SimCluster::new(3);
        cluster.run_ticks(8);
        cluster.append_log(0, NodeId::new(42), [0x01; 16]);
        cluster.run_ticks(6);
        assert!(!cluster.node(0).is_active_mode());

        cluster.append_log(0, NodeId::new(43), [0x02; 16]);
        cluster.run_ticks(1);
        assert!(cluster.node(0).is_active_mode());

        cluster.run_ticks(5);
        assert_eq!(cluster.node(0).commit_index(), LogIndex::new(2));
        assert!(!cluster.node(0).is_active_mode());
    }

    /// Two servers with distinct identifiers never start an election on
    /// the same tick, given identical clocks and no traffic.
    #[test]
    fn election_stagger_is_deterministic() {
        let mut cluster = SimCluster::new(3);
        let mut first_candidacy = [None::<u32>; 3];

        for round in 1..=12 {
            cluster.advance(cluster.update_interval());
            for index in 0..3 {
                let before = cluster.node(index).server_state();
                cluster.tick(index);
                // Withhold all traffic so every node runs on its own clock.
                cluster.drop_messages();
                let after = cluster.node(index).server_state();
                if before != ServerState::Candidate
                    && after == ServerState::Candidate
                    && first_candidacy[index].is_none()
                {
                    first_candidacy[index] = Some(round);
                }
            }
        }

        let rounds: Vec<u32> = first_candidacy
            .iter()
            .map(|round| round.expect("every node must eventually campaign"))
            .collect();
        assert_eq!(rounds.len(), 3);
        assert!(rounds[0] < rounds[1] && rounds[1] < rounds[2]);
    }

    /// At most one leader exists at any point, and a term never has two
    /// different leaders.
    #[test]
    fn at_most_one_leader_per_term() {
        let mut cluster = SimCluster::new(3);
        let mut leader_by_term: Vec<(u32, usize)> = Vec::new();

        for _ in 0..40 {
            cluster.advance(cluster.update_interval());
            cluster.tick_all();
            cluster.deliver_all();

            let (_, _, leaders) = cluster.role_counts();
            assert!(leaders <= 1);

            if let Some(index) = cluster.leader() {
                let term = cluster.node(index).persistent_state().current_term().get();
                match leader_by_term.iter().find(|(t, _)| *t == term) {
                    Some((_, previous)) => assert_eq!(*previous, index),
                    None => leader_by_term.push((term, index)),
                }
            }

            // The commit index never outruns the log.
            for index in 0..3 {
                let node = cluster.node(index);
                assert!(node.commit_index() <= node.persistent_state().log().last_index());
            }
        }
    }

    /// Commits are delivered to the leader monitor once each, in strict
    /// index order.
    #[test]
    fn commits_are_reported_in_order() {
        let mut cluster = SimCluster::new(3);
        cluster.run_ticks(8);
        assert_eq!(cluster.leader(), Some(0));

        for id in 1..=3u8 {
            cluster.append_log(0, NodeId::new(40 + id), [id; 16]);
        }
        cluster.run_ticks(12);

        let commits = &cluster.node(0).monitor().commits;
        assert_eq!(commits.len(), 3);
        for (offset, entry) in commits.iter().enumerate() {
            assert_eq!(entry.unique_id, [offset as u8 + 1; 16]);
        }

        for index in 0..3 {
            assert_eq!(cluster.node(index).num_allocations(), 3);
            assert_eq!(cluster.node(index).commit_index(), LogIndex::new(3));
        }
    }

    /// Log terms never decrease with index, on any node, even across
    /// leadership changes forced by partitions.
    #[test]
    fn log_terms_are_non_decreasing() {
        let mut cluster = SimCluster::new(3);
        cluster.run_ticks(8);
        cluster.append_log(0, NodeId::new(42), [0x01; 16]);
        cluster.run_ticks(4);
        assert_eq!(cluster.leader(), Some(0));

        // Stop ticking the leader and wake node 2, as allocation traffic
        // on the bus would; its timeout elects it under a higher term.
        cluster.node_mut(1).force_active_mode();
        for _ in 0..20 {
            cluster.advance(cluster.update_interval());
            for index in 1..3 {
                cluster.tick(index);
            }
            cluster.deliver_all();
        }
        assert_eq!(cluster.leader(), Some(1));
        cluster.append_log(1, NodeId::new(43), [0x02; 16]);
        cluster.run_ticks(8);

        for index in 0..3 {
            let log = cluster.node(index).persistent_state().log();
            let mut previous = Term::ZERO;
            for value in 0..=log.last_index().get() {
                let entry = log.get(LogIndex::new(value)).expect("entry in range");
                assert!(entry.term >= previous);
                previous = entry.term;
            }
        }
    }

    /// The monitor may request an append from within the leadership
    /// notification; the entry lands under the new leader's term and
    /// eventually commits.
    #[test]
    fn monitor_append_on_leadership_change() {
        let mut cluster = SimCluster::new(3);
        cluster
            .node_mut(0)
            .monitor_mut()
            .append_on_gain
            .push(NewEntry {
                node_id: NodeId::new(7),
                unique_id: [7; 16],
            });

        cluster.run_ticks(8);
        assert_eq!(cluster.leader(), Some(0));
        assert_eq!(cluster.node(0).num_allocations(), 1);
        let entry = cluster
            .node(0)
            .persistent_state()
            .log()
            .get(LogIndex::new(1))
            .expect("appended entry")
            .clone();
        assert_eq!(entry.term, Term::new(1));
        assert_eq!(entry.node_id, NodeId::new(7));

        cluster.run_ticks(6);
        assert_eq!(cluster.node(0).monitor().commits.len(), 1);
        assert_eq!(cluster.node(0).monitor().commits[0].node_id, NodeId::new(7));
    }

    /// A storage write failure on a follower leaves it passive until the
    /// leader's traffic re-registers activity; it never campaigns from
    /// the failed state.
    #[test]
    fn write_failure_defers_elections() {
        let mut cluster = SimCluster::new(3);
        let storage = cluster.storage(2);

        // Node 3 has the longest timeout; break its storage before it
        // ever campaigns, then let it try.
        storage.set_fail_writes(true);
        for _ in 0..12 {
            cluster.advance(cluster.update_interval());
            cluster.tick(2);
            cluster.drop_messages();
        }

        let node = cluster.node(2);
        assert_eq!(node.server_state(), ServerState::Follower);
        assert!(!node.is_active_mode());
        assert!(node
            .tracer()
            .contains(TraceEvent::PersistStateUpdateError));
        assert_eq!(node.persistent_state().current_term(), Term::ZERO);
    }
}
