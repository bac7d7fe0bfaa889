use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::cluster::ClusterTracker;
use crate::command::Output;
use crate::error::Error;
use crate::state::PersistentState;
use crate::storage::StorageBackend;
use crate::trace::{TraceEvent, Tracer};
use crate::types::{
    AppendEntriesRequest, AppendEntriesResponse, Entry, LogIndex, Message, NodeId,
    RequestVoteRequest, RequestVoteResponse, Term, UniqueId, MAX_ENTRIES_PER_REQUEST,
};

/// Default periodic update interval; doubles as the RPC request timeout.
pub const DEFAULT_UPDATE_INTERVAL: Duration = Duration::from_millis(1000);

/// Default base election timeout, before the per-node stagger is added.
pub const DEFAULT_BASE_ACTIVITY_TIMEOUT: Duration = Duration::from_millis(4000);

/// Raft server roles.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ServerState {
    Follower,
    Candidate,
    Leader,
}

/// An allocation record the leader monitor asks to append.
#[derive(Clone, Debug)]
pub struct NewEntry {
    pub node_id: NodeId,
    pub unique_id: UniqueId,
}

/// Callbacks into the allocation layer that owns this core.
pub trait LeaderMonitor {
    /// Invoked exactly once per newly committed index, in ascending
    /// order, and only while the local server is Leader.
    fn on_log_commit(&mut self, entry: &Entry) {
        let _ = entry;
    }

    /// Invoked whenever the local server gains or loses leadership.
    /// Leadership is initially false. Entries returned here are appended
    /// through the normal leader append path before any other work; this
    /// is the supported way to commit from within the notification.
    fn on_leadership_change(&mut self, is_leader: bool) -> Vec<NewEntry> {
        let _ = is_leader;
        Vec::new()
    }
}

/// Identity and timing configuration.
#[derive(Clone, Debug)]
pub struct Config {
    pub node_id: NodeId,
    /// Periodic update rate; AppendEntries are issued at this rate and
    /// outgoing calls time out after it.
    pub update_interval: Duration,
    /// Base election timeout. The effective timeout adds
    /// `update_interval * (node_id - 1)` so that no two members with
    /// distinct identifiers start an election on the same tick.
    pub base_activity_timeout: Duration,
    /// Cluster size to persist on first initialization. On restart the
    /// stored size is used; if both are present they must match.
    pub cluster_size: Option<u8>,
}

impl Config {
    pub fn new(node_id: NodeId) -> Self {
        Self {
            node_id,
            update_interval: DEFAULT_UPDATE_INTERVAL,
            base_activity_timeout: DEFAULT_BASE_ACTIVITY_TIMEOUT,
            cluster_size: None,
        }
    }
}

/// One step of a reverse log traversal.
#[derive(Clone, Debug)]
pub struct LogEntryInfo {
    pub entry: Entry,
    pub committed: bool,
}

/// Bookkeeping for the single outstanding AppendEntries call. Valid only
/// until the next tick or state switch, both of which cancel the call.
#[derive(Clone, Copy, Debug)]
struct PendingAppendEntries {
    prev_log_index: LogIndex,
    num_entries: u32,
}

/// Replicated consensus core of the node-ID allocation service: leader
/// election, log replication, commit propagation, and durable-state
/// management over a pluggable storage backend.
///
/// The core is a single-threaded state machine. It is driven by a
/// periodic [`tick`](RaftCore::tick) and by incoming RPC frames fed to
/// [`handle_message`](RaftCore::handle_message); every entry point
/// returns the [`Output`] effects for the embedder to apply. The only
/// I/O the core performs itself is synchronous writes through the
/// storage backend, and any failing write demotes it to a passive
/// Follower rather than propagating an error.
pub struct RaftCore<B, T, M> {
    config: Config,
    persistent: PersistentState<B>,
    cluster: ClusterTracker,
    commit_index: LogIndex,
    last_activity: Instant,
    active_mode: bool,
    state: ServerState,
    /// Ring position of the next peer to replicate to.
    next_server_index: usize,
    votes_received: u8,
    pending_append_entries: Option<PendingAppendEntries>,
    tracer: T,
    monitor: M,
}

impl<B, T, M> RaftCore<B, T, M>
where
    B: StorageBackend,
    T: Tracer,
    M: LeaderMonitor,
{
    /// Load (or first-initialize) the durable state and start as an
    /// active Follower.
    pub fn init(
        config: Config,
        backend: B,
        mut tracer: T,
        monitor: M,
        now: Instant,
    ) -> Result<Self, Error<B::Error>> {
        let mut persistent = PersistentState::init(backend)?;
        let cluster = ClusterTracker::init(
            persistent.log_mut().backend_mut(),
            config.node_id,
            config.cluster_size,
        )?;
        tracer.trace(TraceEvent::CoreInited);

        Ok(Self {
            config,
            persistent,
            cluster,
            commit_index: LogIndex::ZERO,
            last_activity: now,
            active_mode: true,
            state: ServerState::Follower,
            next_server_index: 0,
            votes_received: 0,
            pending_append_entries: None,
            tracer,
            monitor,
        })
    }

    pub fn server_state(&self) -> ServerState {
        self.state
    }

    pub fn is_leader(&self) -> bool {
        self.state == ServerState::Leader
    }

    pub fn commit_index(&self) -> LogIndex {
        self.commit_index
    }

    /// Whether the log has been fully committed since the last append.
    pub fn are_all_entries_committed(&self) -> bool {
        self.commit_index == self.persistent.log().last_index()
    }

    pub fn is_active_mode(&self) -> bool {
        self.active_mode
    }

    pub fn last_activity_timestamp(&self) -> Instant {
        self.last_activity
    }

    /// Number of allocations in the log; the sentinel does not count.
    pub fn num_allocations(&self) -> u32 {
        self.persistent.log().last_index().get()
    }

    pub fn persistent_state(&self) -> &PersistentState<B> {
        &self.persistent
    }

    pub fn cluster(&self) -> &ClusterTracker {
        &self.cluster
    }

    pub fn tracer(&self) -> &T {
        &self.tracer
    }

    pub fn monitor(&self) -> &M {
        &self.monitor
    }

    pub fn monitor_mut(&mut self) -> &mut M {
        &mut self.monitor
    }

    /// Registers allocation-layer activity: a passive Leader resumes
    /// issuing AppendEntries until the cluster is quiescent again.
    pub fn force_active_mode(&mut self) {
        self.set_active_mode(true);
    }

    /// Learn a cluster member identity from the discovery layer.
    pub fn add_server(&mut self, node_id: NodeId) {
        self.observe_sender(node_id);
    }

    /// Walk the log from the newest entry down to the sentinel, stopping
    /// at the first entry matching `predicate`. Used by the allocation
    /// layer to look for existing allocations.
    pub fn traverse_log_from_end_until(
        &self,
        mut predicate: impl FnMut(&LogEntryInfo) -> bool,
    ) -> Option<LogEntryInfo> {
        for value in (0..=self.persistent.log().last_index().get()).rev() {
            let index = LogIndex::new(value);
            if let Some(entry) = self.persistent.log().get(index) {
                let info = LogEntryInfo {
                    entry: entry.clone(),
                    committed: index <= self.commit_index,
                };
                if predicate(&info) {
                    return Some(info);
                }
            }
        }
        None
    }

    /// Periodic update, invoked every `update_interval`.
    pub fn tick(&mut self, now: Instant) -> Vec<Output> {
        let mut out = Vec::new();
        let had_discovery_activity = self.cluster.take_discovery_activity();
        if had_discovery_activity && self.is_leader() {
            self.set_active_mode(true);
        }
        match self.state {
            ServerState::Follower => self.update_follower(now, &mut out),
            ServerState::Candidate => self.update_candidate(now, &mut out),
            ServerState::Leader => self.update_leader(now, &mut out),
        }
        out
    }

    /// Feed one incoming RPC frame. `from` is the bus source identifier.
    pub fn handle_message(&mut self, now: Instant, from: NodeId, message: Message) -> Vec<Output> {
        let mut out = Vec::new();
        match message {
            Message::AppendEntries(request) => {
                self.handle_append_entries_request(now, from, request, &mut out)
            }
            Message::AppendEntriesResponse(response) => {
                self.handle_append_entries_response(now, from, response, &mut out)
            }
            Message::RequestVote(request) => {
                self.handle_request_vote_request(now, from, request, &mut out)
            }
            Message::RequestVoteResponse(response) => {
                self.handle_request_vote_response(now, from, response, &mut out)
            }
        }
        out
    }

    /// Append one allocation entry (Leader only). Calling this while not
    /// Leader is a caller bug: it is traced and otherwise ignored.
    pub fn append_log(&mut self, now: Instant, node_id: NodeId, unique_id: UniqueId) -> Vec<Output> {
        let mut out = Vec::new();
        if self.is_leader() {
            self.append_entry_as_leader(node_id, unique_id, now, &mut out);
        } else {
            warn!(%node_id, "append_log called while not leader");
            self.tracer.trace(TraceEvent::AppendLogIgnored);
        }
        out
    }

    fn effective_activity_timeout(&self) -> Duration {
        let stagger = u32::from(self.config.node_id.get().saturating_sub(1));
        self.config.base_activity_timeout + self.config.update_interval * stagger
    }

    fn is_activity_timed_out(&self, now: Instant) -> bool {
        now > self.last_activity + self.effective_activity_timeout()
    }

    fn register_activity(&mut self, now: Instant) {
        self.last_activity = now;
    }

    fn set_active_mode(&mut self, active: bool) {
        if self.active_mode != active {
            debug!(active, "active mode switch");
            self.tracer.trace(TraceEvent::ActiveSwitch { active });
            self.active_mode = active;
        }
    }

    /// Uniform reaction to a failed durable write: the current action is
    /// already aborted by the caller; demote to passive Follower and
    /// defer the next election.
    fn handle_persistent_state_error(
        &mut self,
        error: &Error<B::Error>,
        now: Instant,
        out: &mut Vec<Output>,
    ) {
        warn!(%error, "persistent state update failed, stepping down");
        self.tracer.trace(TraceEvent::PersistStateUpdateError);
        self.switch_state(ServerState::Follower, now, out);
        self.set_active_mode(false);
        self.register_activity(now); // deferring reelections
    }

    fn update_follower(&mut self, now: Instant, out: &mut Vec<Output>) {
        if self.active_mode && self.is_activity_timed_out(now) {
            self.switch_state(ServerState::Candidate, now, out);
            self.register_activity(now);
        }
    }

    fn update_candidate(&mut self, now: Instant, out: &mut Vec<Output>) {
        debug_assert!(self.active_mode);

        if self.votes_received > 0 {
            // The campaign ran for one full interval; count the ballots.
            self.tracer.trace(TraceEvent::ElectionComplete {
                votes: self.votes_received,
            });
            let won = self.votes_received >= self.cluster.quorum_size();
            debug!(votes = self.votes_received, won, "election complete");
            let next = if won {
                ServerState::Leader
            } else {
                ServerState::Follower
            };
            self.switch_state(next, now, out);
            return;
        }

        // First tick as Candidate: open a new campaign.
        if let Err(error) = self.persistent.set_voted_for(self.config.node_id) {
            self.handle_persistent_state_error(&error, now, out);
            return;
        }
        let next_term = self.persistent.current_term().next();
        if let Err(error) = self.persistent.set_current_term(next_term) {
            self.handle_persistent_state_error(&error, now, out);
            return;
        }

        self.votes_received = 1; // voting for self

        let request = RequestVoteRequest {
            term: self.persistent.current_term(),
            last_log_index: self.persistent.log().last_index(),
            last_log_term: self.persistent.log().last_entry().term,
        };
        for peer in self.cluster.peer_ids() {
            self.tracer.trace(TraceEvent::VoteRequestInitiated { peer });
            out.push(Output::Send {
                to: peer,
                message: Message::RequestVote(request),
            });
        }
    }

    fn update_leader(&mut self, now: Instant, out: &mut Vec<Output>) {
        if self.cluster.cluster_size() == 1 {
            // Nobody to replicate to, nothing to wait for.
            self.set_active_mode(false);
        }

        // Cancel the previous call before issuing a new one; the pending
        // slot is only ever valid for the immediately prior call.
        if self.pending_append_entries.take().is_some() {
            out.push(Output::CancelAppendEntries);
        }

        if self.active_mode || self.next_server_index > 0 {
            if let Some(peer) = self.cluster.server_at(self.next_server_index) {
                self.next_server_index += 1;
                if self.next_server_index >= self.cluster.num_known_servers() {
                    self.next_server_index = 0;
                }
                self.issue_append_entries(peer, out);
            }
        }

        self.propagate_commit_index();
    }

    fn issue_append_entries(&mut self, peer: NodeId, out: &mut Vec<Output>) {
        let Some(next_index) = self.cluster.next_index(peer) else {
            return;
        };
        let prev_log_index = next_index.prev().unwrap_or(LogIndex::ZERO);
        let log = self.persistent.log();
        let Some(prev_entry) = log.get(prev_log_index) else {
            debug_assert!(false, "next_index points past the log end");
            return;
        };

        let mut entries = Vec::new();
        let mut index = next_index;
        while index <= log.last_index() && entries.len() < MAX_ENTRIES_PER_REQUEST {
            if let Some(entry) = log.get(index) {
                entries.push(entry.clone());
            }
            index = index.next();
        }

        let request = AppendEntriesRequest {
            term: self.persistent.current_term(),
            prev_log_index,
            prev_log_term: prev_entry.term,
            leader_commit: self.commit_index,
            entries,
        };
        self.pending_append_entries = Some(PendingAppendEntries {
            prev_log_index,
            num_entries: request.entries.len() as u32,
        });
        out.push(Output::Send {
            to: peer,
            message: Message::AppendEntries(request),
        });
    }

    /// Leader-only: decide whether the commit index can advance, and
    /// whether the cluster is replicated and quiescent enough to stop
    /// issuing AppendEntries.
    fn propagate_commit_index(&mut self) {
        debug_assert_eq!(self.state, ServerState::Leader);
        debug_assert!(self.commit_index <= self.persistent.log().last_index());

        if self.commit_index == self.persistent.log().last_index() {
            // Everything local is committed. Passive mode is safe once the
            // log is known to be fully replicated: every match index equals
            // the commit index, every next index is beyond it, and every
            // member identity is accounted for.
            let mut match_index_equals_commit_index = true;
            let mut next_index_greater_than_commit_index = true;
            for peer in self.cluster.peers() {
                if peer.match_index != self.commit_index {
                    match_index_equals_commit_index = false;
                    break;
                }
                if peer.next_index <= self.commit_index {
                    next_index_greater_than_commit_index = false;
                    break;
                }
            }
            let all_done = match_index_equals_commit_index
                && next_index_greater_than_commit_index
                && self.cluster.is_cluster_discovered();
            self.set_active_mode(!all_done);
        } else {
            // Uncommitted entries exist; keep replicating and advance the
            // commit index one step at a time as a quorum confirms it.
            self.set_active_mode(true);

            let mut available: u8 = 1; // the local copy
            for peer in self.cluster.peers() {
                if peer.match_index > self.commit_index {
                    available += 1;
                }
            }
            if available >= self.cluster.quorum_size() {
                self.commit_index = self.commit_index.next();
                self.tracer.trace(TraceEvent::EntryCommitted {
                    index: self.commit_index,
                });
                if let Some(entry) = self.persistent.log().get(self.commit_index) {
                    self.monitor.on_log_commit(entry);
                }
            }
        }
    }

    /// Apply a state transition. A transition to the current state is a
    /// no-op. All replication and campaign bookkeeping is reset, and all
    /// in-flight calls are cancelled, before the leader monitor hears
    /// about a leadership boundary; the monitor may request appends that
    /// are applied right here.
    fn switch_state(&mut self, new_state: ServerState, now: Instant, out: &mut Vec<Output>) {
        if self.state == new_state {
            return;
        }
        debug!(from = ?self.state, to = ?new_state, "state switch");
        self.tracer.trace(TraceEvent::StateSwitch {
            from: self.state,
            to: new_state,
        });

        let old_state = self.state;
        self.state = new_state;

        let last_log_index = self.persistent.log().last_index();
        self.cluster.reset_replication_state(last_log_index);
        self.next_server_index = 0;
        self.votes_received = 0;
        self.pending_append_entries = None;
        out.push(Output::CancelRequestVotes);
        out.push(Output::CancelAppendEntries);

        if old_state == ServerState::Leader || new_state == ServerState::Leader {
            let is_leader = new_state == ServerState::Leader;
            for entry in self.monitor.on_leadership_change(is_leader) {
                // The append path re-checks leadership, so a request made
                // while stepping down is dropped, not misattributed.
                if self.is_leader() {
                    self.append_entry_as_leader(entry.node_id, entry.unique_id, now, out);
                } else {
                    self.tracer.trace(TraceEvent::AppendLogIgnored);
                }
            }
        }
    }

    fn append_entry_as_leader(
        &mut self,
        node_id: NodeId,
        unique_id: UniqueId,
        now: Instant,
        out: &mut Vec<Output>,
    ) {
        let entry = Entry {
            term: self.persistent.current_term(),
            node_id,
            unique_id,
        };
        self.tracer.trace(TraceEvent::NewLogEntry { node_id });
        if let Err(error) = self.persistent.log_mut().append(entry) {
            self.handle_persistent_state_error(&error, now, out);
        }
    }

    /// A response carried a newer term: adopt it, clear the stale vote,
    /// and step down.
    fn adopt_term_from_response(&mut self, term: Term, now: Instant, out: &mut Vec<Output>) {
        self.tracer.trace(TraceEvent::NewerTermInResponse { term });
        match self.persistent.set_current_term(term) {
            Ok(()) => {
                if let Err(error) = self.persistent.reset_voted_for() {
                    warn!(%error, "failed to clear vote while adopting term");
                    self.tracer.trace(TraceEvent::PersistStateUpdateError);
                }
            }
            Err(error) => {
                warn!(%error, "failed to persist adopted term");
                self.tracer.trace(TraceEvent::PersistStateUpdateError);
            }
        }
        self.register_activity(now); // deferring future elections
        self.switch_state(ServerState::Follower, now, out);
        self.set_active_mode(false);
    }

    /// Learn an RPC sender as a cluster member if space remains.
    fn observe_sender(&mut self, node_id: NodeId) {
        let last_log_index = self.persistent.log().last_index();
        if self.cluster.add_server(node_id, last_log_index) {
            debug!(%node_id, "discovered cluster member");
            self.tracer.trace(TraceEvent::ServerDiscovered { node_id });
        }
    }

    fn handle_append_entries_request(
        &mut self,
        now: Instant,
        from: NodeId,
        request: AppendEntriesRequest,
        out: &mut Vec<Output>,
    ) {
        self.observe_sender(from);
        if !self.cluster.is_known_server(from) {
            self.tracer.trace(TraceEvent::RequestIgnored { from });
            return;
        }

        // Catch up with the sender's term first. The request is ignored
        // outright if the persistent state cannot be updated.
        if request.term > self.persistent.current_term() {
            if let Err(error) = self.persistent.set_current_term(request.term) {
                self.handle_persistent_state_error(&error, now, out);
                return;
            }
            if let Err(error) = self.persistent.reset_voted_for() {
                self.handle_persistent_state_error(&error, now, out);
                return;
            }
        }

        let mut response = AppendEntriesResponse {
            term: self.persistent.current_term(),
            success: false,
        };

        // A stale leader gets a refusal carrying the newer term.
        if request.term < self.persistent.current_term() {
            out.push(Output::Send {
                to: from,
                message: Message::AppendEntriesResponse(response),
            });
            return;
        }

        self.register_activity(now);
        self.switch_state(ServerState::Follower, now, out);
        self.set_active_mode(false);

        // The entry preceding the new ones must exist locally.
        let prev_entry_term = match self.persistent.log().get(request.prev_log_index) {
            Some(entry) => entry.term,
            None => {
                out.push(Output::Send {
                    to: from,
                    message: Message::AppendEntriesResponse(response),
                });
                return;
            }
        };

        // Conflicting history: drop the tail from the mismatch onward and
        // let the leader walk back. Respond only if the truncation stuck.
        if prev_entry_term != request.prev_log_term {
            debug_assert!(request.prev_log_index > self.commit_index);
            match self.persistent.log_mut().truncate_from(request.prev_log_index) {
                Ok(()) => out.push(Output::Send {
                    to: from,
                    message: Message::AppendEntriesResponse(response),
                }),
                Err(error) => {
                    warn!(%error, "failed to truncate conflicting log tail");
                    self.tracer.trace(TraceEvent::PersistStateUpdateError);
                }
            }
            return;
        }

        // Matching prefix with extra local entries: clear the tail before
        // appending the leader's version.
        if request.prev_log_index < self.persistent.log().last_index() {
            debug_assert!(request.prev_log_index >= self.commit_index);
            if let Err(error) = self
                .persistent
                .log_mut()
                .truncate_after(request.prev_log_index)
            {
                warn!(%error, "failed to truncate log tail");
                self.tracer.trace(TraceEvent::PersistStateUpdateError);
                return;
            }
        }

        for entry in request.entries {
            if let Err(error) = self.persistent.log_mut().append(entry) {
                // No response: the leader will time out and walk back.
                warn!(%error, "failed to append replicated entry");
                self.tracer.trace(TraceEvent::PersistStateUpdateError);
                return;
            }
        }

        if request.leader_commit > self.commit_index {
            self.commit_index = request
                .leader_commit
                .min(self.persistent.log().last_index());
            self.tracer.trace(TraceEvent::CommitIndexUpdate {
                index: self.commit_index,
            });
        }

        response.success = true;
        out.push(Output::Send {
            to: from,
            message: Message::AppendEntriesResponse(response),
        });
    }

    fn handle_append_entries_response(
        &mut self,
        now: Instant,
        from: NodeId,
        response: AppendEntriesResponse,
        out: &mut Vec<Output>,
    ) {
        if self.state != ServerState::Leader {
            // Every state switch cancels in-flight calls, so a response in
            // any other role means the embedder delivered a stale one.
            debug_assert!(false, "AppendEntries response outside Leader state");
            self.tracer.trace(TraceEvent::ResponseIgnored { from });
            return;
        }

        if response.term > self.persistent.current_term() {
            self.adopt_term_from_response(response.term, now, out);
        } else if response.success {
            if let Some(pending) = self.pending_append_entries {
                self.cluster.increment_next_index_by(from, pending.num_entries);
                self.cluster.set_match_index(
                    from,
                    pending.prev_log_index.advanced_by(pending.num_entries),
                );
            }
        } else {
            self.cluster.decrement_next_index(from);
            self.tracer.trace(TraceEvent::AppendEntriesRejected { peer: from });
        }

        self.pending_append_entries = None;
        // The rest happens in the next periodic update.
    }

    fn handle_request_vote_request(
        &mut self,
        now: Instant,
        from: NodeId,
        request: RequestVoteRequest,
        out: &mut Vec<Output>,
    ) {
        self.tracer.trace(TraceEvent::VoteRequestReceived { from });
        self.observe_sender(from);
        if !self.cluster.is_known_server(from) {
            self.tracer.trace(TraceEvent::RequestIgnored { from });
            return;
        }

        self.set_active_mode(true);

        if request.term > self.persistent.current_term() {
            // Our term is stale, so we cannot serve as leader.
            self.switch_state(ServerState::Follower, now, out);
            if let Err(error) = self.persistent.set_current_term(request.term) {
                self.handle_persistent_state_error(&error, now, out);
                return;
            }
            if let Err(error) = self.persistent.reset_voted_for() {
                self.handle_persistent_state_error(&error, now, out);
                return;
            }
        }

        let term = self.persistent.current_term();
        let vote_granted = if request.term < term {
            false
        } else {
            let can_vote = match self.persistent.voted_for() {
                None => true,
                Some(votee) => votee == from,
            };
            let log_is_up_to_date = self
                .persistent
                .log()
                .is_other_log_up_to_date(request.last_log_index, request.last_log_term);
            can_vote && log_is_up_to_date
        };

        if vote_granted {
            // Also stepping down resolves the race where two candidates
            // would otherwise ignore each other.
            self.switch_state(ServerState::Follower, now, out);
            self.register_activity(now);
            if let Err(error) = self.persistent.set_voted_for(from) {
                warn!(%error, "failed to persist vote");
                self.tracer.trace(TraceEvent::PersistStateUpdateError);
                return;
            }
        }

        out.push(Output::Send {
            to: from,
            message: Message::RequestVoteResponse(RequestVoteResponse { term, vote_granted }),
        });
    }

    fn handle_request_vote_response(
        &mut self,
        now: Instant,
        from: NodeId,
        response: RequestVoteResponse,
        out: &mut Vec<Output>,
    ) {
        if self.state != ServerState::Candidate {
            debug_assert!(false, "RequestVote response outside Candidate state");
            self.tracer.trace(TraceEvent::ResponseIgnored { from });
            return;
        }

        self.tracer.trace(TraceEvent::VoteResponseReceived { from });

        if response.term > self.persistent.current_term() {
            self.adopt_term_from_response(response.term, now, out);
        } else if response.vote_granted {
            self.votes_received = self.votes_received.saturating_add(1);
        }
        // The election itself is resolved by the next periodic update.
    }
}
