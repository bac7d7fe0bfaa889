use crate::error::Error;
use crate::log::PersistentLog;
use crate::storage::{self, keys, StorageBackend};
use crate::types::{NodeId, Term};

/// The durable triple `(log, current_term, voted_for)`.
///
/// Setters commit to the backend before touching the in-memory mirror and
/// report the write outcome. `set_current_term` does not reset the vote;
/// a caller adopting a newer term sequences both writes itself.
pub struct PersistentState<B> {
    log: PersistentLog<B>,
    current_term: Term,
    voted_for: Option<NodeId>,
}

impl<B: StorageBackend> PersistentState<B> {
    /// Load term, vote, and log from the backend, writing defaults back
    /// on first initialization so a restart always finds them.
    pub fn init(backend: B) -> Result<Self, Error<B::Error>> {
        let mut log = PersistentLog::init(backend)?;

        let current_term = match storage::read_value(log.backend(), keys::CURRENT_TERM)? {
            Some(term) => term,
            None => {
                storage::write_value(log.backend_mut(), keys::CURRENT_TERM, &Term::ZERO)?;
                Term::ZERO
            }
        };

        let voted_for = match storage::read_value(log.backend(), keys::VOTED_FOR)? {
            Some(vote) => vote,
            None => {
                let none: Option<NodeId> = None;
                storage::write_value(log.backend_mut(), keys::VOTED_FOR, &none)?;
                none
            }
        };

        Ok(Self {
            log,
            current_term,
            voted_for,
        })
    }

    pub fn current_term(&self) -> Term {
        self.current_term
    }

    pub fn voted_for(&self) -> Option<NodeId> {
        self.voted_for
    }

    pub fn log(&self) -> &PersistentLog<B> {
        &self.log
    }

    pub fn log_mut(&mut self) -> &mut PersistentLog<B> {
        &mut self.log
    }

    pub fn set_current_term(&mut self, term: Term) -> Result<(), Error<B::Error>> {
        debug_assert!(term >= self.current_term);
        storage::write_value(self.log.backend_mut(), keys::CURRENT_TERM, &term)?;
        self.current_term = term;
        Ok(())
    }

    pub fn set_voted_for(&mut self, node_id: NodeId) -> Result<(), Error<B::Error>> {
        storage::write_value(self.log.backend_mut(), keys::VOTED_FOR, &Some(node_id))?;
        self.voted_for = Some(node_id);
        Ok(())
    }

    pub fn reset_voted_for(&mut self) -> Result<(), Error<B::Error>> {
        let none: Option<NodeId> = None;
        storage::write_value(self.log.backend_mut(), keys::VOTED_FOR, &none)?;
        self.voted_for = None;
        Ok(())
    }
}
