use crate::error::Error;
use crate::storage::{self, keys, StorageBackend};
use crate::types::{Entry, LogIndex, Term};

/// Append-only, index-addressed sequence of allocation entries, durably
/// stored in the key/value backend.
///
/// Entries live under `log<index>` with the last index under
/// `log_last_index`. The whole log is mirrored in memory; every mutation
/// writes the backend first and advances the mirror only on success, so a
/// failed write leaves both views unchanged.
pub struct PersistentLog<B> {
    backend: B,
    entries: Vec<Entry>,
}

impl<B: StorageBackend> PersistentLog<B> {
    /// Load the log from the backend, creating the sentinel entry at
    /// index 0 on first initialization.
    pub fn init(backend: B) -> Result<Self, Error<B::Error>> {
        let mut log = PersistentLog {
            backend,
            entries: Vec::new(),
        };

        match storage::read_value::<B, LogIndex>(&log.backend, keys::LOG_LAST_INDEX)? {
            Some(last_index) => {
                for value in 0..=last_index.get() {
                    let key = keys::log_entry(LogIndex::new(value));
                    let entry = storage::read_value::<B, Entry>(&log.backend, &key)?
                        .ok_or_else(|| Error::Missing(key))?;
                    log.entries.push(entry);
                }
            }
            None => {
                let sentinel = Entry::sentinel();
                storage::write_value(
                    &mut log.backend,
                    &keys::log_entry(LogIndex::ZERO),
                    &sentinel,
                )?;
                storage::write_value(&mut log.backend, keys::LOG_LAST_INDEX, &LogIndex::ZERO)?;
                log.entries.push(sentinel);
            }
        }

        Ok(log)
    }

    /// Index of the newest entry. At least 0 (the sentinel).
    pub fn last_index(&self) -> LogIndex {
        LogIndex::new(self.entries.len() as u32 - 1)
    }

    pub fn last_entry(&self) -> &Entry {
        // The sentinel guarantees the log is never empty.
        &self.entries[self.entries.len() - 1]
    }

    /// The entry at `index`, or nothing if out of range.
    pub fn get(&self, index: LogIndex) -> Option<&Entry> {
        self.entries.get(index.get() as usize)
    }

    /// Durably append one entry at `last_index + 1`.
    pub fn append(&mut self, entry: Entry) -> Result<(), Error<B::Error>> {
        debug_assert!(entry.term >= self.last_entry().term);
        let index = self.last_index().next();
        storage::write_value(&mut self.backend, &keys::log_entry(index), &entry)?;
        storage::write_value(&mut self.backend, keys::LOG_LAST_INDEX, &index)?;
        self.entries.push(entry);
        Ok(())
    }

    /// Remove all entries with index greater than or equal to `index`.
    /// The sentinel is not removable; callers never pass index 0.
    pub fn truncate_from(&mut self, index: LogIndex) -> Result<(), Error<B::Error>> {
        debug_assert!(index.get() > 0);
        self.truncate_to(index.get().saturating_sub(1))
    }

    /// Remove all entries with index strictly greater than `index`.
    pub fn truncate_after(&mut self, index: LogIndex) -> Result<(), Error<B::Error>> {
        self.truncate_to(index.get())
    }

    fn truncate_to(&mut self, new_last: u32) -> Result<(), Error<B::Error>> {
        if new_last >= self.last_index().get() {
            return Ok(());
        }
        // Making the tail unreachable through the last-index key is enough;
        // the orphaned entry keys are overwritten by future appends.
        storage::write_value(&mut self.backend, keys::LOG_LAST_INDEX, &LogIndex::new(new_last))?;
        self.entries.truncate(new_last as usize + 1);
        Ok(())
    }

    /// Raft's log comparison (§5.4.1): the other log is at least as
    /// up-to-date iff its last term is higher, or the terms are equal and
    /// its last index is at least ours.
    pub fn is_other_log_up_to_date(&self, other_last_index: LogIndex, other_last_term: Term) -> bool {
        let self_last_term = self.last_entry().term;
        if other_last_term != self_last_term {
            other_last_term > self_last_term
        } else {
            other_last_index >= self.last_index()
        }
    }

    pub(crate) fn backend(&self) -> &B {
        &self.backend
    }

    pub(crate) fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;
    use crate::types::NodeId;

    fn entry(term: u32, node_id: u8) -> Entry {
        Entry {
            term: Term::new(term),
            node_id: NodeId::new(node_id),
            unique_id: [node_id; 16],
        }
    }

    #[test]
    fn init_creates_committed_sentinel() {
        let log = PersistentLog::init(MemoryStorage::new()).unwrap();
        assert_eq!(log.last_index(), LogIndex::ZERO);
        assert_eq!(log.get(LogIndex::ZERO), Some(&Entry::sentinel()));
        assert_eq!(log.get(LogIndex::new(1)), None);
    }

    #[test]
    fn append_then_get() {
        let mut log = PersistentLog::init(MemoryStorage::new()).unwrap();
        log.append(entry(1, 42)).unwrap();
        log.append(entry(1, 43)).unwrap();

        assert_eq!(log.last_index(), LogIndex::new(2));
        assert_eq!(log.get(LogIndex::new(1)), Some(&entry(1, 42)));
        assert_eq!(log.last_entry(), &entry(1, 43));
    }

    #[test]
    fn log_survives_reinit() {
        let storage = MemoryStorage::new();
        {
            let mut log = PersistentLog::init(storage.clone()).unwrap();
            log.append(entry(1, 10)).unwrap();
            log.append(entry(2, 11)).unwrap();
        }
        let log = PersistentLog::init(storage).unwrap();
        assert_eq!(log.last_index(), LogIndex::new(2));
        assert_eq!(log.get(LogIndex::new(2)), Some(&entry(2, 11)));
    }

    #[test]
    fn truncate_from_removes_index_and_above() {
        let storage = MemoryStorage::new();
        let mut log = PersistentLog::init(storage.clone()).unwrap();
        for id in 1..=3 {
            log.append(entry(1, id)).unwrap();
        }

        log.truncate_from(LogIndex::new(2)).unwrap();
        assert_eq!(log.last_index(), LogIndex::new(1));
        assert_eq!(log.get(LogIndex::new(2)), None);

        // Durable view agrees after a reload.
        let log = PersistentLog::init(storage).unwrap();
        assert_eq!(log.last_index(), LogIndex::new(1));
    }

    #[test]
    fn truncate_after_keeps_the_given_index() {
        let mut log = PersistentLog::init(MemoryStorage::new()).unwrap();
        for id in 1..=3 {
            log.append(entry(1, id)).unwrap();
        }

        log.truncate_after(LogIndex::new(1)).unwrap();
        assert_eq!(log.last_index(), LogIndex::new(1));
        assert_eq!(log.get(LogIndex::new(1)), Some(&entry(1, 1)));

        // Truncating at or past the end is a no-op.
        log.truncate_after(LogIndex::new(9)).unwrap();
        assert_eq!(log.last_index(), LogIndex::new(1));
    }

    #[test]
    fn failed_append_changes_nothing() {
        let storage = MemoryStorage::new();
        let mut log = PersistentLog::init(storage.clone()).unwrap();
        log.append(entry(1, 1)).unwrap();

        storage.set_fail_writes(true);
        assert!(log.append(entry(1, 2)).is_err());
        assert_eq!(log.last_index(), LogIndex::new(1));
        assert_eq!(log.get(LogIndex::new(2)), None);

        storage.set_fail_writes(false);
        let log = PersistentLog::init(storage).unwrap();
        assert_eq!(log.last_index(), LogIndex::new(1));
    }

    #[test]
    fn failed_truncate_changes_nothing() {
        let storage = MemoryStorage::new();
        let mut log = PersistentLog::init(storage.clone()).unwrap();
        log.append(entry(1, 1)).unwrap();
        log.append(entry(1, 2)).unwrap();

        storage.set_fail_writes(true);
        assert!(log.truncate_from(LogIndex::new(2)).is_err());
        assert_eq!(log.last_index(), LogIndex::new(2));
    }

    #[test]
    fn up_to_date_comparison() {
        let mut log = PersistentLog::init(MemoryStorage::new()).unwrap();
        for _ in 0..5 {
            log.append(entry(3, 1)).unwrap();
        }
        // Local log: last index 5, last term 3.
        assert!(!log.is_other_log_up_to_date(LogIndex::ZERO, Term::ZERO));
        assert!(!log.is_other_log_up_to_date(LogIndex::new(4), Term::new(3)));
        assert!(log.is_other_log_up_to_date(LogIndex::new(5), Term::new(3)));
        assert!(log.is_other_log_up_to_date(LogIndex::new(9), Term::new(3)));
        assert!(log.is_other_log_up_to_date(LogIndex::new(1), Term::new(4)));
        assert!(!log.is_other_log_up_to_date(LogIndex::new(9), Term::new(2)));
    }

    #[test]
    fn empty_logs_consider_each_other_up_to_date() {
        let log = PersistentLog::init(MemoryStorage::new()).unwrap();
        assert!(log.is_other_log_up_to_date(LogIndex::ZERO, Term::ZERO));
    }
}
