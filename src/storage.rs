use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::Error;

/// Keys under which the durable state lives. Values are JSON-encoded.
pub mod keys {
    use crate::types::LogIndex;

    pub const CURRENT_TERM: &str = "current_term";
    pub const VOTED_FOR: &str = "voted_for";
    pub const CLUSTER_SIZE: &str = "cluster_size";
    pub const LOG_LAST_INDEX: &str = "log_last_index";

    pub fn log_entry(index: LogIndex) -> String {
        format!("log{}", index.get())
    }
}

/// Durable key/value storage that survives resets.
///
/// Writes must be acknowledged (synced to the backing medium) before
/// `set` returns `Ok`. Reads are served from state loaded at open time,
/// so `get` is infallible.
pub trait StorageBackend {
    type Error: std::error::Error + 'static;

    /// Fetch the value stored under `key`, if any.
    fn get(&self, key: &str) -> Option<Vec<u8>>;

    /// Durably store `value` under `key`, replacing any previous value.
    fn set(&mut self, key: &str, value: &[u8]) -> Result<(), Self::Error>;
}

/// Decode the JSON value stored under `key`, if present.
pub(crate) fn read_value<B: StorageBackend, T: DeserializeOwned>(
    backend: &B,
    key: &str,
) -> Result<Option<T>, Error<B::Error>> {
    match backend.get(key) {
        None => Ok(None),
        Some(bytes) => serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|source| Error::Corrupt {
                key: key.to_string(),
                source,
            }),
    }
}

/// Encode `value` as JSON and durably store it under `key`.
pub(crate) fn write_value<B: StorageBackend, T: Serialize>(
    backend: &mut B,
    key: &str,
    value: &T,
) -> Result<(), Error<B::Error>> {
    let bytes = serde_json::to_vec(value).map_err(Error::Encode)?;
    backend.set(key, &bytes).map_err(Error::Storage)
}

/// Error produced by [`MemoryStorage`] while its failure switch is on.
#[derive(Debug, thiserror::Error)]
#[error("injected write failure")]
pub struct WriteFailure;

#[derive(Default)]
struct MemoryInner {
    map: HashMap<String, Vec<u8>>,
    fail_writes: bool,
}

/// In-memory backend for tests and simulation.
///
/// Clones share the same underlying map, so a handle kept outside the
/// core observes (and can fail) the core's writes; this stands in for
/// reopening a real backend after a restart.
#[derive(Clone, Default)]
pub struct MemoryStorage {
    inner: Rc<RefCell<MemoryInner>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// While set, every `set` call fails with [`WriteFailure`]. Shared
    /// across clones.
    pub fn set_fail_writes(&self, fail: bool) {
        self.inner.borrow_mut().fail_writes = fail;
    }

    pub fn contains(&self, key: &str) -> bool {
        self.inner.borrow().map.contains_key(key)
    }
}

impl StorageBackend for MemoryStorage {
    type Error = WriteFailure;

    fn get(&self, key: &str) -> Option<Vec<u8>> {
        self.inner.borrow().map.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: &[u8]) -> Result<(), WriteFailure> {
        let mut inner = self.inner.borrow_mut();
        if inner.fail_writes {
            return Err(WriteFailure);
        }
        inner.map.insert(key.to_string(), value.to_vec());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::LogIndex;

    #[test]
    fn set_and_get_round_trip() {
        let mut storage = MemoryStorage::new();
        storage.set(keys::CURRENT_TERM, b"5").unwrap();
        assert_eq!(storage.get(keys::CURRENT_TERM), Some(b"5".to_vec()));
        assert_eq!(storage.get(keys::VOTED_FOR), None);
    }

    #[test]
    fn clones_share_state() {
        let mut storage = MemoryStorage::new();
        let observer = storage.clone();
        storage.set("k", b"v").unwrap();
        assert_eq!(observer.get("k"), Some(b"v".to_vec()));
    }

    #[test]
    fn failure_switch_rejects_writes_and_preserves_state() {
        let mut storage = MemoryStorage::new();
        storage.set("k", b"old").unwrap();
        storage.set_fail_writes(true);
        assert!(storage.set("k", b"new").is_err());
        assert_eq!(storage.get("k"), Some(b"old".to_vec()));
        storage.set_fail_writes(false);
        storage.set("k", b"new").unwrap();
        assert_eq!(storage.get("k"), Some(b"new".to_vec()));
    }

    #[test]
    fn log_entry_keys_are_index_addressed() {
        assert_eq!(keys::log_entry(LogIndex::ZERO), "log0");
        assert_eq!(keys::log_entry(LogIndex::new(17)), "log17");
    }
}
