use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use crate::storage::StorageBackend;

/// Error type for FileStorage operations.
#[derive(Debug, thiserror::Error)]
pub enum FileStorageError {
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),
    #[error("invalid storage key: {0:?}")]
    InvalidKey(String),
}

/// Disk-backed storage. Each key is one file inside `dir`, named after
/// the key; the file content is the value. Writes go through a temp file
/// with fsync and rename so a value is either the old bytes or the new
/// bytes after a power loss, never a torn mix.
///
/// The in-memory map acts as a write-through cache: reads are served from
/// memory, writes update disk first and memory only on success.
pub struct FileStorage {
    dir: PathBuf,
    values: HashMap<String, Vec<u8>>,
}

impl FileStorage {
    /// Open (or create) storage rooted at `dir`, loading every existing
    /// key into memory.
    pub fn open(dir: &Path) -> Result<Self, FileStorageError> {
        fs::create_dir_all(dir)?;
        let mut values = HashMap::new();
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let name = match entry.file_name().into_string() {
                Ok(name) => name,
                Err(_) => continue,
            };
            if name.ends_with(".tmp") {
                // Leftover from an interrupted write; the rename never
                // happened, so the old value (if any) is authoritative.
                let _ = fs::remove_file(entry.path());
                continue;
            }
            if !is_valid_key(&name) {
                continue;
            }
            values.insert(name, fs::read(entry.path())?);
        }
        Ok(Self {
            dir: dir.to_path_buf(),
            values,
        })
    }

    fn key_path(&self, key: &str) -> PathBuf {
        self.dir.join(key)
    }

    /// Write temp file, fsync, rename over the target, fsync the directory
    /// so the rename is visible after a crash.
    fn flush_value(&self, key: &str, value: &[u8]) -> Result<(), FileStorageError> {
        let tmp = self.dir.join(format!("{key}.tmp"));
        let mut file = File::create(&tmp)?;
        file.write_all(value)?;
        file.sync_all()?;
        drop(file);
        fs::rename(&tmp, self.key_path(key))?;
        File::open(&self.dir)?.sync_all()?;
        Ok(())
    }
}

/// Keys double as file names, so only a conservative character set is
/// accepted.
fn is_valid_key(key: &str) -> bool {
    !key.is_empty()
        && key.len() <= 64
        && key
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_')
}

impl StorageBackend for FileStorage {
    type Error = FileStorageError;

    fn get(&self, key: &str) -> Option<Vec<u8>> {
        self.values.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: &[u8]) -> Result<(), FileStorageError> {
        if !is_valid_key(key) {
            return Err(FileStorageError::InvalidKey(key.to_string()));
        }
        self.flush_value(key, value)?;
        self.values.insert(key.to_string(), value.to_vec());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn values_survive_reopen() {
        let tmp = tempfile::tempdir().expect("tempdir");
        {
            let mut s = FileStorage::open(tmp.path()).expect("open");
            s.set("current_term", b"7").expect("set");
            s.set("log0", b"{}").expect("set");
        }
        let s = FileStorage::open(tmp.path()).expect("reopen");
        assert_eq!(s.get("current_term"), Some(b"7".to_vec()));
        assert_eq!(s.get("log0"), Some(b"{}".to_vec()));
        assert_eq!(s.get("voted_for"), None);
    }

    #[test]
    fn overwrite_replaces_value() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let mut s = FileStorage::open(tmp.path()).expect("open");
        s.set("k", b"one").expect("set");
        s.set("k", b"two").expect("set");
        assert_eq!(s.get("k"), Some(b"two".to_vec()));

        let s = FileStorage::open(tmp.path()).expect("reopen");
        assert_eq!(s.get("k"), Some(b"two".to_vec()));
    }

    #[test]
    fn rejects_hostile_keys() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let mut s = FileStorage::open(tmp.path()).expect("open");
        assert!(s.set("../escape", b"x").is_err());
        assert!(s.set("", b"x").is_err());
        assert!(s.set("a/b", b"x").is_err());
    }

    #[test]
    fn stale_tmp_files_are_discarded_on_open() {
        let tmp = tempfile::tempdir().expect("tempdir");
        {
            let mut s = FileStorage::open(tmp.path()).expect("open");
            s.set("k", b"good").expect("set");
        }
        fs::write(tmp.path().join("k.tmp"), b"torn").expect("write tmp");
        let s = FileStorage::open(tmp.path()).expect("reopen");
        assert_eq!(s.get("k"), Some(b"good".to_vec()));
        assert!(!tmp.path().join("k.tmp").exists());
    }
}
