use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::error::SessionStoreError;
use crate::keys::is_valid_key;

const FILE_EXTENSION: &str = "json";

/// Durable string-keyed store the session snapshots are written to.
pub trait KeyValueStore: Send {
    fn get(&self, key: &str) -> Result<Option<String>, SessionStoreError>;

    /// Idempotent upsert.
    fn set(&mut self, key: &str, value: &str) -> Result<(), SessionStoreError>;

    /// Returns true when a value was removed.
    fn delete(&mut self, key: &str) -> Result<bool, SessionStoreError>;

    fn keys(&self) -> Result<Vec<String>, SessionStoreError>;
}

/// One JSON file per key inside a directory.
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, SessionStoreError> {
        let root = root.into();
        fs::create_dir_all(&root)
            .map_err(|source| SessionStoreError::io("creating store directory", &root, source))?;
        Ok(Self { root })
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, SessionStoreError> {
        if !is_valid_key(key) {
            return Err(SessionStoreError::InvalidKey {
                key: key.to_string(),
            });
        }
        Ok(self.root.join(format!("{key}.{FILE_EXTENSION}")))
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, SessionStoreError> {
        let path = self.path_for(key)?;
        match fs::read_to_string(&path) {
            Ok(value) => Ok(Some(value)),
            Err(error) if error.kind() == ErrorKind::NotFound => Ok(None),
            Err(source) => Err(SessionStoreError::io("reading snapshot", &path, source)),
        }
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), SessionStoreError> {
        let path = self.path_for(key)?;
        let staging = path.with_extension(format!("{FILE_EXTENSION}.tmp"));
        fs::write(&staging, value)
            .map_err(|source| SessionStoreError::io("writing snapshot", &staging, source))?;
        fs::rename(&staging, &path)
            .map_err(|source| SessionStoreError::io("replacing snapshot", &path, source))
    }

    fn delete(&mut self, key: &str) -> Result<bool, SessionStoreError> {
        let path = self.path_for(key)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(error) if error.kind() == ErrorKind::NotFound => Ok(false),
            Err(source) => Err(SessionStoreError::io("deleting snapshot", &path, source)),
        }
    }

    fn keys(&self) -> Result<Vec<String>, SessionStoreError> {
        let entries = fs::read_dir(&self.root)
            .map_err(|source| SessionStoreError::io("listing store directory", &self.root, source))?;

        let mut keys = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| {
                SessionStoreError::io("listing store directory", &self.root, source)
            })?;
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some(FILE_EXTENSION) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) {
                if is_valid_key(stem) {
                    keys.push(stem.to_string());
                }
            }
        }
        keys.sort();
        Ok(keys)
    }
}

#[derive(Debug, Default)]
struct MemoryState {
    entries: BTreeMap<String, String>,
    writes: usize,
}

/// In-process store; clones share the same entries.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `set` calls observed so far.
    #[must_use]
    pub fn write_count(&self) -> usize {
        lock_unpoisoned(&self.state).writes
    }

    #[must_use]
    pub fn raw(&self, key: &str) -> Option<String> {
        lock_unpoisoned(&self.state).entries.get(key).cloned()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, SessionStoreError> {
        Ok(self.raw(key))
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), SessionStoreError> {
        let mut state = lock_unpoisoned(&self.state);
        state.entries.insert(key.to_string(), value.to_string());
        state.writes += 1;
        Ok(())
    }

    fn delete(&mut self, key: &str) -> Result<bool, SessionStoreError> {
        Ok(lock_unpoisoned(&self.state).entries.remove(key).is_some())
    }

    fn keys(&self) -> Result<Vec<String>, SessionStoreError> {
        Ok(lock_unpoisoned(&self.state).entries.keys().cloned().collect())
    }
}

fn lock_unpoisoned<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
