//! Fingerprint Table: the Config Engine's in-memory record of watched keys.

use std::sync::Arc;

use indexmap::IndexMap;
use md5::{Digest, Md5};
use parking_lot::Mutex;

use crate::config::listener::ConfigChangeListener;
use crate::model::{ConfigKey, WatchedConfig};

pub fn compute_md5(content: &str) -> String {
    let mut hasher = Md5::new();
    hasher.update(content.as_bytes());
    const_hex::encode(hasher.finalize())
}

struct Entry {
    watched: WatchedConfig,
    listener: Option<Arc<dyn ConfigChangeListener>>,
}

/// Ordered, insertion-preserving map from [`ConfigKey`] to [`WatchedConfig`].
///
/// Single-writer: only the Config Engine's long-poll worker mutates entries
/// after creation. Guarded by one mutex; callers must not hold it across I/O
/// — take a snapshot via [`FingerprintTable::snapshot`] first.
pub struct FingerprintTable {
    entries: Mutex<IndexMap<ConfigKey, Entry>>,
}

impl FingerprintTable {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(IndexMap::new()),
        }
    }

    /// Insert a new watched key or replace the listener of an existing one.
    /// Re-inserting the same key with a different listener replaces it in
    /// place; content/hash are left untouched.
    pub fn upsert(
        &self,
        key: ConfigKey,
        initial_content: String,
        listener: Option<Arc<dyn ConfigChangeListener>>,
    ) {
        let mut entries = self.entries.lock();
        match entries.get_mut(&key) {
            Some(entry) => {
                if listener.is_some() {
                    entry.listener = listener;
                }
            }
            None => {
                entries.insert(
                    key.clone(),
                    Entry {
                        watched: WatchedConfig::new(key, initial_content),
                        listener,
                    },
                );
            }
        }
    }

    pub fn remove(&self, key: &ConfigKey) {
        self.entries.lock().shift_remove(key);
    }

    pub fn lookup(&self, key: &ConfigKey) -> Option<WatchedConfig> {
        self.entries.lock().get(key).map(|e| e.watched.clone())
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Copy of every watched entry, safe to hold across an `await`.
    pub fn snapshot(&self) -> Vec<WatchedConfig> {
        self.entries.lock().values().map(|e| e.watched.clone()).collect()
    }

    /// Update a key's content/hash. Returns `None` if the key is no longer
    /// watched, otherwise the entry's listener (if any) alongside whether
    /// the content actually changed — a re-fetch that yields the same
    /// content still refreshes the hash but must not fire the callback.
    pub fn update_content(
        &self,
        key: &ConfigKey,
        content: String,
    ) -> Option<ContentUpdate> {
        let mut entries = self.entries.lock();
        let entry = entries.get_mut(key)?;
        let changed = entry.watched.content != content;
        entry.watched.set_content(content);
        Some(ContentUpdate {
            changed,
            listener: entry.listener.clone(),
        })
    }
}

/// Outcome of [`FingerprintTable::update_content`].
pub struct ContentUpdate {
    pub changed: bool,
    pub listener: Option<Arc<dyn ConfigChangeListener>>,
}

impl Default for FingerprintTable {
    fn default() -> Self {
        Self::new()
    }
}
