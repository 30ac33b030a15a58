//! Local Cache Store: disk-backed last-known-good config content.
//!
//! One file per [`ConfigKey`], named `dataId_group[_tenant]`, holding the
//! raw config string. Writes are best-effort — failures are logged, never
//! surfaced to the caller, so a cache outage never breaks a publish/get.

use std::path::{Path, PathBuf};

use tracing::warn;

use crate::model::ConfigKey;

pub struct LocalCacheStore {
    cache_dir: PathBuf,
}

impl LocalCacheStore {
    pub fn new(cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            cache_dir: cache_dir.into(),
        }
    }

    fn path_for(&self, key: &ConfigKey) -> PathBuf {
        self.cache_dir.join(key.cache_file_name())
    }

    /// Read the cached content for `key`. Returns `None` for a missing
    /// entry, which is distinct from a present-but-empty file.
    pub fn read_config(&self, key: &ConfigKey) -> Option<String> {
        let path = self.path_for(key);
        match std::fs::read_to_string(&path) {
            Ok(content) => Some(content),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to read local config cache");
                None
            }
        }
    }

    /// Best-effort write-through; logs and swallows any failure.
    pub fn write_config(&self, key: &ConfigKey, content: &str) {
        if let Err(e) = self.ensure_dir() {
            warn!(dir = %self.cache_dir.display(), error = %e, "failed to create cache directory");
            return;
        }

        let path = self.path_for(key);
        if let Err(e) = std::fs::write(&path, content) {
            warn!(path = %path.display(), error = %e, "failed to write local config cache");
        }
    }

    pub fn remove_config(&self, key: &ConfigKey) {
        let path = self.path_for(key);
        if let Err(e) = std::fs::remove_file(&path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(path = %path.display(), error = %e, "failed to remove local config cache");
            }
        }
    }

    fn ensure_dir(&self) -> std::io::Result<()> {
        if !self.cache_dir.exists() {
            std::fs::create_dir_all(&self.cache_dir)?;
        }
        Ok(())
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }
}
