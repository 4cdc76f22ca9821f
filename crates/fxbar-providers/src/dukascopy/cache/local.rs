//! Local filesystem cache tier.
//!
//! Vendor paths are stored verbatim under a root directory (default
//! `${HOME}/.dukascopy-cache`), with intermediate directories created on
//! demand. Writes go to a temporary file first and are renamed into place so
//! readers never observe a half-written payload.

use crate::dukascopy::cache::{ContentKind, TickFileCache, TierCache, TierStore};
use crate::dukascopy::errors::DukascopyError;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

const TO_KB: u64 = 1_024;

/// Filesystem storage backend for a cache tier.
pub struct LocalStore {
    root: PathBuf,
}

impl LocalStore {
    pub fn new(root: PathBuf) -> Self {
        if fs::create_dir_all(&root).is_ok() {
            info!("local cache at {}", root.display());
        }
        LocalStore { root }
    }

    fn resolve(&self, path: &str) -> PathBuf {
        self.root.join(path)
    }

    /// Total size in bytes of everything stored under the cache root.
    pub fn size_bytes(&self) -> Result<u64, DukascopyError> {
        fn walk(dir: &Path) -> std::io::Result<u64> {
            let mut total = 0;
            for entry in fs::read_dir(dir)? {
                let entry = entry?;
                let metadata = entry.metadata()?;
                if metadata.is_dir() {
                    total += walk(&entry.path())?;
                } else {
                    total += metadata.len();
                }
            }
            Ok(total)
        }
        Ok(walk(&self.root)?)
    }

    /// Delete every cached entry, leaving the root directory in place.
    pub fn remove_all(&self) -> Result<(), DukascopyError> {
        warn!("removing cache at {}", self.root.display());
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            if entry.metadata()?.is_dir() {
                fs::remove_dir_all(entry.path())?;
            } else {
                fs::remove_file(entry.path())?;
            }
        }
        Ok(())
    }
}

impl TierStore for LocalStore {
    fn name(&self) -> &'static str {
        "LocalCache"
    }

    fn bar_name(&self) -> &'static str {
        "LocalBarCache"
    }

    fn check(&self, path: &str) -> Result<Option<Vec<u8>>, DukascopyError> {
        let file = self.resolve(path);
        if file.is_file() {
            debug!("found in local cache {}", file.display());
            Ok(Some(fs::read(file)?))
        } else {
            Ok(None)
        }
    }

    fn exists(&self, path: &str) -> Result<bool, DukascopyError> {
        Ok(self.resolve(path).is_file())
    }

    fn save(&self, path: &str, data: &[u8], _kind: ContentKind) -> Result<(), DukascopyError> {
        let target = self.resolve(path);
        let parent = target
            .parent()
            .ok_or_else(|| DukascopyError::state(format!("cache path {path} has no parent")))?;
        fs::create_dir_all(parent)?;

        let mut temp = tempfile::NamedTempFile::new_in(parent)?;
        temp.write_all(data)?;
        temp.persist(&target).map_err(|error| error.error)?;
        debug!(
            "saved {path} in local cache {} {}KB",
            target.display(),
            data.len() as u64 / TO_KB
        );
        Ok(())
    }
}

/// Local-filesystem-first tick cache with a fallback chain.
pub type LocalCache = TierCache<LocalStore>;

impl LocalCache {
    /// Tier rooted at `root`, consulting `fallback` on miss.
    pub fn with_root(root: PathBuf, fallback: Arc<dyn TickFileCache>) -> Self {
        TierCache::new(LocalStore::new(root), fallback)
    }

    /// Total size in bytes of the cached files.
    pub fn cache_size_bytes(&self) -> Result<u64, DukascopyError> {
        self.store().size_bytes()
    }

    /// Delete all cached entries but keep the root directory.
    pub fn remove_cache(&self) -> Result<(), DukascopyError> {
        self.store().remove_all()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn save_then_check_round_trips() {
        let root = tempfile::tempdir().unwrap();
        let store = LocalStore::new(root.path().to_path_buf());
        let path = "EURUSD/2020/00/02/05h_ticks.bi5";

        assert!(store.check(path).unwrap().is_none());
        assert!(!store.exists(path).unwrap());

        store.save(path, b"payload", ContentKind::Ticks).unwrap();
        assert!(store.exists(path).unwrap());
        assert_eq!(store.check(path).unwrap().unwrap(), b"payload");

        // The vendor path shape is preserved verbatim on disk.
        assert!(root
            .path()
            .join("EURUSD/2020/00/02/05h_ticks.bi5")
            .is_file());
    }

    #[test]
    fn size_counts_recursively_and_remove_keeps_root() {
        let root = tempfile::tempdir().unwrap();
        let store = LocalStore::new(root.path().to_path_buf());
        store
            .save("EURUSD/2020/00/02/05h_ticks.bi5", &[0u8; 100], ContentKind::Ticks)
            .unwrap();
        store
            .save("bars/H1/EURUSD/2020/00/02.json", &[0u8; 50], ContentKind::Bars)
            .unwrap();

        assert_eq!(store.size_bytes().unwrap(), 150);

        store.remove_all().unwrap();
        assert_eq!(store.size_bytes().unwrap(), 0);
        assert!(root.path().is_dir());
    }
}
