//! Cache tier configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Environment variable that overrides the local cache root.
pub const LOCAL_CACHE_DIR_ENV: &str = "localCacheDir";

const DEFAULT_CACHE_DIR_NAME: &str = ".dukascopy-cache";

/// Locations and sizing for the cache tiers.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CacheConfig {
    /// Root directory of the local filesystem tier. When unset, the
    /// `localCacheDir` environment variable is honored, then
    /// `${HOME}/.dukascopy-cache`.
    pub local_dir: Option<PathBuf>,

    /// Bucket of the S3 tier; the tier is skipped when unset.
    pub s3_bucket: Option<String>,

    /// Worker threads for the cache primer. Auto-detected when unset.
    pub worker_threads: Option<usize>,
}

impl CacheConfig {
    /// Resolve the local cache root: explicit setting, `localCacheDir`
    /// environment override, then `${HOME}/.dukascopy-cache`.
    pub fn resolve_local_dir(&self) -> PathBuf {
        if let Some(dir) = &self.local_dir {
            return dir.clone();
        }
        if let Ok(dir) = std::env::var(LOCAL_CACHE_DIR_ENV) {
            if !dir.is_empty() {
                return PathBuf::from(dir).join(DEFAULT_CACHE_DIR_NAME);
            }
        }
        let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
        PathBuf::from(home).join(DEFAULT_CACHE_DIR_NAME)
    }

    /// Worker threads for the primer, auto-detecting from the system when
    /// not configured.
    pub fn worker_threads(&self) -> usize {
        self.worker_threads.unwrap_or_else(num_cpus::get)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_dir_wins_then_env_then_home() {
        let explicit = CacheConfig {
            local_dir: Some(PathBuf::from("/data/ticks")),
            ..CacheConfig::default()
        };
        assert_eq!(explicit.resolve_local_dir(), PathBuf::from("/data/ticks"));

        // Environment override, exercised and cleaned up in one test to
        // avoid cross-test races on process state.
        let config = CacheConfig::default();
        std::env::set_var(LOCAL_CACHE_DIR_ENV, "/var/cache");
        assert_eq!(
            config.resolve_local_dir(),
            PathBuf::from("/var/cache").join(DEFAULT_CACHE_DIR_NAME)
        );
        std::env::remove_var(LOCAL_CACHE_DIR_ENV);

        let fallback = config.resolve_local_dir();
        assert!(fallback.ends_with(DEFAULT_CACHE_DIR_NAME));
    }

    #[test]
    fn worker_threads_auto_detect() {
        let config = CacheConfig::default();
        assert!(config.worker_threads() > 0);

        let pinned = CacheConfig {
            worker_threads: Some(3),
            ..CacheConfig::default()
        };
        assert_eq!(pinned.worker_threads(), 3);
    }
}
