//! Read-through cache tiers for raw tick files and day-level bar results.
//!
//! Tiers are decorators: each holds a fallback tier, checks its own store
//! first and on miss fetches from the fallback, persists the payload and
//! serves it. The chain terminates at the rate-limited direct fetcher for
//! ticks and at on-the-fly tick aggregation for bars. Statistics from every
//! tier compose into a tree so one report covers the whole chain.

pub mod direct_bars;
pub mod local;
pub mod primer;
pub mod s3;
pub mod stats;

use crate::dukascopy::criteria::BarCriteria;
use crate::dukascopy::errors::DukascopyError;
use crate::dukascopy::search::TickSearch;
use fxbar_core::json::{to_json_array, JsonArrayStream};
use fxbar_core::Bar;
use parking_lot::Mutex;
use stats::{combine, STAT_HIT, STAT_MISS};
use std::sync::Arc;
use tracing::{debug, warn};

pub use direct_bars::DirectBarCache;
pub use local::{LocalCache, LocalStore};
pub use primer::CachePrimer;
pub use s3::{AwsObjectStore, ObjectStore, S3Cache, S3Store};
pub use stats::{CacheStats, CacheStatistics};

/// Serves opaque hourly archive payloads keyed by vendor path.
pub trait TickFileCache: Send + Sync {
    /// The archive bytes for a vendor path, from this tier or its fallbacks.
    fn fetch(&self, path: &str) -> Result<Vec<u8>, DukascopyError>;

    /// Statistics tree covering this tier and everything below it.
    fn statistics(&self) -> Arc<dyn CacheStatistics>;

    /// Build the bar cache mirroring this tier chain's configuration.
    fn create_bar_cache(&self, tick_search: Arc<TickSearch>) -> Box<dyn DayBarCache>;
}

/// Serves one UTC day's worth of bars for a criteria and the day's hourly
/// paths. The first path of the day anchors the cache key.
pub trait DayBarCache: Send + Sync {
    fn day_of_bars(
        &self,
        criteria: &BarCriteria,
        day_paths: &[String],
    ) -> Result<Vec<Bar>, DukascopyError>;

    fn statistics(&self) -> Arc<dyn CacheStatistics>;
}

/// What a stored payload contains; selects the object content type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentKind {
    Ticks,
    Bars,
}

impl ContentKind {
    pub fn content_type(&self) -> &'static str {
        match self {
            ContentKind::Ticks => "application/octet-stream",
            ContentKind::Bars => "application/json",
        }
    }
}

/// Storage backend used by a read-through tier.
pub trait TierStore: Send + Sync {
    /// Display name of the tick tier backed by this store.
    fn name(&self) -> &'static str;

    /// Display name of the bar tier backed by this store.
    fn bar_name(&self) -> &'static str;

    /// The stored payload for a path, or `None` on a miss.
    fn check(&self, path: &str) -> Result<Option<Vec<u8>>, DukascopyError>;

    /// Whether a payload exists without reading it.
    fn exists(&self, path: &str) -> Result<bool, DukascopyError>;

    /// Persist a payload under a path.
    fn save(&self, path: &str, data: &[u8], kind: ContentKind) -> Result<(), DukascopyError>;
}

/// Read-through tick tier over a [`TierStore`], decorating a fallback cache.
pub struct TierCache<S: TierStore> {
    store: Arc<S>,
    fallback: Arc<dyn TickFileCache>,
    tier_stats: Arc<CacheStats>,
    stats_tree: Arc<dyn CacheStatistics>,
    persist_lock: Mutex<()>,
}

impl<S: TierStore + 'static> TierCache<S> {
    pub fn new(store: S, fallback: Arc<dyn TickFileCache>) -> Self {
        let store = Arc::new(store);
        let tier_stats = Arc::new(CacheStats::new(store.name()));
        let stats_tree = combine(tier_stats.clone(), fallback.statistics());
        TierCache {
            store,
            fallback,
            tier_stats,
            stats_tree,
            persist_lock: Mutex::new(()),
        }
    }

    pub(crate) fn store(&self) -> &S {
        &self.store
    }

    /// Persist under the lock that serializes writers, re-checking existence
    /// first so a racing writer's work is not repeated. Persist failures are
    /// logged and swallowed; the fetched payload is still valid.
    fn persist(&self, path: &str, data: &[u8], kind: ContentKind) {
        let _guard = self.persist_lock.lock();
        let result = match self.store.exists(path) {
            Ok(true) => {
                warn!("skipped saving {path} as it already exists");
                Ok(())
            }
            Ok(false) => self.store.save(path, data, kind),
            Err(error) => Err(error),
        };
        if let Err(error) = result {
            warn!("failed to persist {path} in {}: {error}", self.store.name());
        }
    }
}

impl<S: TierStore + 'static> TickFileCache for TierCache<S> {
    fn fetch(&self, path: &str) -> Result<Vec<u8>, DukascopyError> {
        if let Some(data) = self.store.check(path)? {
            debug!("cache hit for {path} in {}", self.store.name());
            self.tier_stats.increment(STAT_HIT);
            return Ok(data);
        }
        debug!("cache miss for {path} in {}", self.store.name());
        self.tier_stats.increment(STAT_MISS);
        let data = self.fallback.fetch(path)?;
        self.persist(path, &data, ContentKind::Ticks);
        Ok(data)
    }

    fn statistics(&self) -> Arc<dyn CacheStatistics> {
        self.stats_tree.clone()
    }

    fn create_bar_cache(&self, tick_search: Arc<TickSearch>) -> Box<dyn DayBarCache> {
        let fallback = self.fallback.create_bar_cache(tick_search);
        Box::new(TierBarCache::new(self.store.clone(), fallback))
    }
}

/// Read-through bar tier sharing the same store as its tick sibling.
pub struct TierBarCache<S: TierStore> {
    store: Arc<S>,
    fallback: Box<dyn DayBarCache>,
    tier_stats: Arc<CacheStats>,
    stats_tree: Arc<dyn CacheStatistics>,
    persist_lock: Mutex<()>,
}

impl<S: TierStore + 'static> TierBarCache<S> {
    fn new(store: Arc<S>, fallback: Box<dyn DayBarCache>) -> Self {
        let tier_stats = Arc::new(CacheStats::new(store.bar_name()));
        let stats_tree = combine(tier_stats.clone(), fallback.statistics());
        TierBarCache {
            store,
            fallback,
            tier_stats,
            stats_tree,
            persist_lock: Mutex::new(()),
        }
    }
}

impl<S: TierStore + 'static> DayBarCache for TierBarCache<S> {
    fn day_of_bars(
        &self,
        criteria: &BarCriteria,
        day_paths: &[String],
    ) -> Result<Vec<Bar>, DukascopyError> {
        let Some(first_path) = day_paths.first() else {
            return Ok(Vec::new());
        };
        let bar_path = bar_day_path(criteria, first_path)?;
        if let Some(payload) = self.store.check(&bar_path)? {
            debug!("cache hit for {bar_path} in {}", self.store.bar_name());
            self.tier_stats.increment(STAT_HIT);
            let bars: Vec<Bar> = JsonArrayStream::new(payload)
                .read_all()
                .map_err(DukascopyError::from)?;
            return Ok(bars);
        }
        debug!("cache miss for {bar_path} in {}", self.store.bar_name());
        self.tier_stats.increment(STAT_MISS);
        let bars = self.fallback.day_of_bars(criteria, day_paths)?;
        match to_json_array(&bars) {
            Ok(payload) => {
                let _guard = self.persist_lock.lock();
                let persist = match self.store.exists(&bar_path) {
                    Ok(true) => Ok(()),
                    Ok(false) => self.store.save(&bar_path, &payload, ContentKind::Bars),
                    Err(error) => Err(error),
                };
                if let Err(error) = persist {
                    warn!(
                        "failed to persist {bar_path} in {}: {error}",
                        self.store.bar_name()
                    );
                }
            }
            Err(error) => warn!("failed to encode bars for {bar_path}: {error}"),
        }
        Ok(bars)
    }

    fn statistics(&self) -> Arc<dyn CacheStatistics> {
        self.stats_tree.clone()
    }
}

/// Cache key for one day of bars, anchored on the first hourly path of the
/// day: `bars/<PERIOD>/<SYMBOL>/<YYYY>/<MM0>/<DD>.json`. The date components
/// are copied verbatim from the hour path to stay bit-compatible with
/// existing stores.
pub fn bar_day_path(criteria: &BarCriteria, first_day_path: &str) -> Result<String, DukascopyError> {
    let parts: Vec<&str> = first_day_path.split('/').collect();
    let [symbol, year, month0, day, _file] = parts.as_slice() else {
        return Err(DukascopyError::invalid_argument(format!(
            "Path {first_day_path} is not an hourly vendor path"
        )));
    };
    Ok(format!(
        "bars/{}/{}/{}/{}/{}.json",
        criteria.period(),
        symbol,
        year,
        month0,
        day
    ))
}
