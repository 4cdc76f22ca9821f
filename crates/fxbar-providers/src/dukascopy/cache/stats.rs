//! Cache statistics: named counters that compose into a tree along the tier
//! chain.

use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// Counter name for cache hits.
pub const STAT_HIT: &str = "hit";
/// Counter name for cache misses.
pub const STAT_MISS: &str = "miss";
/// Counter name for fetch retries.
pub const STAT_RETRY: &str = "retry";

/// Sentinel hit rate reported before any retrieve has happened.
pub const HIT_RATE_UNDEFINED: f64 = -1.0;

const ONE_HUNDRED: f64 = 100.0;

/// Read-side view over one tier's counters or an aggregate of several.
pub trait CacheStatistics: Send + Sync {
    /// Display name of the cache.
    fn name(&self) -> String;

    /// Value of a named counter; unknown names read as zero.
    fn stat(&self, stat_name: &str) -> u64;

    fn hit_count(&self) -> u64 {
        self.stat(STAT_HIT)
    }

    fn miss_count(&self) -> u64 {
        self.stat(STAT_MISS)
    }

    fn retrieve_count(&self) -> u64 {
        self.hit_count() + self.miss_count()
    }

    /// Hit rate as a percentage, or [`HIT_RATE_UNDEFINED`] on a cold cache.
    fn hit_rate(&self) -> f64 {
        let retrieves = self.retrieve_count();
        if retrieves == 0 {
            HIT_RATE_UNDEFINED
        } else {
            (self.hit_count() as f64 / retrieves as f64) * ONE_HUNDRED
        }
    }

    /// One-line report: `<name>: retrieve: <n>, <key>: <v>, ...` with keys in
    /// lexicographic order. Aggregates join their children with `, `.
    fn cache_stats(&self) -> String;

    /// Child statistics by name; empty for leaf tiers.
    fn children(&self) -> HashMap<String, Arc<dyn CacheStatistics>> {
        HashMap::new()
    }
}

/// Counter set owned by a single cache tier.
///
/// `hit` and `miss` always exist; tiers may register further counters at
/// construction (e.g. `retry`) or grow them on first increment.
pub struct CacheStats {
    name: String,
    counters: Mutex<BTreeMap<String, u64>>,
}

impl CacheStats {
    pub fn new(name: &str) -> Self {
        Self::with_stats(name, &[])
    }

    pub fn with_stats(name: &str, stat_names: &[&str]) -> Self {
        let mut counters = BTreeMap::new();
        counters.insert(STAT_HIT.to_string(), 0);
        counters.insert(STAT_MISS.to_string(), 0);
        for stat_name in stat_names {
            counters.insert((*stat_name).to_string(), 0);
        }
        CacheStats {
            name: name.to_string(),
            counters: Mutex::new(counters),
        }
    }

    /// Increment a named counter by one, registering it if unknown.
    pub fn increment(&self, stat_name: &str) {
        *self
            .counters
            .lock()
            .entry(stat_name.to_string())
            .or_insert(0) += 1;
    }
}

impl CacheStatistics for CacheStats {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn stat(&self, stat_name: &str) -> u64 {
        self.counters.lock().get(stat_name).copied().unwrap_or(0)
    }

    fn cache_stats(&self) -> String {
        let counters = self.counters.lock();
        let mut report = format!("{}: retrieve: {}", self.name, self.retrieve_count_locked(&counters));
        for (key, value) in counters.iter() {
            report.push_str(&format!(", {key}: {value}"));
        }
        report
    }
}

impl CacheStats {
    fn retrieve_count_locked(&self, counters: &BTreeMap<String, u64>) -> u64 {
        counters.get(STAT_HIT).copied().unwrap_or(0) + counters.get(STAT_MISS).copied().unwrap_or(0)
    }
}

/// Statistics of two chained caches summed together, exposing each child.
pub struct AggregateStats {
    a: Arc<dyn CacheStatistics>,
    b: Arc<dyn CacheStatistics>,
}

/// Compose the statistics of a tier and its fallback into one tree node.
pub fn combine(
    a: Arc<dyn CacheStatistics>,
    b: Arc<dyn CacheStatistics>,
) -> Arc<dyn CacheStatistics> {
    Arc::new(AggregateStats { a, b })
}

impl CacheStatistics for AggregateStats {
    fn name(&self) -> String {
        format!("{}-{}", self.a.name(), self.b.name())
    }

    fn stat(&self, stat_name: &str) -> u64 {
        self.a.stat(stat_name) + self.b.stat(stat_name)
    }

    fn cache_stats(&self) -> String {
        format!("{}, {}", self.a.cache_stats(), self.b.cache_stats())
    }

    fn children(&self) -> HashMap<String, Arc<dyn CacheStatistics>> {
        HashMap::from([
            (self.a.name(), self.a.clone()),
            (self.b.name(), self.b.clone()),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hit_and_miss_counters_exist_up_front() {
        let stats = CacheStats::new("LocalCache");
        assert_eq!(stats.hit_count(), 0);
        assert_eq!(stats.miss_count(), 0);
        assert_eq!(stats.retrieve_count(), 0);
        assert_eq!(stats.cache_stats(), "LocalCache: retrieve: 0, hit: 0, miss: 0");
    }

    #[test]
    fn report_lists_keys_lexicographically() {
        let stats = CacheStats::with_stats("DirectDukascopy", &[STAT_RETRY]);
        stats.increment(STAT_MISS);
        stats.increment(STAT_RETRY);
        stats.increment(STAT_RETRY);
        assert_eq!(
            stats.cache_stats(),
            "DirectDukascopy: retrieve: 1, hit: 0, miss: 1, retry: 2"
        );
    }

    #[test]
    fn hit_rate_has_a_cold_cache_sentinel() {
        let stats = CacheStats::new("LocalCache");
        assert_eq!(stats.hit_rate(), HIT_RATE_UNDEFINED);
        stats.increment(STAT_HIT);
        stats.increment(STAT_HIT);
        stats.increment(STAT_HIT);
        stats.increment(STAT_MISS);
        assert_eq!(stats.hit_rate(), 75.0);
    }

    #[test]
    fn unknown_counters_read_zero_and_register_on_increment() {
        let stats = CacheStats::new("LocalCache");
        assert_eq!(stats.stat("surprise"), 0);
        stats.increment("surprise");
        assert_eq!(stats.stat("surprise"), 1);
    }

    #[test]
    fn aggregate_sums_counters_and_joins_reports() {
        let local = Arc::new(CacheStats::new("LocalCache"));
        let direct = Arc::new(CacheStats::new("DirectDukascopy"));
        local.increment(STAT_HIT);
        direct.increment(STAT_MISS);

        let tree = combine(local.clone(), direct.clone());
        assert_eq!(tree.name(), "LocalCache-DirectDukascopy");
        assert_eq!(tree.hit_count(), 1);
        assert_eq!(tree.miss_count(), 1);
        assert_eq!(tree.retrieve_count(), 2);
        assert_eq!(tree.hit_rate(), 50.0);
        assert_eq!(
            tree.cache_stats(),
            "LocalCache: retrieve: 1, hit: 1, miss: 0, DirectDukascopy: retrieve: 1, hit: 0, miss: 1"
        );

        let children = tree.children();
        assert_eq!(children.len(), 2);
        assert_eq!(children["LocalCache"].hit_count(), 1);
        assert_eq!(children["DirectDukascopy"].miss_count(), 1);
    }

    #[test]
    fn aggregates_nest_into_a_tree() {
        let local = Arc::new(CacheStats::new("LocalCache"));
        let s3 = Arc::new(CacheStats::new("S3Cache"));
        let direct = Arc::new(CacheStats::new("DirectDukascopy"));
        s3.increment(STAT_MISS);
        direct.increment(STAT_MISS);

        let tree = combine(local, combine(s3, direct));
        assert_eq!(tree.miss_count(), 2);
        assert_eq!(
            tree.cache_stats(),
            "LocalCache: retrieve: 0, hit: 0, miss: 0, S3Cache: retrieve: 1, hit: 0, miss: 1, DirectDukascopy: retrieve: 1, hit: 0, miss: 1"
        );
    }
}
