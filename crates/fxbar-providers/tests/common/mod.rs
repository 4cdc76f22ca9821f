//! Shared fixtures: an in-memory leaf cache serving synthetic hourly
//! archives, and a recording object store for the S3 tier.

use chrono::{DateTime, Utc};
use fxbar_providers::dukascopy::cache::stats::{CacheStats, CacheStatistics, STAT_MISS};
use fxbar_providers::dukascopy::cache::{DayBarCache, DirectBarCache, TickFileCache};
use fxbar_providers::dukascopy::decoder::test_support::{encode_ticks, RawTick};
use fxbar_providers::dukascopy::errors::DukascopyError;
use fxbar_providers::dukascopy::paths::hour_path;
use fxbar_providers::dukascopy::search::TickSearch;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

/// In-memory leaf tier: serves preloaded payloads, empty archives otherwise.
/// Counts every fetch as a miss like the real direct fetcher.
pub struct FixtureCache {
    payloads: Mutex<HashMap<String, Vec<u8>>>,
    fetches: Mutex<Vec<String>>,
    stats: Arc<CacheStats>,
}

impl FixtureCache {
    pub fn new() -> Self {
        FixtureCache {
            payloads: Mutex::new(HashMap::new()),
            fetches: Mutex::new(Vec::new()),
            stats: Arc::new(CacheStats::new("FixtureDirect")),
        }
    }

    /// Preload one hour of `count` quotes evenly spread across the hour.
    pub fn put_hour_of_quotes(&self, symbol: &str, hour_start: &str, count: u32) {
        let hour: DateTime<Utc> = hour_start.parse().unwrap();
        let step = 3_600_000 / count.max(1);
        let records: Vec<RawTick> = (0..count)
            .map(|i| RawTick::quote(i * step, 117_000 + (i % 50), 117_003 + (i % 50)))
            .collect();
        self.put_records(symbol, hour, &records);
    }

    /// Preload one hour with explicit records.
    pub fn put_records(&self, symbol: &str, hour_start: DateTime<Utc>, records: &[RawTick]) {
        self.payloads
            .lock()
            .insert(hour_path(symbol, hour_start), encode_ticks(records));
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.lock().len()
    }

    pub fn fetches_of(&self, path: &str) -> usize {
        self.fetches.lock().iter().filter(|p| *p == path).count()
    }
}

impl TickFileCache for FixtureCache {
    fn fetch(&self, path: &str) -> Result<Vec<u8>, DukascopyError> {
        self.fetches.lock().push(path.to_string());
        self.stats.increment(STAT_MISS);
        Ok(self.payloads.lock().get(path).cloned().unwrap_or_default())
    }

    fn statistics(&self) -> Arc<dyn CacheStatistics> {
        self.stats.clone()
    }

    fn create_bar_cache(&self, tick_search: Arc<TickSearch>) -> Box<dyn DayBarCache> {
        Box::new(DirectBarCache::new(tick_search))
    }
}

/// Recorded `put` request from the mock object store.
#[derive(Debug, Clone)]
pub struct PutRecord {
    pub bucket: String,
    pub key: String,
    pub content_type: String,
    pub content_disposition: String,
    pub content_length: usize,
}

/// In-memory object store recording every put.
pub struct MockObjectStore {
    objects: Mutex<HashMap<String, Vec<u8>>>,
    puts: Mutex<Vec<PutRecord>>,
}

impl MockObjectStore {
    pub fn new() -> Self {
        MockObjectStore {
            objects: Mutex::new(HashMap::new()),
            puts: Mutex::new(Vec::new()),
        }
    }

    pub fn preload(&self, bucket: &str, key: &str, data: Vec<u8>) {
        self.objects
            .lock()
            .insert(format!("{bucket}/{key}"), data);
    }

    pub fn puts(&self) -> Vec<PutRecord> {
        self.puts.lock().clone()
    }
}

impl fxbar_providers::dukascopy::cache::ObjectStore for MockObjectStore {
    fn head(&self, bucket: &str, key: &str) -> Result<bool, DukascopyError> {
        Ok(self
            .objects
            .lock()
            .contains_key(&format!("{bucket}/{key}")))
    }

    fn get(&self, bucket: &str, key: &str) -> Result<Option<Vec<u8>>, DukascopyError> {
        Ok(self.objects.lock().get(&format!("{bucket}/{key}")).cloned())
    }

    fn put(
        &self,
        bucket: &str,
        key: &str,
        data: &[u8],
        content_type: &str,
        content_disposition: &str,
    ) -> Result<(), DukascopyError> {
        self.puts.lock().push(PutRecord {
            bucket: bucket.to_string(),
            key: key.to_string(),
            content_type: content_type.to_string(),
            content_disposition: content_disposition.to_string(),
            content_length: data.len(),
        });
        self.objects
            .lock()
            .insert(format!("{bucket}/{key}"), data.to_vec());
        Ok(())
    }
}
