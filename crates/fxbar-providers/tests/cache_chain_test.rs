//! Read-through cache chain scenarios: local tier, S3 tier, bar caches and
//! the statistics tree.

mod common;

use chrono::{DateTime, Utc};
use common::{FixtureCache, MockObjectStore};
use fxbar_core::{MarketStatus, Period};
use fxbar_providers::dukascopy::cache::{
    bar_day_path, CacheStatistics, DayBarCache, DirectBarCache, LocalCache, S3Cache, TickFileCache,
};
use fxbar_providers::dukascopy::criteria::BarCriteria;
use fxbar_providers::dukascopy::decoder::PackedTickDecoder;
use fxbar_providers::dukascopy::paths::PathGenerator;
use fxbar_providers::dukascopy::search::TickSearch;
use std::sync::Arc;

const TICK_PATH: &str = "EURUSD/2020/00/02/05h_ticks.bi5";

fn parse(s: &str) -> DateTime<Utc> {
    s.parse().unwrap()
}

fn fixture_with_hour(count: u32) -> Arc<FixtureCache> {
    let fixture = Arc::new(FixtureCache::new());
    fixture.put_hour_of_quotes("EURUSD", "2020-01-02T05:00:00Z", count);
    fixture
}

fn tick_search_over(cache: Arc<dyn TickFileCache>) -> Arc<TickSearch> {
    Arc::new(TickSearch::new(Arc::new(PackedTickDecoder), cache))
}

#[test]
fn local_tier_reads_through_persists_and_hits() {
    let root = tempfile::tempdir().unwrap();
    let leaf = fixture_with_hour(100);
    let local = LocalCache::with_root(root.path().to_path_buf(), leaf.clone());

    // First fetch: local miss, payload pulled from the leaf and persisted.
    let first = local.fetch(TICK_PATH).unwrap();
    assert_eq!(first.len(), 100 * 20);
    assert!(root.path().join(TICK_PATH).is_file());
    assert_eq!(leaf.fetches_of(TICK_PATH), 1);

    // Second fetch: served locally, the leaf is not consulted again.
    let second = local.fetch(TICK_PATH).unwrap();
    assert_eq!(second, first);
    assert_eq!(leaf.fetches_of(TICK_PATH), 1);

    assert_eq!(
        local.statistics().cache_stats(),
        "LocalCache: retrieve: 2, hit: 1, miss: 1, FixtureDirect: retrieve: 1, hit: 0, miss: 1"
    );
    assert_eq!(local.statistics().hit_count(), 1);
    assert_eq!(local.statistics().miss_count(), 2);
}

#[test]
fn local_tier_reports_size_and_clears() {
    let root = tempfile::tempdir().unwrap();
    let leaf = fixture_with_hour(50);
    let local = LocalCache::with_root(root.path().to_path_buf(), leaf);

    local.fetch(TICK_PATH).unwrap();
    assert_eq!(local.cache_size_bytes().unwrap(), 50 * 20);

    local.remove_cache().unwrap();
    assert_eq!(local.cache_size_bytes().unwrap(), 0);
    assert!(root.path().is_dir());
}

#[test]
fn s3_tier_miss_then_fallback_then_put() {
    // 1,700 quotes make the payload comfortably larger than 33,000 bytes.
    let leaf = fixture_with_hour(1_700);
    let store = Arc::new(MockObjectStore::new());
    let s3 = S3Cache::with_store(store.clone(), "bucketName", leaf.clone());

    let payload = s3.fetch(TICK_PATH).unwrap();
    assert_eq!(payload.len(), 1_700 * 20);
    assert!(payload.len() > 33_000);

    let puts = store.puts();
    assert_eq!(puts.len(), 1);
    assert_eq!(puts[0].bucket, "bucketName");
    assert_eq!(puts[0].key, TICK_PATH);
    assert_eq!(puts[0].content_type, "application/octet-stream");
    assert_eq!(puts[0].content_disposition, TICK_PATH);
    assert_eq!(puts[0].content_length, payload.len());

    assert_eq!(
        s3.statistics().cache_stats(),
        "S3Cache: retrieve: 1, hit: 0, miss: 1, FixtureDirect: retrieve: 1, hit: 0, miss: 1"
    );
}

#[test]
fn s3_tier_serves_hits_without_touching_the_fallback() {
    let leaf = Arc::new(FixtureCache::new());
    let store = Arc::new(MockObjectStore::new());
    store.preload("bucketName", TICK_PATH, vec![7u8; 40]);
    let s3 = S3Cache::with_store(store.clone(), "bucketName", leaf.clone());

    let payload = s3.fetch(TICK_PATH).unwrap();
    assert_eq!(payload, vec![7u8; 40]);
    assert_eq!(leaf.fetch_count(), 0);
    assert!(store.puts().is_empty());
    assert_eq!(s3.statistics().hit_count(), 1);
    assert_eq!(s3.statistics().miss_count(), 0);
}

#[test]
fn a_second_miss_does_not_persist_twice() {
    let leaf = fixture_with_hour(10);
    let store = Arc::new(MockObjectStore::new());
    let s3 = S3Cache::with_store(store.clone(), "bucketName", leaf.clone());

    s3.fetch(TICK_PATH).unwrap();
    // The mock now holds the object, so the second fetch is a hit.
    s3.fetch(TICK_PATH).unwrap();
    assert_eq!(store.puts().len(), 1);
    assert_eq!(leaf.fetches_of(TICK_PATH), 1);
}

fn day_criteria() -> BarCriteria {
    BarCriteria::new(
        "EURUSD",
        Period::M10,
        parse("2020-01-02T05:00:00Z"),
        parse("2020-01-02T06:00:00Z"),
    )
    .unwrap()
}

fn day_paths() -> Vec<String> {
    PathGenerator::new(MarketStatus::new())
        .generate_paths_grouped_by_day(
            "EURUSD",
            parse("2020-01-02T00:00:00Z"),
            parse("2020-01-02T23:59:59Z"),
        )
        .remove(0)
}

#[test]
fn direct_bar_cache_requires_a_full_day_of_paths() {
    let leaf = fixture_with_hour(60);
    let direct = DirectBarCache::new(tick_search_over(leaf));

    let mut extra = day_paths();
    extra.push(extra[0].clone());
    let error = direct
        .day_of_bars(&day_criteria(), &extra)
        .err()
        .expect("must reject the wrong path count");
    assert_eq!(
        error.to_string(),
        "Paths for Day of 1H Tick files is not 24! 25"
    );
}

#[test]
fn direct_bar_cache_aggregates_the_day() {
    let leaf = fixture_with_hour(60);
    let direct = DirectBarCache::new(tick_search_over(leaf));

    let bars = direct.day_of_bars(&day_criteria(), &day_paths()).unwrap();
    // One fixture hour of quotes at M10: six bars, all within the day cap.
    assert_eq!(bars.len(), 6);
    assert!(bars.len() as i64 <= Period::M10.periods_in(Period::D1));
    assert_eq!(
        direct.statistics().cache_stats(),
        "DirectBarCache: retrieve: 1, hit: 0, miss: 1"
    );
}

#[test]
fn local_bar_cache_persists_a_day_of_bars_as_json() {
    let root = tempfile::tempdir().unwrap();
    let leaf = fixture_with_hour(60);
    let local = Arc::new(LocalCache::with_root(root.path().to_path_buf(), leaf.clone()));
    let tick_search = tick_search_over(local.clone());
    let bar_cache = local.create_bar_cache(tick_search);

    let criteria = day_criteria();
    let paths = day_paths();

    let bars = bar_cache.day_of_bars(&criteria, &paths).unwrap();
    assert_eq!(bars.len(), 6);

    // The day file is anchored on the first hourly path's date.
    let bar_path = bar_day_path(&criteria, &paths[0]).unwrap();
    assert_eq!(bar_path, "bars/M10/EURUSD/2020/00/02.json");
    assert!(root.path().join(&bar_path).is_file());

    // Second retrieval is served from the persisted JSON.
    let again = bar_cache.day_of_bars(&criteria, &paths).unwrap();
    assert_eq!(again, bars);
    let report = bar_cache.statistics().cache_stats();
    assert!(report.starts_with("LocalBarCache: retrieve: 2, hit: 1, miss: 1"));
    assert!(report.contains("DirectBarCache"));
}

#[test]
fn empty_day_paths_yield_no_bars() {
    let root = tempfile::tempdir().unwrap();
    let leaf = Arc::new(FixtureCache::new());
    let local = Arc::new(LocalCache::with_root(root.path().to_path_buf(), leaf));
    let tick_search = tick_search_over(local.clone());
    let bar_cache = local.create_bar_cache(tick_search);

    let bars = bar_cache.day_of_bars(&day_criteria(), &[]).unwrap();
    assert!(bars.is_empty());
}

#[test]
fn statistics_tree_spans_the_whole_chain() {
    let root = tempfile::tempdir().unwrap();
    let leaf = fixture_with_hour(10);
    let store = Arc::new(MockObjectStore::new());
    let s3 = Arc::new(S3Cache::with_store(store, "bucketName", leaf));
    let local = LocalCache::with_root(root.path().to_path_buf(), s3);

    local.fetch(TICK_PATH).unwrap();
    local.fetch(TICK_PATH).unwrap();

    let tree = local.statistics();
    assert_eq!(tree.name(), "LocalCache-S3Cache-FixtureDirect");
    // One miss per tier on the first fetch, one local hit on the second.
    assert_eq!(tree.hit_count(), 1);
    assert_eq!(tree.miss_count(), 3);

    let children = tree.children();
    assert_eq!(children["LocalCache"].hit_count(), 1);
    let downstream = &children["S3Cache-FixtureDirect"];
    assert_eq!(downstream.miss_count(), 2);
}
