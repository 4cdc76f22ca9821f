//! Market data providers.
//!
//! Currently a single provider: the Dukascopy historical tick archive
//! ([`dukascopy`]), covering vendor path generation, the layered read-through
//! cache pipeline, the rate-limited fetcher, tick/bar search and cache
//! priming.

pub mod dukascopy;

pub use dukascopy::{
    cache::{
        AwsObjectStore, CachePrimer, CacheStatistics, DayBarCache, DirectBarCache, LocalCache,
        LocalStore, ObjectStore, S3Cache, S3Store, TickFileCache, TierCache,
    },
    criteria::{BarCriteria, TickCriteria},
    decoder::{PackedTickDecoder, TickDecoder},
    errors::DukascopyError,
    fetch::{DirectDukascopy, FetchOptions, RateLimiter},
    paths::PathGenerator,
    search::{DukascopySearch, TickSearch},
};
