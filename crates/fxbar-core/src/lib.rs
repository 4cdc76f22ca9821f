//! Core market data model and processing.
//!
//! This crate carries everything that is independent of any particular data
//! vendor:
//!
//! - Value types: [`types::Tick`], [`types::Bar`], [`types::Period`] and
//!   stream identity helpers.
//! - UTC time arithmetic and the inclusive-boundary rounding rules
//!   ([`timestamp`]).
//! - The global FX trading-week calendar ([`market`]).
//! - Online tick-to-bar aggregation partitioned by stream and symbol
//!   ([`aggregator`]).
//! - Lazy pull-stream composition and count-based search extension
//!   ([`stream`]).
//! - The element-at-a-time JSON array codec used for cached bar payloads
//!   ([`json`]).
//!
//! Vendor-specific retrieval (paths, caches, fetchers, search) lives in
//! `fxbar-providers`.

pub mod aggregator;
pub mod errors;
pub mod json;
pub mod market;
pub mod stream;
pub mod timestamp;
pub mod types;

// Fixture builders, available to unit tests and (behind the `test-utils`
// feature) to integration tests and downstream crates.
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use aggregator::{ticks_to_bars, BarNotifier, PriceSelection, TickBarAggregator};
pub use errors::StreamError;
pub use market::{MarketStatus, Status};
pub use stream::{
    extend_backwards, extend_forwards, BoxedStream, Combine, ListStream, Opened, SearchStrategy,
    TickToBarStream,
};
pub use types::{
    compare_stream_ids, realtime_stream_id, stream_kind, Bar, Period, StreamKind, StreamSource,
    Tick, MODEL_VERSION, SYMBOL_MIN_LEN,
};
