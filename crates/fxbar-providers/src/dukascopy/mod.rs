//! Dukascopy historical tick archive provider.
//!
//! Dukascopy publishes FX tick history as one compressed binary file per
//! instrument and UTC hour.
//!
//! # URL pattern
//!
//! ```text
//! https://datafeed.dukascopy.com/datafeed/{SYMBOL}/{YYYY}/{MM0}/{DD}/{HH0}h_ticks.bi5
//! ```
//!
//! `MM0` is the **zero-indexed** month (January = `00`, December = `11`) and
//! `HH0` the zero-padded UTC hour. Cache keys preserve this layout
//! bit-for-bit. Example:
//!
//! ```text
//! EURUSD/2020/00/02/05h_ticks.bi5    (2020-01-02, hour 05)
//! ```
//!
//! # Retrieval pipeline
//!
//! Requests flow through a chain of read-through cache tiers ending at the
//! rate-limited direct fetcher:
//!
//! ```text
//! search -> local filesystem tier -> S3 tier -> direct (network, rate limited)
//! ```
//!
//! Each tier checks its own store, falls back on miss, persists what the
//! fallback returned and serves the payload. Day-level bar results are cached
//! the same way as JSON arrays under `bars/{PERIOD}/{SYMBOL}/{YYYY}/{MM0}/{DD}.json`.
//!
//! # Rate limiting
//!
//! The vendor throttles aggressive clients (HTTP 503, or a silent 30 s delay
//! before data starts flowing). The direct tier acquires a token-bucket
//! permit before every request (default 3 permits/second) and retries
//! marker-matched server errors with a linearly growing pause.

pub mod cache;
pub mod criteria;
pub mod decoder;
pub mod errors;
pub mod fetch;
pub mod paths;
pub mod search;
pub mod tick_stream;
