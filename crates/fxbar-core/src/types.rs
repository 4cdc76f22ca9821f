//! Market data model types: ticks, OHLC bars, periods and stream identity.
//!
//! All timestamps are whole milliseconds since the Unix epoch, UTC. Prices are
//! integer vendor points (pipettes for FX), never floats, so bars survive
//! serialization round-trips bit-exactly.

use crate::errors::StreamError;
use crate::timestamp;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use uuid::Uuid;

/// Version of the serialized model contract, emitted on every write and
/// ignored on read.
pub const MODEL_VERSION: &str = "1.0";

/// Minimum length of an instrument symbol (e.g. `EURUSD`).
pub const SYMBOL_MIN_LEN: usize = 6;

/// The reserved stream id marking the realtime stream. Any other id denotes a
/// backtest stream.
pub fn realtime_stream_id() -> Uuid {
    Uuid::nil()
}

/// Classification of a stream id into realtime vs backtest.
///
/// Ordering matters: backtest streams sort before realtime streams, which is
/// relied upon by the natural ordering of [`Tick`] and [`Bar`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum StreamKind {
    /// A backtest stream (any non-nil id).
    Backtest,
    /// The realtime stream (the nil id).
    Realtime,
}

/// Classify a stream id.
pub fn stream_kind(stream_id: &Uuid) -> StreamKind {
    if stream_id.is_nil() {
        StreamKind::Realtime
    } else {
        StreamKind::Backtest
    }
}

/// Compare two stream ids by kind only. Equal ids compare equal; distinct ids
/// compare by their [`StreamKind`].
pub fn compare_stream_ids(left: &Uuid, right: &Uuid) -> Ordering {
    if left == right {
        Ordering::Equal
    } else {
        stream_kind(left).cmp(&stream_kind(right))
    }
}

/// Origin of a data item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StreamSource {
    /// Live market data.
    Live,
    /// Historical (archived) data.
    Historical,
}

impl StreamSource {
    /// Combination rule when two sources merge into one item: historical data
    /// contaminates live data.
    pub fn aggregate(left: StreamSource, right: StreamSource) -> StreamSource {
        if left == StreamSource::Live && right == StreamSource::Historical {
            StreamSource::Historical
        } else {
            left
        }
    }
}

/// A single bid/ask quote for one symbol at one instant.
///
/// Equality and hashing consider only the identity fields (timestamp, stream,
/// symbol); prices and volumes are payload. Natural ordering is stream kind,
/// then symbol, then timestamp.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tick {
    /// Quote instant in epoch milliseconds UTC.
    pub milliseconds_utc: i64,
    /// Stream this tick belongs to.
    pub stream_id: Uuid,
    /// Instrument symbol, at least [`SYMBOL_MIN_LEN`] characters.
    pub symbol: String,
    /// Bid price in vendor points for the standard parcel size.
    pub bid: u32,
    /// Ask price in vendor points for the standard parcel size.
    pub ask: u32,
    /// Bid liquidity in millions (1.23 is 1,230,000).
    pub bid_volume: f32,
    /// Ask liquidity in millions (1.23 is 1,230,000).
    pub ask_volume: f32,
    /// Origin of the quote.
    pub source: StreamSource,
}

impl Tick {
    /// Quote instant as a UTC date-time.
    pub fn instant(&self) -> DateTime<Utc> {
        timestamp::to_instant(self.milliseconds_utc)
    }

    /// Stream classification of this tick.
    pub fn stream_kind(&self) -> StreamKind {
        stream_kind(&self.stream_id)
    }

    /// Key that partitions tick streams while preserving per-stream ordering:
    /// `<streamId>-<symbol>`.
    pub fn partition_key(&self) -> String {
        format!("{}-{}", self.stream_id, self.symbol)
    }

    /// Whether this tick and the other belong to the same logical stream
    /// (same stream id and symbol).
    pub fn is_in_same_stream(&self, other: &Tick) -> bool {
        self.stream_id == other.stream_id && self.symbol == other.symbol
    }

    /// Check field constraints: non-negative timestamp, symbol length,
    /// strictly positive prices, non-negative volumes.
    pub fn validate(&self) -> Result<(), StreamError> {
        if self.milliseconds_utc < 0 {
            return Err(StreamError::invalid_argument(format!(
                "Tick timestamp {} must not be negative",
                self.milliseconds_utc
            )));
        }
        validate_symbol(&self.symbol)?;
        if self.bid < 1 || self.ask < 1 {
            return Err(StreamError::invalid_argument(format!(
                "Tick prices must be at least 1, got bid {} ask {}",
                self.bid, self.ask
            )));
        }
        if self.bid_volume < 0.0 || self.ask_volume < 0.0 {
            return Err(StreamError::invalid_argument(format!(
                "Tick volumes must not be negative, got bid {} ask {}",
                self.bid_volume, self.ask_volume
            )));
        }
        Ok(())
    }
}

impl PartialEq for Tick {
    fn eq(&self, other: &Self) -> bool {
        self.milliseconds_utc == other.milliseconds_utc
            && self.stream_id == other.stream_id
            && self.symbol == other.symbol
    }
}

impl Eq for Tick {}

impl Hash for Tick {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.milliseconds_utc.hash(state);
        self.stream_id.hash(state);
        self.symbol.hash(state);
    }
}

impl Ord for Tick {
    fn cmp(&self, other: &Self) -> Ordering {
        compare_stream_ids(&self.stream_id, &other.stream_id)
            .then_with(|| self.symbol.cmp(&other.symbol))
            .then_with(|| self.milliseconds_utc.cmp(&other.milliseconds_utc))
    }
}

impl PartialOrd for Tick {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Supported bar aggregation periods.
///
/// Declaration order is coarseness order; the derived `Ord` is relied on by
/// the bar ordering and the `within`/`surrounds` relations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Period {
    M5,
    M10,
    M15,
    M30,
    H1,
    H4,
    D1,
}

impl Period {
    /// All periods, finest first.
    pub const ALL: [Period; 7] = [
        Period::M5,
        Period::M10,
        Period::M15,
        Period::M30,
        Period::H1,
        Period::H4,
        Period::D1,
    ];

    /// Length of one bar of this period in milliseconds.
    pub fn duration_millis(&self) -> i64 {
        const MINUTE: i64 = 60_000;
        match self {
            Period::M5 => 5 * MINUTE,
            Period::M10 => 10 * MINUTE,
            Period::M15 => 15 * MINUTE,
            Period::M30 => 30 * MINUTE,
            Period::H1 => 60 * MINUTE,
            Period::H4 => 4 * 60 * MINUTE,
            Period::D1 => 24 * 60 * MINUTE,
        }
    }

    /// Floor an epoch-millisecond time to the start of the containing bar.
    pub fn round(&self, epoch_millis: i64) -> i64 {
        let period_millis = self.duration_millis();
        (epoch_millis / period_millis) * period_millis
    }

    /// Floor an instant to the start of the containing bar.
    pub fn round_instant(&self, instant: DateTime<Utc>) -> DateTime<Utc> {
        timestamp::to_instant(self.round(instant.timestamp_millis()))
    }

    /// Number of bars of this period that fit in one bar of a larger period.
    pub fn periods_in(&self, larger: Period) -> i64 {
        self.periods_in_millis(larger.duration_millis())
    }

    /// Number of whole bars of this period that fit in a duration.
    pub fn periods_in_millis(&self, duration_millis: i64) -> i64 {
        (duration_millis / self.duration_millis()).max(0)
    }

    /// The finest period of a non-empty set.
    pub fn smallest(periods: &[Period]) -> Option<Period> {
        periods.iter().copied().min()
    }

    /// The coarsest period of a non-empty set.
    pub fn largest(periods: &[Period]) -> Option<Period> {
        periods.iter().copied().max()
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Period::M5 => "M5",
            Period::M10 => "M10",
            Period::M15 => "M15",
            Period::M30 => "M30",
            Period::H1 => "H1",
            Period::H4 => "H4",
            Period::D1 => "D1",
        };
        f.write_str(name)
    }
}

/// An OHLC aggregate of ticks over one fixed period for one symbol and stream.
///
/// The start time is aligned to the period grid; the end time is derived and
/// inclusive (`start + duration - 1ms`). Equality considers (start, stream,
/// period, symbol); prices are payload.
///
/// The JSON shape is the wire/storage contract for cached day files:
/// camelCase field names with a `modelVersion` marker that is written on every
/// serialization and ignored when reading.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bar {
    /// Bar window start in epoch milliseconds UTC, aligned to the period grid.
    pub start_milliseconds_utc: i64,
    /// Stream this bar belongs to.
    pub stream_id: Uuid,
    /// Aggregation period of this bar.
    pub period: Period,
    /// Instrument symbol.
    pub symbol: String,
    /// First price of the window.
    pub open: u32,
    /// Highest price of the window.
    pub high: u32,
    /// Lowest price of the window.
    pub low: u32,
    /// Last price of the window.
    pub close: u32,
    /// Aggregated origin of the source ticks.
    pub source: StreamSource,
    /// Serialized model contract version.
    #[serde(default = "default_model_version")]
    pub model_version: String,
}

fn default_model_version() -> String {
    MODEL_VERSION.to_string()
}

impl Bar {
    /// Start of the bar containing the supplied epoch time.
    pub fn start_millis_for(period: Period, epoch_millis: i64) -> i64 {
        period.round(epoch_millis)
    }

    /// Inclusive end of the bar containing the supplied epoch time.
    pub fn end_millis_for(period: Period, epoch_millis: i64) -> i64 {
        period.round(epoch_millis) + period.duration_millis() - 1
    }

    /// Inclusive end of this bar's window in epoch milliseconds UTC.
    pub fn end_milliseconds_utc(&self) -> i64 {
        Bar::end_millis_for(self.period, self.start_milliseconds_utc)
    }

    /// Window start as a UTC date-time.
    pub fn start_instant(&self) -> DateTime<Utc> {
        timestamp::to_instant(self.start_milliseconds_utc)
    }

    /// Inclusive window end as a UTC date-time.
    pub fn end_instant(&self) -> DateTime<Utc> {
        timestamp::to_instant(self.end_milliseconds_utc())
    }

    /// Stream classification of this bar.
    pub fn stream_kind(&self) -> StreamKind {
        stream_kind(&self.stream_id)
    }

    /// Key that partitions bar streams: `<streamId>-<symbol>-<period>`.
    pub fn partition_key(&self) -> String {
        format!("{}-{}-{}", self.stream_id, self.symbol, self.period)
    }

    /// Whether this bar and the other belong to the same logical stream
    /// (same stream id and symbol); period and window are not compared.
    pub fn is_in_same_stream(&self, other: &Bar) -> bool {
        self.stream_id == other.stream_id && self.symbol == other.symbol
    }

    /// True if this bar lies entirely within the window of the supplied bar
    /// of the same or a larger period, in the same stream and symbol.
    pub fn within(&self, bigger: &Bar) -> bool {
        self.is_in_same_stream(bigger)
            && bigger.period >= self.period
            && bigger.start_milliseconds_utc <= self.start_milliseconds_utc
            && bigger.end_milliseconds_utc() >= self.end_milliseconds_utc()
    }

    /// True if this bar entirely surrounds the window of the supplied bar of
    /// the same or a smaller period, in the same stream and symbol.
    pub fn surrounds(&self, smaller: &Bar) -> bool {
        self.is_in_same_stream(smaller)
            && smaller.period <= self.period
            && smaller.start_milliseconds_utc >= self.start_milliseconds_utc
            && smaller.end_milliseconds_utc() <= self.end_milliseconds_utc()
    }

    /// Check bar invariants: grid alignment, symbol length, strictly positive
    /// prices with `low <= open,close <= high`.
    pub fn validate(&self) -> Result<(), StreamError> {
        validate_symbol(&self.symbol)?;
        if self.start_milliseconds_utc < 0
            || self.start_milliseconds_utc % self.period.duration_millis() != 0
        {
            return Err(StreamError::state(format!(
                "Bar start {} is not aligned to the {} grid",
                self.start_milliseconds_utc, self.period
            )));
        }
        if self.low < 1 {
            return Err(StreamError::state(format!(
                "Bar prices must be at least 1, got low {}",
                self.low
            )));
        }
        let price_range_ok = self.low <= self.open
            && self.open <= self.high
            && self.low <= self.close
            && self.close <= self.high;
        if !price_range_ok {
            return Err(StreamError::state(format!(
                "Bar prices out of range: open {} high {} low {} close {}",
                self.open, self.high, self.low, self.close
            )));
        }
        Ok(())
    }
}

impl PartialEq for Bar {
    fn eq(&self, other: &Self) -> bool {
        self.start_milliseconds_utc == other.start_milliseconds_utc
            && self.stream_id == other.stream_id
            && self.period == other.period
            && self.symbol == other.symbol
    }
}

impl Eq for Bar {}

impl Hash for Bar {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.start_milliseconds_utc.hash(state);
        self.stream_id.hash(state);
        self.period.hash(state);
        self.symbol.hash(state);
    }
}

impl Ord for Bar {
    fn cmp(&self, other: &Self) -> Ordering {
        compare_stream_ids(&self.stream_id, &other.stream_id)
            .then_with(|| self.symbol.cmp(&other.symbol))
            .then_with(|| self.period.cmp(&other.period))
            .then_with(|| self.start_milliseconds_utc.cmp(&other.start_milliseconds_utc))
            .then_with(|| self.end_milliseconds_utc().cmp(&other.end_milliseconds_utc()))
    }
}

impl PartialOrd for Bar {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

fn validate_symbol(symbol: &str) -> Result<(), StreamError> {
    if symbol.len() < SYMBOL_MIN_LEN {
        return Err(StreamError::invalid_argument(format!(
            "Symbol {symbol} must be at least {SYMBOL_MIN_LEN} characters"
        )));
    }
    Ok(())
}
