//! Fixture builders shared by unit and integration tests.

use crate::types::{Bar, Period, StreamSource, Tick, MODEL_VERSION};
use uuid::Uuid;

/// A historical realtime-stream tick with nominal volumes.
pub fn tick(symbol: &str, millis: i64, bid: u32, ask: u32) -> Tick {
    tick_at(Uuid::nil(), symbol, millis, bid, ask)
}

/// A historical tick on an explicit stream.
pub fn tick_at(stream_id: Uuid, symbol: &str, millis: i64, bid: u32, ask: u32) -> Tick {
    Tick {
        milliseconds_utc: millis,
        stream_id,
        symbol: symbol.to_string(),
        bid,
        ask,
        bid_volume: 1.2,
        ask_volume: 1.4,
        source: StreamSource::Historical,
    }
}

/// A historical realtime-stream bar.
pub fn bar(
    symbol: &str,
    period: Period,
    start_millis: i64,
    open: u32,
    high: u32,
    low: u32,
    close: u32,
) -> Bar {
    Bar {
        start_milliseconds_utc: start_millis,
        stream_id: Uuid::nil(),
        period,
        symbol: symbol.to_string(),
        open,
        high,
        low,
        close,
        source: StreamSource::Historical,
        model_version: MODEL_VERSION.to_string(),
    }
}
