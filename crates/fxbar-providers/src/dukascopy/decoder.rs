//! Tick archive decoding boundary.
//!
//! An hourly archive decodes to a time-ordered sequence of ticks whose
//! timestamps all fall within the hour. The trait keeps the vendor's
//! compression layer pluggable; [`PackedTickDecoder`] handles the
//! decompressed record layout.
//!
//! # Record layout
//!
//! Each record is 20 bytes, big-endian:
//!
//! ```text
//! offset  field         type
//! 0       time offset   u32   milliseconds from the hour start
//! 4       ask           u32   vendor points
//! 8       bid           u32   vendor points
//! 12      ask volume    f32   millions
//! 16      bid volume    f32   millions
//! ```
//!
//! A zero-length payload is a valid empty hour.

use crate::dukascopy::errors::DukascopyError;
use chrono::{DateTime, Utc};
use fxbar_core::{realtime_stream_id, StreamSource, Tick};

/// Size of one packed tick record in bytes.
pub const TICK_RECORD_LEN: usize = 20;

const HOUR_MILLIS: i64 = 3_600_000;

/// Decodes one hourly archive into a time-ordered tick sequence.
///
/// Implementations guarantee: output ordered by non-decreasing timestamp,
/// every timestamp within `[hour_start, hour_start + 1h)`, and fields
/// populated per the tick model.
pub trait TickDecoder: Send + Sync {
    fn decode(
        &self,
        symbol: &str,
        hour_start: DateTime<Utc>,
        data: &[u8],
    ) -> Result<Vec<Tick>, DukascopyError>;
}

/// Decoder for the fixed-width packed record layout.
#[derive(Debug, Clone, Copy, Default)]
pub struct PackedTickDecoder;

impl TickDecoder for PackedTickDecoder {
    fn decode(
        &self,
        symbol: &str,
        hour_start: DateTime<Utc>,
        data: &[u8],
    ) -> Result<Vec<Tick>, DukascopyError> {
        if data.len() % TICK_RECORD_LEN != 0 {
            return Err(DukascopyError::state(format!(
                "Tick payload of {} bytes is not a multiple of the {TICK_RECORD_LEN} byte record size",
                data.len()
            )));
        }
        let hour_millis = hour_start.timestamp_millis();
        let mut ticks = Vec::with_capacity(data.len() / TICK_RECORD_LEN);
        let mut previous_offset = 0u32;
        for record in data.chunks_exact(TICK_RECORD_LEN) {
            let offset = read_u32(record, 0);
            if i64::from(offset) >= HOUR_MILLIS {
                return Err(DukascopyError::state(format!(
                    "Tick offset {offset}ms lies outside its hour starting {hour_start}"
                )));
            }
            if offset < previous_offset {
                return Err(DukascopyError::state(format!(
                    "Tick offsets must not decrease: {offset}ms after {previous_offset}ms"
                )));
            }
            previous_offset = offset;
            let tick = Tick {
                milliseconds_utc: hour_millis + i64::from(offset),
                stream_id: realtime_stream_id(),
                symbol: symbol.to_string(),
                ask: read_u32(record, 4),
                bid: read_u32(record, 8),
                ask_volume: read_f32(record, 12),
                bid_volume: read_f32(record, 16),
                source: StreamSource::Historical,
            };
            tick.validate()?;
            ticks.push(tick);
        }
        Ok(ticks)
    }
}

fn read_u32(record: &[u8], at: usize) -> u32 {
    u32::from_be_bytes([record[at], record[at + 1], record[at + 2], record[at + 3]])
}

fn read_f32(record: &[u8], at: usize) -> f32 {
    f32::from_be_bytes([record[at], record[at + 1], record[at + 2], record[at + 3]])
}

/// Fixture encoder for the packed record layout.
#[cfg(any(test, feature = "test-utils"))]
pub mod test_support {
    use super::TICK_RECORD_LEN;

    /// One synthetic tick record: millisecond offset into the hour plus
    /// prices and volumes.
    #[derive(Debug, Clone, Copy)]
    pub struct RawTick {
        pub offset_millis: u32,
        pub bid: u32,
        pub ask: u32,
        pub bid_volume: f32,
        pub ask_volume: f32,
    }

    impl RawTick {
        pub fn quote(offset_millis: u32, bid: u32, ask: u32) -> Self {
            RawTick {
                offset_millis,
                bid,
                ask,
                bid_volume: 1.2,
                ask_volume: 1.4,
            }
        }
    }

    /// Encode records into an archive payload.
    pub fn encode_ticks(records: &[RawTick]) -> Vec<u8> {
        let mut data = Vec::with_capacity(records.len() * TICK_RECORD_LEN);
        for record in records {
            data.extend_from_slice(&record.offset_millis.to_be_bytes());
            data.extend_from_slice(&record.ask.to_be_bytes());
            data.extend_from_slice(&record.bid.to_be_bytes());
            data.extend_from_slice(&record.ask_volume.to_be_bytes());
            data.extend_from_slice(&record.bid_volume.to_be_bytes());
        }
        data
    }

    /// Encode `count` quotes evenly spaced across one hour.
    pub fn encode_hour_of_quotes(count: u32, bid: u32, ask: u32) -> Vec<u8> {
        let step = 3_600_000 / count.max(1);
        let records: Vec<RawTick> = (0..count)
            .map(|i| RawTick::quote(i * step, bid + i, ask + i))
            .collect();
        encode_ticks(&records)
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::{encode_ticks, RawTick};
    use super::*;

    fn hour() -> DateTime<Utc> {
        "2020-01-02T05:00:00Z".parse().unwrap()
    }

    #[test]
    fn decodes_ordered_quotes() {
        let payload = encode_ticks(&[
            RawTick::quote(0, 117_001, 117_004),
            RawTick::quote(250, 117_002, 117_005),
            RawTick::quote(3_599_999, 117_000, 117_003),
        ]);
        let ticks = PackedTickDecoder.decode("EURUSD", hour(), &payload).unwrap();
        assert_eq!(ticks.len(), 3);
        assert_eq!(ticks[0].milliseconds_utc, hour().timestamp_millis());
        assert_eq!(ticks[1].milliseconds_utc, hour().timestamp_millis() + 250);
        assert_eq!(ticks[0].bid, 117_001);
        assert_eq!(ticks[0].ask, 117_004);
        assert_eq!(ticks[2].symbol, "EURUSD");
        assert_eq!(ticks[2].source, StreamSource::Historical);
        assert!(ticks[2].stream_id.is_nil());
    }

    #[test]
    fn empty_payload_is_an_empty_hour() {
        let ticks = PackedTickDecoder.decode("EURUSD", hour(), &[]).unwrap();
        assert!(ticks.is_empty());
    }

    #[test]
    fn rejects_truncated_payload() {
        let mut payload = encode_ticks(&[RawTick::quote(0, 1, 2)]);
        payload.pop();
        assert!(PackedTickDecoder.decode("EURUSD", hour(), &payload).is_err());
    }

    #[test]
    fn rejects_offsets_outside_the_hour() {
        let payload = encode_ticks(&[RawTick::quote(3_600_000, 1, 2)]);
        assert!(PackedTickDecoder.decode("EURUSD", hour(), &payload).is_err());
    }

    #[test]
    fn rejects_decreasing_offsets() {
        let payload = encode_ticks(&[RawTick::quote(500, 1, 2), RawTick::quote(499, 1, 2)]);
        assert!(PackedTickDecoder.decode("EURUSD", hour(), &payload).is_err());
    }

    #[test]
    fn rejects_zero_prices() {
        let payload = encode_ticks(&[RawTick::quote(0, 0, 2)]);
        assert!(PackedTickDecoder.decode("EURUSD", hour(), &payload).is_err());
    }

    #[test]
    fn volumes_round_trip() {
        let payload = encode_ticks(&[RawTick {
            offset_millis: 10,
            bid: 100,
            ask: 101,
            bid_volume: 3.75,
            ask_volume: 0.25,
        }]);
        let ticks = PackedTickDecoder.decode("EURUSD", hour(), &payload).unwrap();
        assert_eq!(ticks[0].bid_volume, 3.75);
        assert_eq!(ticks[0].ask_volume, 0.25);
    }
}
