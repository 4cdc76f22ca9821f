//! UTC time helpers: epoch-millisecond conversions, truncation, and the
//! boundary-rounding rules used by search criteria.
//!
//! The rounding arithmetic is deliberately isolated here; it is easy to get
//! wrong at second boundaries where `nanosecond == 0` flips the inclusive-end
//! handling.

use crate::types::Period;
use chrono::{DateTime, Duration, SecondsFormat, TimeZone, Timelike, Utc};

/// Convert epoch milliseconds to a UTC date-time.
pub fn to_instant(epoch_millis: i64) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(epoch_millis)
        .single()
        .unwrap_or_else(|| DateTime::<Utc>::UNIX_EPOCH + Duration::milliseconds(epoch_millis))
}

/// Convert a UTC date-time to epoch milliseconds.
pub fn to_epoch_millis(instant: DateTime<Utc>) -> i64 {
    instant.timestamp_millis()
}

/// Floor an instant to the start of its UTC hour.
pub fn floor_to_hour(instant: DateTime<Utc>) -> DateTime<Utc> {
    to_instant((instant.timestamp_millis() / 3_600_000) * 3_600_000)
}

/// Floor an instant to UTC midnight of its day.
pub fn start_of_utc_day(instant: DateTime<Utc>) -> DateTime<Utc> {
    to_instant((instant.timestamp_millis().div_euclid(86_400_000)) * 86_400_000)
}

/// Format an instant the way it appears in user-visible diagnostics:
/// RFC 3339 with a `Z` suffix and no trailing zero fraction
/// (`2020-01-01T00:00:00Z`, `2020-01-01T23:59:59.999Z`).
pub fn fmt_instant(instant: DateTime<Utc>) -> String {
    instant.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

/// Expand an instant that falls exactly on a second boundary to the last
/// nanosecond of the previous second, making ranges inclusive to
/// end-of-second. Instants inside a second are returned unchanged.
pub fn round_end_second(end: DateTime<Utc>) -> DateTime<Utc> {
    if end.nanosecond() == 0 {
        end + Duration::seconds(1) - Duration::nanoseconds(1)
    } else {
        end
    }
}

/// Round a requested end instant up to the inclusive end of the bar that
/// contains it: advance one period, floor to the grid, step back one second
/// and expand to end-of-second.
pub fn round_end_instant(period: Period, end: DateTime<Utc>) -> DateTime<Utc> {
    let advanced = period.round_instant(end + Duration::milliseconds(period.duration_millis()));
    round_end_second(advanced - Duration::seconds(1))
}

/// Round a requested start instant down to the start of the bar containing it.
pub fn round_start(period: Period, start: DateTime<Utc>) -> DateTime<Utc> {
    period.round_instant(start)
}
