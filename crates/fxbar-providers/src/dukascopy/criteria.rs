//! Search criteria: validated, boundary-normalized time windows.

use crate::dukascopy::errors::DukascopyError;
use chrono::{DateTime, Duration, Utc};
use fxbar_core::timestamp::{
    fmt_instant, round_end_instant, round_end_second, round_start, start_of_utc_day,
};
use fxbar_core::{Period, SYMBOL_MIN_LEN};

/// Criteria for retrieving raw ticks: a symbol and an inclusive window.
///
/// The end instant is normalized to the last nanosecond of its second so a
/// request ending at `00:59:59` includes every tick of that second.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TickCriteria {
    symbol: String,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

impl TickCriteria {
    pub fn new(
        symbol: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Self, DukascopyError> {
        assert_symbol(symbol)?;
        assert_window(start, end)?;
        Ok(TickCriteria {
            symbol: symbol.to_string(),
            start,
            end: round_end_second(end),
        })
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    /// Inclusive end, normalized to end-of-second.
    pub fn end(&self) -> DateTime<Utc> {
        self.end
    }

    /// Whether a tick instant falls inside the inclusive window.
    pub fn contains_millis(&self, epoch_millis: i64) -> bool {
        epoch_millis >= self.start.timestamp_millis() && epoch_millis <= self.end.timestamp_millis()
    }
}

/// Criteria for retrieving bars: symbol, period and a window widened to whole
/// bars, along with the inclusive day span used by day-keyed caches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BarCriteria {
    symbol: String,
    period: Period,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    day_start: DateTime<Utc>,
    day_end: DateTime<Utc>,
    num_days: i64,
}

impl BarCriteria {
    pub fn new(
        symbol: &str,
        period: Period,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Self, DukascopyError> {
        assert_symbol(symbol)?;
        assert_window(start, end)?;
        let day_start = start_of_utc_day(start);
        let day_end = start_of_utc_day(end) + Duration::days(1) - Duration::nanoseconds(1);
        let num_days = (day_end - day_start).num_days() + 1;
        Ok(BarCriteria {
            symbol: symbol.to_string(),
            period,
            start: round_start(period, start),
            end: round_end_instant(period, end),
            day_start,
            day_end,
            num_days,
        })
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn period(&self) -> Period {
        self.period
    }

    /// Window start, rounded down to the containing bar.
    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    /// Window end, rounded to the inclusive end of the containing bar.
    pub fn end(&self) -> DateTime<Utc> {
        self.end
    }

    /// Number of UTC days the window touches.
    pub fn num_days(&self) -> i64 {
        self.num_days
    }

    /// Midnight starting day `i` of the span (day 0 holds the window start).
    pub fn day_start(&self, increment_days: i64) -> DateTime<Utc> {
        self.day_start + Duration::days(increment_days)
    }

    /// Inclusive end of day `i` of the span (the nanosecond before the next
    /// midnight).
    pub fn day_end(&self, increment_days: i64) -> DateTime<Utc> {
        self.day_start + Duration::days(increment_days + 1) - Duration::nanoseconds(1)
    }
}

/// Fail when `end` precedes `start`, quoting both instants.
pub fn assert_window(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<(), DukascopyError> {
    if start > end {
        return Err(DukascopyError::invalid_argument(format!(
            "Instant {} must be before {}",
            fmt_instant(start),
            fmt_instant(end)
        )));
    }
    Ok(())
}

fn assert_symbol(symbol: &str) -> Result<(), DukascopyError> {
    if symbol.len() < SYMBOL_MIN_LEN {
        return Err(DukascopyError::invalid_argument(format!(
            "Symbol {symbol} must be at least {SYMBOL_MIN_LEN} characters"
        )));
    }
    Ok(())
}
