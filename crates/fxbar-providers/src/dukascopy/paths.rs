//! Vendor archive path generation.
//!
//! Maps a symbol and time window to the ordered list of hourly archive paths
//! covering it. The single-list form omits hours outside the FX trading week;
//! the day-grouped form always yields the full 24 hours of each covered UTC
//! day so that day-level consumers (the bar caches) see a stable anchor.

use crate::dukascopy::errors::DukascopyError;
use chrono::{DateTime, Datelike, Duration, Timelike, Utc};
use fxbar_core::timestamp::{floor_to_hour, start_of_utc_day};
use fxbar_core::{MarketStatus, Status};

const HOURS_PER_DAY: i64 = 24;

/// Generates hourly vendor paths for a symbol and time window.
#[derive(Debug, Clone, Default)]
pub struct PathGenerator {
    market: MarketStatus,
}

impl PathGenerator {
    pub fn new(market: MarketStatus) -> Self {
        PathGenerator { market }
    }

    /// Ordered hourly paths covering `[start, end]`, market-open hours only.
    pub fn generate_paths(
        &self,
        symbol: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Vec<String> {
        let mut paths = Vec::new();
        let mut hour = floor_to_hour(start);
        let last = floor_to_hour(end);
        while hour <= last {
            if self.market.is_open(hour) == Status::Open {
                paths.push(hour_path(symbol, hour));
            }
            hour += Duration::hours(1);
        }
        paths
    }

    /// Paths covering `[start, end]` grouped per UTC day, 24 paths per day
    /// and no market filtering; callers filter downstream.
    pub fn generate_paths_grouped_by_day(
        &self,
        symbol: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Vec<Vec<String>> {
        let mut days = Vec::new();
        let mut day = start_of_utc_day(start);
        let last = start_of_utc_day(end);
        while day <= last {
            let day_paths = (0..HOURS_PER_DAY)
                .map(|hour| hour_path(symbol, day + Duration::hours(hour)))
                .collect();
            days.push(day_paths);
            day += Duration::days(1);
        }
        days
    }
}

/// Vendor path for one instrument hour:
/// `SYMBOL/YYYY/MM0/DD/HH0h_ticks.bi5` with the month zero-indexed.
pub fn hour_path(symbol: &str, hour_start: DateTime<Utc>) -> String {
    format!(
        "{}/{:04}/{:02}/{:02}/{:02}h_ticks.bi5",
        symbol.to_uppercase(),
        hour_start.year(),
        hour_start.month0(),
        hour_start.day(),
        hour_start.hour()
    )
}

/// Parsed identity of an hourly archive path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HourPath {
    pub symbol: String,
    pub hour_start: DateTime<Utc>,
}

/// Recover the symbol and hour start from a vendor path. The reverse of
/// [`hour_path`]; used when a cached payload is decoded back into ticks.
pub fn parse_hour_path(path: &str) -> Result<HourPath, DukascopyError> {
    let invalid = || {
        DukascopyError::invalid_argument(format!(
            "Path {path} is not of the form SYMBOL/YYYY/MM0/DD/HH0h_ticks.bi5"
        ))
    };
    let parts: Vec<&str> = path.split('/').collect();
    let [symbol, year, month0, day, file] = parts.as_slice() else {
        return Err(invalid());
    };
    let hour: u32 = file
        .strip_suffix("h_ticks.bi5")
        .ok_or_else(invalid)?
        .parse()
        .map_err(|_| invalid())?;
    let year: i32 = year.parse().map_err(|_| invalid())?;
    let month0: u32 = month0.parse().map_err(|_| invalid())?;
    let day: u32 = day.parse().map_err(|_| invalid())?;
    let date = chrono::NaiveDate::from_ymd_opt(year, month0 + 1, day).ok_or_else(invalid)?;
    let time = chrono::NaiveTime::from_hms_opt(hour, 0, 0).ok_or_else(invalid)?;
    Ok(HourPath {
        symbol: symbol.to_string(),
        hour_start: DateTime::from_naive_utc_and_offset(date.and_time(time), Utc),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(s: &str) -> DateTime<Utc> {
        s.parse().unwrap()
    }

    fn generator() -> PathGenerator {
        PathGenerator::new(MarketStatus::new())
    }

    #[test]
    fn path_template_uses_zero_indexed_month() {
        assert_eq!(
            hour_path("eurusd", parse("2020-01-02T05:00:00Z")),
            "EURUSD/2020/00/02/05h_ticks.bi5"
        );
        assert_eq!(
            hour_path("USDJPY", parse("2019-12-31T23:00:00Z")),
            "USDJPY/2019/11/31/23h_ticks.bi5"
        );
    }

    #[test]
    fn paths_cover_the_window_hour_by_hour() {
        // Thursday, mid-week: every hour is market-open.
        let paths = generator().generate_paths(
            "EURUSD",
            parse("2020-01-02T00:30:00Z"),
            parse("2020-01-02T03:59:59Z"),
        );
        assert_eq!(
            paths,
            vec![
                "EURUSD/2020/00/02/00h_ticks.bi5",
                "EURUSD/2020/00/02/01h_ticks.bi5",
                "EURUSD/2020/00/02/02h_ticks.bi5",
                "EURUSD/2020/00/02/03h_ticks.bi5",
            ]
        );
    }

    #[test]
    fn weekend_hours_are_omitted() {
        // Saturday 2020-01-04 is fully outside the trading week.
        let paths = generator().generate_paths(
            "EURUSD",
            parse("2020-01-04T00:00:00Z"),
            parse("2020-01-04T23:59:59Z"),
        );
        assert!(paths.is_empty());

        // Sunday 2020-01-05: Sydney opens Monday 09:00 AEDT = 22:00Z Sunday.
        let paths = generator().generate_paths(
            "EURUSD",
            parse("2020-01-05T00:00:00Z"),
            parse("2020-01-05T23:59:59Z"),
        );
        assert_eq!(
            paths,
            vec![
                "EURUSD/2020/00/05/22h_ticks.bi5",
                "EURUSD/2020/00/05/23h_ticks.bi5",
            ]
        );
    }

    #[test]
    fn day_grouping_yields_all_24_hours_unfiltered() {
        let days = generator().generate_paths_grouped_by_day(
            "EURUSD",
            parse("2020-01-04T10:00:00Z"),
            parse("2020-01-05T02:00:00Z"),
        );
        assert_eq!(days.len(), 2);
        for day in &days {
            assert_eq!(day.len(), 24);
        }
        assert_eq!(days[0][0], "EURUSD/2020/00/04/00h_ticks.bi5");
        assert_eq!(days[0][23], "EURUSD/2020/00/04/23h_ticks.bi5");
        assert_eq!(days[1][0], "EURUSD/2020/00/05/00h_ticks.bi5");
    }

    #[test]
    fn hour_paths_round_trip_through_the_parser() {
        let instant = parse("2020-06-08T13:00:00Z");
        let parsed = parse_hour_path(&hour_path("EURUSD", instant)).unwrap();
        assert_eq!(parsed.symbol, "EURUSD");
        assert_eq!(parsed.hour_start, instant);
    }

    #[test]
    fn malformed_paths_are_rejected() {
        assert!(parse_hour_path("EURUSD/2020/00/02").is_err());
        assert!(parse_hour_path("EURUSD/2020/00/02/xxh_ticks.bi5").is_err());
        assert!(parse_hour_path("EURUSD/2020/13/02/05h_ticks.bi5").is_err());
    }
}
