//! Global FX trading-week calendar.
//!
//! The market is considered open from the Sydney session start (Monday 09:00
//! local) until the New York session close (Friday 17:00 local). Both bounds
//! move with daylight saving in their respective zones, so the check converts
//! the queried instant into each zone rather than working in fixed offsets.

use chrono::{DateTime, Datelike, Duration, LocalResult, NaiveTime, TimeZone, Timelike, Utc, Weekday};
use chrono_tz::Tz;
use tracing::debug;

const SYDNEY_OPEN_HOUR: u32 = 9;
const NEW_YORK_CLOSE_HOUR: u32 = 17;

/// Market state at one instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Open,
    Closed,
}

/// Decides whether an instant falls inside the global FX trading week.
#[derive(Debug, Clone)]
pub struct MarketStatus {
    sydney: Tz,
    new_york: Tz,
}

impl Default for MarketStatus {
    fn default() -> Self {
        MarketStatus::new()
    }
}

impl MarketStatus {
    pub fn new() -> Self {
        MarketStatus {
            sydney: chrono_tz::Australia::Sydney,
            new_york: chrono_tz::America::New_York,
        }
    }

    /// Whether the FX market is open at the given instant: after or at the
    /// Sydney week start and before the New York week end, daylight saving
    /// included.
    pub fn is_open(&self, instant: DateTime<Utc>) -> Status {
        let status = if self.after_sydney_week_start(instant)
            && self.before_new_york_week_end(instant)
        {
            Status::Open
        } else {
            Status::Closed
        };
        debug!("market status is {:?} for {}", status, instant);
        status
    }

    fn after_sydney_week_start(&self, instant: DateTime<Utc>) -> bool {
        let local = instant.with_timezone(&self.sydney);
        match local.weekday() {
            Weekday::Sun => false,
            Weekday::Mon => local.hour() >= SYDNEY_OPEN_HOUR,
            weekday => {
                // Previous Monday 09:00 Sydney time.
                let days_back = weekday.num_days_from_monday() as i64;
                let monday = local.date_naive() - Duration::days(days_back);
                let session_start = resolve_local(
                    &self.sydney,
                    monday.and_time(on_the_hour(SYDNEY_OPEN_HOUR)),
                );
                session_start
                    .map(|start| instant > start)
                    .unwrap_or(false)
            }
        }
    }

    fn before_new_york_week_end(&self, instant: DateTime<Utc>) -> bool {
        let local = instant.with_timezone(&self.new_york);
        match local.weekday() {
            Weekday::Sat => false,
            Weekday::Fri => local.hour() < NEW_YORK_CLOSE_HOUR,
            weekday => {
                // Next Friday 17:00 New York time.
                let days_ahead =
                    (Weekday::Fri.num_days_from_monday() as i64 + 7 - weekday.num_days_from_monday() as i64) % 7;
                let friday = local.date_naive() + Duration::days(days_ahead);
                let session_end = resolve_local(
                    &self.new_york,
                    friday.and_time(on_the_hour(NEW_YORK_CLOSE_HOUR)),
                );
                session_end.map(|end| instant < end).unwrap_or(false)
            }
        }
    }
}

fn on_the_hour(hour: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(hour, 0, 0).unwrap_or(NaiveTime::MIN)
}

/// Resolve a zone-local wall-clock time to UTC. Session bounds sit at 09:00
/// and 17:00, well away from the 02:00-03:00 daylight-saving transitions, so
/// ambiguity is resolved to the earlier instant and gaps never occur in
/// practice.
fn resolve_local(zone: &Tz, naive: chrono::NaiveDateTime) -> Option<DateTime<Utc>> {
    match zone.from_local_datetime(&naive) {
        LocalResult::Single(dt) => Some(dt.with_timezone(&Utc)),
        LocalResult::Ambiguous(earlier, _) => Some(earlier.with_timezone(&Utc)),
        LocalResult::None => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::DateTime;

    fn status_at(offset_time: &str) -> Status {
        let instant = DateTime::parse_from_rfc3339(offset_time)
            .unwrap()
            .with_timezone(&Utc);
        MarketStatus::new().is_open(instant)
    }

    #[test]
    fn closed_before_sydney_open_on_monday() {
        assert_eq!(status_at("2019-06-03T08:00:00+10:00"), Status::Closed);
    }

    #[test]
    fn open_at_sydney_open_on_monday() {
        assert_eq!(status_at("2019-06-03T09:00:00+10:00"), Status::Open);
    }

    #[test]
    fn open_at_sydney_open_during_daylight_saving() {
        assert_eq!(status_at("2019-02-04T09:00:00+11:00"), Status::Open);
        assert_eq!(status_at("2019-02-04T08:59:59+11:00"), Status::Closed);
    }

    #[test]
    fn closes_at_new_york_friday_close() {
        assert_eq!(status_at("2019-06-07T16:59:59-04:00"), Status::Open);
        assert_eq!(status_at("2019-06-07T17:01:00-04:00"), Status::Closed);
    }

    #[test]
    fn closes_at_new_york_friday_close_in_winter_time() {
        assert_eq!(status_at("2019-11-08T16:59:59-05:00"), Status::Open);
        assert_eq!(status_at("2019-11-08T17:00:00-05:00"), Status::Closed);
    }

    #[test]
    fn closed_across_the_weekend() {
        // Sunday noon UTC.
        assert_eq!(status_at("2019-07-07T12:00:00Z"), Status::Closed);
        // Saturday morning in Sydney while New York is still Friday afternoon.
        assert_eq!(status_at("2019-07-06T07:00:00+10:00"), Status::Closed);
        // Sunday evening in New York, just before the Sydney Monday open.
        assert_eq!(status_at("2019-07-07T17:59:59-05:00"), Status::Closed);
    }

    #[test]
    fn open_midweek() {
        assert_eq!(status_at("2019-06-05T12:00:00Z"), Status::Open);
    }
}
