//! No-cache bar leaf: aggregate a day of hourly tick files on the fly.

use crate::dukascopy::cache::stats::{CacheStats, CacheStatistics, STAT_MISS};
use crate::dukascopy::cache::DayBarCache;
use crate::dukascopy::criteria::BarCriteria;
use crate::dukascopy::errors::DukascopyError;
use crate::dukascopy::paths::parse_hour_path;
use crate::dukascopy::search::TickSearch;
use fxbar_core::aggregator::{ticks_to_bars, PriceSelection};
use fxbar_core::timestamp::start_of_utc_day;
use fxbar_core::Bar;
use std::sync::Arc;
use tracing::debug;

const DAY_MILLIS: i64 = 86_400_000;
const HOURS_PER_DAY: usize = 24;

/// Terminal bar tier: consumes the day's 24 hourly tick files through the
/// tick search and aggregates them into bars of the criteria's period.
pub struct DirectBarCache {
    tick_search: Arc<TickSearch>,
    stats: Arc<CacheStats>,
}

impl DirectBarCache {
    pub fn new(tick_search: Arc<TickSearch>) -> Self {
        DirectBarCache {
            tick_search,
            stats: Arc::new(CacheStats::new("DirectBarCache")),
        }
    }
}

impl DayBarCache for DirectBarCache {
    fn day_of_bars(
        &self,
        criteria: &BarCriteria,
        day_paths: &[String],
    ) -> Result<Vec<Bar>, DukascopyError> {
        if day_paths.len() != HOURS_PER_DAY {
            return Err(DukascopyError::invalid_argument(format!(
                "Paths for Day of 1H Tick files is not 24! {}",
                day_paths.len()
            )));
        }
        self.stats.increment(STAT_MISS);

        // The day window comes from the paths' own date so each grouped day
        // aggregates exactly its own ticks.
        let first = parse_hour_path(&day_paths[0])?;
        let day_start_millis = start_of_utc_day(first.hour_start).timestamp_millis();
        let day_end_millis = day_start_millis + DAY_MILLIS - 1;

        let ticks =
            self.tick_search
                .stream_paths(day_paths.to_vec(), day_start_millis, day_end_millis, None);
        let bars = ticks_to_bars(ticks, criteria.period(), PriceSelection::default(), None)?;
        debug!(
            "aggregated {} {} bars for day of {}",
            bars.len(),
            criteria.period(),
            day_paths[0]
        );
        Ok(bars)
    }

    fn statistics(&self) -> Arc<dyn CacheStatistics> {
        self.stats.clone()
    }
}
