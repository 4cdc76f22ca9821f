//! Tick and bar search over the vendor archive.
//!
//! Searches plan the hourly paths covering a window, compose lazy per-hour
//! tick streams fed by the cache chain, and for bars consult the day-keyed
//! bar cache whose leaf aggregates ticks on the fly. Count-based forms extend
//! a search forwards or backwards across no-data spans (weekends, holidays)
//! until the requested number of bars is found or the beginning-of-time
//! bound is reached.

use crate::dukascopy::cache::{DayBarCache, TickFileCache};
use crate::dukascopy::criteria::{assert_window, BarCriteria, TickCriteria};
use crate::dukascopy::decoder::TickDecoder;
use crate::dukascopy::errors::DukascopyError;
use crate::dukascopy::paths::PathGenerator;
use crate::dukascopy::tick_stream::{open_hour, shared_visitor, SharedVisitor};
use chrono::{DateTime, Duration, Utc};
use fxbar_core::stream::{extend_backwards, extend_forwards, SearchStrategy};
use fxbar_core::timestamp::fmt_instant;
use fxbar_core::{Bar, BoxedStream, Combine, ListStream, Opened, Period, Tick};
use std::sync::Arc;
use tracing::{debug, info};

/// Lower bound applied to every search by default. Limits how far the
/// count-based extenders can walk into the past.
pub const DEFAULT_BEGINNING_OF_TIME: &str = "2020-01-01T00:00:00Z";

/// Abort threshold for extension searches: give up once consecutive empty
/// windows span more than this many days (a weekend gap is under three).
const MAX_EMPTY_SPAN_DAYS: i64 = 7;

/// Composes per-hour tick streams from the decoder and the cache chain.
pub struct TickSearch {
    decoder: Arc<dyn TickDecoder>,
    cache: Arc<dyn TickFileCache>,
}

impl TickSearch {
    pub fn new(decoder: Arc<dyn TickDecoder>, cache: Arc<dyn TickFileCache>) -> Self {
        TickSearch { decoder, cache }
    }

    /// Lazy combined stream over the given paths, trimmed to the inclusive
    /// millisecond window. Each path is opened (fetched and decoded) only
    /// when the stream reaches it.
    pub fn stream_paths(
        &self,
        paths: Vec<String>,
        start_millis: i64,
        end_millis: i64,
        visitor: Option<Box<dyn FnMut(&Tick)>>,
    ) -> Combine<Tick, DukascopyError> {
        let decoder = self.decoder.clone();
        let cache = self.cache.clone();
        let visitor = shared_visitor(visitor);
        let sources = paths.into_iter().map(move |path| {
            open_hour(decoder.clone(), cache.clone(), &path, visitor.clone())
        });
        Combine::new(sources, move |tick: &Tick| {
            tick.milliseconds_utc >= start_millis && tick.milliseconds_utc <= end_millis
        })
    }
}

/// Search entry point over the vendor archive: raw ticks, windowed bar
/// aggregation, and count-based forward/backward extension.
pub struct DukascopySearch {
    path_generator: PathGenerator,
    cache: Arc<dyn TickFileCache>,
    tick_search: Arc<TickSearch>,
    bar_cache: Arc<dyn DayBarCache>,
    beginning_of_time: DateTime<Utc>,
}

impl DukascopySearch {
    pub fn new(
        decoder: Arc<dyn TickDecoder>,
        cache: Arc<dyn TickFileCache>,
        path_generator: PathGenerator,
    ) -> Self {
        let tick_search = Arc::new(TickSearch::new(decoder, cache.clone()));
        let bar_cache: Arc<dyn DayBarCache> = Arc::from(cache.create_bar_cache(tick_search.clone()));
        DukascopySearch {
            path_generator,
            cache,
            tick_search,
            bar_cache,
            beginning_of_time: DEFAULT_BEGINNING_OF_TIME
                .parse()
                .expect("default beginning of time must parse"),
        }
    }

    /// The lower search bound; requests before it are rejected.
    pub fn beginning_of_time(&self) -> DateTime<Utc> {
        self.beginning_of_time
    }

    pub fn set_beginning_of_time(&mut self, instant: DateTime<Utc>) {
        self.beginning_of_time = instant;
    }

    /// Statistics tree of the tick cache chain.
    pub fn statistics(&self) -> Arc<dyn crate::dukascopy::cache::CacheStatistics> {
        self.cache.statistics()
    }

    /// Statistics tree of the bar cache chain.
    pub fn bar_statistics(&self) -> Arc<dyn crate::dukascopy::cache::CacheStatistics> {
        self.bar_cache.statistics()
    }

    /// Stream ticks for a symbol over the inclusive window.
    pub fn search(
        &self,
        symbol: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<BoxedStream<Tick, DukascopyError>, DukascopyError> {
        self.search_with_visitor(symbol, start, end, None)
    }

    /// Stream ticks, invoking the visitor on each tick as it is decoded.
    pub fn search_with_visitor(
        &self,
        symbol: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        visitor: Option<Box<dyn FnMut(&Tick)>>,
    ) -> Result<BoxedStream<Tick, DukascopyError>, DukascopyError> {
        self.assert_criteria_times(start, end)?;
        let criteria = TickCriteria::new(symbol, start, end)?;
        debug!(
            "forming tick stream for {} {} -> {}",
            criteria.symbol(),
            fmt_instant(criteria.start()),
            fmt_instant(criteria.end())
        );
        let paths = self.path_generator.generate_paths(symbol, start, end);
        let stream = self.tick_search.stream_paths(
            paths,
            criteria.start().timestamp_millis(),
            criteria.end().timestamp_millis(),
            visitor,
        );
        info!(
            "returning tick stream for {} {} -> {}",
            criteria.symbol(),
            fmt_instant(criteria.start()),
            fmt_instant(criteria.end())
        );
        Ok(Box::new(stream))
    }

    /// Aggregate ticks into bars of the period over the inclusive window.
    pub fn aggregate_from_ticks(
        &self,
        symbol: &str,
        period: Period,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<BoxedStream<Bar, DukascopyError>, DukascopyError> {
        self.aggregate_from_ticks_with_visitor(symbol, period, start, end, None)
    }

    /// Aggregate ticks into bars, invoking the visitor per produced bar.
    pub fn aggregate_from_ticks_with_visitor(
        &self,
        symbol: &str,
        period: Period,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        visitor: Option<Box<dyn FnMut(&Bar)>>,
    ) -> Result<BoxedStream<Bar, DukascopyError>, DukascopyError> {
        self.assert_criteria_times(start, end)?;
        let criteria = BarCriteria::new(symbol, period, start, end)?;
        debug!(
            "forming bar stream for {} {} {} -> {}",
            criteria.symbol(),
            criteria.period(),
            fmt_instant(criteria.start()),
            fmt_instant(criteria.end())
        );
        let grouped = self
            .path_generator
            .generate_paths_grouped_by_day(symbol, start, end);
        let bar_cache = self.bar_cache.clone();
        let visitor = shared_visitor(visitor);
        let sources = grouped.into_iter().map(move |day_paths| {
            open_day_of_bars(&bar_cache, &criteria, day_paths, visitor.clone())
        });
        let trim = move |bar: &Bar| {
            let bar_start = bar.start_instant();
            bar_start >= start && bar_start <= end
        };
        info!("returning bar stream for {symbol} {period}");
        Ok(Box::new(Combine::new(sources, trim)))
    }

    /// The first `count` bars whose start is at or after `start`, walking
    /// forwards across no-data spans.
    pub fn aggregate_forward(
        &self,
        symbol: &str,
        period: Period,
        start: DateTime<Utc>,
        count: usize,
    ) -> Result<BoxedStream<Bar, DukascopyError>, DukascopyError> {
        self.aggregate_forward_with_visitor(symbol, period, start, count, None)
    }

    pub fn aggregate_forward_with_visitor(
        &self,
        symbol: &str,
        period: Period,
        start: DateTime<Utc>,
        count: usize,
        visitor: Option<Box<dyn FnMut(&Bar)>>,
    ) -> Result<BoxedStream<Bar, DukascopyError>, DukascopyError> {
        self.assert_criteria_time(start, "Start")?;
        let mut strategy = WindowedBarSearch::forwards(self, symbol, period, start, count, visitor);
        let bars = extend_forwards(count, strategy.no_progress_limit(), &mut strategy)?;
        Ok(Box::new(ListStream::new(bars, None)))
    }

    /// The last `count` bars whose start is strictly before `end`, walking
    /// backwards until satisfied or the beginning-of-time bound stops the
    /// search with a partial result.
    pub fn aggregate_backward(
        &self,
        symbol: &str,
        period: Period,
        count: usize,
        end: DateTime<Utc>,
    ) -> Result<BoxedStream<Bar, DukascopyError>, DukascopyError> {
        self.aggregate_backward_with_visitor(symbol, period, count, end, None)
    }

    pub fn aggregate_backward_with_visitor(
        &self,
        symbol: &str,
        period: Period,
        count: usize,
        end: DateTime<Utc>,
        visitor: Option<Box<dyn FnMut(&Bar)>>,
    ) -> Result<BoxedStream<Bar, DukascopyError>, DukascopyError> {
        self.assert_criteria_time(end, "End")?;
        let mut strategy = WindowedBarSearch::backwards(self, symbol, period, end, count, visitor);
        let bars = extend_backwards(count, strategy.no_progress_limit(), &mut strategy)?;
        Ok(Box::new(ListStream::new(bars, None)))
    }

    /// Reject an instant before the beginning-of-time bound, quoting both.
    pub fn assert_criteria_time(
        &self,
        instant: DateTime<Utc>,
        field_name: &str,
    ) -> Result<(), DukascopyError> {
        if instant < self.beginning_of_time {
            return Err(DukascopyError::invalid_argument(format!(
                "{field_name} {} must be after {}",
                fmt_instant(instant),
                fmt_instant(self.beginning_of_time)
            )));
        }
        Ok(())
    }

    /// Validate a full window: both bounds after beginning-of-time and the
    /// start not after the end.
    pub fn assert_criteria_times(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<(), DukascopyError> {
        self.assert_criteria_time(start, "Start")?;
        self.assert_criteria_time(end, "End")?;
        assert_window(start, end)
    }
}

/// Open one grouped day through the bar cache as a stream source, enforcing
/// the per-day bar count invariant.
fn open_day_of_bars(
    bar_cache: &Arc<dyn DayBarCache>,
    criteria: &BarCriteria,
    day_paths: Vec<String>,
    visitor: Option<SharedVisitor<Bar>>,
) -> Opened<Bar, DukascopyError> {
    let bars = bar_cache.day_of_bars(criteria, &day_paths)?;
    let max_bars = criteria.period().periods_in(Period::D1);
    if bars.len() as i64 > max_bars {
        return Err(DukascopyError::state(format!(
            "Unexpected number of bars {}",
            bars.len()
        )));
    }
    let list_visitor: Option<Box<dyn FnMut(&Bar)>> = visitor.map(|shared| {
        Box::new(move |bar: &Bar| (shared.borrow_mut())(bar)) as Box<dyn FnMut(&Bar)>
    });
    Ok(Box::new(ListStream::new(bars, list_visitor)))
}

/// Paged window search used by the forward/backward extenders. Each page
/// covers `count x period`; pages walk away from the anchor and clamp to
/// `[beginning_of_time, now]`.
struct WindowedBarSearch<'a> {
    search: &'a DukascopySearch,
    symbol: String,
    period: Period,
    anchor: DateTime<Utc>,
    window: Duration,
    forwards: bool,
    visitor: Option<SharedVisitor<Bar>>,
    current: Option<(DateTime<Utc>, DateTime<Utc>)>,
    now: DateTime<Utc>,
}

impl<'a> WindowedBarSearch<'a> {
    fn forwards(
        search: &'a DukascopySearch,
        symbol: &str,
        period: Period,
        start: DateTime<Utc>,
        count: usize,
        visitor: Option<Box<dyn FnMut(&Bar)>>,
    ) -> Self {
        Self::new(search, symbol, period, start, count, true, visitor)
    }

    fn backwards(
        search: &'a DukascopySearch,
        symbol: &str,
        period: Period,
        end: DateTime<Utc>,
        count: usize,
        visitor: Option<Box<dyn FnMut(&Bar)>>,
    ) -> Self {
        Self::new(search, symbol, period, end, count, false, visitor)
    }

    fn new(
        search: &'a DukascopySearch,
        symbol: &str,
        period: Period,
        anchor: DateTime<Utc>,
        count: usize,
        forwards: bool,
        visitor: Option<Box<dyn FnMut(&Bar)>>,
    ) -> Self {
        let window = Duration::milliseconds(period.duration_millis() * count.max(1) as i64);
        WindowedBarSearch {
            search,
            symbol: symbol.to_string(),
            period,
            anchor,
            window,
            forwards,
            visitor: shared_visitor(visitor),
            current: None,
            now: Utc::now(),
        }
    }

    /// Enough consecutive empty windows to have crossed any weekend or
    /// holiday gap before giving up.
    fn no_progress_limit(&self) -> u32 {
        let window_millis = self.window.num_milliseconds().max(1);
        let empty_span_millis = Duration::days(MAX_EMPTY_SPAN_DAYS).num_milliseconds();
        (empty_span_millis / window_millis + 2).min(i64::from(u32::MAX)) as u32
    }
}

impl SearchStrategy<Bar, DukascopyError> for WindowedBarSearch<'_> {
    fn prepare(&mut self, search_count: u32) -> bool {
        let offset = i64::from(search_count);
        let bound = self.search.beginning_of_time();
        if self.forwards {
            let start = self.anchor + self.window * (offset as i32);
            let mut end = self.anchor + self.window * (offset as i32 + 1) - Duration::nanoseconds(1);
            let mut last = false;
            if end >= self.now {
                end = self.now;
                last = true;
            }
            if start > end {
                self.current = None;
                return true;
            }
            debug!(
                "forward search between {} and {}",
                fmt_instant(start),
                fmt_instant(end)
            );
            self.current = Some((start, end));
            last
        } else {
            let end = self.anchor - self.window * (offset as i32) - Duration::nanoseconds(1);
            let mut start = self.anchor - self.window * (offset as i32 + 1);
            let mut last = false;
            if start <= bound {
                start = bound;
                last = true;
            }
            if end <= bound {
                self.current = None;
                return true;
            }
            debug!(
                "backward search between {} and {}",
                fmt_instant(start),
                fmt_instant(end)
            );
            self.current = Some((start, end));
            last
        }
    }

    fn perform(&mut self) -> Result<Vec<Bar>, DukascopyError> {
        let Some((start, end)) = self.current else {
            return Ok(Vec::new());
        };
        let visitor: Option<Box<dyn FnMut(&Bar)>> = self.visitor.clone().map(|shared| {
            Box::new(move |bar: &Bar| (shared.borrow_mut())(bar)) as Box<dyn FnMut(&Bar)>
        });
        let stream = self.search.aggregate_from_ticks_with_visitor(
            &self.symbol,
            self.period,
            start,
            end,
            visitor,
        )?;
        stream.collect()
    }

    fn sort(&self, data: &mut Vec<Bar>) {
        data.sort();
    }
}
