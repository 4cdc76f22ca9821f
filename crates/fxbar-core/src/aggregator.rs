//! Online tick-to-bar aggregation.
//!
//! The aggregator consumes a time-ordered tick stream and emits completed
//! bars through a notifier callback as tick time crosses period boundaries.
//! One in-flight bar is kept per partition key (stream id + symbol), all at
//! the same configured period. Grid slots with no ticks are skipped, never
//! synthesized.

use crate::errors::StreamError;
use crate::types::{Bar, Period, StreamSource, Tick, MODEL_VERSION};
use std::collections::HashMap;
use tracing::{debug, trace};
use uuid::Uuid;

/// Which side of the quote feeds bar OHLC prices.
///
/// The vendor archives carry both sides but bar construction historically
/// folds the bid only; the ask selection exists for callers that want the
/// other side of the book.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PriceSelection {
    #[default]
    Bid,
    Ask,
}

impl PriceSelection {
    fn price_of(&self, tick: &Tick) -> u32 {
        match self {
            PriceSelection::Bid => tick.bid,
            PriceSelection::Ask => tick.ask,
        }
    }
}

/// Receives completed bars from the aggregator.
///
/// `flush` is invoked once after the final in-flight bars have been emitted
/// at the end of a load.
pub trait BarNotifier {
    fn notify(&mut self, bar: Bar);

    fn flush(&mut self) {}
}

impl<F: FnMut(Bar)> BarNotifier for F {
    fn notify(&mut self, bar: Bar) {
        self(bar)
    }
}

/// In-flight OHLC state for one partition key.
#[derive(Debug)]
struct BarAccumulator {
    start_millis: i64,
    end_millis: i64,
    stream_id: Uuid,
    symbol: String,
    period: Period,
    open: u32,
    high: u32,
    low: u32,
    close: u32,
    source: StreamSource,
    tick_count: u64,
}

impl BarAccumulator {
    fn new(tick: &Tick, time_index: i64, period: Period, selection: PriceSelection) -> Self {
        let start_millis = time_index * period.duration_millis();
        let price = selection.price_of(tick);
        BarAccumulator {
            start_millis,
            end_millis: start_millis + period.duration_millis() - 1,
            stream_id: tick.stream_id,
            symbol: tick.symbol.clone(),
            period,
            open: price,
            high: price,
            low: price,
            close: price,
            source: tick.source,
            tick_count: 1,
        }
    }

    fn fold(&mut self, tick: &Tick, selection: PriceSelection) {
        let price = selection.price_of(tick);
        self.high = self.high.max(price);
        self.low = self.low.min(price);
        self.close = price;
        self.source = StreamSource::aggregate(self.source, tick.source);
        self.tick_count += 1;
    }

    fn to_bar(&self) -> Result<Bar, StreamError> {
        let bar = Bar {
            start_milliseconds_utc: self.start_millis,
            stream_id: self.stream_id,
            period: self.period,
            symbol: self.symbol.clone(),
            open: self.open,
            high: self.high,
            low: self.low,
            close: self.close,
            source: self.source,
            model_version: MODEL_VERSION.to_string(),
        };
        bar.validate()?;
        Ok(bar)
    }
}

/// Aggregates an ordered tick stream into bars of one fixed period,
/// partitioned by (stream id, symbol).
///
/// Callers must feed each partition from a single ordered stream; ordering
/// across partitions is irrelevant.
pub struct TickBarAggregator<N: BarNotifier> {
    period: Period,
    selection: PriceSelection,
    inflight: HashMap<String, BarAccumulator>,
    notifier: N,
}

impl<N: BarNotifier> TickBarAggregator<N> {
    /// Aggregator folding the bid price, the default selection.
    pub fn new(period: Period, notifier: N) -> Self {
        Self::with_price_selection(period, PriceSelection::default(), notifier)
    }

    pub fn with_price_selection(period: Period, selection: PriceSelection, notifier: N) -> Self {
        TickBarAggregator {
            period,
            selection,
            inflight: HashMap::new(),
            notifier,
        }
    }

    /// Signal the start of a bulk load.
    pub fn load_start(&mut self) {}

    /// Fold the next tick into its partition's in-flight bar, emitting the
    /// previous bar first when the tick has moved past its window.
    pub fn add(&mut self, tick: &Tick) -> Result<(), StreamError> {
        use std::collections::hash_map::Entry;

        tick.validate()?;
        let key = tick.partition_key();
        let time_index = tick.milliseconds_utc / self.period.duration_millis();
        trace!("adding tick to {} aggregator for {key}:{time_index}", self.period);

        match self.inflight.entry(key) {
            Entry::Vacant(slot) => {
                debug!(
                    "new {} accumulator for {} {} at index {time_index}",
                    self.period, tick.stream_id, tick.symbol
                );
                slot.insert(BarAccumulator::new(
                    tick,
                    time_index,
                    self.period,
                    self.selection,
                ));
            }
            Entry::Occupied(mut slot) => {
                let current = slot.get_mut();
                if tick.milliseconds_utc > current.end_millis {
                    // Ordered processing means the previous bar is complete.
                    let done = std::mem::replace(
                        current,
                        BarAccumulator::new(tick, time_index, self.period, self.selection),
                    );
                    self.notifier.notify(done.to_bar()?);
                } else {
                    current.fold(tick, self.selection);
                }
            }
        }
        Ok(())
    }

    /// Emit any remaining in-flight bars and invoke the notifier's flush hook.
    pub fn load_end(&mut self) -> Result<(), StreamError> {
        for (_, accumulator) in self.inflight.drain() {
            trace!("emitting final in-flight bar for {}", accumulator.symbol);
            self.notifier.notify(accumulator.to_bar()?);
        }
        self.notifier.flush();
        Ok(())
    }
}

/// Drain a tick stream through an aggregator and collect the emitted bars,
/// invoking the optional visitor on each bar as it is produced.
pub fn ticks_to_bars<E, I>(
    ticks: I,
    period: Period,
    selection: PriceSelection,
    mut visitor: Option<&mut dyn FnMut(&Bar)>,
) -> Result<Vec<Bar>, E>
where
    E: From<StreamError>,
    I: Iterator<Item = Result<Tick, E>>,
{
    let mut bars = Vec::new();
    {
        let sink = |bar: Bar| {
            if let Some(visit) = visitor.as_mut() {
                visit(&bar);
            }
            bars.push(bar);
        };
        let mut aggregator = TickBarAggregator::with_price_selection(period, selection, sink);
        aggregator.load_start();
        for tick in ticks {
            aggregator.add(&tick?)?;
        }
        aggregator.load_end()?;
    }
    Ok(bars)
}
