//! Lazy, pull-based stream composition.
//!
//! Streams are ordinary iterators yielding `Result<T, E>`; resources are
//! released on drop, which makes close idempotent by construction. The
//! combinators here mirror the composition needs of the search engine:
//! concatenate lazily-opened sub-streams with a filter, adapt an in-memory
//! list, convert a tick stream to bars on first pull, and drive repeated
//! bounded searches to satisfy a requested element count.

use crate::aggregator::{ticks_to_bars, PriceSelection};
use crate::errors::StreamError;
use crate::types::{Bar, Period, Tick};
use tracing::debug;

/// A boxed stream of model items with in-band errors.
pub type BoxedStream<T, E> = Box<dyn Iterator<Item = Result<T, E>>>;

/// A lazily-opened sub-stream: opening may itself fail (e.g. a cache fetch).
pub type Opened<T, E> = Result<BoxedStream<T, E>, E>;

/// Visitor callback invoked exactly once per emitted element.
pub type Visitor<'a, T> = Option<&'a mut dyn FnMut(&T)>;

/// Stream over an in-memory list, invoking an owned visitor per element.
pub struct ListStream<T, E> {
    items: std::vec::IntoIter<T>,
    visitor: Option<Box<dyn FnMut(&T)>>,
    _marker: std::marker::PhantomData<E>,
}

impl<T, E> ListStream<T, E> {
    pub fn new(items: Vec<T>, visitor: Option<Box<dyn FnMut(&T)>>) -> Self {
        ListStream {
            items: items.into_iter(),
            visitor,
            _marker: std::marker::PhantomData,
        }
    }
}

impl<T, E> Iterator for ListStream<T, E> {
    type Item = Result<T, E>;

    fn next(&mut self) -> Option<Self::Item> {
        let item = self.items.next()?;
        if let Some(visit) = self.visitor.as_deref_mut() {
            visit(&item);
        }
        Some(Ok(item))
    }
}

/// Lazy concatenation of sub-streams with an element filter.
///
/// The next sub-stream is opened only once the current one is exhausted;
/// exhausted sub-streams are dropped immediately. Elements rejected by the
/// filter are skipped silently. The first error (from opening or from an
/// element) is yielded once, after which the stream ends.
pub struct Combine<T, E> {
    sources: Box<dyn Iterator<Item = Opened<T, E>>>,
    current: Option<BoxedStream<T, E>>,
    filter: Box<dyn FnMut(&T) -> bool>,
    failed: bool,
}

impl<T, E> Combine<T, E> {
    pub fn new(
        sources: impl Iterator<Item = Opened<T, E>> + 'static,
        filter: impl FnMut(&T) -> bool + 'static,
    ) -> Self {
        Combine {
            sources: Box::new(sources),
            current: None,
            filter: Box::new(filter),
            failed: false,
        }
    }

    /// Concatenation without filtering.
    pub fn all(sources: impl Iterator<Item = Opened<T, E>> + 'static) -> Self {
        Combine::new(sources, |_| true)
    }
}

impl<T, E> Iterator for Combine<T, E> {
    type Item = Result<T, E>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        loop {
            if self.current.is_none() {
                match self.sources.next() {
                    None => return None,
                    Some(Ok(stream)) => self.current = Some(stream),
                    Some(Err(error)) => {
                        self.failed = true;
                        return Some(Err(error));
                    }
                }
            }
            match self.current.as_mut().and_then(|stream| stream.next()) {
                None => {
                    // Sub-stream exhausted; release it before opening the next.
                    self.current = None;
                }
                Some(Err(error)) => {
                    self.failed = true;
                    return Some(Err(error));
                }
                Some(Ok(item)) => {
                    if (self.filter)(&item) {
                        return Some(Ok(item));
                    }
                }
            }
        }
    }
}

/// Adapts a tick stream into a bar stream by aggregating in memory on first
/// pull.
///
/// The entire tick stream is drained into the aggregator when the first bar
/// is requested, so memory grows with the source tick count; callers must
/// bound the input (the search engine feeds one day at a time) or drive the
/// aggregator directly.
pub struct TickToBarStream<E> {
    ticks: Option<BoxedStream<Tick, E>>,
    period: Period,
    selection: PriceSelection,
    visitor: Option<Box<dyn FnMut(&Bar)>>,
    converted: Option<std::vec::IntoIter<Bar>>,
    failed: bool,
}

impl<E: From<StreamError>> TickToBarStream<E> {
    pub fn new(period: Period, ticks: BoxedStream<Tick, E>) -> Self {
        Self::with_visitor(period, ticks, None)
    }

    pub fn with_visitor(
        period: Period,
        ticks: BoxedStream<Tick, E>,
        visitor: Option<Box<dyn FnMut(&Bar)>>,
    ) -> Self {
        TickToBarStream {
            ticks: Some(ticks),
            period,
            selection: PriceSelection::default(),
            visitor,
            converted: None,
            failed: false,
        }
    }

    fn convert(&mut self) -> Result<(), E> {
        if self.converted.is_some() {
            return Ok(());
        }
        let ticks = self.ticks.take().into_iter().flatten();
        let mut visitor = self.visitor.take();
        let visitor_ref: Option<&mut dyn FnMut(&Bar)> = match visitor {
            Some(ref mut boxed) => Some(boxed.as_mut()),
            None => None,
        };
        let bars = ticks_to_bars(ticks, self.period, self.selection, visitor_ref)?;
        debug!("aggregated {} {} bars on first access", bars.len(), self.period);
        self.converted = Some(bars.into_iter());
        Ok(())
    }
}

impl<E: From<StreamError>> Iterator for TickToBarStream<E> {
    type Item = Result<Bar, E>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        if let Err(error) = self.convert() {
            self.failed = true;
            return Some(Err(error));
        }
        self.converted.as_mut()?.next().map(Ok)
    }
}

/// Repeated bounded-search driver used by count-based extension.
///
/// `prepare` positions the strategy on its next window and reports whether it
/// is the final one; `perform` runs the window search; `sort` orders the
/// accumulated results before trimming.
pub trait SearchStrategy<T, E> {
    /// Position on the window for `search_count` (zero-based). Returns true
    /// when this is the final window to search.
    fn prepare(&mut self, search_count: u32) -> bool;

    /// Execute the search over the current window.
    fn perform(&mut self) -> Result<Vec<T>, E>;

    /// Order the accumulated data ascending before trimming.
    fn sort(&self, data: &mut Vec<T>);
}

/// Collect up to `max_count` items searching forwards; excess items beyond
/// the count are trimmed from the back.
pub fn extend_forwards<T, E>(
    max_count: usize,
    no_progress_limit: u32,
    strategy: &mut dyn SearchStrategy<T, E>,
) -> Result<Vec<T>, E> {
    let mut data = collect_until(max_count, no_progress_limit, strategy)?;
    strategy.sort(&mut data);
    data.truncate(max_count);
    Ok(data)
}

/// Collect up to `max_count` items searching backwards; the search walks into
/// the past, so excess items are trimmed from the front to keep the latest.
pub fn extend_backwards<T, E>(
    max_count: usize,
    no_progress_limit: u32,
    strategy: &mut dyn SearchStrategy<T, E>,
) -> Result<Vec<T>, E> {
    let mut data = collect_until(max_count, no_progress_limit, strategy)?;
    strategy.sort(&mut data);
    let excess = data.len().saturating_sub(max_count);
    Ok(data.split_off(excess))
}

fn collect_until<T, E>(
    max_count: usize,
    no_progress_limit: u32,
    strategy: &mut dyn SearchStrategy<T, E>,
) -> Result<Vec<T>, E> {
    let mut data: Vec<T> = Vec::with_capacity(max_count);
    let mut search_count = 0u32;
    let mut final_search = false;
    let mut empty_searches = 0u32;
    while data.len() < max_count && !final_search && empty_searches < no_progress_limit {
        final_search = strategy.prepare(search_count);
        search_count += 1;
        let before = data.len();
        data.extend(strategy.perform()?);
        if data.len() == before {
            empty_searches += 1;
        } else {
            empty_searches = 0;
        }
    }
    debug!(
        "collected {} items over {search_count} bounded searches (requested {max_count})",
        data.len()
    );
    Ok(data)
}
