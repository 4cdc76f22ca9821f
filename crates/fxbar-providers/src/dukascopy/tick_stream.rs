//! Per-hour tick streams: cache fetch, decode, iterate.

use crate::dukascopy::cache::TickFileCache;
use crate::dukascopy::decoder::TickDecoder;
use crate::dukascopy::errors::DukascopyError;
use crate::dukascopy::paths::parse_hour_path;
use fxbar_core::{BoxedStream, Tick};
use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;
use tracing::debug;

/// A per-element callback shared across the sub-streams of one search.
pub type SharedVisitor<T> = Rc<RefCell<Box<dyn FnMut(&T)>>>;

/// Wrap an optional visitor for sharing across lazily-opened sub-streams.
pub fn shared_visitor<T>(visitor: Option<Box<dyn FnMut(&T)>>) -> Option<SharedVisitor<T>> {
    visitor.map(|v| Rc::new(RefCell::new(v)))
}

/// Open one hourly archive as a tick stream: fetch the payload through the
/// cache chain, decode it, and iterate the ticks invoking the visitor.
///
/// The archive's symbol and hour are recovered from the path itself, so the
/// stream can be opened for any vendor path without extra context.
pub fn open_hour(
    decoder: Arc<dyn TickDecoder>,
    cache: Arc<dyn TickFileCache>,
    path: &str,
    visitor: Option<SharedVisitor<Tick>>,
) -> Result<BoxedStream<Tick, DukascopyError>, DukascopyError> {
    let hour = parse_hour_path(path)?;
    let payload = cache.fetch(path)?;
    let ticks = decoder.decode(&hour.symbol, hour.hour_start, &payload)?;
    debug!("decoded {} ticks from {path}", ticks.len());
    Ok(Box::new(HourTickStream {
        ticks: ticks.into_iter(),
        visitor,
    }))
}

struct HourTickStream {
    ticks: std::vec::IntoIter<Tick>,
    visitor: Option<SharedVisitor<Tick>>,
}

impl Iterator for HourTickStream {
    type Item = Result<Tick, DukascopyError>;

    fn next(&mut self) -> Option<Self::Item> {
        let tick = self.ticks.next()?;
        if let Some(visitor) = &self.visitor {
            (visitor.borrow_mut())(&tick);
        }
        Some(Ok(tick))
    }
}
