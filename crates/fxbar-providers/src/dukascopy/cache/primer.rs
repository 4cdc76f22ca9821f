//! Eager parallel cache priming.
//!
//! Walks a symbol/time range and fetches every hourly path through the cache
//! chain so the tiers materialize the payloads ahead of a backtest run. Task
//! failures are logged and never propagated; priming is best-effort.

use crate::dukascopy::cache::TickFileCache;
use crate::dukascopy::paths::PathGenerator;
use chrono::{DateTime, Utc};
use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use tracing::{error, info};

/// Parallel prefetcher over a cache chain.
///
/// Owns a worker pool sized to the available CPU cores. `load` enqueues one
/// task per generated path; `wait_for_completion` blocks until the queue
/// drains. Workers run tasks to completion; `shutdown` stops accepting work
/// and joins the pool.
pub struct CachePrimer {
    cache: Arc<dyn TickFileCache>,
    path_generator: PathGenerator,
    pool: Option<rayon::ThreadPool>,
    pending: Arc<(Mutex<u64>, Condvar)>,
}

impl CachePrimer {
    pub fn new(cache: Arc<dyn TickFileCache>, path_generator: PathGenerator) -> Self {
        Self::with_workers(cache, path_generator, num_cpus::get())
    }

    pub fn with_workers(
        cache: Arc<dyn TickFileCache>,
        path_generator: PathGenerator,
        workers: usize,
    ) -> Self {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers.max(1))
            .build()
            .expect("failed to build cache primer worker pool");
        CachePrimer {
            cache,
            path_generator,
            pool: Some(pool),
            pending: Arc::new((Mutex::new(0), Condvar::new())),
        }
    }

    /// Forget any pending loads and start a new batch. Tasks already running
    /// complete against the previous batch's bookkeeping.
    pub fn new_load(&mut self) {
        self.pending = Arc::new((Mutex::new(0), Condvar::new()));
    }

    /// Enqueue one prefetch task per market-open hourly path in the range.
    pub fn load(&self, symbol: &str, start: DateTime<Utc>, end: DateTime<Utc>) {
        let Some(pool) = self.pool.as_ref() else {
            error!("cache primer already shut down; ignoring load of {symbol}");
            return;
        };
        let paths = self.path_generator.generate_paths(symbol, start, end);
        info!("priming {} paths for {symbol}", paths.len());
        for path in paths {
            let cache = self.cache.clone();
            let pending = self.pending.clone();
            *pending.0.lock() += 1;
            pool.spawn(move || {
                // Read the payload fully so every tier materializes it.
                match cache.fetch(&path) {
                    Ok(data) => info!("loaded {path} {}b", data.len()),
                    Err(error) => error!("failed to load {path}: {error}"),
                }
                let (count, condvar) = &*pending;
                *count.lock() -= 1;
                condvar.notify_all();
            });
        }
    }

    /// Block until every enqueued task has finished.
    pub fn wait_for_completion(&self) {
        info!("waiting for completion");
        let (count, condvar) = &*self.pending;
        let mut remaining = count.lock();
        while *remaining > 0 {
            condvar.wait(&mut remaining);
        }
    }

    /// Stop the worker pool. In-flight tasks run to completion; further loads
    /// are ignored.
    pub fn shutdown(&mut self) {
        self.pool = None;
    }
}
