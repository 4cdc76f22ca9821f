//! Rate-limited direct fetch from the vendor.
//!
//! The vendor's free data feed throttles aggressive clients: exceed the
//! tolerated request rate and it answers 503, or silently delays responses by
//! 30 seconds. Every request therefore passes a token bucket, and
//! marker-matched server errors are retried with a linearly growing pause.

use crate::dukascopy::cache::stats::{CacheStats, CacheStatistics, STAT_MISS, STAT_RETRY};
use crate::dukascopy::cache::{DayBarCache, DirectBarCache, TickFileCache};
use crate::dukascopy::errors::DukascopyError;
use crate::dukascopy::search::TickSearch;
use fxbar_config::FetchConfig;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Fetcher configuration, mirroring the recognized knobs.
#[derive(Debug, Clone)]
pub struct FetchOptions {
    /// Vendor root; the trailing slash is required.
    pub base_url: String,
    /// Token-bucket rate for outbound requests.
    pub permits_per_second: f64,
    /// Base pause before the first retry; grows linearly per attempt.
    pub retry_seconds: f64,
    /// Maximum retry attempts for rate-limited errors.
    pub retry_count: u32,
    /// Substring of an error diagnostic that marks a rate-limited response.
    pub rate_limited_marker: String,
    /// Per-request timeout.
    pub timeout_secs: u64,
}

impl Default for FetchOptions {
    fn default() -> Self {
        FetchOptions {
            base_url: "https://datafeed.dukascopy.com/datafeed/".to_string(),
            permits_per_second: 3.0,
            retry_seconds: 30.0,
            retry_count: 3,
            rate_limited_marker: "503".to_string(),
            timeout_secs: 30,
        }
    }
}

impl From<&FetchConfig> for FetchOptions {
    fn from(config: &FetchConfig) -> Self {
        FetchOptions {
            base_url: config.base_url.clone(),
            permits_per_second: config.permits_per_second,
            retry_seconds: config.retry_seconds,
            retry_count: config.retry_count,
            rate_limited_marker: config.rate_limited_marker.clone(),
            timeout_secs: config.timeout_secs,
        }
    }
}

/// Blocking token bucket: one permit per request, refilled at a fixed rate.
pub struct RateLimiter {
    interval: Duration,
    next_free: Mutex<Instant>,
}

impl RateLimiter {
    pub fn new(permits_per_second: f64) -> Self {
        let per_second = permits_per_second.max(f64::MIN_POSITIVE);
        RateLimiter {
            interval: Duration::from_secs_f64(1.0 / per_second),
            next_free: Mutex::new(Instant::now()),
        }
    }

    /// Block until a permit is available and return how long the caller
    /// waited.
    pub fn acquire(&self) -> Duration {
        let wait = {
            let mut next_free = self.next_free.lock();
            let now = Instant::now();
            let wait = next_free.saturating_duration_since(now);
            *next_free = now.max(*next_free) + self.interval;
            wait
        };
        if !wait.is_zero() {
            std::thread::sleep(wait);
        }
        wait
    }
}

/// The no-cache leaf tier: every fetch goes to the vendor.
pub struct DirectDukascopy {
    client: reqwest::blocking::Client,
    options: FetchOptions,
    limiter: RateLimiter,
    stats: Arc<CacheStats>,
}

impl DirectDukascopy {
    pub fn new(options: FetchOptions) -> Self {
        info!(
            "direct fetch permits/s: {} retrySeconds: {} retryCount: {} url: {}",
            options.permits_per_second,
            options.retry_seconds,
            options.retry_count,
            options.base_url
        );
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(options.timeout_secs))
            .build()
            .expect("failed to build vendor HTTP client");
        let limiter = RateLimiter::new(options.permits_per_second);
        DirectDukascopy {
            client,
            options,
            limiter,
            stats: Arc::new(CacheStats::with_stats("DirectDukascopy", &[STAT_RETRY])),
        }
    }

    pub fn from_config(config: &FetchConfig) -> Self {
        Self::new(FetchOptions::from(config))
    }

    fn fetch_once(&self, url: &str) -> Result<Vec<u8>, DukascopyError> {
        let response = self.client.get(url).send()?;
        let status = response.status();
        if !status.is_success() {
            return Err(DukascopyError::Http {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }
        Ok(response.bytes()?.to_vec())
    }

    /// Fetch with the rate limiter and the retry policy for marker-matched
    /// errors. The pause before retry `n` is `retry_seconds * n`, growing
    /// linearly per attempt.
    fn fetch_with_retry(
        &self,
        url: &str,
        attempt_once: &dyn Fn(&str) -> Result<Vec<u8>, DukascopyError>,
    ) -> Result<Vec<u8>, DukascopyError> {
        let mut attempt = 1u32;
        loop {
            // The rate limit applies to retries as well.
            let waited = self.limiter.acquire();
            debug!("rate limit waited {:?}", waited);
            info!("loading from {url}");
            match attempt_once(url) {
                Ok(data) => return Ok(data),
                Err(error) => {
                    let diagnostic = error.to_string();
                    if attempt <= self.options.retry_count
                        && diagnostic.contains(&self.options.rate_limited_marker)
                    {
                        let pause = self.options.retry_seconds * f64::from(attempt);
                        info!("vendor server error: {diagnostic}");
                        warn!("pausing for {pause}s to retry");
                        std::thread::sleep(Duration::from_secs_f64(pause));
                        self.stats.increment(STAT_RETRY);
                        attempt += 1;
                    } else {
                        return Err(error);
                    }
                }
            }
        }
    }
}

impl TickFileCache for DirectDukascopy {
    fn fetch(&self, path: &str) -> Result<Vec<u8>, DukascopyError> {
        let url = format!("{}{}", self.options.base_url, path);
        let data = self.fetch_with_retry(&url, &|url| self.fetch_once(url))?;
        self.stats.increment(STAT_MISS);
        Ok(data)
    }

    fn statistics(&self) -> Arc<dyn CacheStatistics> {
        self.stats.clone()
    }

    fn create_bar_cache(&self, tick_search: Arc<TickSearch>) -> Box<dyn DayBarCache> {
        Box::new(DirectBarCache::new(tick_search))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn fast_options() -> FetchOptions {
        FetchOptions {
            permits_per_second: 100_000.0,
            retry_seconds: 0.0,
            ..FetchOptions::default()
        }
    }

    #[test]
    fn defaults_match_the_vendor_contract() {
        let options = FetchOptions::default();
        assert_eq!(options.base_url, "https://datafeed.dukascopy.com/datafeed/");
        assert!(options.base_url.ends_with('/'));
        assert_eq!(options.permits_per_second, 3.0);
        assert_eq!(options.retry_seconds, 30.0);
        assert_eq!(options.retry_count, 3);
        assert_eq!(options.rate_limited_marker, "503");
    }

    #[test]
    fn rate_limiter_spaces_acquisitions() {
        let limiter = RateLimiter::new(1_000.0);
        let start = Instant::now();
        for _ in 0..5 {
            limiter.acquire();
        }
        // Five permits at 1ms spacing: the fifth cannot complete before 4ms.
        assert!(start.elapsed() >= Duration::from_millis(4));
    }

    #[test]
    fn first_acquire_is_free() {
        let limiter = RateLimiter::new(0.5);
        assert!(limiter.acquire().is_zero());
    }

    #[test]
    fn retries_marker_matched_errors_and_counts_them() {
        let direct = DirectDukascopy::new(fast_options());
        let calls = Cell::new(0u32);
        let result = direct.fetch_with_retry("test-url", &|url| {
            calls.set(calls.get() + 1);
            if calls.get() < 3 {
                Err(DukascopyError::Http {
                    status: 503,
                    url: url.to_string(),
                })
            } else {
                Ok(vec![1, 2, 3])
            }
        });
        assert_eq!(result.unwrap(), vec![1, 2, 3]);
        assert_eq!(calls.get(), 3);
        assert_eq!(direct.stats.stat(STAT_RETRY), 2);
    }

    #[test]
    fn gives_up_after_the_retry_budget() {
        let direct = DirectDukascopy::new(fast_options());
        let calls = Cell::new(0u32);
        let result = direct.fetch_with_retry("test-url", &|url| {
            calls.set(calls.get() + 1);
            Err(DukascopyError::Http {
                status: 503,
                url: url.to_string(),
            })
        });
        assert!(matches!(
            result,
            Err(DukascopyError::Http { status: 503, .. })
        ));
        // retry_count retries after the initial attempt.
        assert_eq!(calls.get(), 4);
        assert_eq!(direct.stats.stat(STAT_RETRY), 3);
    }

    #[test]
    fn non_marker_errors_are_not_retried() {
        let direct = DirectDukascopy::new(fast_options());
        let calls = Cell::new(0u32);
        let result = direct.fetch_with_retry("test-url", &|url| {
            calls.set(calls.get() + 1);
            Err(DukascopyError::Http {
                status: 404,
                url: url.to_string(),
            })
        });
        assert!(matches!(
            result,
            Err(DukascopyError::Http { status: 404, .. })
        ));
        assert_eq!(calls.get(), 1);
        assert_eq!(direct.stats.stat(STAT_RETRY), 0);
    }

    #[test]
    fn http_diagnostic_embeds_the_status_code() {
        let error = DukascopyError::Http {
            status: 503,
            url: "https://datafeed.dukascopy.com/datafeed/EURUSD/2020/00/02/05h_ticks.bi5"
                .to_string(),
        };
        assert!(error.to_string().contains("503"));
    }
}
