//! Vendor fetch configuration.

use serde::{Deserialize, Serialize};

/// Knobs for the rate-limited direct fetcher.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchConfig {
    /// Vendor data root. The trailing slash is required; without it the
    /// vendor delays responses.
    pub base_url: String,

    /// Token-bucket rate for outbound requests. The default of 3/s plays
    /// nicely with the vendor; drop to 1.0 if responses start arriving
    /// delayed.
    pub permits_per_second: f64,

    /// Base pause before the first retry of a rate-limited error; the pause
    /// grows linearly with the attempt number.
    pub retry_seconds: f64,

    /// Maximum retry attempts for rate-limited errors.
    pub retry_count: u32,

    /// Substring of an error diagnostic that identifies a rate-limited
    /// response.
    pub rate_limited_marker: String,

    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        FetchConfig {
            base_url: "https://datafeed.dukascopy.com/datafeed/".to_string(),
            permits_per_second: 3.0,
            retry_seconds: 30.0,
            retry_count: 3,
            rate_limited_marker: "503".to_string(),
            timeout_secs: 30,
        }
    }
}
