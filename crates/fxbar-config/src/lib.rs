//! Configuration management for the fxbar data pipeline.
//!
//! Configuration precedence (highest to lowest):
//! 1. Environment variables (`FXBAR_` prefix, `__` section separator)
//! 2. Configuration file (`fxbar.toml`)
//! 3. Default values

mod cache;
mod fetch;

pub use cache::CacheConfig;
pub use fetch::FetchConfig;

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Root configuration for the data pipeline.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Settings {
    /// Vendor fetch behavior: rate limit, retry policy, endpoint.
    pub fetch: FetchConfig,

    /// Cache tier locations and sizing.
    pub cache: CacheConfig,
}

impl Settings {
    /// Load configuration from defaults, an optional `fxbar.toml` in the
    /// working directory, and `FXBAR_`-prefixed environment variables
    /// (`FXBAR_FETCH__RETRY_COUNT=5`).
    pub fn load() -> Result<Self, config::ConfigError> {
        let builder = config::Config::builder()
            .add_source(config::Config::try_from(&Settings::default())?)
            .add_source(
                config::File::with_name("fxbar")
                    .format(config::FileFormat::Toml)
                    .required(false),
            )
            .add_source(
                config::Environment::with_prefix("FXBAR")
                    .prefix_separator("_")
                    .separator("__"),
            );
        builder.build()?.try_deserialize()
    }

    /// Load configuration from a specific file over the defaults.
    pub fn load_from_file(path: &Path) -> Result<Self, config::ConfigError> {
        let builder = config::Config::builder()
            .add_source(config::Config::try_from(&Settings::default())?)
            .add_source(config::File::from(path).format(config::FileFormat::Toml));
        builder.build()?.try_deserialize()
    }
}
