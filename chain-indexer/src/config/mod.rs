//! Configuration loading and validation.
//!
//! Configuration is loaded from a TOML file (spec.md §6's "Configuration
//! file") plus environment variable overrides:
//!
//! ```ignore
//! use chain_indexer::config::Settings;
//!
//! let settings = Settings::load("config/chains.toml")?;
//! settings.validate().expect("invalid configuration");
//! ```

mod settings;

pub use settings::{
    CacheSettings, ChainConfig, IndexerSettings, LoggingSettings, RetrySettings, Settings,
    StoreSettings, ValidatorSyncSettings,
};
