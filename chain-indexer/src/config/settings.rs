//! Settings structs and loading logic.
//!
//! Mirrors spec.md §6's "Configuration file": a list of chain entries with
//! required `chain_id`/`vm`/`rpc_url`/`name` and optional tuning knobs, plus
//! the ambient settings (store connection, cache root, indexer SQL layout,
//! logging) the teacher's `Settings::load` pattern always carries alongside
//! the domain-specific config.

use std::path::PathBuf;
use std::time::Duration;

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

use crate::types::primitives::Vm;

// ═══════════════════════════════════════════════════════════════════════════════
// DEFAULTS (spec.md §6: "Absent optional values use documented defaults")
// ═══════════════════════════════════════════════════════════════════════════════

const fn default_fetch_batch_size() -> usize {
    400
}

const fn default_max_concurrency() -> usize {
    100
}

const fn default_debug_batch_size() -> usize {
    10
}

const fn default_start_block() -> u64 {
    0
}

const fn default_validator_sync_interval_secs() -> u64 {
    300
}

fn default_cache_root() -> PathBuf {
    PathBuf::from("./rpc_cache")
}

fn default_sql_root() -> PathBuf {
    PathBuf::from("./sql")
}

const fn default_runner_poll_interval_ms() -> u64 {
    200
}

const fn default_incremental_batch_size() -> u64 {
    20_000
}

const fn default_batched_throttle_secs() -> u64 {
    300
}

const fn default_immediate_min_interval_ms() -> u64 {
    900
}

const fn default_retry_delay_ms() -> u64 {
    1_000
}

const fn default_max_retries() -> u32 {
    5
}

fn default_clickhouse_url() -> String {
    "http://localhost:8123".into()
}

fn default_clickhouse_database() -> String {
    "default".into()
}

fn default_log_level() -> String {
    "info".into()
}

fn default_log_format() -> String {
    "pretty".into()
}

// ═══════════════════════════════════════════════════════════════════════════════
// ROOT SETTINGS
// ═══════════════════════════════════════════════════════════════════════════════

/// Root configuration structure: every configured chain plus ambient
/// settings for the store, cache, indexer runner, and logging.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    /// One entry per chain this process ingests.
    pub chains: Vec<ChainConfig>,
    /// Columnar store connection settings.
    #[serde(default)]
    pub store: StoreSettings,
    /// On-disk block cache settings.
    #[serde(default)]
    pub cache: CacheSettings,
    /// Indexer runner scheduling settings.
    #[serde(default)]
    pub indexer: IndexerSettings,
    /// Structured logging settings.
    #[serde(default)]
    pub logging: LoggingSettings,
    /// Shared retry/backoff policy for the chain syncer's outer loop.
    #[serde(default)]
    pub retry: RetrySettings,
}

impl Settings {
    /// Load settings from a TOML file plus environment variable overrides.
    ///
    /// Environment variables use the `CHAIN_INDEXER__` prefix with `__` as
    /// the nesting separator, e.g. `CHAIN_INDEXER__STORE__URL`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file is malformed or required fields
    /// are missing after merging all sources.
    pub fn load(path: impl AsRef<std::path::Path>) -> Result<Self, ConfigError> {
        let builder = Config::builder()
            .add_source(File::from(path.as_ref()).required(true))
            .add_source(
                Environment::with_prefix("CHAIN_INDEXER")
                    .separator("__")
                    .try_parsing(true),
            );
        builder.build()?.try_deserialize()
    }

    /// Validate cross-field invariants the `config` crate's deserialization
    /// alone can't express (spec.md §3's chain-config invariants).
    ///
    /// # Errors
    ///
    /// Returns a list of human-readable validation failures; empty chain
    /// lists, duplicate chain ids, and zero-valued tuning knobs are rejected.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.chains.is_empty() {
            errors.push("at least one chain must be configured".into());
        }

        let mut seen = std::collections::HashSet::new();
        for chain in &self.chains {
            if !seen.insert(chain.chain_id) {
                errors.push(format!("duplicate chain_id: {}", chain.chain_id));
            }
            if chain.rpc_url.is_empty() {
                errors.push(format!("chain {}: rpc_url cannot be empty", chain.chain_id));
            }
            if chain.fetch_batch_size == 0 {
                errors.push(format!("chain {}: fetch_batch_size must be non-zero", chain.chain_id));
            }
            if chain.max_concurrency == 0 {
                errors.push(format!("chain {}: max_concurrency must be non-zero", chain.chain_id));
            }
            if chain.vm == Vm::PChain && chain.chain_id != 0 {
                // Spec.md §3: chain_id may be 0 for P-chain but isn't required to be.
                // Nothing to validate here beyond the shared checks above; this arm
                // exists so new P-chain-only invariants have an obvious home.
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Look up one configured chain by id.
    #[must_use]
    pub fn chain(&self, chain_id: u32) -> Option<&ChainConfig> {
        self.chains.iter().find(|c| c.chain_id == chain_id)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// CHAIN CONFIG (spec.md §3 "Chain config")
// ═══════════════════════════════════════════════════════════════════════════════

/// One configured chain: its RPC dialect, endpoint, and tuning knobs.
#[derive(Debug, Clone, Deserialize)]
pub struct ChainConfig {
    /// Numeric chain identifier. `0` is reserved for the primary P-chain
    /// network and may be reused by P-chain entries.
    pub chain_id: u32,
    /// Which raw-data dialect this chain speaks.
    pub vm: Vm,
    /// Human-readable name, used in `chain_status` rows and log lines.
    pub name: String,
    /// JSON-RPC-over-HTTP endpoint.
    pub rpc_url: String,
    /// Floor below which historical data is never requested.
    #[serde(default = "default_start_block")]
    pub start_block: u64,
    /// Blocks requested per `FetchRange` call from the chain syncer.
    #[serde(default = "default_fetch_batch_size")]
    pub fetch_batch_size: u64,
    /// Cap on in-flight RPC requests for this chain's fetcher.
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
    /// Sub-calls per batched `debug_*`/trace request.
    #[serde(default = "default_debug_batch_size")]
    pub debug_batch_size: usize,
    /// P-chain-only validator sync tuning. `None` disables the validator
    /// syncer for this chain even if `vm == PChain`.
    #[serde(default)]
    pub validator_sync: Option<ValidatorSyncSettings>,
}

/// Tuning for the P-chain validator syncer (spec.md §4.6).
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct ValidatorSyncSettings {
    /// Wall-clock interval between validator-sync iterations.
    #[serde(default = "default_validator_sync_interval_secs")]
    pub interval_secs: u64,
}

impl ValidatorSyncSettings {
    /// The configured interval as a [`Duration`].
    #[must_use]
    pub const fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

impl Default for ValidatorSyncSettings {
    fn default() -> Self {
        Self {
            interval_secs: default_validator_sync_interval_secs(),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// STORE SETTINGS
// ═══════════════════════════════════════════════════════════════════════════════

/// Connection settings for the columnar store (spec.md §6: "a columnar SQL
/// service"; implemented here against ClickHouse, see `SPEC_FULL.md` §2).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StoreSettings {
    /// HTTP endpoint of the ClickHouse server.
    pub url: String,
    /// Database name.
    pub database: String,
    /// Username for authentication.
    pub user: String,
    /// Password for authentication.
    pub password: String,
    /// Maximum pool connections (spec.md §5: "≈100 open").
    pub max_open_connections: u32,
    /// Minimum idle connections kept warm (spec.md §5: "≈50 idle").
    pub max_idle_connections: u32,
    /// Maximum lifetime of a pooled connection in seconds (spec.md §5: "1-hour lifetime").
    pub max_connection_lifetime_secs: u64,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            url: default_clickhouse_url(),
            database: default_clickhouse_database(),
            user: "default".into(),
            password: String::new(),
            max_open_connections: 100,
            max_idle_connections: 50,
            max_connection_lifetime_secs: 3_600,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// CACHE SETTINGS
// ═══════════════════════════════════════════════════════════════════════════════

/// On-disk block cache settings (spec.md §6: "Cache directory rooted at
/// `./rpc_cache/<chain_id>/`").
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    /// Root directory; per-chain subdirectories are created under it.
    pub root_dir: PathBuf,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            root_dir: default_cache_root(),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// INDEXER RUNNER SETTINGS
// ═══════════════════════════════════════════════════════════════════════════════

/// Scheduling knobs for the indexer runner (spec.md §4.5).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct IndexerSettings {
    /// Root of the `sql/<variant>/<subdir>/<indexer>.sql` filesystem layout.
    pub sql_root: PathBuf,
    /// Wall-clock poll interval for the runner's scheduling loop.
    pub poll_interval_ms: u64,
    /// Default inclusive block-range cap for coarse incremental indexers.
    pub incremental_batch_size: u64,
    /// Minimum wall-clock spacing between batched-incremental executions.
    pub batched_throttle_secs: u64,
    /// Minimum wall-clock spacing between immediate-incremental executions.
    pub immediate_min_interval_ms: u64,
}

impl IndexerSettings {
    /// The poll interval as a [`Duration`].
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// The batched-incremental throttle as a [`Duration`].
    #[must_use]
    pub const fn batched_throttle(&self) -> Duration {
        Duration::from_secs(self.batched_throttle_secs)
    }

    /// The immediate-incremental floor as a [`Duration`].
    #[must_use]
    pub const fn immediate_min_interval(&self) -> Duration {
        Duration::from_millis(self.immediate_min_interval_ms)
    }
}

impl Default for IndexerSettings {
    fn default() -> Self {
        Self {
            sql_root: default_sql_root(),
            poll_interval_ms: default_runner_poll_interval_ms(),
            incremental_batch_size: default_incremental_batch_size(),
            batched_throttle_secs: default_batched_throttle_secs(),
            immediate_min_interval_ms: default_immediate_min_interval_ms(),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// RETRY SETTINGS
// ═══════════════════════════════════════════════════════════════════════════════

/// Shared retry/backoff policy for the chain syncer's outer loop
/// (spec.md §4.4: "the loop sleeps `retry_delay` and retries").
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    /// Sleep duration between failed sync-loop iterations.
    pub retry_delay_ms: u64,
    /// Maximum RPC-level retry attempts before a range fetch fails outright.
    pub max_retries: u32,
}

impl RetrySettings {
    /// The retry delay as a [`Duration`].
    #[must_use]
    pub const fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            retry_delay_ms: default_retry_delay_ms(),
            max_retries: default_max_retries(),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// LOGGING SETTINGS
// ═══════════════════════════════════════════════════════════════════════════════

/// Structured logging settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Log level (trace, debug, info, warn, error).
    pub level: String,
    /// Log format: `pretty` for human-readable, `json` for machine-parsed.
    pub format: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;

    fn chain(chain_id: u32, rpc_url: &str) -> ChainConfig {
        ChainConfig {
            chain_id,
            vm: Vm::Evm,
            name: "test".into(),
            rpc_url: rpc_url.into(),
            start_block: 0,
            fetch_batch_size: 400,
            max_concurrency: 100,
            debug_batch_size: 10,
            validator_sync: None,
        }
    }

    fn settings(chains: Vec<ChainConfig>) -> Settings {
        Settings {
            chains,
            store: StoreSettings::default(),
            cache: CacheSettings::default(),
            indexer: IndexerSettings::default(),
            logging: LoggingSettings::default(),
            retry: RetrySettings::default(),
        }
    }

    #[test]
    fn validate_rejects_empty_chain_list() {
        let s = settings(vec![]);
        assert!(s.validate().is_err());
    }

    #[test]
    fn validate_rejects_duplicate_chain_ids() {
        let s = settings(vec![chain(1, "http://a"), chain(1, "http://b")]);
        let errs = s.validate().unwrap_err();
        assert!(errs.iter().any(|e| e.contains("duplicate")));
    }

    #[test]
    fn validate_rejects_empty_rpc_url() {
        let s = settings(vec![chain(1, "")]);
        let errs = s.validate().unwrap_err();
        assert!(errs.iter().any(|e| e.contains("rpc_url")));
    }

    #[test]
    fn validate_accepts_well_formed_settings() {
        let s = settings(vec![chain(1, "http://localhost:8545"), chain(43114, "http://localhost:9650")]);
        assert!(s.validate().is_ok());
    }

    #[test]
    fn chain_lookup_by_id() {
        let s = settings(vec![chain(43114, "http://localhost:9650")]);
        assert!(s.chain(43114).is_some());
        assert!(s.chain(1).is_none());
    }

    #[test]
    fn indexer_settings_durations() {
        let settings = IndexerSettings::default();
        assert_eq!(settings.poll_interval(), Duration::from_millis(200));
        assert_eq!(settings.batched_throttle(), Duration::from_secs(300));
        assert_eq!(settings.immediate_min_interval(), Duration::from_millis(900));
    }
}
