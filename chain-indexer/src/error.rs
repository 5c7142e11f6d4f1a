//! Layered error types for the ingestion pipeline.
//!
//! Three layers, mirroring spec.md §7's error taxonomy:
//!
//! - [`DomainError`] - invalid configuration or caller-supplied arguments
//!   (e.g. an inverted fetch range). Always a programmer/config mistake,
//!   never a runtime surprise.
//! - [`InfraError`] - transient I/O from RPC, the cache, or the store.
//!   Retried by the component that raised it (or by the chain syncer's
//!   outer loop); never panics.
//! - [`FatalError`] - spec.md §7's "data-integrity violation" and "unknown
//!   indexer SQL failure" classes. These are not retried: the component
//!   that observes one aborts its task, and the supervisor turns that into
//!   a process exit (spec.md §9, "panics as policy").
//!
//! [`AppError`] unifies all three for code that doesn't care which layer
//! raised the error; components that need to branch on fatality match on
//! [`AppError::Fatal`] directly.

use thiserror::Error;

/// Result type alias for application code.
pub type Result<T> = std::result::Result<T, AppError>;

// ═══════════════════════════════════════════════════════════════════════════════
// DOMAIN ERRORS
// ═══════════════════════════════════════════════════════════════════════════════

/// Invalid configuration or caller-supplied arguments.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum DomainError {
    /// A chain configuration entry failed validation.
    #[error("invalid chain config for chain_id={chain_id}: {reason}")]
    InvalidChainConfig {
        /// The chain the bad config entry belongs to.
        chain_id: u32,
        /// Human-readable reason.
        reason: String,
    },

    /// `FetchRange(from, to)` was called with `to < from`.
    #[error("invalid fetch range: from={from} > to={to}")]
    InvalidRange {
        /// Requested range start (inclusive).
        from: u64,
        /// Requested range end (inclusive).
        to: u64,
    },

    /// An indexer SQL template referenced a chain that isn't configured.
    #[error("unknown chain_id={0} referenced by indexer")]
    UnknownChain(u32),

    /// An indexer SQL file's variant/subdirectory didn't match any known
    /// indexer class (`evm_metrics`, `evm_incremental/{batched,immediate}`).
    #[error("unrecognised indexer layout: {0}")]
    UnrecognisedIndexerLayout(String),
}

// ═══════════════════════════════════════════════════════════════════════════════
// INFRASTRUCTURE ERRORS
// ═══════════════════════════════════════════════════════════════════════════════

/// Transient I/O errors from RPC, cache, or store. Retried by the caller.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum InfraError {
    /// RPC fetch failed (after the RPC client's own retries).
    #[error("rpc error: {0}")]
    Rpc(#[from] rpc_client::RpcError),

    /// Cache I/O failed. Per spec.md §4.1, a cache failure is never fatal —
    /// this variant exists so callers can log it before falling back.
    #[error("cache error: {0}")]
    Cache(#[from] chain_cache::CacheError),

    /// Store query or exec failed.
    #[error("store error: {0}")]
    Store(#[from] clickhouse::error::Error),

    /// Filesystem error reading SQL template files or the config file.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Settings failed to load from file or environment.
    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),

    /// TOML parse error surfaced while reading a chain config file.
    #[error("toml parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

// ═══════════════════════════════════════════════════════════════════════════════
// FATAL ERRORS
// ═══════════════════════════════════════════════════════════════════════════════

/// Data-integrity violations and unrecoverable derivation failures.
///
/// None of these are retried. Per spec.md §7/§9, the component that raises
/// one aborts its own task with a precise log line, and the process-level
/// supervisor (see `main.rs`) turns that into a non-zero exit — silent
/// advancement past one of these would corrupt downstream derivations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum FatalError {
    /// `FetchRange` returned a sequence with a gap or an out-of-order block.
    #[error("non-contiguous fetch range for chain {chain_id}: expected {expected}, got {got}")]
    NonContiguousRange {
        /// Chain the range was fetched for.
        chain_id: u32,
        /// The block height that should have come next.
        expected: u64,
        /// The block height actually observed.
        got: u64,
    },

    /// A batched RPC response had a different length than the request.
    #[error("batch length mismatch for chain {chain_id}: sent {sent}, received {received}")]
    BatchLengthMismatch {
        /// Chain the batch was issued for.
        chain_id: u32,
        /// Number of sub-calls sent.
        sent: usize,
        /// Number of responses received.
        received: usize,
    },

    /// The store rejected a raw-table append. The watermark must not advance.
    #[error("store write rejected for chain {chain_id} at block {block_number}: {source}")]
    StoreWriteRejected {
        /// Chain being synced.
        chain_id: u32,
        /// Block the append was for.
        block_number: u64,
        /// Underlying store error.
        #[source]
        source: clickhouse::error::Error,
    },

    /// An indexer's SQL execution failed in a way that is not a transient
    /// store error (e.g. a malformed template, a type mismatch). Per
    /// spec.md §7, this is fatal to the runner's per-indexer step rather
    /// than silently skipped.
    #[error("indexer '{indexer_name}' failed: {source}")]
    IndexerSqlFailed {
        /// The indexer's name (its SQL file stem).
        indexer_name: String,
        /// Underlying store error.
        #[source]
        source: clickhouse::error::Error,
    },

    /// A fetched RPC payload could not be parsed even after retry, per
    /// spec.md §7 ("Parse/decode error ... if persistent, fatal").
    #[error("persistent parse failure for chain {chain_id} at block {block_number}: {reason}")]
    PersistentParseFailure {
        /// Chain being synced.
        chain_id: u32,
        /// Block that failed to parse.
        block_number: u64,
        /// Human-readable parse failure reason.
        reason: String,
    },
}

// ═══════════════════════════════════════════════════════════════════════════════
// APPLICATION ERROR
// ═══════════════════════════════════════════════════════════════════════════════

/// Top-level error type unifying all three layers.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AppError {
    /// Domain logic error.
    #[error(transparent)]
    Domain(#[from] DomainError),

    /// Infrastructure error, typically retryable by the caller.
    #[error(transparent)]
    Infra(#[from] InfraError),

    /// Fatal, non-retryable error. See [`FatalError`].
    #[error(transparent)]
    Fatal(#[from] FatalError),
}

impl AppError {
    /// Whether this error belongs to the [`FatalError`] family and should
    /// trigger a process exit rather than a retry, per spec.md §7/§9.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::Fatal(_))
    }
}

// Convenience conversions so call sites can `?` straight from the leaf crates.

impl From<rpc_client::RpcError> for AppError {
    fn from(err: rpc_client::RpcError) -> Self {
        Self::Infra(InfraError::Rpc(err))
    }
}

impl From<chain_cache::CacheError> for AppError {
    fn from(err: chain_cache::CacheError) -> Self {
        Self::Infra(InfraError::Cache(err))
    }
}

impl From<clickhouse::error::Error> for AppError {
    fn from(err: clickhouse::error::Error) -> Self {
        Self::Infra(InfraError::Store(err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fatal_is_detected() {
        let err: AppError = FatalError::NonContiguousRange {
            chain_id: 1,
            expected: 10,
            got: 12,
        }
        .into();
        assert!(err.is_fatal());
    }

    #[test]
    fn domain_and_infra_are_not_fatal() {
        let domain: AppError = DomainError::InvalidRange { from: 5, to: 1 }.into();
        assert!(!domain.is_fatal());
    }

    #[test]
    fn display_messages_carry_context() {
        let err = DomainError::InvalidRange { from: 10, to: 5 };
        assert!(err.to_string().contains("10"));
        assert!(err.to_string().contains('5'));
    }
}
