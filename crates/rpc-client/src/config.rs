//! Configuration for the generic JSON-RPC client.
//!
//! This module provides [`RpcClientConfig`] for customizing client behavior:
//!
//! - Request timeout
//! - Batch sizing (separate knobs for light `eth_*` calls and heavier `debug_*` calls)
//! - Bounded concurrency
//! - Retry policy (exponential backoff with a cap)
//!
//! # Example
//!
//! ```
//! use rpc_client::RpcClientConfig;
//! use std::time::Duration;
//!
//! let config = RpcClientConfig::default()
//!     .with_timeout(Duration::from_secs(60))
//!     .with_max_concurrency(50);
//! ```

use std::time::Duration;

use crate::error::{Result, RpcError};

// ═══════════════════════════════════════════════════════════════════════════════
// CONSTANTS
// ═══════════════════════════════════════════════════════════════════════════════

/// Default timeout for HTTP requests to RPC endpoint.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Default dial timeout for establishing the underlying connection.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default number of standard `eth_*` sub-calls batched into one HTTP request.
pub const DEFAULT_RPC_BATCH_SIZE: usize = 400;

/// Default number of heavier `debug_*`/trace sub-calls batched into one HTTP request.
///
/// Kept much smaller than [`DEFAULT_RPC_BATCH_SIZE`] because debug/trace responses
/// are far larger per call.
pub const DEFAULT_DEBUG_BATCH_SIZE: usize = 10;

/// Default bound on in-flight HTTP requests for one client.
pub const DEFAULT_MAX_CONCURRENCY: usize = 100;

/// Default number of retry attempts after the initial try.
pub const DEFAULT_MAX_RETRIES: u32 = 5;

/// Default base delay for exponential backoff between retries.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(250);

/// Hard cap on the backoff delay regardless of attempt count.
pub const MAX_RETRY_DELAY: Duration = Duration::from_secs(10);

/// Minimum allowed timeout.
pub const MIN_TIMEOUT: Duration = Duration::from_secs(1);

/// Maximum allowed timeout. The spec calls for a 5-minute hard RPC timeout.
pub const MAX_TIMEOUT: Duration = Duration::from_secs(300);

/// Minimum allowed batch size (a batch of one sub-call degenerates to a plain call).
pub const MIN_BATCH_SIZE: usize = 1;

/// Maximum allowed batch size.
pub const MAX_BATCH_SIZE: usize = 10_000;

/// Minimum allowed concurrency.
pub const MIN_CONCURRENCY: usize = 1;

/// Maximum allowed concurrency.
pub const MAX_CONCURRENCY_LIMIT: usize = 10_000;

// ═══════════════════════════════════════════════════════════════════════════════
// CLIENT CONFIG
// ═══════════════════════════════════════════════════════════════════════════════

/// Configuration options for [`RpcClient`](crate::RpcClient).
///
/// Use the builder pattern to customize settings:
///
/// ```
/// use rpc_client::RpcClientConfig;
/// use std::time::Duration;
///
/// let config = RpcClientConfig::default()
///     .with_timeout(Duration::from_secs(60))
///     .with_rpc_batch_size(200)
///     .with_debug_batch_size(5)
///     .with_max_concurrency(50)
///     .with_max_retries(3)
///     .with_retry_delay(Duration::from_millis(500));
/// ```
#[derive(Debug, Clone)]
pub struct RpcClientConfig {
    /// Request timeout for HTTP calls.
    ///
    /// Default: 30 seconds. Range: 1-300 seconds.
    pub timeout: Duration,

    /// Connect (dial) timeout for the underlying HTTP connection.
    pub connect_timeout: Duration,

    /// Maximum number of standard `eth_*` sub-calls batched into one HTTP request.
    ///
    /// Default: 400. Range: 1-10,000.
    pub rpc_batch_size: usize,

    /// Maximum number of `debug_*`/trace sub-calls batched into one HTTP request.
    ///
    /// Kept smaller than `rpc_batch_size` because debug responses are heavier.
    /// Default: 10. Range: 1-10,000.
    pub debug_batch_size: usize,

    /// Maximum number of in-flight HTTP requests, enforced by a counting semaphore
    /// shared across every call issued by one client.
    ///
    /// Default: 100. Range: 1-10,000.
    pub max_concurrency: usize,

    /// Maximum retry attempts (after the initial attempt) before the call fails.
    ///
    /// Default: 5.
    pub max_retries: u32,

    /// Base delay for exponential backoff between retries.
    ///
    /// The delay doubles on each attempt and is capped at
    /// [`MAX_RETRY_DELAY`] (10 seconds) regardless of `retry_delay`.
    ///
    /// Default: 250ms.
    pub retry_delay: Duration,
}

impl Default for RpcClientConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_REQUEST_TIMEOUT,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            rpc_batch_size: DEFAULT_RPC_BATCH_SIZE,
            debug_batch_size: DEFAULT_DEBUG_BATCH_SIZE,
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            max_retries: DEFAULT_MAX_RETRIES,
            retry_delay: DEFAULT_RETRY_DELAY,
        }
    }
}

impl RpcClientConfig {
    /// Create a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the request timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the connect (dial) timeout.
    #[must_use]
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set the standard-call batch size.
    #[must_use]
    pub fn with_rpc_batch_size(mut self, size: usize) -> Self {
        self.rpc_batch_size = size;
        self
    }

    /// Set the debug/trace-call batch size.
    #[must_use]
    pub fn with_debug_batch_size(mut self, size: usize) -> Self {
        self.debug_batch_size = size;
        self
    }

    /// Set the maximum number of in-flight HTTP requests.
    #[must_use]
    pub fn with_max_concurrency(mut self, max: usize) -> Self {
        self.max_concurrency = max;
        self
    }

    /// Set the maximum number of retry attempts.
    #[must_use]
    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    /// Set the base retry delay.
    #[must_use]
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    /// Compute the backoff delay for a given retry attempt (0-indexed).
    ///
    /// `attempt` 0 is the delay before the first retry (i.e. after the initial
    /// call fails once). Grows exponentially from `retry_delay`, capped at
    /// [`MAX_RETRY_DELAY`].
    #[must_use]
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        self.retry_delay
            .saturating_mul(factor)
            .min(MAX_RETRY_DELAY)
    }

    /// Validate the configuration.
    ///
    /// Called automatically when creating a client. Returns an error if
    /// any values are out of range.
    ///
    /// # Errors
    ///
    /// Returns [`RpcError::InvalidConfig`] if any field is out of its documented range.
    pub fn validate(&self) -> Result<()> {
        if self.timeout < MIN_TIMEOUT {
            return Err(RpcError::InvalidConfig(format!(
                "timeout must be at least {MIN_TIMEOUT:?}"
            )));
        }
        if self.timeout > MAX_TIMEOUT {
            return Err(RpcError::InvalidConfig(format!(
                "timeout must be at most {MAX_TIMEOUT:?}"
            )));
        }

        if self.rpc_batch_size < MIN_BATCH_SIZE || self.rpc_batch_size > MAX_BATCH_SIZE {
            return Err(RpcError::InvalidConfig(format!(
                "rpc_batch_size must be between {MIN_BATCH_SIZE} and {MAX_BATCH_SIZE}"
            )));
        }

        if self.debug_batch_size < MIN_BATCH_SIZE || self.debug_batch_size > MAX_BATCH_SIZE {
            return Err(RpcError::InvalidConfig(format!(
                "debug_batch_size must be between {MIN_BATCH_SIZE} and {MAX_BATCH_SIZE}"
            )));
        }

        if self.max_concurrency < MIN_CONCURRENCY || self.max_concurrency > MAX_CONCURRENCY_LIMIT {
            return Err(RpcError::InvalidConfig(format!(
                "max_concurrency must be between {MIN_CONCURRENCY} and {MAX_CONCURRENCY_LIMIT}"
            )));
        }

        Ok(())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════
