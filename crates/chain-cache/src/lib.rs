//! Content-addressed on-disk cache of raw block bytes, keyed by `(chain, height)`.
//!
//! This crate is the `Cache` leaf of the ingestion pipeline: it lets the RPC
//! fetcher avoid re-fetching deterministic, immutable raw blocks across
//! restarts and across sibling subsystems (the one-shot `cache` CLI command
//! fills it without ever touching the store).
//!
//! # Contract
//!
//! - [`Cache::put`] is atomic and durable before returning.
//! - [`Cache::get_range`] is best-effort: it returns exactly the present
//!   subset of the requested range, never erroring on a hole.
//! - [`Cache::get_or_fill`] composes a miss-then-fill-then-put, used by the
//!   fetcher's `FetchRange`.
//! - Checkpoints ([`Cache::get_checkpoint`]/[`Cache::set_checkpoint`]) are the
//!   only strongly-consistent state the cache carries; they are enforced
//!   monotone by the implementation, not just by convention.
//!
//! # Failure semantics
//!
//! A read I/O error is equivalent to a miss. A write I/O error is the
//! caller's to log and swallow — [`Cache::put`] surfaces it as a `Result` so
//! the caller can do exactly that; the freshly fetched bytes are still
//! returned to the caller regardless of whether the cache write succeeded.
//!
//! This cache has no invalidation: a reorged block at height `h` would be
//! served stale forever. The system built on this crate assumes
//! finalised-only ingestion.

use std::collections::BTreeMap;

mod error;
mod fs;

pub use error::{CacheError, Result};
pub use fs::{FsCache, BUCKET_SIZE};

#[cfg(any(test, feature = "test-utils"))]
pub mod mock;

/// Raw bytes as returned by the RPC endpoint for one block. Stored exactly as
/// received; the cache never interprets them.
pub type Bytes = Vec<u8>;

/// Content-addressed on-disk store of raw block bytes per `(chain, height)`,
/// with range lookup and a durable "highest densely-cached" checkpoint.
#[async_trait::async_trait]
pub trait Cache: Send + Sync {
    /// Durably store `bytes` for `(chain_id, height)`.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Io`] on a write failure. Per the cache's
    /// documented failure semantics, callers typically log this at `warn`
    /// and proceed with the value they already have in hand rather than
    /// treating it as fatal.
    async fn put(&self, chain_id: u32, height: u64, bytes: Bytes) -> Result<()>;

    /// Look up one entry. `None` on miss (including on a read I/O error,
    /// which is treated as a miss rather than surfaced).
    async fn get(&self, chain_id: u32, height: u64) -> Option<Bytes>;

    /// Look up every entry in the inclusive range `[from, to]`. Returns
    /// exactly the present subset — a hole at any height is simply absent
    /// from the returned map, never an error.
    async fn get_range(&self, chain_id: u32, from: u64, to: u64) -> BTreeMap<u64, Bytes>;

    /// The highest block height below which the cache is known to be dense
    /// (every height has an entry). `0` if no checkpoint has been set.
    async fn get_checkpoint(&self, chain_id: u32) -> u64;

    /// Advance the checkpoint. Implementations must reject (and leave
    /// unchanged) any attempt to set a value lower than the current one.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::NonMonotoneCheckpoint`] if `height` is lower
    /// than the checkpoint already on disk, or [`CacheError::Io`] on a
    /// write failure.
    async fn set_checkpoint(&self, chain_id: u32, height: u64) -> Result<()>;

    /// Return the cached entry for `(chain_id, height)` if present;
    /// otherwise call `fill`, cache its result, and return it.
    ///
    /// A write failure from the implicit `put` is swallowed (logged by the
    /// implementation) — the freshly filled bytes are returned regardless,
    /// per the cache's documented failure semantics.
    async fn get_or_fill<F, Fut>(&self, chain_id: u32, height: u64, fill: F) -> Result<Bytes>
    where
        F: FnOnce() -> Fut + Send,
        Fut: std::future::Future<Output = Bytes> + Send,
    {
        if let Some(bytes) = self.get(chain_id, height).await {
            return Ok(bytes);
        }
        let bytes = fill().await;
        let _ = self.put(chain_id, height, bytes.clone()).await;
        Ok(bytes)
    }
}

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fs_cache_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<FsCache>();
    }
}
