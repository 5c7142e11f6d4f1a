//! Generic batching, bounded-concurrency, retrying JSON-RPC-over-HTTP client.
//!
//! This crate provides [`RpcClient`], the low-level primitive every chain-specific
//! fetcher in this workspace is built on. It knows nothing about blocks, logs, or
//! any particular chain's RPC dialect — it only knows how to get a batch of
//! JSON-RPC sub-calls to an HTTP endpoint and back, reliably.
//!
//! # Crate Relationships
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │  chain-indexer::fetcher (EVM + P-chain Fetcher impls)     │
//! └────────────────────────────┬─────────────────────────────┘
//!                              │
//!                              ▼
//! ┌──────────────────────────────────────────────────────────┐
//! │  rpc-client ◄── YOU ARE HERE                              │
//! │  └─ batching, bounded concurrency, retry/backoff          │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! # Quick Start
//!
//! ```ignore
//! use rpc_client::{RpcClient, BatchCall};
//!
//! let client = RpcClient::new("https://rpc.example.com")?;
//! let calls = vec![BatchCall::new("eth_getBlockByNumber", ("0x10", true))?];
//! let responses = client.call_batch(&calls).await?;
//! ```
//!
//! # Features
//!
//! - **Batching**: many sub-calls share one HTTP round trip, with separate knobs
//!   for light `eth_*` calls (`rpc_batch_size`) and heavy `debug_*`/trace calls
//!   (`debug_batch_size`).
//! - **Bounded concurrency**: a counting semaphore caps in-flight HTTP requests
//!   across every call issued by one client instance.
//! - **Retry with backoff**: transient failures are retried with exponential
//!   backoff capped at 10 seconds, up to `max_retries` attempts; non-retryable
//!   errors (method-not-found, data-integrity violations) propagate immediately.
//!
//! # Modules
//!
//! - [`client`] - The [`RpcClient`] implementation
//! - [`config`] - Tuning via [`RpcClientConfig`]
//! - [`types`] - Batch request/response types
//! - [`error`] - [`RpcError`] and the retry/method-support classification

#![doc(html_root_url = "https://docs.rs/rpc-client")]

pub mod client;
pub mod config;
pub mod error;
pub mod types;

pub use client::RpcClient;
pub use config::RpcClientConfig;
pub use error::{Result, RpcError};
pub use types::{BatchCall, BatchStats};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Returns the crate version string.
#[must_use]
pub const fn version() -> &'static str {
    VERSION
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_is_set() {
        assert!(!version().is_empty());
        assert!(version().starts_with('0'));
    }

    #[test]
    fn exports_are_available() {
        let _: fn() -> Result<RpcClient> = || RpcClient::new("http://localhost");
        let _: RpcClientConfig = RpcClientConfig::default();
        let _: BatchStats = BatchStats::default();
    }
}
