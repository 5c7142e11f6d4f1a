//! chain-indexer: continuous blockchain ingestion and derivation pipeline.
//!
//! For each configured chain, pulls raw blocks/transactions/traces/logs
//! (EVM) or platform transactions (P-chain) over JSON-RPC, persists them
//! verbatim into a columnar analytical store, and runs derived indexers
//! (time-bucketed metrics, block-range incrementals) tracked by durable
//! watermarks.
//!
//! # Architecture
//!
//! Hexagonal: the domain logic in [`syncer`], [`indexer`], and
//! [`validator`] depends only on the traits in [`ports`]; [`fetcher`] and
//! [`store`] are the concrete adapters wired up in `main.rs`.
//!
//! ```text
//! RPC ──▶ Fetcher ──▶ (Cache) ──▶ Chain Syncer ──▶ Raw Sink ──▶ store
//!                                                                 │
//!                                          ┌──────────────────────┤
//!                                          ▼                      ▼
//!                                   Indexer Runner         Validator Syncer
//!                                   (derived tables)       (P-chain only)
//! ```
//!
//! # Modules
//!
//! - [`types`] - domain types: chain/block identifiers, the EVM/P-chain
//!   discriminator, granularity/period algebra, and every row type
//!   persisted into the store.
//! - [`error`] - layered `Domain`/`Infra`/`Fatal` error taxonomy.
//! - [`config`] - `Settings`/`ChainConfig` loading and validation.
//! - [`ports`] - `Fetcher`/`ValidatorRpc`/`Store`/`Clock` trait seams.
//! - [`fetcher`] - concrete EVM/P-chain `Fetcher` adapters over `rpc-client`
//!   and `chain-cache`.
//! - [`sink`] - raw-table append, chunked to respect store batch limits.
//! - [`syncer`] - the per-chain sync loop advancing the raw-data watermark.
//! - [`indexer`] - the per-chain scheduler for SQL-defined derived metrics
//!   and incrementals.
//! - [`validator`] - the P-chain validator/subnet discovery and fee/refund
//!   projection loop.
//! - [`store`] - the concrete `ClickHouseStore` adapter.

#![doc(html_root_url = "https://docs.rs/chain-indexer")]

pub mod config;
pub mod error;
pub mod fetcher;
pub mod indexer;
pub mod ports;
pub mod sink;
pub mod store;
pub mod syncer;
pub mod types;
pub mod validator;

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Returns the library version string.
#[must_use]
pub const fn version() -> &'static str {
    VERSION
}
