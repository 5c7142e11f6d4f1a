//! The [`Store`] port: the columnar analytical store, treated as an
//! external collaborator per spec.md §1 ("the columnar store itself ...
//! treated as a typed SQL-executing service with batch append and
//! parameterised query").
//!
//! The trait is intentionally wide — it is the one seam every other
//! component (raw sink, chain syncer, indexer runner, validator syncer, CLI)
//! talks through, mirroring the teacher's `ports::store` shape.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::ports::fetcher::{EvmBlockData, PChainBlockData};
use crate::types::entities::{
    ChainStatusRow, IndexerWatermarkRow, L1FeeStatsRow, L1ValidatorBalanceTxRow,
    L1ValidatorHistoryRow, L1ValidatorRefundRow, L1ValidatorStateRow, MetricRow, SubnetChainRow,
    SubnetRow,
};
use crate::types::primitives::Granularity;

/// A table's name plus its current row count, for the `size` CLI command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSize {
    /// Table name.
    pub table: String,
    /// Current row count.
    pub row_count: u64,
}

/// A sort-key value plus how many duplicate rows share it, for the
/// `duplicates` CLI command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuplicateKey {
    /// The colliding sort-key value, formatted for display.
    pub key: String,
    /// Number of rows sharing that key before replace-by-key merge.
    pub count: u64,
}

/// The columnar analytical store: raw-table append, watermark tracking,
/// derived-table writes, and the handful of read paths the engine itself
/// needs (as opposed to ad-hoc SQL templates, which the indexer runner
/// executes directly).
#[async_trait]
pub trait Store: Send + Sync {
    // ── sync watermark (spec.md §3 "Sync watermark") ──────────────────────

    /// Highest fully-persisted block for `chain_id`, `0` if absent.
    async fn get_sync_watermark(&self, chain_id: u32) -> Result<u64>;

    /// Advance the sync watermark. Callers must never pass a value lower
    /// than the current one; implementations enforce this.
    async fn set_sync_watermark(&self, chain_id: u32, block_number: u64) -> Result<()>;

    // ── raw append (spec.md §4.3 "Raw Sink") ───────────────────────────────

    /// Append EVM raw records across the four EVM tables for every block in
    /// `blocks`. Implementations split large batches into ≤5,000-record
    /// sub-batches internally.
    async fn append_evm_blocks(&self, chain_id: u32, blocks: &[EvmBlockData]) -> Result<()>;

    /// Append P-chain platform transactions for every block in `blocks`.
    async fn append_pchain_blocks(&self, chain_id: u32, blocks: &[PChainBlockData]) -> Result<()>;

    // ── observational status (spec.md §4.4) ────────────────────────────────

    /// Write the observational `chain_status` row after a sync iteration.
    async fn update_chain_status(&self, row: ChainStatusRow) -> Result<()>;

    // ── indexer watermarks (spec.md §3 "Indexer watermark") ───────────────

    /// Current watermark for `(chain_id, indexer_name, granularity)`.
    /// Returns a zero-valued row (epoch period / block 0) if absent.
    async fn get_indexer_watermark(
        &self,
        chain_id: u32,
        indexer_name: &str,
        granularity: &str,
    ) -> Result<IndexerWatermarkRow>;

    /// Replace the watermark row for `(chain_id, indexer_name, granularity)`.
    async fn set_indexer_watermark(&self, row: IndexerWatermarkRow) -> Result<()>;

    // ── derived metrics (spec.md §4.5 "granular metrics") ──────────────────

    /// Execute a granular metric's SQL template with bind parameters and
    /// insert the resulting rows into `metrics`. The SQL text has already had
    /// its brace tokens substituted by the caller; binds carry the typed
    /// period boundaries.
    async fn run_granular_metric(
        &self,
        indexer_name: &str,
        sql: &str,
        chain_id: u32,
        first_period: DateTime<Utc>,
        last_period: DateTime<Utc>,
        granularity: Granularity,
    ) -> Result<Vec<MetricRow>>;

    // ── block-range incrementals (spec.md §4.5 "batched/immediate incrementals") ──

    /// Execute an incremental indexer's SQL template over the inclusive
    /// block range `[from, to]`. Writes land directly in the indexer's own
    /// replace-by-key table; the engine does not interpret the result rows.
    async fn run_incremental(
        &self,
        indexer_name: &str,
        sql: &str,
        chain_id: u32,
        from: u64,
        to: u64,
    ) -> Result<()>;

    // ── validator syncer (spec.md §4.6) ────────────────────────────────────

    /// All known subnets.
    async fn list_subnets(&self) -> Result<Vec<SubnetRow>>;

    /// Insert or replace one subnet row.
    async fn upsert_subnet(&self, row: SubnetRow) -> Result<()>;

    /// Insert or replace one subnet-chain row.
    async fn upsert_subnet_chain(&self, row: SubnetChainRow) -> Result<()>;

    /// Every currently-active validator snapshot for `subnet_id`.
    async fn list_active_validators(&self, subnet_id: &str) -> Result<Vec<L1ValidatorStateRow>>;

    /// Insert or replace one validator state row.
    async fn upsert_validator_state(&self, row: L1ValidatorStateRow) -> Result<()>;

    /// Append one validator history event.
    async fn append_validator_history(&self, row: L1ValidatorHistoryRow) -> Result<()>;

    /// Append one balance-affecting validator transaction.
    async fn append_validator_balance_tx(&self, row: L1ValidatorBalanceTxRow) -> Result<()>;

    /// Sum of all deposit/top-up amounts recorded for `node_id` since
    /// `since_ms` (milliseconds UTC), used by the refund computation.
    async fn sum_validator_deposits(&self, node_id: &str, since_ms: i64) -> Result<u64>;

    /// Insert a computed refund row.
    async fn insert_validator_refund(&self, row: L1ValidatorRefundRow) -> Result<()>;

    /// Insert or replace aggregate fee stats for one subnet.
    async fn upsert_fee_stats(&self, row: L1FeeStatsRow) -> Result<()>;

    /// Highest platform-transaction block already scanned for subnet/
    /// validator discovery, bounding the next incremental scan.
    async fn highest_scanned_platform_block(&self, chain_id: u32) -> Result<u64>;

    /// Advance the highest-scanned-platform-block marker.
    async fn set_highest_scanned_platform_block(&self, chain_id: u32, block_number: u64) -> Result<()>;

    // ── CLI (spec.md §6) ────────────────────────────────────────────────────

    /// Row counts for every raw/derived table, for `chain-indexer size`.
    async fn table_sizes(&self) -> Result<Vec<TableSize>>;

    /// Sort-key collisions in raw tables (rows sharing a key before
    /// replace-by-key merge), for `chain-indexer duplicates`.
    async fn find_duplicates(&self) -> Result<Vec<DuplicateKey>>;

    /// Delete all data for one chain (raw tables, watermarks, derived rows).
    async fn wipe_chain(&self, chain_id: u32) -> Result<()>;

    /// Delete all P-chain validator/subnet derivation state.
    async fn wipe_pchain(&self) -> Result<()>;

    /// Delete every table this store manages.
    async fn wipe_all(&self) -> Result<()>;
}
