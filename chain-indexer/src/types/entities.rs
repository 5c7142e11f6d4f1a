//! Row types persisted into the columnar store: raw EVM/P-chain records,
//! watermarks, and derived rows.
//!
//! Every raw table carries `chain_id`/`block_number` and is declared
//! `ENGINE = ReplacingMergeTree` on a sort key that makes re-append a no-op
//! in effect (spec.md §3's "write-once" ownership rule) — see
//! `sql/schema.sql` for the `CREATE TABLE` statements these structs mirror.

use chrono::{DateTime, TimeZone, Utc};
use clickhouse::Row;
use serde::{Deserialize, Serialize};

// ═══════════════════════════════════════════════════════════════════════════════
// RAW EVM RECORDS
// ═══════════════════════════════════════════════════════════════════════════════

/// One row of `raw_blocks`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Row)]
pub struct RawBlock {
    /// Chain this block belongs to.
    pub chain_id: u32,
    /// Block height.
    pub block_number: u64,
    /// Block hash, hex-encoded with `0x` prefix.
    pub block_hash: String,
    /// Parent block hash.
    pub parent_hash: String,
    /// Millisecond-UTC block timestamp. Monotone-non-decreasing per chain in
    /// practice; callers must not assume strict monotonicity.
    pub block_time: i64,
    /// Total gas used by all transactions in the block.
    pub gas_used: u64,
    /// Block gas limit.
    pub gas_limit: u64,
    /// EIP-1559 base fee, if the chain has activated it.
    pub base_fee_per_gas: Option<u64>,
    /// Number of transactions in the block.
    pub tx_count: u32,
    /// Block miner/validator address.
    pub miner: String,
}

/// One row of `raw_txs` — a transaction merged with its receipt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Row)]
pub struct RawTransaction {
    /// Chain this transaction belongs to.
    pub chain_id: u32,
    /// Block height containing this transaction.
    pub block_number: u64,
    /// Position within the block.
    pub tx_index: u32,
    /// Transaction hash.
    pub tx_hash: String,
    /// Sender address.
    pub tx_from: String,
    /// Recipient address, `None` for contract creation.
    pub tx_to: Option<String>,
    /// Value transferred, as a decimal string (wei-scale values exceed u64/i64).
    pub value: String,
    /// Gas limit set on the transaction.
    pub gas: u64,
    /// Gas actually used, from the receipt.
    pub gas_used: u64,
    /// Effective gas price paid, from the receipt.
    pub effective_gas_price: u64,
    /// Denormalised from the parent block at write time (spec.md §4.3).
    pub base_fee_per_gas: Option<u64>,
    /// Whether the transaction succeeded (receipt status == 1).
    pub tx_success: bool,
    /// Raw calldata, hex-encoded.
    pub input: String,
    /// Block timestamp, denormalised for time-bucketed queries.
    pub block_time: i64,
}

/// One row of `raw_traces` — one node of a transaction's call tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Row)]
pub struct RawTrace {
    /// Chain this trace belongs to.
    pub chain_id: u32,
    /// Block height containing the transaction.
    pub block_number: u64,
    /// Hash of the transaction this trace belongs to.
    pub tx_hash: String,
    /// Path from the root call to this node, e.g. `[0, 2, 1]`.
    pub trace_address: Vec<u32>,
    /// Call kind: `call`, `delegatecall`, `staticcall`, `create`, `create2`.
    pub call_type: String,
    /// Caller address.
    pub from: String,
    /// Callee address, `None` for pure value transfers with no code.
    pub to: Option<String>,
    /// Value transferred in this call, as a decimal string.
    pub value: String,
    /// Gas provided to this call.
    pub gas: u64,
    /// Gas used by this call.
    pub gas_used: u64,
    /// Call input data, hex-encoded.
    pub input: String,
    /// Call output data, hex-encoded.
    pub output: String,
    /// Error string if the call reverted, `None` otherwise.
    pub error: Option<String>,
    /// Denormalised from the owning transaction (spec.md §4.3).
    pub tx_success: bool,
    /// Denormalised from the owning transaction.
    pub tx_from: String,
    /// Denormalised from the owning transaction.
    pub tx_to: Option<String>,
}

/// One row of `raw_logs` — one emitted event log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Row)]
pub struct RawLog {
    /// Chain this log belongs to.
    pub chain_id: u32,
    /// Block height containing the transaction.
    pub block_number: u64,
    /// Hash of the transaction that emitted this log.
    pub tx_hash: String,
    /// Position of the log within the block.
    pub log_index: u32,
    /// Contract address that emitted the log.
    pub address: String,
    /// First indexed topic (event signature), fixed-width hex.
    pub topic0: Option<String>,
    /// Second indexed topic, fixed-width hex.
    pub topic1: Option<String>,
    /// Third indexed topic, fixed-width hex.
    pub topic2: Option<String>,
    /// Fourth indexed topic, fixed-width hex.
    pub topic3: Option<String>,
    /// Non-indexed event data, hex-encoded.
    pub data: String,
    /// Denormalised from the owning transaction (spec.md §4.3).
    pub tx_success: bool,
    /// Denormalised from the owning transaction.
    pub tx_from: String,
    /// Denormalised from the owning transaction.
    pub tx_to: Option<String>,
}

// ═══════════════════════════════════════════════════════════════════════════════
// RAW P-CHAIN RECORDS
// ═══════════════════════════════════════════════════════════════════════════════

/// One row of `platform_txs` — an Avalanche-style platform-chain transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Row)]
pub struct PlatformTransaction {
    /// Chain this transaction belongs to (`0` for the primary network).
    pub chain_id: u32,
    /// Block height containing this transaction.
    pub block_number: u64,
    /// Transaction hash/ID.
    pub tx_id: String,
    /// Platform transaction type, e.g. `AddValidatorTx`, `CreateSubnetTx`.
    pub tx_type: String,
    /// Millisecond-UTC transaction timestamp.
    pub block_time: i64,
    /// Subnet this transaction targets, if applicable.
    pub subnet_id: Option<String>,
    /// Validator node ID this transaction targets, if applicable.
    pub node_id: Option<String>,
    /// Raw decoded transaction body, as JSON text, for SQL-side inspection.
    pub payload: String,
}

// ═══════════════════════════════════════════════════════════════════════════════
// WATERMARKS
// ═══════════════════════════════════════════════════════════════════════════════

/// One row of `sync_watermark`: highest fully-persisted block per chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Row)]
pub struct SyncWatermarkRow {
    /// Chain this watermark tracks.
    pub chain_id: u32,
    /// Highest block for which every raw table has been durably appended.
    pub block_number: u64,
}

/// One row of `chain_status`: the observational "where is this chain right
/// now" snapshot written after every sync iteration (spec.md §4.4).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Row)]
pub struct ChainStatusRow {
    /// Chain this status describes.
    pub chain_id: u32,
    /// Human-readable chain name, from configuration.
    pub name: String,
    /// Latest height observed from the RPC endpoint at the time of writing.
    pub latest_height: u64,
    /// Highest height actually persisted (the watermark) at the time of writing.
    pub synced_height: u64,
    /// Wall-clock time this status row was written.
    #[serde(with = "clickhouse::serde::chrono::datetime")]
    pub updated_at: DateTime<Utc>,
}

/// One row of `indexer_watermarks`.
///
/// For granular metrics only `last_period` is meaningful; for block-range
/// incrementals only `last_block_num` is. Keyed by name rather than a
/// foreign key into a catalog table, per spec.md §9's "cyclic ownership"
/// design note — the indexer's identity is its SQL file path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Row)]
pub struct IndexerWatermarkRow {
    /// Chain this watermark tracks.
    pub chain_id: u32,
    /// Indexer name, derived from its SQL file path.
    pub indexer_name: String,
    /// Granularity string (`hour`/`day`/`week`/`month`) for granular
    /// metrics, or an empty string for block-range incrementals.
    pub granularity: String,
    /// Last closed period emitted, for granular metrics. Unix epoch for
    /// incrementals (unused).
    #[serde(with = "clickhouse::serde::chrono::datetime")]
    pub last_period: DateTime<Utc>,
    /// Last block processed, for block-range incrementals. `0` for granular
    /// metrics (unused).
    pub last_block_num: u64,
}

// ═══════════════════════════════════════════════════════════════════════════════
// DERIVED ROWS
// ═══════════════════════════════════════════════════════════════════════════════

/// One row of `metrics`: a single time-bucketed aggregate value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Row)]
pub struct MetricRow {
    /// Chain this metric was computed for.
    pub chain_id: u32,
    /// Metric name, from the indexer file's stem.
    pub metric_name: String,
    /// Bucket size this row was computed at.
    pub granularity: String,
    /// Start of the bucketed period this row covers.
    #[serde(with = "clickhouse::serde::chrono::datetime")]
    pub period: DateTime<Utc>,
    /// The aggregated value.
    pub value: u64,
    /// Wall-clock time this row was computed.
    #[serde(with = "clickhouse::serde::chrono::datetime")]
    pub computed_at: DateTime<Utc>,
}

// ═══════════════════════════════════════════════════════════════════════════════
// P-CHAIN DERIVATION TABLES (spec.md §4.6, §6)
// ═══════════════════════════════════════════════════════════════════════════════

/// One row of `subnets`: a discovered subnet/L1.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Row)]
pub struct SubnetRow {
    /// Subnet identifier.
    pub subnet_id: String,
    /// `true` once the subnet has converted to an L1 (sovereign validator set).
    pub is_l1: bool,
    /// Block the subnet was created or discovered at.
    pub created_at_block: u64,
    /// Millisecond-UTC creation time.
    pub created_at: i64,
}

/// One row of `subnet_chains`: a blockchain created under a subnet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Row)]
pub struct SubnetChainRow {
    /// Owning subnet.
    pub subnet_id: String,
    /// Chain identifier assigned to this blockchain.
    pub chain_id: String,
    /// Human-readable chain name from the creating transaction.
    pub chain_name: String,
    /// Block the chain was created at.
    pub created_at_block: u64,
}

/// One row of `l1_validator_state`: the current snapshot for one validator,
/// replace-by-key on `(subnet_id, node_id)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Row)]
pub struct L1ValidatorStateRow {
    /// Subnet/L1 this validator is registered on.
    pub subnet_id: String,
    /// Validator node identifier.
    pub node_id: String,
    /// Opaque validation-period identifier for L1 validators.
    pub validation_id: Option<String>,
    /// Current validator weight.
    pub weight: u64,
    /// Whether the validator is currently active.
    pub active: bool,
    /// Wall-clock time this snapshot was taken.
    #[serde(with = "clickhouse::serde::chrono::datetime")]
    pub updated_at: DateTime<Utc>,
}

/// One row of `l1_validator_history`: an append-only log of registration and
/// deactivation events for one validator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Row)]
pub struct L1ValidatorHistoryRow {
    /// Subnet/L1 this validator is registered on.
    pub subnet_id: String,
    /// Validator node identifier.
    pub node_id: String,
    /// Event kind: `registered`, `deactivated`.
    pub event: String,
    /// Block the event was observed at.
    pub block_number: u64,
    /// Millisecond-UTC event time.
    pub event_time: i64,
}

/// One row of `l1_validator_balance_txs`: a balance-affecting platform
/// transaction projected into a per-validator ledger (spec.md §4.6 step 5).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Row)]
pub struct L1ValidatorBalanceTxRow {
    /// Validator this entry affects.
    pub node_id: String,
    /// Source platform transaction id.
    pub tx_id: String,
    /// Transaction kind: `initial_deposit`, `top_up`, `refund`.
    pub kind: String,
    /// Signed amount in nano-units (negative for refunds/withdrawals).
    pub amount: i64,
    /// Block the transaction was observed at.
    pub block_number: u64,
    /// Millisecond-UTC transaction time.
    pub tx_time: i64,
}

/// One row of `l1_validator_refunds`: the refund computed when a validator
/// is disabled (spec.md §4.6's refund formula).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Row)]
pub struct L1ValidatorRefundRow {
    /// Validator the refund was computed for.
    pub node_id: String,
    /// Subnet/L1 the validator was registered on.
    pub subnet_id: String,
    /// Refund amount in nano-units, clamped at zero.
    pub amount: u64,
    /// Total deposits observed over the validator's active period.
    pub total_deposits: u64,
    /// Seconds the validator was active before being disabled.
    pub active_seconds: i64,
    /// Millisecond-UTC time the validator was disabled.
    pub disabled_at: i64,
}

/// One row of `l1_fee_stats`: aggregate fee statistics recomputed each
/// validator-sync iteration (spec.md §4.6 step 6).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Row)]
pub struct L1FeeStatsRow {
    /// Subnet/L1 these statistics cover.
    pub subnet_id: String,
    /// Total active validator-seconds accumulated to date.
    pub total_active_seconds: i64,
    /// Total fees collected in nano-units (`active_seconds * fee_rate`).
    pub total_fees: u64,
    /// Wall-clock time these stats were last recomputed.
    #[serde(with = "clickhouse::serde::chrono::datetime")]
    pub computed_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_block_round_trips_through_json() {
        let block = RawBlock {
            chain_id: 43114,
            block_number: 100,
            block_hash: "0xabc".into(),
            parent_hash: "0xdef".into(),
            block_time: 1_700_000_000_000,
            gas_used: 21_000,
            gas_limit: 8_000_000,
            base_fee_per_gas: Some(25),
            tx_count: 1,
            miner: "0x1".into(),
        };
        let json = serde_json::to_string(&block).unwrap();
        let back: RawBlock = serde_json::from_str(&json).unwrap();
        assert_eq!(block, back);
    }

    #[test]
    fn indexer_watermark_defaults_are_explicit() {
        let row = IndexerWatermarkRow {
            chain_id: 1,
            indexer_name: "tx_count".into(),
            granularity: "day".into(),
            last_period: Utc.timestamp_opt(0, 0).unwrap(),
            last_block_num: 0,
        };
        assert_eq!(row.granularity, "day");
    }
}
