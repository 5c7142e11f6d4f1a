//! Validator Syncer: the P-chain validator/subnet discovery and fee/refund
//! projection loop (spec.md §4.6).
//!
//! One instance runs per P-chain chain entry whose configuration carries
//! `validator_sync` settings, independent of that chain's [`ChainSyncer`]
//! (crate::syncer::ChainSyncer) — it reads the platform chain directly over
//! RPC rather than through the raw tables the syncer already wrote, the
//! same "own scan, bounded by its own watermark" shape the chain syncer
//! uses for raw ingestion.
//!
//! Each tick performs, in order: (1) ensure the primary network's genesis
//! subnet row exists; (2) scan platform transactions since the last
//! processed block to discover subnets, chains, and validator
//! registrations; (3) snapshot current validators for every known subnet;
//! (4) mark validators absent from the snapshot as inactive, computing
//! their refund; (5) the balance-ledger projection that backs step 4's
//! refund math; (6) recompute aggregate fee statistics.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde_json::Value;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

use crate::error::Result;
use crate::ports::{Clock, CurrentValidator, Fetcher, Store, ValidatorRpc};
use crate::types::entities::{
    L1FeeStatsRow, L1ValidatorBalanceTxRow, L1ValidatorHistoryRow, L1ValidatorRefundRow,
    L1ValidatorStateRow, SubnetChainRow, SubnetRow,
};

/// Well-known subnet identifier for Avalanche's primary network, whose
/// genesis row the syncer ensures exists on its very first tick.
pub const PRIMARY_NETWORK_ID: &str =
    "11111111111111111111111111111111111111111111111111111111LpoYY";

/// Fixed refund fee rate, in nano-units per second of active validation
/// (spec.md §4.6: "a fixed 512 nano-units/second (approximation documented
/// as such)").
pub const FEE_RATE_NANO_PER_SEC: u64 = 512;

/// Periodic P-chain validator/subnet discovery and fee/refund projection.
#[derive(Debug)]
pub struct ValidatorSyncer<P, S, C> {
    chain_id: u32,
    rpc: Arc<P>,
    store: Arc<S>,
    clock: Arc<C>,
    interval: Duration,
}

impl<P, S, C> ValidatorSyncer<P, S, C>
where
    P: Fetcher + ValidatorRpc,
    S: Store,
    C: Clock,
{
    /// Build a syncer for one P-chain entry.
    pub fn new(chain_id: u32, rpc: Arc<P>, store: Arc<S>, clock: Arc<C>, interval: Duration) -> Self {
        Self { chain_id, rpc, store, clock, interval }
    }

    /// Run the periodic loop until `shutdown` is cancelled.
    ///
    /// # Errors
    ///
    /// Returns the triggering [`AppError`](crate::error::AppError) only for
    /// fatal conditions; infrastructure errors are logged and the loop
    /// continues on the next tick, matching the chain syncer's own
    /// transient-vs-fatal split.
    #[instrument(skip(self, shutdown), fields(chain_id = self.chain_id))]
    pub async fn run(&self, shutdown: &CancellationToken) -> Result<()> {
        loop {
            if shutdown.is_cancelled() {
                info!(chain_id = self.chain_id, "validator syncer shutting down");
                return Ok(());
            }

            match self.tick().await {
                Ok(()) => {}
                Err(err) if err.is_fatal() => {
                    tracing::error!(chain_id = self.chain_id, %err, "fatal error in validator syncer, aborting");
                    return Err(err);
                }
                Err(err) => warn!(chain_id = self.chain_id, %err, "transient error in validator syncer"),
            }

            sleep(self.interval).await;
        }
    }

    /// One full pass through steps 1-6. Exposed for tests; `run` just loops
    /// this on the configured interval.
    async fn tick(&self) -> Result<()> {
        self.ensure_genesis_subnet().await?;
        self.scan_platform_transactions().await?;

        let subnets = self.store.list_subnets().await?;
        for subnet in &subnets {
            self.sync_validators(&subnet.subnet_id).await?;
        }
        self.sync_validators(PRIMARY_NETWORK_ID).await?;

        self.recompute_fee_stats(PRIMARY_NETWORK_ID).await?;
        for subnet in &subnets {
            self.recompute_fee_stats(&subnet.subnet_id).await?;
        }
        Ok(())
    }

    /// Step 1: ensure the primary network's genesis subnet row exists.
    async fn ensure_genesis_subnet(&self) -> Result<()> {
        let subnets = self.store.list_subnets().await?;
        if subnets.iter().any(|s| s.subnet_id == PRIMARY_NETWORK_ID) {
            return Ok(());
        }
        self.store
            .upsert_subnet(SubnetRow {
                subnet_id: PRIMARY_NETWORK_ID.to_string(),
                is_l1: false,
                created_at_block: 0,
                created_at: self.clock.now().timestamp_millis(),
            })
            .await
    }

    /// Step 2: scan platform transactions since the last processed block to
    /// discover subnets, chains, and historical validator registrations.
    async fn scan_platform_transactions(&self) -> Result<()> {
        let from = self.store.highest_scanned_platform_block(self.chain_id).await? + 1;
        let latest = self.rpc.get_latest().await?;
        if from > latest {
            return Ok(());
        }

        let blocks = match self.rpc.fetch_range(from, latest).await? {
            crate::ports::FetchedBlocks::PChain(blocks) => blocks,
            crate::ports::FetchedBlocks::Evm(_) => return Ok(()),
        };

        for block in &blocks {
            for tx in &block.txs {
                self.project_platform_tx(tx, block.block_number).await?;
            }
        }

        self.store.set_highest_scanned_platform_block(self.chain_id, latest).await
    }

    async fn project_platform_tx(
        &self,
        tx: &crate::types::entities::PlatformTransaction,
        block_number: u64,
    ) -> Result<()> {
        match tx.tx_type.as_str() {
            "CreateSubnetTx" => {
                self.store
                    .upsert_subnet(SubnetRow {
                        subnet_id: tx.tx_id.clone(),
                        is_l1: false,
                        created_at_block: block_number,
                        created_at: tx.block_time,
                    })
                    .await?;
            }
            "CreateChainTx" => {
                if let Some(subnet_id) = &tx.subnet_id {
                    self.store
                        .upsert_subnet_chain(SubnetChainRow {
                            subnet_id: subnet_id.clone(),
                            chain_id: tx.tx_id.clone(),
                            chain_name: chain_name_from_payload(&tx.payload),
                            created_at_block: block_number,
                        })
                        .await?;
                }
            }
            "ConvertSubnetToL1Tx" => {
                if let Some(subnet_id) = &tx.subnet_id {
                    self.store
                        .upsert_subnet(SubnetRow {
                            subnet_id: subnet_id.clone(),
                            is_l1: true,
                            created_at_block: block_number,
                            created_at: tx.block_time,
                        })
                        .await?;
                }
            }
            "AddValidatorTx" | "AddPermissionlessValidatorTx" | "AddSubnetValidatorTx" => {
                if let Some(node_id) = &tx.node_id {
                    self.store
                        .append_validator_history(L1ValidatorHistoryRow {
                            subnet_id: tx.subnet_id.clone().unwrap_or_else(|| PRIMARY_NETWORK_ID.to_string()),
                            node_id: node_id.clone(),
                            event: "registered".to_string(),
                            block_number,
                            event_time: tx.block_time,
                        })
                        .await?;
                    self.store
                        .append_validator_balance_tx(L1ValidatorBalanceTxRow {
                            node_id: node_id.clone(),
                            tx_id: tx.tx_id.clone(),
                            kind: "initial_deposit".to_string(),
                            amount: stake_amount_from_payload(&tx.payload),
                            block_number,
                            tx_time: tx.block_time,
                        })
                        .await?;
                }
            }
            _ => {}
        }
        Ok(())
    }

    /// Steps 3 and 4: snapshot current validators via RPC, insert newly
    /// discovered ones, and mark any previously-active validator absent
    /// from the snapshot as inactive (projecting its refund, step 5).
    async fn sync_validators(&self, subnet_id: &str) -> Result<()> {
        let snapshot = self.rpc.get_current_validators(subnet_id).await?;
        let existing = self.store.list_active_validators(subnet_id).await?;
        let now = self.clock.now();

        for validator in &snapshot {
            if let Some(known) = existing.iter().find(|v| v.node_id == validator.node_id) {
                if known.weight != validator.weight {
                    self.store
                        .upsert_validator_state(L1ValidatorStateRow {
                            subnet_id: subnet_id.to_string(),
                            node_id: validator.node_id.clone(),
                            validation_id: validator.validation_id.clone(),
                            weight: validator.weight,
                            active: true,
                            // Preserved so `active_seconds` at disablement
                            // measures from true registration, not from
                            // this refresh.
                            updated_at: known.updated_at,
                        })
                        .await?;
                }
                continue;
            }
            self.insert_new_validator(subnet_id, validator, now).await?;
        }

        for known in &existing {
            if snapshot.iter().any(|v| v.node_id == known.node_id) {
                continue;
            }
            self.disable_validator(subnet_id, known, now).await?;
        }
        Ok(())
    }

    async fn insert_new_validator(
        &self,
        subnet_id: &str,
        validator: &CurrentValidator,
        now: DateTime<Utc>,
    ) -> Result<()> {
        self.store
            .upsert_validator_state(L1ValidatorStateRow {
                subnet_id: subnet_id.to_string(),
                node_id: validator.node_id.clone(),
                validation_id: validator.validation_id.clone(),
                weight: validator.weight,
                active: true,
                updated_at: now,
            })
            .await?;
        self.store
            .append_validator_history(L1ValidatorHistoryRow {
                subnet_id: subnet_id.to_string(),
                node_id: validator.node_id.clone(),
                event: "registered".to_string(),
                block_number: 0,
                event_time: now.timestamp_millis(),
            })
            .await
    }

    /// Steps 4/5: disable a validator no longer present in the snapshot and
    /// compute its refund: `total_deposits_in_period - active_seconds * fee_rate`,
    /// clamped at zero.
    async fn disable_validator(&self, subnet_id: &str, known: &L1ValidatorStateRow, now: DateTime<Utc>) -> Result<()> {
        let active_seconds = (now - known.updated_at).num_seconds().max(0);
        let total_deposits = self
            .store
            .sum_validator_deposits(&known.node_id, known.updated_at.timestamp_millis())
            .await?;
        let fee = active_seconds.unsigned_abs() * FEE_RATE_NANO_PER_SEC;
        let refund_amount = total_deposits.saturating_sub(fee);

        self.store
            .insert_validator_refund(L1ValidatorRefundRow {
                node_id: known.node_id.clone(),
                subnet_id: subnet_id.to_string(),
                amount: refund_amount,
                total_deposits,
                active_seconds,
                disabled_at: now.timestamp_millis(),
            })
            .await?;

        if refund_amount > 0 {
            self.store
                .append_validator_balance_tx(L1ValidatorBalanceTxRow {
                    node_id: known.node_id.clone(),
                    tx_id: format!("refund-{}-{}", known.node_id, now.timestamp_millis()),
                    kind: "refund".to_string(),
                    amount: -i64::try_from(refund_amount).unwrap_or(i64::MAX),
                    block_number: 0,
                    tx_time: now.timestamp_millis(),
                })
                .await?;
        }

        self.store
            .upsert_validator_state(L1ValidatorStateRow {
                subnet_id: subnet_id.to_string(),
                node_id: known.node_id.clone(),
                validation_id: known.validation_id.clone(),
                weight: 0,
                active: false,
                updated_at: now,
            })
            .await?;

        self.store
            .append_validator_history(L1ValidatorHistoryRow {
                subnet_id: subnet_id.to_string(),
                node_id: known.node_id.clone(),
                event: "deactivated".to_string(),
                block_number: 0,
                event_time: now.timestamp_millis(),
            })
            .await
    }

    /// Step 6: recompute aggregate fee statistics for one subnet from its
    /// currently-active validator set.
    async fn recompute_fee_stats(&self, subnet_id: &str) -> Result<()> {
        let active = self.store.list_active_validators(subnet_id).await?;
        let now = self.clock.now();
        let total_active_seconds: i64 = active
            .iter()
            .map(|v| (now - v.updated_at).num_seconds().max(0))
            .sum();
        let total_fees = total_active_seconds.unsigned_abs() * FEE_RATE_NANO_PER_SEC;

        self.store
            .upsert_fee_stats(L1FeeStatsRow {
                subnet_id: subnet_id.to_string(),
                total_active_seconds,
                total_fees,
                computed_at: now,
            })
            .await
    }
}

/// Best-effort extraction of a human-readable chain name from a raw
/// `CreateChainTx` JSON payload; `platform_txs.payload` carries the full
/// decoded transaction for exactly this kind of ad-hoc field pull.
fn chain_name_from_payload(payload: &str) -> String {
    serde_json::from_str::<Value>(payload)
        .ok()
        .and_then(|v| {
            v.get("unsignedTx")
                .and_then(|u| u.get("chainName"))
                .or_else(|| v.get("chainName"))
                .and_then(Value::as_str)
                .map(String::from)
        })
        .unwrap_or_default()
}

/// Best-effort extraction of the staked amount from an `AddValidatorTx`-family
/// payload; absent or unparsable amounts default to zero rather than failing
/// the whole scan.
fn stake_amount_from_payload(payload: &str) -> i64 {
    serde_json::from_str::<Value>(payload)
        .ok()
        .and_then(|v| {
            let unsigned = v.get("unsignedTx").unwrap_or(&v);
            unsigned
                .get("validator")
                .and_then(|val| val.get("weight"))
                .or_else(|| unsigned.get("stake"))
                .and_then(Value::as_str)
                .and_then(|s| s.parse::<i64>().ok())
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::{
        DuplicateKey, EvmBlockData, FakeClock, FetchedBlocks, L1ValidatorSnapshot, PChainBlockData,
        TableSize, UTXO_PAGE_LIMIT,
    };
    use crate::types::entities::{
        ChainStatusRow, IndexerWatermarkRow, MetricRow, PlatformTransaction, SubnetChainRow,
    };
    use crate::types::primitives::Granularity;
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Debug, Default)]
    struct FakeRpc {
        latest: u64,
        validators: Mutex<Vec<CurrentValidator>>,
        blocks: Mutex<Vec<PChainBlockData>>,
    }

    #[async_trait]
    impl Fetcher for FakeRpc {
        async fn get_latest(&self) -> Result<u64> {
            Ok(self.latest)
        }
        async fn fetch_range(&self, _from: u64, _to: u64) -> Result<FetchedBlocks> {
            Ok(FetchedBlocks::PChain(self.blocks.lock().expect("lock").clone()))
        }
    }

    #[async_trait]
    impl ValidatorRpc for FakeRpc {
        async fn get_current_validators(&self, _subnet_id: &str) -> Result<Vec<CurrentValidator>> {
            Ok(self.validators.lock().expect("lock").clone())
        }
        async fn get_l1_validator(&self, validation_id: &str) -> Result<L1ValidatorSnapshot> {
            Ok(L1ValidatorSnapshot {
                validation_id: validation_id.to_string(),
                node_id: String::new(),
                weight: 0,
                active: false,
            })
        }
        async fn get_utxos(&self, _addresses: &[String], _start_index: Option<String>) -> Result<Value> {
            let _ = UTXO_PAGE_LIMIT;
            Ok(Value::Null)
        }
    }

    #[derive(Debug, Default)]
    struct FakeStore {
        subnets: Mutex<Vec<SubnetRow>>,
        validators: Mutex<Vec<L1ValidatorStateRow>>,
        refunds: Mutex<Vec<L1ValidatorRefundRow>>,
        deposits: Mutex<Vec<L1ValidatorBalanceTxRow>>,
        fee_stats: Mutex<Vec<L1FeeStatsRow>>,
        highest_scanned: Mutex<u64>,
    }

    #[async_trait]
    impl Store for FakeStore {
        async fn get_sync_watermark(&self, _chain_id: u32) -> Result<u64> {
            Ok(0)
        }
        async fn set_sync_watermark(&self, _chain_id: u32, _block_number: u64) -> Result<()> {
            Ok(())
        }
        async fn append_evm_blocks(&self, _chain_id: u32, _blocks: &[EvmBlockData]) -> Result<()> {
            Ok(())
        }
        async fn append_pchain_blocks(&self, _chain_id: u32, _blocks: &[PChainBlockData]) -> Result<()> {
            Ok(())
        }
        async fn update_chain_status(&self, _row: ChainStatusRow) -> Result<()> {
            Ok(())
        }
        async fn get_indexer_watermark(&self, chain_id: u32, indexer_name: &str, granularity: &str) -> Result<IndexerWatermarkRow> {
            Ok(IndexerWatermarkRow {
                chain_id,
                indexer_name: indexer_name.to_string(),
                granularity: granularity.to_string(),
                last_period: DateTime::<Utc>::UNIX_EPOCH,
                last_block_num: 0,
            })
        }
        async fn set_indexer_watermark(&self, _row: IndexerWatermarkRow) -> Result<()> {
            Ok(())
        }
        async fn run_granular_metric(
            &self,
            _indexer_name: &str,
            _sql: &str,
            _chain_id: u32,
            _first_period: DateTime<Utc>,
            _last_period: DateTime<Utc>,
            _granularity: Granularity,
        ) -> Result<Vec<MetricRow>> {
            Ok(vec![])
        }
        async fn run_incremental(&self, _indexer_name: &str, _sql: &str, _chain_id: u32, _from: u64, _to: u64) -> Result<()> {
            Ok(())
        }
        async fn list_subnets(&self) -> Result<Vec<SubnetRow>> {
            Ok(self.subnets.lock().expect("lock").clone())
        }
        async fn upsert_subnet(&self, row: SubnetRow) -> Result<()> {
            let mut subnets = self.subnets.lock().expect("lock");
            subnets.retain(|s| s.subnet_id != row.subnet_id);
            subnets.push(row);
            Ok(())
        }
        async fn upsert_subnet_chain(&self, _row: SubnetChainRow) -> Result<()> {
            Ok(())
        }
        async fn list_active_validators(&self, subnet_id: &str) -> Result<Vec<L1ValidatorStateRow>> {
            Ok(self
                .validators
                .lock()
                .expect("lock")
                .iter()
                .filter(|v| v.subnet_id == subnet_id && v.active)
                .cloned()
                .collect())
        }
        async fn upsert_validator_state(&self, row: L1ValidatorStateRow) -> Result<()> {
            let mut validators = self.validators.lock().expect("lock");
            validators.retain(|v| !(v.subnet_id == row.subnet_id && v.node_id == row.node_id));
            validators.push(row);
            Ok(())
        }
        async fn append_validator_history(&self, _row: L1ValidatorHistoryRow) -> Result<()> {
            Ok(())
        }
        async fn append_validator_balance_tx(&self, row: L1ValidatorBalanceTxRow) -> Result<()> {
            self.deposits.lock().expect("lock").push(row);
            Ok(())
        }
        async fn sum_validator_deposits(&self, node_id: &str, since_ms: i64) -> Result<u64> {
            Ok(self
                .deposits
                .lock()
                .expect("lock")
                .iter()
                .filter(|d| d.node_id == node_id && d.tx_time >= since_ms && d.amount > 0)
                .map(|d| d.amount.unsigned_abs())
                .sum())
        }
        async fn insert_validator_refund(&self, row: L1ValidatorRefundRow) -> Result<()> {
            self.refunds.lock().expect("lock").push(row);
            Ok(())
        }
        async fn upsert_fee_stats(&self, row: L1FeeStatsRow) -> Result<()> {
            self.fee_stats.lock().expect("lock").push(row);
            Ok(())
        }
        async fn highest_scanned_platform_block(&self, _chain_id: u32) -> Result<u64> {
            Ok(*self.highest_scanned.lock().expect("lock"))
        }
        async fn set_highest_scanned_platform_block(&self, _chain_id: u32, block_number: u64) -> Result<()> {
            *self.highest_scanned.lock().expect("lock") = block_number;
            Ok(())
        }
        async fn table_sizes(&self) -> Result<Vec<TableSize>> {
            Ok(vec![])
        }
        async fn find_duplicates(&self) -> Result<Vec<DuplicateKey>> {
            Ok(vec![])
        }
        async fn wipe_chain(&self, _chain_id: u32) -> Result<()> {
            Ok(())
        }
        async fn wipe_pchain(&self) -> Result<()> {
            Ok(())
        }
        async fn wipe_all(&self) -> Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn ensure_genesis_subnet_is_idempotent() {
        let store = Arc::new(FakeStore::default());
        let rpc = Arc::new(FakeRpc::default());
        let clock = Arc::new(FakeClock::new(Utc::now()));
        let syncer = ValidatorSyncer::new(0, rpc, store.clone(), clock, Duration::from_secs(300));

        syncer.ensure_genesis_subnet().await.expect("first call");
        syncer.ensure_genesis_subnet().await.expect("second call");

        let subnets = store.list_subnets().await.expect("list");
        assert_eq!(subnets.iter().filter(|s| s.subnet_id == PRIMARY_NETWORK_ID).count(), 1);
    }

    #[tokio::test]
    async fn new_validator_is_inserted_as_active() {
        let store = Arc::new(FakeStore::default());
        let rpc = Arc::new(FakeRpc {
            latest: 0,
            validators: Mutex::new(vec![CurrentValidator {
                node_id: "NodeID-1".into(),
                weight: 100,
                validation_id: None,
            }]),
            blocks: Mutex::new(vec![]),
        });
        let clock = Arc::new(FakeClock::new(Utc::now()));
        let syncer = ValidatorSyncer::new(0, rpc, store.clone(), clock, Duration::from_secs(300));

        syncer.sync_validators(PRIMARY_NETWORK_ID).await.expect("sync");

        let active = store.list_active_validators(PRIMARY_NETWORK_ID).await.expect("list");
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].node_id, "NodeID-1");
        assert!(active[0].active);
    }

    #[tokio::test]
    async fn disabled_validator_produces_clamped_refund() {
        let store = Arc::new(FakeStore::default());
        let start = Utc::now();
        let clock = Arc::new(FakeClock::new(start));
        store
            .upsert_validator_state(L1ValidatorStateRow {
                subnet_id: PRIMARY_NETWORK_ID.to_string(),
                node_id: "NodeID-1".to_string(),
                validation_id: None,
                weight: 100,
                active: true,
                updated_at: start,
            })
            .await
            .expect("seed validator");
        store
            .append_validator_balance_tx(L1ValidatorBalanceTxRow {
                node_id: "NodeID-1".to_string(),
                tx_id: "tx1".to_string(),
                kind: "initial_deposit".to_string(),
                amount: 100,
                block_number: 1,
                tx_time: start.timestamp_millis(),
            })
            .await
            .expect("seed deposit");

        let rpc = Arc::new(FakeRpc::default()); // empty snapshot: validator now absent
        let syncer = ValidatorSyncer::new(0, rpc, store.clone(), clock.clone(), Duration::from_secs(300));

        clock.advance(chrono::Duration::seconds(1));
        syncer.sync_validators(PRIMARY_NETWORK_ID).await.expect("sync");

        let refunds = store.refunds.lock().expect("lock");
        assert_eq!(refunds.len(), 1);
        // total_deposits=100, active_seconds=1, fee=512 -> clamped to 0.
        assert_eq!(refunds[0].amount, 0);
        assert_eq!(refunds[0].total_deposits, 100);
    }

    #[tokio::test]
    async fn platform_tx_scan_discovers_subnet_from_create_subnet_tx() {
        let store = Arc::new(FakeStore::default());
        let clock = Arc::new(FakeClock::new(Utc::now()));
        let rpc = Arc::new(FakeRpc {
            latest: 5,
            validators: Mutex::new(vec![]),
            blocks: Mutex::new(vec![PChainBlockData {
                block_number: 5,
                txs: vec![PlatformTransaction {
                    chain_id: 0,
                    block_number: 5,
                    tx_id: "subnet-xyz".to_string(),
                    tx_type: "CreateSubnetTx".to_string(),
                    block_time: 1_700_000_000_000,
                    subnet_id: None,
                    node_id: None,
                    payload: "{}".to_string(),
                }],
            }]),
        });
        let syncer = ValidatorSyncer::new(0, rpc, store.clone(), clock, Duration::from_secs(300));

        syncer.scan_platform_transactions().await.expect("scan");

        let subnets = store.list_subnets().await.expect("list");
        assert!(subnets.iter().any(|s| s.subnet_id == "subnet-xyz"));
        assert_eq!(store.highest_scanned_platform_block(0).await.expect("watermark"), 5);
    }

    #[tokio::test]
    async fn fee_stats_recompute_sums_active_seconds() {
        let store = Arc::new(FakeStore::default());
        let start = Utc::now();
        let clock = Arc::new(FakeClock::new(start));
        store
            .upsert_validator_state(L1ValidatorStateRow {
                subnet_id: PRIMARY_NETWORK_ID.to_string(),
                node_id: "NodeID-1".to_string(),
                validation_id: None,
                weight: 100,
                active: true,
                updated_at: start,
            })
            .await
            .expect("seed");
        let rpc = Arc::new(FakeRpc::default());
        let syncer = ValidatorSyncer::new(0, rpc, store.clone(), clock.clone(), Duration::from_secs(300));

        clock.advance(chrono::Duration::seconds(10));
        syncer.recompute_fee_stats(PRIMARY_NETWORK_ID).await.expect("recompute");

        let stats = store.fee_stats.lock().expect("lock");
        assert_eq!(stats.len(), 1);
        assert_eq!(stats[0].total_active_seconds, 10);
        assert_eq!(stats[0].total_fees, 10 * FEE_RATE_NANO_PER_SEC);
    }
}
