//! Indexer runner: the per-chain scheduler for derived computations
//! (spec.md §4.5).
//!
//! Discovers SQL-defined indexers from the filesystem at startup, holds
//! every watermark in memory (write-through to the store's replace-by-key
//! watermark table), and steps each population on every poll tick using the
//! latest block pushed by the [`ChainSyncer`](crate::syncer::ChainSyncer)'s
//! `OnBlock` signal.

mod discovery;
mod template;

pub use discovery::{discover, DiscoveredIndexers, GranularMetricDef, IncrementalDef};

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument};

use crate::config::IndexerSettings;
use crate::error::Result;
use crate::ports::Store;
use crate::types::entities::IndexerWatermarkRow;
use crate::types::primitives::{Granularity, Vm};

#[derive(Debug, Clone, Copy)]
struct GranularRuntime {
    last_period: DateTime<Utc>,
}

impl Default for GranularRuntime {
    fn default() -> Self {
        // An absent watermark starts at the epoch, so the first run emits
        // every historical closed period in one shot (spec.md §9's
        // documented one-shot behaviour for the initial run).
        Self { last_period: DateTime::<Utc>::UNIX_EPOCH }
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct IncrementalRuntime {
    last_block_num: u64,
    last_run: Option<Instant>,
    last_persist: Option<Instant>,
}

fn granular_key(name: &str, granularity: Granularity) -> String {
    format!("{name}:{}", granularity.as_str())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum IncrementalKind {
    Batched,
    Immediate,
}

/// Per-chain indexer scheduler.
#[derive(Debug)]
pub struct IndexerRunner<S> {
    chain_id: u32,
    store: Arc<S>,
    settings: IndexerSettings,
    granular: Vec<GranularMetricDef>,
    batched: Vec<IncrementalDef>,
    immediate: Vec<IncrementalDef>,
    granular_state: HashMap<String, GranularRuntime>,
    batched_state: HashMap<String, IncrementalRuntime>,
    immediate_state: HashMap<String, IncrementalRuntime>,
    on_block: watch::Receiver<(u64, i64)>,
}

impl<S: Store> IndexerRunner<S> {
    /// Discover indexers for `vm` under `sql_root` and seed in-memory
    /// watermarks from the store.
    ///
    /// # Errors
    ///
    /// Returns [`DomainError::UnrecognisedIndexerLayout`](crate::error::DomainError::UnrecognisedIndexerLayout)
    /// if the filesystem layout is malformed, or any store error while
    /// loading watermarks.
    pub async fn load(
        chain_id: u32,
        vm: Vm,
        sql_root: &std::path::Path,
        settings: IndexerSettings,
        store: Arc<S>,
        on_block: watch::Receiver<(u64, i64)>,
    ) -> Result<Self> {
        let discovered = discover(sql_root, vm)?;

        let mut granular_state = HashMap::new();
        for def in &discovered.granular_metrics {
            for granularity in Granularity::ALL {
                let row = store.get_indexer_watermark(chain_id, &def.name, granularity.as_str()).await?;
                granular_state.insert(granular_key(&def.name, granularity), GranularRuntime { last_period: row.last_period });
            }
        }

        let mut batched_state = HashMap::new();
        for def in &discovered.batched_incrementals {
            let row = store.get_indexer_watermark(chain_id, &def.name, "").await?;
            batched_state.insert(def.name.clone(), IncrementalRuntime { last_block_num: row.last_block_num, ..Default::default() });
        }

        let mut immediate_state = HashMap::new();
        for def in &discovered.immediate_incrementals {
            let row = store.get_indexer_watermark(chain_id, &def.name, "").await?;
            immediate_state.insert(def.name.clone(), IncrementalRuntime { last_block_num: row.last_block_num, ..Default::default() });
        }

        Ok(Self {
            chain_id,
            store,
            settings,
            granular: discovered.granular_metrics,
            batched: discovered.batched_incrementals,
            immediate: discovered.immediate_incrementals,
            granular_state,
            batched_state,
            immediate_state,
            on_block,
        })
    }

    /// Run the scheduling loop until `shutdown` is cancelled.
    #[instrument(skip(self, shutdown), fields(chain_id = self.chain_id))]
    pub async fn run(&mut self, shutdown: &CancellationToken) -> Result<()> {
        let mut ticker = tokio::time::interval(self.settings.poll_interval());
        loop {
            if shutdown.is_cancelled() {
                info!(chain_id = self.chain_id, "indexer runner shutting down");
                return Ok(());
            }
            ticker.tick().await;

            let (latest_block, latest_time_ms) = *self.on_block.borrow();
            if latest_block == 0 {
                // Chain syncer hasn't ingested anything yet for this chain.
                continue;
            }

            self.step_granular_all(latest_time_ms).await?;
            self.step_incrementals(IncrementalKind::Batched, latest_block).await?;
            self.step_incrementals(IncrementalKind::Immediate, latest_block).await?;
        }
    }

    async fn step_granular_all(&mut self, block_time_ms: i64) -> Result<()> {
        let now = DateTime::from_timestamp_millis(block_time_ms).unwrap_or_else(Utc::now);
        let defs = self.granular.clone();
        for def in &defs {
            for granularity in Granularity::ALL {
                self.step_one_granular(def, granularity, now).await?;
            }
        }
        Ok(())
    }

    async fn step_one_granular(&mut self, def: &GranularMetricDef, granularity: Granularity, now: DateTime<Utc>) -> Result<()> {
        let key = granular_key(&def.name, granularity);
        let last_period = self.granular_state.get(&key).copied().unwrap_or_default().last_period;

        let periods = granularity.period_list(last_period, now);
        let (Some(&first), Some(&last_closed)) = (periods.first(), periods.last()) else {
            return Ok(());
        };
        let last = granularity.next_period(last_closed);

        let sql = template::substitute_granular(&def.sql_template, self.chain_id, granularity);
        let rows = self
            .store
            .run_granular_metric(&def.name, &sql, self.chain_id, first, last, granularity)
            .await?;

        self.store
            .set_indexer_watermark(IndexerWatermarkRow {
                chain_id: self.chain_id,
                indexer_name: def.name.clone(),
                granularity: granularity.as_str().to_string(),
                last_period: last_closed,
                last_block_num: 0,
            })
            .await?;

        self.granular_state.insert(key, GranularRuntime { last_period: last_closed });
        tracing::debug!(chain_id = self.chain_id, indexer = %def.name, granularity = granularity.as_str(), rows = rows.len(), "granular metric step");
        Ok(())
    }

    async fn step_incrementals(&mut self, kind: IncrementalKind, latest_block: u64) -> Result<()> {
        let (defs, min_interval) = match kind {
            IncrementalKind::Batched => (self.batched.clone(), self.settings.batched_throttle()),
            IncrementalKind::Immediate => (self.immediate.clone(), self.settings.immediate_min_interval()),
        };
        let batch_cap = self.settings.incremental_batch_size;
        for def in &defs {
            self.step_one_incremental(def, latest_block, batch_cap, min_interval, kind).await?;
        }
        Ok(())
    }

    async fn step_one_incremental(
        &mut self,
        def: &IncrementalDef,
        latest_block: u64,
        batch_cap: u64,
        min_interval: Duration,
        kind: IncrementalKind,
    ) -> Result<()> {
        let state_map = match kind {
            IncrementalKind::Batched => &self.batched_state,
            IncrementalKind::Immediate => &self.immediate_state,
        };
        let mut state = state_map.get(&def.name).copied().unwrap_or_default();

        // Boundary behaviour (spec.md §8): `latest == watermark` performs no work.
        if state.last_block_num >= latest_block {
            return Ok(());
        }
        if state.last_run.is_some_and(|last_run| last_run.elapsed() < min_interval) {
            return Ok(());
        }

        let from = state.last_block_num + 1;
        let to = latest_block.min(state.last_block_num + batch_cap.max(1));

        let sql = template::substitute_incremental(&def.sql_template, self.chain_id);
        self.store.run_incremental(&def.name, &sql, self.chain_id, from, to).await?;

        state.last_block_num = to;
        state.last_run = Some(Instant::now());

        let caught_up = to >= latest_block;
        let should_persist = caught_up || state.last_persist.is_none_or(|p| p.elapsed() >= Duration::from_secs(1));
        if should_persist {
            self.store
                .set_indexer_watermark(IndexerWatermarkRow {
                    chain_id: self.chain_id,
                    indexer_name: def.name.clone(),
                    granularity: String::new(),
                    last_period: DateTime::<Utc>::UNIX_EPOCH,
                    last_block_num: to,
                })
                .await?;
            state.last_persist = Some(Instant::now());
        }

        match kind {
            IncrementalKind::Batched => self.batched_state.insert(def.name.clone(), state),
            IncrementalKind::Immediate => self.immediate_state.insert(def.name.clone(), state),
        };
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::{DuplicateKey, EvmBlockData, FetchedBlocks, PChainBlockData, TableSize};
    use crate::types::entities::{
        ChainStatusRow, L1FeeStatsRow, L1ValidatorBalanceTxRow, L1ValidatorHistoryRow,
        L1ValidatorRefundRow, L1ValidatorStateRow, MetricRow, SubnetChainRow, SubnetRow,
    };
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Debug, Default)]
    struct FakeStore {
        granular_calls: Mutex<Vec<(String, DateTime<Utc>, DateTime<Utc>)>>,
        incremental_calls: Mutex<Vec<(String, u64, u64)>>,
        watermarks: Mutex<HashMap<(u32, String, String), IndexerWatermarkRow>>,
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
            let key = (chain_id, indexer_name.to_string(), granularity.to_string());
            let default_row = || IndexerWatermarkRow {
                chain_id,
                indexer_name: indexer_name.to_string(),
                granularity: granularity.to_string(),
                last_period: DateTime::<Utc>::UNIX_EPOCH,
                last_block_num: 0,
            };
            Ok(self
                .watermarks
                .lock()
                .map_or_else(|_| default_row(), |m| m.get(&key).cloned().unwrap_or_else(default_row)))
        }
        async fn set_indexer_watermark(&self, row: IndexerWatermarkRow) -> Result<()> {
            let key = (row.chain_id, row.indexer_name.clone(), row.granularity.clone());
            if let Ok(mut m) = self.watermarks.lock() {
                m.insert(key, row);
            }
            Ok(())
        }
        async fn run_granular_metric(
            &self,
            indexer_name: &str,
            _sql: &str,
            _chain_id: u32,
            first_period: DateTime<Utc>,
            last_period: DateTime<Utc>,
            _granularity: Granularity,
        ) -> Result<Vec<MetricRow>> {
            if let Ok(mut calls) = self.granular_calls.lock() {
                calls.push((indexer_name.to_string(), first_period, last_period));
            }
            Ok(vec![])
        }
        async fn run_incremental(&self, indexer_name: &str, _sql: &str, _chain_id: u32, from: u64, to: u64) -> Result<()> {
            if let Ok(mut calls) = self.incremental_calls.lock() {
                calls.push((indexer_name.to_string(), from, to));
            }
            Ok(())
        }
        async fn list_subnets(&self) -> Result<Vec<SubnetRow>> {
            Ok(vec![])
        }
        async fn upsert_subnet(&self, _row: SubnetRow) -> Result<()> {
            Ok(())
        }
        async fn upsert_subnet_chain(&self, _row: SubnetChainRow) -> Result<()> {
            Ok(())
        }
        async fn list_active_validators(&self, _subnet_id: &str) -> Result<Vec<L1ValidatorStateRow>> {
            Ok(vec![])
        }
        async fn upsert_validator_state(&self, _row: L1ValidatorStateRow) -> Result<()> {
            Ok(())
        }
        async fn append_validator_history(&self, _row: L1ValidatorHistoryRow) -> Result<()> {
            Ok(())
        }
        async fn append_validator_balance_tx(&self, _row: L1ValidatorBalanceTxRow) -> Result<()> {
            Ok(())
        }
        async fn sum_validator_deposits(&self, _node_id: &str, _since_ms: i64) -> Result<u64> {
            Ok(0)
        }
        async fn insert_validator_refund(&self, _row: L1ValidatorRefundRow) -> Result<()> {
            Ok(())
        }
        async fn upsert_fee_stats(&self, _row: L1FeeStatsRow) -> Result<()> {
            Ok(())
        }
        async fn highest_scanned_platform_block(&self, _chain_id: u32) -> Result<u64> {
            Ok(0)
        }
        async fn set_highest_scanned_platform_block(&self, _chain_id: u32, _block_number: u64) -> Result<()> {
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

    fn runner(
        store: Arc<FakeStore>,
        granular: Vec<GranularMetricDef>,
        batched: Vec<IncrementalDef>,
    ) -> (IndexerRunner<FakeStore>, watch::Sender<(u64, i64)>) {
        let (tx, rx) = watch::channel((0u64, 0i64));
        let runner = IndexerRunner {
            chain_id: 1,
            store,
            settings: IndexerSettings::default(),
            granular,
            batched,
            immediate: vec![],
            granular_state: HashMap::new(),
            batched_state: HashMap::new(),
            immediate_state: HashMap::new(),
            on_block: rx,
        };
        (runner, tx)
    }

    #[tokio::test]
    async fn granular_step_emits_only_closed_periods() {
        let store = Arc::new(FakeStore::default());
        let (mut runner, _tx) = runner(store.clone(), vec![GranularMetricDef { name: "tx_count".into(), sql_template: "SELECT 1".into() }], vec![]);

        // 2024-01-01T00:00:00Z through 2024-01-03T05:00:00Z at day granularity.
        let now = DateTime::from_timestamp_millis(1_704_257_200_000).unwrap_or_default();
        runner.step_granular_all(now.timestamp_millis()).await.expect("step succeeds");

        let calls = store.granular_calls.lock().expect("lock");
        assert!(calls.iter().any(|(name, _, _)| name == "tx_count"));
    }

    #[tokio::test]
    async fn incremental_step_skips_when_caught_up() {
        let store = Arc::new(FakeStore::default());
        let (mut runner, _tx) = runner(store.clone(), vec![], vec![IncrementalDef { name: "address_on_chain".into(), sql_template: "SELECT 1".into() }]);
        runner
            .batched_state
            .insert("address_on_chain".into(), IncrementalRuntime { last_block_num: 100, ..Default::default() });

        runner.step_incrementals(IncrementalKind::Batched, 100).await.expect("step succeeds");
        assert!(store.incremental_calls.lock().expect("lock").is_empty());
    }

    #[tokio::test]
    async fn incremental_step_processes_capped_window() {
        let store = Arc::new(FakeStore::default());
        let (mut runner, _tx) = runner(store.clone(), vec![], vec![IncrementalDef { name: "address_on_chain".into(), sql_template: "SELECT 1".into() }]);
        runner.settings.incremental_batch_size = 20_000;

        runner.step_incrementals(IncrementalKind::Batched, 25_000).await.expect("step succeeds");
        let calls = store.incremental_calls.lock().expect("lock");
        assert_eq!(calls.as_slice(), [("address_on_chain".to_string(), 1, 20_000)]);
    }
}
