//! Chain syncer: the per-chain state machine that advances the sync
//! watermark with exactly-once semantics (spec.md §4.4).
//!
//! One instance runs per configured chain, independent of every other
//! syncer; they share only the store connection pool (spec.md §5).

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

use crate::config::RetrySettings;
use crate::error::Result;
use crate::ports::{Fetcher, Store};
use crate::sink::RawSink;
use crate::types::entities::ChainStatusRow;

/// How long the loop sleeps when it's caught up to the RPC endpoint's
/// latest height (spec.md §4.4: "`W ≥ L`: sleep short interval; continue").
const CAUGHT_UP_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// `(block_number, block_time_ms)` of the most recently synced block,
/// broadcast to the indexer runner (spec.md §4.5: "pushed via
/// `OnBlock(block_num, block_time)`").
pub type OnBlockSender = watch::Sender<(u64, i64)>;

/// Per-chain sync loop.
#[derive(Debug)]
pub struct ChainSyncer<F, S> {
    chain_id: u32,
    name: String,
    start_block: u64,
    fetch_batch_size: u64,
    fetcher: Arc<F>,
    store: Arc<S>,
    sink: RawSink<S>,
    retry: RetrySettings,
    on_block: Option<OnBlockSender>,
}

impl<F: Fetcher, S: Store> ChainSyncer<F, S> {
    /// Build a syncer for one configured chain.
    pub fn new(
        chain_id: u32,
        name: String,
        start_block: u64,
        fetch_batch_size: u64,
        fetcher: Arc<F>,
        store: Arc<S>,
        retry: RetrySettings,
        on_block: Option<OnBlockSender>,
    ) -> Self {
        Self {
            chain_id,
            name,
            start_block,
            fetch_batch_size,
            fetcher,
            sink: RawSink::new(store.clone()),
            store,
            retry,
            on_block,
        }
    }

    /// Run the sync loop until `shutdown` is cancelled.
    ///
    /// # Errors
    ///
    /// Returns the triggering [`FatalError`](crate::error::FatalError)
    /// immediately (wrapped in [`crate::error::AppError`]) — per spec.md
    /// §4.4, data-integrity violations must not be silently retried.
    /// Infrastructure errors are logged and retried after
    /// `retry.retry_delay()`, never returned.
    #[instrument(skip(self, shutdown), fields(chain_id = self.chain_id, name = %self.name))]
    pub async fn run(&self, shutdown: &CancellationToken) -> Result<()> {
        let mut watermark = self.load_initial_watermark().await?;

        loop {
            if shutdown.is_cancelled() {
                info!(chain_id = self.chain_id, watermark, "chain syncer shutting down");
                return Ok(());
            }

            match self.sync_once(watermark).await {
                Ok(Some(new_watermark)) => watermark = new_watermark,
                Ok(None) => sleep(CAUGHT_UP_POLL_INTERVAL).await,
                Err(err) if err.is_fatal() => {
                    tracing::error!(chain_id = self.chain_id, %err, "fatal error in sync loop, aborting chain");
                    return Err(err);
                }
                Err(err) => {
                    warn!(chain_id = self.chain_id, %err, "transient error in sync loop, retrying");
                    sleep(self.retry.retry_delay()).await;
                }
            }
        }
    }

    async fn load_initial_watermark(&self) -> Result<u64> {
        let persisted = self.store.get_sync_watermark(self.chain_id).await?;
        let floor = self.start_block.saturating_sub(1);
        Ok(persisted.max(floor))
    }

    /// One iteration of the loop body. Returns `Ok(Some(to))` if progress
    /// was made, `Ok(None)` if the chain is already caught up to latest.
    async fn sync_once(&self, watermark: u64) -> Result<Option<u64>> {
        let latest = self.fetcher.get_latest().await?;
        if watermark >= latest {
            return Ok(None);
        }

        let to = latest.min(watermark + self.fetch_batch_size);
        let blocks = self.fetcher.fetch_range(watermark + 1, to).await?;

        self.sink.append(self.chain_id, &blocks).await?;

        self.store
            .update_chain_status(ChainStatusRow {
                chain_id: self.chain_id,
                name: self.name.clone(),
                latest_height: latest,
                synced_height: to,
                updated_at: chrono::Utc::now(),
            })
            .await?;

        self.store.set_sync_watermark(self.chain_id, to).await?;

        if let Some(tx) = &self.on_block {
            if let Some(block_time) = blocks.last_block_time() {
                let _ = tx.send((to, block_time));
            }
        }

        Ok(Some(to))
    }
}
