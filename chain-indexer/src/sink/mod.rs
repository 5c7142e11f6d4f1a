//! Raw sink: the only path that writes into `raw_blocks`/`raw_txs`/
//! `raw_traces`/`raw_logs`/`platform_txs` (spec.md §4.1's "exactly one
//! writer" rule, §4.3).
//!
//! Denormalisation (`base_fee_per_gas` from block onto its transactions,
//! `tx_success`/`tx_from`/`tx_to` from transaction onto its traces and logs)
//! already happened in the fetcher's decode step, since that's where the
//! owning records are naturally in hand together. This module's job is
//! purely about write shape: splitting a block batch into ≤5,000-row
//! sub-batches before handing it to the store, so one oversized `FetchRange`
//! response can never produce an oversized insert.

use std::sync::Arc;
use tracing::instrument;

use crate::error::Result;
use crate::ports::{EvmBlockData, FetchedBlocks, PChainBlockData, Store};

/// Sub-batches are capped at this many raw rows per store call (spec.md
/// §4.1/§4.3: "split into ≤5,000-record sub-batches").
pub const MAX_SUB_BATCH_ROWS: usize = 5_000;

/// Writes fetched blocks into the raw tables, chunked to respect
/// [`MAX_SUB_BATCH_ROWS`].
#[derive(Debug, Clone)]
pub struct RawSink<S> {
    store: Arc<S>,
}

impl<S: Store> RawSink<S> {
    /// Build a sink writing through `store`.
    pub const fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Append every block in `blocks` to the raw tables for `chain_id`,
    /// chunked so no single store call carries more than
    /// [`MAX_SUB_BATCH_ROWS`] raw rows.
    ///
    /// # Errors
    ///
    /// Returns a [`FatalError::StoreWriteRejected`](crate::error::FatalError::StoreWriteRejected)
    /// (via the store) if any sub-batch is rejected — the caller (the chain
    /// syncer) must not advance its watermark past this point.
    #[instrument(skip(self, blocks), fields(chain_id, block_count = blocks.len()))]
    pub async fn append(&self, chain_id: u32, blocks: &FetchedBlocks) -> Result<()> {
        match blocks {
            FetchedBlocks::Evm(blocks) => self.append_evm(chain_id, blocks).await,
            FetchedBlocks::PChain(blocks) => self.append_pchain(chain_id, blocks).await,
        }
    }

    async fn append_evm(&self, chain_id: u32, blocks: &[EvmBlockData]) -> Result<()> {
        for chunk in chunk_by_row_budget(blocks) {
            self.store.append_evm_blocks(chain_id, chunk).await?;
        }
        Ok(())
    }

    async fn append_pchain(&self, chain_id: u32, blocks: &[PChainBlockData]) -> Result<()> {
        for chunk in blocks.chunks(MAX_SUB_BATCH_ROWS.max(1)) {
            self.store.append_pchain_blocks(chain_id, chunk).await?;
        }
        Ok(())
    }
}

/// Row weight of one block: the header plus every transaction, trace, and
/// log it produced — the unit [`MAX_SUB_BATCH_ROWS`] actually bounds.
fn row_weight(block: &EvmBlockData) -> usize {
    1 + block.txs.len() + block.traces.len() + block.logs.len()
}

/// Greedily group `blocks` into the fewest contiguous chunks such that no
/// chunk's total row weight exceeds [`MAX_SUB_BATCH_ROWS`]. A single block
/// heavier than the budget still gets its own (oversized) chunk rather than
/// being split mid-block, since a block's raw rows must land in one append
/// call together.
fn chunk_by_row_budget(blocks: &[EvmBlockData]) -> Vec<&[EvmBlockData]> {
    let mut chunks = Vec::new();
    let mut start = 0;
    let mut running = 0usize;

    for (i, block) in blocks.iter().enumerate() {
        let weight = row_weight(block);
        if running > 0 && running + weight > MAX_SUB_BATCH_ROWS {
            chunks.push(&blocks[start..i]);
            start = i;
            running = 0;
        }
        running += weight;
    }
    if start < blocks.len() {
        chunks.push(&blocks[start..]);
    }
    chunks
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::entities::RawBlock;

    fn block(n: u64, tx_count: usize) -> EvmBlockData {
        EvmBlockData {
            block: RawBlock {
                chain_id: 1,
                block_number: n,
                block_hash: format!("0x{n:x}"),
                parent_hash: String::new(),
                block_time: 0,
                gas_used: 0,
                gas_limit: 0,
                base_fee_per_gas: None,
                tx_count: tx_count as u32,
                miner: String::new(),
            },
            txs: Vec::new(),
            traces: vec![],
            logs: (0..tx_count).map(|_| dummy_log(n)).collect(),
        }
    }

    fn dummy_log(n: u64) -> crate::types::entities::RawLog {
        crate::types::entities::RawLog {
            chain_id: 1,
            block_number: n,
            tx_hash: String::new(),
            log_index: 0,
            address: String::new(),
            topic0: None,
            topic1: None,
            topic2: None,
            topic3: None,
            data: String::new(),
            tx_success: true,
            tx_from: String::new(),
            tx_to: None,
        }
    }

    #[test]
    fn chunk_by_row_budget_respects_cap() {
        // Each block weighs 1 (header) + 2000 logs = 2001 rows.
        let blocks: Vec<EvmBlockData> = (0..5).map(|n| block(n, 2_000)).collect();
        let chunks = chunk_by_row_budget(&blocks);
        for chunk in &chunks {
            let total: usize = chunk.iter().map(row_weight).sum();
            assert!(total <= MAX_SUB_BATCH_ROWS || chunk.len() == 1);
        }
        let total_blocks: usize = chunks.iter().map(|c| c.len()).sum();
        assert_eq!(total_blocks, 5);
    }

    #[test]
    fn oversized_single_block_gets_its_own_chunk() {
        let blocks = vec![block(0, 10_000)];
        let chunks = chunk_by_row_budget(&blocks);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].len(), 1);
    }

    #[test]
    fn empty_input_yields_no_chunks() {
        let blocks: Vec<EvmBlockData> = Vec::new();
        assert!(chunk_by_row_budget(&blocks).is_empty());
    }
}
