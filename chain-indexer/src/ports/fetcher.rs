//! The [`Fetcher`] port: spec.md §4.2's concurrent, retrying, cache-backed
//! RPC client, abstracted behind a trait so the chain syncer and tests never
//! depend on the wire dialect directly.

use async_trait::async_trait;

use crate::error::Result;
use crate::types::entities::{PlatformTransaction, RawBlock, RawLog, RawTrace, RawTransaction};

/// One EVM block plus every raw record it produced, bundled so the raw sink
/// can append all four tables for that height in one logical step (spec.md
/// §4.3's "same logical step" requirement).
#[derive(Debug, Clone, PartialEq)]
pub struct EvmBlockData {
    /// The block header row.
    pub block: RawBlock,
    /// Transactions merged with their receipts.
    pub txs: Vec<RawTransaction>,
    /// Call-trace nodes across every transaction in the block.
    pub traces: Vec<RawTrace>,
    /// Event logs across every transaction in the block.
    pub logs: Vec<RawLog>,
}

impl EvmBlockData {
    /// The height this bundle covers.
    #[must_use]
    pub const fn block_number(&self) -> u64 {
        self.block.block_number
    }
}

/// One P-chain block's platform transactions.
#[derive(Debug, Clone, PartialEq)]
pub struct PChainBlockData {
    /// The height this bundle covers.
    pub block_number: u64,
    /// Platform transactions observed at this height.
    pub txs: Vec<PlatformTransaction>,
}

/// The dense, height-ordered sequence `FetchRange` returns, per spec.md
/// §4.2 ("no partial ranges are emitted").
#[derive(Debug, Clone, PartialEq)]
pub enum FetchedBlocks {
    /// EVM-dialect blocks.
    Evm(Vec<EvmBlockData>),
    /// P-chain platform transactions, grouped by block.
    PChain(Vec<PChainBlockData>),
}

impl FetchedBlocks {
    /// Number of blocks in this batch.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Evm(blocks) => blocks.len(),
            Self::PChain(blocks) => blocks.len(),
        }
    }

    /// Whether this batch is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The height sequence covered by this batch, in fetch order.
    #[must_use]
    pub fn heights(&self) -> Vec<u64> {
        match self {
            Self::Evm(blocks) => blocks.iter().map(EvmBlockData::block_number).collect(),
            Self::PChain(blocks) => blocks.iter().map(|b| b.block_number).collect(),
        }
    }

    /// Millisecond-UTC timestamp of the last block in this batch, if one can
    /// be determined — used to feed the indexer runner's `OnBlock` signal
    /// (spec.md §4.5).
    #[must_use]
    pub fn last_block_time(&self) -> Option<i64> {
        match self {
            Self::Evm(blocks) => blocks.last().map(|b| b.block.block_time),
            Self::PChain(blocks) => blocks.last().and_then(|b| b.txs.last()).map(|tx| tx.block_time),
        }
    }
}

/// Bounded-concurrency, retrying, batching client over JSON-RPC, transparently
/// backed by the on-disk block cache (spec.md §4.2).
///
/// Implementations must return a *dense*, strictly height-ordered sequence
/// from [`fetch_range`](Fetcher::fetch_range) or a fatal error — never a
/// partial range silently short of `to`.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// The highest block height currently visible at the RPC endpoint.
    ///
    /// # Errors
    ///
    /// Returns an [`InfraError`](crate::error::InfraError) after the
    /// implementation's own retry budget is exhausted.
    async fn get_latest(&self) -> Result<u64>;

    /// Fetch every block in the inclusive range `[from, to]`, dense and
    /// ordered by height.
    ///
    /// # Errors
    ///
    /// Returns [`DomainError::InvalidRange`](crate::error::DomainError::InvalidRange)
    /// if `to < from`. Returns
    /// [`FatalError::NonContiguousRange`](crate::error::FatalError::NonContiguousRange)
    /// if the underlying RPC produces a gap — this is a data-integrity
    /// violation per spec.md §7, not a retryable condition.
    async fn fetch_range(&self, from: u64, to: u64) -> Result<FetchedBlocks>;
}
