//! Concrete [`Fetcher`](crate::ports::Fetcher) adapters: bounded-concurrency,
//! retrying, cache-backed RPC fetch for both raw-data dialects (spec.md
//! §4.2).

mod evm;
mod pchain;
mod util;

pub use evm::EvmFetcher;
pub use pchain::PChainFetcher;
