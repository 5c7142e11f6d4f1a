//! P-chain-specific RPC surface used only by the validator syncer (spec.md
//! §4.2's "P-chain variant" calls and §6's `platform.*` methods).
//!
//! Split out from [`Fetcher`](crate::ports::Fetcher) because it has no EVM
//! counterpart — only a P-chain fetcher implements it, and only the
//! validator syncer calls it.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;

/// One validator entry as returned by `platform.getCurrentValidators`.
#[derive(Debug, Clone, PartialEq)]
pub struct CurrentValidator {
    /// Validator node identifier.
    pub node_id: String,
    /// Current validator weight.
    pub weight: u64,
    /// Validation-period identifier, present for L1 validators.
    pub validation_id: Option<String>,
}

/// Snapshot of one L1 validator as returned by `platform.getL1Validator`.
#[derive(Debug, Clone, PartialEq)]
pub struct L1ValidatorSnapshot {
    /// Validation-period identifier queried.
    pub validation_id: String,
    /// Owning node identifier.
    pub node_id: String,
    /// Current weight, `0` once removed.
    pub weight: u64,
    /// Whether the validation period is still active.
    pub active: bool,
}

/// Cap applied to every `platform.getUTXOs` call, per spec.md §6.
pub const UTXO_PAGE_LIMIT: u32 = 1024;

/// P-chain RPC surface the validator syncer needs beyond the generic
/// [`Fetcher`](crate::ports::Fetcher) trait.
#[async_trait]
pub trait ValidatorRpc: Send + Sync {
    /// Snapshot every current validator of `subnet_id` (the primary network
    /// when `subnet_id` is the platform-chain's well-known default).
    ///
    /// # Errors
    ///
    /// Returns an [`InfraError`](crate::error::InfraError) after retry.
    async fn get_current_validators(&self, subnet_id: &str) -> Result<Vec<CurrentValidator>>;

    /// Snapshot one L1 validator's current state.
    ///
    /// # Errors
    ///
    /// Returns an [`InfraError`](crate::error::InfraError) after retry.
    async fn get_l1_validator(&self, validation_id: &str) -> Result<L1ValidatorSnapshot>;

    /// Fetch up to [`UTXO_PAGE_LIMIT`] UTXOs for `addresses`, continuing from
    /// `start_index` if this is a paginated follow-up call.
    ///
    /// # Errors
    ///
    /// Returns an [`InfraError`](crate::error::InfraError) after retry.
    async fn get_utxos(&self, addresses: &[String], start_index: Option<String>) -> Result<Value>;
}
