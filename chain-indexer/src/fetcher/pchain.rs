//! P-chain [`Fetcher`](crate::ports::Fetcher)/[`ValidatorRpc`](crate::ports::ValidatorRpc)
//! implementation, speaking the Avalanche platform-chain `platform.*` RPC
//! dialect (spec.md §3/§4.2/§4.6).
//!
//! Platform transactions carry a much looser, self-describing shape than
//! EVM transactions — there is no single canonical field layout across
//! transaction types (`AddValidatorTx`, `CreateSubnetTx`, `TransferSubnetOwnershipTx`,
//! ...). Rather than model every variant, this fetcher keeps the full
//! decoded transaction as the `payload` JSON text (spec.md §3's `platform_txs`
//! design) and extracts only the handful of fields every consumer needs.

use std::sync::Arc;

use async_trait::async_trait;
use chain_cache::Cache;
use rpc_client::RpcClient;
use serde_json::Value;
use tracing::instrument;

use crate::error::{AppError, DomainError, FatalError, Result};
use crate::ports::{
    CurrentValidator, FetchedBlocks, Fetcher, L1ValidatorSnapshot, PChainBlockData, ValidatorRpc,
    UTXO_PAGE_LIMIT,
};
use crate::types::entities::PlatformTransaction;

use super::util::hex_to_u64;

/// P-chain fetcher, also implementing [`ValidatorRpc`] for the validator
/// syncer (spec.md §4.6) since both live behind the same RPC endpoint.
#[derive(Debug)]
pub struct PChainFetcher<C> {
    chain_id: u32,
    client: RpcClient,
    cache: Arc<C>,
}

impl<C: Cache> PChainFetcher<C> {
    /// Build a new P-chain fetcher for `chain_id`.
    pub const fn new(chain_id: u32, client: RpcClient, cache: Arc<C>) -> Self {
        Self { chain_id, client, cache }
    }

    fn parse_failure(&self, block_number: u64, reason: impl ToString) -> AppError {
        FatalError::PersistentParseFailure {
            chain_id: self.chain_id,
            block_number,
            reason: reason.to_string(),
        }
        .into()
    }

    async fn fetch_fresh(&self, height: u64) -> Result<Vec<u8>> {
        let response: Value = self
            .client
            .call(
                "platform.getBlockByHeight",
                serde_json::json!({ "height": height, "encoding": "json" }),
            )
            .await?;
        let bytes = serde_json::to_vec(&response).map_err(|e| self.parse_failure(height, e.to_string()))?;
        if let Err(err) = self.cache.put(self.chain_id, height, bytes.clone()).await {
            tracing::warn!(chain_id = self.chain_id, height, %err, "failed to write platform block to cache");
        }
        Ok(bytes)
    }

    fn decode(&self, height: u64, bytes: &[u8]) -> Result<PChainBlockData> {
        let value: Value = serde_json::from_slice(bytes).map_err(|e| self.parse_failure(height, e.to_string()))?;
        decode_platform_block(self.chain_id, height, &value).map_err(|reason| self.parse_failure(height, reason))
    }
}

#[async_trait]
impl<C: Cache + 'static> Fetcher for PChainFetcher<C> {
    #[instrument(skip(self), fields(chain_id = self.chain_id))]
    async fn get_latest(&self) -> Result<u64> {
        let response: Value = self
            .client
            .call("platform.getHeight", serde_json::json!({}))
            .await?;
        response
            .get("height")
            .and_then(Value::as_str)
            .and_then(|s| s.parse::<u64>().ok())
            .or_else(|| response.get("height").and_then(Value::as_u64))
            .ok_or_else(|| self.parse_failure(0, "platform.getHeight returned no usable height"))
    }

    #[instrument(skip(self), fields(chain_id = self.chain_id, from, to))]
    async fn fetch_range(&self, from: u64, to: u64) -> Result<FetchedBlocks> {
        if to < from {
            return Err(DomainError::InvalidRange { from, to }.into());
        }

        let mut blocks = Vec::with_capacity((to - from + 1) as usize);
        let mut expected = from;
        for height in from..=to {
            // A cached entry that fails to parse is a miss, not a fatal
            // error (spec.md §4.2): drop it and refetch fresh from the RPC,
            // where the fatal path stays in force.
            let cached = self.cache.get(self.chain_id, height).await;
            let block = match cached {
                Some(bytes) => match self.decode(height, &bytes) {
                    Ok(block) => block,
                    Err(_) => {
                        tracing::warn!(chain_id = self.chain_id, height, "corrupt cache entry, refetching");
                        let fresh = self.fetch_fresh(height).await?;
                        self.decode(height, &fresh)?
                    }
                },
                None => {
                    let fresh = self.fetch_fresh(height).await?;
                    self.decode(height, &fresh)?
                }
            };
            if block.block_number != expected {
                return Err(FatalError::NonContiguousRange {
                    chain_id: self.chain_id,
                    expected,
                    got: block.block_number,
                }
                .into());
            }
            expected += 1;
            blocks.push(block);
        }

        if from == self.cache.get_checkpoint(self.chain_id).await + 1 {
            if let Err(err) = self.cache.set_checkpoint(self.chain_id, to).await {
                tracing::warn!(chain_id = self.chain_id, %err, "failed to advance cache checkpoint");
            }
        }

        Ok(FetchedBlocks::PChain(blocks))
    }
}

#[async_trait]
impl<C: Cache + 'static> ValidatorRpc for PChainFetcher<C> {
    #[instrument(skip(self))]
    async fn get_current_validators(&self, subnet_id: &str) -> Result<Vec<CurrentValidator>> {
        let response: Value = self
            .client
            .call(
                "platform.getCurrentValidators",
                serde_json::json!({ "subnetID": subnet_id }),
            )
            .await?;
        let validators = response.get("validators").and_then(Value::as_array).cloned().unwrap_or_default();
        Ok(validators
            .iter()
            .map(|v| CurrentValidator {
                node_id: v.get("nodeID").and_then(Value::as_str).unwrap_or_default().to_string(),
                weight: v
                    .get("weight")
                    .and_then(Value::as_str)
                    .and_then(|s| s.parse::<u64>().ok())
                    .or_else(|| v.get("weight").and_then(Value::as_u64))
                    .unwrap_or_default(),
                validation_id: v.get("validationID").and_then(Value::as_str).map(String::from),
            })
            .collect())
    }

    #[instrument(skip(self))]
    async fn get_l1_validator(&self, validation_id: &str) -> Result<L1ValidatorSnapshot> {
        let response: Value = self
            .client
            .call(
                "platform.getL1Validator",
                serde_json::json!({ "validationID": validation_id }),
            )
            .await?;
        Ok(L1ValidatorSnapshot {
            validation_id: validation_id.to_string(),
            node_id: response.get("nodeID").and_then(Value::as_str).unwrap_or_default().to_string(),
            weight: response
                .get("weight")
                .and_then(Value::as_str)
                .and_then(|s| s.parse::<u64>().ok())
                .or_else(|| response.get("weight").and_then(Value::as_u64))
                .unwrap_or_default(),
            active: response.get("endTime").is_none_or(|v| v.as_str() == Some("0")),
        })
    }

    #[instrument(skip(self, addresses))]
    async fn get_utxos(&self, addresses: &[String], start_index: Option<String>) -> Result<Value> {
        let mut params = serde_json::json!({
            "addresses": addresses,
            "limit": UTXO_PAGE_LIMIT,
        });
        if let Some(start_index) = start_index {
            params["startIndex"] = serde_json::json!(start_index);
        }
        let response: Value = self.client.call("platform.getUTXOs", params).await?;
        Ok(response)
    }
}

/// Extract every platform transaction from one decoded block payload.
fn decode_platform_block(chain_id: u32, height: u64, value: &Value) -> std::result::Result<PChainBlockData, String> {
    let txs_json = value
        .get("block")
        .and_then(|b| b.get("txs"))
        .or_else(|| value.get("txs"))
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();

    let block_time = value
        .get("block")
        .and_then(|b| b.get("time"))
        .or_else(|| value.get("time"))
        .and_then(Value::as_str)
        .and_then(hex_to_u64)
        .map(|secs| (secs as i64).saturating_mul(1000))
        .unwrap_or_default();

    let txs = txs_json
        .iter()
        .map(|tx| decode_platform_tx(chain_id, height, block_time, tx))
        .collect();

    Ok(PChainBlockData { block_number: height, txs })
}

fn decode_platform_tx(chain_id: u32, height: u64, block_time: i64, tx: &Value) -> PlatformTransaction {
    let unsigned = tx.get("unsignedTx").unwrap_or(tx);
    PlatformTransaction {
        chain_id,
        block_number: height,
        tx_id: tx.get("id").and_then(Value::as_str).unwrap_or_default().to_string(),
        tx_type: unsigned.get("type").and_then(Value::as_str).unwrap_or("Unknown").to_string(),
        block_time,
        subnet_id: unsigned.get("subnetID").and_then(Value::as_str).map(String::from),
        node_id: unsigned
            .get("nodeID")
            .or_else(|| unsigned.get("validator").and_then(|v| v.get("nodeID")))
            .and_then(Value::as_str)
            .map(String::from),
        payload: tx.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_platform_block_extracts_validator_tx() {
        let payload = serde_json::json!({
            "block": {
                "time": "0x61000000",
                "txs": [
                    {
                        "id": "tx123",
                        "unsignedTx": {
                            "type": "AddPermissionlessValidatorTx",
                            "subnetID": "subnet-abc",
                            "validator": { "nodeID": "NodeID-xyz" }
                        }
                    }
                ]
            }
        });
        let decoded = decode_platform_block(0, 10, &payload).expect("decodes");
        assert_eq!(decoded.block_number, 10);
        assert_eq!(decoded.txs.len(), 1);
        assert_eq!(decoded.txs[0].tx_type, "AddPermissionlessValidatorTx");
        assert_eq!(decoded.txs[0].subnet_id.as_deref(), Some("subnet-abc"));
        assert_eq!(decoded.txs[0].node_id.as_deref(), Some("NodeID-xyz"));
    }

    #[test]
    fn decode_platform_tx_defaults_type_when_absent() {
        let tx = serde_json::json!({ "id": "tx1" });
        let decoded = decode_platform_tx(0, 1, 0, &tx);
        assert_eq!(decoded.tx_type, "Unknown");
    }

    // ── fetch_range: corrupt-cache-as-miss + checkpoint wiring ──────────

    use std::collections::BTreeMap;
    use std::sync::Mutex;

    use chain_cache::Result as CacheOpResult;
    use rpc_client::RpcClient;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

    #[derive(Debug, Default)]
    struct FakeCache {
        entries: Mutex<BTreeMap<(u32, u64), Vec<u8>>>,
        checkpoints: Mutex<BTreeMap<u32, u64>>,
    }

    #[async_trait::async_trait]
    impl Cache for FakeCache {
        async fn put(&self, chain_id: u32, height: u64, bytes: Vec<u8>) -> CacheOpResult<()> {
            self.entries.lock().unwrap().insert((chain_id, height), bytes);
            Ok(())
        }

        async fn get(&self, chain_id: u32, height: u64) -> Option<Vec<u8>> {
            self.entries.lock().unwrap().get(&(chain_id, height)).cloned()
        }

        async fn get_range(&self, chain_id: u32, from: u64, to: u64) -> BTreeMap<u64, Vec<u8>> {
            self.entries
                .lock()
                .unwrap()
                .iter()
                .filter(|((c, h), _)| *c == chain_id && *h >= from && *h <= to)
                .map(|((_, h), bytes)| (*h, bytes.clone()))
                .collect()
        }

        async fn get_checkpoint(&self, chain_id: u32) -> u64 {
            self.checkpoints.lock().unwrap().get(&chain_id).copied().unwrap_or(0)
        }

        async fn set_checkpoint(&self, chain_id: u32, height: u64) -> CacheOpResult<()> {
            let mut checkpoints = self.checkpoints.lock().unwrap();
            let current = checkpoints.get(&chain_id).copied().unwrap_or(0);
            if height >= current {
                checkpoints.insert(chain_id, height);
            }
            Ok(())
        }
    }

    struct GetBlockResponder;

    impl Respond for GetBlockResponder {
        fn respond(&self, request: &Request) -> ResponseTemplate {
            let call: Value = serde_json::from_slice(&request.body).expect("json-rpc request body");
            let id = call.get("id").cloned().unwrap_or(Value::Null);
            let height = call
                .get("params")
                .and_then(|p| p.get("height"))
                .and_then(Value::as_u64)
                .unwrap_or_default();
            let result = serde_json::json!({
                "block": {
                    "time": "0x61000000",
                    "txs": [{ "id": format!("tx-{height}"), "unsignedTx": { "type": "AddSubnetValidatorTx" } }]
                }
            });
            ResponseTemplate::new(200).set_body_json(serde_json::json!({ "jsonrpc": "2.0", "id": id, "result": result }))
        }
    }

    #[tokio::test]
    async fn corrupt_cache_entry_is_treated_as_miss_and_refetched() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/"))
            .respond_with(GetBlockResponder)
            .mount(&mock_server)
            .await;

        let client = RpcClient::new(mock_server.uri()).expect("client creation failed");
        let cache = Arc::new(FakeCache::default());
        cache.put(3, 1, b"not valid json".to_vec()).await.expect("seed corrupt entry");

        let fetcher = PChainFetcher::new(3, client, cache.clone());
        let result = fetcher.fetch_range(1, 1).await.expect("corrupt cache entry is recovered by refetch, not fatal");
        let FetchedBlocks::PChain(blocks) = result else {
            panic!("expected platform blocks")
        };
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].block_number, 1);

        let refreshed = cache.get(3, 1).await.expect("corrupt entry replaced on refetch");
        assert!(serde_json::from_slice::<Value>(&refreshed).is_ok());
    }

    #[tokio::test]
    async fn fetch_range_advances_checkpoint_only_for_contiguous_prefix() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/"))
            .respond_with(GetBlockResponder)
            .mount(&mock_server)
            .await;

        let client = RpcClient::new(mock_server.uri()).expect("client creation failed");
        let cache = Arc::new(FakeCache::default());
        let fetcher = PChainFetcher::new(3, client, cache.clone());

        fetcher.fetch_range(1, 3).await.expect("fetches range");
        assert_eq!(cache.get_checkpoint(3).await, 3);

        fetcher.fetch_range(10, 12).await.expect("fetches range");
        assert_eq!(cache.get_checkpoint(3).await, 3, "checkpoint must not jump over an uncached gap");
    }
}
