//! Generic JSON-RPC-over-HTTP client with batching, bounded concurrency, and retry.
//!
//! This module provides [`RpcClient`], the low-level primitive every chain-specific
//! fetcher is built on. It knows nothing about blocks, logs, or any particular
//! chain's RPC dialect — it only knows how to get a batch of JSON-RPC sub-calls to
//! an HTTP endpoint and back, reliably.
//!
//! # Features
//!
//! - **Batching**: many sub-calls share one HTTP round trip, subject to a caller-chosen
//!   chunk size (distinct knobs exist for light `eth_*` calls vs. heavy `debug_*` calls).
//! - **Bounded concurrency**: a counting semaphore caps in-flight HTTP requests across
//!   every call issued by one client.
//! - **Retry with backoff**: transient failures are retried with exponential backoff
//!   capped at 10 seconds, up to `max_retries` attempts.
//!
//! # Example
//!
//! ```ignore
//! use rpc_client::{RpcClient, BatchCall};
//!
//! let client = RpcClient::new("https://rpc.example.com")?;
//! let calls = vec![BatchCall::new("eth_blockNumber", Vec::<()>::new())?];
//! let responses = client.call_batch(&calls).await?;
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::Semaphore;
use tracing::{debug, instrument, warn};

use crate::config::RpcClientConfig;
use crate::error::{Result, RpcError};
use crate::types::{BatchCall, JsonRpcRequest, JsonRpcResponse};

// ═══════════════════════════════════════════════════════════════════════════════
// RPC CLIENT
// ═══════════════════════════════════════════════════════════════════════════════

/// Generic, bounded-concurrency, retrying JSON-RPC-over-HTTP client.
///
/// # Thread Safety
///
/// This client is `Send + Sync` and is meant to be shared (typically behind an
/// `Arc`) across every task that needs to talk to the same endpoint; the
/// concurrency semaphore is only meaningful when the same instance is reused.
#[derive(Debug)]
pub struct RpcClient {
    /// HTTP client for JSON-RPC requests.
    client: reqwest::Client,

    /// RPC endpoint URL.
    rpc_url: String,

    /// Request ID counter for JSON-RPC correlation.
    request_id: AtomicU64,

    /// Client configuration.
    config: RpcClientConfig,

    /// Bounds the number of in-flight HTTP requests to `config.max_concurrency`.
    concurrency: Arc<Semaphore>,
}

impl RpcClient {
    /// Create a new RPC client with default configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created or the default
    /// configuration fails validation.
    pub fn new(rpc_url: impl Into<String>) -> Result<Self> {
        Self::with_config(rpc_url, RpcClientConfig::default())
    }

    /// Create a new client with custom configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created or if `config`
    /// fails validation.
    pub fn with_config(rpc_url: impl Into<String>, config: RpcClientConfig) -> Result<Self> {
        config.validate()?;

        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .build()
            .map_err(|e| RpcError::Connection(format!("failed to create HTTP client: {e}")))?;

        let concurrency = Arc::new(Semaphore::new(config.max_concurrency));

        Ok(Self {
            client,
            rpc_url: rpc_url.into(),
            request_id: AtomicU64::new(1),
            config,
            concurrency,
        })
    }

    /// Get the RPC URL this client is connected to.
    #[must_use]
    pub fn rpc_url(&self) -> &str {
        &self.rpc_url
    }

    /// Get the current configuration.
    #[must_use]
    pub const fn config(&self) -> &RpcClientConfig {
        &self.config
    }

    /// Get the next request ID for JSON-RPC correlation.
    fn next_request_id(&self) -> u64 {
        self.request_id.fetch_add(1, Ordering::Relaxed)
    }

    // ───────────────────────────────────────────────────────────────────────────
    // SINGLE CALL
    // ───────────────────────────────────────────────────────────────────────────

    /// Issue a single JSON-RPC call, retrying transient failures with backoff.
    ///
    /// Subject to the same concurrency semaphore as batched calls.
    ///
    /// # Errors
    ///
    /// Returns the last observed [`RpcError`] if all retry attempts fail, or
    /// [`RpcError::RetriesExhausted`] wrapping it once `max_retries` is reached.
    /// Non-retryable errors (e.g. [`RpcError::MethodNotSupported`]) return
    /// immediately without consuming a retry attempt.
    #[instrument(skip(self, params), fields(method))]
    pub async fn call<P, R>(&self, method: &str, params: P) -> Result<R>
    where
        P: serde::Serialize + Clone + Sync,
        R: DeserializeOwned,
    {
        self.with_retry(method, || self.call_once(method, params.clone()))
            .await
    }

    async fn call_once<P, R>(&self, method: &str, params: P) -> Result<R>
    where
        P: serde::Serialize + Sync,
        R: DeserializeOwned,
    {
        let _permit = self
            .concurrency
            .acquire()
            .await
            .map_err(|_| RpcError::Connection("concurrency semaphore closed".into()))?;

        let request_id = self.next_request_id();
        let request = JsonRpcRequest::new(method, params, request_id);
        let response: JsonRpcResponse<R> = self.send_request(&request).await?;

        if let Some(error) = response.error {
            return Err(error.into_error(method));
        }

        response
            .result
            .ok_or_else(|| RpcError::InvalidResponse(format!("missing result for {method}")))
    }

    // ───────────────────────────────────────────────────────────────────────────
    // BATCHING
    // ───────────────────────────────────────────────────────────────────────────

    /// Issue one HTTP request carrying every call in `calls` as a JSON-RPC batch.
    ///
    /// The server is expected to answer with exactly as many responses as calls,
    /// in the same order. A length mismatch is a data-integrity violation, not a
    /// transient failure — it is surfaced immediately via
    /// [`RpcError::BatchLengthMismatch`] and never retried.
    ///
    /// Per-call JSON-RPC errors are returned as `Err` entries in the output
    /// vector rather than failing the whole batch, since one sub-call failing
    /// (e.g. method not found) does not invalidate the others.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP request itself fails (after retries), or if
    /// the response shape does not match the request.
    #[instrument(skip(self, calls), fields(batch_len = calls.len()))]
    pub async fn call_batch(&self, calls: &[BatchCall]) -> Result<Vec<Result<Value>>> {
        if calls.is_empty() {
            return Ok(Vec::new());
        }

        self.with_retry("batch", || self.call_batch_once(calls))
            .await
    }

    async fn call_batch_once(&self, calls: &[BatchCall]) -> Result<Vec<Result<Value>>> {
        let _permit = self
            .concurrency
            .acquire()
            .await
            .map_err(|_| RpcError::Connection("concurrency semaphore closed".into()))?;

        let base_id = self.request_id.fetch_add(calls.len() as u64, Ordering::Relaxed);
        let body: Vec<JsonRpcRequest<'_, &Value>> = calls
            .iter()
            .enumerate()
            .map(|(i, call)| JsonRpcRequest::new(&call.method, &call.params, base_id + i as u64))
            .collect();

        let http_response = self.client.post(&self.rpc_url).json(&body).send().await?;
        let responses: Vec<JsonRpcResponse<Value>> = http_response.json().await?;

        if responses.len() != calls.len() {
            return Err(RpcError::BatchLengthMismatch {
                sent: calls.len(),
                received: responses.len(),
            });
        }

        Ok(responses
            .into_iter()
            .zip(calls)
            .map(|(resp, call)| match resp.error {
                Some(error) => Err(error.into_error(&call.method)),
                None => resp
                    .result
                    .ok_or_else(|| RpcError::InvalidResponse(format!("missing result for {}", call.method))),
            })
            .collect())
    }

    /// Split `calls` into chunks of `chunk_size` and issue each chunk as its own
    /// batched request, all gated by the shared concurrency semaphore.
    ///
    /// Chunks are issued concurrently (subject to `max_concurrency`) and the
    /// results are returned in the original call order.
    ///
    /// # Errors
    ///
    /// Returns the first chunk-level error encountered. Per-call errors inside a
    /// successful chunk are returned as `Err` entries in the output, not as a
    /// function-level error (see [`call_batch`](Self::call_batch)).
    #[instrument(skip(self, calls), fields(total_calls = calls.len(), chunk_size))]
    pub async fn call_batch_chunked(
        &self,
        calls: Vec<BatchCall>,
        chunk_size: usize,
    ) -> Result<Vec<Result<Value>>> {
        let chunk_size = chunk_size.max(1);
        let chunks: Vec<Vec<BatchCall>> = calls
            .chunks(chunk_size)
            .map(<[BatchCall]>::to_vec)
            .collect();

        debug!(chunks = chunks.len(), "dispatching chunked batch");

        let futures = chunks.iter().map(|chunk| self.call_batch(chunk));
        let chunk_results = futures::future::try_join_all(futures).await?;

        Ok(chunk_results.into_iter().flatten().collect())
    }

    // ───────────────────────────────────────────────────────────────────────────
    // RETRY
    // ───────────────────────────────────────────────────────────────────────────

    /// Run `op` with capped-exponential-backoff retry.
    ///
    /// Non-retryable errors (per [`RpcError::is_retryable`]) propagate immediately.
    /// Retryable errors are retried up to `config.max_retries` times; the final
    /// failure is wrapped in [`RpcError::RetriesExhausted`].
    async fn with_retry<F, Fut, T>(&self, label: &str, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T>>,
    {
        let mut attempt = 0u32;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_retryable() && attempt < self.config.max_retries => {
                    let delay = self.config.backoff_delay(attempt);
                    warn!(
                        %label,
                        attempt,
                        max_retries = self.config.max_retries,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "retrying after transient RPC error"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) if err.is_retryable() => {
                    return Err(RpcError::RetriesExhausted {
                        attempts: attempt + 1,
                        source: Box::new(err),
                    });
                }
                Err(err) => return Err(err),
            }
        }
    }

    // ───────────────────────────────────────────────────────────────────────────
    // INTERNAL HELPERS
    // ───────────────────────────────────────────────────────────────────────────

    /// Send a JSON-RPC request and parse the response.
    async fn send_request<P, R>(&self, request: &JsonRpcRequest<'_, P>) -> Result<JsonRpcResponse<R>>
    where
        P: serde::Serialize + Sync,
        R: serde::de::DeserializeOwned,
    {
        let response = self.client.post(&self.rpc_url).json(request).send().await?;
        let body: JsonRpcResponse<R> = response.json().await?;
        Ok(body)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════
