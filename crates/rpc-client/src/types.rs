//! Request and response types for the generic JSON-RPC client.
//!
//! - [`BatchCall`] - One sub-call (method + params) destined for a batched request
//! - [`BatchStats`] - Statistics from a batched fetch operation

use serde::{Deserialize, Serialize};
use serde_json::Value;

// ═══════════════════════════════════════════════════════════════════════════════
// BATCH CALLS
// ═══════════════════════════════════════════════════════════════════════════════

/// One sub-call within a JSON-RPC batch request.
///
/// `params` is pre-serialized to [`serde_json::Value`] so that callers can mix
/// calls with heterogeneous parameter shapes (e.g. `eth_getBlockByNumber` and
/// `debug_traceBlockByNumber`) in the same batch.
#[derive(Debug, Clone, Serialize)]
pub struct BatchCall {
    /// RPC method name, e.g. `"eth_getBlockByNumber"`.
    pub method: String,
    /// Pre-serialized parameters for this call.
    pub params: Value,
}

impl BatchCall {
    /// Build a batch call from any serializable parameter value.
    ///
    /// # Errors
    ///
    /// Returns an error if `params` cannot be serialized to JSON.
    pub fn new(method: impl Into<String>, params: impl Serialize) -> crate::error::Result<Self> {
        Ok(Self {
            method: method.into(),
            params: serde_json::to_value(params)?,
        })
    }
}

/// Statistics from a batched (possibly multi-chunk) fetch operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BatchStats {
    /// Total number of sub-calls issued.
    pub total_calls: usize,
    /// Number of HTTP requests (chunks) made.
    pub chunks: usize,
}

// ═══════════════════════════════════════════════════════════════════════════════
// INTERNAL WIRE TYPES
// ═══════════════════════════════════════════════════════════════════════════════

/// JSON-RPC request structure.
#[derive(Debug, Serialize)]
pub(crate) struct JsonRpcRequest<'a, P: Serialize> {
    pub jsonrpc: &'static str,
    pub method: &'a str,
    pub params: P,
    pub id: u64,
}

impl<'a, P: Serialize> JsonRpcRequest<'a, P> {
    pub fn new(method: &'a str, params: P, id: u64) -> Self {
        Self {
            jsonrpc: "2.0",
            method,
            params,
            id,
        }
    }
}

/// JSON-RPC response wrapper for extracting result or error.
#[derive(Debug, Deserialize)]
pub(crate) struct JsonRpcResponse<T> {
    #[allow(dead_code)]
    pub id: u64,
    pub result: Option<T>,
    pub error: Option<crate::error::RpcErrorDetail>,
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn batch_call_serializes_params() {
        let call = BatchCall::new("eth_getBlockByNumber", ("0x10", true)).expect("serializable");
        assert_eq!(call.method, "eth_getBlockByNumber");
        assert_eq!(call.params, serde_json::json!(["0x10", true]));
    }

    #[test]
    fn batch_stats_default_is_zero() {
        let stats = BatchStats::default();
        assert_eq!(stats.total_calls, 0);
        assert_eq!(stats.chunks, 0);
    }
}
