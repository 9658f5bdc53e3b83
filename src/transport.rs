//! JSON-RPC transport facade
//!
//! A [`Transport`] sends one request and returns one result — no retry logic
//! lives here. Retry policy belongs to callers that know whether the method
//! is idempotent (the log query engine is the only internal retrier).

use crate::abi::decode_revert_reason;
use crate::error::{Result, RpcError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// A request/response JSON-RPC channel
#[async_trait]
pub trait Transport: Send + Sync {
    /// Issue a single JSON-RPC call and return its `result` value
    async fn call(&self, method: &str, params: Vec<serde_json::Value>)
        -> Result<serde_json::Value>;
}

#[derive(Serialize)]
struct JsonRpcRequest<'a> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: &'a [serde_json::Value],
}

#[derive(Deserialize)]
struct JsonRpcResponse {
    id: Option<u64>,
    result: Option<serde_json::Value>,
    error: Option<JsonRpcErrorObject>,
}

#[derive(Deserialize)]
struct JsonRpcErrorObject {
    code: i64,
    message: String,
    data: Option<serde_json::Value>,
}

/// HTTP(S) JSON-RPC transport over a single endpoint
pub struct HttpTransport {
    url: String,
    client: reqwest::Client,
    /// Request ids, used to correlate responses when calls are issued
    /// concurrently over the same transport
    next_id: AtomicU64,
}

impl HttpTransport {
    /// Create a transport with the default 30s request timeout
    pub fn new(url: impl Into<String>) -> Result<Self> {
        Self::with_timeout(url, Duration::from_secs(30))
    }

    pub fn with_timeout(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RpcError::Unavailable(e.to_string()))?;
        Ok(Self {
            url: url.into(),
            client,
            next_id: AtomicU64::new(1),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn call(
        &self,
        method: &str,
        params: Vec<serde_json::Value>,
    ) -> Result<serde_json::Value> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let request = JsonRpcRequest {
            jsonrpc: "2.0",
            id,
            method,
            params: &params,
        };

        tracing::trace!(method, id, "sending JSON-RPC request");

        let response = self
            .client
            .post(&self.url)
            .json(&request)
            .send()
            .await
            .map_err(|e| RpcError::Unavailable(e.to_string()))?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(RpcError::RateLimited(format!("HTTP 429 from {}", self.url)).into());
        }
        if !status.is_success() {
            return Err(RpcError::Unavailable(format!("HTTP {status} from {}", self.url)).into());
        }

        let envelope: JsonRpcResponse = response
            .json()
            .await
            .map_err(|e| RpcError::InvalidResponse(e.to_string()))?;

        // A response correlated to some other request is a protocol
        // violation; drop it rather than guessing which call it answers.
        if envelope.id != Some(id) {
            tracing::warn!(
                method,
                expected = id,
                got = ?envelope.id,
                "dropping response with mismatched request id"
            );
            return Err(RpcError::InvalidResponse(format!(
                "response id {:?} does not match request id {id}",
                envelope.id
            ))
            .into());
        }

        if let Some(error) = envelope.error {
            return Err(classify_rpc_error(error).into());
        }

        envelope
            .result
            .ok_or_else(|| RpcError::InvalidResponse("missing result and error".to_string()).into())
    }
}

/// Map a provider error object into the crate taxonomy.
///
/// Providers phrase their getLogs caps inconsistently; the substrings below
/// cover the major hosted endpoints and self-hosted geth/erigon/reth.
fn classify_rpc_error(error: JsonRpcErrorObject) -> RpcError {
    let JsonRpcErrorObject {
        code,
        message,
        data,
    } = error;
    let lower = message.to_lowercase();

    if let Some(reason) = revert_reason_from(&lower, &message, data.as_ref()) {
        return RpcError::ExecutionReverted { reason };
    }

    if lower.contains("block range")
        || lower.contains("range is too large")
        || lower.contains("exceed maximum block range")
        || lower.contains("too many blocks")
    {
        return RpcError::BlockRangeTooLarge(message);
    }

    if lower.contains("more than") && lower.contains("results")
        || lower.contains("too many results")
        || lower.contains("response size")
        || lower.contains("query returned more than")
    {
        return RpcError::ResponseTooLarge(message);
    }

    if code == -32005 || lower.contains("rate limit") || lower.contains("too many requests") {
        return RpcError::RateLimited(message);
    }

    RpcError::Rpc { code, message }
}

/// Extract a revert reason from an error object, preferring the ABI-encoded
/// `data` payload over message parsing.
fn revert_reason_from(
    lower: &str,
    message: &str,
    data: Option<&serde_json::Value>,
) -> Option<Option<String>> {
    let looks_reverted = lower.contains("execution reverted") || lower.contains("revert");

    if let Some(hex) = data.and_then(revert_bytes) {
        if let Some(reason) = decode_revert_reason(&hex) {
            return Some(Some(reason));
        }
        if looks_reverted {
            // custom error: keep the raw selector+payload as the reason
            return Some(Some(format!("0x{}", hex::encode(hex))));
        }
    }

    if looks_reverted {
        let reason = message
            .splitn(2, "execution reverted:")
            .nth(1)
            .map(|r| r.trim().to_string())
            .filter(|r| !r.is_empty());
        return Some(reason);
    }

    None
}

/// The `data` field carrying revert bytes, either directly or nested the way
/// geth wraps it (`{"data": "0x..."}` or `{"data": {"data": "0x..."}}`)
fn revert_bytes(data: &serde_json::Value) -> Option<Vec<u8>> {
    match data {
        serde_json::Value::String(s) => hex::decode(s.strip_prefix("0x")?).ok(),
        serde_json::Value::Object(map) => map.get("data").and_then(revert_bytes),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::abi::{encode_function_call, AbiFunction, Value};

    fn classify(code: i64, message: &str, data: Option<serde_json::Value>) -> RpcError {
        classify_rpc_error(JsonRpcErrorObject {
            code,
            message: message.to_string(),
            data,
        })
    }

    #[test]
    fn test_classify_range_errors() {
        assert!(matches!(
            classify(-32600, "block range is too large", None),
            RpcError::BlockRangeTooLarge(_)
        ));
        assert!(matches!(
            classify(-32005, "query returned more than 10000 results", None),
            RpcError::ResponseTooLarge(_)
        ));
    }

    #[test]
    fn test_classify_rate_limit() {
        assert!(matches!(
            classify(-32005, "rate limit exceeded", None),
            RpcError::RateLimited(_)
        ));
        assert!(matches!(
            classify(429, "Too Many Requests", None),
            RpcError::RateLimited(_)
        ));
    }

    #[test]
    fn test_classify_revert_from_message() {
        let err = classify(3, "execution reverted: insufficient balance", None);
        match err {
            RpcError::ExecutionReverted { reason } => {
                assert_eq!(reason.as_deref(), Some("insufficient balance"));
            }
            other => panic!("expected revert, got {other:?}"),
        }
    }

    #[test]
    fn test_classify_revert_from_data_payload() {
        let f = AbiFunction::parse("function Error(string)").unwrap();
        let payload =
            encode_function_call(&f, &[Value::String("not owner".to_string())]).unwrap();
        let data = serde_json::Value::String(format!("0x{}", hex::encode(payload)));

        let err = classify(3, "execution reverted", Some(data));
        match err {
            RpcError::ExecutionReverted { reason } => {
                assert_eq!(reason.as_deref(), Some("not owner"));
            }
            other => panic!("expected revert, got {other:?}"),
        }
    }

    #[test]
    fn test_classify_plain_rpc_error() {
        let err = classify(-32601, "method not found", None);
        assert!(matches!(err, RpcError::Rpc { code: -32601, .. }));
    }

    #[test]
    fn test_bare_revert_has_no_reason() {
        let err = classify(3, "execution reverted", None);
        assert!(matches!(
            err,
            RpcError::ExecutionReverted { reason: None }
        ));
    }
}
