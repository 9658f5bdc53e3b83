//! Error types for eth-contract-client

use thiserror::Error;

/// Main error type for the library
#[derive(Error, Debug)]
pub enum Error {
    /// RPC and transport errors
    #[error("RPC error: {0}")]
    Rpc(#[from] RpcError),

    /// ABI-related errors
    #[error("ABI error: {0}")]
    Abi(#[from] AbiError),

    /// Transaction lifecycle errors
    #[error("Transaction error: {0}")]
    Tx(#[from] TxError),

    /// Input validation errors
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

/// RPC-specific errors
#[derive(Error, Debug)]
pub enum RpcError {
    /// Network or connection failure; the request may never have reached the
    /// node. Retryable by the caller.
    #[error("Transport unavailable: {0}")]
    Unavailable(String),

    /// Provider-reported JSON-RPC error that matched no more specific case
    #[error("RPC error {code}: {message}")]
    Rpc { code: i64, message: String },

    /// Contract-level rejection, surfaced verbatim
    #[error("Execution reverted{}", display_reason(reason))]
    ExecutionReverted { reason: Option<String> },

    /// Provider refused the requested getLogs block span
    #[error("Block range too large: {0}")]
    BlockRangeTooLarge(String),

    /// Provider refused because the result set exceeds its cap
    #[error("Response too large: {0}")]
    ResponseTooLarge(String),

    /// Rate limited by endpoint
    #[error("Rate limited: {0}")]
    RateLimited(String),

    /// Malformed envelope or a response id matching no outstanding request
    #[error("Invalid response from endpoint: {0}")]
    InvalidResponse(String),
}

/// ABI-related errors
#[derive(Error, Debug)]
pub enum AbiError {
    /// Argument count or type shape does not match the descriptor.
    /// Caller programming error, never retried.
    #[error("ABI mismatch: {0}")]
    Mismatch(String),

    /// Decode input shorter than the declared type list requires
    #[error("ABI data truncated: needed {needed} bytes, have {have}")]
    Truncated { needed: usize, have: usize },

    #[error("Failed to parse ABI: {0}")]
    ParseError(String),

    #[error("Function not found in ABI: {0}")]
    FunctionNotFound(String),

    #[error("Event not found in ABI: {0}")]
    EventNotFound(String),
}

/// Transaction lifecycle errors
#[derive(Error, Debug)]
pub enum TxError {
    /// The chain's gas estimator predicted a revert; carries the decoded
    /// reason when one was present. No nonce has been allocated yet.
    #[error("Gas estimation failed{}", display_reason(reason))]
    GasEstimationFailed { reason: Option<String> },

    /// No receipt observed within the configured timeout. The nonce stays
    /// reserved; resubmission is caller policy.
    #[error("Transaction {hash} not confirmed after {waited_secs}s")]
    TimedOut { hash: String, waited_secs: u64 },

    /// Another transaction with the same nonce was confirmed instead
    #[error("Transaction {hash} (nonce {nonce}) was replaced on-chain")]
    Replaced { hash: String, nonce: u64 },

    /// The request was missing fields at signing time, or the key rejected it
    #[error("Signing failed: {0}")]
    Signing(String),
}

/// Input validation errors, rejected before any network call
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Invalid block range: from {from} > to {to}")]
    InvalidRange { from: u64, to: u64 },

    #[error("Invalid endpoint URL: {0}")]
    InvalidUrl(String),
}

fn display_reason(reason: &Option<String>) -> String {
    match reason {
        Some(r) => format!(": {r}"),
        None => String::new(),
    }
}

/// Result type alias for the library
pub type Result<T> = std::result::Result<T, Error>;

impl From<String> for Error {
    fn from(s: String) -> Self {
        Error::Other(s)
    }
}

impl From<&str> for Error {
    fn from(s: &str) -> Self {
        Error::Other(s.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_revert_display_includes_reason() {
        let err = RpcError::ExecutionReverted {
            reason: Some("insufficient balance".to_string()),
        };
        assert_eq!(
            err.to_string(),
            "Execution reverted: insufficient balance"
        );

        let bare = RpcError::ExecutionReverted { reason: None };
        assert_eq!(bare.to_string(), "Execution reverted");
    }

    #[test]
    fn test_error_conversion() {
        let err: Error = AbiError::Truncated { needed: 64, have: 3 }.into();
        assert!(matches!(err, Error::Abi(AbiError::Truncated { .. })));
    }
}
