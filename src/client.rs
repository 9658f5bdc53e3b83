//! Client context: network descriptor, transport, typed RPC wrappers
//!
//! An [`EthClient`] bundles the immutable [`NetworkDescriptor`] with a
//! [`Transport`] and is passed explicitly to every component — there is no
//! ambient provider or global signer state anywhere in the crate.

use crate::error::{Error, Result, RpcError};
use crate::transport::{HttpTransport, Transport};
use crate::types::{
    u256_from_json, u64_from_json, Block, BlockTag, CallRequest, FeeEstimate, Filter, LogEntry,
    NetworkDescriptor, TransactionInfo, TransactionReceipt,
};
use alloy::primitives::{Address, Bytes, B256, U256};
use serde_json::json;
use std::sync::Arc;

/// Priority fee assumed when a node predates `eth_maxPriorityFeePerGas`
const DEFAULT_PRIORITY_FEE: u128 = 1_000_000_000; // 1 gwei

/// Well-known chain names for the session descriptor
fn network_name(chain_id: u64) -> &'static str {
    match chain_id {
        1 => "mainnet",
        10 => "optimism",
        56 => "bsc",
        137 => "polygon",
        8453 => "base",
        42161 => "arbitrum",
        84532 => "base-sepolia",
        11155111 => "sepolia",
        _ => "unknown",
    }
}

/// A connected JSON-RPC client session
#[derive(Clone)]
pub struct EthClient {
    network: NetworkDescriptor,
    transport: Arc<dyn Transport>,
}

impl std::fmt::Debug for EthClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EthClient")
            .field("network", &self.network)
            .finish_non_exhaustive()
    }
}

impl EthClient {
    /// Connect over HTTP(S) and freeze the network descriptor from the
    /// node's reported chain id.
    pub async fn connect(url: &str) -> Result<Self> {
        let transport = Arc::new(HttpTransport::new(url)?);
        Self::from_transport(url, transport).await
    }

    async fn from_transport(url: &str, transport: Arc<dyn Transport>) -> Result<Self> {
        let result = transport.call("eth_chainId", Vec::new()).await?;
        let chain_id = u64_from_json(&result)?;
        let network = NetworkDescriptor::new(chain_id, network_name(chain_id), url);
        tracing::info!(chain_id, name = network.name, "connected");
        Ok(Self { network, transport })
    }

    /// Build a client over an already-constructed transport; tests inject
    /// their mock transports through this.
    pub fn with_transport(network: NetworkDescriptor, transport: Arc<dyn Transport>) -> Self {
        Self { network, transport }
    }

    pub fn network(&self) -> &NetworkDescriptor {
        &self.network
    }

    pub fn chain_id(&self) -> u64 {
        self.network.chain_id
    }

    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    /// `eth_blockNumber`
    pub async fn block_number(&self) -> Result<u64> {
        let result = self.transport.call("eth_blockNumber", Vec::new()).await?;
        u64_from_json(&result)
    }

    /// `eth_getBalance`
    pub async fn balance(&self, address: Address, tag: BlockTag) -> Result<U256> {
        let result = self
            .transport
            .call("eth_getBalance", vec![json!(address), tag.as_param()])
            .await?;
        u256_from_json(&result)
    }

    /// `eth_getCode`
    pub async fn code(&self, address: Address, tag: BlockTag) -> Result<Bytes> {
        let result = self
            .transport
            .call("eth_getCode", vec![json!(address), tag.as_param()])
            .await?;
        bytes_from_json(&result)
    }

    /// `eth_getBlockByNumber` (header fields only, transactions by hash)
    pub async fn block_by_number(&self, tag: BlockTag) -> Result<Option<Block>> {
        let result = self
            .transport
            .call("eth_getBlockByNumber", vec![tag.as_param(), json!(false)])
            .await?;
        if result.is_null() {
            return Ok(None);
        }
        Ok(Some(typed(result)?))
    }

    /// `eth_gasPrice`
    pub async fn gas_price(&self) -> Result<u128> {
        let result = self.transport.call("eth_gasPrice", Vec::new()).await?;
        crate::types::u128_from_json(&result)
    }

    /// `eth_maxPriorityFeePerGas`
    pub async fn max_priority_fee_per_gas(&self) -> Result<u128> {
        let result = self
            .transport
            .call("eth_maxPriorityFeePerGas", Vec::new())
            .await?;
        crate::types::u128_from_json(&result)
    }

    /// `eth_getTransactionCount`
    pub async fn transaction_count(&self, address: Address, tag: BlockTag) -> Result<u64> {
        let result = self
            .transport
            .call(
                "eth_getTransactionCount",
                vec![json!(address), tag.as_param()],
            )
            .await?;
        u64_from_json(&result)
    }

    /// `eth_call`
    pub async fn call(&self, request: &CallRequest, tag: BlockTag) -> Result<Bytes> {
        let result = self
            .transport
            .call("eth_call", vec![request.to_rpc_object(), tag.as_param()])
            .await?;
        bytes_from_json(&result)
    }

    /// `eth_estimateGas`
    pub async fn estimate_gas(&self, request: &CallRequest) -> Result<u64> {
        let result = self
            .transport
            .call("eth_estimateGas", vec![request.to_rpc_object()])
            .await?;
        let gas = u256_from_json(&result)?;
        gas.try_into()
            .map_err(|_| RpcError::InvalidResponse(format!("gas estimate {gas} overflows u64")).into())
    }

    /// `eth_sendRawTransaction`
    pub async fn send_raw_transaction(&self, raw: &Bytes) -> Result<B256> {
        let result = self
            .transport
            .call("eth_sendRawTransaction", vec![json!(raw)])
            .await?;
        hash_from_json(&result)
    }

    /// `eth_getTransactionByHash`; `None` once a transaction has been
    /// dropped or replaced out of the node's view
    pub async fn transaction_by_hash(&self, hash: B256) -> Result<Option<TransactionInfo>> {
        let result = self
            .transport
            .call("eth_getTransactionByHash", vec![json!(hash)])
            .await?;
        if result.is_null() {
            return Ok(None);
        }
        Ok(Some(typed(result)?))
    }

    /// `eth_getTransactionReceipt`; `None` until mined
    pub async fn transaction_receipt(&self, hash: B256) -> Result<Option<TransactionReceipt>> {
        let result = self
            .transport
            .call("eth_getTransactionReceipt", vec![json!(hash)])
            .await?;
        if result.is_null() {
            return Ok(None);
        }
        Ok(Some(typed(result)?))
    }

    /// `eth_getLogs` over one explicit sub-range
    pub async fn get_logs(&self, filter: &Filter, from: u64, to: u64) -> Result<Vec<LogEntry>> {
        let result = self
            .transport
            .call("eth_getLogs", vec![filter.to_rpc_object(from, to)])
            .await?;
        typed(result)
    }

    /// Current fee fields for a new submission attempt.
    ///
    /// EIP-1559 chains get `max_fee = 2 * base_fee + priority` headroom so the
    /// transaction survives base-fee drift while pending; chains whose latest
    /// block carries no base fee fall back to the legacy gas price.
    pub async fn fee_estimate(&self) -> Result<FeeEstimate> {
        let block = self
            .block_by_number(BlockTag::Latest)
            .await?
            .ok_or_else(|| RpcError::InvalidResponse("no latest block".to_string()))?;

        match block.base_fee_per_gas {
            Some(base_fee) => {
                let priority = match self.max_priority_fee_per_gas().await {
                    Ok(p) => p,
                    // pre-London nodes reply method-not-found
                    Err(Error::Rpc(RpcError::Rpc { code: -32601, .. })) => {
                        tracing::debug!("eth_maxPriorityFeePerGas unsupported, assuming 1 gwei");
                        DEFAULT_PRIORITY_FEE
                    }
                    Err(e) => return Err(e),
                };
                Ok(FeeEstimate::Eip1559 {
                    max_fee_per_gas: base_fee.saturating_mul(2).saturating_add(priority),
                    max_priority_fee_per_gas: priority,
                })
            }
            None => Ok(FeeEstimate::Legacy {
                gas_price: self.gas_price().await?,
            }),
        }
    }
}

fn typed<T: serde::de::DeserializeOwned>(value: serde_json::Value) -> Result<T> {
    serde_json::from_value(value).map_err(|e| RpcError::InvalidResponse(e.to_string()).into())
}

fn bytes_from_json(value: &serde_json::Value) -> Result<Bytes> {
    let s = value
        .as_str()
        .ok_or_else(|| RpcError::InvalidResponse(format!("expected hex data, got {value}")))?;
    s.parse::<Bytes>()
        .map_err(|_| RpcError::InvalidResponse(format!("bad hex data '{s}'")).into())
}

fn hash_from_json(value: &serde_json::Value) -> Result<B256> {
    let s = value
        .as_str()
        .ok_or_else(|| RpcError::InvalidResponse(format!("expected hash, got {value}")))?;
    s.parse::<B256>()
        .map_err(|_| RpcError::InvalidResponse(format!("bad hash '{s}'")).into())
}
