//! Chain data model and JSON-RPC wire forms
//!
//! Quantities travel as `0x`-prefixed hex strings with no leading zeros;
//! the serde helpers in [`quantity`] handle both directions for the numeric
//! fields that nodes encode that way.

use crate::error::{ConfigError, Result, RpcError};
use alloy::primitives::{Address, Bytes, B256, U256};
use serde::{Deserialize, Serialize};
use serde_json::json;

/// The chain a client session is bound to. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkDescriptor {
    pub chain_id: u64,
    pub name: String,
    pub endpoint: String,
}

impl NetworkDescriptor {
    pub fn new(chain_id: u64, name: impl Into<String>, endpoint: impl Into<String>) -> Self {
        Self {
            chain_id,
            name: name.into(),
            endpoint: endpoint.into(),
        }
    }
}

/// Block reference accepted by read methods
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BlockTag {
    #[default]
    Latest,
    Pending,
    Number(u64),
}

impl BlockTag {
    /// Wire form: `"latest"`, `"pending"`, or a hex quantity
    pub fn as_param(&self) -> serde_json::Value {
        match self {
            BlockTag::Latest => json!("latest"),
            BlockTag::Pending => json!("pending"),
            BlockTag::Number(n) => json!(format!("0x{n:x}")),
        }
    }
}

/// A read-only call. Constructed fresh per call, never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallRequest {
    pub from: Option<Address>,
    pub to: Address,
    pub data: Bytes,
    pub value: Option<U256>,
}

impl CallRequest {
    pub fn to_rpc_object(&self) -> serde_json::Value {
        let mut obj = json!({
            "to": self.to,
            "data": &self.data,
        });
        if let Some(from) = self.from {
            obj["from"] = json!(from);
        }
        if let Some(value) = self.value {
            obj["value"] = json!(value);
        }
        obj
    }
}

/// Fee fields for a submission attempt. Recomputed per lifecycle invocation,
/// never cached across submissions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeeEstimate {
    /// Pre-1559 chains: a single gas price
    Legacy { gas_price: u128 },
    /// EIP-1559 fee pair
    Eip1559 {
        max_fee_per_gas: u128,
        max_priority_fee_per_gas: u128,
    },
}

/// A write transaction under construction. Mutated only during the populate
/// and prepare phases; frozen once handed to the signer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionRequest {
    pub from: Option<Address>,
    pub to: Address,
    pub data: Bytes,
    pub value: U256,
    pub chain_id: Option<u64>,
    pub nonce: Option<u64>,
    pub gas_limit: Option<u64>,
    pub fees: Option<FeeEstimate>,
}

impl TransactionRequest {
    /// A plain value transfer with empty calldata
    pub fn value_transfer(to: Address, value: U256) -> Self {
        Self {
            from: None,
            to,
            data: Bytes::new(),
            value,
            chain_id: None,
            nonce: None,
            gas_limit: None,
            fees: None,
        }
    }

    /// View of the call portion, for simulate/estimate round trips
    pub fn as_call(&self) -> CallRequest {
        CallRequest {
            from: self.from,
            to: self.to,
            data: self.data.clone(),
            value: (!self.value.is_zero()).then_some(self.value),
        }
    }
}

/// A signed raw transaction. Produced exactly once per request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedTransaction {
    pub raw: Bytes,
    pub hash: B256,
    pub nonce: u64,
    pub from: Address,
}

/// Chain-produced record of a mined transaction's outcome
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TransactionReceipt {
    pub transaction_hash: B256,
    #[serde(with = "quantity")]
    pub block_number: u64,
    #[serde(with = "quantity")]
    pub status: u64,
    pub gas_used: U256,
    #[serde(default)]
    pub effective_gas_price: Option<U256>,
    #[serde(default)]
    pub logs: Vec<LogEntry>,
}

impl TransactionReceipt {
    pub fn succeeded(&self) -> bool {
        self.status == 1
    }
}

/// A single emitted log, immutable once returned
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    pub address: Address,
    pub topics: Vec<B256>,
    pub data: Bytes,
    #[serde(with = "quantity")]
    pub block_number: u64,
    pub transaction_hash: B256,
    #[serde(with = "quantity")]
    pub log_index: u64,
}

/// The mempool view of a transaction (`eth_getTransactionByHash`)
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TransactionInfo {
    pub hash: B256,
    pub from: Address,
    #[serde(with = "quantity")]
    pub nonce: u64,
    #[serde(default, with = "quantity::opt")]
    pub block_number: Option<u64>,
}

/// Header fields this client reads from `eth_getBlockByNumber`
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Block {
    #[serde(with = "quantity")]
    pub number: u64,
    #[serde(with = "quantity")]
    pub timestamp: u64,
    #[serde(default, with = "quantity::opt_u128")]
    pub base_fee_per_gas: Option<u128>,
}

/// One topic slot: a single required value or any-of set
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Topic {
    Single(B256),
    Any(Vec<B256>),
}

impl Topic {
    /// An address padded into a 32-byte topic word
    pub fn address(addr: Address) -> Self {
        Topic::Single(B256::left_padding_from(addr.as_slice()))
    }

    fn as_param(&self) -> serde_json::Value {
        match self {
            Topic::Single(t) => json!(t),
            Topic::Any(ts) => json!(ts),
        }
    }
}

impl From<B256> for Topic {
    fn from(t: B256) -> Self {
        Topic::Single(t)
    }
}

impl From<Vec<B256>> for Topic {
    fn from(ts: Vec<B256>) -> Self {
        Topic::Any(ts)
    }
}

/// A log filter over a block range
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Filter {
    pub addresses: Vec<Address>,
    /// Positional topic constraints; `None` matches anything in that slot
    pub topics: Vec<Option<Topic>>,
    pub from_block: u64,
    pub to_block: BlockTag,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn address(mut self, addr: Address) -> Self {
        self.addresses.push(addr);
        self
    }

    pub fn from_block(mut self, block: u64) -> Self {
        self.from_block = block;
        self
    }

    pub fn to_block(mut self, block: impl Into<BlockTag>) -> Self {
        self.to_block = block.into();
        self
    }

    /// Constrain topic0, usually to an event signature hash
    pub fn event_signature(self, topic: impl Into<Topic>) -> Self {
        self.topic(0, Some(topic.into()))
    }

    /// Set one positional topic slot (0..=3); `None` leaves it unconstrained
    pub fn topic(mut self, slot: usize, topic: Option<Topic>) -> Self {
        debug_assert!(slot < 4, "logs carry at most 4 topics");
        while self.topics.len() <= slot {
            self.topics.push(None);
        }
        self.topics[slot] = topic;
        self
    }

    /// Wire form over an explicit sub-range (the query engine supplies the
    /// chunk bounds; the filter's own range is the caller's logical range)
    pub(crate) fn to_rpc_object(&self, from: u64, to: u64) -> serde_json::Value {
        let mut obj = json!({
            "fromBlock": format!("0x{from:x}"),
            "toBlock": format!("0x{to:x}"),
        });
        match self.addresses.len() {
            0 => {}
            1 => obj["address"] = json!(self.addresses[0]),
            _ => obj["address"] = json!(&self.addresses),
        }
        if !self.topics.is_empty() {
            let topics: Vec<serde_json::Value> = self
                .topics
                .iter()
                .map(|slot| match slot {
                    Some(t) => t.as_param(),
                    None => serde_json::Value::Null,
                })
                .collect();
            obj["topics"] = json!(topics);
        }
        obj
    }
}

impl From<u64> for BlockTag {
    fn from(n: u64) -> Self {
        BlockTag::Number(n)
    }
}

/// Parse and validate a `0x`-prefixed 20-byte address string
pub fn parse_address(s: &str) -> Result<Address> {
    s.parse::<Address>()
        .map_err(|_| ConfigError::InvalidAddress(s.to_string()).into())
}

/// Parse a hex quantity out of a JSON-RPC result value
pub(crate) fn u64_from_json(value: &serde_json::Value) -> Result<u64> {
    let s = value
        .as_str()
        .ok_or_else(|| RpcError::InvalidResponse(format!("expected quantity, got {value}")))?;
    parse_quantity_u64(s)
        .ok_or_else(|| RpcError::InvalidResponse(format!("bad quantity '{s}'")).into())
}

pub(crate) fn u256_from_json(value: &serde_json::Value) -> Result<U256> {
    let s = value
        .as_str()
        .ok_or_else(|| RpcError::InvalidResponse(format!("expected quantity, got {value}")))?;
    let digits = s.strip_prefix("0x").unwrap_or(s);
    U256::from_str_radix(digits, 16)
        .map_err(|_| RpcError::InvalidResponse(format!("bad quantity '{s}'")).into())
}

pub(crate) fn u128_from_json(value: &serde_json::Value) -> Result<u128> {
    let s = value
        .as_str()
        .ok_or_else(|| RpcError::InvalidResponse(format!("expected quantity, got {value}")))?;
    let digits = s.strip_prefix("0x").unwrap_or(s);
    u128::from_str_radix(digits, 16)
        .map_err(|_| RpcError::InvalidResponse(format!("bad quantity '{s}'")).into())
}

fn parse_quantity_u64(s: &str) -> Option<u64> {
    let digits = s.strip_prefix("0x")?;
    u64::from_str_radix(digits, 16).ok()
}

/// Serde adapters for hex-quantity fields
pub(crate) mod quantity {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(v: &u64, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&format!("0x{v:x}"))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<u64, D::Error> {
        let s = String::deserialize(d)?;
        super::parse_quantity_u64(&s)
            .ok_or_else(|| serde::de::Error::custom(format!("bad quantity '{s}'")))
    }

    pub mod opt {
        use serde::{Deserialize, Deserializer};

        pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<u64>, D::Error> {
            let s: Option<String> = Option::deserialize(d)?;
            match s {
                None => Ok(None),
                Some(s) => super::super::parse_quantity_u64(&s)
                    .map(Some)
                    .ok_or_else(|| serde::de::Error::custom(format!("bad quantity '{s}'"))),
            }
        }
    }

    pub mod opt_u128 {
        use serde::{Deserialize, Deserializer};

        pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<u128>, D::Error> {
            let s: Option<String> = Option::deserialize(d)?;
            match s {
                None => Ok(None),
                Some(s) => {
                    let digits = s.strip_prefix("0x").unwrap_or(&s);
                    u128::from_str_radix(digits, 16)
                        .map(Some)
                        .map_err(|_| serde::de::Error::custom(format!("bad quantity '{s}'")))
                }
            }
        }
    }
}
