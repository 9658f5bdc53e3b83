//! eth-contract-client - Minimal Ethereum JSON-RPC client and contract layer
//!
//! A Rust library for reading chain and contract state, encoding and decoding
//! ABI-typed calls, driving the full lifecycle of a write transaction
//! (populate, simulate, estimate, sign, broadcast, confirm), and fetching
//! historical event logs across block ranges larger than a single provider
//! query allows.
//!
//! # Example
//!
//! ```rust,no_run
//! use eth_contract_client::{
//!     erc20_abi, BlockTag, Contract, EthClient, Filter, LogFetcher, Value,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = EthClient::connect("https://eth.llamarpc.com").await?;
//!
//!     let usdc = "0xA0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48".parse()?;
//!     let token = Contract::new(client.clone(), usdc, erc20_abi());
//!     let decimals = token.read_call("decimals", &[], BlockTag::Latest).await?;
//!     println!("decimals: {:?}", decimals[0]);
//!
//!     let transfers = token.event("Transfer")?;
//!     let filter = Filter::new()
//!         .address(usdc)
//!         .event_signature(transfers.topic0())
//!         .from_block(18_000_000)
//!         .to_block(18_010_000);
//!     let fetcher = LogFetcher::new(client).with_abi(token.abi());
//!     let logs = fetcher.fetch_all(&filter).await?;
//!     println!("fetched {} logs", logs.len());
//!     Ok(())
//! }
//! ```

pub mod abi;
pub mod client;
pub mod contract;
pub mod error;
pub mod fetcher;
pub mod signer;
pub mod transport;
pub mod tx;
pub mod types;

// Re-exports for convenience
pub use abi::{
    decode_log, decode_return, decode_revert_reason, encode_function_call, erc20_abi, Abi,
    AbiEvent, AbiFunction, DecodedLog, LogDecoder, Mutability, ParamType, Value,
};
pub use client::EthClient;
pub use contract::Contract;
pub use error::{AbiError, ConfigError, Error, Result, RpcError, TxError};
pub use fetcher::{FetchOptions, LogFetcher};
pub use signer::Signer;
pub use transport::{HttpTransport, Transport};
pub use tx::{PendingTx, PreparedTx, TxOptions, TxOutcome, TxSender};
pub use types::{
    parse_address, Block, BlockTag, CallRequest, FeeEstimate, Filter, LogEntry,
    NetworkDescriptor, SignedTransaction, Topic, TransactionInfo, TransactionReceipt,
    TransactionRequest,
};
