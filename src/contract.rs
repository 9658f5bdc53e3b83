//! Contract facade
//!
//! Binds an address and a parsed [`Abi`] to a client. Read calls need no
//! signer; write calls stop here at [`Contract::populate_transaction`] — the
//! lifecycle manager owns nonce, gas, and fee filling so that estimation
//! happens exactly once per submission attempt.

use crate::abi::{decode_return, encode_function_call, Abi, AbiEvent, AbiFunction, Value};
use crate::client::EthClient;
use crate::error::{Error, Result, RpcError, TxError};
use crate::types::{BlockTag, CallRequest, TransactionRequest};
use alloy::primitives::{Address, Bytes, U256};

/// An address + ABI bound to a client session
#[derive(Debug, Clone)]
pub struct Contract {
    address: Address,
    abi: Abi,
    client: EthClient,
}

impl Contract {
    pub fn new(client: EthClient, address: Address, abi: Abi) -> Self {
        Self {
            address,
            abi,
            client,
        }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn abi(&self) -> &Abi {
        &self.abi
    }

    pub fn client(&self) -> &EthClient {
        &self.client
    }

    pub fn function(&self, name: &str) -> Result<&AbiFunction> {
        self.abi.function(name)
    }

    pub fn event(&self, name: &str) -> Result<&AbiEvent> {
        self.abi.event(name)
    }

    /// Whether any bytecode is deployed at the bound address
    pub async fn exists(&self) -> Result<bool> {
        let code = self.client.code(self.address, BlockTag::Latest).await?;
        Ok(!code.is_empty())
    }

    /// Encode a call request. Pure: identical inputs produce byte-identical
    /// requests, and nothing is sent anywhere.
    pub fn build_call(
        &self,
        function: &AbiFunction,
        args: &[Value],
        value: Option<U256>,
    ) -> Result<CallRequest> {
        let data = encode_function_call(function, args)?;
        Ok(CallRequest {
            from: None,
            to: self.address,
            data: Bytes::from(data),
            value,
        })
    }

    /// Issue an `eth_call` for a function and decode the return data.
    /// Requires no signer.
    pub async fn read_call(
        &self,
        name: &str,
        args: &[Value],
        tag: BlockTag,
    ) -> Result<Vec<Value>> {
        let function = self.abi.function(name)?;
        let call = self.build_call(function, args, None)?;
        let data = self.client.call(&call, tag).await?;
        decode_return(function, &data)
    }

    /// Execute a call against current state without committing anything,
    /// predicting success before gas is spent. Reverts surface as
    /// `ExecutionReverted` with the decoded reason.
    pub async fn simulate(
        &self,
        function: &AbiFunction,
        call: &CallRequest,
        from: Address,
    ) -> Result<Vec<Value>> {
        let mut call = call.clone();
        call.from = Some(from);
        let data = self.client.call(&call, BlockTag::Latest).await?;
        decode_return(function, &data)
    }

    /// Query the chain's gas estimator. A revert during estimation comes
    /// back as `GasEstimationFailed` carrying the revert reason; no nonce
    /// has been touched at this point.
    pub async fn estimate_gas(&self, call: &CallRequest, from: Address) -> Result<u64> {
        let mut call = call.clone();
        call.from = Some(from);
        match self.client.estimate_gas(&call).await {
            Ok(gas) => Ok(gas),
            Err(Error::Rpc(RpcError::ExecutionReverted { reason })) => {
                Err(TxError::GasEstimationFailed { reason }.into())
            }
            Err(e) => Err(e),
        }
    }

    /// Turn a call into a transaction request: to/data/value/chain id only.
    /// Nonce, gas limit, and fees are the lifecycle manager's responsibility.
    pub fn populate_transaction(&self, call: &CallRequest, from: Address) -> TransactionRequest {
        TransactionRequest {
            from: Some(from),
            to: call.to,
            data: call.data.clone(),
            value: call.value.unwrap_or(U256::ZERO),
            chain_id: Some(self.client.chain_id()),
            nonce: None,
            gas_limit: None,
            fees: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::abi::erc20_abi;
    use crate::transport::Transport;
    use crate::types::NetworkDescriptor;
    use alloy::primitives::address;
    use async_trait::async_trait;
    use std::sync::Arc;

    /// Transport that refuses every call; build_call and populate must never
    /// touch the network.
    struct NoNetwork;

    #[async_trait]
    impl Transport for NoNetwork {
        async fn call(
            &self,
            method: &str,
            _params: Vec<serde_json::Value>,
        ) -> crate::error::Result<serde_json::Value> {
            panic!("unexpected network call: {method}");
        }
    }

    fn offline_contract() -> Contract {
        let client = EthClient::with_transport(
            NetworkDescriptor::new(11155111, "sepolia", "http://localhost:8545"),
            Arc::new(NoNetwork),
        );
        Contract::new(
            client,
            address!("A0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48"),
            erc20_abi(),
        )
    }

    #[test]
    fn test_build_call_is_pure_and_deterministic() {
        let contract = offline_contract();
        let f = contract.function("balanceOf").unwrap().clone();
        let args = [Value::Address(address!(
            "d8dA6BF26964aF9D7eEd9e03E53415D37aA96045"
        ))];

        let a = contract.build_call(&f, &args, None).unwrap();
        let b = contract.build_call(&f, &args, None).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.data, b.data);
        assert_eq!(&a.data[..4], &[0x70, 0xa0, 0x82, 0x31]);
    }

    #[test]
    fn test_build_call_rejects_wrong_arity() {
        let contract = offline_contract();
        let f = contract.function("balanceOf").unwrap().clone();
        assert!(contract.build_call(&f, &[], None).is_err());
    }

    #[test]
    fn test_populate_fills_only_call_fields() {
        let contract = offline_contract();
        let f = contract.function("transfer").unwrap().clone();
        let from = address!("365a8b3f57A650DE13f145263E3a5B40c43d3bCd");
        let call = contract
            .build_call(
                &f,
                &[
                    Value::Address(from),
                    Value::Uint(U256::from(1000u64)),
                ],
                None,
            )
            .unwrap();

        let tx = contract.populate_transaction(&call, from);
        assert_eq!(tx.from, Some(from));
        assert_eq!(tx.to, contract.address());
        assert_eq!(tx.chain_id, Some(11155111));
        assert!(tx.nonce.is_none());
        assert!(tx.gas_limit.is_none());
        assert!(tx.fees.is_none());
    }
}
