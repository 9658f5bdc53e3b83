//! Local transaction signer and nonce reservation
//!
//! Key material lives in memory for the signer's lifetime only; it is never
//! logged (the `Debug` impl prints the derived address) and never serialized.

use crate::client::EthClient;
use crate::error::{Result, TxError};
use crate::types::{BlockTag, FeeEstimate, SignedTransaction, TransactionRequest};
use alloy::consensus::{SignableTransaction, TxEip1559, TxEnvelope, TxLegacy};
use alloy::eips::eip2718::Encodable2718;
use alloy::eips::eip2930::AccessList;
use alloy::network::TxSignerSync;
use alloy::primitives::{Address, Bytes, TxKind};
use alloy::signers::local::PrivateKeySigner;
use tokio::sync::Mutex;

/// Holds one private key and tracks nonce allocations for its address
pub struct Signer {
    inner: PrivateKeySigner,
    address: Address,
    /// Next nonce to hand out. `None` until the chain view has been queried
    /// once; afterwards allocation is purely local so concurrent submissions
    /// never race the node's lagging view.
    next_nonce: Mutex<Option<u64>>,
}

impl std::fmt::Debug for Signer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Signer")
            .field("address", &self.address)
            .finish_non_exhaustive()
    }
}

impl Signer {
    pub fn new(key: PrivateKeySigner) -> Self {
        let address = key.address();
        Self {
            inner: key,
            address,
            next_nonce: Mutex::new(None),
        }
    }

    /// A throwaway signer with a freshly generated key
    pub fn random() -> Self {
        Self::new(PrivateKeySigner::random())
    }

    pub fn address(&self) -> Address {
        self.address
    }

    /// Reserve the next nonce for this signer's address.
    ///
    /// The chain-confirmed count is queried once per session (pending tag);
    /// every later reservation increments locally under the lock, so N
    /// concurrent submissions receive N contiguous distinct nonces. A
    /// reservation is never returned to the pool — a timed-out transaction
    /// still occupies its nonce until the caller resolves it.
    pub async fn next_nonce(&self, client: &EthClient) -> Result<u64> {
        let mut guard = self.next_nonce.lock().await;
        let next = match *guard {
            Some(n) => n,
            None => {
                let n = client
                    .transaction_count(self.address, BlockTag::Pending)
                    .await?;
                tracing::debug!(address = %self.address, nonce = n, "initialized nonce from chain");
                n
            }
        };
        *guard = Some(next + 1);
        Ok(next)
    }

    /// Sign a fully-populated request. Deterministic: the same request always
    /// produces the same raw bytes and hash.
    ///
    /// The request must carry chain id, nonce, gas limit, and fee fields by
    /// this point; missing fields are a lifecycle bug, not a chain condition.
    pub fn sign(&self, request: &TransactionRequest) -> Result<SignedTransaction> {
        let chain_id = request
            .chain_id
            .ok_or_else(|| TxError::Signing("missing chain id".to_string()))?;
        let nonce = request
            .nonce
            .ok_or_else(|| TxError::Signing("missing nonce".to_string()))?;
        let gas_limit = request
            .gas_limit
            .ok_or_else(|| TxError::Signing("missing gas limit".to_string()))?;
        let fees = request
            .fees
            .ok_or_else(|| TxError::Signing("missing fee fields".to_string()))?;

        let envelope = match fees {
            FeeEstimate::Eip1559 {
                max_fee_per_gas,
                max_priority_fee_per_gas,
            } => {
                let mut tx = TxEip1559 {
                    chain_id,
                    nonce,
                    gas_limit,
                    max_fee_per_gas,
                    max_priority_fee_per_gas,
                    to: TxKind::Call(request.to),
                    value: request.value,
                    access_list: AccessList::default(),
                    input: request.data.clone(),
                };
                let signature = self
                    .inner
                    .sign_transaction_sync(&mut tx)
                    .map_err(|e| TxError::Signing(e.to_string()))?;
                TxEnvelope::from(tx.into_signed(signature))
            }
            FeeEstimate::Legacy { gas_price } => {
                let mut tx = TxLegacy {
                    chain_id: Some(chain_id),
                    nonce,
                    gas_price,
                    gas_limit,
                    to: TxKind::Call(request.to),
                    value: request.value,
                    input: request.data.clone(),
                };
                let signature = self
                    .inner
                    .sign_transaction_sync(&mut tx)
                    .map_err(|e| TxError::Signing(e.to_string()))?;
                TxEnvelope::from(tx.into_signed(signature))
            }
        };

        let hash = *envelope.tx_hash();
        let raw = Bytes::from(envelope.encoded_2718());

        Ok(SignedTransaction {
            raw,
            hash,
            nonce,
            from: self.address,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::eips::eip2718::Decodable2718;
    use alloy::primitives::{address, U256};

    fn populated_request() -> TransactionRequest {
        TransactionRequest {
            from: None,
            to: address!("365a8b3f57A650DE13f145263E3a5B40c43d3bCd"),
            data: Bytes::from(vec![0xa9, 0x05, 0x9c, 0xbb]),
            value: U256::ZERO,
            chain_id: Some(11155111),
            nonce: Some(7),
            gas_limit: Some(60_000),
            fees: Some(FeeEstimate::Eip1559 {
                max_fee_per_gas: 30_000_000_000,
                max_priority_fee_per_gas: 1_000_000_000,
            }),
        }
    }

    #[test]
    fn test_sign_is_deterministic() {
        let signer = Signer::random();
        let request = populated_request();

        let a = signer.sign(&request).unwrap();
        let b = signer.sign(&request).unwrap();
        assert_eq!(a.raw, b.raw);
        assert_eq!(a.hash, b.hash);
        assert_eq!(a.nonce, 7);
    }

    #[test]
    fn test_recovered_sender_matches_signer() {
        let signer = Signer::random();
        let signed = signer.sign(&populated_request()).unwrap();

        let envelope = TxEnvelope::decode_2718(&mut signed.raw.as_ref()).unwrap();
        let TxEnvelope::Eip1559(inner) = envelope else {
            panic!("expected a type-2 envelope");
        };
        assert_eq!(inner.recover_signer().unwrap(), signer.address());
    }

    #[test]
    fn test_sign_rejects_unpopulated_request() {
        let signer = Signer::random();
        let mut request = populated_request();
        request.nonce = None;

        let err = signer.sign(&request).unwrap_err();
        assert!(matches!(
            err,
            crate::error::Error::Tx(TxError::Signing(_))
        ));
    }

    #[test]
    fn test_legacy_fee_produces_legacy_envelope() {
        let signer = Signer::random();
        let mut request = populated_request();
        request.fees = Some(FeeEstimate::Legacy {
            gas_price: 20_000_000_000,
        });

        let signed = signer.sign(&request).unwrap();
        let envelope = TxEnvelope::decode_2718(&mut signed.raw.as_ref()).unwrap();
        assert!(matches!(envelope, TxEnvelope::Legacy(_)));
    }

    #[test]
    fn test_debug_redacts_key_material() {
        let signer = Signer::random();
        let debug = format!("{signer:?}");
        assert!(debug.contains("address"));
        // the debug form is bounded: address + struct name only
        assert!(debug.len() < 120);
    }
}
