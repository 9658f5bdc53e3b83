//! Event log decoding
//!
//! A [`LogDecoder`] holds the event descriptors of interest keyed by topic0
//! and turns raw [`LogEntry`] values into named, typed parameters.

use crate::abi::codec::{decode_values, Value};
use crate::abi::param::ParamType;
use crate::abi::parser::{Abi, AbiEvent};
use crate::error::{AbiError, Result};
use crate::types::LogEntry;
use alloy::primitives::B256;
use std::collections::HashMap;

/// A decoded event log
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedLog {
    /// Event name from the descriptor
    pub name: String,
    /// Parameters in declaration order
    pub params: Vec<(String, Value)>,
    /// Block the log was emitted in
    pub block_number: u64,
    /// Transaction that emitted the log
    pub transaction_hash: B256,
    /// Position within the block
    pub log_index: u64,
}

impl DecodedLog {
    /// Look up a parameter by name
    pub fn param(&self, name: &str) -> Option<&Value> {
        self.params
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
    }
}

/// Decodes logs against a set of event descriptors, matched via topic0
#[derive(Debug, Clone, Default)]
pub struct LogDecoder {
    events: HashMap<B256, AbiEvent>,
}

impl LogDecoder {
    /// Build a decoder for a single event
    pub fn from_event(event: AbiEvent) -> Self {
        let mut events = HashMap::new();
        events.insert(event.topic0(), event);
        Self { events }
    }

    /// Build a decoder for every event in an ABI
    pub fn from_abi(abi: &Abi) -> Self {
        let mut events = HashMap::new();
        for event in &abi.events {
            events.insert(event.topic0(), event.clone());
        }
        Self { events }
    }

    /// The event descriptor matching a log's topic0, if any is registered
    pub fn event_for(&self, log: &LogEntry) -> Option<&AbiEvent> {
        log.topics.first().and_then(|t| self.events.get(t))
    }

    /// Decode a single log.
    ///
    /// Fails with `AbiError::Mismatch` when topic0 matches no registered
    /// event, and `AbiError::Truncated` when the log carries fewer topics
    /// than the event's indexed parameters require.
    pub fn decode(&self, log: &LogEntry) -> Result<DecodedLog> {
        let event = self.event_for(log).ok_or_else(|| {
            AbiError::Mismatch(format!(
                "log topic0 {:?} matches no registered event",
                log.topics.first()
            ))
        })?;
        decode_log(event, log)
    }
}

/// Decode a log against one event descriptor.
///
/// Static indexed parameters decode from their topic word. Dynamic indexed
/// parameters (string/bytes/arrays) are stored on-chain as a keccak256
/// commitment only, so the 32-byte hash is surfaced as `Value::FixedBytes`.
/// Non-indexed parameters decode from the data section in declaration order.
pub fn decode_log(event: &AbiEvent, log: &LogEntry) -> Result<DecodedLog> {
    if let Some(topic0) = log.topics.first() {
        if *topic0 != event.topic0() {
            return Err(AbiError::Mismatch(format!(
                "log topic0 does not match {}",
                event.signature()
            ))
            .into());
        }
    }

    let needed_topics = 1 + event.indexed_count();
    if log.topics.len() < needed_topics {
        return Err(AbiError::Truncated {
            needed: needed_topics,
            have: log.topics.len(),
        }
        .into());
    }

    let body_types: Vec<ParamType> = event
        .inputs
        .iter()
        .filter(|p| !p.indexed)
        .map(|p| p.kind.clone())
        .collect();
    let mut body_values = decode_values(&body_types, &log.data)?.into_iter();

    let mut params = Vec::with_capacity(event.inputs.len());
    let mut topic_idx = 1usize;
    for input in &event.inputs {
        let value = if input.indexed {
            let topic = log.topics[topic_idx];
            topic_idx += 1;
            if input.kind.is_dynamic() {
                Value::FixedBytes(topic.to_vec())
            } else {
                decode_values(&[input.kind.clone()], topic.as_slice())?.remove(0)
            }
        } else {
            body_values
                .next()
                .ok_or_else(|| AbiError::Mismatch("body value count mismatch".to_string()))?
        };
        params.push((input.name.clone(), value));
    }

    Ok(DecodedLog {
        name: event.name.clone(),
        params,
        block_number: log.block_number,
        transaction_hash: log.transaction_hash,
        log_index: log.log_index,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::abi::parser::erc20_abi;
    use alloy::primitives::{address, keccak256, Address, Bytes, U256};

    fn transfer_log(from: Address, to: Address, value: U256) -> LogEntry {
        let topic0 = keccak256(b"Transfer(address,address,uint256)");
        LogEntry {
            address: address!("A0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48"),
            topics: vec![
                topic0,
                B256::left_padding_from(from.as_slice()),
                B256::left_padding_from(to.as_slice()),
            ],
            data: Bytes::from(value.to_be_bytes::<32>().to_vec()),
            block_number: 18_000_123,
            transaction_hash: B256::repeat_byte(0xab),
            log_index: 7,
        }
    }

    #[test]
    fn test_decode_transfer_log() {
        let abi = erc20_abi();
        let decoder = LogDecoder::from_abi(&abi);

        let from = address!("d8dA6BF26964aF9D7eEd9e03E53415D37aA96045");
        let to = address!("365a8b3f57A650DE13f145263E3a5B40c43d3bCd");
        let log = transfer_log(from, to, U256::from(5_000_000u64));

        let decoded = decoder.decode(&log).unwrap();
        assert_eq!(decoded.name, "Transfer");
        assert_eq!(decoded.param("from").unwrap().as_address(), Some(from));
        assert_eq!(decoded.param("to").unwrap().as_address(), Some(to));
        assert_eq!(
            decoded.param("value").unwrap().as_uint(),
            Some(U256::from(5_000_000u64))
        );
        assert_eq!(decoded.block_number, 18_000_123);
        assert_eq!(decoded.log_index, 7);
    }

    #[test]
    fn test_missing_indexed_topics_is_truncated() {
        let abi = erc20_abi();
        let event = abi.event("Transfer").unwrap();

        let from = address!("d8dA6BF26964aF9D7eEd9e03E53415D37aA96045");
        let mut log = transfer_log(from, from, U256::ZERO);
        log.topics.truncate(2); // drop the `to` topic

        let err = decode_log(event, &log).unwrap_err();
        assert!(matches!(
            err,
            crate::error::Error::Abi(AbiError::Truncated { needed: 3, have: 2 })
        ));
    }

    #[test]
    fn test_unregistered_topic0_is_mismatch() {
        let decoder = LogDecoder::from_event(
            AbiEvent::parse("event Approval(address indexed owner, address indexed spender, uint256 value)")
                .unwrap(),
        );
        let from = address!("d8dA6BF26964aF9D7eEd9e03E53415D37aA96045");
        let log = transfer_log(from, from, U256::ZERO);
        assert!(decoder.decode(&log).is_err());
    }

    #[test]
    fn test_dynamic_indexed_param_yields_hash() {
        let event =
            AbiEvent::parse("event Named(string indexed name, uint256 value)").unwrap();
        let name_hash = keccak256(b"alice");
        let log = LogEntry {
            address: Address::ZERO,
            topics: vec![event.topic0(), name_hash],
            data: Bytes::from(U256::from(1u64).to_be_bytes::<32>().to_vec()),
            block_number: 1,
            transaction_hash: B256::ZERO,
            log_index: 0,
        };

        let decoded = decode_log(&event, &log).unwrap();
        assert_eq!(
            decoded.param("name").unwrap(),
            &Value::FixedBytes(name_hash.to_vec())
        );
    }
}
