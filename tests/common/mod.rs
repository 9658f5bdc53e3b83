//! Shared test transport
//!
//! A scripted [`Transport`] implementation: per-method handlers plus
//! single-shot queued responses, with every call recorded for assertions on
//! wire traffic.

#![allow(dead_code)]

use async_trait::async_trait;
use eth_contract_client::{EthClient, NetworkDescriptor, Result, Transport};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

type Handler = Box<dyn Fn(&[serde_json::Value]) -> Result<serde_json::Value> + Send + Sync>;

#[derive(Default)]
pub struct MockTransport {
    handlers: Mutex<HashMap<String, Handler>>,
    queues: Mutex<HashMap<String, VecDeque<Result<serde_json::Value>>>>,
    calls: Mutex<Vec<(String, Vec<serde_json::Value>)>>,
}

impl MockTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Install a handler invoked for every call to `method`
    pub fn on<F>(self: &Arc<Self>, method: &str, handler: F) -> Arc<Self>
    where
        F: Fn(&[serde_json::Value]) -> Result<serde_json::Value> + Send + Sync + 'static,
    {
        self.handlers
            .lock()
            .unwrap()
            .insert(method.to_string(), Box::new(handler));
        self.clone()
    }

    /// Install a fixed response for every call to `method`
    pub fn on_value(self: &Arc<Self>, method: &str, value: serde_json::Value) -> Arc<Self> {
        self.on(method, move |_| Ok(value.clone()))
    }

    /// Queue a single-shot response consumed before any handler
    pub fn push(self: &Arc<Self>, method: &str, response: Result<serde_json::Value>) -> Arc<Self> {
        self.queues
            .lock()
            .unwrap()
            .entry(method.to_string())
            .or_default()
            .push_back(response);
        self.clone()
    }

    /// Every recorded call in issue order
    pub fn calls(&self) -> Vec<(String, Vec<serde_json::Value>)> {
        self.calls.lock().unwrap().clone()
    }

    /// Recorded parameter lists for one method
    pub fn calls_for(&self, method: &str) -> Vec<Vec<serde_json::Value>> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(m, _)| m == method)
            .map(|(_, params)| params.clone())
            .collect()
    }

    pub fn call_count(&self, method: &str) -> usize {
        self.calls_for(method).len()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn call(
        &self,
        method: &str,
        params: Vec<serde_json::Value>,
    ) -> Result<serde_json::Value> {
        self.calls
            .lock()
            .unwrap()
            .push((method.to_string(), params.clone()));

        if let Some(queue) = self.queues.lock().unwrap().get_mut(method) {
            if let Some(response) = queue.pop_front() {
                return response;
            }
        }

        let handlers = self.handlers.lock().unwrap();
        match handlers.get(method) {
            Some(handler) => handler(&params),
            None => panic!("no mock response configured for {method}"),
        }
    }
}

/// A client session over the mock, pinned to a local test chain id
pub fn mock_client(transport: Arc<MockTransport>) -> EthClient {
    EthClient::with_transport(
        NetworkDescriptor::new(31337, "testnet", "mock://local"),
        transport,
    )
}

/// Hex quantity wire form
pub fn quantity(n: u64) -> serde_json::Value {
    serde_json::Value::String(format!("0x{n:x}"))
}

/// Parse a hex quantity out of mock call parameters
pub fn parse_quantity(value: &serde_json::Value) -> u64 {
    let s = value.as_str().expect("quantity must be a string");
    u64::from_str_radix(s.trim_start_matches("0x"), 16).expect("quantity must be hex")
}
