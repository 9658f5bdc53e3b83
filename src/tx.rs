//! Transaction lifecycle manager
//!
//! One submission attempt moves through explicit stages, each returning a
//! value the caller inspects before the next chain-mutating step:
//!
//! ```text
//! TransactionRequest --prepare--> PreparedTx --sign_and_send--> PendingTx --wait--> TxOutcome
//!                      (simulate,                (nonce, sign,               (Confirmed |
//!                       estimate, fees)           broadcast)                  Reverted)
//! ```
//!
//! Failures before `sign_and_send` never consume a nonce. A timed-out or
//! replaced submission surfaces as an error and leaves its nonce reserved;
//! fee bumping and resubmission are caller policy, never implicit.

use crate::abi::Value;
use crate::client::EthClient;
use crate::contract::Contract;
use crate::error::{Error, Result, RpcError, TxError};
use crate::signer::Signer;
use crate::types::{TransactionReceipt, TransactionRequest};
use alloy::primitives::{B256, U256};
use std::time::Duration;
use tokio::time::Instant;

/// Knobs for one submission attempt
#[derive(Debug, Clone)]
pub struct TxOptions {
    /// Run an `eth_call` dry run before estimation. A failing simulation
    /// stops the lifecycle with `ExecutionReverted` before any gas is spent
    /// or nonce consumed.
    pub simulate: bool,
    /// Blocks that must be mined on top of the receipt's block
    pub confirmations: u64,
    /// Safety margin added to the gas estimate, in percent
    pub gas_margin_percent: u64,
    /// Give up polling for a receipt after this long
    pub timeout: Duration,
    /// Initial delay between receipt polls; doubles up to the cap
    pub poll_interval: Duration,
    pub max_poll_interval: Duration,
}

impl Default for TxOptions {
    fn default() -> Self {
        Self {
            simulate: true,
            confirmations: 1,
            gas_margin_percent: 20,
            timeout: Duration::from_secs(120),
            poll_interval: Duration::from_secs(2),
            max_poll_interval: Duration::from_secs(16),
        }
    }
}

impl TxOptions {
    pub fn with_simulate(mut self, simulate: bool) -> Self {
        self.simulate = simulate;
        self
    }

    pub fn with_confirmations(mut self, confirmations: u64) -> Self {
        self.confirmations = confirmations;
        self
    }

    pub fn with_gas_margin_percent(mut self, percent: u64) -> Self {
        self.gas_margin_percent = percent;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }
}

/// Terminal states of a mined submission
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TxOutcome {
    /// Receipt with success status and the requested confirmation depth
    Confirmed(TransactionReceipt),
    /// Receipt with reverted status
    Reverted(TransactionReceipt),
}

impl TxOutcome {
    pub fn receipt(&self) -> &TransactionReceipt {
        match self {
            TxOutcome::Confirmed(r) | TxOutcome::Reverted(r) => r,
        }
    }

    pub fn is_confirmed(&self) -> bool {
        matches!(self, TxOutcome::Confirmed(_))
    }
}

/// A request that passed simulation and carries gas and fee fields, but no
/// nonce yet
#[derive(Debug, Clone)]
pub struct PreparedTx {
    request: TransactionRequest,
    pub gas_estimate: u64,
}

impl PreparedTx {
    pub fn request(&self) -> &TransactionRequest {
        &self.request
    }
}

/// A broadcast transaction being polled for its receipt
#[derive(Debug)]
pub struct PendingTx {
    pub hash: B256,
    pub nonce: u64,
    from: alloy::primitives::Address,
    client: EthClient,
    options: TxOptions,
}

/// Drives write submissions for one signer
pub struct TxSender<'a> {
    client: &'a EthClient,
    signer: &'a Signer,
    options: TxOptions,
}

impl<'a> TxSender<'a> {
    pub fn new(client: &'a EthClient, signer: &'a Signer) -> Self {
        Self {
            client,
            signer,
            options: TxOptions::default(),
        }
    }

    pub fn with_options(mut self, options: TxOptions) -> Self {
        self.options = options;
        self
    }

    /// Simulate (optionally), estimate gas, and fill fee fields.
    ///
    /// Estimation runs exactly once per submission attempt, and failures
    /// here return to the caller before any nonce is allocated.
    pub async fn prepare(&self, mut request: TransactionRequest) -> Result<PreparedTx> {
        request.from = Some(self.signer.address());
        if request.chain_id.is_none() {
            request.chain_id = Some(self.client.chain_id());
        }

        let call = {
            let mut call = request.as_call();
            call.from = Some(self.signer.address());
            call
        };

        if self.options.simulate {
            self.client
                .call(&call, crate::types::BlockTag::Latest)
                .await?;
            tracing::debug!(to = %request.to, "simulation passed");
        }

        let gas_estimate = match self.client.estimate_gas(&call).await {
            Ok(gas) => gas,
            Err(Error::Rpc(RpcError::ExecutionReverted { reason })) => {
                return Err(TxError::GasEstimationFailed { reason }.into())
            }
            Err(e) => return Err(e),
        };
        let gas_limit = apply_gas_margin(gas_estimate, self.options.gas_margin_percent);
        request.gas_limit = Some(gas_limit);
        request.fees = Some(self.client.fee_estimate().await?);

        tracing::debug!(gas_estimate, gas_limit, "transaction prepared");

        Ok(PreparedTx {
            request,
            gas_estimate,
        })
    }

    /// Reserve a nonce, sign, and broadcast. Nonce reservation and signing
    /// are the single point requiring mutual exclusion within one process.
    pub async fn sign_and_send(&self, prepared: PreparedTx) -> Result<PendingTx> {
        let mut request = prepared.request;
        let nonce = self.signer.next_nonce(self.client).await?;
        request.nonce = Some(nonce);

        let signed = self.signer.sign(&request)?;
        let reported = self.client.send_raw_transaction(&signed.raw).await?;
        if reported != signed.hash {
            // the locally computed hash is authoritative for polling
            tracing::warn!(local = %signed.hash, %reported, "node reported a different tx hash");
        }

        tracing::info!(hash = %signed.hash, nonce, "transaction submitted");

        Ok(PendingTx {
            hash: signed.hash,
            nonce,
            from: signed.from,
            client: self.client.clone(),
            options: self.options.clone(),
        })
    }

    /// prepare + sign_and_send
    pub async fn send(&self, request: TransactionRequest) -> Result<PendingTx> {
        let prepared = self.prepare(request).await?;
        self.sign_and_send(prepared).await
    }

    /// Full lifecycle for a contract write: build, populate, submit, confirm
    pub async fn execute(
        &self,
        contract: &Contract,
        function_name: &str,
        args: &[Value],
        value: Option<U256>,
    ) -> Result<TxOutcome> {
        let function = contract.function(function_name)?.clone();
        let call = contract.build_call(&function, args, value)?;
        let request = contract.populate_transaction(&call, self.signer.address());
        let pending = self.send(request).await?;
        pending.wait().await
    }
}

impl PendingTx {
    /// Poll until the receipt reaches the requested confirmation depth.
    ///
    /// Polling sleeps between attempts with doubling backoff; the future can
    /// be dropped (or raced against a cancellation signal) at any point
    /// without side effects on chain state. Exceeding the timeout yields
    /// `TxError::TimedOut` and leaves the nonce reserved.
    pub async fn wait(&self) -> Result<TxOutcome> {
        let started = Instant::now();
        let mut interval = self.options.poll_interval;

        loop {
            if let Some(receipt) = self.client.transaction_receipt(self.hash).await? {
                if receipt.transaction_hash != self.hash {
                    return Err(RpcError::InvalidResponse(format!(
                        "receipt hash {} does not match transaction {}",
                        receipt.transaction_hash, self.hash
                    ))
                    .into());
                }

                if !receipt.succeeded() {
                    tracing::warn!(hash = %self.hash, "transaction reverted on-chain");
                    return Ok(TxOutcome::Reverted(receipt));
                }

                let head = self.client.block_number().await?;
                if head >= receipt.block_number + self.options.confirmations {
                    tracing::info!(
                        hash = %self.hash,
                        block = receipt.block_number,
                        "transaction confirmed"
                    );
                    return Ok(TxOutcome::Confirmed(receipt));
                }
                tracing::debug!(
                    hash = %self.hash,
                    head,
                    target = receipt.block_number + self.options.confirmations,
                    "waiting for confirmations"
                );
            } else {
                self.check_replacement().await?;
            }

            if started.elapsed() >= self.options.timeout {
                return Err(TxError::TimedOut {
                    hash: self.hash.to_string(),
                    waited_secs: started.elapsed().as_secs(),
                }
                .into());
            }

            tokio::time::sleep(interval).await;
            interval = (interval * 2).min(self.options.max_poll_interval);
        }
    }

    /// Detect the replaced-nonce case: the sender's confirmed nonce has
    /// passed ours, our hash has no receipt, and the node no longer knows
    /// the transaction. Without this check a replaced submission would poll
    /// until timeout and report the wrong condition.
    async fn check_replacement(&self) -> Result<()> {
        let confirmed_count = self
            .client
            .transaction_count(self.from, crate::types::BlockTag::Latest)
            .await?;
        if confirmed_count <= self.nonce {
            return Ok(());
        }

        // our nonce was consumed; make sure it wasn't by us in this instant
        if self.client.transaction_receipt(self.hash).await?.is_some() {
            return Ok(());
        }
        if self.client.transaction_by_hash(self.hash).await?.is_none() {
            return Err(TxError::Replaced {
                hash: self.hash.to_string(),
                nonce: self.nonce,
            }
            .into());
        }
        Ok(())
    }
}

/// Gas limit with the configured safety margin applied
fn apply_gas_margin(estimate: u64, percent: u64) -> u64 {
    let margin = (estimate as u128 * percent as u128) / 100;
    estimate.saturating_add(margin.min(u64::MAX as u128) as u64)
}
