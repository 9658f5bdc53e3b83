//! Windowed event log queries
//!
//! Providers cap the block span and result count of a single `eth_getLogs`
//! call. [`LogFetcher`] executes a logical "logs matching F over [a, b]"
//! query by splitting the range into fixed-width chunks, issuing them with
//! bounded concurrency, and adaptively bisecting any chunk the provider
//! rejects as too large. Results merge into one ascending sequence.

use crate::abi::{Abi, DecodedLog, LogDecoder};
use crate::client::EthClient;
use crate::error::{ConfigError, Error, Result, RpcError};
use crate::types::{BlockTag, Filter, LogEntry};
use futures::stream::{self, StreamExt, TryStreamExt};
use std::time::Duration;

/// Tuning for the query engine
#[derive(Debug, Clone)]
pub struct FetchOptions {
    /// Initial sub-range width in blocks
    pub chunk_size: u64,
    /// Sub-ranges in flight at once
    pub concurrency: usize,
    /// Retries per chunk on rate limiting before giving up
    pub max_retries: u32,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            chunk_size: 2000,
            concurrency: 4,
            max_retries: 3,
        }
    }
}

impl FetchOptions {
    pub fn with_chunk_size(mut self, chunk_size: u64) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }
}

/// Executes windowed log queries against one client
pub struct LogFetcher {
    client: EthClient,
    options: FetchOptions,
    decoder: Option<LogDecoder>,
}

impl LogFetcher {
    pub fn new(client: EthClient) -> Self {
        Self {
            client,
            options: FetchOptions::default(),
            decoder: None,
        }
    }

    pub fn with_options(mut self, options: FetchOptions) -> Self {
        self.options = options;
        self
    }

    /// Register every event in an ABI for decoding
    pub fn with_abi(mut self, abi: &Abi) -> Self {
        self.decoder = Some(LogDecoder::from_abi(abi));
        self
    }

    pub fn with_decoder(mut self, decoder: LogDecoder) -> Self {
        self.decoder = Some(decoder);
        self
    }

    /// Fetch every log matching the filter, ordered ascending by
    /// (block number, log index).
    ///
    /// Sub-ranges are disjoint and half-open at the chunk boundary, so the
    /// merged sequence cannot contain duplicates.
    pub async fn fetch_all(&self, filter: &Filter) -> Result<Vec<LogEntry>> {
        let from = filter.from_block;
        if let BlockTag::Number(to) = filter.to_block {
            if from > to {
                return Err(ConfigError::InvalidRange { from, to }.into());
            }
        }

        let to = match filter.to_block {
            BlockTag::Number(n) => n,
            BlockTag::Latest | BlockTag::Pending => self.client.block_number().await?,
        };
        if from > to {
            return Err(ConfigError::InvalidRange { from, to }.into());
        }

        let chunks = calculate_chunks(from, to, self.options.chunk_size);
        tracing::info!(
            from,
            to,
            chunks = chunks.len(),
            "fetching logs over windowed range"
        );

        let results: Vec<Vec<LogEntry>> = stream::iter(chunks)
            .map(|(chunk_from, chunk_to)| self.fetch_chunk_with_split(filter, chunk_from, chunk_to))
            .buffer_unordered(self.options.concurrency)
            .try_collect()
            .await?;

        let mut all_logs: Vec<LogEntry> = results.into_iter().flatten().collect();
        all_logs.sort_by(|a, b| {
            (a.block_number, a.log_index).cmp(&(b.block_number, b.log_index))
        });

        Ok(all_logs)
    }

    /// Fetch and decode in one pass, skipping logs whose topic0 matches no
    /// registered event.
    pub async fn fetch_decoded(&self, filter: &Filter) -> Result<Vec<DecodedLog>> {
        let logs = self.fetch_all(filter).await?;
        self.decoded(&logs).collect()
    }

    /// Lazily decode an already-fetched sequence. The iterator is cheap to
    /// restart; nothing is consumed from `logs`.
    pub fn decoded<'a>(
        &'a self,
        logs: &'a [LogEntry],
    ) -> impl Iterator<Item = Result<DecodedLog>> + 'a {
        logs.iter().filter_map(move |log| {
            let decoder = self.decoder.as_ref()?;
            decoder.event_for(log)?;
            Some(decoder.decode(log))
        })
    }

    /// Fetch one chunk, adaptively narrowing on provider size limits.
    ///
    /// On a range/result-cap error the failing span is halved and the front
    /// half retried; once the span is a single block any further size error
    /// is surfaced verbatim. Rate limits back off exponentially up to
    /// `max_retries`; every other error propagates immediately.
    async fn fetch_chunk_with_split(
        &self,
        filter: &Filter,
        from: u64,
        to: u64,
    ) -> Result<Vec<LogEntry>> {
        let mut current_from = from;
        let mut current_to = to;
        let mut all_logs = Vec::new();
        let mut retries = 0u32;

        while current_from <= to {
            match self.client.get_logs(filter, current_from, current_to).await {
                Ok(logs) => {
                    all_logs.extend(logs);
                    current_from = current_to + 1;
                    current_to = to;
                    retries = 0;
                }
                Err(e @ Error::Rpc(RpcError::BlockRangeTooLarge(_)))
                | Err(e @ Error::Rpc(RpcError::ResponseTooLarge(_))) => {
                    if current_from == current_to {
                        // width 1: nothing left to split
                        return Err(e);
                    }
                    let mid = current_from + (current_to - current_from) / 2;
                    tracing::debug!(
                        from = current_from,
                        to = current_to,
                        new_to = mid,
                        "provider rejected range, bisecting"
                    );
                    current_to = mid;
                }
                Err(e @ Error::Rpc(RpcError::RateLimited(_))) => {
                    retries += 1;
                    if retries > self.options.max_retries {
                        return Err(e);
                    }
                    let backoff = Duration::from_millis(500 * 2u64.pow(retries));
                    tracing::debug!(?backoff, retries, "rate limited, backing off");
                    tokio::time::sleep(backoff).await;
                }
                Err(e) => return Err(e),
            }
        }

        Ok(all_logs)
    }
}

/// Split `[from, to]` into inclusive sub-ranges at most `max_range` wide
fn calculate_chunks(from: u64, to: u64, max_range: u64) -> Vec<(u64, u64)> {
    let max_range = max_range.max(1);
    let mut chunks = Vec::new();
    let mut current = from;

    while current <= to {
        let chunk_end = current.saturating_add(max_range - 1).min(to);
        chunks.push((current, chunk_end));
        if chunk_end == u64::MAX {
            break;
        }
        current = chunk_end + 1;
    }

    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_calculate_chunks() {
        let chunks = calculate_chunks(0, 100, 30);
        assert_eq!(chunks, vec![(0, 29), (30, 59), (60, 89), (90, 100)]);

        let chunks = calculate_chunks(0, 10, 100);
        assert_eq!(chunks, vec![(0, 10)]);

        let chunks = calculate_chunks(50, 50, 10);
        assert_eq!(chunks, vec![(50, 50)]);
    }

    #[test]
    fn test_chunks_for_capped_provider_scenario() {
        // [100, 6100] against a 2000-block cap: four sub-ranges, the last a
        // single block
        let chunks = calculate_chunks(100, 6100, 2000);
        assert_eq!(
            chunks,
            vec![(100, 2099), (2100, 4099), (4100, 6099), (6100, 6100)]
        );
    }

    #[test]
    fn test_chunks_cover_range_exactly() {
        let chunks = calculate_chunks(7, 9999, 1234);
        assert_eq!(chunks.first().unwrap().0, 7);
        assert_eq!(chunks.last().unwrap().1, 9999);
        for pair in chunks.windows(2) {
            assert_eq!(pair[0].1 + 1, pair[1].0);
        }
    }

    #[test]
    fn test_fetch_options_builders() {
        let options = FetchOptions::default()
            .with_chunk_size(500)
            .with_concurrency(0)
            .with_max_retries(1);
        assert_eq!(options.chunk_size, 500);
        // concurrency is clamped to at least one in-flight request
        assert_eq!(options.concurrency, 1);
        assert_eq!(options.max_retries, 1);
    }
}
