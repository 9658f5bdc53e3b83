//! Event log query engine tests against a scripted provider
//!
//! The mock enforces the same block-span and result-count caps hosted
//! providers do, so the windowing and bisection behavior is exercised end to
//! end without a network.

mod common;

use common::{mock_client, parse_quantity, MockTransport};
use eth_contract_client::{
    erc20_abi, AbiEvent, ConfigError, Error, FetchOptions, Filter, LogEntry, LogFetcher,
    RpcError, Topic, Value,
};
use alloy::primitives::{address, keccak256, Address, Bytes, B256, U256};

fn transfer_topic0() -> B256 {
    keccak256(b"Transfer(address,address,uint256)")
}

fn transfer_log(block: u64, index: u64, value: u64) -> LogEntry {
    let from = address!("d8dA6BF26964aF9D7eEd9e03E53415D37aA96045");
    let to = address!("365a8b3f57A650DE13f145263E3a5B40c43d3bCd");
    LogEntry {
        address: address!("A0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48"),
        topics: vec![
            transfer_topic0(),
            B256::left_padding_from(from.as_slice()),
            B256::left_padding_from(to.as_slice()),
        ],
        data: Bytes::from(U256::from(value).to_be_bytes::<32>().to_vec()),
        block_number: block,
        transaction_hash: keccak256(format!("tx-{block}-{index}").as_bytes()),
        log_index: index,
    }
}

/// Serve `chain` filtered by the requested range, enforcing provider caps
fn serve_logs(
    chain: Vec<LogEntry>,
    max_span: Option<u64>,
    max_results: Option<usize>,
) -> impl Fn(&[serde_json::Value]) -> eth_contract_client::Result<serde_json::Value> {
    move |params: &[serde_json::Value]| {
        let filter = &params[0];
        let from = parse_quantity(&filter["fromBlock"]);
        let to = parse_quantity(&filter["toBlock"]);

        if let Some(cap) = max_span {
            if to - from + 1 > cap {
                return Err(RpcError::BlockRangeTooLarge(format!(
                    "block range is too large: max {cap} blocks"
                ))
                .into());
            }
        }

        let matching: Vec<&LogEntry> = chain
            .iter()
            .filter(|log| log.block_number >= from && log.block_number <= to)
            .collect();

        if let Some(cap) = max_results {
            if matching.len() > cap {
                return Err(RpcError::ResponseTooLarge(format!(
                    "query returned more than {cap} results"
                ))
                .into());
            }
        }

        Ok(serde_json::to_value(matching).unwrap())
    }
}

#[tokio::test]
async fn windowed_query_issues_expected_subranges() {
    let chain = vec![
        transfer_log(150, 0, 1),
        transfer_log(2100, 3, 2),
        transfer_log(4100, 1, 3),
        transfer_log(6100, 0, 4),
    ];
    let transport = MockTransport::new().on("eth_getLogs", serve_logs(chain, Some(2000), None));

    let holder = Topic::address(address!("365a8b3f57A650DE13f145263E3a5B40c43d3bCd"));
    let filter = Filter::new()
        .address(address!("A0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48"))
        .event_signature(transfer_topic0())
        .topic(2, Some(holder))
        .from_block(100)
        .to_block(6100);

    let fetcher = LogFetcher::new(mock_client(transport.clone()))
        .with_options(FetchOptions::default().with_chunk_size(2000).with_concurrency(1));
    let logs = fetcher.fetch_all(&filter).await.unwrap();

    // exactly the four sub-ranges a 2000-block cap allows
    let ranges: Vec<(u64, u64)> = transport
        .calls_for("eth_getLogs")
        .iter()
        .map(|params| {
            (
                parse_quantity(&params[0]["fromBlock"]),
                parse_quantity(&params[0]["toBlock"]),
            )
        })
        .collect();
    assert_eq!(
        ranges,
        vec![(100, 2099), (2100, 4099), (4100, 6099), (6100, 6100)]
    );

    let blocks: Vec<u64> = logs.iter().map(|l| l.block_number).collect();
    assert_eq!(blocks, vec![150, 2100, 4100, 6100]);
}

#[tokio::test]
async fn windowed_query_equals_unbounded_query() {
    // a denser synthetic chain; compare the windowed merge against the same
    // filter served with no caps at all
    let mut chain = Vec::new();
    for block in (0..50).map(|i| i * 97) {
        for index in 0..3 {
            chain.push(transfer_log(block, index, block + index));
        }
    }

    let capped =
        MockTransport::new().on("eth_getLogs", serve_logs(chain.clone(), Some(300), Some(20)));
    let unbounded = MockTransport::new().on("eth_getLogs", serve_logs(chain, None, None));

    let filter = Filter::new().from_block(0).to_block(5000);

    let windowed = LogFetcher::new(mock_client(capped))
        .with_options(FetchOptions::default().with_chunk_size(1000).with_concurrency(3))
        .fetch_all(&filter)
        .await
        .unwrap();
    let reference = LogFetcher::new(mock_client(unbounded))
        .with_options(FetchOptions::default().with_chunk_size(1_000_000))
        .fetch_all(&filter)
        .await
        .unwrap();

    assert_eq!(windowed, reference);

    // ascending (block, index) with no duplicates
    for pair in windowed.windows(2) {
        assert!(
            (pair[0].block_number, pair[0].log_index)
                < (pair[1].block_number, pair[1].log_index)
        );
    }
}

#[tokio::test]
async fn bisection_narrows_until_provider_accepts() {
    let chain: Vec<LogEntry> = (1000..1016).map(|b| transfer_log(b, 0, b)).collect();
    let transport =
        MockTransport::new().on("eth_getLogs", serve_logs(chain, None, Some(2)));

    let filter = Filter::new().from_block(1000).to_block(1015);
    let fetcher = LogFetcher::new(mock_client(transport.clone()))
        .with_options(FetchOptions::default().with_chunk_size(16).with_concurrency(1));

    let logs = fetcher.fetch_all(&filter).await.unwrap();
    assert_eq!(logs.len(), 16);
    let blocks: Vec<u64> = logs.iter().map(|l| l.block_number).collect();
    assert_eq!(blocks, (1000..1016).collect::<Vec<_>>());

    // the provider rejected the wide spans, so more than one call per final
    // accepted sub-range was needed
    assert!(transport.call_count("eth_getLogs") > 8);
}

#[tokio::test]
async fn single_block_failure_is_fatal() {
    let transport = MockTransport::new().on("eth_getLogs", |_params| {
        Err(RpcError::ResponseTooLarge("query returned more than 10000 results".to_string()).into())
    });

    let filter = Filter::new().from_block(500).to_block(503);
    let fetcher = LogFetcher::new(mock_client(transport.clone()))
        .with_options(FetchOptions::default().with_chunk_size(4).with_concurrency(1));

    let err = fetcher.fetch_all(&filter).await.unwrap_err();
    assert!(matches!(err, Error::Rpc(RpcError::ResponseTooLarge(_))));
}

#[tokio::test]
async fn invalid_range_rejected_before_any_call() {
    let transport = MockTransport::new();
    let fetcher = LogFetcher::new(mock_client(transport.clone()));

    let filter = Filter::new().from_block(2000).to_block(100);
    let err = fetcher.fetch_all(&filter).await.unwrap_err();
    assert!(matches!(
        err,
        Error::Config(ConfigError::InvalidRange { from: 2000, to: 100 })
    ));
    assert!(transport.calls().is_empty());
}

#[tokio::test]
async fn rate_limit_retries_then_succeeds() {
    let chain = vec![transfer_log(42, 0, 1)];
    let transport = MockTransport::new()
        .on("eth_getLogs", serve_logs(chain, None, None))
        .push(
            "eth_getLogs",
            Err(RpcError::RateLimited("rate limit exceeded".to_string()).into()),
        );

    let filter = Filter::new().from_block(0).to_block(100);
    let logs = LogFetcher::new(mock_client(transport.clone()))
        .fetch_all(&filter)
        .await
        .unwrap();

    assert_eq!(logs.len(), 1);
    assert_eq!(transport.call_count("eth_getLogs"), 2);
}

#[tokio::test]
async fn decoded_stream_skips_unregistered_events_and_restarts() {
    let unknown_event = AbiEvent::parse("event Paused(address account)").unwrap();
    let mut unknown = transfer_log(10, 0, 1);
    unknown.topics = vec![unknown_event.topic0()];
    unknown.data = Bytes::from(
        B256::left_padding_from(Address::ZERO.as_slice()).to_vec(),
    );

    let chain = vec![transfer_log(5, 0, 777), unknown, transfer_log(20, 1, 888)];
    let transport = MockTransport::new().on("eth_getLogs", serve_logs(chain, None, None));

    let abi = erc20_abi();
    let fetcher = LogFetcher::new(mock_client(transport)).with_abi(&abi);
    let logs = fetcher
        .fetch_all(&Filter::new().from_block(0).to_block(100))
        .await
        .unwrap();
    assert_eq!(logs.len(), 3);

    let decoded: Vec<_> = fetcher.decoded(&logs).collect::<Result<_, _>>().unwrap();
    assert_eq!(decoded.len(), 2);
    assert_eq!(decoded[0].name, "Transfer");
    assert_eq!(
        decoded[0].param("value").unwrap(),
        &Value::Uint(U256::from(777u64))
    );
    assert_eq!(
        decoded[1].param("value").unwrap(),
        &Value::Uint(U256::from(888u64))
    );

    // the sequence is restartable
    assert_eq!(fetcher.decoded(&logs).count(), 2);
}
