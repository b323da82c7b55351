#![cfg(feature = "node-tests")]
#![expect(
    clippy::unwrap_used,
    clippy::expect_used,
    reason = "Test-only assertions use unwrap/expect for clarity."
)]

//! Behavioural suites against a real node. Requires `--features node-tests`
//! and `HARNESS_NODE_BINARY`; suites run one at a time on the fixed ports.

use evm_harness::run_suite;
use evm_harness::run_suite_ws;
use evm_harness::telemetry;
use evm_harness_rpc::BlockTag;
use evm_harness_rpc::TraceOptions;
use evm_harness_rpc::TransportKind;
use serde_json::Value;
use serde_json::json;

const HELLO_HEX: &str = "0x68656c6c6f";
const HELLO_KECCAK: &str = "0x1c8aff950685c2ed4bc3174f3472287b56d9517b9c948127319a09a7a36deac8";

fn block_number_of(block: &Value) -> u64 {
    evm_harness_rpc::quantity::parse_u64(&block["number"]).expect("block number")
}

#[tokio::test]
async fn web3_api() {
    telemetry::init_for_tests();
    run_suite("Web3Api", TransportKind::Http, |ctx| async move {
        let version = ctx.evm().client_version().await.unwrap();
        assert!(!version.is_empty());

        assert_eq!(ctx.evm().sha3(HELLO_HEX).await.unwrap(), HELLO_KECCAK);

        let response = ctx
            .raw()
            .request("web3_sha3", json!([HELLO_HEX]))
            .await
            .unwrap();
        assert!(response.error.is_none());
        assert_eq!(response.result, Some(json!(HELLO_KECCAK)));
    })
    .await
    .unwrap();
}

#[tokio::test]
async fn block_number_tags() {
    telemetry::init_for_tests();
    run_suite("BlockNumber tags", TransportKind::Http, |ctx| async move {
        ctx.generate(1).await.unwrap();
        ctx.generate(1).await.unwrap();

        let earliest = ctx.evm().get_block(BlockTag::Earliest, false).await.unwrap();
        assert_eq!(block_number_of(&earliest.unwrap()), 0);

        let latest = ctx
            .evm()
            .get_block(BlockTag::Latest, false)
            .await
            .unwrap()
            .unwrap();
        let finalized = ctx
            .evm()
            .get_block(BlockTag::Finalized, false)
            .await
            .unwrap()
            .unwrap();
        let safe = ctx
            .evm()
            .get_block(BlockTag::Safe, false)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(block_number_of(&latest), 3);
        assert!(block_number_of(&finalized) <= block_number_of(&latest));
        assert_eq!(block_number_of(&safe), block_number_of(&finalized));
    })
    .await
    .unwrap();
}

#[tokio::test]
async fn block_number_advances_by_minted_count() {
    telemetry::init_for_tests();
    run_suite("BlockNumber", TransportKind::Http, |ctx| async move {
        assert_eq!(ctx.evm().block_number().await.unwrap(), 1);
        let outcome = ctx.generate(5).await.unwrap();
        assert_eq!(outcome.achieved, 5);
        assert_eq!(ctx.evm().block_number().await.unwrap(), 6);
    })
    .await
    .unwrap();
}

#[tokio::test]
async fn block_by_number_and_hash() {
    telemetry::init_for_tests();
    run_suite("Block", TransportKind::Http, |ctx| async move {
        ctx.generate(1).await.unwrap();
        let by_number = ctx
            .evm()
            .get_block(BlockTag::Number(2), false)
            .await
            .unwrap()
            .expect("block 2");
        let hash = by_number["hash"].as_str().expect("block hash").to_string();

        let by_hash = ctx
            .evm()
            .get_block_by_hash(&hash, false)
            .await
            .unwrap()
            .expect("block by hash");
        assert_eq!(by_hash["number"], by_number["number"]);
        assert_eq!(by_hash["parentHash"], by_number["parentHash"]);

        let missing = ctx
            .evm()
            .get_block(BlockTag::Number(10_000), false)
            .await
            .unwrap();
        assert!(missing.is_none());
    })
    .await
    .unwrap();
}

#[tokio::test]
async fn trace_empty_block_with_call_tracer() {
    telemetry::init_for_tests();
    run_suite("TraceBlock", TransportKind::Http, |ctx| async move {
        ctx.generate(1).await.unwrap();
        let number = ctx.evm().block_number().await.unwrap();
        let traces = ctx
            .evm()
            .trace_block_by_number(BlockTag::Number(number), &TraceOptions::call_tracer())
            .await
            .unwrap();
        assert_eq!(traces, json!([]));
    })
    .await
    .unwrap();
}

#[tokio::test]
async fn websocket_transport_serves_queries() {
    telemetry::init_for_tests();
    run_suite_ws("Web3Api over ws", |ctx| async move {
        assert_eq!(ctx.transport_kind(), TransportKind::Ws);
        assert_eq!(ctx.evm().block_number().await.unwrap(), 1);
        assert_eq!(ctx.evm().sha3(HELLO_HEX).await.unwrap(), HELLO_KECCAK);
    })
    .await
    .unwrap();
}

#[tokio::test]
async fn chain_height_rises_by_minted_count() {
    telemetry::init_for_tests();
    run_suite("Chain height", TransportKind::Http, |ctx| async move {
        let before = ctx.chain().get_block_count().await.unwrap();

        let outcome = ctx.generate(4).await.unwrap();
        assert_eq!(outcome.achieved, 4);
        assert_eq!(ctx.chain().get_block_count().await.unwrap(), before + 4);

        ctx.generate_no_wait().await.unwrap();
        assert!(ctx.chain().get_block_count().await.unwrap() >= before + 4);
    })
    .await
    .unwrap();
}

#[tokio::test]
async fn max_priority_fee_is_zero_without_transactions() {
    telemetry::init_for_tests();
    run_suite("Max priority fee", TransportKind::Http, |ctx| async move {
        let response = ctx
            .raw()
            .request("eth_maxPriorityFeePerGas", json!([]))
            .await
            .unwrap();
        assert_eq!(response.result, Some(json!("0x0")));

        ctx.generate(1).await.unwrap();
        let response = ctx
            .raw()
            .request("eth_maxPriorityFeePerGas", json!([]))
            .await
            .unwrap();
        assert_eq!(response.result, Some(json!("0x0")));
        assert_eq!(ctx.evm().max_priority_fee_per_gas().await.unwrap(), 0);
    })
    .await
    .unwrap();
}

#[tokio::test]
async fn unknown_method_comes_back_as_error_envelope() {
    telemetry::init_for_tests();
    run_suite("Raw errors", TransportKind::Http, |ctx| async move {
        let response = ctx
            .raw()
            .request("debug_notAMethod", json!([]))
            .await
            .unwrap();
        let error = response.error.expect("error object");
        assert_eq!(error.code, -32601);
        assert_eq!(response.result, None);
    })
    .await
    .unwrap();
}
