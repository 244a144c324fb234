//! /v0/status 流程测试
//!
//! 覆盖：准入幂等、欠付分类、未知前缀分类、404 与坏 id。

mod common;

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use ethers::types::U256;
use ironrelay::{api, codec::ExecutionRequest};
use tower::ServiceExt;

use common::*;

/// 本套报价参数下 gasLimit=1000 的完整估算值
const EXPECTED_ESTIMATE: u64 = 10_000_266_666;

async fn get(app: axum::Router, uri: &str) -> (StatusCode, serde_json::Value) {
    let response = app
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
    (status, value)
}

#[tokio::test]
async fn status_admits_once_and_is_idempotent() {
    let harness = test_harness();
    let rfe = signed_rfe(
        &harness.state,
        &sample_vaa_request(),
        U256::from(EXPECTED_ESTIMATE),
    );
    harness.src_adapter.set_request(Some(rfe));

    let id = evm_request_id(SRC_CHAIN, 0x11, 0);
    let app = api::routes(harness.state.clone());

    let (status1, body1) = get(app.clone(), &format!("/v0/status/{}", id)).await;
    assert_eq!(status1, StatusCode::OK);
    assert_eq!(body1["status"], "pending");
    assert_eq!(body1["estimate"], EXPECTED_ESTIMATE.to_string());
    assert_eq!(body1["instruction"]["type"], "ERV1");
    assert_eq!(
        body1["requestForExecution"]["amtPaid"],
        EXPECTED_ESTIMATE.to_string()
    );

    // 大小写不同的同一个 id：不会产生第二个条目
    let (status2, body2) = get(app.clone(), &format!("/v0/status/{}", id.to_uppercase().replace("0X", "0x"))).await;
    assert_eq!(status2, StatusCode::OK);
    assert_eq!(body2["status"], body1["status"]);

    assert_eq!(harness.state.registry.entry_count().await, 1);
    assert_eq!(harness.state.registry.pending_count().await, 1);
}

#[tokio::test]
async fn underpaid_is_terminal_and_side_effect_free() {
    let harness = test_harness();
    let rfe = signed_rfe(
        &harness.state,
        &sample_vaa_request(),
        U256::from(EXPECTED_ESTIMATE - 1),
    );
    harness.src_adapter.set_request(Some(rfe));

    let id = evm_request_id(SRC_CHAIN, 0x22, 0);
    let app = api::routes(harness.state.clone());

    for _ in 0..2 {
        let (status, body) = get(app.clone(), &format!("/v0/status/{}", id)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "underpaid");
    }
    // 欠付请求不入注册表、不排队
    assert_eq!(harness.state.registry.entry_count().await, 0);
    assert_eq!(harness.state.registry.pending_count().await, 0);
}

#[tokio::test]
async fn unknown_prefix_classifies_unsupported() {
    let harness = test_harness();
    let mut rfe = signed_rfe(
        &harness.state,
        &sample_vaa_request(),
        U256::from(EXPECTED_ESTIMATE),
    );
    rfe.request_bytes = b"ZZZZ\x01\x02".to_vec();
    harness.src_adapter.set_request(Some(rfe));

    let app = api::routes(harness.state.clone());
    let (status, body) = get(app, &format!("/v0/status/{}", evm_request_id(SRC_CHAIN, 0x33, 0))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "unsupported");
    assert!(body["instruction"].is_null());
    assert_eq!(harness.state.registry.pending_count().await, 0);
}

#[tokio::test]
async fn missing_request_is_404() {
    let harness = test_harness();
    harness.src_adapter.set_request(None);
    let app = api::routes(harness.state.clone());
    let response = app
        .oneshot(
            Request::builder()
                .uri(format!("/v0/status/{}", evm_request_id(SRC_CHAIN, 0x44, 0)))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn unsupported_source_chain_is_400() {
    let harness = test_harness();
    let app = api::routes(harness.state.clone());
    let response = app
        .oneshot(
            Request::builder()
                .uri(format!("/v0/status/{}", evm_request_id(999, 0x55, 0)))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn malformed_id_is_400() {
    let harness = test_harness();
    let app = api::routes(harness.state.clone());
    let response = app
        .oneshot(
            Request::builder()
                .uri("/v0/status/0xzznotahexid")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn cctp_request_is_admitted_then_marked_unsupported_by_worker() {
    let harness = test_harness();
    let rfe = signed_rfe(
        &harness.state,
        &ExecutionRequest::CctpV1 {
            source_domain: 6,
            nonce: 42,
        },
        U256::from(EXPECTED_ESTIMATE),
    );
    harness.src_adapter.set_request(Some(rfe));

    let app = api::routes(harness.state.clone());
    let (status, body) = get(app, &format!("/v0/status/{}", evm_request_id(SRC_CHAIN, 0x66, 0))).await;
    // CCTP 前缀可解码，准入后由转发层判定能力
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "pending");
    assert_eq!(body["instruction"]["type"], "ERC1");
    assert_eq!(harness.state.registry.pending_count().await, 1);
}
