//! Integration tests for HashLedger API endpoints
//!
//! These tests verify that the control surface responds with the expected JSON
//! after node startup and after the ledger changes.

use axum_test::TestServer;
use hashledger::api::{build_api_router, Node};
use hashledger::blockchain::{Block, Ledger, GENESIS};
use hashledger::network::NetworkNode;
use hashledger::node::NodeState;
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::sync::RwLock;

fn test_server(ledger: Arc<Ledger>, state: NodeState) -> TestServer {
    let network = Arc::new(NetworkNode::new(ledger.clone()));
    let state = Arc::new(RwLock::new(state));
    let api_node = Arc::new(Node::new_shared(ledger, network, Some(state)));

    TestServer::new(build_api_router(api_node)).expect("Failed to create test server")
}

#[tokio::test]
async fn test_chain_endpoints() {
    let ledger = Arc::new(Ledger::new());
    let server = test_server(ledger.clone(), NodeState::Ready);

    // Test /health
    let response = server.get("/health").await;
    assert_eq!(response.status_code(), 200);
    let json: Value = response.json();
    assert_eq!(json["status"], "healthy");
    assert_eq!(json["chain_length"], 1);
    assert!(json["timestamp"].is_string());

    // Test /blocks at genesis
    let response = server.get("/blocks").await;
    assert_eq!(response.status_code(), 200);
    let blocks: Vec<Block> = response.json();
    assert_eq!(blocks, vec![GENESIS.clone()]);

    // Test /mint
    let response = server.post("/mint").json(&json!({ "data": "hello" })).await;
    assert_eq!(response.status_code(), 200);
    let minted: Block = response.json();
    assert_eq!(minted.index, 1);
    assert_eq!(minted.data, "hello");
    assert_eq!(minted.previous_hash, GENESIS.hash);
    assert_eq!(ledger.head(), minted);

    // Wire field names are preserved
    let response = server.get("/blocks/latest").await;
    let json: Value = response.json();
    assert_eq!(json["index"], 1);
    assert_eq!(json["previousHash"], GENESIS.hash.as_str());
    assert!(json["timestamp"].is_u64());

    // Test /blocks/:index
    let response = server.get("/blocks/0").await;
    assert_eq!(response.status_code(), 200);
    let genesis: Block = response.json();
    assert_eq!(genesis, *GENESIS);

    let response = server.get("/blocks/999").await;
    assert_eq!(response.status_code(), 404);
    let json: Value = response.json();
    assert!(json["error"].is_string());

    // Test /validate
    let response = server.get("/validate").await;
    assert_eq!(response.status_code(), 200);
    let json: Value = response.json();
    assert_eq!(json["ok"], true);
    assert_eq!(json["length"], 2);
}

#[tokio::test]
async fn test_mint_requires_data() {
    let server = test_server(Arc::new(Ledger::new()), NodeState::Ready);

    let response = server
        .post("/mint")
        .json(&json!({ "payload": "hello" }))
        .expect_failure()
        .await;
    assert!(response.status_code().is_client_error());
}

#[tokio::test]
async fn test_peer_endpoints() {
    let server = test_server(Arc::new(Ledger::new()), NodeState::Ready);

    let response = server.get("/peers").await;
    assert_eq!(response.status_code(), 200);
    let json: Value = response.json();
    assert_eq!(json["count"], 0);
    assert!(json["peers"].is_array());

    let response = server
        .post("/peer")
        .json(&json!({ "peer": "http://127.0.0.1:1" }))
        .expect_failure()
        .await;
    assert_eq!(response.status_code(), 400);

    let response = server
        .post("/peer")
        .json(&json!({ "peer": "wss://127.0.0.1:1" }))
        .expect_failure()
        .await;
    assert_eq!(response.status_code(), 400);

    // Nothing listens on port 1
    let response = server
        .post("/peer")
        .json(&json!({ "peer": "ws://127.0.0.1:1" }))
        .expect_failure()
        .await;
    assert_eq!(response.status_code(), 502);
    let json: Value = response.json();
    assert_eq!(json["reason"], "network_error");
}

#[tokio::test]
async fn test_health_reflects_node_state() {
    let server = test_server(Arc::new(Ledger::new()), NodeState::Booting);

    let response = server.get("/health").expect_failure().await;
    assert_eq!(response.status_code(), 503);
    let json: Value = response.json();
    assert_eq!(json["status"], "unhealthy");
    assert_eq!(json["node_state"], "Booting");
}

#[tokio::test]
async fn test_stats_count_requests_and_mints() {
    let server = test_server(Arc::new(Ledger::new()), NodeState::Ready);

    server.post("/mint").json(&json!({ "data": "a" })).await;
    server.post("/mint").json(&json!({ "data": "b" })).await;
    server.get("/blocks/42").expect_failure().await;

    let response = server.get("/stats").await;
    assert_eq!(response.status_code(), 200);
    let json: Value = response.json();
    assert_eq!(json["blocks_minted"], 2);
    assert_eq!(json["chain_length"], 3);
    assert_eq!(json["total_requests"], 3);
    assert_eq!(json["successful_requests"], 2);
    assert_eq!(json["failed_requests"], 1);
    assert!(json["uptime_seconds"].is_number());
    assert_eq!(json["peer_count"], 0);
}
