//! REST control surface for HashLedger
//!
//! Exposes the chain, local minting, validation and peer management over HTTP.

use axum::{
    extract::{Path, Request, State},
    http::{self, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::RwLock;
use tower_http::cors::{AllowOrigin, CorsLayer};

use crate::blockchain::{Block, Ledger};
use crate::error::ChainError;
use crate::network::NetworkNode;
use crate::node::NodeState;

/// Shared state behind every handler
#[derive(Clone)]
pub struct Node {
    pub ledger: Arc<Ledger>,
    pub network: Arc<NetworkNode>,
    // Optional orchestrator state for health checks and logging
    pub state: Option<Arc<RwLock<NodeState>>>,
    blocks_minted: Arc<AtomicU64>,
    api_stats: Arc<RwLock<ApiStats>>,
}

#[derive(Debug, Default)]
struct ApiStats {
    total_requests: u64,
    successful_requests: u64,
    failed_requests: u64,
    start_time: Option<Instant>,
}

impl ApiStats {
    fn new() -> Self {
        ApiStats {
            start_time: Some(Instant::now()),
            ..Default::default()
        }
    }

    fn record_request(&mut self, success: bool) {
        self.total_requests += 1;
        if success {
            self.successful_requests += 1;
        } else {
            self.failed_requests += 1;
        }
    }
}

impl Node {
    /// Create a standalone API node with its own network layer.
    pub fn new(ledger: Arc<Ledger>) -> Self {
        let network = Arc::new(NetworkNode::new(ledger.clone()));
        Self::new_shared(ledger, network, None)
    }

    /// Create an API node observing the orchestrator's ledger and peers.
    pub fn new_shared(
        ledger: Arc<Ledger>,
        network: Arc<NetworkNode>,
        state: Option<Arc<RwLock<NodeState>>>,
    ) -> Self {
        Self {
            ledger,
            network,
            state,
            blocks_minted: Arc::new(AtomicU64::new(0)),
            api_stats: Arc::new(RwLock::new(ApiStats::new())),
        }
    }

    pub fn blocks_minted(&self) -> u64 {
        self.blocks_minted.load(Ordering::Relaxed)
    }

    /// Mints a block on the local ledger and announces it to peers.
    pub fn mint(&self, data: String) -> Result<Block, ApiError> {
        let block = self.ledger.mint(data)?;
        self.blocks_minted.fetch_add(1, Ordering::SeqCst);
        self.network.broadcast_latest();
        Ok(block)
    }

    pub async fn get_stats(&self) -> ApiStatsResponse {
        let stats = self.api_stats.read().await;
        let uptime = stats.start_time.map(|t| t.elapsed().as_secs()).unwrap_or(0);

        ApiStatsResponse {
            total_requests: stats.total_requests,
            successful_requests: stats.successful_requests,
            failed_requests: stats.failed_requests,
            uptime_seconds: uptime,
            blocks_minted: self.blocks_minted(),
            chain_length: self.ledger.len(),
            peer_count: self.network.peer_count(),
        }
    }
}

// ============================================================================
// API Error Handling
// ============================================================================

#[derive(Debug)]
pub enum ApiError {
    Rejected(ChainError),
    InvalidInput(String),
    NotFound(String),
    Network(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error, reason) = match self {
            ApiError::Rejected(e) => (StatusCode::CONFLICT, e.to_string(), Some(e.reason_code())),
            ApiError::InvalidInput(msg) => (StatusCode::BAD_REQUEST, msg, None),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg, None),
            ApiError::Network(msg) => (StatusCode::BAD_GATEWAY, msg, Some("network_error")),
        };

        (status, Json(ErrorResponse { error, reason })).into_response()
    }
}

impl From<ChainError> for ApiError {
    fn from(err: ChainError) -> Self {
        match err {
            ChainError::NetworkError(msg) => ApiError::Network(msg),
            other => ApiError::Rejected(other),
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    reason: Option<&'static str>,
}

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Deserialize)]
pub struct MintRequest {
    pub data: String,
}

#[derive(Deserialize)]
pub struct PeerRequest {
    pub peer: String,
}

#[derive(Serialize)]
pub struct PeersResponse {
    pub count: usize,
    pub peers: Vec<String>,
}

#[derive(Serialize)]
pub struct ValidateResponse {
    pub ok: bool,
    pub length: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<&'static str>,
}

#[derive(Serialize)]
pub struct ApiStatsResponse {
    pub total_requests: u64,
    pub successful_requests: u64,
    pub failed_requests: u64,
    pub uptime_seconds: u64,
    pub blocks_minted: u64,
    pub chain_length: usize,
    pub peer_count: usize,
}

#[derive(Serialize)]
struct SuccessResponse {
    message: String,
}

// ============================================================================
// Middleware
// ============================================================================

async fn stats_middleware(State(node): State<Arc<Node>>, req: Request, next: Next) -> Response {
    let response = next.run(req).await;
    let success = response.status().is_success();

    let mut stats = node.api_stats.write().await;
    stats.record_request(success);

    response
}

/// Logs method, path, status, duration and the current `NodeState`.
async fn logging_middleware(State(node): State<Arc<Node>>, req: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    let response = next.run(req).await;

    let node_state = match &node.state {
        Some(s) => format!("{:?}", *s.read().await),
        None => "unknown".to_string(),
    };

    tracing::info!(
        method = %method,
        path = %path,
        status = %response.status().as_u16(),
        duration_ms = %start.elapsed().as_millis(),
        node_state = %node_state,
        "api.request"
    );

    response
}

// ============================================================================
// API Server
// ============================================================================

pub fn build_api_router(node: Arc<Node>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::mirror_request())
        .allow_methods(vec![http::Method::GET, http::Method::POST, http::Method::OPTIONS])
        .allow_headers(vec![http::header::CONTENT_TYPE])
        .allow_credentials(true);

    Router::new()
        // Chain endpoints
        .route("/blocks", get(get_blocks))
        .route("/blocks/latest", get(get_latest_block))
        .route("/blocks/:index", get(get_block_by_index))
        .route("/mint", post(mint_block))
        .route("/validate", get(validate_chain))
        // Peer endpoints
        .route("/peers", get(get_peers))
        .route("/peer", post(add_peer))
        // System endpoints
        .route("/health", get(health_check))
        .route("/stats", get(get_api_stats))
        // logging before stats so we always record timing and node-state
        .layer(middleware::from_fn_with_state(node.clone(), logging_middleware))
        .layer(middleware::from_fn_with_state(node.clone(), stats_middleware))
        .with_state(node)
        .layer(cors)
}

pub async fn run_api_server(node: Arc<Node>, bind_address: &str, port: u16) -> Result<(), ChainError> {
    let app = build_api_router(node);

    let addr: SocketAddr = format!("{}:{}", bind_address, port)
        .parse()
        .map_err(|e| ChainError::ConfigError(format!("Invalid API address {}:{}: {}", bind_address, port, e)))?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| ChainError::NetworkError(format!("API port {} unavailable: {}", port, e)))?;

    tracing::info!(addr = %addr, "api.listening");
    axum::serve(listener, app).await?;
    Ok(())
}

// ============================================================================
// Route Handlers
// ============================================================================

async fn health_check(State(node): State<Arc<Node>>) -> impl IntoResponse {
    let state = match &node.state {
        Some(s) => Some(s.read().await.clone()),
        None => None,
    };

    let (status, label) = match &state {
        Some(NodeState::Ready) | None => (StatusCode::OK, "healthy"),
        Some(_) => (StatusCode::SERVICE_UNAVAILABLE, "unhealthy"),
    };

    (
        status,
        Json(serde_json::json!({
            "status": label,
            "node_state": state.map(|s| format!("{:?}", s)),
            "chain_length": node.ledger.len(),
            "timestamp": chrono::Utc::now().to_rfc3339()
        })),
    )
}

async fn get_blocks(State(node): State<Arc<Node>>) -> Json<Vec<Block>> {
    Json(node.ledger.chain().as_ref().clone())
}

async fn get_latest_block(State(node): State<Arc<Node>>) -> Json<Block> {
    Json(node.ledger.head())
}

async fn get_block_by_index(
    State(node): State<Arc<Node>>,
    Path(index): Path<u64>,
) -> Result<Json<Block>, ApiError> {
    node.ledger
        .block(index)
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Block at index {} not found", index)))
}

async fn mint_block(
    State(node): State<Arc<Node>>,
    Json(req): Json<MintRequest>,
) -> Result<Json<Block>, ApiError> {
    node.mint(req.data).map(Json)
}

async fn validate_chain(State(node): State<Arc<Node>>) -> Json<ValidateResponse> {
    let length = node.ledger.len();
    match node.ledger.validate() {
        Ok(()) => Json(ValidateResponse {
            ok: true,
            length,
            error: None,
            reason: None,
        }),
        Err(e) => Json(ValidateResponse {
            ok: false,
            length,
            error: Some(e.to_string()),
            reason: Some(e.reason_code()),
        }),
    }
}

async fn get_peers(State(node): State<Arc<Node>>) -> Json<PeersResponse> {
    let peers = node.network.peers();
    Json(PeersResponse {
        count: peers.len(),
        peers,
    })
}

async fn add_peer(
    State(node): State<Arc<Node>>,
    Json(req): Json<PeerRequest>,
) -> Result<Json<SuccessResponse>, ApiError> {
    let peer = req.peer.trim();
    if !peer.starts_with("ws://") {
        return Err(ApiError::InvalidInput(format!(
            "Peer `{}` must be a ws:// URL",
            peer
        )));
    }

    node.network.connect_peer(peer).await?;
    Ok(Json(SuccessResponse {
        message: format!("Connected to {}", peer),
    }))
}

async fn get_api_stats(State(node): State<Arc<Node>>) -> Json<ApiStatsResponse> {
    Json(node.get_stats().await)
}
