//! Peer-to-peer transport for HashLedger
//!
//! Peers talk JSON over WebSockets. Every connection gets an outbound queue
//! drained by its own writer task, so broadcasting never waits on a socket.

use crate::blockchain::{Block, HeadBroadcaster, Ledger};
use crate::error::{ChainError, Result};
use crate::sync::{decode_blocks, handle_blockchain_response, SyncAction};
use futures_util::{SinkExt, StreamExt};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpListener;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{broadcast, mpsc};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;
use tracing::{debug, info, warn};

const HEAD_ANNOUNCEMENT_CAPACITY: usize = 64;
/// Messages queued per peer before further broadcasts to it are dropped.
const PEER_QUEUE_CAPACITY: usize = 256;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PeerMessage {
    QueryLatest,
    QueryAll,
    /// Blocks in wire form; each is shape-checked before decoding.
    ResponseBlockchain(Vec<Value>),
}

impl PeerMessage {
    pub fn response_blockchain(blocks: &[Block]) -> Result<Self> {
        let values = blocks
            .iter()
            .map(serde_json::to_value)
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(PeerMessage::ResponseBlockchain(values))
    }
}

/// Hands ledger head changes to the P2P layer through a broadcast channel.
#[derive(Clone)]
pub struct HeadAnnouncer {
    tx: broadcast::Sender<Block>,
}

impl HeadAnnouncer {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(HEAD_ANNOUNCEMENT_CAPACITY);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Block> {
        self.tx.subscribe()
    }
}

impl Default for HeadAnnouncer {
    fn default() -> Self {
        Self::new()
    }
}

impl HeadBroadcaster for HeadAnnouncer {
    fn broadcast_latest(&self, head: &Block) {
        // Fails only when nobody is subscribed.
        if self.tx.send(head.clone()).is_err() {
            debug!(index = head.index, "p2p.announce.no_subscribers");
        }
    }
}

type PeerSender = mpsc::Sender<PeerMessage>;

struct PeerHandle {
    addr: String,
    tx: PeerSender,
}

pub struct NetworkNode {
    ledger: Arc<Ledger>,
    // Keyed per connection; the same address may be connected more than once.
    peers: RwLock<HashMap<u64, PeerHandle>>,
    next_peer_id: AtomicU64,
}

impl NetworkNode {
    pub fn new(ledger: Arc<Ledger>) -> Self {
        Self {
            ledger,
            peers: RwLock::new(HashMap::new()),
            next_peer_id: AtomicU64::new(0),
        }
    }

    pub fn ledger(&self) -> &Arc<Ledger> {
        &self.ledger
    }

    /// Addresses of currently connected peers, sorted.
    pub fn peers(&self) -> Vec<String> {
        let mut peers: Vec<String> = self.peers.read().values().map(|p| p.addr.clone()).collect();
        peers.sort();
        peers
    }

    pub fn peer_count(&self) -> usize {
        self.peers.read().len()
    }

    fn register_peer(&self, addr: String, tx: PeerSender) -> u64 {
        let id = self.next_peer_id.fetch_add(1, Ordering::Relaxed);
        self.peers.write().insert(id, PeerHandle { addr, tx });
        id
    }

    fn unregister_peer(&self, id: u64) {
        self.peers.write().remove(&id);
    }

    pub async fn start_server(self: Arc<Self>, bind_address: &str, port: u16) -> Result<()> {
        let listener = TcpListener::bind((bind_address, port))
            .await
            .map_err(|e| ChainError::NetworkError(format!("P2P port {} unavailable: {}", port, e)))?;
        self.serve(listener).await
    }

    /// Accepts inbound peers on an already-bound listener until it fails.
    pub async fn serve(self: Arc<Self>, listener: TcpListener) -> Result<()> {
        info!(addr = %listener.local_addr()?, "p2p.listening");
        loop {
            let (stream, addr) = listener.accept().await?;
            let node = self.clone();
            tokio::spawn(async move {
                match tokio_tungstenite::accept_async(stream).await {
                    Ok(ws) => node.run_connection(ws, addr.to_string()).await,
                    Err(e) => warn!(peer = %addr, error = %e, "p2p.handshake_failed"),
                }
            });
        }
    }

    /// Dials a peer at a `ws://` URL and keeps the connection in the background.
    pub async fn connect_peer(self: &Arc<Self>, url: &str) -> Result<()> {
        let (ws, _) = tokio_tungstenite::connect_async(url)
            .await
            .map_err(|e| ChainError::NetworkError(format!("Failed to connect to {}: {}", url, e)))?;

        let node = self.clone();
        let peer = url.to_string();
        tokio::spawn(async move { node.run_connection(ws, peer).await });
        Ok(())
    }

    async fn run_connection<S>(self: Arc<Self>, ws: WebSocketStream<S>, peer: String)
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let (mut sink, mut stream) = ws.split();
        let (tx, mut rx) = mpsc::channel::<PeerMessage>(PEER_QUEUE_CAPACITY);
        let id = self.register_peer(peer.clone(), tx.clone());
        info!(peer = %peer, id, "p2p.connected");

        let writer_peer = peer.clone();
        let writer = tokio::spawn(async move {
            while let Some(msg) = rx.recv().await {
                let text = match serde_json::to_string(&msg) {
                    Ok(text) => text,
                    Err(e) => {
                        warn!(peer = %writer_peer, error = %e, "p2p.encode_failed");
                        continue;
                    }
                };
                if let Err(e) = sink.send(Message::Text(text)).await {
                    debug!(peer = %writer_peer, error = %e, "p2p.send_failed");
                    break;
                }
            }
        });

        let _ = tx.try_send(PeerMessage::QueryLatest);

        while let Some(frame) = stream.next().await {
            match frame {
                Ok(Message::Text(text)) => match serde_json::from_str::<PeerMessage>(&text) {
                    Ok(msg) => {
                        if let Some(reply) = self.handle_message(&peer, msg) {
                            if tx.send(reply).await.is_err() {
                                break;
                            }
                        }
                    }
                    Err(e) => warn!(peer = %peer, error = %e, "p2p.malformed_message"),
                },
                Ok(Message::Close(_)) => break,
                Ok(_) => {}
                Err(e) => {
                    debug!(peer = %peer, error = %e, "p2p.read_failed");
                    break;
                }
            }
        }

        self.unregister_peer(id);
        writer.abort();
        info!(peer = %peer, id, "p2p.disconnected");
    }

    /// Processes one message from `peer`, returning the direct reply if any.
    pub fn handle_message(&self, peer: &str, msg: PeerMessage) -> Option<PeerMessage> {
        debug!(peer = %peer, message = message_kind(&msg), "p2p.message");
        match msg {
            PeerMessage::QueryLatest => PeerMessage::response_blockchain(&[self.ledger.head()]).ok(),
            PeerMessage::QueryAll => PeerMessage::response_blockchain(&self.ledger.chain()).ok(),
            PeerMessage::ResponseBlockchain(values) => {
                let blocks = match decode_blocks(&values) {
                    Ok(blocks) => blocks,
                    Err(e) => {
                        warn!(peer = %peer, reason = e.reason_code(), error = %e, "p2p.response_rejected");
                        return None;
                    }
                };

                match handle_blockchain_response(&self.ledger, blocks) {
                    SyncAction::Appended(_) => self.broadcast_latest(),
                    SyncAction::QueryAll => self.broadcast(PeerMessage::QueryAll),
                    SyncAction::Rejected(e) => {
                        warn!(peer = %peer, reason = e.reason_code(), error = %e, "p2p.response_rejected")
                    }
                    // Replacements reach peers through the head announcer.
                    SyncAction::Replaced | SyncAction::Ignored => {}
                }
                None
            }
        }
    }

    /// Queues `msg` for every connected peer.
    pub fn broadcast(&self, msg: PeerMessage) {
        let peers = self.peers.read();
        for (id, handle) in peers.iter() {
            match handle.tx.try_send(msg.clone()) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => {
                    warn!(peer = %handle.addr, id, "p2p.broadcast.queue_full");
                }
                Err(TrySendError::Closed(_)) => {
                    debug!(peer = %handle.addr, id, "p2p.broadcast.peer_gone");
                }
            }
        }
    }

    pub fn broadcast_latest(&self) {
        match PeerMessage::response_blockchain(&[self.ledger.head()]) {
            Ok(msg) => self.broadcast(msg),
            Err(e) => warn!(error = %e, "p2p.encode_failed"),
        }
    }

    /// Forwards every announced head to all peers until the channel closes.
    pub async fn run_head_announcements(self: Arc<Self>, mut rx: broadcast::Receiver<Block>) {
        loop {
            match rx.recv().await {
                Ok(head) => match PeerMessage::response_blockchain(&[head]) {
                    Ok(msg) => self.broadcast(msg),
                    Err(e) => warn!(error = %e, "p2p.encode_failed"),
                },
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "p2p.announce.lagged");
                    self.broadcast_latest();
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    }
}

fn message_kind(msg: &PeerMessage) -> &'static str {
    match msg {
        PeerMessage::QueryLatest => "QUERY_LATEST",
        PeerMessage::QueryAll => "QUERY_ALL",
        PeerMessage::ResponseBlockchain(_) => "RESPONSE_BLOCKCHAIN",
    }
}
