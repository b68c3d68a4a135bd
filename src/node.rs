use crate::blockchain::Ledger;
use crate::config::Config;
use crate::error::{ChainError, Result};
use crate::network::{HeadAnnouncer, NetworkNode};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{error, info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeState {
    Booting,
    Ready,
}

pub struct Node {
    pub config: Config,
    pub ledger: Arc<Ledger>,
    pub network: Arc<NetworkNode>,
    pub announcer: HeadAnnouncer,
    pub state: Arc<RwLock<NodeState>>,
}

impl Node {
    /// Builds a node from a validated config. Installs the global tracing
    /// subscriber unless one is already set.
    pub fn init(config: Config) -> Result<Self> {
        config.validate()?;

        let level = config.logging.level()?;
        // Ignore the error when a subscriber is already installed (tests, embedding).
        let _ = tracing_subscriber::fmt().with_max_level(level).try_init();

        info!(
            http_port = config.network.http_port,
            p2p_port = config.network.p2p_port,
            "Starting HashLedger node"
        );

        let announcer = HeadAnnouncer::new();
        let ledger = Arc::new(Ledger::with_broadcaster(Arc::new(announcer.clone())));
        let network = Arc::new(NetworkNode::new(ledger.clone()));
        let state = Arc::new(RwLock::new(NodeState::Booting));

        Ok(Self {
            config,
            ledger,
            network,
            announcer,
            state,
        })
    }

    pub async fn start(self: Arc<Self>) -> Result<()> {
        let status_interval = self.config.node.status_interval()?;
        let bind_address = self.config.network.bind_address.clone();

        // 1) P2P listener; bind up front so a taken port fails startup
        let p2p_port = self.config.network.p2p_port;
        let listener = tokio::net::TcpListener::bind((bind_address.as_str(), p2p_port))
            .await
            .map_err(|e| ChainError::NetworkError(format!("P2P port {} unavailable: {}", p2p_port, e)))?;
        let net = self.network.clone();
        tokio::spawn(async move {
            if let Err(e) = net.serve(listener).await {
                error!("P2P server failed: {}", e);
            }
        });

        // 2) Fan out head changes from chain replacements
        tokio::spawn(
            self.network
                .clone()
                .run_head_announcements(self.announcer.subscribe()),
        );

        // 3) Bootstrap peers
        for peer in self.config.network.bootstrap_peers.clone() {
            let net = self.network.clone();
            tokio::spawn(async move {
                if let Err(e) = net.connect_peer(&peer).await {
                    warn!(peer = %peer, error = %e, "p2p.bootstrap_failed");
                }
            });
        }

        // 4) HTTP control surface
        let node = self.clone();
        tokio::spawn(async move {
            let api_port = node.config.network.http_port;
            if let Err(e) = Node::start_api(node, api_port).await {
                error!("API server failed: {}", e);
            }
        });

        *self.state.write().await = NodeState::Ready;

        // Node main loop - health logging
        let mut ticker = tokio::time::interval(status_interval);
        loop {
            ticker.tick().await;
            info!(
                length = self.ledger.len(),
                peers = self.network.peer_count(),
                "Node running"
            );
        }
    }

    #[cfg(feature = "api")]
    async fn start_api(node: Arc<Self>, port: u16) -> Result<()> {
        let api_node = crate::api::Node::new_shared(
            node.ledger.clone(),
            node.network.clone(),
            Some(node.state.clone()),
        );

        crate::api::run_api_server(Arc::new(api_node), &node.config.network.bind_address, port).await
    }

    #[cfg(not(feature = "api"))]
    async fn start_api(_node: Arc<Self>, _port: u16) -> Result<()> {
        Err(ChainError::ConfigError("API feature not enabled in this build".to_string()))
    }
}
