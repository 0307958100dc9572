use std::collections::HashSet;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use tokio::sync::RwLock;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::error::P2pError;
use crate::peer::Peer;
use crate::wire::{PeerListResponse, RegisterRequest, RegisterResponse};

const HEALTH_CHECK_TIMEOUT: Duration = Duration::from_secs(2);

/// Central peer directory shared by every simulated node.
///
/// Nodes register themselves at startup and re-read the directory before
/// each sampling round, so the peer set may grow and shrink between rounds.
pub struct Registry {
    peers: RwLock<Vec<Peer>>,
    http: reqwest::Client,
}

impl Registry {
    pub fn new() -> Result<Arc<Self>, P2pError> {
        let http = reqwest::Client::builder()
            .timeout(HEALTH_CHECK_TIMEOUT)
            .build()?;
        Ok(Arc::new(Registry {
            peers: RwLock::new(Vec::new()),
            http,
        }))
    }

    /// Add a peer unless its id is already registered, and return the full
    /// directory either way.
    pub async fn register(&self, peer: Peer) -> Vec<Peer> {
        let mut peers = self.peers.write().await;
        if !peers.iter().any(|known| known.id == peer.id) {
            info!(peer = %peer.id, address = %peer.address, "peer registered");
            peers.push(peer);
        }
        peers.clone()
    }

    /// Snapshot of the current directory.
    pub async fn peers(&self) -> Vec<Peer> {
        self.peers.read().await.clone()
    }

    /// Probe every registered peer and prune the ones that fail to answer
    /// their liveness endpoint. Returns the number of peers removed.
    pub async fn health_check(&self) -> usize {
        let snapshot = self.peers.read().await.clone();
        let mut dead = HashSet::new();

        for peer in &snapshot {
            let url = format!("http://{}/health", peer.address);
            match self.http.get(&url).send().await {
                Ok(response) if response.status().is_success() => {}
                Ok(response) => {
                    warn!(peer = %peer.id, status = %response.status(), "pruning unhealthy peer");
                    dead.insert(peer.id);
                }
                Err(err) => {
                    warn!(peer = %peer.id, error = %err, "pruning unreachable peer");
                    dead.insert(peer.id);
                }
            }
        }

        if dead.is_empty() {
            return 0;
        }
        let mut peers = self.peers.write().await;
        peers.retain(|peer| !dead.contains(&peer.id));
        dead.len()
    }

    /// Router serving the registry protocol.
    pub fn router(self: &Arc<Self>) -> Router {
        Router::new()
            .route("/register", post(register_peer))
            .route("/peers", get(list_peers))
            .layer(TraceLayer::new_for_http())
            .with_state(Arc::clone(self))
    }

    /// Bind the registry server and serve it on a background task.
    ///
    /// Returns the bound address, which differs from `addr` when an
    /// ephemeral port was requested.
    pub async fn spawn_server(self: &Arc<Self>, addr: SocketAddr) -> Result<SocketAddr, P2pError> {
        let listener = tokio::net::TcpListener::bind(addr).await?;
        let local_addr = listener.local_addr()?;
        let router = self.router();

        tokio::spawn(async move {
            if let Err(err) = axum::serve(listener, router).await {
                error!(error = %err, "registry server stopped");
            }
        });

        info!(addr = %local_addr, "registry listening");
        Ok(local_addr)
    }
}

async fn register_peer(
    State(registry): State<Arc<Registry>>,
    Json(request): Json<RegisterRequest>,
) -> Json<RegisterResponse> {
    let peers = registry.register(request.peer).await;
    Json(RegisterResponse { peers })
}

async fn list_peers(State(registry): State<Arc<Registry>>) -> Json<PeerListResponse> {
    Json(PeerListResponse {
        peers: registry.peers().await,
    })
}
