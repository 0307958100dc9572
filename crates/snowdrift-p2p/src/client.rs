use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::error::{P2pError, QueryError};
use crate::peer::Peer;
use crate::wire::{PeerListResponse, RegisterRequest, RegisterResponse, ValueQuery, ValueResponse};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(2);

/// Read-only access to the local node's block values, used to answer
/// inbound queries from other peers. Implementations must not mutate any
/// local state.
#[async_trait]
pub trait ValueSource: Send + Sync {
    /// Byte-exact copy of the value at `index`, or a range error.
    async fn value_at(&self, index: i64) -> Result<Vec<u8>, QueryError>;
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Host the inbound query endpoint binds on; a free port is picked
    /// automatically.
    pub host: String,
    /// Address of the shared peer registry, as `host:port`.
    pub registry_addr: String,
}

/// Per-node transport endpoint.
///
/// Serves this node's values to other peers, and issues the node's own
/// outbound reads: directory listings from the registry and point reads
/// against individual peers.
pub struct Client {
    peer: Peer,
    registry_addr: String,
    http: reqwest::Client,
}

impl Client {
    /// Bind the inbound endpoint, start serving it in the background, and
    /// register this node with the peer registry.
    pub async fn start(
        config: ClientConfig,
        source: Arc<dyn ValueSource>,
    ) -> Result<Arc<Self>, P2pError> {
        let router = Router::new()
            .route("/block/value", post(query_value))
            .route("/health", get(health))
            .layer(TraceLayer::new_for_http())
            .with_state(source);

        let listener = tokio::net::TcpListener::bind((config.host.as_str(), 0)).await?;
        let local_addr = listener.local_addr()?;
        tokio::spawn(async move {
            if let Err(err) = axum::serve(listener, router).await {
                error!(error = %err, "peer endpoint stopped");
            }
        });

        let http = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        let client = Client {
            peer: Peer::new(local_addr.to_string()),
            registry_addr: config.registry_addr,
            http,
        };

        let known = client.register().await?;
        info!(
            peer = %client.peer.id,
            address = %client.peer.address,
            known_peers = known.len(),
            "peer endpoint started"
        );

        Ok(Arc::new(client))
    }

    /// This node's own identity in the peer universe.
    pub fn peer(&self) -> &Peer {
        &self.peer
    }

    async fn register(&self) -> Result<Vec<Peer>, P2pError> {
        let url = format!("http://{}/register", self.registry_addr);
        let response = self
            .http
            .post(&url)
            .json(&RegisterRequest {
                peer: self.peer.clone(),
            })
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(P2pError::RegistryRejected(response.status()));
        }
        let body: RegisterResponse = response.json().await?;
        Ok(body.peers)
    }

    /// Current directory as seen by the registry, excluding this node.
    ///
    /// Failing to reach the registry at all is an error; this is the only
    /// failure the sampling layer propagates.
    pub async fn peers(&self) -> Result<Vec<Peer>, P2pError> {
        let url = format!("http://{}/peers", self.registry_addr);
        let response = self.http.get(&url).send().await?;
        if !response.status().is_success() {
            return Err(P2pError::RegistryRejected(response.status()));
        }
        let body: PeerListResponse = response.json().await?;
        Ok(body
            .peers
            .into_iter()
            .filter(|peer| peer.id != self.peer.id)
            .collect())
    }

    /// One point read of `peer`'s current value at `index`.
    pub async fn fetch_value(&self, peer: &Peer, index: i64) -> Result<Vec<u8>, P2pError> {
        let url = format!("http://{}/block/value", peer.address);
        let response = self.http.post(&url).json(&ValueQuery { index }).send().await?;
        if !response.status().is_success() {
            return Err(P2pError::QueryRejected(response.status()));
        }
        let body: ValueResponse = response.json().await?;
        if body.value.is_empty() {
            return Err(P2pError::EmptyValue);
        }
        Ok(body.value)
    }
}

async fn query_value(
    State(source): State<Arc<dyn ValueSource>>,
    Json(query): Json<ValueQuery>,
) -> Result<Json<ValueResponse>, QueryError> {
    let value = source.value_at(query.index).await?;
    Ok(Json(ValueResponse { value }))
}

async fn health() -> StatusCode {
    StatusCode::OK
}
