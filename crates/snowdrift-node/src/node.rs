use std::sync::Arc;

use anyhow::Result;
use snowdrift_chain::{Block, BlockStore, Chain, ChainError, NetworkSampler, SyncReport};
use snowdrift_consensus::Parameters;
use snowdrift_p2p::{Client, ClientConfig, Peer, ValueSource};
use tokio_util::sync::CancellationToken;

/// One simulated node: a local block sequence, its synchronization
/// orchestrator, and the transport endpoint that serves the sequence to
/// other peers.
pub struct Node {
    chain: Arc<Chain>,
    client: Arc<Client>,
    sampler: NetworkSampler,
}

impl Node {
    /// Start the node's query endpoint, register it with the peer
    /// registry, and wire the chain to the peer universe.
    pub async fn start(
        parameters: Parameters,
        host: &str,
        registry_addr: &str,
    ) -> Result<Self> {
        let store = Arc::new(BlockStore::new());
        let chain = Arc::new(Chain::new(parameters, Arc::clone(&store))?);

        let client = Client::start(
            ClientConfig {
                host: host.to_string(),
                registry_addr: registry_addr.to_string(),
            },
            Arc::clone(&store) as Arc<dyn ValueSource>,
        )
        .await?;
        let sampler = NetworkSampler::new(Arc::clone(&client));

        Ok(Node {
            chain,
            client,
            sampler,
        })
    }

    /// This node's identity in the peer universe.
    pub fn peer(&self) -> &Peer {
        self.client.peer()
    }

    /// Seed a block into the local sequence before synchronization.
    pub async fn append(&self, block: Block) -> usize {
        self.chain.store().append(block).await
    }

    /// Snapshot of the local sequence's current values.
    pub async fn values(&self) -> Vec<Vec<u8>> {
        self.chain.store().values().await
    }

    /// Converge the whole local sequence against the peer universe.
    pub async fn sync(&self, cancel: &CancellationToken) -> Result<SyncReport, ChainError> {
        self.chain.sync(&self.sampler, cancel).await
    }
}
