use std::sync::Arc;

use async_trait::async_trait;
use rand::seq::SliceRandom;
use snowdrift_p2p::Client;
use tracing::debug;

use crate::error::SampleError;

/// Source of other nodes' current preferences for one block index.
///
/// This is the seam between the consensus core and the transport: the
/// orchestrator only ever asks "up to k peer preferences at index i" and
/// never sees how those reads happen.
#[async_trait]
pub trait PreferenceSampler: Send + Sync {
    /// Collect up to `k` peer preferences for `index`.
    ///
    /// Returning fewer than `k` values is not an error; the engine treats
    /// an under-sized sample as "retry the round". Only failing to reach
    /// the peer directory itself is an error.
    async fn sample(&self, index: usize, k: usize) -> Result<Vec<Vec<u8>>, SampleError>;
}

/// Samples preferences from live peers through the HTTP transport.
pub struct NetworkSampler {
    client: Arc<Client>,
}

impl NetworkSampler {
    pub fn new(client: Arc<Client>) -> Self {
        NetworkSampler { client }
    }
}

#[async_trait]
impl PreferenceSampler for NetworkSampler {
    async fn sample(&self, index: usize, k: usize) -> Result<Vec<Vec<u8>>, SampleError> {
        let mut peers = self.client.peers().await.map_err(SampleError::Directory)?;
        // Fresh random visit order every call, so no peer is favored by
        // position across rounds.
        peers.shuffle(&mut rand::thread_rng());

        let mut preferences = Vec::new();
        for peer in &peers {
            match self.client.fetch_value(peer, index as i64).await {
                Ok(value) => preferences.push(value),
                Err(err) => {
                    debug!(peer = %peer.id, index, error = %err, "skipping peer");
                    continue;
                }
            }
            if preferences.len() >= k {
                break;
            }
        }
        Ok(preferences)
    }
}
