use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use snowdrift_consensus::{BoxError, Engine, Parameters, SyncOutcome};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::error::ChainError;
use crate::sampler::PreferenceSampler;
use crate::store::BlockStore;

/// Result of one full synchronization pass over the local block sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncReport {
    /// Number of block slots finalized during this pass.
    pub finalized: usize,
    /// True when cancellation stopped the pass before every slot finalized.
    pub cancelled: bool,
}

/// Per-node synchronization orchestrator.
///
/// Walks the local block sequence in index order and runs one consensus
/// engine per slot: the engine is seeded with the slot's current value,
/// sampling is bound to the peer universe at that index, and the finalized
/// preference is written back into the slot. Slot i+1 never starts before
/// slot i has fully finalized.
#[derive(Debug)]
pub struct Chain {
    store: Arc<BlockStore>,
    parameters: Parameters,
    syncing: AtomicBool,
}

impl Chain {
    pub fn new(parameters: Parameters, store: Arc<BlockStore>) -> Result<Self, ChainError> {
        parameters.verify()?;
        Ok(Chain {
            store,
            parameters,
            syncing: AtomicBool::new(false),
        })
    }

    pub fn store(&self) -> &Arc<BlockStore> {
        &self.store
    }

    pub fn parameters(&self) -> Parameters {
        self.parameters
    }

    /// Converge every block slot to a quorum-backed value.
    ///
    /// A call while another pass is in flight is a no-op. A pass that fails
    /// leaves the chain marked busy: the node counts as failed to converge
    /// and later passes stay no-ops, mirroring the engine's own guard.
    /// Earlier slots committed before the failure remain committed.
    pub async fn sync<P: PreferenceSampler>(
        &self,
        sampler: &P,
        cancel: &CancellationToken,
    ) -> Result<SyncReport, ChainError> {
        if self.syncing.swap(true, Ordering::AcqRel) {
            debug!("sync already in progress, skipping");
            return Ok(SyncReport {
                finalized: 0,
                cancelled: false,
            });
        }

        let report = self.sync_blocks(sampler, cancel).await?;
        self.syncing.store(false, Ordering::Release);
        Ok(report)
    }

    async fn sync_blocks<P: PreferenceSampler>(
        &self,
        sampler: &P,
        cancel: &CancellationToken,
    ) -> Result<SyncReport, ChainError> {
        let len = self.store.len().await;
        let store = &self.store;
        let mut finalized = 0;

        for index in 0..len {
            let seed = store.value(index).await?;
            let mut engine = Engine::new(self.parameters, seed)
                .map_err(|source| ChainError::Consensus { index, source })?;

            let sample = move |k| async move {
                sampler
                    .sample(index, k)
                    .await
                    .map_err(|err| Box::new(err) as BoxError)
            };
            let commit = move |value: Vec<u8>| async move {
                store
                    .set_value(index, value)
                    .await
                    .map_err(|err| Box::new(err) as BoxError)
            };

            let outcome = engine
                .sync(cancel, sample, commit)
                .await
                .map_err(|source| ChainError::Consensus { index, source })?;

            match outcome {
                SyncOutcome::Finalized { rounds } => {
                    finalized += 1;
                    debug!(index, rounds, "block slot finalized");
                }
                SyncOutcome::Cancelled => {
                    info!(index, finalized, "sync cancelled before the sequence finished");
                    return Ok(SyncReport {
                        finalized,
                        cancelled: true,
                    });
                }
            }
        }

        Ok(SyncReport {
            finalized,
            cancelled: false,
        })
    }
}
