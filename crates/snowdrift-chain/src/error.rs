use thiserror::Error;

use snowdrift_consensus::{ConsensusError, ParameterError};
use snowdrift_p2p::P2pError;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("index {index} is out of range for a sequence of {len} blocks")]
    OutOfRange { index: i64, len: usize },
}

#[derive(Debug, Error)]
pub enum SampleError {
    #[error("unable to list peers from the registry")]
    Directory(#[source] P2pError),
}

#[derive(Debug, Error)]
pub enum ChainError {
    #[error("invalid consensus configuration")]
    Parameters(#[from] ParameterError),

    #[error("unable to sync the consensus for block {index}")]
    Consensus {
        index: usize,
        #[source]
        source: ConsensusError,
    },

    #[error(transparent)]
    Store(#[from] StoreError),
}
