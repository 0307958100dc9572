use thiserror::Error;

use crate::parameters::ParameterError;

/// Error type produced by the sample and commit callbacks.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug, Error)]
pub enum ConsensusError {
    #[error("invalid consensus configuration")]
    Parameters(#[from] ParameterError),

    #[error("consensus is already running")]
    AlreadyRunning,

    #[error("unable to sample peer preferences")]
    Sample(#[source] BoxError),

    #[error("unable to commit the updated preference")]
    Commit(#[source] BoxError),

    #[error("the preference sample is empty")]
    EmptySample,
}
