use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Sampling parameters shared by every engine a node creates.
///
/// `k` bounds the sample cost of one round, `alpha` is the instantaneous
/// quorum a sample must reach, and `beta` is the number of consecutive
/// reinforcing rounds required before a value is considered final.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Parameters {
    /// Number of peer preferences solicited per round.
    pub k: usize,
    /// Minimum count, out of a k-sized sample, required to accept a value.
    pub alpha: usize,
    /// Confidence threshold at which a preference is considered converged.
    pub beta: usize,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParameterError {
    #[error("k = {k}, alpha = {alpha}: fails the condition that k/2 < alpha")]
    AlphaBelowMajority { k: usize, alpha: usize },

    #[error("k = {k}, alpha = {alpha}: fails the condition that alpha <= k")]
    AlphaAboveSampleSize { k: usize, alpha: usize },
}

impl Parameters {
    pub fn new(k: usize, alpha: usize, beta: usize) -> Result<Self, ParameterError> {
        let parameters = Parameters { k, alpha, beta };
        parameters.verify()?;
        Ok(parameters)
    }

    /// Returns Ok if the parameters describe a valid configuration.
    pub fn verify(&self) -> Result<(), ParameterError> {
        if self.alpha <= self.k / 2 {
            return Err(ParameterError::AlphaBelowMajority {
                k: self.k,
                alpha: self.alpha,
            });
        }
        if self.k < self.alpha {
            return Err(ParameterError::AlphaAboveSampleSize {
                k: self.k,
                alpha: self.alpha,
            });
        }
        Ok(())
    }
}
