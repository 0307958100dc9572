//! Snowdrift Consensus - repeated-sampling convergence
//!
//! This crate provides the per-block consensus engine: a Snowball-style
//! round loop that converges a single value to a stable, quorum-backed
//! preference by repeatedly sampling peer preferences.

pub mod engine;
pub mod error;
pub mod parameters;

pub use engine::{Engine, SyncOutcome};
pub use error::{BoxError, ConsensusError};
pub use parameters::{ParameterError, Parameters};
