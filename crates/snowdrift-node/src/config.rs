use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use snowdrift_consensus::Parameters;

/// Simulation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Number of peer preferences solicited per consensus round
    pub k: usize,

    /// Quorum threshold within one sample
    pub alpha: usize,

    /// Consecutive confident rounds required for finality
    pub beta: usize,

    /// Population size: number of simulated nodes
    pub nodes: usize,

    /// Number of blocks seeded into each node's sequence
    pub blocks_per_node: usize,

    /// Number of distinct seed preferences to draw from
    pub possible_preferences: usize,

    /// Registry bind address; port 0 picks a free port
    pub registry_addr: SocketAddr,

    /// Seconds between registry health-check sweeps
    pub health_check_interval_secs: u64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        SimulationConfig {
            k: 3,
            alpha: 2,
            beta: 2,
            nodes: 20,
            blocks_per_node: 50,
            possible_preferences: 2,
            registry_addr: "127.0.0.1:8080".parse().unwrap(),
            health_check_interval_secs: 60,
        }
    }
}

impl SimulationConfig {
    /// Load config from file
    pub fn load(path: &PathBuf) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: SimulationConfig = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Save config to file
    pub fn save(&self, path: &PathBuf) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn parameters(&self) -> Parameters {
        Parameters {
            k: self.k,
            alpha: self.alpha,
            beta: self.beta,
        }
    }
}
