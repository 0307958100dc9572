use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use rand::Rng;
use snowdrift_chain::Block;
use snowdrift_p2p::Registry;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::config::SimulationConfig;
use crate::node::Node;

/// Per-index agreement summary of a finished simulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimulationReport {
    pub nodes: usize,
    pub blocks: usize,
    /// Block indices on which every node holds the same value.
    pub agreed: usize,
}

/// Run a whole simulation: registry, population, seeding, concurrent sync,
/// and the final agreement sweep.
pub async fn run(config: &SimulationConfig, cancel: CancellationToken) -> Result<SimulationReport> {
    let parameters = config.parameters();
    parameters.verify()?;

    let registry = Registry::new()?;
    let registry_addr = registry.spawn_server(config.registry_addr).await?;
    spawn_health_checks(
        Arc::clone(&registry),
        Duration::from_secs(config.health_check_interval_secs),
        cancel.clone(),
    );

    // Bring up the whole population before any node starts syncing, so
    // every node has peers to sample from its first round on.
    let mut nodes = Vec::with_capacity(config.nodes);
    for node_index in 0..config.nodes {
        let node = Node::start(parameters, "127.0.0.1", &registry_addr.to_string()).await?;
        for value in seed_values(config) {
            node.append(Block::new(value)).await;
        }
        info!(
            node = node_index,
            peer = %node.peer().id,
            state = %render_state(&node.values().await),
            "before sync"
        );
        nodes.push(Arc::new(node));
    }

    let mut handles = Vec::with_capacity(nodes.len());
    for (node_index, node) in nodes.iter().enumerate() {
        let node = Arc::clone(node);
        let cancel = cancel.clone();
        handles.push(tokio::spawn(async move {
            match node.sync(&cancel).await {
                Ok(report) => {
                    info!(
                        node = node_index,
                        finalized = report.finalized,
                        cancelled = report.cancelled,
                        "sync finished"
                    );
                }
                Err(err) => {
                    error!(node = node_index, error = %err, "node failed to converge");
                }
            }
        }));
    }
    for handle in handles {
        handle.await?;
    }

    let mut states = Vec::with_capacity(nodes.len());
    for (node_index, node) in nodes.iter().enumerate() {
        let values = node.values().await;
        info!(node = node_index, state = %render_state(&values), "after sync");
        states.push(values);
    }

    let mut agreed = 0;
    for index in 0..config.blocks_per_node {
        let distinct: HashSet<&Vec<u8>> = states.iter().map(|state| &state[index]).collect();
        if distinct.len() == 1 {
            agreed += 1;
        } else {
            warn!(
                index,
                values = ?distinct.iter().map(hex::encode).collect::<Vec<_>>(),
                "nodes disagree on this index"
            );
        }
    }

    let report = SimulationReport {
        nodes: config.nodes,
        blocks: config.blocks_per_node,
        agreed,
    };
    info!(
        nodes = report.nodes,
        blocks = report.blocks,
        agreed = report.agreed,
        "simulation complete"
    );
    Ok(report)
}

fn spawn_health_checks(registry: Arc<Registry>, interval: Duration, cancel: CancellationToken) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        // The first tick fires immediately; skip it so checks start one
        // full interval after startup.
        ticker.tick().await;
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    let removed = registry.health_check().await;
                    if removed > 0 {
                        warn!(removed, "pruned unhealthy peers");
                    }
                }
            }
        }
    });
}

/// Seed values for one node: a random preference byte followed by the
/// block index, so slots at different indices stay distinguishable.
fn seed_values(config: &SimulationConfig) -> Vec<Vec<u8>> {
    let mut rng = rand::thread_rng();
    (0..config.blocks_per_node)
        .map(|index| {
            let preference = rng.gen_range(0..config.possible_preferences * 2) as u8;
            vec![preference, index as u8]
        })
        .collect()
}

/// Compact first-byte rendering of a node's sequence for the logs.
fn render_state(values: &[Vec<u8>]) -> String {
    values
        .iter()
        .map(|value| value.first().map(u8::to_string).unwrap_or_default())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seed_values_tag_each_index() {
        let config = SimulationConfig {
            blocks_per_node: 4,
            possible_preferences: 2,
            ..Default::default()
        };
        let values = seed_values(&config);
        assert_eq!(values.len(), 4);
        for (index, value) in values.iter().enumerate() {
            assert_eq!(value.len(), 2);
            assert!(value[0] < 4);
            assert_eq!(value[1], index as u8);
        }
    }

    #[test]
    fn render_state_prints_first_bytes() {
        let values = vec![vec![1, 0], vec![0, 1], vec![3, 2]];
        assert_eq!(render_state(&values), "103");
    }
}
