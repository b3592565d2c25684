//! Experiment runner.
//!
//! Brings up the cluster, runs the recovery sessions, tears the cluster
//! down, and aggregates the report.

use crate::config::ExperimentConfig;
use crate::report::{ExperimentReport, SessionSummary};
use blocksync_node::{Behavior, Node, NodeHandle};
use blocksync_types::{BlockId, PeerId};
use std::time::Instant;
use thiserror::Error;
use tracing::info;

/// Errors bringing up an experiment.
#[derive(Debug, Error)]
pub enum ExperimentError {
    #[error("invalid topology: {0}")]
    BadTopology(String),
    #[error("node startup failed: {0}")]
    Startup(#[from] std::io::Error),
}

/// One configured experiment.
pub struct Experiment {
    config: ExperimentConfig,
}

impl Experiment {
    pub fn new(config: ExperimentConfig) -> Result<Self, ExperimentError> {
        if config.num_nodes < 2 {
            return Err(ExperimentError::BadTopology(
                "at least two nodes required".into(),
            ));
        }
        if 3 * config.max_faulty + 1 > config.num_nodes {
            return Err(ExperimentError::BadTopology(format!(
                "{} nodes cannot tolerate {} faulty (need 3f+1)",
                config.num_nodes, config.max_faulty
            )));
        }
        if config.data_shards() > config.num_nodes {
            return Err(ExperimentError::BadTopology(
                "data shards exceed node count".into(),
            ));
        }
        Ok(Self { config })
    }

    /// Run the experiment: start N nodes, recover every missing block on
    /// node 0, and report.
    pub async fn run(&self) -> Result<ExperimentReport, ExperimentError> {
        let protocol = self.config.protocol();
        let faulty = self.config.faulty_set();

        info!(
            nodes = self.config.num_nodes,
            faulty = ?faulty,
            data_shards = self.config.data_shards(),
            mode = self.config.mode.as_str(),
            missing_blocks = self.config.missing_blocks,
            "starting experiment"
        );

        let mut nodes = Vec::new();
        let mut handles: Vec<NodeHandle> = Vec::new();
        for i in 0..self.config.num_nodes {
            let behavior = if faulty.contains(&i) && i != 0 {
                Behavior::Silent
            } else {
                Behavior::Honest
            };
            let node = Node::new(PeerId(i), protocol.clone(), behavior);
            handles.push(node.start().await?);
            nodes.push(node);
        }

        let requester = &nodes[0];
        let started = Instant::now();
        let mut sessions = Vec::new();
        for block in 0..self.config.missing_blocks {
            let report = requester.recover(BlockId(block as i64)).await;
            sessions.push(SessionSummary::from(&report));
        }
        let wall_clock = started.elapsed();

        for handle in &handles {
            handle.abort();
        }

        Ok(ExperimentReport {
            num_nodes: self.config.num_nodes,
            max_faulty: self.config.max_faulty,
            data_shards: self.config.data_shards(),
            mode: self.config.mode.as_str(),
            sessions,
            wall_clock,
        })
    }
}
