//! # Health Scoring
//!
//! Aggregate network health and per-node health, both in `[0, 1]`.
//!
//! ```text
//! score = w1 * active_node_ratio
//!       + w2 * established_connection_ratio
//!       + w3 * mean_quality
//!       + w4 * (1 - normalized_mean_latency)
//!       + w5 * (1 - utilization)
//! ```
//!
//! A term whose denominator is zero (no nodes, no connections) takes the
//! neutral value `0.5`.

use serde::Serialize;
use std::time::Duration;

use super::config::HealthConfig;
use super::entities::{clamp_unit, Node};
use super::topology::Topology;
use super::value_objects::NodeStatus;

/// Value used for a term that has nothing to average over.
pub const NEUTRAL_TERM: f64 = 0.5;

const NODE_UPTIME_WEIGHT: f64 = 0.4;
const NODE_ERROR_WEIGHT: f64 = 0.3;
const NODE_USAGE_WEIGHT: f64 = 0.3;

/// Read-only snapshot of the network.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct NetworkStats {
    /// Registered nodes
    pub node_count: usize,
    /// Nodes with status `Active`
    pub active_node_count: usize,
    /// Registered connections, including ones awaiting pruning
    pub connection_count: usize,
    /// Connections with status `Established`
    pub established_connection_count: usize,
    /// Mean quality of established connections (0 when there are none)
    pub mean_quality: f64,
    /// Mean latency of established connections
    #[serde(with = "humantime_serde")]
    pub mean_latency: Duration,
    /// Sum of bandwidth over established connections
    pub total_bandwidth: f64,
    /// Aggregate health in `[0, 1]`
    pub health_score: f64,
}

/// Health of a single node.
///
/// Offline nodes score 0.
pub fn node_health(node: &Node) -> f64 {
    if node.status == NodeStatus::Offline {
        return 0.0;
    }
    let m = &node.metrics;
    clamp_unit(
        NODE_UPTIME_WEIGHT * clamp_unit(m.uptime_ratio)
            + NODE_ERROR_WEIGHT * (1.0 - clamp_unit(m.error_rate))
            + NODE_USAGE_WEIGHT * (1.0 - clamp_unit(m.resource_usage_ratio)),
    )
}

fn duration_from_nanos(nanos: u128) -> Duration {
    let secs = u64::try_from(nanos / 1_000_000_000).unwrap_or(u64::MAX);
    // Remainder is below one second.
    let subsec = (nanos % 1_000_000_000) as u32;
    Duration::new(secs, subsec)
}

fn ratio(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        NEUTRAL_TERM
    } else {
        clamp_unit(part as f64 / whole as f64)
    }
}

impl Topology {
    /// Aggregate health score in `[0, 1]`.
    pub fn health_score(&self, config: &HealthConfig) -> f64 {
        let w = &config.weights;

        let active = self.nodes().filter(|n| n.is_active()).count();
        let active_ratio = ratio(active, self.node_count());

        let established: Vec<_> = self.established_connections().collect();
        let established_ratio = ratio(established.len(), self.connection_count());

        let (mean_quality, latency_term) = if established.is_empty() {
            (NEUTRAL_TERM, NEUTRAL_TERM)
        } else {
            let n = established.len() as f64;
            let quality = established.iter().map(|c| c.quality).sum::<f64>() / n;
            let latency = established
                .iter()
                .map(|c| c.latency.as_secs_f64())
                .sum::<f64>()
                / n;
            let normalization = config.latency_normalization.as_secs_f64();
            let normalized = if normalization > 0.0 {
                clamp_unit(latency / normalization)
            } else {
                1.0
            };
            (clamp_unit(quality), 1.0 - normalized)
        };

        let utilization_term = if self.node_count() == 0 {
            NEUTRAL_TERM
        } else {
            let usage = self
                .nodes()
                .map(|n| clamp_unit(n.metrics.resource_usage_ratio))
                .sum::<f64>()
                / self.node_count() as f64;
            1.0 - clamp_unit(usage)
        };

        clamp_unit(
            w.active_nodes * active_ratio
                + w.established_connections * established_ratio
                + w.quality * mean_quality
                + w.latency * latency_term
                + w.utilization * utilization_term,
        )
    }

    /// Snapshot of counts, means and the health score.
    pub fn stats(&self, config: &HealthConfig) -> NetworkStats {
        let established: Vec<_> = self.established_connections().collect();
        let count = established.len();
        let (mean_quality, mean_latency) = if count == 0 {
            (0.0, Duration::ZERO)
        } else {
            let quality = established.iter().map(|c| c.quality).sum::<f64>() / count as f64;
            let nanos = established
                .iter()
                .fold(0u128, |acc, c| acc.saturating_add(c.latency.as_nanos()))
                / count as u128;
            (quality, duration_from_nanos(nanos))
        };

        NetworkStats {
            node_count: self.node_count(),
            active_node_count: self.nodes().filter(|n| n.is_active()).count(),
            connection_count: self.connection_count(),
            established_connection_count: count,
            mean_quality,
            mean_latency,
            total_bandwidth: established.iter().map(|c| c.bandwidth).sum(),
            health_score: self.health_score(config),
        }
    }
}
