//! # Driving Ports (Inbound API)
//!
//! The query and command surface consumed by dashboards and operators.
//! Every call takes the topology lock with a bounded wait, so each may
//! return `NetworkError::Timeout` under contention.

use crate::domain::{
    Connection, ConnectionId, HeartbeatReport, NetworkError, NetworkStats, NodeDescriptor, NodeId,
    NodeStatus,
};
use std::time::Duration;

/// Query/command API of the network core.
///
/// # Example
///
/// ```rust,ignore
/// use qn_network_core::ports::QuantumNetworkApi;
///
/// fn report<T: QuantumNetworkApi>(api: &T) {
///     if let Ok(stats) = api.get_network_stats() {
///         println!("health {:.2}", stats.health_score);
///     }
/// }
/// ```
pub trait QuantumNetworkApi {
    /// Read-only snapshot of counts, means and health.
    fn get_network_stats(&self) -> Result<NetworkStats, NetworkError>;

    /// Establish a connection between two active nodes.
    ///
    /// # Errors
    ///
    /// - `UnknownNode`, `SelfConnection`, `NodeNotActive`, `DuplicateConnection`:
    ///   caller errors, not retried
    /// - `LinkFailure`: the probabilistic establishment failed; the caller may retry
    /// - `Timeout`: the topology lock could not be acquired in time
    fn establish_connection(
        &self,
        source: &NodeId,
        target: &NodeId,
    ) -> Result<Connection, NetworkError>;

    /// Tear down a connection.
    ///
    /// Unknown or already-closed ids are a no-op and return `Ok(false)`.
    fn teardown_connection(&self, id: &ConnectionId) -> Result<bool, NetworkError>;

    /// Minimum-latency path, endpoints included. Empty when unreachable.
    fn compute_route(
        &self,
        source: &NodeId,
        destination: &NodeId,
    ) -> Result<Vec<NodeId>, NetworkError>;

    /// Minimum-latency path together with its total latency.
    fn compute_route_with_latency(
        &self,
        source: &NodeId,
        destination: &NodeId,
    ) -> Result<Option<(Vec<NodeId>, Duration)>, NetworkError>;
}

/// Operator API for the node registry.
pub trait NodeRegistryApi {
    /// Register a node.
    fn add_node(&self, descriptor: NodeDescriptor) -> Result<(), NetworkError>;

    /// Remove a node and every connection touching it.
    ///
    /// Returns the removed connection ids.
    fn remove_node(&self, id: &NodeId) -> Result<Vec<ConnectionId>, NetworkError>;

    /// Change a node's status.
    fn set_node_status(&self, id: &NodeId, status: NodeStatus) -> Result<(), NetworkError>;

    /// Record a heartbeat from a node.
    fn record_heartbeat(&self, id: &NodeId, report: HeartbeatReport) -> Result<(), NetworkError>;

    /// Connections currently attached to a node.
    fn connections_of(&self, id: &NodeId) -> Result<Vec<Connection>, NetworkError>;
}
