//! # Domain Errors
//!
//! Error types for the network core.
//!
//! `UnknownNode`, `UnknownConnection`, `DuplicateConnection`, `DuplicateNode`,
//! `SelfConnection`, `NodeNotActive`, `InsufficientCapacity` and
//! `InvalidConfiguration` are caller errors. `LinkFailure` and `Timeout` are expected and may be retried by the
//! caller; the core never retries on its own.

use std::time::Duration;
use thiserror::Error;

use super::value_objects::{ConnectionId, NodeId, NodeStatus};

/// Network core error types.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum NetworkError {
    /// Node id not present in the registry.
    #[error("Unknown node: {0}")]
    UnknownNode(NodeId),

    /// Connection id not present in the registry.
    #[error("Unknown connection: {0}")]
    UnknownConnection(ConnectionId),

    /// The unordered pair already has an established connection.
    #[error("Connection already established between {from} and {to}")]
    DuplicateConnection {
        /// First endpoint
        from: NodeId,
        /// Second endpoint
        to: NodeId,
    },

    /// Node id already registered or previously retired.
    #[error("Duplicate node: {0}")]
    DuplicateNode(NodeId),

    /// Both endpoints are the same node.
    #[error("Cannot connect node {0} to itself")]
    SelfConnection(NodeId),

    /// Endpoint exists but is not accepting connections.
    #[error("Node {node} is {status}, expected active")]
    NodeNotActive {
        /// Offending node
        node: NodeId,
        /// Its current status
        status: NodeStatus,
    },

    /// An endpoint cannot hold the resources a connection needs.
    #[error("Node {node} has {available} free resource units, {required} required")]
    InsufficientCapacity {
        /// Endpoint with the least free capacity
        node: NodeId,
        /// Units it can still take
        available: u64,
        /// Units the connection needs
        required: u64,
    },

    /// Probabilistic establishment failure.
    #[error("Link failure establishing {from} -> {to}")]
    LinkFailure {
        /// Requested source
        from: NodeId,
        /// Requested target
        to: NodeId,
    },

    /// Out-of-range configuration value.
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Exclusive access to the topology was not obtained in time.
    #[error("Topology busy: timed out after {0:?}")]
    Timeout(Duration),
}

impl NetworkError {
    /// Whether a caller may reasonably retry the operation.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::LinkFailure { .. } | Self::Timeout(_))
    }

    pub(crate) fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfiguration(message.into())
    }
}
