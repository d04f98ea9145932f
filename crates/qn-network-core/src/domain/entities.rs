//! # Domain Entities
//!
//! Nodes and connections. Both are owned by the `Topology`; a node only
//! refers to its incident connections by id.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::time::Duration;

use super::errors::NetworkError;
use super::value_objects::{
    ChannelKind, ConnectionId, ConnectionStatus, Location, NodeId, NodeKind, NodeStatus, Timestamp,
};

/// Lowest quality any established connection may report.
pub const QUALITY_MIN: f64 = 0.5;

/// Highest quality any established connection may report.
pub const QUALITY_MAX: f64 = 1.0;

/// Clamp a quality value into `[QUALITY_MIN, QUALITY_MAX]`.
pub fn clamp_quality(quality: f64) -> f64 {
    if quality.is_nan() {
        return QUALITY_MIN;
    }
    quality.clamp(QUALITY_MIN, QUALITY_MAX)
}

/// Clamp a ratio into `[0, 1]`, mapping NaN to 0.
pub fn clamp_unit(value: f64) -> f64 {
    if value.is_nan() {
        return 0.0;
    }
    value.clamp(0.0, 1.0)
}

/// Capability limits of a node.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Capability {
    /// Resource units the node can hold across all its connections
    pub max_resource_units: u64,
    /// Intrinsic quality of the node's hardware; caps the quality of its links
    pub base_quality: f64,
    /// How long the node can hold a resource unit (descriptive only)
    #[serde(with = "humantime_serde")]
    pub coherence_window: Duration,
    /// Per-operation latency, added to every link the node terminates
    #[serde(with = "humantime_serde")]
    pub op_latency: Duration,
}

impl Default for Capability {
    fn default() -> Self {
        Self {
            max_resource_units: 1000,
            base_quality: 0.95,
            coherence_window: Duration::from_millis(100),
            op_latency: Duration::from_micros(10),
        }
    }
}

/// Immutable node configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NodeDescriptor {
    /// Unique identifier
    pub id: NodeId,
    /// Physical position
    pub location: Location,
    /// Placement class
    pub kind: NodeKind,
    /// Capability limits
    #[serde(default)]
    pub capability: Capability,
}

impl NodeDescriptor {
    /// Create a descriptor with default capability.
    pub fn new(id: impl Into<NodeId>, location: Location, kind: NodeKind) -> Self {
        Self {
            id: id.into(),
            location,
            kind,
            capability: Capability::default(),
        }
    }

    /// Replace the capability.
    #[must_use]
    pub fn with_capability(mut self, capability: Capability) -> Self {
        self.capability = capability;
        self
    }

    /// Check coordinates and capability ranges.
    pub fn validate(&self) -> Result<(), NetworkError> {
        let loc = &self.location;
        if !(-90.0..=90.0).contains(&loc.latitude) || !(-180.0..=180.0).contains(&loc.longitude) {
            return Err(NetworkError::invalid_config(format!(
                "node {} has out-of-range coordinates ({}, {})",
                self.id, loc.latitude, loc.longitude
            )));
        }
        if let Some(altitude) = loc.altitude {
            if !altitude.is_finite() || altitude < 0.0 {
                return Err(NetworkError::invalid_config(format!(
                    "node {} has invalid altitude {altitude}",
                    self.id
                )));
            }
        }
        if self.capability.max_resource_units == 0 {
            return Err(NetworkError::invalid_config(format!(
                "node {} has zero max_resource_units",
                self.id
            )));
        }
        if !(0.0..=1.0).contains(&self.capability.base_quality) {
            return Err(NetworkError::invalid_config(format!(
                "node {} base_quality must be within [0, 1]",
                self.id
            )));
        }
        Ok(())
    }
}

/// Runtime metrics of a node.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NodeMetrics {
    /// Fraction of time the node has been reachable
    pub uptime_ratio: f64,
    /// Operations per second
    pub throughput: f64,
    /// Fraction of failed operations
    pub error_rate: f64,
    /// Fraction of `max_resource_units` held by incident connections
    pub resource_usage_ratio: f64,
    /// Last heartbeat received, `None` until the node first reports
    pub last_heartbeat: Option<Timestamp>,
}

impl Default for NodeMetrics {
    fn default() -> Self {
        Self {
            uptime_ratio: 1.0,
            throughput: 0.0,
            error_rate: 0.0,
            resource_usage_ratio: 0.0,
            last_heartbeat: None,
        }
    }
}

/// Metrics reported by a node heartbeat.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct HeartbeatReport {
    /// Reported uptime ratio
    pub uptime_ratio: f64,
    /// Reported throughput
    pub throughput: f64,
    /// Reported error rate
    pub error_rate: f64,
}

/// Mutable node state.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Node {
    /// Static configuration
    pub descriptor: NodeDescriptor,
    /// Current status
    pub status: NodeStatus,
    /// Current metrics
    pub metrics: NodeMetrics,
    /// Incident connections (back-references only)
    pub connections: BTreeSet<ConnectionId>,
    /// When the node joined the registry
    pub registered_at: Timestamp,
}

impl Node {
    /// Wrap a descriptor as a fresh active node.
    pub fn new(descriptor: NodeDescriptor, now: Timestamp) -> Self {
        Self {
            descriptor,
            status: NodeStatus::Active,
            metrics: NodeMetrics::default(),
            connections: BTreeSet::new(),
            registered_at: now,
        }
    }

    /// Node identifier.
    pub fn id(&self) -> &NodeId {
        &self.descriptor.id
    }

    /// Placement class.
    pub fn kind(&self) -> NodeKind {
        self.descriptor.kind
    }

    /// Whether the node accepts new connections.
    pub fn is_active(&self) -> bool {
        self.status == NodeStatus::Active
    }

    /// Apply a heartbeat, clamping every ratio into `[0, 1]`.
    pub fn apply_heartbeat(&mut self, report: HeartbeatReport, now: Timestamp) {
        self.metrics.uptime_ratio = clamp_unit(report.uptime_ratio);
        self.metrics.error_rate = clamp_unit(report.error_rate);
        self.metrics.throughput = if report.throughput.is_finite() {
            report.throughput.max(0.0)
        } else {
            0.0
        };
        self.metrics.last_heartbeat = Some(now);
    }
}

/// A point-to-point connection between two nodes.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Connection {
    /// Unique identifier
    pub id: ConnectionId,
    /// Initiating endpoint
    pub source: NodeId,
    /// Accepting endpoint
    pub target: NodeId,
    /// Physical medium
    pub channel: ChannelKind,
    /// Depletable resource pool
    pub resource_units: u64,
    /// Channel quality in `[0.5, 1.0]`
    pub quality: f64,
    /// Fixed at establishment
    pub latency: Duration,
    /// Fixed at establishment (units/sec)
    pub bandwidth: f64,
    /// Fixed at establishment (km)
    pub distance: f64,
    /// Lifecycle status
    pub status: ConnectionStatus,
    /// When the connection was established
    pub established_at: Timestamp,
    /// Last resource refresh, initially `established_at`
    pub last_refreshed: Timestamp,
    /// Failed regenerations in a row
    pub regeneration_failures: u32,
}

impl Connection {
    /// Whether the connection carries traffic.
    pub fn is_established(&self) -> bool {
        self.status == ConnectionStatus::Established
    }

    /// Whether `node` is one of the endpoints.
    pub fn touches(&self, node: &NodeId) -> bool {
        &self.source == node || &self.target == node
    }

    /// Whether the connection joins the unordered pair `{a, b}`.
    pub fn joins(&self, a: &NodeId, b: &NodeId) -> bool {
        (&self.source == a && &self.target == b) || (&self.source == b && &self.target == a)
    }

    /// The endpoint opposite `node`, if `node` is an endpoint.
    pub fn peer_of(&self, node: &NodeId) -> Option<&NodeId> {
        if &self.source == node {
            Some(&self.target)
        } else if &self.target == node {
            Some(&self.source)
        } else {
            None
        }
    }

    /// Load carried by the connection, `bandwidth * quality`.
    pub fn load(&self) -> f64 {
        self.bandwidth * self.quality
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_connection(source: &str, target: &str) -> Connection {
        Connection {
            id: ConnectionId::from("c-1"),
            source: NodeId::new(source),
            target: NodeId::new(target),
            channel: ChannelKind::Guided,
            resource_units: 100,
            quality: 0.9,
            latency: Duration::from_millis(3),
            bandwidth: 500.0,
            distance: 600.0,
            status: ConnectionStatus::Established,
            established_at: Timestamp::from_millis(0),
            last_refreshed: Timestamp::from_millis(0),
            regeneration_failures: 0,
        }
    }

    #[test]
    fn test_clamp_quality() {
        assert_eq!(clamp_quality(1.7), 1.0);
        assert_eq!(clamp_quality(0.1), 0.5);
        assert_eq!(clamp_quality(f64::NAN), 0.5);
        assert_eq!(clamp_quality(0.75), 0.75);
    }

    #[test]
    fn test_connection_joins_is_unordered() {
        let conn = make_connection("a", "b");
        assert!(conn.joins(&NodeId::new("a"), &NodeId::new("b")));
        assert!(conn.joins(&NodeId::new("b"), &NodeId::new("a")));
        assert!(!conn.joins(&NodeId::new("a"), &NodeId::new("c")));
    }

    #[test]
    fn test_peer_of() {
        let conn = make_connection("a", "b");
        assert_eq!(conn.peer_of(&NodeId::new("a")), Some(&NodeId::new("b")));
        assert_eq!(conn.peer_of(&NodeId::new("z")), None);
    }

    #[test]
    fn test_load() {
        let conn = make_connection("a", "b");
        assert!((conn.load() - 450.0).abs() < 1e-9);
    }

    #[test]
    fn test_heartbeat_clamps_ratios() {
        let descriptor = NodeDescriptor::new("n", Location::new(0.0, 0.0), NodeKind::Ground);
        let mut node = Node::new(descriptor, Timestamp::from_millis(0));
        node.apply_heartbeat(
            HeartbeatReport {
                uptime_ratio: 1.4,
                throughput: -3.0,
                error_rate: -0.2,
            },
            Timestamp::from_millis(10),
        );
        assert_eq!(node.metrics.uptime_ratio, 1.0);
        assert_eq!(node.metrics.error_rate, 0.0);
        assert_eq!(node.metrics.throughput, 0.0);
        assert_eq!(node.metrics.last_heartbeat, Some(Timestamp::from_millis(10)));
    }

    #[test]
    fn test_descriptor_validation() {
        let good = NodeDescriptor::new("n", Location::new(45.0, 9.0), NodeKind::Ground);
        assert!(good.validate().is_ok());
        let bad = NodeDescriptor::new("n", Location::new(95.0, 9.0), NodeKind::Ground);
        assert!(bad.validate().is_err());
        let negative = NodeDescriptor::new(
            "sat",
            Location::with_altitude(0.0, 0.0, -5.0),
            NodeKind::Orbital,
        );
        assert!(negative.validate().is_err());
    }
}
