//! # Topology
//!
//! Owns the node and connection registries. Every mutation goes through this
//! type, which is the only place the registry invariants are enforced:
//!
//! - a connection's endpoints always exist in the node registry
//! - at most one established connection per unordered node pair
//! - an established connection always holds at least one resource unit
//! - node ids are never reused once removed
//!
//! Nodes reference incident connections by id only. A monotonically
//! increasing `version` lets derived views (the router cache) detect change.

use std::collections::{BTreeMap, BTreeSet};

use super::entities::{
    clamp_quality, clamp_unit, Connection, HeartbeatReport, Node, NodeDescriptor,
};
use super::errors::NetworkError;
use super::value_objects::{ConnectionId, ConnectionStatus, NodeId, NodeStatus, Timestamp};

/// Node and connection registries.
#[derive(Debug, Default, Clone)]
pub struct Topology {
    nodes: BTreeMap<NodeId, Node>,
    connections: BTreeMap<ConnectionId, Connection>,
    retired_nodes: BTreeSet<NodeId>,
    next_sequence: u64,
    version: u64,
}

impl Topology {
    /// Empty topology.
    pub fn new() -> Self {
        Self::default()
    }

    /// Topology seeded with a static node registry.
    ///
    /// # Errors
    ///
    /// `DuplicateNode` if two descriptors share an id, or
    /// `InvalidConfiguration` for an invalid descriptor.
    pub fn with_nodes(
        descriptors: impl IntoIterator<Item = NodeDescriptor>,
        now: Timestamp,
    ) -> Result<Self, NetworkError> {
        let mut topology = Self::new();
        for descriptor in descriptors {
            topology.add_node(descriptor, now)?;
        }
        Ok(topology)
    }

    /// Counter bumped by every mutation.
    pub fn version(&self) -> u64 {
        self.version
    }

    fn touch(&mut self) {
        self.version = self.version.wrapping_add(1);
    }

    // =========================================================================
    // NODES
    // =========================================================================

    /// Register a node.
    pub fn add_node(
        &mut self,
        descriptor: NodeDescriptor,
        now: Timestamp,
    ) -> Result<(), NetworkError> {
        descriptor.validate()?;
        if self.nodes.contains_key(&descriptor.id) || self.retired_nodes.contains(&descriptor.id) {
            return Err(NetworkError::DuplicateNode(descriptor.id));
        }
        self.nodes
            .insert(descriptor.id.clone(), Node::new(descriptor, now));
        self.touch();
        Ok(())
    }

    /// Remove a node together with every connection touching it.
    ///
    /// Returns the ids of the removed connections. The node id is retired.
    pub fn remove_node(&mut self, id: &NodeId) -> Result<Vec<ConnectionId>, NetworkError> {
        let node = self
            .nodes
            .get(id)
            .ok_or_else(|| NetworkError::UnknownNode(id.clone()))?;
        let incident: Vec<ConnectionId> = self
            .connections
            .values()
            .filter(|c| c.touches(node.id()))
            .map(|c| c.id.clone())
            .collect();

        for conn_id in &incident {
            self.remove_connection(conn_id)?;
        }
        self.nodes.remove(id);
        self.retired_nodes.insert(id.clone());
        self.touch();
        Ok(incident)
    }

    /// Change a node's status.
    pub fn set_node_status(&mut self, id: &NodeId, status: NodeStatus) -> Result<(), NetworkError> {
        let node = self
            .nodes
            .get_mut(id)
            .ok_or_else(|| NetworkError::UnknownNode(id.clone()))?;
        node.status = status;
        self.touch();
        Ok(())
    }

    /// Apply a heartbeat report to a node.
    pub fn record_heartbeat(
        &mut self,
        id: &NodeId,
        report: HeartbeatReport,
        now: Timestamp,
    ) -> Result<(), NetworkError> {
        let node = self
            .nodes
            .get_mut(id)
            .ok_or_else(|| NetworkError::UnknownNode(id.clone()))?;
        node.apply_heartbeat(report, now);
        self.touch();
        Ok(())
    }

    /// Look up a node.
    pub fn get_node(&self, id: &NodeId) -> Option<&Node> {
        self.nodes.get(id)
    }

    /// All nodes ordered by id.
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    /// Number of registered nodes.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    // =========================================================================
    // CONNECTIONS
    // =========================================================================

    /// Allocate a fresh connection id for the pair.
    pub fn next_connection_id(
        &mut self,
        source: &NodeId,
        target: &NodeId,
        now: Timestamp,
    ) -> ConnectionId {
        self.next_sequence += 1;
        ConnectionId::derive(source, target, now, self.next_sequence)
    }

    /// The established connection joining `{a, b}`, if any.
    pub fn established_between(&self, a: &NodeId, b: &NodeId) -> Option<&Connection> {
        let node = self.nodes.get(a)?;
        node.connections
            .iter()
            .filter_map(|id| self.connections.get(id))
            .find(|c| c.is_established() && c.joins(a, b))
    }

    /// Register a connection and its endpoint back-references.
    ///
    /// # Errors
    ///
    /// - `UnknownNode` if an endpoint is missing
    /// - `SelfConnection` if both endpoints are the same node
    /// - `DuplicateConnection` if the pair already has an established connection
    ///   or the id is already registered
    /// - `InvalidConfiguration` if an established connection holds no resources
    /// - `InsufficientCapacity` if an endpoint cannot hold its resources
    pub fn add_connection(&mut self, connection: Connection) -> Result<(), NetworkError> {
        for endpoint in [&connection.source, &connection.target] {
            if !self.nodes.contains_key(endpoint) {
                return Err(NetworkError::UnknownNode(endpoint.clone()));
            }
        }
        if connection.source == connection.target {
            return Err(NetworkError::SelfConnection(connection.source));
        }
        let duplicate_pair = connection.is_established()
            && self
                .established_between(&connection.source, &connection.target)
                .is_some();
        if duplicate_pair || self.connections.contains_key(&connection.id) {
            return Err(NetworkError::DuplicateConnection {
                from: connection.source,
                to: connection.target,
            });
        }
        if connection.is_established() && connection.resource_units == 0 {
            return Err(NetworkError::invalid_config(format!(
                "connection {} established without resources",
                connection.id
            )));
        }
        if connection.is_established() {
            for endpoint in [&connection.source, &connection.target] {
                let available = self.available_units(endpoint).unwrap_or(0);
                if connection.resource_units > available {
                    return Err(NetworkError::InsufficientCapacity {
                        node: endpoint.clone(),
                        available,
                        required: connection.resource_units,
                    });
                }
            }
        }

        let mut connection = connection;
        connection.quality = clamp_quality(connection.quality);
        let (source, target) = (connection.source.clone(), connection.target.clone());
        for endpoint in [&source, &target] {
            if let Some(node) = self.nodes.get_mut(endpoint) {
                node.connections.insert(connection.id.clone());
            }
        }
        self.connections.insert(connection.id.clone(), connection);
        self.refresh_usage(&source);
        self.refresh_usage(&target);
        self.touch();
        Ok(())
    }

    /// Remove a connection from the registry entirely.
    pub fn remove_connection(&mut self, id: &ConnectionId) -> Result<Connection, NetworkError> {
        let connection = self
            .connections
            .remove(id)
            .ok_or_else(|| NetworkError::UnknownConnection(id.clone()))?;
        self.detach(&connection);
        self.touch();
        Ok(connection)
    }

    /// Move a connection to a terminal status and drop its back-references.
    ///
    /// Returns `false` (and changes nothing) if the id is unknown or the
    /// connection is already terminal.
    pub fn close_connection(&mut self, id: &ConnectionId, status: ConnectionStatus) -> bool {
        let Some(connection) = self.connections.get_mut(id) else {
            return false;
        };
        if connection.status.is_terminal() || !status.is_terminal() {
            return false;
        }
        connection.status = status;
        let snapshot = connection.clone();
        self.detach(&snapshot);
        self.touch();
        true
    }

    fn detach(&mut self, connection: &Connection) {
        for endpoint in [&connection.source, &connection.target] {
            if let Some(node) = self.nodes.get_mut(endpoint) {
                node.connections.remove(&connection.id);
            }
        }
        self.refresh_usage(&connection.source);
        self.refresh_usage(&connection.target);
    }

    /// Set the resource pool of a connection.
    ///
    /// An established connection never drops below one unit and never holds
    /// more than [`Topology::resource_limit`].
    pub fn set_resources(&mut self, id: &ConnectionId, units: u64) -> Result<(), NetworkError> {
        let limit = self
            .resource_limit(id)
            .ok_or_else(|| NetworkError::UnknownConnection(id.clone()))?;
        let connection = self
            .connections
            .get_mut(id)
            .ok_or_else(|| NetworkError::UnknownConnection(id.clone()))?;
        connection.resource_units = if connection.is_established() {
            units.min(limit).max(1)
        } else {
            units
        };
        let (source, target) = (connection.source.clone(), connection.target.clone());
        self.refresh_usage(&source);
        self.refresh_usage(&target);
        self.touch();
        Ok(())
    }

    /// Set the quality of a connection, clamped to `[0.5, 1.0]`.
    pub fn set_quality(&mut self, id: &ConnectionId, quality: f64) -> Result<(), NetworkError> {
        let connection = self
            .connections
            .get_mut(id)
            .ok_or_else(|| NetworkError::UnknownConnection(id.clone()))?;
        connection.quality = clamp_quality(quality);
        self.touch();
        Ok(())
    }

    /// Record the outcome of a resource refresh.
    pub fn mark_refreshed(
        &mut self,
        id: &ConnectionId,
        now: Timestamp,
        regeneration_failures: u32,
    ) -> Result<(), NetworkError> {
        let connection = self
            .connections
            .get_mut(id)
            .ok_or_else(|| NetworkError::UnknownConnection(id.clone()))?;
        connection.last_refreshed = now;
        connection.regeneration_failures = regeneration_failures;
        self.touch();
        Ok(())
    }

    /// Drop every terminal connection from the registry.
    pub fn prune_terminal(&mut self) -> usize {
        let before = self.connections.len();
        self.connections.retain(|_, c| !c.status.is_terminal());
        let pruned = before - self.connections.len();
        if pruned > 0 {
            self.touch();
        }
        pruned
    }

    /// Look up a connection.
    pub fn get_connection(&self, id: &ConnectionId) -> Option<&Connection> {
        self.connections.get(id)
    }

    /// All connections ordered by id.
    pub fn all_connections(&self) -> impl Iterator<Item = &Connection> {
        self.connections.values()
    }

    /// Established connections ordered by id.
    pub fn established_connections(&self) -> impl Iterator<Item = &Connection> {
        self.connections.values().filter(|c| c.is_established())
    }

    /// Connections currently attached to a node.
    pub fn connections_of(&self, id: &NodeId) -> Result<Vec<&Connection>, NetworkError> {
        let node = self
            .nodes
            .get(id)
            .ok_or_else(|| NetworkError::UnknownNode(id.clone()))?;
        Ok(node
            .connections
            .iter()
            .filter_map(|conn_id| self.connections.get(conn_id))
            .collect())
    }

    /// Number of registered connections, terminal ones included.
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    // =========================================================================
    // CAPACITY
    // =========================================================================

    /// Resource units held by the node's established connections.
    pub fn held_units(&self, id: &NodeId) -> Option<u64> {
        let node = self.nodes.get(id)?;
        Some(
            node.connections
                .iter()
                .filter_map(|conn_id| self.connections.get(conn_id))
                .filter(|c| c.is_established())
                .fold(0u64, |acc, c| acc.saturating_add(c.resource_units)),
        )
    }

    /// Units the node can still take before reaching `max_resource_units`.
    pub fn available_units(&self, id: &NodeId) -> Option<u64> {
        let node = self.nodes.get(id)?;
        let held = self.held_units(id)?;
        Some(
            node.descriptor
                .capability
                .max_resource_units
                .saturating_sub(held),
        )
    }

    /// Most units a connection may hold given what both endpoints have left.
    pub fn resource_limit(&self, id: &ConnectionId) -> Option<u64> {
        let connection = self.connections.get(id)?;
        let own = if connection.is_established() {
            connection.resource_units
        } else {
            0
        };
        let free = [&connection.source, &connection.target]
            .into_iter()
            .map(|endpoint| self.available_units(endpoint).unwrap_or(0))
            .min()
            .unwrap_or(0);
        Some(own.saturating_add(free))
    }

    fn refresh_usage(&mut self, id: &NodeId) {
        let (Some(node), Some(held)) = (self.nodes.get(id), self.held_units(id)) else {
            return;
        };
        let capacity = node.descriptor.capability.max_resource_units.max(1);
        let ratio = clamp_unit(held as f64 / capacity as f64);
        if let Some(node) = self.nodes.get_mut(id) {
            node.metrics.resource_usage_ratio = ratio;
        }
    }
}
