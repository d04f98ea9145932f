//! # Connection Manager
//!
//! Establishment and teardown of connections, plus the resource and quality
//! adjustments the maintenance passes make. Every operation works on a
//! `NetworkState` the caller has already locked and invalidates the routing
//! cache in that same critical section.

use tracing::{debug, info};

use crate::domain::{
    assess_link, Connection, ConnectionId, ConnectionStatus, NetworkConfig, NetworkError, NodeId,
    Timestamp,
};
use crate::ports::RandomSource;

use super::core::NetworkState;

/// Lifecycle operations on connections.
#[derive(Clone, Copy)]
pub struct ConnectionManager<'a> {
    config: &'a NetworkConfig,
    random: &'a dyn RandomSource,
}

impl<'a> ConnectionManager<'a> {
    /// Bind a manager to a configuration and a random source.
    pub fn new(config: &'a NetworkConfig, random: &'a dyn RandomSource) -> Self {
        Self { config, random }
    }

    /// Establish a connection between two active nodes.
    ///
    /// Checks run in order: self-connection, both nodes known, both active,
    /// no established connection for the unordered pair, at least
    /// `resources.floor` units free on both endpoints. The link is then
    /// assessed and the establishment outcome drawn. A `LinkFailure` leaves
    /// the topology untouched. The initial pool is capped by the endpoint
    /// with the least free capacity.
    pub fn establish(
        &self,
        state: &mut NetworkState,
        source: &NodeId,
        target: &NodeId,
        now: Timestamp,
    ) -> Result<Connection, NetworkError> {
        if source == target {
            return Err(NetworkError::SelfConnection(source.clone()));
        }
        let topology = &state.topology;
        let a = topology
            .get_node(source)
            .ok_or_else(|| NetworkError::UnknownNode(source.clone()))?;
        let b = topology
            .get_node(target)
            .ok_or_else(|| NetworkError::UnknownNode(target.clone()))?;
        for node in [a, b] {
            if !node.is_active() {
                return Err(NetworkError::NodeNotActive {
                    node: node.id().clone(),
                    status: node.status,
                });
            }
        }
        if topology.established_between(source, target).is_some() {
            return Err(NetworkError::DuplicateConnection {
                from: source.clone(),
                to: target.clone(),
            });
        }

        let resources = &self.config.resources;
        let (tightest, free) = [source, target]
            .into_iter()
            .map(|id| (id, topology.available_units(id).unwrap_or(0)))
            .min_by_key(|&(_, free)| free)
            .unwrap_or((source, 0));
        if free < resources.floor {
            return Err(NetworkError::InsufficientCapacity {
                node: tightest.clone(),
                available: free,
                required: resources.floor,
            });
        }

        let link = assess_link(&a.descriptor, &b.descriptor, &self.config.physics, self.random);
        if !self
            .random
            .chance(self.config.establishment.success_probability)
        {
            debug!(source = %source, target = %target, channel = %link.channel, "Link establishment failed");
            return Err(NetworkError::LinkFailure {
                from: source.clone(),
                to: target.clone(),
            });
        }

        let units = self
            .random
            .range_inclusive(resources.initial_min, resources.initial_max)
            .min(free)
            .max(1);
        let id = state.topology.next_connection_id(source, target, now);
        let connection = Connection {
            id: id.clone(),
            source: source.clone(),
            target: target.clone(),
            channel: link.channel,
            resource_units: units,
            quality: link.quality,
            latency: link.latency,
            bandwidth: link.bandwidth,
            distance: link.distance,
            status: ConnectionStatus::Established,
            established_at: now,
            last_refreshed: now,
            regeneration_failures: 0,
        };
        state.topology.add_connection(connection)?;
        state.router.invalidate();

        info!(
            connection = %id,
            channel = %link.channel,
            distance_km = link.distance,
            latency_us = link.latency.as_micros() as u64,
            units,
            "Connection established"
        );
        state
            .topology
            .get_connection(&id)
            .cloned()
            .ok_or(NetworkError::UnknownConnection(id))
    }

    /// Mark a connection disconnected and detach it from both endpoints.
    ///
    /// Returns `false` for unknown or already-closed ids.
    pub fn teardown(&self, state: &mut NetworkState, id: &ConnectionId) -> bool {
        self.close(state, id, ConnectionStatus::Disconnected)
    }

    /// Mark a connection failed after repeated regeneration failures.
    pub fn fail(&self, state: &mut NetworkState, id: &ConnectionId) -> bool {
        self.close(state, id, ConnectionStatus::Error)
    }

    fn close(&self, state: &mut NetworkState, id: &ConnectionId, status: ConnectionStatus) -> bool {
        let closed = state.topology.close_connection(id, status);
        if closed {
            state.router.invalidate();
            debug!(connection = %id, status = %status, "Connection closed");
        }
        closed
    }

    /// Set the resource pool of a connection.
    pub fn reallocate(
        &self,
        state: &mut NetworkState,
        id: &ConnectionId,
        units: u64,
    ) -> Result<(), NetworkError> {
        state.topology.set_resources(id, units)?;
        state.router.invalidate();
        Ok(())
    }

    /// Set the quality of a connection (clamped).
    pub fn adjust_quality(
        &self,
        state: &mut NetworkState,
        id: &ConnectionId,
        quality: f64,
    ) -> Result<(), NetworkError> {
        state.topology.set_quality(id, quality)?;
        state.router.invalidate();
        Ok(())
    }

    /// Record a completed refresh.
    pub fn mark_refreshed(
        &self,
        state: &mut NetworkState,
        id: &ConnectionId,
        now: Timestamp,
        regeneration_failures: u32,
    ) -> Result<(), NetworkError> {
        state
            .topology
            .mark_refreshed(id, now, regeneration_failures)?;
        state.router.invalidate();
        Ok(())
    }

    /// Remove terminal connections from the registry.
    pub fn prune(&self, state: &mut NetworkState) -> usize {
        let pruned = state.topology.prune_terminal();
        if pruned > 0 {
            state.router.invalidate();
        }
        pruned
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::ScriptedRandomSource;
    use crate::domain::{Location, NodeDescriptor, NodeKind, NodeStatus, Topology};

    fn state() -> NetworkState {
        let nodes = vec![
            NodeDescriptor::new("a", Location::new(0.0, 0.0), NodeKind::Ground),
            NodeDescriptor::new(
                "sat",
                Location::with_altitude(0.0, 1.0, 550.0),
                NodeKind::Orbital,
            ),
        ];
        NetworkState::new(Topology::with_nodes(nodes, Timestamp::from_millis(0)).unwrap())
    }

    #[test]
    fn test_establish_success_draws_initial_units() {
        let config = NetworkConfig::default();
        // jitter, quality noise, bandwidth, outcome, units
        let rng = ScriptedRandomSource::new(vec![0.5, 0.5, 0.5, 0.0, 0.0]);
        let manager = ConnectionManager::new(&config, &rng);
        let mut state = state();

        let conn = manager
            .establish(&mut state, &"a".into(), &"sat".into(), Timestamp::from_millis(9))
            .unwrap();
        assert_eq!(conn.resource_units, config.resources.initial_min);
        assert_eq!(conn.status, ConnectionStatus::Established);
        assert_eq!(conn.established_at, Timestamp::from_millis(9));
        assert_eq!(rng.draws(), 5);
    }

    #[test]
    fn test_link_failure_leaves_topology_untouched() {
        let config = NetworkConfig::default();
        let rng = ScriptedRandomSource::constant(0.99);
        let manager = ConnectionManager::new(&config, &rng);
        let mut state = state();
        let version = state.topology.version();

        let err = manager
            .establish(&mut state, &"a".into(), &"sat".into(), Timestamp::from_millis(0))
            .unwrap_err();
        assert!(err.is_retryable());
        assert_eq!(state.topology.connection_count(), 0);
        assert_eq!(state.topology.version(), version);
    }

    #[test]
    fn test_rejects_inactive_and_self() {
        let config = NetworkConfig::default();
        let rng = ScriptedRandomSource::constant(0.0);
        let manager = ConnectionManager::new(&config, &rng);
        let mut state = state();

        let err = manager
            .establish(&mut state, &"a".into(), &"a".into(), Timestamp::from_millis(0))
            .unwrap_err();
        assert_eq!(err, NetworkError::SelfConnection("a".into()));

        state
            .topology
            .set_node_status(&"sat".into(), NodeStatus::Maintenance)
            .unwrap();
        let err = manager
            .establish(&mut state, &"a".into(), &"sat".into(), Timestamp::from_millis(0))
            .unwrap_err();
        assert!(matches!(err, NetworkError::NodeNotActive { .. }));
        assert_eq!(rng.draws(), 0);
    }

    #[test]
    fn test_teardown_is_idempotent() {
        let config = NetworkConfig::default();
        let rng = ScriptedRandomSource::constant(0.0);
        let manager = ConnectionManager::new(&config, &rng);
        let mut state = state();
        let conn = manager
            .establish(&mut state, &"a".into(), &"sat".into(), Timestamp::from_millis(0))
            .unwrap();

        assert!(manager.teardown(&mut state, &conn.id));
        assert!(!manager.teardown(&mut state, &conn.id));
        assert!(!manager.teardown(&mut state, &"missing".into()));
        assert_eq!(
            state.topology.get_connection(&conn.id).unwrap().status,
            ConnectionStatus::Disconnected
        );
        assert_eq!(manager.prune(&mut state), 1);
    }
}
