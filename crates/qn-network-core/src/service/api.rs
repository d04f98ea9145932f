use std::time::Duration;
use tracing::info;

use crate::domain::{
    Connection, ConnectionId, HeartbeatReport, NetworkError, NetworkStats, NodeDescriptor, NodeId,
    NodeStatus,
};
use crate::ports::{NodeRegistryApi, QuantumNetworkApi};
use crate::service::NetworkService;

impl QuantumNetworkApi for NetworkService {
    fn get_network_stats(&self) -> Result<NetworkStats, NetworkError> {
        let state = self.lock()?;
        Ok(state.topology.stats(&self.config.health))
    }

    fn establish_connection(
        &self,
        source: &NodeId,
        target: &NodeId,
    ) -> Result<Connection, NetworkError> {
        let now = self.now();
        let mut state = self.lock()?;
        self.connection_manager()
            .establish(&mut state, source, target, now)
    }

    fn teardown_connection(&self, id: &ConnectionId) -> Result<bool, NetworkError> {
        let mut state = self.lock()?;
        Ok(self.connection_manager().teardown(&mut state, id))
    }

    fn compute_route(
        &self,
        source: &NodeId,
        destination: &NodeId,
    ) -> Result<Vec<NodeId>, NetworkError> {
        let mut state = self.lock()?;
        let state = &mut *state;
        Ok(state.router.route(&state.topology, source, destination))
    }

    fn compute_route_with_latency(
        &self,
        source: &NodeId,
        destination: &NodeId,
    ) -> Result<Option<(Vec<NodeId>, Duration)>, NetworkError> {
        let mut state = self.lock()?;
        let state = &mut *state;
        Ok(state
            .router
            .route_with_latency(&state.topology, source, destination))
    }
}

impl NodeRegistryApi for NetworkService {
    fn add_node(&self, descriptor: NodeDescriptor) -> Result<(), NetworkError> {
        let now = self.now();
        let id = descriptor.id.clone();
        let mut state = self.lock()?;
        state.topology.add_node(descriptor, now)?;
        state.router.invalidate();
        info!(node = %id, "Node registered");
        Ok(())
    }

    fn remove_node(&self, id: &NodeId) -> Result<Vec<ConnectionId>, NetworkError> {
        let mut state = self.lock()?;
        let removed = state.topology.remove_node(id)?;
        state.router.invalidate();
        info!(node = %id, connections = removed.len(), "Node removed");
        Ok(removed)
    }

    fn set_node_status(&self, id: &NodeId, status: NodeStatus) -> Result<(), NetworkError> {
        let mut state = self.lock()?;
        state.topology.set_node_status(id, status)?;
        state.router.invalidate();
        Ok(())
    }

    fn record_heartbeat(&self, id: &NodeId, report: HeartbeatReport) -> Result<(), NetworkError> {
        let now = self.now();
        let mut state = self.lock()?;
        state.topology.record_heartbeat(id, report, now)
    }

    fn connections_of(&self, id: &NodeId) -> Result<Vec<Connection>, NetworkError> {
        let state = self.lock()?;
        let connections = state
            .topology
            .connections_of(id)?
            .into_iter()
            .cloned()
            .collect();
        Ok(connections)
    }
}
