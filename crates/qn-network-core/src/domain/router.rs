//! # Router
//!
//! Shortest-latency paths over established connections (Dijkstra).
//!
//! Single-source trees are cached per source and tagged with the topology
//! version they were computed from. A tree computed against an older version
//! is never served. Ties between equal-latency paths are broken by node id
//! so routes are reproducible.

use std::cmp::Reverse;
use std::collections::{BTreeMap, BTreeSet, BinaryHeap};
use std::time::Duration;

use super::topology::Topology;
use super::value_objects::NodeId;

/// Shortest-path tree rooted at one source.
#[derive(Clone, Debug, Default)]
struct PathTree {
    /// Total latency in nanoseconds from the source.
    distance: BTreeMap<NodeId, u128>,
    /// Predecessor on the chosen shortest path.
    previous: BTreeMap<NodeId, NodeId>,
}

impl PathTree {
    fn build(topology: &Topology, source: &NodeId) -> Self {
        let mut tree = Self::default();
        if topology.get_node(source).is_none() {
            return tree;
        }

        let mut adjacency: BTreeMap<&NodeId, Vec<(&NodeId, u128)>> = BTreeMap::new();
        for conn in topology.established_connections() {
            let weight = conn.latency.as_nanos();
            adjacency
                .entry(&conn.source)
                .or_default()
                .push((&conn.target, weight));
            adjacency
                .entry(&conn.target)
                .or_default()
                .push((&conn.source, weight));
        }

        let mut settled: BTreeSet<&NodeId> = BTreeSet::new();
        let mut heap = BinaryHeap::new();
        tree.distance.insert(source.clone(), 0);
        heap.push(Reverse((0u128, source)));

        while let Some(Reverse((dist, node))) = heap.pop() {
            if !settled.insert(node) {
                continue;
            }
            let Some(edges) = adjacency.get(node) else {
                continue;
            };
            for &(next, weight) in edges {
                if settled.contains(next) {
                    continue;
                }
                let candidate = dist + weight;
                let better = match tree.distance.get(next) {
                    None => true,
                    Some(&known) if candidate < known => true,
                    Some(&known) if candidate == known => tree
                        .previous
                        .get(next)
                        .is_some_and(|prev| node < prev),
                    Some(_) => false,
                };
                if better {
                    tree.distance.insert(next.clone(), candidate);
                    tree.previous.insert(next.clone(), node.clone());
                    heap.push(Reverse((candidate, next)));
                }
            }
        }
        tree
    }

    fn path_to(&self, source: &NodeId, destination: &NodeId) -> Option<(Vec<NodeId>, u128)> {
        let total = *self.distance.get(destination)?;
        let mut path = vec![destination.clone()];
        let mut cursor = destination;
        while cursor != source {
            cursor = self.previous.get(cursor)?;
            path.push(cursor.clone());
        }
        path.reverse();
        Some((path, total))
    }
}

/// Routing table derived from a `Topology`.
#[derive(Debug, Default)]
pub struct Router {
    trees: BTreeMap<NodeId, PathTree>,
    version: Option<u64>,
}

impl Router {
    /// Router with an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop every cached tree.
    pub fn invalidate(&mut self) {
        self.trees.clear();
        self.version = None;
    }

    /// Number of cached source trees.
    pub fn cached_sources(&self) -> usize {
        self.trees.len()
    }

    fn tree(&mut self, topology: &Topology, source: &NodeId) -> &PathTree {
        if self.version != Some(topology.version()) {
            self.trees.clear();
            self.version = Some(topology.version());
        }
        self.trees
            .entry(source.clone())
            .or_insert_with(|| PathTree::build(topology, source))
    }

    /// Minimum-latency path from `source` to `destination`, endpoints included.
    ///
    /// Empty when either node is unknown or no path exists. A route from a
    /// node to itself is `[source]`.
    pub fn route(
        &mut self,
        topology: &Topology,
        source: &NodeId,
        destination: &NodeId,
    ) -> Vec<NodeId> {
        self.route_with_latency(topology, source, destination)
            .map(|(path, _)| path)
            .unwrap_or_default()
    }

    /// Like [`Router::route`] but also returns the total latency.
    pub fn route_with_latency(
        &mut self,
        topology: &Topology,
        source: &NodeId,
        destination: &NodeId,
    ) -> Option<(Vec<NodeId>, Duration)> {
        if topology.get_node(destination).is_none() {
            return None;
        }
        let (path, nanos) = self.tree(topology, source).path_to(source, destination)?;
        let nanos = u64::try_from(nanos).unwrap_or(u64::MAX);
        Some((path, Duration::from_nanos(nanos)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{
        ChannelKind, Connection, ConnectionId, ConnectionStatus, Location, NodeDescriptor,
        NodeKind, Timestamp,
    };

    fn topology(ids: &[&str]) -> Topology {
        Topology::with_nodes(
            ids.iter()
                .map(|id| NodeDescriptor::new(*id, Location::new(0.0, 0.0), NodeKind::Ground)),
            Timestamp::from_millis(0),
        )
        .unwrap()
    }

    fn link(topo: &mut Topology, a: &str, b: &str, latency_ms: u64) -> ConnectionId {
        let (a, b) = (NodeId::new(a), NodeId::new(b));
        let id = topo.next_connection_id(&a, &b, Timestamp::from_millis(0));
        topo.add_connection(Connection {
            id: id.clone(),
            source: a,
            target: b,
            channel: ChannelKind::Guided,
            resource_units: 100,
            quality: 0.9,
            latency: Duration::from_millis(latency_ms),
            bandwidth: 100.0,
            distance: 1.0,
            status: ConnectionStatus::Established,
            established_at: Timestamp::from_millis(0),
            last_refreshed: Timestamp::from_millis(0),
            regeneration_failures: 0,
        })
        .unwrap();
        id
    }

    fn ids(path: &[&str]) -> Vec<NodeId> {
        path.iter().map(|s| NodeId::new(*s)).collect()
    }

    #[test]
    fn test_prefers_lower_total_latency() {
        let mut topo = topology(&["A", "B", "C"]);
        link(&mut topo, "A", "B", 1);
        link(&mut topo, "B", "C", 1);
        link(&mut topo, "A", "C", 5);
        let mut router = Router::new();

        assert_eq!(router.route(&topo, &"A".into(), &"C".into()), ids(&["A", "B", "C"]));
        let (_, latency) = router
            .route_with_latency(&topo, &"A".into(), &"C".into())
            .unwrap();
        assert_eq!(latency, Duration::from_millis(2));
    }

    #[test]
    fn test_disconnected_components_yield_empty_route() {
        let mut topo = topology(&["A", "B", "C", "D"]);
        link(&mut topo, "A", "B", 1);
        link(&mut topo, "C", "D", 1);
        let mut router = Router::new();
        assert!(router.route(&topo, &"A".into(), &"D".into()).is_empty());
    }

    #[test]
    fn test_unknown_nodes_and_self_route() {
        let topo = topology(&["A"]);
        let mut router = Router::new();
        assert!(router.route(&topo, &"A".into(), &"Z".into()).is_empty());
        assert!(router.route(&topo, &"Z".into(), &"A".into()).is_empty());
        assert_eq!(router.route(&topo, &"A".into(), &"A".into()), ids(&["A"]));
    }

    #[test]
    fn test_equal_paths_break_ties_by_node_id() {
        let mut topo = topology(&["S", "M1", "M2", "T"]);
        link(&mut topo, "S", "M2", 1);
        link(&mut topo, "M2", "T", 1);
        link(&mut topo, "S", "M1", 1);
        link(&mut topo, "M1", "T", 1);
        let mut router = Router::new();
        assert_eq!(router.route(&topo, &"S".into(), &"T".into()), ids(&["S", "M1", "T"]));
    }

    #[test]
    fn test_cache_follows_topology_changes() {
        let mut topo = topology(&["A", "B", "C"]);
        let ab = link(&mut topo, "A", "B", 1);
        link(&mut topo, "B", "C", 1);
        link(&mut topo, "A", "C", 5);
        let mut router = Router::new();
        assert_eq!(router.route(&topo, &"A".into(), &"C".into()).len(), 3);
        assert_eq!(router.cached_sources(), 1);

        topo.close_connection(&ab, ConnectionStatus::Disconnected);
        assert_eq!(router.route(&topo, &"A".into(), &"C".into()), ids(&["A", "C"]));
    }

    #[test]
    fn test_ignores_non_established_connections() {
        let mut topo = topology(&["A", "B"]);
        let ab = link(&mut topo, "A", "B", 1);
        topo.close_connection(&ab, ConnectionStatus::Error);
        let mut router = Router::new();
        assert!(router.route(&topo, &"A".into(), &"B".into()).is_empty());
    }
}
