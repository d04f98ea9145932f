//! Tests for NetworkService

use super::*;
use crate::adapters::{InMemoryAlertSink, ManualTimeSource, ScriptedRandomSource};
use crate::domain::{
    AlertLevel, AlertSubject, Capability, ChannelKind, Connection, ConnectionId, ConnectionStatus,
    HeartbeatReport, Location, NetworkConfig, NetworkError, NodeDescriptor, NodeId, NodeKind,
    NodeStatus, Timestamp,
};
use crate::ports::{NodeRegistryApi, QuantumNetworkApi};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

struct Harness {
    service: NetworkService,
    clock: Arc<ManualTimeSource>,
    alerts: Arc<InMemoryAlertSink>,
}

/// Ground nodes strung along the equator, one degree apart.
fn descriptors(ids: &[&str]) -> Vec<NodeDescriptor> {
    ids.iter()
        .enumerate()
        .map(|(i, id)| NodeDescriptor::new(*id, Location::new(0.0, i as f64), NodeKind::Ground))
        .collect()
}

fn with_capacity(descriptor: NodeDescriptor, max_resource_units: u64) -> NodeDescriptor {
    let capability = Capability {
        max_resource_units,
        ..Capability::default()
    };
    descriptor.with_capability(capability)
}

fn harness_with(config: NetworkConfig, draws: Vec<f64>) -> Harness {
    let clock = Arc::new(ManualTimeSource::new(Timestamp::from_millis(0)));
    let alerts = Arc::new(InMemoryAlertSink::new());
    let service = NetworkService::builder(config)
        .random_source(Arc::new(ScriptedRandomSource::new(draws)))
        .time_source(clock.clone())
        .alert_sink(alerts.clone())
        .build()
        .unwrap();
    Harness {
        service,
        clock,
        alerts,
    }
}

fn harness(ids: &[&str], draws: Vec<f64>) -> Harness {
    let mut config = NetworkConfig::for_testing();
    config.nodes = descriptors(ids);
    harness_with(config, draws)
}

/// Insert an established connection with exact properties.
fn insert_link(
    service: &NetworkService,
    a: &str,
    b: &str,
    bandwidth: f64,
    quality: f64,
    units: u64,
) -> ConnectionId {
    let mut state = service.state.lock();
    let (a, b) = (NodeId::new(a), NodeId::new(b));
    let id = state.topology.next_connection_id(&a, &b, Timestamp::from_millis(0));
    state
        .topology
        .add_connection(Connection {
            id: id.clone(),
            source: a,
            target: b,
            channel: ChannelKind::Guided,
            resource_units: units,
            quality,
            latency: Duration::from_millis(1),
            bandwidth,
            distance: 100.0,
            status: ConnectionStatus::Established,
            established_at: Timestamp::from_millis(0),
            last_refreshed: Timestamp::from_millis(0),
            regeneration_failures: 0,
        })
        .unwrap();
    id
}

fn connection(service: &NetworkService, id: &ConnectionId) -> Connection {
    service
        .state
        .lock()
        .topology
        .get_connection(id)
        .cloned()
        .unwrap()
}

// =============================================================================
// CONSTRUCTION
// =============================================================================

#[test]
fn test_build_rejects_invalid_configuration() {
    let mut config = NetworkConfig::for_testing();
    config.establishment.success_probability = -0.1;
    let result = NetworkService::builder(config).build();
    assert!(matches!(result, Err(NetworkError::InvalidConfiguration(_))));
}

#[test]
fn test_build_registers_static_nodes() {
    let h = harness(&["a", "b", "c"], vec![0.0]);
    let stats = h.service.get_network_stats().unwrap();
    assert_eq!(stats.node_count, 3);
    assert_eq!(stats.active_node_count, 3);
    assert_eq!(stats.connection_count, 0);
}

// =============================================================================
// COMMANDS
// =============================================================================

#[test]
fn test_establish_updates_stats() {
    let h = harness(&["a", "b"], vec![0.0]);
    let conn = h
        .service
        .establish_connection(&"a".into(), &"b".into())
        .unwrap();

    assert_eq!(conn.channel, ChannelKind::Guided);
    assert!(conn.resource_units > 0);
    let stats = h.service.get_network_stats().unwrap();
    assert_eq!(stats.established_connection_count, 1);
    assert_eq!(stats.mean_latency, conn.latency);
    assert!((stats.mean_quality - conn.quality).abs() < 1e-12);
}

#[test]
fn test_duplicate_pair_rejected_without_mutation() {
    let h = harness(&["a", "b"], vec![0.0]);
    h.service
        .establish_connection(&"a".into(), &"b".into())
        .unwrap();
    let before = h.service.get_network_stats().unwrap();

    let err = h
        .service
        .establish_connection(&"b".into(), &"a".into())
        .unwrap_err();
    assert!(matches!(err, NetworkError::DuplicateConnection { .. }));
    assert!(!err.is_retryable());
    assert_eq!(h.service.get_network_stats().unwrap(), before);
}

#[test]
fn test_establish_respects_hub_capacity() {
    let mut config = NetworkConfig::for_testing();
    config.nodes = descriptors(&["hub", "x", "y", "z"]);
    config.nodes[0] = with_capacity(config.nodes[0].clone(), 60);
    let h = harness_with(config, vec![0.0]);
    let hub = NodeId::new("hub");

    let first = h.service.establish_connection(&hub, &"x".into()).unwrap();
    assert_eq!(first.resource_units, 50);
    let second = h.service.establish_connection(&hub, &"y".into()).unwrap();
    assert_eq!(second.resource_units, 10);

    let err = h
        .service
        .establish_connection(&hub, &"z".into())
        .unwrap_err();
    assert_eq!(
        err,
        NetworkError::InsufficientCapacity {
            node: hub.clone(),
            available: 0,
            required: 10,
        }
    );
    assert!(!err.is_retryable());

    let topology = h.service.topology_snapshot().unwrap();
    assert_eq!(topology.connection_count(), 2);
    assert_eq!(topology.held_units(&hub), Some(60));
    assert_eq!(
        topology.get_node(&hub).unwrap().metrics.resource_usage_ratio,
        1.0
    );
}

#[test]
fn test_unknown_node_is_reported() {
    let h = harness(&["a"], vec![0.0]);
    let err = h
        .service
        .establish_connection(&"a".into(), &"ghost".into())
        .unwrap_err();
    assert_eq!(err, NetworkError::UnknownNode("ghost".into()));
}

#[test]
fn test_link_failure_is_retryable_and_leaves_no_trace() {
    let h = harness(&["a", "b"], vec![0.99]);
    let err = h
        .service
        .establish_connection(&"a".into(), &"b".into())
        .unwrap_err();
    assert!(matches!(err, NetworkError::LinkFailure { .. }));
    assert!(err.is_retryable());
    assert_eq!(h.service.get_network_stats().unwrap().connection_count, 0);
}

#[test]
fn test_teardown_is_idempotent_and_detaches() {
    let h = harness(&["a", "b"], vec![0.0]);
    let conn = h
        .service
        .establish_connection(&"a".into(), &"b".into())
        .unwrap();

    assert!(h.service.teardown_connection(&conn.id).unwrap());
    assert!(!h.service.teardown_connection(&conn.id).unwrap());
    assert!(!h.service.teardown_connection(&"unknown".into()).unwrap());
    assert!(h.service.connections_of(&"a".into()).unwrap().is_empty());
    assert!(h.service.connections_of(&"b".into()).unwrap().is_empty());

    // The pair can be connected again under a fresh id.
    let again = h
        .service
        .establish_connection(&"a".into(), &"b".into())
        .unwrap();
    assert_ne!(again.id, conn.id);
}

#[test]
fn test_route_never_uses_torn_down_edge() {
    let h = harness(&["a", "b", "c"], vec![0.0]);
    let ab = h
        .service
        .establish_connection(&"a".into(), &"b".into())
        .unwrap();
    h.service
        .establish_connection(&"b".into(), &"c".into())
        .unwrap();

    let route = h.service.compute_route(&"a".into(), &"c".into()).unwrap();
    assert_eq!(route, vec![NodeId::new("a"), NodeId::new("b"), NodeId::new("c")]);

    h.service.teardown_connection(&ab.id).unwrap();
    assert!(h
        .service
        .compute_route(&"a".into(), &"c".into())
        .unwrap()
        .is_empty());
}

#[test]
fn test_route_with_latency_sums_hops() {
    let h = harness(&["a", "b", "c"], vec![0.0]);
    let ab = h
        .service
        .establish_connection(&"a".into(), &"b".into())
        .unwrap();
    let bc = h
        .service
        .establish_connection(&"b".into(), &"c".into())
        .unwrap();

    let (path, latency) = h
        .service
        .compute_route_with_latency(&"a".into(), &"c".into())
        .unwrap()
        .unwrap();
    assert_eq!(path.len(), 3);
    assert_eq!(latency, ab.latency + bc.latency);
}

#[test]
fn test_concurrent_establishment_keeps_pair_unique() {
    let h = harness(&["a", "b"], vec![0.0]);
    let service = Arc::new(h.service);

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let service = Arc::clone(&service);
            thread::spawn(move || {
                let (s, t) = if i % 2 == 0 { ("a", "b") } else { ("b", "a") };
                service.establish_connection(&s.into(), &t.into()).is_ok()
            })
        })
        .collect();
    let successes = handles
        .into_iter()
        .map(|h| h.join().unwrap())
        .filter(|ok| *ok)
        .count();

    assert_eq!(successes, 1);
    assert_eq!(
        service
            .get_network_stats()
            .unwrap()
            .established_connection_count,
        1
    );
}

#[test]
fn test_lock_contention_times_out() {
    let h = harness(&["a", "b"], vec![0.0]);
    let _guard = h.service.state.lock();
    let err = h.service.get_network_stats().unwrap_err();
    assert!(matches!(err, NetworkError::Timeout(_)));
    assert!(err.is_retryable());
}

// =============================================================================
// NODE REGISTRY
// =============================================================================

#[test]
fn test_remove_node_cascades_and_retires_id() {
    let h = harness(&["a", "b", "c"], vec![0.0]);
    h.service
        .establish_connection(&"a".into(), &"b".into())
        .unwrap();
    h.service
        .establish_connection(&"b".into(), &"c".into())
        .unwrap();

    let removed = h.service.remove_node(&"b".into()).unwrap();
    assert_eq!(removed.len(), 2);
    let stats = h.service.get_network_stats().unwrap();
    assert_eq!(stats.node_count, 2);
    assert_eq!(stats.connection_count, 0);

    let err = h
        .service
        .add_node(NodeDescriptor::new("b", Location::new(0.0, 0.0), NodeKind::Ground))
        .unwrap_err();
    assert_eq!(err, NetworkError::DuplicateNode("b".into()));
}

#[test]
fn test_inactive_node_cannot_connect() {
    let h = harness(&["a", "b"], vec![0.0]);
    h.service
        .set_node_status(&"b".into(), NodeStatus::Idle)
        .unwrap();
    let err = h
        .service
        .establish_connection(&"a".into(), &"b".into())
        .unwrap_err();
    assert_eq!(
        err,
        NetworkError::NodeNotActive {
            node: "b".into(),
            status: NodeStatus::Idle
        }
    );
}

#[test]
fn test_heartbeat_updates_metrics() {
    let h = harness(&["a"], vec![0.0]);
    h.clock.advance(Duration::from_secs(5));
    h.service
        .record_heartbeat(
            &"a".into(),
            HeartbeatReport {
                uptime_ratio: 0.9,
                throughput: 12.0,
                error_rate: 0.05,
            },
        )
        .unwrap();
    let topology = h.service.topology_snapshot().unwrap();
    let node = topology.get_node(&"a".into()).unwrap();
    assert_eq!(node.metrics.uptime_ratio, 0.9);
    assert_eq!(node.metrics.last_heartbeat, Some(Timestamp::from_millis(5_000)));
}

// =============================================================================
// MONITOR
// =============================================================================

#[test]
fn test_monitor_quiet_on_healthy_network() {
    let h = harness(&["a", "b"], vec![0.0]);
    insert_link(&h.service, "a", "b", 100.0, 0.95, 100);
    let report = h.service.run_monitor().unwrap();
    assert_eq!(report.warnings, 0);
    assert_eq!(report.criticals, 0);
    assert!(h.alerts.is_empty());
}

#[test]
fn test_monitor_warns_on_low_quality() {
    let h = harness(&["a", "b"], vec![0.0]);
    let id = insert_link(&h.service, "a", "b", 100.0, 0.6, 100);
    let report = h.service.run_monitor().unwrap();

    assert_eq!(report.warnings, 1);
    let alerts = h.alerts.drain();
    assert_eq!(alerts[0].subject, AlertSubject::Connection);
    assert_eq!(alerts[0].id, id.as_str());
}

fn healthy_heartbeat() -> HeartbeatReport {
    HeartbeatReport {
        uptime_ratio: 1.0,
        throughput: 10.0,
        error_rate: 0.0,
    }
}

#[test]
fn test_monitor_warns_on_stale_heartbeat() {
    let h = harness(&["a", "b"], vec![0.0]);
    insert_link(&h.service, "a", "b", 100.0, 0.95, 100);
    for id in ["a", "b"] {
        h.service
            .record_heartbeat(&id.into(), healthy_heartbeat())
            .unwrap();
    }
    h.clock.advance(Duration::from_secs(120));
    let report = h.service.run_monitor().unwrap();

    assert_eq!(report.warnings, 2);
    assert!(h
        .alerts
        .alerts()
        .iter()
        .all(|a| a.subject == AlertSubject::Node && a.level == AlertLevel::Warning));
}

#[test]
fn test_monitor_ignores_nodes_that_never_reported() {
    let h = harness(&["a", "b"], vec![0.0]);
    insert_link(&h.service, "a", "b", 100.0, 0.95, 100);
    h.service
        .record_heartbeat(&"a".into(), healthy_heartbeat())
        .unwrap();
    h.clock.advance(Duration::from_secs(3_600));

    let report = h.service.run_monitor().unwrap();
    assert_eq!(report.warnings, 1);
    assert_eq!(h.alerts.alerts()[0].id, "a");

    h.alerts.drain();
    h.service
        .record_heartbeat(&"a".into(), healthy_heartbeat())
        .unwrap();
    assert_eq!(h.service.run_monitor().unwrap().warnings, 0);
}

#[test]
fn test_monitor_critical_when_network_offline() {
    let h = harness(&["a", "b"], vec![0.0]);
    for id in ["a", "b"] {
        h.service
            .set_node_status(&id.into(), NodeStatus::Offline)
            .unwrap();
    }
    let report = h.service.run_monitor().unwrap();

    assert!(report.health_score < 0.5);
    assert_eq!(report.criticals, 1);
    assert_eq!(report.warnings, 2);
    let critical: Vec<_> = h
        .alerts
        .alerts()
        .into_iter()
        .filter(|a| a.level == AlertLevel::Critical)
        .collect();
    assert_eq!(critical[0].subject, AlertSubject::Network);
}

#[test]
fn test_monitor_delivers_alerts_outside_lock() {
    struct LockProbe {
        service: std::sync::OnceLock<Arc<NetworkService>>,
        observed_free: parking_lot::Mutex<Vec<bool>>,
    }
    impl crate::ports::AlertSink for LockProbe {
        fn emit(&self, _alert: crate::domain::Alert) {
            if let Some(service) = self.service.get() {
                self.observed_free
                    .lock()
                    .push(service.state.try_lock().is_some());
            }
        }
    }

    let probe = Arc::new(LockProbe {
        service: std::sync::OnceLock::new(),
        observed_free: parking_lot::Mutex::new(Vec::new()),
    });
    let mut config = NetworkConfig::for_testing();
    config.nodes = descriptors(&["a"]);
    let service = Arc::new(
        NetworkService::builder(config)
            .random_source(Arc::new(ScriptedRandomSource::constant(0.0)))
            .alert_sink(probe.clone())
            .build()
            .unwrap(),
    );
    let _ = probe.service.set(Arc::clone(&service));

    service
        .set_node_status(&"a".into(), NodeStatus::Offline)
        .unwrap();
    service.run_monitor().unwrap();

    let observed = probe.observed_free.lock().clone();
    assert!(!observed.is_empty());
    assert!(observed.iter().all(|free| *free));
}

// =============================================================================
// TRAFFIC
// =============================================================================

#[test]
fn test_traffic_boosts_heavy_and_sheds_light() {
    let h = harness(&["a", "b", "c", "d"], vec![0.0]);
    let heavy = insert_link(&h.service, "a", "b", 1000.0, 0.9, 100);
    let light = insert_link(&h.service, "b", "c", 100.0, 0.9, 100);
    let other = insert_link(&h.service, "c", "d", 100.0, 0.9, 100);
    let before = connection(&h.service, &heavy);

    let report = h.service.run_traffic_management().unwrap();
    assert_eq!(report.boosted, 1);
    assert_eq!(report.shed, 2);
    assert!((report.mean_load - 360.0).abs() < 1e-9);

    let after = connection(&h.service, &heavy);
    assert_eq!(after.resource_units, 110);
    assert!((after.quality - 0.91).abs() < 1e-9);
    assert_eq!(after.latency, before.latency);
    assert_eq!(after.bandwidth, before.bandwidth);
    assert_eq!(after.distance, before.distance);

    assert_eq!(connection(&h.service, &light).resource_units, 95);
    assert_eq!(connection(&h.service, &other).resource_units, 95);
}

#[test]
fn test_traffic_respects_floor_and_ceiling() {
    let mut config = NetworkConfig::for_testing();
    config.nodes = descriptors(&["a", "b", "c"])
        .into_iter()
        .map(|d| with_capacity(d, 2_000))
        .collect();
    let h = harness_with(config, vec![0.0]);
    let heavy = insert_link(&h.service, "a", "b", 1000.0, 1.0, 995);
    let light = insert_link(&h.service, "b", "c", 10.0, 0.9, 12);

    h.service.run_traffic_management().unwrap();
    let heavy = connection(&h.service, &heavy);
    assert_eq!(heavy.resource_units, 1000);
    assert_eq!(heavy.quality, 1.0);
    assert_eq!(connection(&h.service, &light).resource_units, 10);
}

#[test]
fn test_traffic_boost_limited_by_node_capacity() {
    let mut config = NetworkConfig::for_testing();
    config.nodes = descriptors(&["a", "b", "c", "d"]);
    config.nodes[1] = with_capacity(config.nodes[1].clone(), 205);
    let h = harness_with(config, vec![0.0]);
    let heavy = insert_link(&h.service, "a", "b", 1000.0, 0.9, 100);
    insert_link(&h.service, "b", "c", 100.0, 0.9, 100);
    insert_link(&h.service, "c", "d", 100.0, 0.9, 100);

    let report = h.service.run_traffic_management().unwrap();
    assert_eq!(report.boosted, 1);
    // b has 5 units free when a-b is boosted.
    let heavy = connection(&h.service, &heavy);
    assert_eq!(heavy.resource_units, 105);
    assert!((heavy.quality - 0.91).abs() < 1e-9);
    let held = h.service.state.lock().topology.held_units(&"b".into());
    assert_eq!(held, Some(200));
}

#[test]
fn test_traffic_on_empty_network() {
    let h = harness(&["a"], vec![0.0]);
    assert_eq!(
        h.service.run_traffic_management().unwrap(),
        TrafficReport::default()
    );
}

// =============================================================================
// REFRESH
// =============================================================================

#[test]
fn test_refresh_applies_exponential_decay() {
    let h = harness(&["a", "b"], vec![0.5]);
    let id = insert_link(&h.service, "a", "b", 100.0, 0.9, 100);
    h.clock.set(Timestamp::from_millis(1_000_000));

    let report = h.service.run_resource_refresh().unwrap();
    assert_eq!(report.refreshed, 1);
    assert_eq!(report.regenerated, 0);

    let conn = connection(&h.service, &id);
    // 100 * e^-1
    assert_eq!(conn.resource_units, 36);
    assert_eq!(conn.last_refreshed, Timestamp::from_millis(1_000_000));
    assert!((conn.quality - 0.9).abs() < 1e-9);
}

#[test]
fn test_refresh_regenerates_below_floor() {
    let h = harness(&["a", "b"], vec![0.0]);
    let id = insert_link(&h.service, "a", "b", 100.0, 0.9, 20);
    h.clock.set(Timestamp::from_millis(10_000_000));

    let report = h.service.run_resource_refresh().unwrap();
    assert_eq!(report.regenerated, 1);
    let conn = connection(&h.service, &id);
    assert_eq!(conn.resource_units, 50);
    assert_eq!(conn.regeneration_failures, 0);
    assert!(conn.quality >= 0.5);
}

#[test]
fn test_refresh_regeneration_limited_by_node_capacity() {
    let mut config = NetworkConfig::for_testing();
    config.nodes = descriptors(&["a", "b", "c"]);
    config.nodes[1] = with_capacity(config.nodes[1].clone(), 60);
    let h = harness_with(config, vec![0.0]);
    let depleted = insert_link(&h.service, "a", "b", 100.0, 0.9, 20);
    let steady = insert_link(&h.service, "b", "c", 100.0, 0.9, 30);
    h.clock.set(Timestamp::from_millis(10_000_000));

    let report = h.service.run_resource_refresh().unwrap();
    assert_eq!(report.regenerated, 2);
    // Each pool would regain 50 units; b only has room for 60 in total.
    assert_eq!(connection(&h.service, &depleted).resource_units, 30);
    assert_eq!(connection(&h.service, &steady).resource_units, 30);
    let state = h.service.state.lock();
    assert_eq!(state.topology.held_units(&"b".into()), Some(60));
    let node = state.topology.get_node(&"b".into()).unwrap();
    assert_eq!(node.metrics.resource_usage_ratio, 1.0);
}

#[test]
fn test_refresh_fails_connection_after_repeated_failures() {
    let h = harness(&["a", "b"], vec![0.95]);
    let id = insert_link(&h.service, "a", "b", 100.0, 0.9, 5);

    for round in 1..=2u32 {
        h.clock.advance(Duration::from_secs(100));
        let report = h.service.run_resource_refresh().unwrap();
        assert_eq!(report.regeneration_failures, 1);
        let conn = connection(&h.service, &id);
        assert_eq!(conn.resource_units, 10);
        assert_eq!(conn.regeneration_failures, round);
    }

    h.clock.advance(Duration::from_secs(100));
    let report = h.service.run_resource_refresh().unwrap();
    assert_eq!(report.torn_down, 1);
    assert_eq!(report.pruned, 1);
    assert!(h.service.connections_of(&"a".into()).unwrap().is_empty());
    assert_eq!(h.service.get_network_stats().unwrap().connection_count, 0);
}

#[test]
fn test_refresh_never_tears_down_when_disabled() {
    let mut config = NetworkConfig::for_testing();
    config.nodes = descriptors(&["a", "b"]);
    config.resources.teardown_after_failures = 0;
    let h = harness_with(config, vec![0.95]);
    let id = insert_link(&h.service, "a", "b", 100.0, 0.9, 5);

    for _ in 0..10 {
        h.clock.advance(Duration::from_secs(100));
        let report = h.service.run_resource_refresh().unwrap();
        assert_eq!(report.torn_down, 0);
    }
    let conn = connection(&h.service, &id);
    assert!(conn.is_established());
    assert_eq!(conn.resource_units, 10);
}

#[test]
fn test_refresh_prunes_torn_down_connections() {
    let h = harness(&["a", "b"], vec![0.5]);
    let id = insert_link(&h.service, "a", "b", 100.0, 0.9, 100);
    h.service.teardown_connection(&id).unwrap();

    let report = h.service.run_resource_refresh().unwrap();
    assert_eq!(report.refreshed, 0);
    assert_eq!(report.pruned, 1);
    assert!(h.service.state.lock().topology.get_connection(&id).is_none());
}
