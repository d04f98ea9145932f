//! # Maintenance Passes
//!
//! The three periodic passes the scheduler drives. Each acquires the state
//! lock with the scheduler tick timeout, works in `O(nodes + connections)`
//! and skips (with a warning) any single item it cannot process rather than
//! aborting the pass.

use serde::Serialize;
use tracing::{debug, warn};

use crate::domain::{
    node_health, Alert, AlertLevel, AlertSubject, ConnectionId, NetworkError, NodeStatus,
};

use super::core::NetworkService;

/// Outcome of one monitor pass.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct MonitorReport {
    /// Aggregate health at the time of the pass
    pub health_score: f64,
    /// Warnings emitted
    pub warnings: usize,
    /// Critical alerts emitted
    pub criticals: usize,
}

/// Outcome of one traffic-management pass.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct TrafficReport {
    /// Mean `bandwidth * quality` over established connections
    pub mean_load: f64,
    /// Heavily loaded connections given priority
    pub boosted: usize,
    /// Connections that gave resources back
    pub shed: usize,
    /// Connections skipped because of a fault
    pub skipped: usize,
}

/// Outcome of one resource-refresh pass.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct RefreshReport {
    /// Connections decayed and refreshed
    pub refreshed: usize,
    /// Connections replenished after dropping below the floor
    pub regenerated: usize,
    /// Failed regeneration attempts
    pub regeneration_failures: usize,
    /// Connections failed after too many consecutive regeneration failures
    pub torn_down: usize,
    /// Terminal connections removed from the registry
    pub pruned: usize,
    /// Connections skipped because of a fault
    pub skipped: usize,
}

fn count_level(alerts: &[Alert], level: AlertLevel) -> usize {
    alerts.iter().filter(|a| a.level == level).count()
}

impl NetworkService {
    /// Check health thresholds and emit alerts.
    ///
    /// Alerts are collected under the lock and delivered after it is released.
    pub fn run_monitor(&self) -> Result<MonitorReport, NetworkError> {
        let health = &self.config.health;
        let now = self.now();
        let mut alerts = Vec::new();

        let score = {
            let state = self.lock_within(self.config.scheduler.tick_timeout)?;
            let topology = &state.topology;
            let score = topology.health_score(health);

            for conn in topology.established_connections() {
                if conn.quality < health.quality_warning {
                    alerts.push(Alert::warning(
                        AlertSubject::Connection,
                        conn.id.as_str(),
                        format!("quality {:.3} below {:.3}", conn.quality, health.quality_warning),
                        now,
                    ));
                }
            }

            let heartbeat_timeout = health.heartbeat_timeout.as_secs_f64();
            for node in topology.nodes() {
                let node_score = node_health(node);
                if node_score < health.node_health_warning {
                    alerts.push(Alert::warning(
                        AlertSubject::Node,
                        node.id().as_str(),
                        format!(
                            "health {:.3} below {:.3} ({})",
                            node_score, health.node_health_warning, node.status
                        ),
                        now,
                    ));
                }
                // Nodes that have never reported are not expected to.
                let Some(last_heartbeat) = node.metrics.last_heartbeat else {
                    continue;
                };
                let silent_for = now.secs_since(last_heartbeat);
                if node.status != NodeStatus::Offline && silent_for > heartbeat_timeout {
                    alerts.push(Alert::warning(
                        AlertSubject::Node,
                        node.id().as_str(),
                        format!("no heartbeat for {silent_for:.0}s"),
                        now,
                    ));
                }
            }

            if score < health.network_critical {
                alerts.push(Alert::critical(
                    AlertSubject::Network,
                    "network",
                    format!("health {:.3} below {:.3}", score, health.network_critical),
                    now,
                ));
            } else if score < health.network_warning {
                alerts.push(Alert::warning(
                    AlertSubject::Network,
                    "network",
                    format!("health {:.3} below {:.3}", score, health.network_warning),
                    now,
                ));
            }
            score
        };

        let report = MonitorReport {
            health_score: score,
            warnings: count_level(&alerts, AlertLevel::Warning),
            criticals: count_level(&alerts, AlertLevel::Critical),
        };
        self.deliver(alerts);
        debug!(
            health = report.health_score,
            warnings = report.warnings,
            criticals = report.criticals,
            "Monitor pass complete"
        );
        Ok(report)
    }

    /// Rebalance resources between heavily and lightly loaded connections.
    ///
    /// Boosts are capped by the global ceiling and by what both endpoints
    /// can still hold. Latency, bandwidth and distance are never touched.
    pub fn run_traffic_management(&self) -> Result<TrafficReport, NetworkError> {
        let traffic = &self.config.traffic;
        let resources = &self.config.resources;
        let manager = self.connection_manager();
        let mut report = TrafficReport::default();

        let mut state = self.lock_within(self.config.scheduler.tick_timeout)?;
        let loads: Vec<(ConnectionId, f64, u64, f64)> = state
            .topology
            .established_connections()
            .map(|c| (c.id.clone(), c.load(), c.resource_units, c.quality))
            .collect();
        if loads.is_empty() {
            return Ok(report);
        }

        let finite: Vec<f64> = loads.iter().map(|l| l.1).filter(|l| l.is_finite()).collect();
        if finite.is_empty() {
            report.skipped = loads.len();
            return Ok(report);
        }
        let mean = finite.iter().sum::<f64>() / finite.len() as f64;
        report.mean_load = mean;

        for (id, load, units, quality) in loads {
            if !load.is_finite() {
                warn!(connection = %id, "Skipping connection with non-finite load");
                report.skipped += 1;
                continue;
            }
            let outcome = if load > traffic.high_load_factor * mean {
                let limit = state.topology.resource_limit(&id).unwrap_or(units);
                let boosted = units
                    .saturating_add(traffic.boost_units)
                    .min(resources.ceiling.min(limit).max(units));
                manager
                    .reallocate(&mut state, &id, boosted)
                    .and_then(|()| {
                        manager.adjust_quality(&mut state, &id, quality + traffic.quality_nudge)
                    })
                    .map(|()| report.boosted += 1)
            } else if load < traffic.low_load_factor * mean {
                let floor = resources.floor.min(units);
                let shed = units.saturating_sub(traffic.shed_units).max(floor);
                manager
                    .reallocate(&mut state, &id, shed)
                    .map(|()| report.shed += 1)
            } else {
                Ok(())
            };
            if let Err(e) = outcome {
                warn!(connection = %id, error = %e, "Traffic adjustment skipped");
                report.skipped += 1;
            }
        }

        debug!(
            mean_load = mean,
            boosted = report.boosted,
            shed = report.shed,
            "Traffic pass complete"
        );
        Ok(report)
    }

    /// Decay resources, regenerate depleted pools and prune closed connections.
    ///
    /// Decay is `units * exp(-decay_constant * dt)` where `dt` is the time in
    /// seconds since the last refresh (initially the establishment time).
    /// A pool that decays below the floor is replenished with probability
    /// `regeneration_success_probability`, up to the ceiling and the
    /// endpoints' remaining capacity. On failure it is held at the floor
    /// and, after `teardown_after_failures` consecutive failures, the
    /// connection is failed.
    pub fn run_resource_refresh(&self) -> Result<RefreshReport, NetworkError> {
        let resources = &self.config.resources;
        let manager = self.connection_manager();
        let now = self.now();
        let mut report = RefreshReport::default();

        let mut state = self.lock_within(self.config.scheduler.tick_timeout)?;
        let pools: Vec<_> = state
            .topology
            .established_connections()
            .map(|c| {
                (
                    c.id.clone(),
                    c.resource_units,
                    c.quality,
                    c.last_refreshed,
                    c.regeneration_failures,
                )
            })
            .collect();

        for (id, units, quality, last_refreshed, failures) in pools {
            let elapsed = now.secs_since(last_refreshed);
            let decayed = units as f64 * (-resources.decay_constant * elapsed).exp();
            if !decayed.is_finite() {
                warn!(connection = %id, units, elapsed, "Skipping refresh with non-finite decay");
                report.skipped += 1;
                continue;
            }
            let mut next_units = decayed.floor() as u64;
            let mut next_failures = failures;

            if next_units < resources.floor {
                if self.random.chance(resources.regeneration_success_probability) {
                    let replenish = self
                        .random
                        .range_inclusive(resources.regeneration_min, resources.regeneration_max);
                    let limit = state.topology.resource_limit(&id).unwrap_or(units);
                    next_units = next_units
                        .saturating_add(replenish)
                        .min(resources.ceiling.min(limit));
                    next_failures = 0;
                    report.regenerated += 1;
                } else {
                    next_units = resources.floor;
                    next_failures = failures.saturating_add(1);
                    report.regeneration_failures += 1;
                    let limit = resources.teardown_after_failures;
                    if limit > 0 && next_failures >= limit {
                        if manager.fail(&mut state, &id) {
                            warn!(
                                connection = %id,
                                failures = next_failures,
                                "Connection failed after repeated regeneration failures"
                            );
                            report.torn_down += 1;
                        }
                        continue;
                    }
                }
            }

            let noise = self
                .random
                .uniform(-resources.quality_noise, resources.quality_noise);
            let outcome = manager
                .reallocate(&mut state, &id, next_units)
                .and_then(|()| manager.adjust_quality(&mut state, &id, quality + noise))
                .and_then(|()| manager.mark_refreshed(&mut state, &id, now, next_failures));
            match outcome {
                Ok(()) => report.refreshed += 1,
                Err(e) => {
                    warn!(connection = %id, error = %e, "Resource refresh skipped");
                    report.skipped += 1;
                }
            }
        }

        report.pruned = manager.prune(&mut state);
        debug!(
            refreshed = report.refreshed,
            regenerated = report.regenerated,
            torn_down = report.torn_down,
            pruned = report.pruned,
            "Refresh pass complete"
        );
        Ok(report)
    }
}
