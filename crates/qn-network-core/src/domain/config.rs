//! # Network Configuration
//!
//! Every tunable constant of the core with its documented default.
//! Durations are written in humantime form (`"5s"`, `"250ms"`, `"100us"`).
//!
//! ```toml
//! [establishment]
//! success_probability = 0.95
//! lock_timeout = "500ms"
//!
//! [scheduler]
//! monitor_interval = "5s"
//! traffic_interval = "15s"
//! refresh_interval = "30s"
//! tick_timeout = "2s"
//! ```

use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::entities::NodeDescriptor;
use super::errors::NetworkError;
use super::value_objects::{ChannelKind, NodeKind};

/// Tolerance used when checking that the health weights sum to one.
const WEIGHT_SUM_TOLERANCE: f64 = 1e-6;

/// Complete network core configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Physical model constants
    pub physics: PhysicsConfig,
    /// Connection establishment policy
    pub establishment: EstablishmentConfig,
    /// Resource pool bounds, decay and regeneration
    pub resources: ResourceConfig,
    /// Load balancing policy
    pub traffic: TrafficConfig,
    /// Health score weights and alert thresholds
    pub health: HealthConfig,
    /// Maintenance task intervals
    pub scheduler: SchedulerConfig,
    /// Static node registry
    pub nodes: Vec<NodeDescriptor>,
}

impl NetworkConfig {
    /// Configuration with short intervals for tests.
    pub fn for_testing() -> Self {
        Self {
            scheduler: SchedulerConfig {
                monitor_interval: Duration::from_millis(20),
                traffic_interval: Duration::from_millis(30),
                refresh_interval: Duration::from_millis(40),
                tick_timeout: Duration::from_millis(15),
            },
            establishment: EstablishmentConfig {
                success_probability: 0.95,
                lock_timeout: Duration::from_millis(100),
            },
            ..Self::default()
        }
    }

    /// Validate every section.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfiguration` naming the first out-of-range value.
    pub fn validate(&self) -> Result<(), NetworkError> {
        self.physics.validate()?;
        self.establishment.validate()?;
        self.resources.validate()?;
        self.traffic.validate()?;
        self.health.validate()?;
        self.scheduler.validate()?;
        for node in &self.nodes {
            node.validate()?;
        }
        Ok(())
    }
}

fn check_unit(name: &str, value: f64) -> Result<(), NetworkError> {
    if !(0.0..=1.0).contains(&value) {
        return Err(NetworkError::invalid_config(format!(
            "{name} must be within [0, 1], got {value}"
        )));
    }
    Ok(())
}

fn check_positive(name: &str, value: f64) -> Result<(), NetworkError> {
    if !(value.is_finite() && value > 0.0) {
        return Err(NetworkError::invalid_config(format!(
            "{name} must be positive, got {value}"
        )));
    }
    Ok(())
}

fn check_non_negative(name: &str, value: f64) -> Result<(), NetworkError> {
    if !(value.is_finite() && value >= 0.0) {
        return Err(NetworkError::invalid_config(format!(
            "{name} must be non-negative, got {value}"
        )));
    }
    Ok(())
}

fn check_nonzero_duration(name: &str, value: Duration) -> Result<(), NetworkError> {
    if value.is_zero() {
        return Err(NetworkError::invalid_config(format!("{name} cannot be 0")));
    }
    Ok(())
}

// =============================================================================
// PHYSICS
// =============================================================================

/// Fixed processing delay added per endpoint, by node kind.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessingDelays {
    /// Ground station delay
    #[serde(with = "humantime_serde")]
    pub ground: Duration,
    /// Satellite delay
    #[serde(with = "humantime_serde")]
    pub orbital: Duration,
    /// Subsurface station delay
    #[serde(with = "humantime_serde")]
    pub subsurface: Duration,
    /// Airborne platform delay
    #[serde(with = "humantime_serde")]
    pub airborne: Duration,
}

impl ProcessingDelays {
    /// Delay for a node kind.
    pub fn for_kind(&self, kind: NodeKind) -> Duration {
        match kind {
            NodeKind::Ground => self.ground,
            NodeKind::Orbital => self.orbital,
            NodeKind::Subsurface => self.subsurface,
            NodeKind::Airborne => self.airborne,
        }
    }
}

impl Default for ProcessingDelays {
    fn default() -> Self {
        Self {
            ground: Duration::from_micros(100),
            orbital: Duration::from_micros(500),
            subsurface: Duration::from_micros(300),
            airborne: Duration::from_micros(200),
        }
    }
}

/// Quality and bandwidth constants of one channel kind.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChannelProfile {
    /// Quality at zero distance
    pub base_quality: f64,
    /// Quality lost per kilometre
    pub degradation_per_km: f64,
    /// Bandwidth at zero distance (units/sec)
    pub base_bandwidth: f64,
}

/// Channel constants keyed by channel kind.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelProfiles {
    /// Guided channels degrade slowest
    pub guided: ChannelProfile,
    /// Line-of-sight channels degrade fastest
    pub line_of_sight: ChannelProfile,
    /// Repeater chains
    pub relay: ChannelProfile,
    /// Microwave links
    pub microwave: ChannelProfile,
}

impl ChannelProfiles {
    /// Profile for a channel kind.
    pub fn for_channel(&self, kind: ChannelKind) -> &ChannelProfile {
        match kind {
            ChannelKind::Guided => &self.guided,
            ChannelKind::LineOfSight => &self.line_of_sight,
            ChannelKind::Relay => &self.relay,
            ChannelKind::Microwave => &self.microwave,
        }
    }

    fn iter(&self) -> impl Iterator<Item = (ChannelKind, &ChannelProfile)> {
        [
            (ChannelKind::Guided, &self.guided),
            (ChannelKind::LineOfSight, &self.line_of_sight),
            (ChannelKind::Relay, &self.relay),
            (ChannelKind::Microwave, &self.microwave),
        ]
        .into_iter()
    }
}

impl Default for ChannelProfiles {
    fn default() -> Self {
        Self {
            guided: ChannelProfile {
                base_quality: 0.98,
                degradation_per_km: 0.000_01,
                base_bandwidth: 1000.0,
            },
            line_of_sight: ChannelProfile {
                base_quality: 0.90,
                degradation_per_km: 0.000_05,
                base_bandwidth: 800.0,
            },
            relay: ChannelProfile {
                base_quality: 0.95,
                degradation_per_km: 0.000_02,
                base_bandwidth: 500.0,
            },
            microwave: ChannelProfile {
                base_quality: 0.92,
                degradation_per_km: 0.000_04,
                base_bandwidth: 600.0,
            },
        }
    }
}

/// Physical model constants.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PhysicsConfig {
    /// Radius of the reference sphere (km)
    pub earth_radius_km: f64,
    /// Signal propagation speed (km per millisecond)
    pub propagation_km_per_ms: f64,
    /// Per-endpoint processing delay
    pub processing_delay: ProcessingDelays,
    /// Upper bound of the uniform latency jitter
    #[serde(with = "humantime_serde")]
    pub latency_jitter: Duration,
    /// Per-channel quality and bandwidth constants
    pub channels: ChannelProfiles,
    /// Half-width of the uniform quality noise
    pub quality_noise: f64,
    /// Distance at which bandwidth halves (km)
    pub bandwidth_scale_km: f64,
    /// Half-width of the multiplicative bandwidth factor around 1.0
    pub bandwidth_jitter: f64,
    /// Lowest bandwidth ever reported (units/sec)
    pub min_bandwidth: f64,
}

impl Default for PhysicsConfig {
    fn default() -> Self {
        Self {
            earth_radius_km: 6371.0,
            propagation_km_per_ms: 200.0,
            processing_delay: ProcessingDelays::default(),
            latency_jitter: Duration::from_micros(100),
            channels: ChannelProfiles::default(),
            quality_noise: 0.01,
            bandwidth_scale_km: 1000.0,
            bandwidth_jitter: 0.2,
            min_bandwidth: 1.0,
        }
    }
}

impl PhysicsConfig {
    fn validate(&self) -> Result<(), NetworkError> {
        check_positive("physics.earth_radius_km", self.earth_radius_km)?;
        check_positive("physics.propagation_km_per_ms", self.propagation_km_per_ms)?;
        check_positive("physics.bandwidth_scale_km", self.bandwidth_scale_km)?;
        check_positive("physics.min_bandwidth", self.min_bandwidth)?;
        check_non_negative("physics.quality_noise", self.quality_noise)?;
        if !(0.0..1.0).contains(&self.bandwidth_jitter) {
            return Err(NetworkError::invalid_config(format!(
                "physics.bandwidth_jitter must be within [0, 1), got {}",
                self.bandwidth_jitter
            )));
        }
        for (kind, profile) in self.channels.iter() {
            check_unit(&format!("physics.channels.{kind}.base_quality"), profile.base_quality)?;
            check_non_negative(
                &format!("physics.channels.{kind}.degradation_per_km"),
                profile.degradation_per_km,
            )?;
            check_positive(
                &format!("physics.channels.{kind}.base_bandwidth"),
                profile.base_bandwidth,
            )?;
        }
        Ok(())
    }
}

// =============================================================================
// ESTABLISHMENT
// =============================================================================

/// Connection establishment policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EstablishmentConfig {
    /// Probability that an attempt succeeds
    pub success_probability: f64,
    /// Longest wait for exclusive topology access
    #[serde(with = "humantime_serde")]
    pub lock_timeout: Duration,
}

impl Default for EstablishmentConfig {
    fn default() -> Self {
        Self {
            success_probability: 0.95,
            lock_timeout: Duration::from_millis(500),
        }
    }
}

impl EstablishmentConfig {
    fn validate(&self) -> Result<(), NetworkError> {
        check_unit("establishment.success_probability", self.success_probability)?;
        check_nonzero_duration("establishment.lock_timeout", self.lock_timeout)
    }
}

// =============================================================================
// RESOURCES
// =============================================================================

/// Resource pool bounds, decay and regeneration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResourceConfig {
    /// Smallest initial allocation
    pub initial_min: u64,
    /// Largest initial allocation
    pub initial_max: u64,
    /// Level below which regeneration is attempted; never allocated below it
    pub floor: u64,
    /// Upper bound of any connection's pool
    pub ceiling: u64,
    /// Exponential decay constant per second
    pub decay_constant: f64,
    /// Smallest replenishment
    pub regeneration_min: u64,
    /// Largest replenishment
    pub regeneration_max: u64,
    /// Probability that a regeneration attempt succeeds
    pub regeneration_success_probability: f64,
    /// Consecutive failed regenerations before teardown; 0 keeps the
    /// connection at the floor forever
    pub teardown_after_failures: u32,
    /// Half-width of the zero-mean quality noise applied per refresh
    pub quality_noise: f64,
}

impl Default for ResourceConfig {
    fn default() -> Self {
        Self {
            initial_min: 50,
            initial_max: 200,
            floor: 10,
            ceiling: 1000,
            decay_constant: 0.001,
            regeneration_min: 50,
            regeneration_max: 150,
            regeneration_success_probability: 0.9,
            teardown_after_failures: 3,
            quality_noise: 0.005,
        }
    }
}

impl ResourceConfig {
    fn validate(&self) -> Result<(), NetworkError> {
        if self.floor == 0 {
            return Err(NetworkError::invalid_config("resources.floor must be at least 1"));
        }
        if self.floor > self.ceiling {
            return Err(NetworkError::invalid_config(format!(
                "resources.floor ({}) exceeds resources.ceiling ({})",
                self.floor, self.ceiling
            )));
        }
        if self.initial_min > self.initial_max
            || self.initial_min < self.floor
            || self.initial_max > self.ceiling
        {
            return Err(NetworkError::invalid_config(format!(
                "resources.initial range {}..={} must lie within {}..={}",
                self.initial_min, self.initial_max, self.floor, self.ceiling
            )));
        }
        if self.regeneration_min > self.regeneration_max {
            return Err(NetworkError::invalid_config(format!(
                "resources.regeneration range {}..={} is inverted",
                self.regeneration_min, self.regeneration_max
            )));
        }
        check_non_negative("resources.decay_constant", self.decay_constant)?;
        check_non_negative("resources.quality_noise", self.quality_noise)?;
        check_unit(
            "resources.regeneration_success_probability",
            self.regeneration_success_probability,
        )
    }
}

// =============================================================================
// TRAFFIC
// =============================================================================

/// Load balancing policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrafficConfig {
    /// Multiple of mean load above which a connection is prioritised
    pub high_load_factor: f64,
    /// Multiple of mean load below which a connection is throttled
    pub low_load_factor: f64,
    /// Resource units added to a prioritised connection
    pub boost_units: u64,
    /// Resource units removed from a throttled connection
    pub shed_units: u64,
    /// Quality gained by a prioritised connection
    pub quality_nudge: f64,
}

impl Default for TrafficConfig {
    fn default() -> Self {
        Self {
            high_load_factor: 1.5,
            low_load_factor: 0.5,
            boost_units: 10,
            shed_units: 5,
            quality_nudge: 0.01,
        }
    }
}

impl TrafficConfig {
    fn validate(&self) -> Result<(), NetworkError> {
        check_non_negative("traffic.low_load_factor", self.low_load_factor)?;
        if self.high_load_factor < self.low_load_factor {
            return Err(NetworkError::invalid_config(format!(
                "traffic.high_load_factor ({}) is below traffic.low_load_factor ({})",
                self.high_load_factor, self.low_load_factor
            )));
        }
        check_unit("traffic.quality_nudge", self.quality_nudge)
    }
}

// =============================================================================
// HEALTH
// =============================================================================

/// Weights of the five health score terms.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HealthWeights {
    /// Active node ratio
    pub active_nodes: f64,
    /// Established connection ratio
    pub established_connections: f64,
    /// Mean quality of established connections
    pub quality: f64,
    /// One minus normalised mean latency
    pub latency: f64,
    /// One minus utilisation
    pub utilization: f64,
}

impl HealthWeights {
    fn values(&self) -> [(&'static str, f64); 5] {
        [
            ("active_nodes", self.active_nodes),
            ("established_connections", self.established_connections),
            ("quality", self.quality),
            ("latency", self.latency),
            ("utilization", self.utilization),
        ]
    }
}

impl Default for HealthWeights {
    fn default() -> Self {
        Self {
            active_nodes: 0.25,
            established_connections: 0.25,
            quality: 0.2,
            latency: 0.15,
            utilization: 0.15,
        }
    }
}

/// Health score weights and alert thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HealthConfig {
    /// Term weights, summing to 1
    pub weights: HealthWeights,
    /// Mean latency mapped to a latency term of 0
    #[serde(with = "humantime_serde")]
    pub latency_normalization: Duration,
    /// Connections below this quality raise a warning
    pub quality_warning: f64,
    /// Nodes below this health raise a warning
    pub node_health_warning: f64,
    /// Network health below this raises a warning
    pub network_warning: f64,
    /// Network health below this raises a critical alert
    pub network_critical: f64,
    /// Heartbeats older than this raise a warning
    #[serde(with = "humantime_serde")]
    pub heartbeat_timeout: Duration,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            weights: HealthWeights::default(),
            latency_normalization: Duration::from_millis(100),
            quality_warning: 0.8,
            node_health_warning: 0.6,
            network_warning: 0.7,
            network_critical: 0.5,
            heartbeat_timeout: Duration::from_secs(60),
        }
    }
}

impl HealthConfig {
    fn validate(&self) -> Result<(), NetworkError> {
        let mut sum = 0.0;
        for (name, weight) in self.weights.values() {
            check_unit(&format!("health.weights.{name}"), weight)?;
            sum += weight;
        }
        if (sum - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
            return Err(NetworkError::invalid_config(format!(
                "health.weights must sum to 1, got {sum}"
            )));
        }
        check_nonzero_duration("health.latency_normalization", self.latency_normalization)?;
        check_nonzero_duration("health.heartbeat_timeout", self.heartbeat_timeout)?;
        check_unit("health.quality_warning", self.quality_warning)?;
        check_unit("health.node_health_warning", self.node_health_warning)?;
        check_unit("health.network_warning", self.network_warning)?;
        check_unit("health.network_critical", self.network_critical)?;
        if self.network_critical > self.network_warning {
            return Err(NetworkError::invalid_config(
                "health.network_critical must not exceed health.network_warning",
            ));
        }
        Ok(())
    }
}

// =============================================================================
// SCHEDULER
// =============================================================================

/// Maintenance task intervals.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Health monitor period (shortest)
    #[serde(with = "humantime_serde")]
    pub monitor_interval: Duration,
    /// Traffic manager period
    #[serde(with = "humantime_serde")]
    pub traffic_interval: Duration,
    /// Resource refresher period (longest)
    #[serde(with = "humantime_serde")]
    pub refresh_interval: Duration,
    /// Longest wait for topology access within one tick
    #[serde(with = "humantime_serde")]
    pub tick_timeout: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            monitor_interval: Duration::from_secs(5),
            traffic_interval: Duration::from_secs(15),
            refresh_interval: Duration::from_secs(30),
            tick_timeout: Duration::from_secs(2),
        }
    }
}

impl SchedulerConfig {
    /// Validate intervals and the tick timeout.
    ///
    /// A tick timeout longer than any interval would let ticks overlap.
    pub fn validate(&self) -> Result<(), NetworkError> {
        check_nonzero_duration("scheduler.monitor_interval", self.monitor_interval)?;
        check_nonzero_duration("scheduler.traffic_interval", self.traffic_interval)?;
        check_nonzero_duration("scheduler.refresh_interval", self.refresh_interval)?;
        check_nonzero_duration("scheduler.tick_timeout", self.tick_timeout)?;
        let shortest = self
            .monitor_interval
            .min(self.traffic_interval)
            .min(self.refresh_interval);
        if self.tick_timeout > shortest {
            return Err(NetworkError::invalid_config(format!(
                "scheduler.tick_timeout ({:?}) exceeds the shortest interval ({:?})",
                self.tick_timeout, shortest
            )));
        }
        Ok(())
    }
}
