use parking_lot::{Mutex, MutexGuard};
use std::sync::Arc;
use std::time::Duration;

use crate::adapters::{StdRandomSource, SystemTimeSource, TracingAlertSink};
use crate::domain::{Alert, NetworkConfig, NetworkError, Router, Timestamp, Topology};
use crate::ports::{AlertSink, ConfigProvider, RandomSource, TimeSource};

use super::connection_manager::ConnectionManager;

/// State guarded by the service lock.
///
/// The router cache lives next to the topology so it is invalidated inside
/// the same critical section as the mutation that staled it.
#[derive(Debug, Default)]
pub struct NetworkState {
    /// Node and connection registries
    pub topology: Topology,
    /// Shortest-path cache
    pub router: Router,
}

impl NetworkState {
    /// Wrap a topology with a cold routing cache.
    pub fn new(topology: Topology) -> Self {
        Self {
            topology,
            router: Router::new(),
        }
    }
}

/// The network core: topology, routing, establishment and maintenance.
///
/// # Example
///
/// ```rust
/// use qn_network_core::{NetworkConfig, NetworkService, QuantumNetworkApi};
///
/// let service = NetworkService::builder(NetworkConfig::default()).build().unwrap();
/// let stats = service.get_network_stats().unwrap();
/// assert_eq!(stats.node_count, 0);
/// ```
pub struct NetworkService {
    pub(crate) state: Mutex<NetworkState>,
    pub(crate) config: NetworkConfig,
    pub(crate) random: Arc<dyn RandomSource>,
    pub(crate) clock: Arc<dyn TimeSource>,
    pub(crate) alerts: Arc<dyn AlertSink>,
}

impl NetworkService {
    /// Start building a service from a configuration.
    pub fn builder(config: NetworkConfig) -> NetworkServiceBuilder {
        NetworkServiceBuilder {
            config,
            random: None,
            clock: None,
            alerts: None,
        }
    }

    /// Build a service from a provider with production adapters.
    pub fn from_provider(provider: &dyn ConfigProvider) -> Result<Self, NetworkError> {
        let mut config = provider.network_config();
        config.nodes = provider.nodes();
        Self::builder(config).build()
    }

    /// Active configuration.
    pub fn config(&self) -> &NetworkConfig {
        &self.config
    }

    /// Current time from the injected clock.
    pub fn now(&self) -> Timestamp {
        self.clock.now()
    }

    /// Clone of the current topology.
    pub fn topology_snapshot(&self) -> Result<Topology, NetworkError> {
        Ok(self.lock()?.topology.clone())
    }

    pub(crate) fn connection_manager(&self) -> ConnectionManager<'_> {
        ConnectionManager::new(&self.config, self.random.as_ref())
    }

    /// Acquire the state lock, waiting at most the establishment lock timeout.
    pub(crate) fn lock(&self) -> Result<MutexGuard<'_, NetworkState>, NetworkError> {
        self.lock_within(self.config.establishment.lock_timeout)
    }

    pub(crate) fn lock_within(
        &self,
        timeout: Duration,
    ) -> Result<MutexGuard<'_, NetworkState>, NetworkError> {
        self.state
            .try_lock_for(timeout)
            .ok_or(NetworkError::Timeout(timeout))
    }

    /// Deliver alerts. Must be called without holding the state lock.
    pub(crate) fn deliver(&self, alerts: Vec<Alert>) {
        for alert in alerts {
            self.alerts.emit(alert);
        }
    }
}

impl std::fmt::Debug for NetworkService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NetworkService")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Builder for [`NetworkService`].
///
/// Unset ports default to `StdRandomSource::from_entropy`, `SystemTimeSource`
/// and `TracingAlertSink`.
pub struct NetworkServiceBuilder {
    config: NetworkConfig,
    random: Option<Arc<dyn RandomSource>>,
    clock: Option<Arc<dyn TimeSource>>,
    alerts: Option<Arc<dyn AlertSink>>,
}

impl NetworkServiceBuilder {
    /// Use a specific random source.
    #[must_use]
    pub fn random_source(mut self, random: Arc<dyn RandomSource>) -> Self {
        self.random = Some(random);
        self
    }

    /// Use a specific clock.
    #[must_use]
    pub fn time_source(mut self, clock: Arc<dyn TimeSource>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Use a specific alert sink.
    #[must_use]
    pub fn alert_sink(mut self, alerts: Arc<dyn AlertSink>) -> Self {
        self.alerts = Some(alerts);
        self
    }

    /// Validate the configuration and register the static node registry.
    ///
    /// # Errors
    ///
    /// `InvalidConfiguration` for out-of-range values, `DuplicateNode` for a
    /// repeated id in the registry.
    pub fn build(self) -> Result<NetworkService, NetworkError> {
        self.config.validate()?;
        let random = self
            .random
            .unwrap_or_else(|| Arc::new(StdRandomSource::from_entropy()));
        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemTimeSource::new()));
        let alerts = self.alerts.unwrap_or_else(|| Arc::new(TracingAlertSink));

        let topology = Topology::with_nodes(self.config.nodes.iter().cloned(), clock.now())?;
        Ok(NetworkService {
            state: Mutex::new(NetworkState::new(topology)),
            config: self.config,
            random,
            clock,
            alerts,
        })
    }
}
