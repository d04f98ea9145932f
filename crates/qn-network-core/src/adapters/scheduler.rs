//! # Maintenance Scheduler
//!
//! Drives the monitor, traffic and refresh passes on their own tokio
//! intervals. Each pass runs on the blocking pool and is awaited before the
//! loop waits for its next tick, so a pass never overlaps itself. A tick
//! that arrives while a pass is still running is skipped.
//!
//! Shutdown stops all three loops at their next tick boundary; a pass that
//! is already running completes first.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::domain::{NetworkError, SchedulerConfig};
use crate::service::NetworkService;

/// One of the periodic maintenance passes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MaintenanceTask {
    /// Health monitoring and alerting
    Monitor,
    /// Load balancing
    Traffic,
    /// Resource decay and regeneration
    Refresh,
}

impl MaintenanceTask {
    /// Every task, in start order.
    pub const ALL: [MaintenanceTask; 3] = [Self::Monitor, Self::Traffic, Self::Refresh];

    fn index(self) -> usize {
        match self {
            Self::Monitor => 0,
            Self::Traffic => 1,
            Self::Refresh => 2,
        }
    }

    fn interval(self, config: &SchedulerConfig) -> Duration {
        match self {
            Self::Monitor => config.monitor_interval,
            Self::Traffic => config.traffic_interval,
            Self::Refresh => config.refresh_interval,
        }
    }

    fn run(self, service: &NetworkService) -> Result<(), NetworkError> {
        match self {
            Self::Monitor => service.run_monitor().map(drop),
            Self::Traffic => service.run_traffic_management().map(drop),
            Self::Refresh => service.run_resource_refresh().map(drop),
        }
    }
}

impl fmt::Display for MaintenanceTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Monitor => write!(f, "monitor"),
            Self::Traffic => write!(f, "traffic"),
            Self::Refresh => write!(f, "refresh"),
        }
    }
}

#[derive(Debug, Default)]
struct TickCounters {
    completed: [AtomicU64; 3],
    skipped: [AtomicU64; 3],
}

/// Handle to the three running maintenance loops.
pub struct MaintenanceScheduler {
    shutdown_tx: watch::Sender<bool>,
    handles: Vec<JoinHandle<()>>,
    counters: Arc<TickCounters>,
}

impl MaintenanceScheduler {
    /// Start the loops using the service's scheduler configuration.
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// `InvalidConfiguration` if the configuration is out of range; nothing
    /// is started in that case.
    pub fn start(service: Arc<NetworkService>) -> Result<Self, NetworkError> {
        service.config().validate()?;
        let config = service.config().scheduler.clone();
        Self::start_with_config(service, config)
    }

    /// Start the loops with explicit intervals.
    pub fn start_with_config(
        service: Arc<NetworkService>,
        config: SchedulerConfig,
    ) -> Result<Self, NetworkError> {
        config.validate()?;
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let counters = Arc::new(TickCounters::default());

        let handles = MaintenanceTask::ALL
            .iter()
            .map(|&task| {
                tokio::spawn(run_loop(
                    task,
                    task.interval(&config),
                    Arc::clone(&service),
                    Arc::clone(&counters),
                    shutdown_rx.clone(),
                ))
            })
            .collect();

        info!(
            monitor = ?config.monitor_interval,
            traffic = ?config.traffic_interval,
            refresh = ?config.refresh_interval,
            "Maintenance scheduler started"
        );
        Ok(Self {
            shutdown_tx,
            handles,
            counters,
        })
    }

    /// Passes completed by `task` so far.
    pub fn completed_ticks(&self, task: MaintenanceTask) -> u64 {
        self.counters.completed[task.index()].load(Ordering::SeqCst)
    }

    /// Passes of `task` skipped because the topology was busy or faulted.
    pub fn skipped_ticks(&self, task: MaintenanceTask) -> u64 {
        self.counters.skipped[task.index()].load(Ordering::SeqCst)
    }

    /// Stop accepting ticks and wait for in-flight passes to finish.
    pub async fn shutdown(self) {
        info!("Stopping maintenance scheduler");
        if self.shutdown_tx.send(true).is_err() {
            debug!("Maintenance loops already stopped");
        }
        for handle in self.handles {
            if let Err(e) = handle.await {
                error!(error = %e, "Maintenance loop ended abnormally");
            }
        }
        info!("Maintenance scheduler stopped");
    }
}

impl fmt::Debug for MaintenanceScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MaintenanceScheduler")
            .field("loops", &self.handles.len())
            .finish_non_exhaustive()
    }
}

async fn run_loop(
    task: MaintenanceTask,
    interval: Duration,
    service: Arc<NetworkService>,
    counters: Arc<TickCounters>,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    // The first tick fires immediately; the first pass waits one interval.
    ticker.tick().await;

    loop {
        tokio::select! {
            biased;
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
                continue;
            }
            _ = ticker.tick() => {}
        }

        let started = Instant::now();
        let worker = Arc::clone(&service);
        let outcome = tokio::task::spawn_blocking(move || task.run(&worker)).await;
        let slot = task.index();
        match outcome {
            Ok(Ok(())) => {
                counters.completed[slot].fetch_add(1, Ordering::SeqCst);
            }
            Ok(Err(NetworkError::Timeout(waited))) => {
                counters.skipped[slot].fetch_add(1, Ordering::SeqCst);
                warn!(task = %task, waited = ?waited, "Topology busy, maintenance tick skipped");
            }
            Ok(Err(e)) => {
                counters.skipped[slot].fetch_add(1, Ordering::SeqCst);
                warn!(task = %task, error = %e, "Maintenance pass failed");
            }
            Err(e) => {
                counters.skipped[slot].fetch_add(1, Ordering::SeqCst);
                error!(task = %task, error = %e, "Maintenance pass panicked");
            }
        }

        let elapsed = started.elapsed();
        if elapsed > interval {
            warn!(
                task = %task,
                elapsed = ?elapsed,
                interval = ?interval,
                "Maintenance pass overran its interval, next tick skipped"
            );
        }
    }
    debug!(task = %task, "Maintenance loop stopped");
}
