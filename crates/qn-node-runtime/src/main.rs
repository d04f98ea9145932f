//! # Quantum-Network Node Runtime
//!
//! Entry point hosting the network core.
//!
//! ## Startup Sequence
//!
//! 1. Initialise logging (`RUST_LOG`, else `QN_LOG_LEVEL`, else `info`)
//! 2. Load configuration from `QN_CONFIG`, or defaults plus a demo registry
//! 3. Build the `NetworkService` and register the node registry
//! 4. Establish the configured backbone links
//! 5. Start the maintenance scheduler
//! 6. Report stats periodically until Ctrl+C, then shut down

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{debug, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use qn_network_core::adapters::{MaintenanceScheduler, StaticConfigProvider, TomlConfigProvider};
use qn_network_core::{
    ConfigProvider, Location, NetworkConfig, NetworkService, NodeDescriptor, NodeId, NodeKind,
    QuantumNetworkApi,
};

/// Attempts per backbone link before giving up on it.
const ESTABLISH_ATTEMPTS: usize = 3;

/// How often the runtime logs a stats snapshot.
const STATS_INTERVAL: Duration = Duration::from_secs(60);

fn init_logging() -> Result<()> {
    let fallback = std::env::var("QN_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&fallback))
        .context("Invalid log filter")?;

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .try_init()
        .context("Failed to initialise logging")?;
    Ok(())
}

/// Demo registry used when no configuration file is given.
fn demo_registry() -> Vec<NodeDescriptor> {
    vec![
        NodeDescriptor::new("lisbon", Location::new(38.72, -9.14), NodeKind::Ground),
        NodeDescriptor::new("madrid", Location::new(40.42, -3.70), NodeKind::Ground),
        NodeDescriptor::new("paris", Location::new(48.86, 2.35), NodeKind::Ground),
        NodeDescriptor::new(
            "leo-1",
            Location::with_altitude(44.0, -2.0, 550.0),
            NodeKind::Orbital,
        ),
        NodeDescriptor::new("biscay", Location::new(45.0, -5.0), NodeKind::Subsurface),
        NodeDescriptor::new(
            "hap-1",
            Location::with_altitude(41.5, -1.0, 20.0),
            NodeKind::Airborne,
        ),
    ]
}

fn load_provider() -> Result<Box<dyn ConfigProvider>> {
    match std::env::var("QN_CONFIG") {
        Ok(path) => {
            let provider = TomlConfigProvider::load(&path)
                .with_context(|| format!("Failed to load configuration from {path}"))?;
            info!(path = %path, "Loaded configuration");
            Ok(Box::new(provider))
        }
        Err(_) => {
            info!("QN_CONFIG not set, using defaults with the demo registry");
            Ok(Box::new(
                StaticConfigProvider::new()
                    .with_config(NetworkConfig::default())
                    .with_nodes(demo_registry()),
            ))
        }
    }
}

/// Connect each node to its successor in registry order.
fn establish_backbone(service: &NetworkService, nodes: &[NodeId]) {
    for pair in nodes.windows(2) {
        let (source, target) = (&pair[0], &pair[1]);
        for attempt in 1..=ESTABLISH_ATTEMPTS {
            match service.establish_connection(source, target) {
                Ok(conn) => {
                    debug!(connection = %conn.id, attempt, "Backbone link up");
                    break;
                }
                Err(e) if e.is_retryable() && attempt < ESTABLISH_ATTEMPTS => {
                    debug!(source = %source, target = %target, error = %e, "Retrying backbone link");
                }
                Err(e) => {
                    warn!(source = %source, target = %target, error = %e, "Backbone link not established");
                    break;
                }
            }
        }
    }
}

fn log_stats(service: &NetworkService) {
    match service.get_network_stats() {
        Ok(stats) => match serde_json::to_string(&stats) {
            Ok(json) => info!(stats = %json, "Network stats"),
            Err(e) => warn!(error = %e, "Failed to serialise stats"),
        },
        Err(e) => warn!(error = %e, "Stats unavailable"),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logging()?;
    info!("Quantum-Network node runtime v{}", qn_network_core::VERSION);

    let provider = load_provider()?;
    let service = Arc::new(
        NetworkService::from_provider(provider.as_ref()).context("Invalid network configuration")?,
    );

    let node_ids: Vec<NodeId> = provider.nodes().into_iter().map(|n| n.id).collect();
    establish_backbone(&service, &node_ids);
    log_stats(&service);

    let scheduler = MaintenanceScheduler::start(Arc::clone(&service))
        .context("Failed to start maintenance scheduler")?;

    let mut report = tokio::time::interval(STATS_INTERVAL);
    report.tick().await;
    loop {
        tokio::select! {
            signal = tokio::signal::ctrl_c() => {
                signal.context("Failed to listen for Ctrl+C")?;
                info!("Shutdown signal received");
                break;
            }
            _ = report.tick() => log_stats(&service),
        }
    }

    scheduler.shutdown().await;
    log_stats(&service);
    info!("Shutdown complete");
    Ok(())
}
