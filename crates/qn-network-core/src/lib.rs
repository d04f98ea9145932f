//! # Quantum Network Core
//!
//! Topology, connection lifecycle, routing and maintenance for a network of
//! ground, orbital, subsurface and airborne nodes joined by point-to-point
//! connections.
//!
//! ## Architecture
//!
//! The crate follows Hexagonal Architecture with:
//! - **Domain Layer:** physical model, topology registries, health scoring, Dijkstra router
//! - **Ports Layer:** the query/command API and the randomness, time, alert and config SPIs
//! - **Service Layer:** `NetworkService`, the single lock-guarded owner of the topology
//! - **Adapters Layer:** port implementations and the tokio `MaintenanceScheduler`
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use qn_network_core::{
//!     adapters::ScriptedRandomSource, Location, NetworkConfig, NetworkService, NodeDescriptor,
//!     NodeKind, QuantumNetworkApi,
//! };
//!
//! let mut config = NetworkConfig::default();
//! config.nodes = vec![
//!     NodeDescriptor::new("lisbon", Location::new(38.72, -9.14), NodeKind::Ground),
//!     NodeDescriptor::new("madrid", Location::new(40.42, -3.70), NodeKind::Ground),
//! ];
//! let service = NetworkService::builder(config)
//!     .random_source(Arc::new(ScriptedRandomSource::constant(0.0)))
//!     .build()
//!     .unwrap();
//!
//! let conn = service
//!     .establish_connection(&"lisbon".into(), &"madrid".into())
//!     .unwrap();
//! let route = service.compute_route(&"lisbon".into(), &"madrid".into()).unwrap();
//! assert_eq!(route.len(), 2);
//! assert!(conn.quality >= 0.5);
//! ```

#![warn(missing_docs)]

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod service;

pub use domain::*;
pub use ports::{AlertSink, ConfigProvider, NodeRegistryApi, QuantumNetworkApi, RandomSource, TimeSource};
pub use service::{
    ConnectionManager, MonitorReport, NetworkService, NetworkServiceBuilder, NetworkState,
    RefreshReport, TrafficReport,
};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
