//! # Network Service
//!
//! Wires the domain to the ports. `NetworkService` is the single owner of
//! the topology and the routing cache; every command, query and maintenance
//! pass goes through its lock.

mod api;
mod connection_manager;
mod core;
mod maintenance;

pub use self::connection_manager::ConnectionManager;
pub use self::core::{NetworkService, NetworkServiceBuilder, NetworkState};
pub use self::maintenance::{MonitorReport, RefreshReport, TrafficReport};

#[cfg(test)]
mod tests;
