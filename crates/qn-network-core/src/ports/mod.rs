//! # Ports Layer
//!
//! - **Driving ports (inbound):** the query/command API hosts call
//! - **Driven ports (outbound):** randomness, time, alert delivery, configuration

pub mod inbound;
pub mod outbound;

pub use inbound::{NodeRegistryApi, QuantumNetworkApi};
pub use outbound::{AlertSink, ConfigProvider, RandomSource, TimeSource};
