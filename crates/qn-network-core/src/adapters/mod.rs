//! # Adapters Layer
//!
//! Concrete implementations of the outbound ports plus the tokio scheduler
//! that drives the maintenance passes.

pub mod alerts;
pub mod config;
pub mod random;
pub mod scheduler;
pub mod time;

pub use alerts::{InMemoryAlertSink, NoOpAlertSink, TracingAlertSink};
pub use config::{ConfigError, StaticConfigProvider, TomlConfigProvider};
pub use random::{ScriptedRandomSource, StdRandomSource};
pub use scheduler::{MaintenanceScheduler, MaintenanceTask};
pub use time::{ManualTimeSource, SystemTimeSource};
