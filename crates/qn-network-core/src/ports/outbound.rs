//! # Driven Ports (Outbound SPI)
//!
//! Interfaces the host supplies: randomness, time, alert delivery and
//! configuration. Every source of nondeterminism in the core goes through
//! `RandomSource`, so tests can script exact outcomes.

use crate::domain::{Alert, NetworkConfig, NodeDescriptor, Timestamp};

/// Single injectable source of randomness.
///
/// Implementors provide `next_f64`; the helpers derive every other draw
/// from it so a scripted sequence fully determines the outcome.
pub trait RandomSource: Send + Sync {
    /// Uniform draw in `[0, 1)`.
    fn next_f64(&self) -> f64;

    /// Uniform draw in `[low, high)`.
    fn uniform(&self, low: f64, high: f64) -> f64 {
        low + (high - low) * self.next_f64()
    }

    /// Bernoulli trial succeeding with `probability`.
    fn chance(&self, probability: f64) -> bool {
        self.next_f64() < probability
    }

    /// Uniform integer in `[low, high]`.
    fn range_inclusive(&self, low: u64, high: u64) -> u64 {
        if high <= low {
            return low;
        }
        let span = (high - low + 1) as f64;
        let offset = (self.next_f64() * span) as u64;
        low + offset.min(high - low)
    }
}

/// Clock used for establishment times, heartbeats and decay.
pub trait TimeSource: Send + Sync {
    /// Current time.
    fn now(&self) -> Timestamp;
}

/// Receives alerts from the health monitor.
///
/// Delivery is up to the integrator (log, webhook, message queue).
/// `emit` is called outside the topology lock.
pub trait AlertSink: Send + Sync {
    /// Deliver one alert.
    fn emit(&self, alert: Alert);
}

/// Source of configuration and the static node registry.
pub trait ConfigProvider: Send + Sync {
    /// Network configuration.
    fn network_config(&self) -> NetworkConfig;

    /// Nodes to register at startup.
    fn nodes(&self) -> Vec<NodeDescriptor> {
        self.network_config().nodes
    }
}
