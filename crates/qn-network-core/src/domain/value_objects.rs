//! # Value Objects
//!
//! Identifiers, timestamps and the small enums shared by every layer.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Unique node identifier.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(String);

impl NodeId {
    /// Create a node identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NodeId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Unique connection identifier.
///
/// Built from the endpoint pair, the creation time and a per-topology
/// sequence number, so a repeated pair never yields a reused id.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectionId(String);

impl ConnectionId {
    /// Derive an identifier for a new connection.
    pub fn derive(source: &NodeId, target: &NodeId, created_at: Timestamp, sequence: u64) -> Self {
        Self(format!(
            "{}~{}@{}#{}",
            source,
            target,
            created_at.as_millis(),
            sequence
        ))
    }

    /// Borrow the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ConnectionId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Milliseconds since the Unix epoch.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(u64);

impl Timestamp {
    /// Create a timestamp from milliseconds.
    pub const fn from_millis(millis: u64) -> Self {
        Self(millis)
    }

    /// Milliseconds since the epoch.
    pub const fn as_millis(&self) -> u64 {
        self.0
    }

    /// Elapsed seconds since `earlier`, zero if `earlier` is in the future.
    pub fn secs_since(&self, earlier: Timestamp) -> f64 {
        self.0.saturating_sub(earlier.0) as f64 / 1000.0
    }

    /// Timestamp advanced by `millis`.
    pub fn add_millis(&self, millis: u64) -> Self {
        Self(self.0.saturating_add(millis))
    }
}

/// Geographic position of a node. Altitude is in kilometres.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Location {
    /// Latitude in degrees.
    pub latitude: f64,
    /// Longitude in degrees.
    pub longitude: f64,
    /// Altitude above the reference sphere, if known.
    #[serde(default)]
    pub altitude: Option<f64>,
}

impl Location {
    /// Ground-level location.
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
            altitude: None,
        }
    }

    /// Location with an explicit altitude.
    pub fn with_altitude(latitude: f64, longitude: f64, altitude: f64) -> Self {
        Self {
            latitude,
            longitude,
            altitude: Some(altitude),
        }
    }
}

/// Physical placement class of a node.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NodeKind {
    /// Terrestrial station.
    Ground,
    /// Satellite.
    Orbital,
    /// Undersea or underground station.
    Subsurface,
    /// Aircraft or high-altitude platform.
    Airborne,
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ground => write!(f, "ground"),
            Self::Orbital => write!(f, "orbital"),
            Self::Subsurface => write!(f, "subsurface"),
            Self::Airborne => write!(f, "airborne"),
        }
    }
}

/// Physical medium carrying a connection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ChannelKind {
    /// Fibre or other guided medium.
    Guided,
    /// Free-space optical link.
    LineOfSight,
    /// Repeater chain.
    Relay,
    /// Microwave link.
    Microwave,
}

impl fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Guided => write!(f, "guided"),
            Self::LineOfSight => write!(f, "line-of-sight"),
            Self::Relay => write!(f, "relay"),
            Self::Microwave => write!(f, "microwave"),
        }
    }
}

/// Runtime status of a node.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NodeStatus {
    /// Accepting connections.
    #[default]
    Active,
    /// Reachable but not accepting new connections.
    Idle,
    /// Taken out of service by an operator.
    Maintenance,
    /// Unreachable.
    Offline,
}

impl fmt::Display for NodeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Active => write!(f, "active"),
            Self::Idle => write!(f, "idle"),
            Self::Maintenance => write!(f, "maintenance"),
            Self::Offline => write!(f, "offline"),
        }
    }
}

/// Lifecycle status of a connection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConnectionStatus {
    /// Handshake in progress.
    Connecting,
    /// Carrying traffic.
    Established,
    /// Torn down.
    Disconnected,
    /// Failed after establishment.
    Error,
}

impl ConnectionStatus {
    /// Whether the connection is finished and may be pruned.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Disconnected | Self::Error)
    }
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connecting => write!(f, "connecting"),
            Self::Established => write!(f, "established"),
            Self::Disconnected => write!(f, "disconnected"),
            Self::Error => write!(f, "error"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_id_unique_for_repeated_pair() {
        let a = NodeId::new("a");
        let b = NodeId::new("b");
        let now = Timestamp::from_millis(1_000);
        let first = ConnectionId::derive(&a, &b, now, 1);
        let second = ConnectionId::derive(&a, &b, now, 2);
        assert_ne!(first, second);
        assert!(first.as_str().starts_with("a~b@1000"));
    }

    #[test]
    fn test_timestamp_secs_since_saturates() {
        let earlier = Timestamp::from_millis(5_000);
        let later = Timestamp::from_millis(7_500);
        assert_eq!(later.secs_since(earlier), 2.5);
        assert_eq!(earlier.secs_since(later), 0.0);
    }

    #[test]
    fn test_terminal_statuses() {
        assert!(ConnectionStatus::Disconnected.is_terminal());
        assert!(ConnectionStatus::Error.is_terminal());
        assert!(!ConnectionStatus::Established.is_terminal());
        assert!(!ConnectionStatus::Connecting.is_terminal());
    }

    #[test]
    fn test_channel_kind_serde_names() {
        let json = serde_json::to_string(&ChannelKind::LineOfSight).unwrap();
        assert_eq!(json, "\"line-of-sight\"");
        let kind: NodeKind = serde_json::from_str("\"subsurface\"").unwrap();
        assert_eq!(kind, NodeKind::Subsurface);
    }
}
