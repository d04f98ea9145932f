//! # Alerts
//!
//! Threshold-crossing events raised by the health monitor.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::value_objects::Timestamp;

/// Alert severity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AlertLevel {
    /// Degraded but operational
    Warning,
    /// Operator attention required
    Critical,
}

impl fmt::Display for AlertLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Warning => write!(f, "warning"),
            Self::Critical => write!(f, "critical"),
        }
    }
}

/// What an alert is about.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AlertSubject {
    /// A single node
    Node,
    /// A single connection
    Connection,
    /// The whole network
    Network,
}

impl fmt::Display for AlertSubject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Node => write!(f, "node"),
            Self::Connection => write!(f, "connection"),
            Self::Network => write!(f, "network"),
        }
    }
}

/// An alert delivered to an `AlertSink`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    /// Severity
    pub level: AlertLevel,
    /// Subject kind
    pub subject: AlertSubject,
    /// Node id, connection id, or `"network"`
    pub id: String,
    /// Human-readable description
    pub message: String,
    /// When the alert was raised
    pub timestamp: Timestamp,
}

impl Alert {
    /// Create a warning.
    pub fn warning(
        subject: AlertSubject,
        id: impl Into<String>,
        message: impl Into<String>,
        timestamp: Timestamp,
    ) -> Self {
        Self {
            level: AlertLevel::Warning,
            subject,
            id: id.into(),
            message: message.into(),
            timestamp,
        }
    }

    /// Create a critical alert.
    pub fn critical(
        subject: AlertSubject,
        id: impl Into<String>,
        message: impl Into<String>,
        timestamp: Timestamp,
    ) -> Self {
        Self {
            level: AlertLevel::Critical,
            subject,
            id: id.into(),
            message: message.into(),
            timestamp,
        }
    }
}

impl fmt::Display for Alert {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} {}: {}",
            self.level, self.subject, self.id, self.message
        )
    }
}
