//! Alert Sink Adapters

use parking_lot::Mutex;
use tracing::{error, warn};

use crate::domain::{Alert, AlertLevel};
use crate::ports::AlertSink;

/// Forwards alerts to `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingAlertSink;

impl AlertSink for TracingAlertSink {
    fn emit(&self, alert: Alert) {
        match alert.level {
            AlertLevel::Warning => warn!(
                subject = %alert.subject,
                id = %alert.id,
                at = alert.timestamp.as_millis(),
                "{}",
                alert.message
            ),
            AlertLevel::Critical => error!(
                subject = %alert.subject,
                id = %alert.id,
                at = alert.timestamp.as_millis(),
                "{}",
                alert.message
            ),
        }
    }
}

/// Keeps every alert in memory. Used by tests and embedding hosts that poll.
#[derive(Debug, Default)]
pub struct InMemoryAlertSink {
    alerts: Mutex<Vec<Alert>>,
}

impl InMemoryAlertSink {
    /// Empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of every alert received so far.
    pub fn alerts(&self) -> Vec<Alert> {
        self.alerts.lock().clone()
    }

    /// Remove and return every alert received so far.
    pub fn drain(&self) -> Vec<Alert> {
        std::mem::take(&mut *self.alerts.lock())
    }

    /// Number of alerts received.
    pub fn len(&self) -> usize {
        self.alerts.lock().len()
    }

    /// Whether no alert has been received.
    pub fn is_empty(&self) -> bool {
        self.alerts.lock().is_empty()
    }
}

impl AlertSink for InMemoryAlertSink {
    fn emit(&self, alert: Alert) {
        self.alerts.lock().push(alert);
    }
}

/// Discards every alert.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpAlertSink;

impl AlertSink for NoOpAlertSink {
    fn emit(&self, _alert: Alert) {}
}
