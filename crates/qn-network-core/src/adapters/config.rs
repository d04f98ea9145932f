//! Configuration Provider Adapters

use std::fs;
use std::path::Path;
use thiserror::Error;

use crate::domain::{NetworkConfig, NetworkError, NodeDescriptor};
use crate::ports::ConfigProvider;

/// Errors raised while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// File could not be read.
    #[error("Failed to read {path}: {source}")]
    Io {
        /// Path of the file that failed to load.
        path: String,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// TOML could not be parsed.
    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// Parsed values are out of range.
    #[error(transparent)]
    Invalid(#[from] NetworkError),
}

// ============================================================================
// StaticConfigProvider - In-code configuration
// ============================================================================

/// Configuration built in code.
#[derive(Debug, Clone, Default)]
pub struct StaticConfigProvider {
    config: NetworkConfig,
}

impl StaticConfigProvider {
    /// Default configuration with an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the configuration.
    #[must_use]
    pub fn with_config(mut self, config: NetworkConfig) -> Self {
        self.config = config;
        self
    }

    /// Replace the static node registry.
    #[must_use]
    pub fn with_nodes(mut self, nodes: Vec<NodeDescriptor>) -> Self {
        self.config.nodes = nodes;
        self
    }
}

impl ConfigProvider for StaticConfigProvider {
    fn network_config(&self) -> NetworkConfig {
        self.config.clone()
    }
}

// ============================================================================
// TomlConfigProvider - File-based configuration
// ============================================================================

/// Loads and validates configuration from TOML.
///
/// # Config File Format
///
/// ```toml
/// [establishment]
/// success_probability = 0.9
///
/// [scheduler]
/// monitor_interval = "2s"
///
/// [[nodes]]
/// id = "lisbon"
/// kind = "ground"
/// location = { latitude = 38.72, longitude = -9.14 }
///
/// [[nodes]]
/// id = "sat-1"
/// kind = "orbital"
/// location = { latitude = 40.0, longitude = -5.0, altitude = 550.0 }
/// ```
#[derive(Debug, Clone)]
pub struct TomlConfigProvider {
    config: NetworkConfig,
}

impl TomlConfigProvider {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the file cannot be read, parsed or validated.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path.as_ref()).map_err(|source| ConfigError::Io {
            path: path.as_ref().display().to_string(),
            source,
        })?;
        Self::parse(&content)
    }

    /// Parse configuration from a TOML string. Missing keys take defaults.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let config: NetworkConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(Self { config })
    }
}

impl ConfigProvider for TomlConfigProvider {
    fn network_config(&self) -> NetworkConfig {
        self.config.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::NodeKind;
    use std::time::Duration;

    #[test]
    fn test_parse_overrides_and_defaults() {
        let provider = TomlConfigProvider::parse(
            r#"
            [establishment]
            success_probability = 0.5

            [scheduler]
            monitor_interval = "2s"

            [[nodes]]
            id = "lisbon"
            kind = "ground"
            location = { latitude = 38.72, longitude = -9.14 }

            [[nodes]]
            id = "sat-1"
            kind = "orbital"
            location = { latitude = 40.0, longitude = -5.0, altitude = 550.0 }
            "#,
        )
        .unwrap();

        let config = provider.network_config();
        assert_eq!(config.establishment.success_probability, 0.5);
        assert_eq!(config.scheduler.monitor_interval, Duration::from_secs(2));
        assert_eq!(config.scheduler.refresh_interval, Duration::from_secs(30));
        assert_eq!(config.resources.floor, 10);

        let nodes = provider.nodes();
        assert_eq!(nodes.len(), 2);
        assert_eq!(nodes[1].kind, NodeKind::Orbital);
        assert_eq!(nodes[1].location.altitude, Some(550.0));
        assert_eq!(nodes[0].capability.max_resource_units, 1000);
    }

    #[test]
    fn test_parse_rejects_invalid_values() {
        let err = TomlConfigProvider::parse(
            r#"
            [establishment]
            success_probability = 1.5
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(NetworkError::InvalidConfiguration(_))));
    }

    #[test]
    fn test_parse_rejects_malformed_toml() {
        let err = TomlConfigProvider::parse("[scheduler\nmonitor_interval =").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_load_missing_file() {
        let err = TomlConfigProvider::load("/nonexistent/qn.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn test_static_provider() {
        let provider = StaticConfigProvider::new().with_config(NetworkConfig::for_testing());
        assert_eq!(
            provider.network_config().scheduler.tick_timeout,
            Duration::from_millis(15)
        );
        assert!(provider.nodes().is_empty());
    }
}
