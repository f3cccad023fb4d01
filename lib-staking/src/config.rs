//! Ledger configuration
//!
//! Loaded from TOML. Every field has a default, so an empty document is a
//! valid configuration.

use std::path::Path;

use serde::{Deserialize, Serialize};

/// Configuration loading error
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("Invalid ledger configuration: {reason}")]
    Invalid { reason: String },

    #[error("File system error: {0}")]
    FileSystem(#[from] std::io::Error),

    #[error("Configuration parsing error: {0}")]
    Parsing(#[from] toml::de::Error),
}

/// Tunables for a [`crate::StakingLedger`]
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LedgerConfig {
    /// Keep an in-memory journal of committed operations
    /// Default: true
    pub record_events: bool,

    /// Maximum number of buffered events; older ones are dropped
    /// Default: 1024
    pub event_capacity: usize,

    /// Reject zero-amount deposits, releases, locks, unlocks and transfers
    /// Default: false
    pub reject_zero_amounts: bool,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            record_events: true,
            event_capacity: 1024,
            reject_zero_amounts: false,
        }
    }
}

impl LedgerConfig {
    /// Parse and validate a TOML document
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        let config: LedgerConfig = toml::from_str(input)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path.as_ref())?;
        let config = Self::from_toml_str(&contents)?;
        tracing::debug!(path = %path.as_ref().display(), ?config, "loaded ledger configuration");
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.record_events && self.event_capacity == 0 {
            return Err(ConfigError::Invalid {
                reason: "event_capacity must be non-zero when record_events is set".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_empty_document_is_default() {
        let config = LedgerConfig::from_toml_str("").unwrap();
        assert_eq!(config, LedgerConfig::default());
    }

    #[test]
    fn test_partial_document_keeps_defaults() {
        let config = LedgerConfig::from_toml_str("reject_zero_amounts = true\n").unwrap();
        assert!(config.reject_zero_amounts);
        assert!(config.record_events);
        assert_eq!(config.event_capacity, 1024);
    }

    #[test]
    fn test_zero_capacity_with_events_is_invalid() {
        let result = LedgerConfig::from_toml_str("event_capacity = 0\n");
        assert!(matches!(result, Err(ConfigError::Invalid { .. })));

        let config =
            LedgerConfig::from_toml_str("record_events = false\nevent_capacity = 0\n").unwrap();
        assert!(!config.record_events);
    }

    #[test]
    fn test_malformed_document() {
        let result = LedgerConfig::from_toml_str("event_capacity = \"lots\"\n");
        assert!(matches!(result, Err(ConfigError::Parsing(_))));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "event_capacity = 16").unwrap();

        let config = LedgerConfig::load(file.path()).unwrap();
        assert_eq!(config.event_capacity, 16);

        let missing = LedgerConfig::load(file.path().with_extension("missing"));
        assert!(matches!(missing, Err(ConfigError::FileSystem(_))));
    }
}
