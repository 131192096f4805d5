//! TOML configuration files.
//!
//! ```toml
//! [logging]
//! filter = "lamina=debug"
//!
//! [advisor]
//! policy = "complete"
//! staleness_threshold = 4
//!
//! [advisor.queue]
//! kind = "lru"
//! ```

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::advisor::AdvisorOptions;
use crate::types::{LaminaError, Result};

/// Logging section.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directive string.
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
        }
    }
}

/// Whole configuration file; missing sections take their defaults.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LaminaConfig {
    /// Logging setup.
    pub logging: LoggingConfig,
    /// Prefetch advisor options.
    pub advisor: AdvisorOptions,
}

impl LaminaConfig {
    /// Parses and validates a configuration document.
    pub fn from_toml_str(source: &str) -> Result<Self> {
        let config: Self = toml::from_str(source)
            .map_err(|err| LaminaError::Config(format!("failed to parse config: {err}")))?;
        config.advisor.validate()?;
        Ok(config)
    }

    /// Serializes the configuration back to TOML.
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|err| LaminaError::Config(format!("failed to serialize config: {err}")))
    }
}

/// Reads a configuration file.
pub fn load_config(path: impl AsRef<Path>) -> Result<LaminaConfig> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path).map_err(|source| {
        LaminaError::Config(format!("failed to read config {}: {source}", path.display()))
    })?;
    let config: LaminaConfig = toml::from_str(&contents).map_err(|source| {
        LaminaError::Config(format!("failed to parse config {}: {source}", path.display()))
    })?;
    config.advisor.validate()?;
    Ok(config)
}

/// Reads the `[advisor]` section of a configuration file.
pub fn load_advisor_options(path: impl AsRef<Path>) -> Result<AdvisorOptions> {
    Ok(load_config(path)?.advisor)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::advisor::AdvisePolicy;
    use crate::primitives::concurrency::QueueKind;
    use std::io::Write;

    #[test]
    fn loads_sections_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[logging]\nfilter = \"lamina=trace\"\n\n[advisor]\npolicy = \"sequential\"\nwindow_bytes = 4096\n\n[advisor.queue]\nkind = \"lru\"\nlru_max_age = 8\n"
        )
        .unwrap();
        let config = load_config(file.path()).unwrap();
        assert_eq!(config.logging.filter, "lamina=trace");
        assert_eq!(config.advisor.policy, AdvisePolicy::Sequential);
        assert_eq!(config.advisor.window_bytes, 4096);
        assert_eq!(config.advisor.queue.kind, QueueKind::Lru);
        assert_eq!(config.advisor.queue.lru_max_age, 8);
        let options = load_advisor_options(file.path()).unwrap();
        assert_eq!(options, config.advisor);
    }

    #[test]
    fn missing_file_names_the_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.toml");
        let err = load_config(&path).unwrap_err();
        match err {
            LaminaError::Config(msg) => assert!(msg.contains("absent.toml")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn empty_document_is_all_defaults() {
        let config = LaminaConfig::from_toml_str("").unwrap();
        assert_eq!(config, LaminaConfig::default());
        let text = config.to_toml_string().unwrap();
        assert_eq!(LaminaConfig::from_toml_str(&text).unwrap(), config);
    }

    #[test]
    fn invalid_values_fail_validation() {
        let err = LaminaConfig::from_toml_str("[advisor.queue]\nkind = \"ring\"\nring_capacity = 0\n")
            .unwrap_err();
        assert!(matches!(err, LaminaError::Invalid(_)));
    }
}
