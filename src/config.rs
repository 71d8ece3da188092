//! Configuration for deploysim.

use std::path::Path;

use figment::providers::{Env, Format, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};

use crate::error::{SimError, SimResult, ValidationError};

/// Default configuration file, looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "deploysim.toml";

/// Prefix for environment overrides, e.g. `DEPLOYSIM_ENGINE__TIME_SCALE`.
pub const ENV_PREFIX: &str = "DEPLOYSIM_";

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SimulatorConfig {
    /// Engine behaviour.
    #[serde(default)]
    pub engine: EngineConfig,

    /// Command-line driver behaviour.
    #[serde(default)]
    pub cli: CliConfig,
}

impl SimulatorConfig {
    /// Load configuration from the default sources.
    ///
    /// Configuration is loaded in the following order (later sources override earlier):
    /// 1. Default values
    /// 2. `deploysim.toml` in the current directory (if present)
    /// 3. Environment variables with `DEPLOYSIM_` prefix
    ///
    /// # Errors
    ///
    /// Returns `SimError::Config` if a source cannot be parsed, or a
    /// validation error for out-of-range values.
    pub fn load() -> SimResult<Self> {
        Self::from_figment(
            Figment::new()
                .merge(Toml::file(DEFAULT_CONFIG_FILE))
                .merge(Env::prefixed(ENV_PREFIX).split("__")),
        )
    }

    /// Load configuration from a specific TOML file, then the environment.
    ///
    /// # Errors
    ///
    /// Same as [`SimulatorConfig::load`].
    pub fn from_file(path: impl AsRef<Path>) -> SimResult<Self> {
        Self::from_figment(
            Figment::new()
                .merge(Toml::file(path.as_ref()))
                .merge(Env::prefixed(ENV_PREFIX).split("__")),
        )
    }

    /// Extracts and validates configuration from an arbitrary figment.
    ///
    /// # Errors
    ///
    /// Same as [`SimulatorConfig::load`].
    pub fn from_figment(figment: Figment) -> SimResult<Self> {
        let config: Self = figment.extract().map_err(|e| SimError::Config {
            message: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Checks value ranges.
    ///
    /// # Errors
    ///
    /// Returns `InvalidTimeScale` for a negative or non-finite time scale.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.engine.validate()
    }
}

/// Engine configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Multiplier applied to every nominal step duration; 0 skips waits.
    #[serde(default = "default_time_scale")]
    pub time_scale: f64,

    /// Seed for the failure model; entropy-seeded when absent.
    #[serde(default)]
    pub seed: Option<u64>,
}

impl EngineConfig {
    /// Checks value ranges.
    ///
    /// # Errors
    ///
    /// Returns `InvalidTimeScale` for a negative or non-finite time scale.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if !self.time_scale.is_finite() || self.time_scale < 0.0 {
            return Err(ValidationError::InvalidTimeScale {
                value: self.time_scale,
            });
        }
        Ok(())
    }
}

const fn default_time_scale() -> f64 {
    1.0
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            time_scale: default_time_scale(),
            seed: None,
        }
    }
}

/// Command-line driver configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CliConfig {
    /// How often the driver polls simulation status.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Tracing filter directive used when `RUST_LOG` is unset.
    #[serde(default = "default_log_filter")]
    pub log_filter: String,
}

const fn default_poll_interval_ms() -> u64 {
    500
}

fn default_log_filter() -> String {
    "deploysim=info".to_string()
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            log_filter: default_log_filter(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = SimulatorConfig::default();
        assert!((config.engine.time_scale - 1.0).abs() < f64::EPSILON);
        assert!(config.engine.seed.is_none());
        assert_eq!(config.cli.poll_interval_ms, 500);
        assert_eq!(config.cli.log_filter, "deploysim=info");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn config_from_toml() {
        let toml = r#"
            [engine]
            time_scale = 0.01
            seed = 42

            [cli]
            poll_interval_ms = 100
        "#;

        let config = SimulatorConfig::from_figment(Figment::new().merge(Toml::string(toml))).unwrap();
        assert!((config.engine.time_scale - 0.01).abs() < f64::EPSILON);
        assert_eq!(config.engine.seed, Some(42));
        assert_eq!(config.cli.poll_interval_ms, 100);
        assert_eq!(config.cli.log_filter, "deploysim=info");
    }

    #[test]
    fn empty_sources_fall_back_to_defaults() {
        let config = SimulatorConfig::from_figment(Figment::new()).unwrap();
        assert_eq!(config, SimulatorConfig::default());
    }

    #[test]
    fn negative_time_scale_is_rejected() {
        let toml = "[engine]\ntime_scale = -1.0\n";
        let err = SimulatorConfig::from_figment(Figment::new().merge(Toml::string(toml))).unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn malformed_value_is_config_error() {
        let toml = "[cli]\npoll_interval_ms = \"soon\"\n";
        let err = SimulatorConfig::from_figment(Figment::new().merge(Toml::string(toml))).unwrap_err();
        assert!(matches!(err, SimError::Config { .. }));
    }
}
