//! Config loading, validation, and conversion into engine settings.

use super::model::Config;
use crate::error::{PostcrewError, Result};
use crate::workflow::{EngineSettings, RetryPolicy};
use std::path::Path;
use std::time::Duration;

impl Config {
    /// Load config from a YAML file.
    ///
    /// Unknown fields in the YAML are silently ignored for forward compatibility.
    ///
    /// # Returns
    ///
    /// * `Ok(Config)` - Successfully loaded and validated config
    /// * `Err(PostcrewError::ConfigError)` - Read error, parse error or validation failure
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let content = std::fs::read_to_string(path).map_err(|e| {
            PostcrewError::ConfigError(format!(
                "failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;

        Self::from_yaml(&content)
    }

    /// Load config from `path`, or defaults if the file does not exist.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Parse config from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        // An empty document deserializes as null.
        let config: Config = if yaml.trim().is_empty() {
            Config::default()
        } else {
            serde_yaml::from_str(yaml).map_err(|e| {
                PostcrewError::ConfigError(format!("failed to parse config YAML: {}", e))
            })?
        };

        config.validate()?;
        Ok(config)
    }

    /// Serialize config to YAML string.
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).map_err(|e| {
            PostcrewError::ConfigError(format!("failed to serialize config to YAML: {}", e))
        })
    }

    /// Validate config values.
    ///
    /// - `concurrency_limit` must be positive
    /// - `backoff_max_ms` must not be below `backoff_initial_ms`
    /// - `catalog` and `agents` must be non-empty paths
    pub fn validate(&self) -> Result<()> {
        if self.concurrency_limit == 0 {
            return Err(PostcrewError::ConfigError(
                "concurrency_limit must be greater than 0".to_string(),
            ));
        }

        if self.backoff_max_ms < self.backoff_initial_ms {
            return Err(PostcrewError::ConfigError(format!(
                "backoff_max_ms ({}) must not be less than backoff_initial_ms ({})",
                self.backoff_max_ms, self.backoff_initial_ms
            )));
        }

        for (field, value) in [("catalog", &self.catalog), ("agents", &self.agents)] {
            if value.trim().is_empty() {
                return Err(PostcrewError::ConfigError(format!(
                    "{} must be a non-empty path",
                    field
                )));
            }
        }

        Ok(())
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries,
            backoff_initial: Duration::from_millis(self.backoff_initial_ms),
            backoff_max: Duration::from_millis(self.backoff_max_ms),
        }
    }

    pub fn engine_settings(&self) -> EngineSettings {
        EngineSettings {
            retry: self.retry_policy(),
            concurrency_limit: self.concurrency_limit,
            preflight: self.preflight,
        }
    }
}
