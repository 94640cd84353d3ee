//! Dashboard configuration, loaded from YAML.
//!
//! ```yaml
//! endpoint: tcp://monitor.local:5000
//! connect_timeout_ms: 3000
//! max_rows: 100
//! indicators:
//!   - name: monitoring
//!     key: m
//!   - name: logging
//!     key: l
//! scalar: base_delay
//! fps: 10
//! ```
//!
//! Every key is optional; missing keys take the defaults above.

use crate::channel::Endpoint;
use crate::render::MAX_ROWS;

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("bad configuration: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// A toggle indicator and the key that flips it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IndicatorConfig {
    pub name: String,
    pub key: char,
}

impl IndicatorConfig {
    pub fn new(name: &str, key: char) -> IndicatorConfig {
        IndicatorConfig {
            name: name.to_string(),
            key,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DashboardConfig {
    pub endpoint: String,
    pub connect_timeout_ms: u64,
    pub max_rows: usize,
    pub indicators: Vec<IndicatorConfig>,
    /// Name of the scalar target fed by `base_delay_update`.
    pub scalar: String,
    /// Terminal redraws per second.
    pub fps: u32,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        DashboardConfig {
            endpoint: "tcp://localhost:5000".to_string(),
            connect_timeout_ms: 3000,
            max_rows: MAX_ROWS,
            indicators: vec![
                IndicatorConfig::new("monitoring", 'm'),
                IndicatorConfig::new("logging", 'l'),
            ],
            scalar: "base_delay".to_string(),
            fps: 10,
        }
    }
}

impl DashboardConfig {
    pub fn from_yaml(text: &str) -> Result<DashboardConfig, ConfigError> {
        let config: DashboardConfig = serde_yaml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<DashboardConfig, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        DashboardConfig::from_yaml(&text)
    }

    pub fn to_yaml(&self) -> Result<String, ConfigError> {
        Ok(serde_yaml::to_string(self)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.endpoint
            .parse::<Endpoint>()
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        if self.max_rows == 0 {
            return Err(ConfigError::Invalid("max_rows must be at least 1".into()));
        }
        if self.fps == 0 {
            return Err(ConfigError::Invalid("fps must be at least 1".into()));
        }
        for (i, ind) in self.indicators.iter().enumerate() {
            if ind.name.is_empty() {
                return Err(ConfigError::Invalid("indicator with empty name".into()));
            }
            if let Some(dup) = self.indicators[..i]
                .iter()
                .find(|o| o.name == ind.name || o.key == ind.key)
            {
                return Err(ConfigError::Invalid(format!(
                    "indicators `{}` and `{}` clash",
                    dup.name, ind.name
                )));
            }
        }
        Ok(())
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn indicator_names(&self) -> impl Iterator<Item = &str> {
        self.indicators.iter().map(|i| i.name.as_str())
    }

    /// The indicator bound to `key`, if any.
    pub fn indicator_for_key(&self, key: char) -> Option<&str> {
        self.indicators
            .iter()
            .find(|i| i.key == key)
            .map(|i| i.name.as_str())
    }
}
