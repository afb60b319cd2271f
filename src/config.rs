use std::{fs, path::Path, time::Duration};

use serde::Deserialize;

use crate::{ReqflowError, Result};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// logging config
    #[serde(default)]
    pub log: LogConfig,
    /// executor config
    #[serde(default)]
    pub executor: ExecutorConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LogConfig {
    /// max log level: trace, debug, info, warn or error. defaults to info
    #[serde(default = "default_log_level")]
    pub level: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExecutorConfig {
    /// deadline for a whole graph run in milliseconds, unlimited when unset
    pub run_timeout: Option<u64>,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl ExecutorConfig {
    pub fn run_timeout(&self) -> Option<Duration> {
        self.run_timeout.map(Duration::from_millis)
    }
}

impl Config {
    pub fn create<T: AsRef<Path>>(path: T) -> Result<Self> {
        let data = fs::read_to_string(path.as_ref()).map_err(|e| ReqflowError::Config(format!("failed to load config file {:?}: {}", path.as_ref(), e)))?;

        Self::load_from_str(data.as_str())
    }

    pub fn load_from_str(toml_str: &str) -> Result<Self> {
        let config = toml::from_str::<Config>(toml_str)?;
        Ok(config)
    }
}
