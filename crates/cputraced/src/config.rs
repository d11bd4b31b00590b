use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use cputrace_common::stats::StatsConfig;

const CONFIG_FILE: &str = "/etc/cputrace/config.toml";
const DEFAULT_CONFIG: &str = include_str!("../../../config/default.toml");

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub daemon: DaemonConfig,
    pub logging: LoggingConfig,
    pub stats: StatsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonConfig {
    pub socket_path: String,
    pub db_path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for Config {
    fn default() -> Self {
        toml::from_str(DEFAULT_CONFIG).expect("Invalid default config")
    }
}

pub fn load_config() -> Result<Config> {
    if Path::new(CONFIG_FILE).exists() {
        let contents = fs::read_to_string(CONFIG_FILE)
            .context(format!("Failed to read {}", CONFIG_FILE))?;
        let config: Config =
            toml::from_str(&contents).context(format!("Failed to parse {}", CONFIG_FILE))?;
        Ok(config)
    } else {
        // First run: write the compiled-in default
        let config = Config::default();
        let toml_str = toml::to_string_pretty(&config)?;
        fs::write(CONFIG_FILE, toml_str)
            .context(format!("Failed to write default config to {}", CONFIG_FILE))?;
        Ok(config)
    }
}
