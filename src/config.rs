//! Engine configuration

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

const CONFIG_FILE: &str = "roster.json";

/// Tunable behavior of the mirror engine
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RosterConfig {
    /// Config schema version
    pub version: u32,

    /// Default logging directive for `init_logging`
    pub log_level: String,

    /// Register property tracking with the source for every mirrored buddy
    pub track_presence: bool,

    /// Drop rename notifications whose name matches the last one reported
    pub suppress_noop_renames: bool,
}

impl RosterConfig {
    const TARGET_VERSION: u32 = 1;

    /// Load configuration from `data_dir`, or fail if absent or invalid
    pub fn load_from(data_dir: &Path) -> Result<Self> {
        let config_path = data_dir.join(CONFIG_FILE);
        let json = fs::read_to_string(&config_path)?;
        let config: RosterConfig = serde_json::from_str(&json)?;
        if config.version > Self::TARGET_VERSION {
            return Err(anyhow!(
                "config version {} is newer than supported {}",
                config.version,
                Self::TARGET_VERSION
            ));
        }
        info!("Loaded config from {:?}", config_path);
        Ok(config)
    }

    /// Load configuration from `data_dir`, writing defaults when absent
    pub fn load_or_create(data_dir: &Path) -> Result<Self> {
        let config_path = data_dir.join(CONFIG_FILE);
        if config_path.exists() {
            Self::load_from(data_dir)
        } else {
            warn!("No config found, creating default at {:?}", config_path);
            let config = Self::default();
            config.save(data_dir)?;
            Ok(config)
        }
    }

    /// Save configuration to `data_dir`
    pub fn save(&self, data_dir: &Path) -> Result<()> {
        fs::create_dir_all(data_dir)?;
        let config_path = data_dir.join(CONFIG_FILE);
        let json = serde_json::to_string_pretty(self)?;
        fs::write(&config_path, json)?;
        info!("Saved config to {:?}", config_path);
        Ok(())
    }

    pub fn config_path(data_dir: &Path) -> PathBuf {
        data_dir.join(CONFIG_FILE)
    }
}

impl Default for RosterConfig {
    fn default() -> Self {
        Self {
            version: Self::TARGET_VERSION,
            log_level: "info".to_string(),
            track_presence: true,
            suppress_noop_renames: true,
        }
    }
}
