pub mod bridge_config;
pub mod device_config;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use log::{error, info, warn};
use serde::{Deserialize, Serialize};
use tokio::fs;

use crate::config::bridge_config::BridgeConfig;
use crate::config::device_config::DeviceConfig;
use crate::utils::ensure_directory_exists;

const CONFIG_DIR_NAME: &str = "switchbot-ble-bridge";
const CONFIG_FILE_NAME: &str = "config.json";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub bridge: BridgeConfig,
    pub devices: Vec<DeviceConfig>,
}

impl AppConfig {
    /// `<config dir>/switchbot-ble-bridge/config.json`
    pub fn default_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir().context("No configuration directory on this platform")?;
        Ok(config_dir.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
    }

    fn resolve_path(path: Option<&Path>) -> Result<PathBuf> {
        match path {
            Some(path) => Ok(path.to_path_buf()),
            None => Self::default_path(),
        }
    }

    /// Loads the config from `path`, or from the default location.
    pub async fn load_config(path: Option<&Path>) -> Result<Self> {
        let file_path = Self::resolve_path(path)?;

        if !file_path.exists() {
            warn!("Config file not found at {:?}, using default.", file_path);
            return Ok(Self::default());
        }

        let config_json = fs::read_to_string(&file_path)
            .await
            .with_context(|| format!("Failed to read {}", file_path.display()))?;
        let config: Self = serde_json::from_str(&config_json)
            .with_context(|| format!("Failed to parse {}", file_path.display()))?;

        info!("Config loaded from {:?}", file_path);
        Ok(config)
    }

    /// Saves the config to `path`, or to the default location.
    pub async fn save_config(&self, path: Option<&Path>) -> Result<()> {
        let file_path = Self::resolve_path(path)?;
        if let Some(dir) = file_path.parent() {
            ensure_directory_exists(dir).await?;
        }

        let config_json = match serde_json::to_string_pretty(self) {
            Ok(json) => json,
            Err(e) => {
                error!("Failed to serialize config to JSON: {}", e);
                return Err(e.into());
            }
        };

        fs::write(&file_path, config_json).await?;

        info!("Config saved to {:?}.", file_path);
        Ok(())
    }

    /// Writes a default config unless one exists (or `overwrite` is set).
    /// Returns the file written, `None` when an existing file was kept.
    pub async fn init_config(path: Option<&Path>, overwrite: bool) -> Result<Option<PathBuf>> {
        let file_path = Self::resolve_path(path)?;
        if file_path.exists() && !overwrite {
            info!("Config already present at {:?}, leaving it untouched", file_path);
            return Ok(None);
        }
        Self::default().save_config(Some(&file_path)).await?;
        Ok(Some(file_path))
    }
}
