use std::time::Duration;

use serde::{Deserialize, Serialize};

/// How a configured Bot is driven by the host.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SwitchMode {
    /// Turn on and off as a persistent switch
    #[default]
    Switch,
    /// Press once per activation, then fall back to off
    Press,
}

/// One Bot exposed to the host as a binary switch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    pub name: Option<String>,
    pub device_id: Option<String>,
    pub mode: SwitchMode,
    /// Report off again after `auto_off_delay_secs`, also in switch mode
    pub auto_off: bool,
    pub auto_off_delay_secs: u64,
    /// Poll the Bot's advertised state periodically
    pub enable_status_check: bool,
    pub status_check_interval_secs: u64,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            name: None,
            device_id: None,
            mode: SwitchMode::Switch,
            auto_off: false,
            auto_off_delay_secs: 1,
            enable_status_check: false,
            status_check_interval_secs: 60,
        }
    }
}

impl DeviceConfig {
    pub fn auto_off_delay(&self) -> Duration {
        Duration::from_secs(self.auto_off_delay_secs)
    }

    pub fn status_check_interval(&self) -> Duration {
        Duration::from_secs(self.status_check_interval_secs.max(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_host_style_entry() {
        let config: DeviceConfig =
            serde_json::from_str(r#"{"name": "Light", "device_id": "DD:0B:72:15:C3:39", "mode": "press"}"#).unwrap();
        assert_eq!(config.name.as_deref(), Some("Light"));
        assert_eq!(config.mode, SwitchMode::Press);
        assert_eq!(config.auto_off_delay(), Duration::from_secs(1));
        assert!(!config.enable_status_check);
    }

    #[test]
    fn zero_interval_is_clamped() {
        let config = DeviceConfig {
            status_check_interval_secs: 0,
            ..DeviceConfig::default()
        };
        assert_eq!(config.status_check_interval(), Duration::from_secs(1));
    }
}
