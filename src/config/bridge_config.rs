use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::core::bluetooth::{
    BLUETOOTH_OPERATION_TIMEOUT_MS, CACHE_TTL_MS, DEFAULT_COMMAND_TIMEOUT_MS, DEFAULT_DISCOVER_DURATION_MS,
    DEFAULT_MAX_RETRIES, DEFAULT_SCAN_DURATION_MS, DiscoveryParams, RetryPolicy,
};

/// Timing and retry settings shared by every BLE operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Length of an untargeted scan
    pub scan_duration_ms: u64,

    /// Length of a single connect-capable discovery attempt
    pub discover_duration_ms: u64,

    /// Stop discovery at the first matching Bot
    pub quick_discovery: bool,

    /// Retries after the first discovery or command attempt
    pub max_retries: u32,

    /// Advertisement listening window for status lookups
    pub status_duration_ms: u64,

    /// Window of the untargeted scan tried when the Bot stayed silent
    pub status_fallback_duration_ms: u64,

    pub cache_ttl_ms: u64,

    /// Upper bound on a host-issued command, after which it is acknowledged anyway
    pub command_timeout_ms: u64,

    /// Upper bound on one GATT connect and write
    pub operation_timeout_ms: u64,

    pub retry: RetryPolicy,

    /// One of `error`, `warn`, `info`, `debug`, `trace`
    pub log_level: String,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            scan_duration_ms: DEFAULT_SCAN_DURATION_MS,
            discover_duration_ms: DEFAULT_DISCOVER_DURATION_MS,
            quick_discovery: true,
            max_retries: DEFAULT_MAX_RETRIES,
            status_duration_ms: DEFAULT_SCAN_DURATION_MS,
            status_fallback_duration_ms: DEFAULT_SCAN_DURATION_MS,
            cache_ttl_ms: CACHE_TTL_MS,
            command_timeout_ms: DEFAULT_COMMAND_TIMEOUT_MS,
            operation_timeout_ms: BLUETOOTH_OPERATION_TIMEOUT_MS,
            retry: RetryPolicy::default(),
            log_level: "info".to_string(),
        }
    }
}

impl BridgeConfig {
    pub fn scan_duration(&self) -> Duration {
        Duration::from_millis(self.scan_duration_ms)
    }

    pub fn status_duration(&self) -> Duration {
        Duration::from_millis(self.status_duration_ms)
    }

    pub fn status_fallback_duration(&self) -> Duration {
        Duration::from_millis(self.status_fallback_duration_ms)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_millis(self.cache_ttl_ms)
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_millis(self.command_timeout_ms)
    }

    pub fn operation_timeout(&self) -> Duration {
        Duration::from_millis(self.operation_timeout_ms)
    }

    pub fn discovery_params(&self) -> DiscoveryParams {
        DiscoveryParams {
            quick: self.quick_discovery,
            duration: Duration::from_millis(self.discover_duration_ms),
            max_retries: self.max_retries,
        }
    }

    /// Parsed `log_level`, falling back to `Info` on anything unrecognized.
    pub fn level_filter(&self) -> log::LevelFilter {
        self.log_level.parse().unwrap_or(log::LevelFilter::Info)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_timings() {
        let config = BridgeConfig::default();
        assert_eq!(config.scan_duration(), Duration::from_secs(3));
        assert_eq!(config.cache_ttl(), Duration::from_secs(60));
        let params = config.discovery_params();
        assert!(params.quick);
        assert_eq!(params.duration, Duration::from_millis(1500));
        assert_eq!(params.max_retries, 5);
        assert_eq!(config.retry, RetryPolicy::Linear { step_ms: 500 });
    }

    #[test]
    fn partial_json_keeps_remaining_defaults() {
        let config: BridgeConfig = serde_json::from_str(r#"{"max_retries": 2, "log_level": "debug"}"#).unwrap();
        assert_eq!(config.max_retries, 2);
        assert_eq!(config.level_filter(), log::LevelFilter::Debug);
        assert_eq!(config.command_timeout_ms, 8000);
    }

    #[test]
    fn unknown_log_level_falls_back_to_info() {
        let config = BridgeConfig {
            log_level: "chatty".into(),
            ..BridgeConfig::default()
        };
        assert_eq!(config.level_filter(), log::LevelFilter::Info);
    }
}
