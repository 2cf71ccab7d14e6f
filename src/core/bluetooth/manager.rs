//! Bluetooth manager for the SwitchBot BLE bridge
//! This module provides the main interface for bluetooth operations

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use log::info;
use tokio_util::sync::CancellationToken;

use crate::config::bridge_config::BridgeConfig;
use crate::core::bluetooth::bluest_client::BluestClient;
use crate::core::bluetooth::client::BleClient;
use crate::core::bluetooth::commands::BotCommand;
use crate::core::bluetooth::executor::{CommandExecutor, CommandOutcome};
use crate::core::bluetooth::scanner::DeviceScanner;
use crate::core::bluetooth::status::{BotStatus, StatusResolver};
use crate::core::bluetooth::types::{DeviceAdvertisement, PowerState};
use crate::core::mac;
use crate::core::matcher::{self, MatchContext};

/// Owns everything that talks to the radio.
///
/// Methods take `&mut self` wherever the discovery cache may change, so a
/// manager shared behind a mutex runs one radio operation at a time.
pub struct SwitchBotManager<C: BleClient> {
    scanner: DeviceScanner<C>,
    executor: CommandExecutor<C>,
    status_resolver: StatusResolver<C>,
    config: BridgeConfig,
    /// Fires on shutdown; pending scans end early and retries stop
    cancel_token: CancellationToken,
}

impl SwitchBotManager<BluestClient> {
    /// Creates a manager on the system's default Bluetooth adapter.
    pub async fn with_default_adapter(config: BridgeConfig) -> Result<Self> {
        let client = BluestClient::new(config.operation_timeout()).await?;
        Ok(Self::new(Arc::new(client), config))
    }
}

impl<C: BleClient> SwitchBotManager<C> {
    pub fn new(client: Arc<C>, config: BridgeConfig) -> Self {
        let cancel_token = CancellationToken::new();
        let executor = CommandExecutor::new(client.clone(), config.cache_ttl(), config.retry)
            .with_cancel_token(cancel_token.clone());

        Self {
            scanner: DeviceScanner::new(client.clone()),
            executor,
            status_resolver: StatusResolver::new(client),
            config,
            cancel_token,
        }
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    /// Token that aborts in-flight radio work without taking the manager lock.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel_token.clone()
    }

    pub fn executor(&self) -> &CommandExecutor<C> {
        &self.executor
    }

    /// Lists advertising SwitchBot devices; `None` uses the configured duration.
    pub async fn scan(&self, duration: Option<Duration>) -> Vec<DeviceAdvertisement> {
        let duration = duration.unwrap_or_else(|| self.config.scan_duration());
        self.scanner.scan_until(duration, None, &self.cancel_token).await
    }

    /// Resolves a full or partial address against a fresh scan.
    ///
    /// A complete MAC turns the scan into a targeted one that ends as soon as
    /// the device is heard.
    pub async fn find(&self, user_input: &str, context: &MatchContext<'_>) -> Option<String> {
        let target = mac::normalize(user_input).filter(|n| mac::hex_digits(n).len() == 12);
        let results = self
            .scanner
            .scan_until(self.config.scan_duration(), target.as_deref(), &self.cancel_token)
            .await;
        matcher::resolve(user_input, &results, context)
    }

    pub async fn status(&mut self, device_id: &str) -> BotStatus {
        info!("Getting status of device: {}", device_id);
        let params = self.config.discovery_params();
        self.status_resolver
            .resolve(
                device_id,
                self.config.status_duration(),
                self.config.status_fallback_duration(),
                &mut self.executor,
                &params,
                &self.cancel_token,
            )
            .await
    }

    pub async fn execute(&mut self, device_id: &str, command: BotCommand) -> CommandOutcome {
        let params = self.config.discovery_params();
        self.executor.run(device_id, command, &params).await
    }

    pub async fn press(&mut self, device_id: &str) -> CommandOutcome {
        self.execute(device_id, BotCommand::Press).await
    }

    pub async fn turn_on(&mut self, device_id: &str) -> CommandOutcome {
        self.execute(device_id, BotCommand::TurnOn).await
    }

    pub async fn turn_off(&mut self, device_id: &str) -> CommandOutcome {
        self.execute(device_id, BotCommand::TurnOff).await
    }

    /// Last commanded state of `device_id`, `Unknown` if never commanded.
    pub fn logical_state(&self, device_id: &str) -> PowerState {
        mac::normalize(device_id)
            .map(|address| self.executor.cache().logical_state(&address))
            .unwrap_or_default()
    }
}
