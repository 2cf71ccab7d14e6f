//! Bluetooth connection handling for a SwitchBot Bot
//! A Bot is connected only for the duration of one command write.

use std::time::Duration;

use async_trait::async_trait;
use bluest::{Adapter, Characteristic, Device};
use log::{debug, info, warn};
use tokio::time::timeout;

use crate::core::bluetooth::client::BotPeripheral;
use crate::core::bluetooth::commands::BotCommand;
use crate::core::bluetooth::constants::{UUID_BOT_SERVICE, UUID_BOT_WRITE_CHAR};
use crate::core::bluetooth::error::BleError;
use crate::core::bluetooth::types::DeviceAdvertisement;
use crate::core::mac;

/// A discovered Bot, reachable through the adapter it was found on.
#[derive(Clone)]
pub struct BluestBot {
    adapter: Adapter,
    device: Device,
    id: String,
    snapshot: Option<DeviceAdvertisement>,
    operation_timeout: Duration,
}

impl BluestBot {
    pub fn new(
        adapter: Adapter,
        device: Device,
        snapshot: Option<DeviceAdvertisement>,
        operation_timeout: Duration,
    ) -> Self {
        let id = device.id().to_string();
        Self {
            adapter,
            device,
            id,
            snapshot,
            operation_timeout,
        }
    }

    /// Connects if needed and locates the command characteristic.
    async fn write_characteristic(&self) -> Result<Characteristic, BleError> {
        if !self.device.is_connected().await {
            info!("Initiating connection to {}...", self.id);
            self.adapter.connect_device(&self.device).await?;
        }

        debug!("Connection successful, discovering services...");
        let services = self.device.discover_services().await?;
        let service = services
            .iter()
            .find(|s| s.uuid() == UUID_BOT_SERVICE)
            .ok_or_else(|| {
                for service in &services {
                    debug!("Available service: {}", service.uuid());
                }
                BleError::ServiceNotFound(UUID_BOT_SERVICE)
            })?;

        service
            .discover_characteristics()
            .await?
            .into_iter()
            .find(|c| c.uuid() == UUID_BOT_WRITE_CHAR)
            .ok_or(BleError::CharacteristicNotFound(UUID_BOT_WRITE_CHAR))
    }

    async fn write(&self, command: BotCommand) -> Result<(), BleError> {
        let write_char = self.write_characteristic().await?;
        debug!("Sending command to Bot {}: {:?}", self.id, command);
        write_char
            .write(&command.to_bytes())
            .await
            .map_err(|e| BleError::GattOperationFailed(e.to_string()))
    }

    async fn disconnect(&self) {
        if !self.device.is_connected().await {
            return;
        }
        match self.adapter.disconnect_device(&self.device).await {
            Ok(()) => debug!("Disconnected from {}", self.id),
            Err(e) => warn!("Failed to disconnect from {}: {}", self.id, e),
        }
    }
}

#[async_trait]
impl BotPeripheral for BluestBot {
    fn id(&self) -> &str {
        &self.id
    }

    fn address(&self) -> Option<String> {
        self.snapshot
            .as_ref()
            .map(|s| s.address.clone())
            .or_else(|| mac::extract_from_id(&self.id))
    }

    fn snapshot(&self) -> Option<&DeviceAdvertisement> {
        self.snapshot.as_ref()
    }

    async fn send(&self, command: BotCommand) -> Result<(), BleError> {
        let result = timeout(self.operation_timeout, self.write(command))
            .await
            .unwrap_or(Err(BleError::Timeout(self.operation_timeout)));
        self.disconnect().await;
        result
    }
}
