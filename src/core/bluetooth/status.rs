//! Bot status lookup.
//! Listens for the Bot's own advertisements first, which needs no connection;
//! only when that stays silent does it fall back to heavier lookups.

use std::sync::Arc;
use std::time::Duration;

use log::{debug, info, warn};
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::core::bluetooth::client::{BleClient, BotPeripheral};
use crate::core::bluetooth::executor::{CommandExecutor, DiscoveryParams};
use crate::core::bluetooth::scanner::DeviceScanner;
use crate::core::bluetooth::types::{BotMode, DeviceAdvertisement, DeviceReading, DeviceType, PowerState};
use crate::core::mac;

/// Status snapshot of a Bot
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BotStatus {
    pub device_id: String,
    pub device_type: DeviceType,
    pub state: Option<PowerState>,
    pub mode: Option<BotMode>,
    pub battery: Option<u8>,
    pub error: Option<String>,
}

impl BotStatus {
    fn empty(device_id: &str) -> Self {
        Self {
            device_id: device_id.to_string(),
            device_type: DeviceType::Bot,
            state: None,
            mode: None,
            battery: None,
            error: None,
        }
    }

    fn with_error(device_id: &str, error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Self::empty(device_id)
        }
    }

    fn from_advertisement(device_id: &str, advertisement: &DeviceAdvertisement) -> Self {
        let mut status = Self::empty(device_id);
        status.device_type = advertisement.device_type;
        if let DeviceReading::Bot { mode, state, battery } = advertisement.reading {
            status.state = Some(state);
            status.mode = mode;
            status.battery = battery;
        }
        status
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }

    /// On/off as a binary switch should show it.
    ///
    /// A Bot reports `Off` while its arm is not held down, which for a
    /// Switch-mode Bot is the toggle being on. Hence the inversion.
    pub fn homekit_on(&self) -> bool {
        self.state == Some(PowerState::Off)
    }
}

pub struct StatusResolver<C: BleClient> {
    scanner: DeviceScanner<C>,
}

impl<C: BleClient> StatusResolver<C> {
    pub fn new(client: Arc<C>) -> Self {
        Self {
            scanner: DeviceScanner::new(client),
        }
    }

    /// Passive lookup: scans for the device's advertisement without connecting.
    pub async fn get_status(&self, device_id: &str, duration: Duration, cancel: &CancellationToken) -> BotStatus {
        let Some(address) = mac::normalize(device_id) else {
            return BotStatus::with_error(device_id, "Invalid device ID");
        };

        info!("Scanning for device {} (max {:?})...", address, duration);
        let found = self.scanner.scan_until(duration, Some(&address), cancel).await;

        match find_target(&found, &address) {
            Some(advertisement) => BotStatus::from_advertisement(&address, advertisement),
            None => {
                debug!("Device {} did not advertise within {:?}", address, duration);
                BotStatus::with_error(&address, "Device did not respond to advertisement")
            }
        }
    }

    /// Full lookup chain: advertisement listen, then an untargeted scan
    /// matched on address or raw id, then connect-based discovery through
    /// `executor` (which also seeds its cache).
    pub async fn resolve(
        &self,
        device_id: &str,
        duration: Duration,
        fallback_duration: Duration,
        executor: &mut CommandExecutor<C>,
        params: &DiscoveryParams,
        cancel: &CancellationToken,
    ) -> BotStatus {
        let status = self.get_status(device_id, duration, cancel).await;
        if status.is_ok() {
            return status;
        }
        let Some(address) = mac::normalize(device_id) else {
            return status;
        };
        if let Some(error) = &status.error {
            warn!("Failed to get status via advertisement: {}", error);
        }

        info!("Trying to get status by scanning device...");
        let found = self.scanner.scan_until(fallback_duration, None, cancel).await;
        if let Some(advertisement) = find_target(&found, &address) {
            if advertisement.device_type == DeviceType::Bot {
                info!("Found device: {}", advertisement.address);
                return BotStatus::from_advertisement(&address, advertisement);
            }
        }

        if cancel.is_cancelled() {
            return BotStatus::with_error(&address, "Status lookup cancelled");
        }

        info!("Trying to get status by discovering device...");
        let discovery = executor
            .discover(&address, params.quick, params.duration, params.max_retries)
            .await;
        match discovery.peripheral.as_ref().and_then(|p| p.snapshot()) {
            Some(snapshot) => BotStatus::from_advertisement(&address, snapshot),
            None => {
                warn!("Unable to get status of device {}", address);
                let error = discovery
                    .error
                    .unwrap_or_else(|| "Unable to get device status".to_string());
                BotStatus::with_error(&address, error)
            }
        }
    }
}

fn find_target<'a>(found: &'a [DeviceAdvertisement], address: &str) -> Option<&'a DeviceAdvertisement> {
    found
        .iter()
        .find(|d| d.address == address || mac::equals(&d.raw_id, address))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status(state: Option<PowerState>) -> BotStatus {
        BotStatus {
            state,
            ..BotStatus::empty("dd:0b:72:15:c3:39")
        }
    }

    #[test]
    fn homekit_view_is_inverted() {
        assert!(status(Some(PowerState::Off)).homekit_on());
        assert!(!status(Some(PowerState::On)).homekit_on());
        assert!(!status(None).homekit_on());
    }

    #[test]
    fn non_bot_advertisement_keeps_fields_empty() {
        let ad = DeviceAdvertisement {
            address: "dd:0b:72:15:c3:39".into(),
            raw_id: "dd:0b:72:15:c3:39".into(),
            device_type: DeviceType::Meter,
            reading: DeviceReading::Meter {
                temperature: Some(20.0),
                humidity: Some(40),
                battery: Some(80),
            },
            rssi: None,
        };
        let status = BotStatus::from_advertisement(&ad.address, &ad);
        assert_eq!(status.device_type, DeviceType::Meter);
        assert_eq!(status.state, None);
        assert!(status.is_ok());
    }
}
