//! The seam between the bridge and the BLE library.
//! Everything above this module talks to hardware only through these traits,
//! which lets the scanner, executor and resolver run against a fake radio.

use async_trait::async_trait;
use futures_util::stream::BoxStream;

use crate::core::bluetooth::commands::BotCommand;
use crate::core::bluetooth::error::BleError;
use crate::core::bluetooth::types::{Capabilities, DeviceAdvertisement, DiscoverFilter, RawAdvertisement};

/// Advertisements delivered while a scan session is open.
pub type AdvertisementStream = BoxStream<'static, Result<RawAdvertisement, BleError>>;

/// Scan and discovery capability of a BLE adapter
#[async_trait]
pub trait BleClient: Send + Sync + 'static {
    type Peripheral: BotPeripheral + Clone + 'static;

    /// Opens a scan session; advertisements arrive on the returned stream
    /// until [`BleClient::stop_scan`] is called.
    async fn start_scan(&self) -> Result<AdvertisementStream, BleError>;

    async fn stop_scan(&self) -> Result<(), BleError>;

    /// Resolves peripherals matching `filter` into handles that accept commands.
    async fn discover(&self, filter: &DiscoverFilter) -> Result<Vec<Self::Peripheral>, BleError>;
}

/// A discovered Bot that accepts commands
#[async_trait]
pub trait BotPeripheral: Send + Sync {
    /// Platform identifier
    fn id(&self) -> &str;

    /// Normalized MAC address, if known
    fn address(&self) -> Option<String>;

    /// The advertisement this peripheral was discovered from
    fn snapshot(&self) -> Option<&DeviceAdvertisement>;

    fn capabilities(&self) -> Capabilities {
        Capabilities::for_mode(self.snapshot().and_then(DeviceAdvertisement::mode))
    }

    async fn send(&self, command: BotCommand) -> Result<(), BleError>;
}
