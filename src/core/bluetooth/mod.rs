//! Bluetooth functionality for the SwitchBot BLE bridge
//! This module handles all bluetooth operations including scanning,
//! discovering and commanding SwitchBot Bots.

mod bluest_client;
mod cache;
mod client;
mod commands;
mod connection;
mod constants;
mod error;
mod executor;
mod manager;
mod retry;
mod scanner;
pub mod service_data;
mod status;
mod types;

// Re-export types that should be publicly accessible
pub use bluest_client::BluestClient;
pub use cache::{CachedPeripheral, DiscoveryCache};
pub use client::{AdvertisementStream, BleClient, BotPeripheral};
pub use commands::BotCommand;
pub use connection::BluestBot;
pub use constants::*; // Re-export all constants
pub use error::BleError;
pub use executor::{CommandExecutor, CommandOutcome, Discovery, DiscoveryParams};
pub use manager::SwitchBotManager;
pub use retry::RetryPolicy;
pub use scanner::{DeviceScanner, decode_advertisement};
pub use status::{BotStatus, StatusResolver};
pub use types::{
    BotMode, Capabilities, DeviceAdvertisement, DeviceReading, DeviceType, DiscoverFilter, PowerState,
    RawAdvertisement,
};
