//! Errors raised at the BLE library boundary.

use std::time::Duration;

use bluest::error::ErrorKind;
use thiserror::Error;
use uuid::Uuid;

const TRANSIENT_PATTERNS: [&str; 5] = [
    "no devices found",
    "disconnected",
    "timeout",
    "timed out",
    "gatt operation failed",
];

#[derive(Debug, Error)]
pub enum BleError {
    #[error("No Bluetooth adapter found")]
    AdapterUnavailable,

    #[error("No devices found during discovery")]
    NoDevicesFound,

    #[error("Peripheral disconnected")]
    Disconnected,

    #[error("Operation timeout after {0:?}")]
    Timeout(Duration),

    #[error("GATT operation failed: {0}")]
    GattOperationFailed(String),

    #[error("Service not found: {0}")]
    ServiceNotFound(Uuid),

    #[error("Characteristic not found: {0}")]
    CharacteristicNotFound(Uuid),

    #[error("Scan failed: {0}")]
    Scan(String),

    #[error(transparent)]
    Bluest(#[from] bluest::Error),

    #[error("{0}")]
    Other(String),
}

impl BleError {
    /// Whether retrying the same operation has a fair chance of succeeding.
    ///
    /// Errors that only reach us as library messages are matched on their
    /// text, so both paths agree on what counts as transient.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::NoDevicesFound
            | Self::Disconnected
            | Self::Timeout(_)
            | Self::GattOperationFailed(_) => true,
            Self::Bluest(e) if matches!(e.kind(), ErrorKind::NotConnected | ErrorKind::Timeout) => {
                true
            }
            _ => {
                let message = self.to_string().to_lowercase();
                TRANSIENT_PATTERNS.iter().any(|p| message.contains(p))
            }
        }
    }

    /// Discovery came back empty-handed, which is retried rather than fatal.
    pub fn is_no_devices_found(&self) -> bool {
        matches!(self, Self::NoDevicesFound)
            || self.to_string().to_lowercase().contains("no devices found")
    }
}
