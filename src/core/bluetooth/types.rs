//! Defines shared data structures for the Bluetooth module.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// SwitchBot product family, selected by the one-byte model code in service data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeviceType {
    Bot,
    Meter,
    ContactSensor,
    Unknown,
}

impl fmt::Display for DeviceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Bot => "Bot",
            Self::Meter => "Meter",
            Self::ContactSensor => "Contact Sensor",
            Self::Unknown => "Unknown",
        };
        f.write_str(name)
    }
}

/// Physical operating mode of a Bot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BotMode {
    /// Toggles a persistent on/off state
    Switch,
    /// Momentary actuation, no persisted state
    Press,
}

impl fmt::Display for BotMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Switch => f.write_str("Switch"),
            Self::Press => f.write_str("Press"),
        }
    }
}

/// On/off state as reported by a device or as last commanded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PowerState {
    On,
    Off,
    #[default]
    Unknown,
}

impl fmt::Display for PowerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::On => f.write_str("ON"),
            Self::Off => f.write_str("OFF"),
            Self::Unknown => f.write_str("UNKNOWN"),
        }
    }
}

/// Device-specific fields decoded from service data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DeviceReading {
    Bot {
        /// `None` when the payload stops before the flags byte
        mode: Option<BotMode>,
        state: PowerState,
        battery: Option<u8>,
    },
    Meter {
        temperature: Option<f32>,
        humidity: Option<u8>,
        battery: Option<u8>,
    },
    ContactSensor {
        contact: Option<bool>,
        battery: Option<u8>,
    },
    Unknown,
}

impl DeviceReading {
    pub fn device_type(&self) -> DeviceType {
        match self {
            Self::Bot { .. } => DeviceType::Bot,
            Self::Meter { .. } => DeviceType::Meter,
            Self::ContactSensor { .. } => DeviceType::ContactSensor,
            Self::Unknown => DeviceType::Unknown,
        }
    }
}

/// One advertisement as handed over by the BLE library, before decoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawAdvertisement {
    /// Peripheral identifier as reported by the platform
    pub id: String,
    /// MAC address, when the platform exposes one
    pub address: Option<String>,
    /// SwitchBot service-data payload
    pub service_data: Option<Vec<u8>>,
    pub rssi: Option<i16>,
}

/// A decoded advertisement, one per unique address per scan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceAdvertisement {
    /// Normalized MAC, the primary identity
    pub address: String,
    /// Peripheral-reported identifier, may differ in format from `address`
    pub raw_id: String,
    pub device_type: DeviceType,
    pub reading: DeviceReading,
    pub rssi: Option<i16>,
}

impl DeviceAdvertisement {
    pub fn mode(&self) -> Option<BotMode> {
        match self.reading {
            DeviceReading::Bot { mode, .. } => mode,
            _ => None,
        }
    }

    pub fn state(&self) -> PowerState {
        match self.reading {
            DeviceReading::Bot { state, .. } => state,
            _ => PowerState::Unknown,
        }
    }

    pub fn battery(&self) -> Option<u8> {
        match self.reading {
            DeviceReading::Bot { battery, .. }
            | DeviceReading::Meter { battery, .. }
            | DeviceReading::ContactSensor { battery, .. } => battery,
            DeviceReading::Unknown => None,
        }
    }
}

/// Operations a discovered Bot accepts, fixed at discovery time from its mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    pub press: bool,
    pub switch: bool,
}

impl Capabilities {
    pub const ALL: Self = Self { press: true, switch: true };

    /// A Press-mode Bot has no persisted state to switch; anything else
    /// (Switch mode, or a mode we never saw) is allowed both.
    pub fn for_mode(mode: Option<BotMode>) -> Self {
        match mode {
            Some(BotMode::Press) => Self { press: true, switch: false },
            _ => Self::ALL,
        }
    }
}

/// Parameters for a connect-capable discovery through the BLE library.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoverFilter {
    /// One-byte model code, `'H'` for Bot
    pub model: char,
    /// Normalized target address
    pub id: Option<String>,
    /// Return on the first match instead of waiting out `duration`
    pub quick: bool,
    pub duration: Duration,
}

impl DiscoverFilter {
    pub fn bot(id: &str, quick: bool, duration: Duration) -> Self {
        Self {
            model: 'H',
            id: Some(id.to_string()),
            quick,
            duration,
        }
    }
}
