//! Constants used throughout the application
//! This module contains all the constant values used in the application,
//! such as UUIDs, timeouts, and other configuration values.

use uuid::Uuid;

/// SwitchBot service-data UUID (current firmware, 0xFD3D)
pub const UUID_SWITCHBOT_SERVICE_DATA: Uuid = Uuid::from_u128(0x0000fd3d_0000_1000_8000_00805f9b34fb);

/// SwitchBot service-data UUID used by older firmware (0x0D00)
pub const UUID_SWITCHBOT_SERVICE_DATA_LEGACY: Uuid = Uuid::from_u128(0x00000d00_0000_1000_8000_00805f9b34fb);

/// The UUID of the SwitchBot Bot GATT service
pub const UUID_BOT_SERVICE: Uuid = Uuid::from_u128(0xcba20d00_224d_11e6_9fb8_0002a5d5c51b);

/// The UUID of the SwitchBot Bot write characteristic
pub const UUID_BOT_WRITE_CHAR: Uuid = Uuid::from_u128(0xcba20002_224d_11e6_9fb8_0002a5d5c51b);

/// Model code of a Bot in service data
pub const MODEL_BOT: u8 = b'H';

/// Model code of a Meter in service data
pub const MODEL_METER: u8 = b'T';

/// Model code of a Contact Sensor in service data
pub const MODEL_CONTACT_SENSOR: u8 = b's';

/// How long a discovered peripheral handle may be reused, in milliseconds
pub const CACHE_TTL_MS: u64 = 60_000;

/// Default advertisement scan duration in milliseconds
pub const DEFAULT_SCAN_DURATION_MS: u64 = 3000;

/// Default duration of a single discovery attempt in milliseconds
pub const DEFAULT_DISCOVER_DURATION_MS: u64 = 1500;

/// Default number of retries after the first discovery or command attempt
pub const DEFAULT_MAX_RETRIES: u32 = 5;

/// Default linear backoff step between retries in milliseconds
pub const DEFAULT_RETRY_STEP_MS: u64 = 500;

/// Upper bound on a single connect or write, in milliseconds
pub const BLUETOOTH_OPERATION_TIMEOUT_MS: u64 = 10_000;

/// Upper bound on a whole host-issued command, in milliseconds
pub const DEFAULT_COMMAND_TIMEOUT_MS: u64 = 8000;
