//! Core functionality for the SwitchBot BLE bridge
//! Device discovery, command execution and address handling.

pub mod bluetooth;
pub mod mac;
pub mod matcher;

// Re-export commonly used types
pub use bluetooth::SwitchBotManager;
pub use matcher::{Disambiguator, MatchContext};
