//! SwitchBot BLE bridge library
//! Discovers SwitchBot Bots over Bluetooth Low Energy and drives them on
//! behalf of a smart-home host or the command-line tool.

// Module declarations
pub mod accessory;
pub mod commands;
pub mod config;
pub mod core;
pub mod logging;
pub mod state;
pub mod utils;
