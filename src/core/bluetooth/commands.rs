//! SwitchBot Bot commands implementation
//! This module contains all the commands that can be sent to a Bot

use std::fmt;

use crate::core::bluetooth::types::PowerState;

/// Bot commands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BotCommand {
    /// Momentary press (0x57, 0x01, 0x00)
    Press,
    /// Switch on (0x57, 0x01, 0x01)
    TurnOn,
    /// Switch off (0x57, 0x01, 0x02)
    TurnOff,
}

impl BotCommand {
    /// Convert the command to its byte representation
    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            Self::Press => vec![0x57, 0x01, 0x00],
            Self::TurnOn => vec![0x57, 0x01, 0x01],
            Self::TurnOff => vec![0x57, 0x01, 0x02],
        }
    }

    /// Operation name as used in logs and diagnostics
    pub fn op_name(&self) -> &'static str {
        match self {
            Self::Press => "press",
            Self::TurnOn => "turnOn",
            Self::TurnOff => "turnOff",
        }
    }

    /// State the Bot is assumed to be in once this command went out.
    /// `None` leaves the last commanded state alone.
    pub fn resulting_state(&self) -> Option<PowerState> {
        match self {
            Self::Press => None,
            Self::TurnOn => Some(PowerState::On),
            Self::TurnOff => Some(PowerState::Off),
        }
    }

    pub fn needs_switch_mode(&self) -> bool {
        !matches!(self, Self::Press)
    }
}

impl fmt::Display for BotCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Press => f.write_str("Press"),
            Self::TurnOn => f.write_str("Turn On"),
            Self::TurnOff => f.write_str("Turn Off"),
        }
    }
}
