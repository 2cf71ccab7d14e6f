//! SwitchBot service-data decoding
//! The first byte selects the product family; the remaining bytes are
//! interpreted per family. Short payloads decode to whatever fields are
//! present, never panic.

use crate::core::bluetooth::constants::{MODEL_BOT, MODEL_CONTACT_SENSOR, MODEL_METER};
use crate::core::bluetooth::types::{BotMode, DeviceReading, PowerState};

/// Model code carried in the low seven bits of byte 0.
pub fn model_code(data: &[u8]) -> Option<u8> {
    data.first().map(|b| b & 0x7f)
}

/// Decodes a SwitchBot service-data payload.
pub fn decode(data: &[u8]) -> DeviceReading {
    match model_code(data) {
        Some(MODEL_BOT) => decode_bot(data),
        Some(MODEL_METER) => decode_meter(data),
        Some(MODEL_CONTACT_SENSOR) => decode_contact_sensor(data),
        _ => DeviceReading::Unknown,
    }
}

fn battery(data: &[u8]) -> Option<u8> {
    data.get(2).map(|b| b & 0x7f)
}

fn decode_bot(data: &[u8]) -> DeviceReading {
    let Some(&flags) = data.get(1) else {
        return DeviceReading::Bot {
            mode: None,
            state: PowerState::Unknown,
            battery: None,
        };
    };

    let mode = if flags & 0b1000_0000 != 0 {
        BotMode::Switch
    } else {
        BotMode::Press
    };
    // The device sets this bit when the arm is NOT held down.
    let state = if flags & 0b0100_0000 != 0 {
        PowerState::Off
    } else {
        PowerState::On
    };

    DeviceReading::Bot {
        mode: Some(mode),
        state,
        battery: battery(data),
    }
}

fn decode_meter(data: &[u8]) -> DeviceReading {
    let temperature = match (data.get(3), data.get(4)) {
        (Some(&decimal), Some(&integer)) => {
            let magnitude = f32::from(integer & 0x7f) + f32::from(decimal & 0x0f) / 10.0;
            Some(if integer & 0x80 != 0 { magnitude } else { -magnitude })
        }
        _ => None,
    };

    DeviceReading::Meter {
        temperature,
        humidity: data.get(5).map(|b| b & 0x7f),
        battery: battery(data),
    }
}

fn decode_contact_sensor(data: &[u8]) -> DeviceReading {
    let contact = match data.get(3) {
        Some(&door) => Some(door & 0b0000_0110 == 0),
        None => data.get(1).map(|flags| flags & 0b0100_0000 == 0),
    };

    DeviceReading::ContactSensor {
        contact,
        battery: battery(data),
    }
}
