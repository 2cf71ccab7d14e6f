//! Bridge commands
//! This module defines all the commands that can be invoked by the host or the CLI.
//!
//! Radio work is serialized on the manager lock; address normalization
//! never touches it.

use std::time::Instant;

use anyhow::Result;
use log::{debug, warn};
use serde::Serialize;
use tokio::process::Command;

use crate::core::bluetooth::{BleClient, BotStatus, CommandOutcome, DeviceAdvertisement, PowerState};
use crate::core::mac;
use crate::core::matcher::MatchContext;
use crate::state::AppState;
use crate::utils::format_uptime;

/// Host and process facts reported by [`server_status`].
#[derive(Debug, Clone, Serialize)]
pub struct ServerStatus {
    pub platform: String,
    pub runtime_version: String,
    /// Seconds since the bridge started, two decimals
    pub uptime: String,
    pub uptime_human: String,
    pub has_elevated_privileges: bool,
    pub privilege_message: String,
}

/// Scans for SwitchBot devices
///
/// # Arguments
/// * `app_state` - The application state
/// * `duration_ms` - Scan window, the configured default when `None`
pub async fn scan_devices<C: BleClient>(app_state: &AppState<C>, duration_ms: Option<u64>) -> Vec<DeviceAdvertisement> {
    let switchbot_manager_arc = app_state.switchbot_manager.clone();
    let switchbot_manager_guard = switchbot_manager_arc.lock().await;

    switchbot_manager_guard
        .scan(duration_ms.map(std::time::Duration::from_millis))
        .await
}

/// Resolves a full or partial MAC to the address of a nearby device
pub async fn find_device<C: BleClient>(
    app_state: &AppState<C>,
    user_input: &str,
    context: &MatchContext<'_>,
) -> Option<String> {
    let switchbot_manager_arc = app_state.switchbot_manager.clone();
    let switchbot_manager_guard = switchbot_manager_arc.lock().await;

    switchbot_manager_guard.find(user_input, context).await
}

/// Reads a Bot's state, mode and battery
pub async fn get_status<C: BleClient>(app_state: &AppState<C>, device_id: &str) -> BotStatus {
    let switchbot_manager_arc = app_state.switchbot_manager.clone();
    let mut switchbot_manager_guard = switchbot_manager_arc.lock().await;

    switchbot_manager_guard.status(device_id).await
}

pub async fn press_bot<C: BleClient>(app_state: &AppState<C>, device_id: &str) -> CommandOutcome {
    let switchbot_manager_arc = app_state.switchbot_manager.clone();
    let mut switchbot_manager_guard = switchbot_manager_arc.lock().await;

    switchbot_manager_guard.press(device_id).await
}

pub async fn turn_on_bot<C: BleClient>(app_state: &AppState<C>, device_id: &str) -> CommandOutcome {
    let switchbot_manager_arc = app_state.switchbot_manager.clone();
    let mut switchbot_manager_guard = switchbot_manager_arc.lock().await;

    switchbot_manager_guard.turn_on(device_id).await
}

pub async fn turn_off_bot<C: BleClient>(app_state: &AppState<C>, device_id: &str) -> CommandOutcome {
    let switchbot_manager_arc = app_state.switchbot_manager.clone();
    let mut switchbot_manager_guard = switchbot_manager_arc.lock().await;

    switchbot_manager_guard.turn_off(device_id).await
}

/// Last state the bridge commanded for `device_id`
pub async fn logical_state<C: BleClient>(app_state: &AppState<C>, device_id: &str) -> PowerState {
    let switchbot_manager_arc = app_state.switchbot_manager.clone();
    let switchbot_manager_guard = switchbot_manager_arc.lock().await;

    switchbot_manager_guard.logical_state(device_id)
}

pub fn normalize_mac(input: &str) -> Option<String> {
    mac::normalize(input)
}

/// Host diagnostics. Needs no Bluetooth adapter, so it also works when
/// adapter bring-up is what fails.
pub async fn server_status(started_at: Instant) -> ServerStatus {
    let has_elevated_privileges = match check_elevated_privileges().await {
        Ok(elevated) => elevated,
        Err(e) => {
            warn!("Failed to check privileges: {}", e);
            false
        }
    };
    let uptime = started_at.elapsed();

    ServerStatus {
        platform: format!("{}-{}", std::env::consts::OS, std::env::consts::ARCH),
        runtime_version: format!("{} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION")),
        uptime: format!("{:.2} seconds", uptime.as_secs_f64()),
        uptime_human: format_uptime(uptime.as_secs()),
        has_elevated_privileges,
        privilege_message: if has_elevated_privileges {
            "Running with elevated privileges".to_string()
        } else {
            "Not running with elevated privileges, Bluetooth access may be restricted".to_string()
        },
    }
}

#[cfg(unix)]
async fn check_elevated_privileges() -> Result<bool> {
    let output = Command::new("id").arg("-u").output().await?;
    let uid = String::from_utf8_lossy(&output.stdout);
    debug!("Effective uid: {}", uid.trim());
    Ok(uid.trim() == "0")
}

#[cfg(windows)]
async fn check_elevated_privileges() -> Result<bool> {
    let output = Command::new("powershell")
        .args([
            "-NoProfile",
            "-Command",
            "([Security.Principal.WindowsPrincipal][Security.Principal.WindowsIdentity]::GetCurrent())\
             .IsInRole([Security.Principal.WindowsBuiltInRole]::Administrator)",
        ])
        .output()
        .await?;
    let answer = String::from_utf8_lossy(&output.stdout);
    debug!("Administrator role check: {}", answer.trim());
    Ok(answer.trim().eq_ignore_ascii_case("true"))
}

#[cfg(not(any(unix, windows)))]
async fn check_elevated_privileges() -> Result<bool> {
    Ok(false)
}
