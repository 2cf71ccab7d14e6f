//! Application state management
//! This module defines and manages the global application state.

use std::sync::Arc;

use anyhow::Result;
use log::info;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use crate::config::bridge_config::BridgeConfig;
use crate::core::SwitchBotManager;
use crate::core::bluetooth::{BleClient, BluestClient};

/// Global application state
pub struct AppState<C: BleClient = BluestClient> {
    /// The single radio; every scan, discovery and command goes through this lock
    pub switchbot_manager: Arc<Mutex<SwitchBotManager<C>>>,
    cancel_token: CancellationToken,
}

impl AppState<BluestClient> {
    /// Creates a new AppState on the default Bluetooth adapter
    pub async fn new(config: BridgeConfig) -> Result<Self> {
        info!("Initializing SwitchBotManager...");
        let manager = SwitchBotManager::with_default_adapter(config).await?;
        Ok(Self::from_manager(manager))
    }
}

impl<C: BleClient> AppState<C> {
    pub fn from_manager(manager: SwitchBotManager<C>) -> Self {
        let cancel_token = manager.cancel_token();
        Self {
            switchbot_manager: Arc::new(Mutex::new(manager)),
            cancel_token,
        }
    }

    /// Gets a reference to the SwitchBot manager
    pub fn get_switchbot_manager_arc(&self) -> Arc<Mutex<SwitchBotManager<C>>> {
        self.switchbot_manager.clone()
    }

    /// Aborts in-flight scans and retry waits. Usable while another task
    /// holds the manager lock.
    pub fn cancel(&self) {
        self.cancel_token.cancel();
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel_token.clone()
    }

}
