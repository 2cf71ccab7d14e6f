//! Host-facing switches
//! Each configured Bot is exposed as a binary on/off characteristic. A
//! setter never fails and never stalls past the command timeout; whatever
//! happens on the radio, the host gets a state back.

use std::sync::{Arc, Mutex as StdMutex, PoisonError};
use std::time::Duration;

use log::{debug, error, info, warn};
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, interval_at, sleep, timeout};
use tokio_util::sync::CancellationToken;

use crate::config::bridge_config::BridgeConfig;
use crate::config::device_config::{DeviceConfig, SwitchMode};
use crate::core::SwitchBotManager;
use crate::core::bluetooth::{BleClient, BotCommand, CommandOutcome};

fn on_off(value: bool) -> &'static str {
    if value { "ON" } else { "OFF" }
}

struct StatusCheck {
    cancel_token: CancellationToken,
    handle: JoinHandle<()>,
}

/// One Bot as the host sees it.
pub struct BotSwitch<C: BleClient> {
    name: String,
    device_id: Option<String>,
    config: DeviceConfig,
    manager: Arc<Mutex<SwitchBotManager<C>>>,
    command_timeout: Duration,
    /// Tracked on/off, published to whoever mirrors it on the host
    state: Arc<watch::Sender<bool>>,
    status_check: StdMutex<Option<StatusCheck>>,
}

impl<C: BleClient> BotSwitch<C> {
    pub fn new(config: DeviceConfig, manager: Arc<Mutex<SwitchBotManager<C>>>, command_timeout: Duration) -> Self {
        let (state, _) = watch::channel(false);
        Self {
            name: config.name.clone().unwrap_or_else(|| "SwitchBot".to_string()),
            device_id: config.device_id.clone(),
            config,
            manager,
            command_timeout,
            state: Arc::new(state),
            status_check: StdMutex::new(None),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn device_id(&self) -> Option<&str> {
        self.device_id.as_deref()
    }

    pub fn get_on(&self) -> bool {
        let value = *self.state.borrow();
        debug!("[{}] Getting current state: {}", self.name, on_off(value));
        value
    }

    /// Receives every change of the tracked state, including auto-off and
    /// status-check updates.
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.state.subscribe()
    }

    /// Drives the Bot towards `value` and returns the tracked state.
    ///
    /// The command keeps running in the background when it outlasts the
    /// command timeout; the host is answered at the timeout regardless.
    pub async fn set_on(self: &Arc<Self>, value: bool) -> bool {
        info!("[{}] Setting switch state to {}", self.name, on_off(value));

        let Some(device_id) = self.device_id.clone() else {
            error!("[{}] No device ID configured", self.name);
            self.state.send_replace(value);
            return value;
        };

        let this = Arc::clone(self);
        let execution = tokio::spawn(async move { this.execute(&device_id, value).await });

        match timeout(self.command_timeout, execution).await {
            Ok(Ok(outcome)) => {
                if outcome.actually_executed() {
                    info!("[{}] Command successfully sent to SwitchBot", self.name);
                } else {
                    warn!(
                        "[{}] Command sent but reported issues: {}",
                        self.name,
                        outcome.error.as_deref().unwrap_or("unknown error")
                    );
                }
            }
            Ok(Err(e)) => {
                error!("[{}] Error controlling device: {}", self.name, e);
                self.force_state(value);
            }
            Err(_) => {
                error!("[{}] Command execution timed out after {:?}", self.name, self.command_timeout);
                self.force_state(value);
            }
        }

        self.get_on()
    }

    async fn execute(&self, device_id: &str, value: bool) -> CommandOutcome {
        let command = match (self.config.mode, value) {
            (SwitchMode::Press, _) => BotCommand::Press,
            (SwitchMode::Switch, true) => BotCommand::TurnOn,
            (SwitchMode::Switch, false) => BotCommand::TurnOff,
        };
        info!("[{}] {} device: {}", self.name, command, device_id);

        let outcome = {
            let mut manager = self.manager.lock().await;
            manager.execute(device_id, command).await
        };

        self.state.send_replace(value);
        debug!("[{}] Updated state: {}", self.name, on_off(value));

        if value && (self.config.mode == SwitchMode::Press || self.config.auto_off) {
            self.schedule_auto_off();
        }
        outcome
    }

    /// Keeps the UI in step with what was asked for. A pressed Bot has no
    /// lasting state, so press mode is left alone.
    fn force_state(&self, value: bool) {
        if self.config.mode != SwitchMode::Press {
            self.state.send_replace(value);
            info!("[{}] Forced state update despite error: {}", self.name, on_off(value));
        }
    }

    fn schedule_auto_off(&self) {
        let delay = self.config.auto_off_delay();
        let state = Arc::clone(&self.state);
        let name = self.name.clone();
        debug!("[{}] Auto-off scheduled in {:?}", name, delay);

        tokio::spawn(async move {
            sleep(delay).await;
            debug!("[{}] Auto-off triggered", name);
            state.send_replace(false);
        });
    }

    /// Starts polling the Bot's status when enabled in its config.
    pub fn start_status_check(self: &Arc<Self>) {
        if !self.config.enable_status_check || self.device_id.is_none() {
            return;
        }
        self.stop_status_check();

        let period = self.config.status_check_interval();
        let cancel_token = CancellationToken::new();
        let cancel_token_for_task = cancel_token.clone();
        let this = Arc::clone(self);

        let handle = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            loop {
                tokio::select! {
                    _ = ticker.tick() => this.check_device_status().await,
                    _ = cancel_token_for_task.cancelled() => break,
                }
            }
        });

        *self.status_check.lock().unwrap_or_else(PoisonError::into_inner) = Some(StatusCheck { cancel_token, handle });
        info!("[{}] Status check timer started with interval {:?}", self.name, period);
    }

    pub fn stop_status_check(&self) {
        let task = self
            .status_check
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(task) = task {
            task.cancel_token.cancel();
            task.handle.abort();
            info!("[{}] Status check timer stopped", self.name);
        }
    }

    /// Reads the Bot's advertised state and mirrors it into the tracked state.
    pub async fn check_device_status(&self) {
        let Some(device_id) = self.device_id.as_deref() else {
            return;
        };
        info!("[{}] Running scheduled status check for device: {}", self.name, device_id);

        let status = {
            let mut manager = self.manager.lock().await;
            manager.status(device_id).await
        };

        if status.state.is_none() {
            warn!("[{}] Status check completed but no valid state returned", self.name);
            if let Some(error) = &status.error {
                warn!("[{}] Status check error: {}", self.name, error);
            }
            return;
        }

        let device_is_on = status.homekit_on();
        if self.get_on() != device_is_on {
            info!("[{}] Device state changed externally: {}", self.name, on_off(device_is_on));
            self.state.send_replace(device_is_on);
        } else {
            debug!("[{}] Device state unchanged, remains: {}", self.name, on_off(device_is_on));
        }
        if let Some(battery) = status.battery {
            debug!("[{}] Device battery: {}%", self.name, battery);
        }
    }
}

/// All configured switches.
pub struct BotPlatform<C: BleClient> {
    switches: Vec<Arc<BotSwitch<C>>>,
}

impl<C: BleClient> BotPlatform<C> {
    /// Builds a switch per entry that names both a `name` and a `device_id`.
    pub fn from_config(
        devices: &[DeviceConfig],
        manager: Arc<Mutex<SwitchBotManager<C>>>,
        bridge: &BridgeConfig,
    ) -> Self {
        if devices.is_empty() {
            warn!("No devices configured. Check your config.json");
        }

        let switches = devices
            .iter()
            .filter(|device| {
                let complete = device.name.is_some() && device.device_id.is_some();
                if !complete {
                    warn!("Device config is missing name or device_id, skipping: {:?}", device);
                }
                complete
            })
            .map(|device| {
                info!(
                    "Adding device: {} ({})",
                    device.name.as_deref().unwrap_or_default(),
                    device.device_id.as_deref().unwrap_or_default()
                );
                Arc::new(BotSwitch::new(device.clone(), manager.clone(), bridge.command_timeout()))
            })
            .collect();

        Self { switches }
    }

    pub fn switches(&self) -> &[Arc<BotSwitch<C>>] {
        &self.switches
    }

    pub fn start(&self) {
        for switch in &self.switches {
            switch.start_status_check();
        }
    }

    pub fn shutdown(&self) {
        for switch in &self.switches {
            switch.stop_status_check();
        }
    }
}
