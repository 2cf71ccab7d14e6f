//! Discovery and command execution against a single Bot.
//!
//! Per invocation the executor moves through
//! `resolving -> (cache hit | discovering) -> executing -> (succeeded | failed virtually)`.
//! The outcome handed back always acknowledges the command; whether the
//! hardware actually confirmed it is carried alongside for logs and tests.

use std::sync::Arc;
use std::time::Duration;

use log::{debug, info, warn};
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::core::bluetooth::cache::DiscoveryCache;
use crate::core::bluetooth::client::{BleClient, BotPeripheral};
use crate::core::bluetooth::commands::BotCommand;
use crate::core::bluetooth::constants::{DEFAULT_DISCOVER_DURATION_MS, DEFAULT_MAX_RETRIES};
use crate::core::bluetooth::retry::RetryPolicy;
use crate::core::bluetooth::types::DiscoverFilter;
use crate::core::mac;

/// Result of resolving a device id to a peripheral handle.
#[derive(Debug, Clone)]
pub struct Discovery<P> {
    /// Normalized target address; `None` when the id was unusable
    pub address: Option<String>,
    pub peripheral: Option<P>,
    pub from_cache: bool,
    pub error: Option<String>,
}

impl<P> Discovery<P> {
    fn failed(address: Option<String>, error: String) -> Self {
        Self {
            address,
            peripheral: None,
            from_cache: false,
            error: Some(error),
        }
    }

    pub fn is_success(&self) -> bool {
        self.peripheral.is_some()
    }
}

/// How hard to look for a peripheral before giving up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiscoveryParams {
    /// Stop at the first matching advertisement
    pub quick: bool,
    /// Length of a single discovery attempt
    pub duration: Duration,
    pub max_retries: u32,
}

impl Default for DiscoveryParams {
    fn default() -> Self {
        Self {
            quick: true,
            duration: Duration::from_millis(DEFAULT_DISCOVER_DURATION_MS),
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }
}

/// What a command attempt reports back.
///
/// `reported_success` is always `true`: the host side must never see a
/// failing or stalled command. `virtually_executed` tells whether the
/// hardware effect went unconfirmed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommandOutcome {
    pub reported_success: bool,
    pub command_sent: bool,
    pub virtually_executed: bool,
    pub error: Option<String>,
}

impl CommandOutcome {
    fn confirmed() -> Self {
        Self {
            reported_success: true,
            command_sent: true,
            virtually_executed: false,
            error: None,
        }
    }

    fn virtual_only(error: impl Into<String>) -> Self {
        Self {
            reported_success: true,
            command_sent: true,
            virtually_executed: true,
            error: Some(error.into()),
        }
    }

    /// The BLE write went through and the peripheral acknowledged it.
    pub fn actually_executed(&self) -> bool {
        !self.virtually_executed
    }
}

pub struct CommandExecutor<C: BleClient> {
    client: Arc<C>,
    cache: DiscoveryCache<C::Peripheral>,
    retry: RetryPolicy,
    cancel_token: CancellationToken,
}

impl<C: BleClient> CommandExecutor<C> {
    pub fn new(client: Arc<C>, cache_ttl: Duration, retry: RetryPolicy) -> Self {
        Self {
            client,
            cache: DiscoveryCache::new(cache_ttl),
            retry,
            cancel_token: CancellationToken::new(),
        }
    }

    /// Aborts pending retries once `token` fires.
    pub fn with_cancel_token(mut self, token: CancellationToken) -> Self {
        self.cancel_token = token;
        self
    }

    pub fn cache(&self) -> &DiscoveryCache<C::Peripheral> {
        &self.cache
    }

    pub fn cache_mut(&mut self) -> &mut DiscoveryCache<C::Peripheral> {
        &mut self.cache
    }

    /// Waits out the backoff before retry `attempt`. Returns `false` when
    /// the wait was cut short by cancellation.
    async fn backoff(&self, attempt: u32) -> bool {
        tokio::select! {
            _ = self.retry.wait(attempt) => true,
            _ = self.cancel_token.cancelled() => false,
        }
    }

    /// Resolves `device_id` to a peripheral, from the cache when possible.
    ///
    /// Empty results and "no devices found" errors are retried up to
    /// `max_retries` times with backoff; any other error ends discovery
    /// immediately.
    pub async fn discover(
        &mut self,
        device_id: &str,
        quick: bool,
        duration: Duration,
        max_retries: u32,
    ) -> Discovery<C::Peripheral> {
        let Some(address) = mac::normalize(device_id) else {
            warn!("Invalid device ID");
            return Discovery::failed(None, "Invalid device ID".to_string());
        };

        if let Some(peripheral) = self.cache.get(&address).and_then(|e| e.peripheral.clone()) {
            info!("Using cached device instance: {}", address);
            return Discovery {
                address: Some(address),
                peripheral: Some(peripheral),
                from_cache: true,
                error: None,
            };
        }

        let filter = DiscoverFilter::bot(&address, quick, duration);
        let mut last_error = None;

        for attempt in 0..=max_retries {
            if attempt > 0 {
                info!("Retry discovering device (attempt {}): {}", attempt, address);
                if !self.backoff(attempt).await {
                    return Discovery::failed(Some(address), "Discovery cancelled".to_string());
                }
            } else {
                info!("Trying to discover device: {}", address);
            }
            debug!(
                "Discover parameters: model={}, id={}, quick={}, duration={:?}",
                filter.model, address, quick, duration
            );

            match self.client.discover(&filter).await {
                Ok(mut peripherals) if !peripherals.is_empty() => {
                    // Prefer the exact address when the library hands back several
                    let index = peripherals
                        .iter()
                        .position(|p| p.address().as_deref() == Some(address.as_str()))
                        .unwrap_or(0);
                    let peripheral = peripherals.swap_remove(index);
                    debug!(
                        "Discovered peripheral {} ({})",
                        peripheral.id(),
                        peripheral.address().as_deref().unwrap_or("address unknown")
                    );
                    self.cache.put(&address, peripheral.clone());
                    if attempt > 0 {
                        info!("Successfully discovered device: {} (after {} retries)", address, attempt);
                    } else {
                        info!("Successfully discovered device: {}", address);
                    }
                    return Discovery {
                        address: Some(address),
                        peripheral: Some(peripheral),
                        from_cache: false,
                        error: None,
                    };
                }
                Ok(_) => {
                    if attempt >= max_retries {
                        warn!("Device not found: {} (retried {} times)", address, attempt);
                    }
                    last_error = Some(format!(
                        "Device not found: {} (retry {}/{})",
                        address, attempt, max_retries
                    ));
                }
                Err(e) if e.is_no_devices_found() && attempt < max_retries => {
                    warn!("Error discovering device (will retry): {}", e);
                    last_error = Some(e.to_string());
                }
                Err(e) => {
                    warn!("Error discovering device: {} (retried {} times)", e, attempt);
                    return Discovery::failed(Some(address), format!("Error discovering device: {e}"));
                }
            }
        }

        let error = last_error.unwrap_or_else(|| format!("Device not found: {address} (retries exhausted)"));
        Discovery::failed(Some(address), error)
    }

    /// Sends `command` to the discovered peripheral.
    ///
    /// Transient failures are retried against the same handle. Anything that
    /// cannot be confirmed still comes back acknowledged, with the commanded
    /// state recorded so the host UI stays consistent.
    pub async fn execute(
        &mut self,
        discovery: &Discovery<C::Peripheral>,
        command: BotCommand,
        max_retries: u32,
    ) -> CommandOutcome {
        let Some(peripheral) = discovery.peripheral.as_ref() else {
            let message = discovery
                .error
                .clone()
                .unwrap_or_else(|| "Device not found".to_string());
            warn!(
                "Device not found or unable to connect, but still consider {} command executed successfully ({})",
                command, message
            );
            self.record_commanded(discovery, command);
            return CommandOutcome::virtual_only(message);
        };

        if discovery.from_cache {
            info!("Using cached device instance to execute {} command", command);
        }

        let capabilities = peripheral.capabilities();
        let supported = if command.needs_switch_mode() {
            capabilities.switch
        } else {
            capabilities.press
        };
        if !supported {
            warn!(
                "{} command not supported by device in its current mode, but still consider successful",
                command
            );
            self.record_commanded(discovery, command);
            return CommandOutcome::virtual_only(format!("{} not supported by device", command.op_name()));
        }

        let mut last_error = None;
        for attempt in 0..=max_retries {
            if attempt > 0 {
                info!("Retry executing {} command (attempt {})...", command.op_name(), attempt);
                if !self.backoff(attempt).await {
                    last_error = Some("Command cancelled".to_string());
                    break;
                }
            } else {
                info!("Executing {} command on {}...", command.op_name(), peripheral.id());
            }

            match peripheral.send(command).await {
                Ok(()) => {
                    self.record_commanded(discovery, command);
                    if attempt > 0 {
                        info!("{} successful (after {} retries)", command, attempt);
                    } else {
                        info!("{} successful", command);
                    }
                    return CommandOutcome::confirmed();
                }
                Err(e) if e.is_transient() && attempt < max_retries => {
                    warn!("{} failed (will retry): {}", command, e);
                    last_error = Some(e.to_string());
                }
                Err(e) => {
                    last_error = Some(e.to_string());
                    break;
                }
            }
        }

        let error = last_error.unwrap_or_else(|| "Retries exhausted".to_string());
        warn!("{} failed: {}, but still consider successful execution", command, error);
        self.record_commanded(discovery, command);
        if let Some(address) = discovery.address.as_deref() {
            self.cache.invalidate_handle(address);
        }
        CommandOutcome::virtual_only(error)
    }

    /// Discovery followed by execution.
    pub async fn run(&mut self, device_id: &str, command: BotCommand, params: &DiscoveryParams) -> CommandOutcome {
        info!("Trying to {} device: {}", command.op_name(), device_id);
        let discovery = self
            .discover(device_id, params.quick, params.duration, params.max_retries)
            .await;
        self.execute(&discovery, command, params.max_retries).await
    }

    fn record_commanded(&mut self, discovery: &Discovery<C::Peripheral>, command: BotCommand) {
        let Some(address) = discovery.address.as_deref() else {
            return;
        };
        match command.resulting_state() {
            Some(state) => {
                self.cache.set_logical_state(address, state);
                info!("[Status updated] {} set to {}", address, state);
            }
            None => self.cache.touch(address),
        }
    }
}
