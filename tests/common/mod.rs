#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::{StreamExt, stream};
use switchbot_ble_bridge_lib::core::bluetooth::{
    AdvertisementStream, BleClient, BleError, BotCommand, BotMode, BotPeripheral, DeviceAdvertisement, DeviceReading,
    DeviceType, DiscoverFilter, PowerState, RawAdvertisement,
};

pub const BOT_ADDRESS: &str = "dd:0b:72:15:c3:39";
pub const OTHER_ADDRESS: &str = "e1:22:33:44:55:66";

/// Bot service data: model `'H'`, mode bit 7, "arm up" (Off) bit 6, battery.
pub fn bot_service_data(mode: BotMode, state: PowerState, battery: u8) -> Vec<u8> {
    let mut flags = 0u8;
    if mode == BotMode::Switch {
        flags |= 0x80;
    }
    if state == PowerState::Off {
        flags |= 0x40;
    }
    vec![0x48, flags, battery]
}

pub fn bot_advertisement(address: &str, mode: BotMode, state: PowerState) -> RawAdvertisement {
    RawAdvertisement {
        id: address.replace(':', "").to_uppercase(),
        address: Some(address.to_uppercase()),
        service_data: Some(bot_service_data(mode, state, 87)),
        rssi: Some(-60),
    }
}

pub fn bot_snapshot(address: &str, mode: BotMode, state: PowerState) -> DeviceAdvertisement {
    DeviceAdvertisement {
        address: address.to_string(),
        raw_id: address.replace(':', ""),
        device_type: DeviceType::Bot,
        reading: DeviceReading::Bot {
            mode: Some(mode),
            state,
            battery: Some(87),
        },
        rssi: Some(-60),
    }
}

/// One scripted scan event, delivered `after` the previous one.
#[derive(Clone)]
pub struct ScanEvent {
    pub after: Duration,
    pub item: Result<RawAdvertisement, String>,
}

impl ScanEvent {
    pub fn advert(after_ms: u64, advertisement: RawAdvertisement) -> Self {
        Self {
            after: Duration::from_millis(after_ms),
            item: Ok(advertisement),
        }
    }

    pub fn error(after_ms: u64, message: &str) -> Self {
        Self {
            after: Duration::from_millis(after_ms),
            item: Err(message.to_string()),
        }
    }
}

#[derive(Clone)]
pub struct FakeBot {
    id: String,
    snapshot: Option<DeviceAdvertisement>,
    responses: Arc<Mutex<VecDeque<Result<(), BleError>>>>,
    sent: Arc<Mutex<Vec<BotCommand>>>,
    send_delay: Duration,
}

impl FakeBot {
    pub fn new(address: &str, mode: Option<BotMode>) -> Self {
        Self {
            id: address.replace(':', ""),
            snapshot: mode.map(|mode| bot_snapshot(address, mode, PowerState::Off)),
            responses: Arc::new(Mutex::new(VecDeque::new())),
            sent: Arc::new(Mutex::new(Vec::new())),
            send_delay: Duration::ZERO,
        }
    }

    /// Scripted results for successive `send` calls; `Ok` once exhausted.
    pub fn with_responses(self, responses: Vec<Result<(), BleError>>) -> Self {
        *self.responses.lock().unwrap() = responses.into();
        self
    }

    pub fn with_snapshot(mut self, snapshot: DeviceAdvertisement) -> Self {
        self.snapshot = Some(snapshot);
        self
    }

    pub fn with_send_delay(mut self, delay: Duration) -> Self {
        self.send_delay = delay;
        self
    }

    pub fn sent(&self) -> Vec<BotCommand> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl BotPeripheral for FakeBot {
    fn id(&self) -> &str {
        &self.id
    }

    fn address(&self) -> Option<String> {
        self.snapshot.as_ref().map(|s| s.address.clone())
    }

    fn snapshot(&self) -> Option<&DeviceAdvertisement> {
        self.snapshot.as_ref()
    }

    async fn send(&self, command: BotCommand) -> Result<(), BleError> {
        if !self.send_delay.is_zero() {
            tokio::time::sleep(self.send_delay).await;
        }
        self.sent.lock().unwrap().push(command);
        self.responses.lock().unwrap().pop_front().unwrap_or(Ok(()))
    }
}

/// In-memory radio: scans replay `events`, discoveries pop `discoveries`.
#[derive(Default)]
pub struct FakeClient {
    events: Mutex<Vec<ScanEvent>>,
    fail_start: Mutex<bool>,
    discoveries: Mutex<VecDeque<Result<Vec<FakeBot>, BleError>>>,
    pub filters: Mutex<Vec<DiscoverFilter>>,
    pub start_scan_calls: AtomicUsize,
    pub stop_scan_calls: AtomicUsize,
    pub discover_calls: AtomicUsize,
}

impl FakeClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_events(self, events: Vec<ScanEvent>) -> Self {
        *self.events.lock().unwrap() = events;
        self
    }

    pub fn failing_start(self) -> Self {
        *self.fail_start.lock().unwrap() = true;
        self
    }

    /// Scripted discovery results; an exhausted script discovers nothing.
    pub fn with_discoveries(self, discoveries: Vec<Result<Vec<FakeBot>, BleError>>) -> Self {
        *self.discoveries.lock().unwrap() = discoveries.into();
        self
    }

    pub fn push_discovery(&self, discovery: Result<Vec<FakeBot>, BleError>) {
        self.discoveries.lock().unwrap().push_back(discovery);
    }

    pub fn discover_calls(&self) -> usize {
        self.discover_calls.load(Ordering::SeqCst)
    }

    pub fn stop_scan_calls(&self) -> usize {
        self.stop_scan_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BleClient for FakeClient {
    type Peripheral = FakeBot;

    async fn start_scan(&self) -> Result<AdvertisementStream, BleError> {
        self.start_scan_calls.fetch_add(1, Ordering::SeqCst);
        if *self.fail_start.lock().unwrap() {
            return Err(BleError::AdapterUnavailable);
        }

        let events = self.events.lock().unwrap().clone();
        let adverts = stream::iter(events).then(|event| async move {
            tokio::time::sleep(event.after).await;
            event.item.map_err(BleError::Scan)
        });
        Ok(adverts.boxed())
    }

    async fn stop_scan(&self) -> Result<(), BleError> {
        self.stop_scan_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn discover(&self, filter: &DiscoverFilter) -> Result<Vec<FakeBot>, BleError> {
        self.discover_calls.fetch_add(1, Ordering::SeqCst);
        self.filters.lock().unwrap().push(filter.clone());
        self.discoveries.lock().unwrap().pop_front().unwrap_or_else(|| Ok(Vec::new()))
    }
}
