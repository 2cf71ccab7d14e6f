//! `BleClient` over the system Bluetooth adapter via `bluest`.

use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use bluest::{Adapter, AdvertisingDevice};
use futures_util::StreamExt;
use futures_util::stream;
use log::{debug, error, info};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

use crate::core::bluetooth::client::{AdvertisementStream, BleClient, BotPeripheral};
use crate::core::bluetooth::connection::BluestBot;
use crate::core::bluetooth::constants::{UUID_SWITCHBOT_SERVICE_DATA, UUID_SWITCHBOT_SERVICE_DATA_LEGACY};
use crate::core::bluetooth::error::BleError;
use crate::core::bluetooth::scanner::decode_advertisement;
use crate::core::bluetooth::service_data;
use crate::core::bluetooth::types::{DiscoverFilter, RawAdvertisement};
use crate::core::mac;

const ADVERTISEMENT_CHANNEL_CAPACITY: usize = 64;

struct ScanTask {
    cancel_token: CancellationToken,
    handle: JoinHandle<()>,
}

pub struct BluestClient {
    adapter: Adapter,
    scan_task: Mutex<Option<ScanTask>>,
    operation_timeout: Duration,
}

impl BluestClient {
    /// Opens the default adapter and waits for it to become available.
    pub async fn new(operation_timeout: Duration) -> Result<Self, BleError> {
        let adapter = Adapter::default().await.ok_or(BleError::AdapterUnavailable)?;
        adapter.wait_available().await?;
        info!("Bluetooth adapter is available.");

        Ok(Self {
            adapter,
            scan_task: Mutex::new(None),
            operation_timeout,
        })
    }

    fn take_scan_task(&self) -> Option<ScanTask> {
        self.scan_task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }

    /// Forwards SwitchBot advertisements from the adapter until cancelled or
    /// the receiving side goes away.
    async fn internal_scan_task(
        adapter: Adapter,
        tx: mpsc::Sender<Result<RawAdvertisement, BleError>>,
        cancel_token: CancellationToken,
    ) -> Result<(), BleError> {
        info!("Starting bluetooth scan");
        let mut scan_stream = adapter.scan(&[]).await?;

        loop {
            tokio::select! {
                result = scan_stream.next() => {
                    match result {
                        Some(discovered) => {
                            let raw = raw_advertisement(&discovered);
                            // Only SwitchBot products carry our service data
                            if raw.service_data.is_none() {
                                continue;
                            }
                            if tx.send(Ok(raw)).await.is_err() {
                                break;
                            }
                        }
                        None => {
                            info!("Bluetooth scan stream has ended.");
                            break;
                        }
                    }
                }
                _ = cancel_token.cancelled() => {
                    break;
                }
            }
        }
        Ok(())
    }
}

#[async_trait]
impl BleClient for BluestClient {
    type Peripheral = BluestBot;

    async fn start_scan(&self) -> Result<AdvertisementStream, BleError> {
        if self.scan_task.lock().unwrap_or_else(PoisonError::into_inner).is_some() {
            self.stop_scan().await?;
        }

        let (tx, rx) = mpsc::channel(ADVERTISEMENT_CHANNEL_CAPACITY);
        let cancel_token = CancellationToken::new();
        let cancel_token_for_task = cancel_token.clone();
        let adapter_for_task = self.adapter.clone();

        let handle = tokio::spawn(async move {
            let error_tx = tx.clone();
            if let Err(e) = Self::internal_scan_task(adapter_for_task, tx, cancel_token_for_task).await {
                error!("Scan task finished with an error: {}", e);
                let _ = error_tx.send(Err(e)).await;
            }
        });

        *self.scan_task.lock().unwrap_or_else(PoisonError::into_inner) = Some(ScanTask { cancel_token, handle });
        debug!("Device scan task started.");

        let advertisements = stream::unfold(rx, |mut rx| async move { rx.recv().await.map(|item| (item, rx)) });
        Ok(advertisements.boxed())
    }

    async fn stop_scan(&self) -> Result<(), BleError> {
        let Some(task) = self.take_scan_task() else {
            debug!("No active scan task handle found to wait for.");
            return Ok(());
        };

        task.cancel_token.cancel();
        match task.handle.await {
            Ok(()) => debug!("Scan task finished after cancellation."),
            Err(e) if e.is_cancelled() => debug!("Scan task was cancelled."),
            Err(e) => return Err(BleError::Scan(format!("scan task ended unexpectedly: {e}"))),
        }
        Ok(())
    }

    async fn discover(&self, filter: &DiscoverFilter) -> Result<Vec<BluestBot>, BleError> {
        let mut scan_stream = self.adapter.scan(&[]).await?;
        let deadline = sleep(filter.duration);
        tokio::pin!(deadline);

        let mut found: Vec<BluestBot> = Vec::new();
        loop {
            tokio::select! {
                _ = &mut deadline => break,
                result = scan_stream.next() => {
                    let Some(discovered) = result else {
                        break;
                    };
                    let raw = raw_advertisement(&discovered);
                    let model = raw.service_data.as_deref().and_then(service_data::model_code);
                    if model != Some(filter.model as u8) {
                        continue;
                    }
                    let Some(advertisement) = decode_advertisement(raw) else {
                        continue;
                    };
                    let wanted = filter.id.as_deref().is_none_or(|id| {
                        advertisement.address == id || mac::equals(&advertisement.raw_id, id)
                    });
                    if !wanted || found.iter().any(|b| b.snapshot().is_some_and(|s| s.address == advertisement.address)) {
                        continue;
                    }

                    debug!("Discovered Bot {} ({})", advertisement.address, advertisement.raw_id);
                    found.push(BluestBot::new(
                        self.adapter.clone(),
                        discovered.device,
                        Some(advertisement),
                        self.operation_timeout,
                    ));
                    if filter.quick {
                        break;
                    }
                }
            }
        }

        Ok(found)
    }
}

/// Flattens a `bluest` advertisement into the library-neutral form.
fn raw_advertisement(discovered: &AdvertisingDevice) -> RawAdvertisement {
    let service_data = discovered
        .adv_data
        .service_data
        .get(&UUID_SWITCHBOT_SERVICE_DATA)
        .or_else(|| discovered.adv_data.service_data.get(&UUID_SWITCHBOT_SERVICE_DATA_LEGACY))
        .cloned();
    let id = discovered.device.id().to_string();

    RawAdvertisement {
        address: mac::extract_from_id(&id),
        id,
        service_data,
        rssi: discovered.rssi,
    }
}
