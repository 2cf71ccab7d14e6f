use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use log::{debug, error, info, warn};
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

use crate::core::bluetooth::client::{AdvertisementStream, BleClient};
use crate::core::bluetooth::service_data;
use crate::core::bluetooth::types::{DeviceAdvertisement, DeviceReading, RawAdvertisement};
use crate::core::mac;

/// Timed advertisement scanner.
///
/// A scan never fails from the caller's point of view: adapter errors end
/// the window early and whatever was collected up to that point is returned.
pub struct DeviceScanner<C: BleClient> {
    client: Arc<C>,
}

impl<C: BleClient> DeviceScanner<C> {
    pub fn new(client: Arc<C>) -> Self {
        Self { client }
    }

    /// Scans for `duration`, or until `target` is seen when one is given.
    pub async fn scan(&self, duration: Duration, target: Option<&str>) -> Vec<DeviceAdvertisement> {
        self.scan_until(duration, target, &CancellationToken::new()).await
    }

    /// Like [`Self::scan`], additionally ending the window when `cancel` fires.
    pub async fn scan_until(
        &self,
        duration: Duration,
        target: Option<&str>,
        cancel: &CancellationToken,
    ) -> Vec<DeviceAdvertisement> {
        let target = target.and_then(mac::normalize);
        match &target {
            Some(t) => info!("Start scanning devices (duration {:?}), targeting: {}", duration, t),
            None => info!("Start scanning devices (duration {:?})", duration),
        }

        let mut found = Vec::new();
        match self.client.start_scan().await {
            Ok(stream) => {
                debug!("Scan started");
                Self::collect(stream, duration, target.as_deref(), cancel, &mut found).await;
            }
            Err(e) => error!("Scan error: {}", e),
        }

        // The session is closed on every path, including a failed start.
        if let Err(e) = self.client.stop_scan().await {
            warn!("Failed to stop scan: {}", e);
        }

        info!("Scan complete, found {} devices", found.len());
        found
    }

    async fn collect(
        mut stream: AdvertisementStream,
        duration: Duration,
        target: Option<&str>,
        cancel: &CancellationToken,
        found: &mut Vec<DeviceAdvertisement>,
    ) {
        let deadline = sleep(duration);
        tokio::pin!(deadline);
        let mut stream_open = true;

        loop {
            tokio::select! {
                _ = &mut deadline => {
                    if target.is_some() {
                        debug!("Scan duration ended without finding target device");
                    }
                    break;
                }
                _ = cancel.cancelled() => {
                    info!("Scan cancelled by caller");
                    break;
                }
                next = stream.next(), if stream_open => {
                    match next {
                        Some(Ok(raw)) => {
                            let Some(advertisement) = decode_advertisement(raw) else {
                                continue;
                            };
                            if found.iter().any(|d| d.address == advertisement.address) {
                                continue;
                            }

                            debug!(
                                "Received advertisement: {} (ID: {})",
                                advertisement.address, advertisement.raw_id
                            );
                            info!(
                                "Device found: {} ({})",
                                advertisement.address, advertisement.device_type
                            );

                            let is_target = target.is_some_and(|t| {
                                advertisement.address == t || mac::equals(&advertisement.raw_id, t)
                            });
                            found.push(advertisement);

                            if is_target {
                                info!("Target device found, stopping scan early");
                                break;
                            }
                        }
                        Some(Err(e)) => {
                            error!("Scan error: {}", e);
                            break;
                        }
                        None => {
                            // Keep the window open; the caller asked for the full duration.
                            debug!("Advertisement stream ended");
                            stream_open = false;
                        }
                    }
                }
            }
        }
    }
}

/// Turns a raw advertisement into a decoded one keyed by normalized MAC.
/// Advertisements with no usable identity are dropped.
pub fn decode_advertisement(raw: RawAdvertisement) -> Option<DeviceAdvertisement> {
    let address = raw
        .address
        .as_deref()
        .and_then(mac::normalize)
        .or_else(|| mac::extract_from_id(&raw.id))
        .or_else(|| mac::normalize(&raw.id))?;

    let reading = raw
        .service_data
        .as_deref()
        .map(service_data::decode)
        .unwrap_or(DeviceReading::Unknown);

    Some(DeviceAdvertisement {
        address,
        raw_id: raw.id,
        device_type: reading.device_type(),
        reading,
        rssi: raw.rssi,
    })
}
