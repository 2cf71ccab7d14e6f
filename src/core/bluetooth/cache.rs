//! Short-lived store of discovered peripheral handles, keyed by normalized MAC.
//!
//! Not synchronized on its own: it lives inside the executor, which in turn
//! sits behind the application's radio mutex.

use std::collections::HashMap;
use std::time::Duration;

use tokio::time::Instant;

use crate::core::bluetooth::constants::CACHE_TTL_MS;
use crate::core::bluetooth::types::PowerState;

#[derive(Debug, Clone)]
pub struct CachedPeripheral<P> {
    /// Handle from the last discovery; cleared after an operation-level failure
    pub peripheral: Option<P>,
    pub last_discovered_at: Option<Instant>,
    /// Last commanded state. This is what the bridge asked for, not a
    /// reading from the hardware.
    pub last_commanded: PowerState,
    pub last_updated_at: Option<Instant>,
}

impl<P> Default for CachedPeripheral<P> {
    fn default() -> Self {
        Self {
            peripheral: None,
            last_discovered_at: None,
            last_commanded: PowerState::Unknown,
            last_updated_at: None,
        }
    }
}

#[derive(Debug)]
pub struct DiscoveryCache<P> {
    entries: HashMap<String, CachedPeripheral<P>>,
    ttl: Duration,
}

impl<P> Default for DiscoveryCache<P> {
    fn default() -> Self {
        Self::new(Duration::from_millis(CACHE_TTL_MS))
    }
}

impl<P> DiscoveryCache<P> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: HashMap::new(),
            ttl,
        }
    }

    /// Returns the entry only while its handle is present and younger than the TTL.
    pub fn get(&self, address: &str) -> Option<&CachedPeripheral<P>> {
        let entry = self.entries.get(address)?;
        let discovered_at = entry.last_discovered_at?;
        entry.peripheral.as_ref()?;
        if discovered_at.elapsed() >= self.ttl {
            return None;
        }
        Some(entry)
    }

    /// Stores a fresh handle and restarts its TTL window.
    pub fn put(&mut self, address: &str, peripheral: P) {
        let entry = self.entries.entry(address.to_string()).or_default();
        entry.peripheral = Some(peripheral);
        entry.last_discovered_at = Some(Instant::now());
    }

    /// Drops the handle so the next command rediscovers; the commanded state survives.
    pub fn invalidate_handle(&mut self, address: &str) {
        if let Some(entry) = self.entries.get_mut(address) {
            entry.peripheral = None;
        }
    }

    pub fn set_logical_state(&mut self, address: &str, state: PowerState) {
        let entry = self.entries.entry(address.to_string()).or_default();
        entry.last_commanded = state;
        entry.last_updated_at = Some(Instant::now());
    }

    /// Refreshes `last_updated_at` without changing the commanded state.
    pub fn touch(&mut self, address: &str) {
        let entry = self.entries.entry(address.to_string()).or_default();
        entry.last_updated_at = Some(Instant::now());
    }

    pub fn logical_state(&self, address: &str) -> PowerState {
        self.entries
            .get(address)
            .map(|e| e.last_commanded)
            .unwrap_or_default()
    }

    /// Raw entry access, regardless of TTL or handle presence.
    pub fn entry(&self, address: &str) -> Option<&CachedPeripheral<P>> {
        self.entries.get(address)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
