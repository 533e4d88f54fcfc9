//! Peers discovered during a Bluetooth classic inquiry scan.
//!
//! Fixed capacity, no allocation. The address identifies a slot: seeing a
//! peer again refreshes its strength instead of adding a duplicate.

use crate::config::{ADDRESS_CAPACITY, CAPABILITIES_CAPACITY, NAME_CAPACITY, REGISTRY_CAPACITY};
use crate::text::bounded;
use heapless::{String, Vec};

/// A peer reported by an `INQUIRY` notification.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PeerDevice {
    /// Address as printed by the module.
    pub address: String<ADDRESS_CAPACITY>,
    /// Human-readable name, quotes already stripped.
    pub name: String<NAME_CAPACITY>,
    /// Class-of-device field.
    pub capabilities: String<CAPABILITIES_CAPACITY>,
    /// Signal strength magnitude in dB (`-54dB` → 54).
    pub strength: u8,
}

/// Bounded table of inquiry results.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DeviceRegistry {
    devices: Vec<PeerDevice, REGISTRY_CAPACITY>,
    discovered: usize,
}

impl DeviceRegistry {
    /// Create an empty registry.
    pub const fn new() -> Self {
        Self {
            devices: Vec::new(),
            discovered: 0,
        }
    }

    /// Record a peer seen during inquiry.
    ///
    /// Known address: only the strength is updated. New address: stored in
    /// the next free slot, or silently dropped when the table is full.
    /// Returns the slot index holding the peer, if any.
    pub fn observe(
        &mut self,
        address: &str,
        name: &str,
        capabilities: &str,
        strength: u8,
    ) -> Option<usize> {
        if let Some(idx) = self
            .devices
            .iter()
            .position(|d| d.address.as_str() == address)
        {
            self.devices[idx].strength = strength;
            debug!("Registry: refreshed {} ({} dB)", address, strength);
            return Some(idx);
        }

        let device = PeerDevice {
            address: bounded(address),
            name: bounded(name),
            capabilities: bounded(capabilities),
            strength,
        };

        if self.devices.push(device).is_err() {
            debug!("Registry full - dropping {}", address);
            return None;
        }

        self.discovered += 1;
        info!("Registry: found {} - {} peers", address, self.discovered);
        Some(self.devices.len() - 1)
    }

    /// Resolve a peer name (case-insensitive) to its address.
    pub fn find_by_name(&self, name: &str) -> Option<&str> {
        self.devices
            .iter()
            .find(|d| d.name.as_str().eq_ignore_ascii_case(name))
            .map(|d| d.address.as_str())
    }

    /// Forget every peer. Called when an inquiry starts.
    pub fn reset(&mut self) {
        self.devices.clear();
        self.discovered = 0;
    }

    /// Number of peers discovered since the last reset.
    pub fn discovered(&self) -> usize {
        self.discovered
    }

    pub fn get(&self, idx: usize) -> Option<&PeerDevice> {
        self.devices.get(idx)
    }

    pub fn iter(&self) -> impl Iterator<Item = &PeerDevice> {
        self.devices.iter()
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }
}
