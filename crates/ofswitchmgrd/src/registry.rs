//! Registry of the virtual devices currently exposed as OpenFlow switches.
//!
//! The registry is written only by the switch manager's event worker and
//! may be read concurrently from any thread.

use std::collections::HashSet;
use std::sync::Arc;

use dashmap::DashMap;
use ofagent_types::DeviceId;
use tracing::debug;

use crate::capabilities::OfSwitchCapabilities;
use crate::error::SwitchMgrResult;
use crate::switch::OfSwitch;

/// Mapping from device id to its exposed switch.
///
/// At most one switch exists per device id.
#[derive(Debug)]
pub struct SwitchRegistry {
    switches: DashMap<DeviceId, Arc<OfSwitch>>,
    capabilities: Arc<OfSwitchCapabilities>,
}

impl SwitchRegistry {
    /// Creates an empty registry whose switches advertise `capabilities`.
    pub fn new(capabilities: Arc<OfSwitchCapabilities>) -> Self {
        Self {
            switches: DashMap::new(),
            capabilities,
        }
    }

    /// Exposes a device as a switch, replacing any previous entry.
    ///
    /// # Errors
    ///
    /// Returns `InvalidIdentifier` if the device id does not encode a
    /// datapath id. The registry is left unchanged.
    pub fn add(&self, device_id: &DeviceId) -> SwitchMgrResult<Arc<OfSwitch>> {
        let switch = Arc::new(OfSwitch::of(
            device_id.clone(),
            Arc::clone(&self.capabilities),
        )?);
        self.switches.insert(device_id.clone(), Arc::clone(&switch));
        debug!(device = %device_id, dpid = %switch.dpid(), "Added virtual OF switch");
        Ok(switch)
    }

    /// Removes the switch for a device. Absent devices are ignored.
    pub fn remove(&self, device_id: &DeviceId) -> Option<Arc<OfSwitch>> {
        let removed = self.switches.remove(device_id).map(|(_, switch)| switch);
        if let Some(ref switch) = removed {
            debug!(device = %device_id, dpid = %switch.dpid(), "Removed virtual OF switch");
        }
        removed
    }

    pub fn get(&self, device_id: &DeviceId) -> Option<Arc<OfSwitch>> {
        self.switches.get(device_id).map(|entry| Arc::clone(entry.value()))
    }

    pub fn contains(&self, device_id: &DeviceId) -> bool {
        self.switches.contains_key(device_id)
    }

    pub fn len(&self) -> usize {
        self.switches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.switches.is_empty()
    }

    /// Returns a snapshot of every registered switch, ordered by datapath id.
    pub fn all(&self) -> Vec<Arc<OfSwitch>> {
        let mut switches: Vec<_> = self
            .switches
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect();
        switches.sort_by_key(|s| s.dpid());
        switches
    }

    /// Returns the registered switches whose device is in `devices`.
    pub fn for_network<'a, I>(&self, devices: I) -> Vec<Arc<OfSwitch>>
    where
        I: IntoIterator<Item = &'a DeviceId>,
    {
        let devices: HashSet<&DeviceId> = devices.into_iter().collect();
        let mut switches: Vec<_> = devices
            .into_iter()
            .filter_map(|device| self.get(device))
            .collect();
        switches.sort_by_key(|s| s.dpid());
        switches
    }
}
