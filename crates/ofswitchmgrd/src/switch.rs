//! Virtual OpenFlow switch and its controller channels.

use std::collections::HashSet;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use ofagent_types::{DatapathId, DeviceId};
use tokio_util::sync::CancellationToken;

use crate::capabilities::OfSwitchCapabilities;
use crate::error::{SwitchMgrError, SwitchMgrResult};

static NEXT_CHANNEL_ID: AtomicU64 = AtomicU64::new(1);
static NEXT_ATTEMPT_ID: AtomicU64 = AtomicU64::new(1);

/// Handle to a live connection between a switch and one controller.
///
/// Cloning the handle does not duplicate the connection; every clone
/// closes the same underlying channel.
#[derive(Debug, Clone)]
pub struct ControllerChannel {
    id: u64,
    remote_addr: SocketAddr,
    close: CancellationToken,
}

impl ControllerChannel {
    fn new(remote_addr: SocketAddr, close: CancellationToken) -> Self {
        Self {
            id: NEXT_CHANNEL_ID.fetch_add(1, Ordering::Relaxed),
            remote_addr,
            close,
        }
    }

    /// Returns the process-unique channel id.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Returns the controller address this channel is connected to.
    pub fn remote_addr(&self) -> SocketAddr {
        self.remote_addr
    }

    /// Requests the channel to close. The I/O task owning the socket
    /// drops it and removes the channel from its switch.
    pub fn disconnect(&self) {
        self.close.cancel();
    }

    /// Returns true once a close has been requested.
    pub fn is_closing(&self) -> bool {
        self.close.is_cancelled()
    }
}

/// A virtual device exposed as an OpenFlow switch.
#[derive(Debug)]
pub struct OfSwitch {
    device_id: DeviceId,
    dpid: DatapathId,
    capabilities: Arc<OfSwitchCapabilities>,
    channels: DashMap<u64, ControllerChannel>,
    /// Connection attempts not yet established, keyed by attempt id. Shares the
    /// close token with the channel the attempt turns into.
    attempts: DashMap<u64, (SocketAddr, CancellationToken)>,
}

impl OfSwitch {
    /// Creates a switch with an empty channel set.
    pub fn new(
        device_id: DeviceId,
        dpid: DatapathId,
        capabilities: Arc<OfSwitchCapabilities>,
    ) -> Self {
        Self {
            device_id,
            dpid,
            capabilities,
            channels: DashMap::new(),
            attempts: DashMap::new(),
        }
    }

    /// Creates the switch for a device, deriving its datapath id.
    pub fn of(device_id: DeviceId, capabilities: Arc<OfSwitchCapabilities>) -> SwitchMgrResult<Self> {
        let dpid = DatapathId::from_device_id(&device_id)
            .map_err(|e| SwitchMgrError::from_parse(&device_id, e))?;
        Ok(Self::new(device_id, dpid, capabilities))
    }

    pub fn device_id(&self) -> &DeviceId {
        &self.device_id
    }

    pub fn dpid(&self) -> DatapathId {
        self.dpid
    }

    pub fn capabilities(&self) -> &Arc<OfSwitchCapabilities> {
        &self.capabilities
    }

    /// Returns a snapshot of the live controller channels.
    pub fn controller_channels(&self) -> Vec<ControllerChannel> {
        let mut channels: Vec<_> = self.channels.iter().map(|c| c.value().clone()).collect();
        channels.sort_by_key(ControllerChannel::id);
        channels
    }

    /// Returns true while at least one controller channel is live.
    pub fn is_connected(&self) -> bool {
        !self.channels.is_empty()
    }

    /// Returns the number of connection attempts still in flight.
    pub fn pending_attempts(&self) -> usize {
        self.attempts.len()
    }

    pub(crate) fn begin_attempt(&self, controller: SocketAddr, close: CancellationToken) -> u64 {
        let id = NEXT_ATTEMPT_ID.fetch_add(1, Ordering::Relaxed);
        self.attempts.insert(id, (controller, close));
        id
    }

    pub(crate) fn end_attempt(&self, id: u64) {
        self.attempts.remove(&id);
    }

    /// Cancels every in-flight attempt towards one of `controllers` and
    /// returns how many were cancelled.
    pub(crate) fn cancel_attempts(&self, controllers: &HashSet<SocketAddr>) -> usize {
        self.attempts
            .iter()
            .filter(|attempt| controllers.contains(&attempt.value().0))
            .map(|attempt| attempt.value().1.cancel())
            .count()
    }

    pub(crate) fn add_controller_channel(
        &self,
        remote_addr: SocketAddr,
        close: CancellationToken,
    ) -> ControllerChannel {
        let channel = ControllerChannel::new(remote_addr, close);
        self.channels.insert(channel.id(), channel.clone());
        channel
    }

    pub(crate) fn delete_controller_channel(&self, id: u64) -> Option<ControllerChannel> {
        self.channels.remove(&id).map(|(_, channel)| channel)
    }
}
