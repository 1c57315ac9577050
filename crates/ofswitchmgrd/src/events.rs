//! Device, packet and flow rule events delivered by the virtual network,
//! and the internal event representation consumed by the switch manager.

use ofagent_types::DeviceId;
use tokio::sync::oneshot;

use crate::agent::OfAgentEvent;

/// Kind of device event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceEventType {
    DeviceAdded,
    DeviceRemoved,
    DeviceAvailabilityChanged,
    DeviceUpdated,
    DeviceSuspended,
    PortAdded,
    PortRemoved,
    PortUpdated,
    PortStatsUpdated,
}

/// A device event scoped to one virtual network.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceEvent {
    kind: DeviceEventType,
    device: DeviceId,
    port: Option<u32>,
}

impl DeviceEvent {
    pub fn new(kind: DeviceEventType, device: DeviceId) -> Self {
        Self {
            kind,
            device,
            port: None,
        }
    }

    /// Creates a port event for `device`.
    pub fn port(kind: DeviceEventType, device: DeviceId, port: u32) -> Self {
        Self {
            kind,
            device,
            port: Some(port),
        }
    }

    pub fn kind(&self) -> DeviceEventType {
        self.kind
    }

    pub fn device(&self) -> &DeviceId {
        &self.device
    }

    pub fn port_number(&self) -> Option<u32> {
        self.port
    }
}

/// A packet received by a virtual device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PacketContext {
    pub device: DeviceId,
    pub in_port: u32,
    pub data: Vec<u8>,
}

/// Kind of flow rule event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FlowRuleEventType {
    RuleAddRequested,
    RuleAdded,
    RuleRemoveRequested,
    RuleRemoved,
    RuleUpdated,
}

/// A flow rule change on a virtual device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlowRuleEvent {
    pub kind: FlowRuleEventType,
    pub device: DeviceId,
    pub flow_id: u64,
}

/// Every event the switch manager's worker processes, in arrival order.
#[derive(Debug)]
pub(crate) enum SwitchEvent {
    Agent(OfAgentEvent),
    Device(DeviceEvent),
    PacketIn(PacketContext),
    FlowRule(FlowRuleEvent),
    /// Completes once every event queued before it has been processed.
    Barrier(oneshot::Sender<()>),
    /// Stops the worker after everything queued before it.
    Shutdown,
}

impl SwitchEvent {
    pub(crate) fn label(&self) -> &'static str {
        match self {
            SwitchEvent::Agent(_) => "agent",
            SwitchEvent::Device(_) => "device",
            SwitchEvent::PacketIn(_) => "packet-in",
            SwitchEvent::FlowRule(_) => "flow-rule",
            SwitchEvent::Barrier(_) => "barrier",
            SwitchEvent::Shutdown => "shutdown",
        }
    }
}
