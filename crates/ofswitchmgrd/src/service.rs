//! Interfaces of the collaborators the switch manager consumes.
//!
//! The switch manager does not implement agent storage, leader election or
//! the virtual network; it is handed implementations of these traits at
//! construction. [`crate::memory`] provides in-memory implementations.

use std::sync::Arc;

use ofagent_types::{DeviceId, NetworkId, NodeId};

use crate::agent::{OfAgent, OfAgentEvent};
use crate::events::{DeviceEvent, FlowRuleEvent, PacketContext};

/// Receives agent lifecycle events.
pub trait AgentListener: Send + Sync {
    fn event(&self, event: OfAgentEvent);
}

/// Receives device events of one virtual network.
pub trait DeviceListener: Send + Sync {
    fn event(&self, event: DeviceEvent);
}

/// Receives packets punted by the devices of one virtual network.
pub trait PacketProcessor: Send + Sync {
    fn process(&self, context: PacketContext);
}

/// Receives flow rule events of one virtual network.
pub trait FlowRuleListener: Send + Sync {
    fn event(&self, event: FlowRuleEvent);
}

/// Source of OpenFlow agents and their lifecycle events.
pub trait AgentService: Send + Sync {
    /// Returns every known agent.
    fn agents(&self) -> Vec<OfAgent>;

    fn add_listener(&self, listener: Arc<dyn AgentListener>);

    fn remove_listener(&self, listener: &Arc<dyn AgentListener>);
}

/// Cluster-wide leadership per application name.
pub trait LeadershipService: Send + Sync {
    /// Returns the current leader for `application`, if one is elected.
    fn leader(&self, application: &str) -> Option<NodeId>;
}

/// Identity of this cluster node.
pub trait ClusterService: Send + Sync {
    fn local_node_id(&self) -> NodeId;
}

/// Device service scoped to one virtual network.
pub trait DeviceService: Send + Sync {
    /// Returns the devices currently available in the network.
    fn available_devices(&self) -> Vec<DeviceId>;

    fn add_listener(&self, listener: Arc<dyn DeviceListener>);

    fn remove_listener(&self, listener: &Arc<dyn DeviceListener>);
}

/// Packet service scoped to one virtual network.
pub trait PacketService: Send + Sync {
    /// Registers a processor; lower priorities see packets first.
    fn add_processor(&self, processor: Arc<dyn PacketProcessor>, priority: i32);

    fn remove_processor(&self, processor: &Arc<dyn PacketProcessor>);
}

/// Flow rule service scoped to one virtual network.
pub trait FlowRuleService: Send + Sync {
    fn add_listener(&self, listener: Arc<dyn FlowRuleListener>);

    fn remove_listener(&self, listener: &Arc<dyn FlowRuleListener>);
}

/// Access to the network-scoped services of the virtual network layer.
pub trait VirtualNetworkService: Send + Sync {
    fn device_service(&self, network: NetworkId) -> Arc<dyn DeviceService>;

    fn packet_service(&self, network: NetworkId) -> Arc<dyn PacketService>;

    fn flow_rule_service(&self, network: NetworkId) -> Arc<dyn FlowRuleService>;
}

/// Returns true if both handles point at the same listener object.
///
/// Compares data pointers only, so two handles to one object compare equal
/// even when their vtable pointers differ.
pub fn same_listener<T: ?Sized>(a: &Arc<T>, b: &Arc<T>) -> bool {
    std::ptr::eq(Arc::as_ptr(a) as *const (), Arc::as_ptr(b) as *const ())
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Noop;

    impl DeviceListener for Noop {
        fn event(&self, _event: DeviceEvent) {}
    }

    #[test]
    fn test_same_listener() {
        let a: Arc<dyn DeviceListener> = Arc::new(Noop);
        let b = Arc::clone(&a);
        let c: Arc<dyn DeviceListener> = Arc::new(Noop);

        assert!(same_listener(&a, &b));
        assert!(!same_listener(&a, &c));
    }
}
