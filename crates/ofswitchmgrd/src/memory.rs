//! In-memory implementations of the consumed collaborator interfaces.
//!
//! Used by the daemon in standalone mode, where this node is the whole
//! cluster and the virtual network topology comes from the configuration
//! file, and by the tests. Events are delivered to listeners synchronously
//! on the caller's thread, outside of any internal lock.

use std::collections::BTreeMap;
use std::sync::Arc;

use dashmap::DashMap;
use ofagent_types::{DeviceId, NetworkId, NodeId, OfController};
use parking_lot::RwLock;
use tracing::debug;

use crate::agent::{OfAgent, OfAgentEvent, OfAgentEventType, OfAgentState};
use crate::error::{SwitchMgrError, SwitchMgrResult};
use crate::events::{DeviceEvent, DeviceEventType, FlowRuleEvent, PacketContext};
use crate::service::{
    same_listener, AgentListener, AgentService, ClusterService, DeviceListener, DeviceService,
    FlowRuleListener, FlowRuleService, LeadershipService, PacketProcessor, PacketService,
    VirtualNetworkService,
};

/// Registered listeners with set semantics: adding one twice keeps one.
struct ListenerSet<T: ?Sized> {
    listeners: RwLock<Vec<Arc<T>>>,
}

impl<T: ?Sized> ListenerSet<T> {
    fn new() -> Self {
        Self {
            listeners: RwLock::new(Vec::new()),
        }
    }

    fn add(&self, listener: Arc<T>) {
        let mut listeners = self.listeners.write();
        if !listeners.iter().any(|l| same_listener(l, &listener)) {
            listeners.push(listener);
        }
    }

    fn remove(&self, listener: &Arc<T>) {
        self.listeners.write().retain(|l| !same_listener(l, listener));
    }

    fn snapshot(&self) -> Vec<Arc<T>> {
        self.listeners.read().clone()
    }

    fn len(&self) -> usize {
        self.listeners.read().len()
    }
}

/// Agent store holding at most one agent per virtual network.
pub struct InMemoryAgentStore {
    agents: RwLock<BTreeMap<NetworkId, OfAgent>>,
    listeners: ListenerSet<dyn AgentListener>,
}

impl InMemoryAgentStore {
    pub fn new() -> Self {
        Self {
            agents: RwLock::new(BTreeMap::new()),
            listeners: ListenerSet::new(),
        }
    }

    pub fn agent(&self, network: NetworkId) -> Option<OfAgent> {
        self.agents.read().get(&network).cloned()
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    /// Creates the agent of `network` in the created state.
    pub fn create_agent(
        &self,
        network: NetworkId,
        controllers: impl IntoIterator<Item = OfController>,
    ) -> SwitchMgrResult<OfAgent> {
        let agent = OfAgent::new(network, OfAgentState::Created, controllers);
        {
            let mut agents = self.agents.write();
            if agents.contains_key(&network) {
                return Err(SwitchMgrError::agent(network, "agent already exists"));
            }
            agents.insert(network, agent.clone());
        }
        self.post(OfAgentEventType::Created, agent.clone());
        Ok(agent)
    }

    /// Moves a created or stopped agent to started.
    pub fn start_agent(&self, network: NetworkId) -> SwitchMgrResult<OfAgent> {
        let agent = self.transition(
            network,
            &[OfAgentState::Created, OfAgentState::Stopped],
            OfAgentState::Started,
        )?;
        self.post(OfAgentEventType::Started, agent.clone());
        Ok(agent)
    }

    /// Moves a started agent to stopped.
    pub fn stop_agent(&self, network: NetworkId) -> SwitchMgrResult<OfAgent> {
        let agent = self.transition(network, &[OfAgentState::Started], OfAgentState::Stopped)?;
        self.post(OfAgentEventType::Stopped, agent.clone());
        Ok(agent)
    }

    /// Removes an agent that is not started.
    pub fn remove_agent(&self, network: NetworkId) -> SwitchMgrResult<OfAgent> {
        let agent = {
            let mut agents = self.agents.write();
            match agents.get(&network).map(OfAgent::state) {
                None => return Err(SwitchMgrError::agent(network, "no such agent")),
                Some(OfAgentState::Started) => {
                    return Err(SwitchMgrError::agent(network, "agent must be stopped first"))
                }
                Some(_) => {}
            }
            agents
                .remove(&network)
                .map(|agent| agent.with_state(OfAgentState::Removed))
                .ok_or_else(|| SwitchMgrError::agent(network, "no such agent"))?
        };
        self.post(OfAgentEventType::Removed, agent.clone());
        Ok(agent)
    }

    pub fn add_controller(
        &self,
        network: NetworkId,
        controller: OfController,
    ) -> SwitchMgrResult<OfAgent> {
        let agent = self.update_controllers(network, |controllers| {
            controllers.push(controller);
        })?;
        self.post(OfAgentEventType::ControllerAdded, agent.clone());
        Ok(agent)
    }

    pub fn remove_controller(
        &self,
        network: NetworkId,
        controller: OfController,
    ) -> SwitchMgrResult<OfAgent> {
        let agent = self.update_controllers(network, |controllers| {
            controllers.retain(|c| *c != controller);
        })?;
        self.post(OfAgentEventType::ControllerRemoved, agent.clone());
        Ok(agent)
    }

    fn transition(
        &self,
        network: NetworkId,
        from: &[OfAgentState],
        to: OfAgentState,
    ) -> SwitchMgrResult<OfAgent> {
        let mut agents = self.agents.write();
        let agent = agents
            .get_mut(&network)
            .ok_or_else(|| SwitchMgrError::agent(network, "no such agent"))?;
        if !from.contains(&agent.state()) {
            return Err(SwitchMgrError::agent(
                network,
                format!("cannot move from {} to {}", agent.state(), to),
            ));
        }
        *agent = agent.with_state(to);
        Ok(agent.clone())
    }

    fn update_controllers(
        &self,
        network: NetworkId,
        update: impl FnOnce(&mut Vec<OfController>),
    ) -> SwitchMgrResult<OfAgent> {
        let mut agents = self.agents.write();
        let agent = agents
            .get_mut(&network)
            .ok_or_else(|| SwitchMgrError::agent(network, "no such agent"))?;
        let mut controllers: Vec<_> = agent.controllers().iter().copied().collect();
        update(&mut controllers);
        *agent = agent.with_controllers(controllers);
        Ok(agent.clone())
    }

    fn post(&self, kind: OfAgentEventType, agent: OfAgent) {
        debug!(network = %agent.network_id(), kind = ?kind, "Posting agent event");
        let event = OfAgentEvent::new(kind, agent);
        for listener in self.listeners.snapshot() {
            listener.event(event.clone());
        }
    }
}

impl Default for InMemoryAgentStore {
    fn default() -> Self {
        Self::new()
    }
}

impl AgentService for InMemoryAgentStore {
    fn agents(&self) -> Vec<OfAgent> {
        self.agents.read().values().cloned().collect()
    }

    fn add_listener(&self, listener: Arc<dyn AgentListener>) {
        self.listeners.add(listener);
    }

    fn remove_listener(&self, listener: &Arc<dyn AgentListener>) {
        self.listeners.remove(listener);
    }
}

/// One virtual network: its devices and the listeners registered on it.
pub struct InMemoryNetwork {
    id: NetworkId,
    /// Device id to availability.
    devices: RwLock<BTreeMap<DeviceId, bool>>,
    device_listeners: ListenerSet<dyn DeviceListener>,
    packet_processors: RwLock<Vec<(i32, Arc<dyn PacketProcessor>)>>,
    flow_rule_listeners: ListenerSet<dyn FlowRuleListener>,
}

impl InMemoryNetwork {
    fn new(id: NetworkId) -> Self {
        Self {
            id,
            devices: RwLock::new(BTreeMap::new()),
            device_listeners: ListenerSet::new(),
            packet_processors: RwLock::new(Vec::new()),
            flow_rule_listeners: ListenerSet::new(),
        }
    }

    pub fn id(&self) -> NetworkId {
        self.id
    }

    pub fn device_listener_count(&self) -> usize {
        self.device_listeners.len()
    }

    pub fn packet_processor_count(&self) -> usize {
        self.packet_processors.read().len()
    }

    pub fn flow_rule_listener_count(&self) -> usize {
        self.flow_rule_listeners.len()
    }

    fn post_device(&self, event: DeviceEvent) {
        for listener in self.device_listeners.snapshot() {
            listener.event(event.clone());
        }
    }
}

impl DeviceService for InMemoryNetwork {
    fn available_devices(&self) -> Vec<DeviceId> {
        self.devices
            .read()
            .iter()
            .filter(|(_, available)| **available)
            .map(|(device, _)| device.clone())
            .collect()
    }

    fn add_listener(&self, listener: Arc<dyn DeviceListener>) {
        self.device_listeners.add(listener);
    }

    fn remove_listener(&self, listener: &Arc<dyn DeviceListener>) {
        self.device_listeners.remove(listener);
    }
}

impl PacketService for InMemoryNetwork {
    fn add_processor(&self, processor: Arc<dyn PacketProcessor>, priority: i32) {
        let mut processors = self.packet_processors.write();
        if processors.iter().any(|(_, p)| same_listener(p, &processor)) {
            return;
        }
        processors.push((priority, processor));
        processors.sort_by_key(|(priority, _)| *priority);
    }

    fn remove_processor(&self, processor: &Arc<dyn PacketProcessor>) {
        self.packet_processors
            .write()
            .retain(|(_, p)| !same_listener(p, processor));
    }
}

impl FlowRuleService for InMemoryNetwork {
    fn add_listener(&self, listener: Arc<dyn FlowRuleListener>) {
        self.flow_rule_listeners.add(listener);
    }

    fn remove_listener(&self, listener: &Arc<dyn FlowRuleListener>) {
        self.flow_rule_listeners.remove(listener);
    }
}

/// Virtual network layer holding any number of [`InMemoryNetwork`]s.
///
/// Networks are created on first access.
pub struct InMemoryVirtualNetwork {
    networks: DashMap<NetworkId, Arc<InMemoryNetwork>>,
}

impl InMemoryVirtualNetwork {
    pub fn new() -> Self {
        Self {
            networks: DashMap::new(),
        }
    }

    /// Returns the network, creating an empty one if needed.
    pub fn network(&self, id: NetworkId) -> Arc<InMemoryNetwork> {
        Arc::clone(
            self.networks
                .entry(id)
                .or_insert_with(|| Arc::new(InMemoryNetwork::new(id)))
                .value(),
        )
    }

    /// Adds an available device and notifies device listeners.
    pub fn add_device(&self, network: NetworkId, device: DeviceId) {
        let net = self.network(network);
        net.devices.write().insert(device.clone(), true);
        net.post_device(DeviceEvent::new(DeviceEventType::DeviceAdded, device));
    }

    /// Removes a device and notifies device listeners. Unknown devices
    /// are ignored.
    pub fn remove_device(&self, network: NetworkId, device: &DeviceId) {
        let net = self.network(network);
        if net.devices.write().remove(device).is_some() {
            net.post_device(DeviceEvent::new(DeviceEventType::DeviceRemoved, device.clone()));
        }
    }

    /// Changes a device's availability and notifies device listeners.
    pub fn set_device_available(&self, network: NetworkId, device: &DeviceId, available: bool) {
        let net = self.network(network);
        let changed = match net.devices.write().get_mut(device) {
            Some(current) if *current != available => {
                *current = available;
                true
            }
            _ => false,
        };
        if changed {
            net.post_device(DeviceEvent::new(
                DeviceEventType::DeviceAvailabilityChanged,
                device.clone(),
            ));
        }
    }

    /// Posts a raw device event to the network's device listeners.
    pub fn post_device_event(&self, network: NetworkId, event: DeviceEvent) {
        self.network(network).post_device(event);
    }

    /// Hands a packet to the network's processors in priority order.
    pub fn receive_packet(&self, network: NetworkId, context: PacketContext) {
        let net = self.network(network);
        let processors: Vec<_> = net
            .packet_processors
            .read()
            .iter()
            .map(|(_, p)| Arc::clone(p))
            .collect();
        for processor in processors {
            processor.process(context.clone());
        }
    }

    /// Posts a flow rule event to the network's flow rule listeners.
    pub fn post_flow_rule_event(&self, network: NetworkId, event: FlowRuleEvent) {
        for listener in self.network(network).flow_rule_listeners.snapshot() {
            listener.event(event.clone());
        }
    }
}

impl Default for InMemoryVirtualNetwork {
    fn default() -> Self {
        Self::new()
    }
}

impl VirtualNetworkService for InMemoryVirtualNetwork {
    fn device_service(&self, network: NetworkId) -> Arc<dyn DeviceService> {
        self.network(network)
    }

    fn packet_service(&self, network: NetworkId) -> Arc<dyn PacketService> {
        self.network(network)
    }

    fn flow_rule_service(&self, network: NetworkId) -> Arc<dyn FlowRuleService> {
        self.network(network)
    }
}

/// Leadership table set explicitly, one leader per application name.
#[derive(Debug, Default)]
pub struct StaticLeadership {
    leaders: DashMap<String, NodeId>,
}

impl StaticLeadership {
    pub fn new() -> Self {
        Self::default()
    }

    /// Leadership table where `node` leads `application`.
    pub fn single_node(application: &str, node: NodeId) -> Self {
        let leadership = Self::new();
        leadership.set_leader(application, node);
        leadership
    }

    pub fn set_leader(&self, application: &str, node: NodeId) {
        self.leaders.insert(application.to_string(), node);
    }

    /// Withdraws the leader of `application`; no node leads it afterwards.
    pub fn withdraw(&self, application: &str) {
        self.leaders.remove(application);
    }
}

impl LeadershipService for StaticLeadership {
    fn leader(&self, application: &str) -> Option<NodeId> {
        self.leaders.get(application).map(|node| node.value().clone())
    }
}

/// Cluster made of one fixed node.
#[derive(Debug, Clone)]
pub struct StaticCluster {
    local: NodeId,
}

impl StaticCluster {
    pub fn new(local: NodeId) -> Self {
        Self { local }
    }
}

impl ClusterService for StaticCluster {
    fn local_node_id(&self) -> NodeId {
        self.local.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use pretty_assertions::assert_eq;

    #[derive(Default)]
    struct Recorder {
        agent_events: Mutex<Vec<OfAgentEventType>>,
        device_events: Mutex<Vec<DeviceEventType>>,
    }

    impl AgentListener for Recorder {
        fn event(&self, event: OfAgentEvent) {
            self.agent_events.lock().push(event.kind());
        }
    }

    impl DeviceListener for Recorder {
        fn event(&self, event: DeviceEvent) {
            self.device_events.lock().push(event.kind());
        }
    }

    fn ctrl(s: &str) -> OfController {
        s.parse().unwrap()
    }

    #[test]
    fn test_agent_lifecycle_events() {
        let store = InMemoryAgentStore::new();
        let recorder = Arc::new(Recorder::default());
        let listener: Arc<dyn AgentListener> = recorder.clone();
        store.add_listener(Arc::clone(&listener));
        let net = NetworkId::new(1);

        store.create_agent(net, [ctrl("10.0.0.1:6633")]).unwrap();
        store.start_agent(net).unwrap();
        store.add_controller(net, ctrl("10.0.0.2:6633")).unwrap();
        store.remove_controller(net, ctrl("10.0.0.1:6633")).unwrap();
        store.stop_agent(net).unwrap();
        let removed = store.remove_agent(net).unwrap();

        assert_eq!(removed.state(), OfAgentState::Removed);
        assert_eq!(removed.controllers().len(), 1);
        assert_eq!(
            *recorder.agent_events.lock(),
            vec![
                OfAgentEventType::Created,
                OfAgentEventType::Started,
                OfAgentEventType::ControllerAdded,
                OfAgentEventType::ControllerRemoved,
                OfAgentEventType::Stopped,
                OfAgentEventType::Removed,
            ]
        );
        assert!(store.agents().is_empty());
    }

    #[test]
    fn test_agent_invalid_transitions() {
        let store = InMemoryAgentStore::new();
        let net = NetworkId::new(1);

        assert!(store.start_agent(net).is_err());
        store.create_agent(net, []).unwrap();
        assert!(store.create_agent(net, []).is_err());
        assert!(store.stop_agent(net).is_err());
        store.start_agent(net).unwrap();
        assert!(store.remove_agent(net).is_err());
        assert_eq!(store.agent(net).unwrap().state(), OfAgentState::Started);
    }

    #[test]
    fn test_listener_set_semantics() {
        let store = InMemoryAgentStore::new();
        let listener: Arc<dyn AgentListener> = Arc::new(Recorder::default());

        store.add_listener(Arc::clone(&listener));
        store.add_listener(Arc::clone(&listener));
        assert_eq!(store.listener_count(), 1);

        store.remove_listener(&listener);
        assert_eq!(store.listener_count(), 0);
    }

    #[test]
    fn test_virtual_network_devices() {
        let vnet = InMemoryVirtualNetwork::new();
        let net = NetworkId::new(1);
        let recorder = Arc::new(Recorder::default());
        let listener: Arc<dyn DeviceListener> = recorder.clone();
        vnet.device_service(net).add_listener(Arc::clone(&listener));

        let d1 = DeviceId::new("of:0000000000000001");
        let d2 = DeviceId::new("of:0000000000000002");
        vnet.add_device(net, d1.clone());
        vnet.add_device(net, d2.clone());
        vnet.set_device_available(net, &d2, false);
        vnet.set_device_available(net, &d2, false);
        vnet.remove_device(net, &d1);
        vnet.remove_device(net, &d1);

        assert!(vnet.device_service(net).available_devices().is_empty());
        assert_eq!(
            *recorder.device_events.lock(),
            vec![
                DeviceEventType::DeviceAdded,
                DeviceEventType::DeviceAdded,
                DeviceEventType::DeviceAvailabilityChanged,
                DeviceEventType::DeviceRemoved,
            ]
        );

        vnet.set_device_available(net, &d2, true);
        assert_eq!(vnet.device_service(net).available_devices(), vec![d2]);
    }

    #[test]
    fn test_networks_are_isolated() {
        let vnet = InMemoryVirtualNetwork::new();
        vnet.add_device(NetworkId::new(1), DeviceId::new("of:0000000000000001"));

        assert_eq!(vnet.device_service(NetworkId::new(1)).available_devices().len(), 1);
        assert!(vnet.device_service(NetworkId::new(2)).available_devices().is_empty());
    }

    #[test]
    fn test_static_leadership() {
        let leadership = StaticLeadership::single_node("app", NodeId::new("a"));
        assert_eq!(leadership.leader("app"), Some(NodeId::new("a")));
        assert_eq!(leadership.leader("other"), None);

        leadership.set_leader("app", NodeId::new("b"));
        assert_eq!(leadership.leader("app"), Some(NodeId::new("b")));

        leadership.withdraw("app");
        assert_eq!(leadership.leader("app"), None);

        let cluster = StaticCluster::new(NodeId::new("a"));
        assert_eq!(cluster.local_node_id(), NodeId::new("a"));
    }
}
