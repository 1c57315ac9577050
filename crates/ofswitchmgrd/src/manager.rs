//! OpenFlow switch manager.
//!
//! Turns agent lifecycle events and virtual device events into switch
//! registry updates and controller connection requests. Every accepted
//! event goes through one FIFO queue drained by a single worker task, so
//! the effects of one agent's events apply in the order they were
//! delivered. Events are only accepted while this node leads the
//! application.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use ofagent_types::{DeviceId, NetworkId, NodeId};
use once_cell::sync::OnceCell;
use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, trace, warn};

use crate::agent::{OfAgent, OfAgentEvent, OfAgentEventType};
use crate::capabilities::DEFAULT_CAPABILITIES;
use crate::connection::ControllerConnector;
use crate::error::{SwitchMgrError, SwitchMgrResult};
use crate::events::{DeviceEvent, DeviceEventType, FlowRuleEvent, PacketContext, SwitchEvent};
use crate::registry::SwitchRegistry;
use crate::service::{
    AgentListener, AgentService, ClusterService, DeviceListener, FlowRuleListener,
    LeadershipService, PacketProcessor, VirtualNetworkService,
};
use crate::switch::OfSwitch;

/// Priority the packet processor is registered with.
const PACKET_PROCESSOR_PRIORITY: i32 = 0;

/// Collaborators the switch manager consumes.
#[derive(Clone)]
pub struct ManagerServices {
    pub agents: Arc<dyn AgentService>,
    pub leadership: Arc<dyn LeadershipService>,
    pub cluster: Arc<dyn ClusterService>,
    pub virtual_network: Arc<dyn VirtualNetworkService>,
}

/// Accepts events only while the local node leads the application.
struct LeadershipGate {
    leadership: Arc<dyn LeadershipService>,
    application_name: String,
    /// Set once by `start`.
    local: OnceCell<NodeId>,
}

impl LeadershipGate {
    fn is_leader(&self) -> bool {
        match self.local.get() {
            Some(local) => self.leadership.leader(&self.application_name).as_ref() == Some(local),
            None => false,
        }
    }
}

/// Unbounded FIFO feeding the worker.
struct EventQueue {
    tx: mpsc::UnboundedSender<SwitchEvent>,
    closed: AtomicBool,
}

impl EventQueue {
    fn push(&self, event: SwitchEvent) -> bool {
        if self.closed.load(Ordering::Acquire) {
            return false;
        }
        self.tx.send(event).is_ok()
    }

    /// Refuses further events and tells the worker to stop once it has
    /// processed everything already queued.
    fn close(&self) {
        if !self.closed.swap(true, Ordering::AcqRel) {
            let _ = self.tx.send(SwitchEvent::Shutdown);
        }
    }
}

/// Entry point of every externally delivered event.
struct EventIntake {
    gate: LeadershipGate,
    queue: EventQueue,
}

impl EventIntake {
    fn deliver(&self, event: SwitchEvent) {
        if !self.gate.is_leader() {
            trace!(kind = event.label(), "Not the leader, dropping event");
            return;
        }
        let kind = event.label();
        if !self.queue.push(event) {
            trace!(kind, "Switch manager stopped, dropping event");
        }
    }
}

/// The manager's listener on every service it subscribes to.
struct InternalListener {
    intake: Arc<EventIntake>,
}

impl AgentListener for InternalListener {
    fn event(&self, event: OfAgentEvent) {
        self.intake.deliver(SwitchEvent::Agent(event));
    }
}

impl DeviceListener for InternalListener {
    fn event(&self, event: DeviceEvent) {
        self.intake.deliver(SwitchEvent::Device(event));
    }
}

impl PacketProcessor for InternalListener {
    fn process(&self, context: PacketContext) {
        self.intake.deliver(SwitchEvent::PacketIn(context));
    }
}

impl FlowRuleListener for InternalListener {
    fn event(&self, event: FlowRuleEvent) {
        self.intake.deliver(SwitchEvent::FlowRule(event));
    }
}

/// State shared between the manager handle and its worker.
struct ManagerCore {
    registry: SwitchRegistry,
    connector: Arc<dyn ControllerConnector>,
    virtual_network: Arc<dyn VirtualNetworkService>,
    device_listener: Arc<dyn DeviceListener>,
    packet_processor: Arc<dyn PacketProcessor>,
    flow_rule_listener: Arc<dyn FlowRuleListener>,
}

impl ManagerCore {
    fn process(&self, event: SwitchEvent) {
        match event {
            SwitchEvent::Agent(event) => self.process_agent_event(&event),
            SwitchEvent::Device(event) => self.process_device_event(&event),
            SwitchEvent::PacketIn(context) => self.process_packet_in(&context),
            SwitchEvent::FlowRule(event) => self.process_flow_rule_event(&event),
            SwitchEvent::Barrier(done) => {
                let _ = done.send(());
            }
            SwitchEvent::Shutdown => {}
        }
    }

    #[instrument(skip_all, fields(network = %event.subject().network_id(), kind = ?event.kind()))]
    fn process_agent_event(&self, event: &OfAgentEvent) {
        let agent = event.subject();
        debug!(agent = %agent, "Processing agent event");
        match event.kind() {
            OfAgentEventType::Created => self.agent_created(agent),
            OfAgentEventType::Removed => self.agent_removed(agent),
            OfAgentEventType::Started => self.agent_started(agent),
            OfAgentEventType::Stopped => self.agent_stopped(agent),
            OfAgentEventType::ControllerAdded => self.controller_added(agent),
            OfAgentEventType::ControllerRemoved => self.controller_removed(agent),
        }
    }

    fn agent_created(&self, agent: &OfAgent) {
        let devices = self.virtual_network.device_service(agent.network_id());
        for device in devices.available_devices() {
            self.add_switch(&device);
        }
        devices.add_listener(Arc::clone(&self.device_listener));
    }

    fn agent_removed(&self, agent: &OfAgent) {
        let devices = self.virtual_network.device_service(agent.network_id());
        for device in devices.available_devices() {
            self.remove_switch(&device);
        }
        devices.remove_listener(&self.device_listener);
    }

    fn agent_started(&self, agent: &OfAgent) {
        let network = agent.network_id();
        for switch in self.switches_of(network) {
            self.connector.connect(&switch, agent.controllers());
        }
        self.virtual_network
            .packet_service(network)
            .add_processor(Arc::clone(&self.packet_processor), PACKET_PROCESSOR_PRIORITY);
        self.virtual_network
            .flow_rule_service(network)
            .add_listener(Arc::clone(&self.flow_rule_listener));
    }

    fn agent_stopped(&self, agent: &OfAgent) {
        let network = agent.network_id();
        for switch in self.switches_of(network) {
            self.connector.disconnect(&switch, agent.controllers());
        }
        self.virtual_network
            .packet_service(network)
            .remove_processor(&self.packet_processor);
        self.virtual_network
            .flow_rule_service(network)
            .remove_listener(&self.flow_rule_listener);
    }

    fn controller_added(&self, agent: &OfAgent) {
        debug!(controllers = agent.controllers().len(), "Controller added");
    }

    fn controller_removed(&self, agent: &OfAgent) {
        debug!(controllers = agent.controllers().len(), "Controller removed");
    }

    #[instrument(skip_all, fields(device = %event.device(), kind = ?event.kind()))]
    fn process_device_event(&self, event: &DeviceEvent) {
        match event.kind() {
            DeviceEventType::DeviceAdded => self.add_switch(event.device()),
            // Live controller channels are left open.
            DeviceEventType::DeviceRemoved => self.remove_switch(event.device()),
            DeviceEventType::DeviceAvailabilityChanged => {
                self.device_availability_changed(event.device())
            }
            DeviceEventType::DeviceUpdated => self.device_updated(event.device()),
            DeviceEventType::DeviceSuspended => self.device_suspended(event.device()),
            DeviceEventType::PortAdded => self.port_added(event),
            DeviceEventType::PortRemoved => self.port_removed(event),
            DeviceEventType::PortUpdated => self.port_updated(event),
            DeviceEventType::PortStatsUpdated => self.port_stats_updated(event),
        }
    }

    fn device_availability_changed(&self, device: &DeviceId) {
        trace!(device = %device, "Device availability changed");
    }

    fn device_updated(&self, device: &DeviceId) {
        trace!(device = %device, "Device updated");
    }

    fn device_suspended(&self, device: &DeviceId) {
        trace!(device = %device, "Device suspended");
    }

    fn port_added(&self, event: &DeviceEvent) {
        trace!(port = ?event.port_number(), "Port added");
    }

    fn port_removed(&self, event: &DeviceEvent) {
        trace!(port = ?event.port_number(), "Port removed");
    }

    fn port_updated(&self, event: &DeviceEvent) {
        trace!(port = ?event.port_number(), "Port updated");
    }

    fn port_stats_updated(&self, event: &DeviceEvent) {
        trace!(port = ?event.port_number(), "Port stats updated");
    }

    #[instrument(skip_all, fields(device = %context.device, in_port = context.in_port))]
    fn process_packet_in(&self, context: &PacketContext) {
        trace!(len = context.data.len(), "Packet in");
    }

    #[instrument(skip_all, fields(device = %event.device, kind = ?event.kind))]
    fn process_flow_rule_event(&self, event: &FlowRuleEvent) {
        trace!(flow_id = event.flow_id, "Flow rule event");
    }

    fn add_switch(&self, device: &DeviceId) {
        match self.registry.add(device) {
            Ok(switch) => info!(device = %device, dpid = %switch.dpid(), "Switch added"),
            Err(e) => warn!(device = %device, error = %e, "Skipping device"),
        }
    }

    fn remove_switch(&self, device: &DeviceId) {
        if let Some(switch) = self.registry.remove(device) {
            info!(device = %device, dpid = %switch.dpid(), "Switch removed");
        }
    }

    /// Registered switches of the devices currently available in `network`.
    fn switches_of(&self, network: NetworkId) -> Vec<Arc<OfSwitch>> {
        let devices = self.virtual_network.device_service(network).available_devices();
        self.registry.for_network(&devices)
    }
}

enum WorkerState {
    Idle(mpsc::UnboundedReceiver<SwitchEvent>),
    Running(JoinHandle<()>),
    Stopped,
}

async fn run_worker(core: Arc<ManagerCore>, mut rx: mpsc::UnboundedReceiver<SwitchEvent>) {
    debug!("Switch manager worker started");
    while let Some(event) = rx.recv().await {
        if matches!(event, SwitchEvent::Shutdown) {
            break;
        }
        core.process(event);
    }
    debug!("Switch manager worker stopped");
}

/// Exposes the virtual devices of started agents as OpenFlow switches.
pub struct OfSwitchManager {
    core: Arc<ManagerCore>,
    intake: Arc<EventIntake>,
    agents: Arc<dyn AgentService>,
    cluster: Arc<dyn ClusterService>,
    agent_listener: Arc<dyn AgentListener>,
    worker: Mutex<WorkerState>,
}

impl OfSwitchManager {
    pub fn new(
        services: ManagerServices,
        connector: Arc<dyn ControllerConnector>,
        application_name: impl Into<String>,
    ) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let intake = Arc::new(EventIntake {
            gate: LeadershipGate {
                leadership: services.leadership,
                application_name: application_name.into(),
                local: OnceCell::new(),
            },
            queue: EventQueue {
                tx,
                closed: AtomicBool::new(false),
            },
        });
        let listener = Arc::new(InternalListener {
            intake: Arc::clone(&intake),
        });
        let core = Arc::new(ManagerCore {
            registry: SwitchRegistry::new(Arc::clone(&DEFAULT_CAPABILITIES)),
            connector,
            virtual_network: services.virtual_network,
            device_listener: listener.clone(),
            packet_processor: listener.clone(),
            flow_rule_listener: listener.clone(),
        });

        Self {
            core,
            intake,
            agents: services.agents,
            cluster: services.cluster,
            agent_listener: listener,
            worker: Mutex::new(WorkerState::Idle(rx)),
        }
    }

    /// Spawns the worker on the current tokio runtime and subscribes to
    /// agent events.
    pub fn start(&self) -> SwitchMgrResult<()> {
        let mut worker = self.worker.lock();
        let rx = match std::mem::replace(&mut *worker, WorkerState::Stopped) {
            WorkerState::Idle(rx) => rx,
            WorkerState::Running(handle) => {
                *worker = WorkerState::Running(handle);
                return Err(SwitchMgrError::AlreadyStarted);
            }
            WorkerState::Stopped => {
                return Err(SwitchMgrError::internal("switch manager cannot be restarted"));
            }
        };
        let runtime = match tokio::runtime::Handle::try_current() {
            Ok(runtime) => runtime,
            Err(e) => {
                *worker = WorkerState::Idle(rx);
                return Err(SwitchMgrError::internal(format!("no tokio runtime: {}", e)));
            }
        };

        let local = self.cluster.local_node_id();
        let _ = self.intake.gate.local.set(local.clone());
        *worker = WorkerState::Running(runtime.spawn(run_worker(Arc::clone(&self.core), rx)));
        drop(worker);

        self.agents.add_listener(Arc::clone(&self.agent_listener));
        info!(
            application = %self.intake.gate.application_name,
            local_node = %local,
            "Started"
        );
        Ok(())
    }

    /// Unsubscribes, drains the worker, stops every known agent and shuts
    /// the connector down. The manager cannot be started again.
    pub async fn stop(&self) -> SwitchMgrResult<()> {
        let handle = {
            let mut worker = self.worker.lock();
            match std::mem::replace(&mut *worker, WorkerState::Stopped) {
                WorkerState::Running(handle) => handle,
                other => {
                    *worker = other;
                    return Err(SwitchMgrError::NotStarted);
                }
            }
        };

        self.agents.remove_listener(&self.agent_listener);
        self.intake.queue.close();
        if let Err(e) = handle.await {
            warn!(error = %e, "Switch manager worker failed");
        }

        for agent in self.agents.agents() {
            self.core.agent_stopped(&agent);
        }
        self.core.connector.shutdown().await;

        info!("Stopped");
        Ok(())
    }

    /// Every switch currently registered, ordered by datapath id.
    pub fn of_switches(&self) -> Vec<Arc<OfSwitch>> {
        self.core.registry.all()
    }

    /// Registered switches of the devices currently available in
    /// `network`.
    pub fn of_switches_in(&self, network: NetworkId) -> Vec<Arc<OfSwitch>> {
        self.core.switches_of(network)
    }

    /// Waits until every event queued so far has been processed.
    pub async fn flush(&self) -> SwitchMgrResult<()> {
        if !matches!(*self.worker.lock(), WorkerState::Running(_)) {
            return Err(SwitchMgrError::NotStarted);
        }
        let (done, wait) = oneshot::channel();
        if !self.intake.queue.push(SwitchEvent::Barrier(done)) {
            return Err(SwitchMgrError::NotStarted);
        }
        wait.await.map_err(|_| SwitchMgrError::NotStarted)
    }
}
