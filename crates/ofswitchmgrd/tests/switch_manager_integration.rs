//! End-to-end tests: in-memory agents and virtual networks driving real
//! controller connections over loopback.

use std::sync::Arc;
use std::time::Duration;

use ofagent_switchmgrd::config::{ConnectionConfig, APPLICATION_NAME};
use ofagent_switchmgrd::memory::{
    InMemoryAgentStore, InMemoryVirtualNetwork, StaticCluster, StaticLeadership,
};
use ofagent_switchmgrd::{
    ConnectionOrchestrator, IoWorker, ManagerServices, OfSwitchManager, DEFAULT_CAPABILITIES,
};
use ofagent_types::{DeviceId, NetworkId, NodeId, OfController};
use pretty_assertions::assert_eq;
use tokio::io::AsyncReadExt;
use tokio::net::{TcpListener, TcpStream};

const WAIT: Duration = Duration::from_secs(5);
const NETWORK: NetworkId = NetworkId::new(1);

struct Setup {
    manager: OfSwitchManager,
    store: Arc<InMemoryAgentStore>,
    vnet: Arc<InMemoryVirtualNetwork>,
    listener: TcpListener,
    controller: OfController,
}

async fn setup() -> Setup {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let controller = OfController::from(listener.local_addr().unwrap());

    let store = Arc::new(InMemoryAgentStore::new());
    let vnet = Arc::new(InMemoryVirtualNetwork::new());
    vnet.add_device(NETWORK, DeviceId::new("of:0000000000000001"));

    let local = NodeId::new("node-1");
    let services = ManagerServices {
        agents: store.clone(),
        leadership: Arc::new(StaticLeadership::single_node(APPLICATION_NAME, local.clone())),
        cluster: Arc::new(StaticCluster::new(local)),
        virtual_network: vnet.clone(),
    };
    let connector = Arc::new(ConnectionOrchestrator::new(
        ConnectionConfig::default(),
        IoWorker::new().unwrap(),
    ));
    let manager = OfSwitchManager::new(services, connector, APPLICATION_NAME);
    manager.start().unwrap();

    Setup {
        manager,
        store,
        vnet,
        listener,
        controller,
    }
}

async fn wait_for(mut cond: impl FnMut() -> bool) {
    tokio::time::timeout(WAIT, async {
        while !cond() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("condition not reached");
}

async fn accept(listener: &TcpListener) -> TcpStream {
    let (stream, _) = tokio::time::timeout(WAIT, listener.accept())
        .await
        .expect("no connection attempt")
        .unwrap();
    stream
}

async fn started(setup: &Setup) -> TcpStream {
    setup.store.create_agent(NETWORK, [setup.controller]).unwrap();
    setup.store.start_agent(NETWORK).unwrap();
    setup.manager.flush().await.unwrap();
    accept(&setup.listener).await
}

#[tokio::test]
async fn started_agent_connects_its_switch() {
    let setup = setup().await;
    let _peer = started(&setup).await;

    let switches = setup.manager.of_switches();
    assert_eq!(switches.len(), 1);
    let switch = &switches[0];
    assert_eq!(switch.dpid().to_string(), "00:00:00:00:00:00:00:01");
    assert!(Arc::ptr_eq(switch.capabilities(), &*DEFAULT_CAPABILITIES));
    assert_eq!(switch.capabilities().wire_bits(), 0x16f);

    wait_for(|| switch.is_connected()).await;
    assert_eq!(
        switch.controller_channels()[0].remote_addr(),
        setup.controller.socket_addr()
    );
    assert!(
        tokio::time::timeout(Duration::from_millis(200), setup.listener.accept())
            .await
            .is_err(),
        "only one connection attempt per controller"
    );

    setup.manager.stop().await.unwrap();
}

#[tokio::test]
async fn stopped_agent_closes_channel_and_unsubscribes() {
    let setup = setup().await;
    let mut peer = started(&setup).await;
    let switch = setup.manager.of_switches()[0].clone();
    wait_for(|| switch.is_connected()).await;

    let network = setup.vnet.network(NETWORK);
    assert_eq!(network.packet_processor_count(), 1);
    assert_eq!(network.flow_rule_listener_count(), 1);

    setup.store.stop_agent(NETWORK).unwrap();
    setup.manager.flush().await.unwrap();

    let mut buf = [0u8; 16];
    let n = tokio::time::timeout(WAIT, peer.read(&mut buf))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(n, 0);
    wait_for(|| !switch.is_connected()).await;
    assert_eq!(network.packet_processor_count(), 0);
    assert_eq!(network.flow_rule_listener_count(), 0);

    setup.manager.stop().await.unwrap();
}

#[tokio::test]
async fn removed_device_keeps_its_channel_open() {
    let setup = setup().await;
    let mut peer = started(&setup).await;
    let device = DeviceId::new("of:0000000000000001");
    let switch = setup.manager.of_switches()[0].clone();
    wait_for(|| switch.is_connected()).await;

    setup.vnet.remove_device(NETWORK, &device);
    setup.manager.flush().await.unwrap();

    assert!(setup.manager.of_switches().is_empty());
    assert!(setup.manager.of_switches_in(NETWORK).is_empty());

    let mut buf = [0u8; 16];
    assert!(
        tokio::time::timeout(Duration::from_millis(200), peer.read(&mut buf))
            .await
            .is_err(),
        "channel should stay open"
    );
    assert!(switch.is_connected());

    setup.manager.stop().await.unwrap();
    let n = tokio::time::timeout(WAIT, peer.read(&mut buf))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(n, 0);
}

#[tokio::test]
async fn agent_stopped_before_connect_completes_leaves_no_connection() {
    let setup = setup().await;
    setup.store.create_agent(NETWORK, [setup.controller]).unwrap();
    setup.store.start_agent(NETWORK).unwrap();
    setup.store.stop_agent(NETWORK).unwrap();
    setup.manager.flush().await.unwrap();

    let switch = setup.manager.of_switches()[0].clone();
    wait_for(|| switch.pending_attempts() == 0 && !switch.is_connected()).await;

    if let Ok(accepted) =
        tokio::time::timeout(Duration::from_millis(200), setup.listener.accept()).await
    {
        let (mut peer, _) = accepted.unwrap();
        let mut buf = [0u8; 16];
        let n = tokio::time::timeout(WAIT, peer.read(&mut buf))
            .await
            .expect("controller-side socket left open")
            .unwrap();
        assert_eq!(n, 0);
    }
    assert!(!switch.is_connected());

    setup.manager.stop().await.unwrap();
}
