//! ofswitchmgrd daemon entry point.
//!
//! Runs the OpenFlow switch manager in standalone mode: this node is the
//! whole cluster and leads the application, and the virtual networks and
//! agents come from the configuration file.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use ofagent_switchmgrd::config::DEFAULT_CONFIG_PATH;
use ofagent_switchmgrd::memory::{
    InMemoryAgentStore, InMemoryVirtualNetwork, StaticCluster, StaticLeadership,
};
use ofagent_switchmgrd::{
    ConnectionOrchestrator, IoWorker, ManagerServices, OfAgentState, OfSwitchManager,
    SwitchMgrConfig,
};

/// OpenFlow agent switch manager
#[derive(Parser, Debug)]
#[command(name = "ofswitchmgrd")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file
    #[arg(short = 'c', long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error), overridden by RUST_LOG
    #[arg(short = 'l', long, default_value = "info")]
    log_level: String,
}

fn init_logging(level: &str) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .context("invalid log level")?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to set tracing subscriber: {}", e))
}

async fn run(config: SwitchMgrConfig) -> anyhow::Result<()> {
    let application = config.agent.application_name.clone();
    let local = config.cluster.local_node_id();

    let store = Arc::new(InMemoryAgentStore::new());
    let vnet = Arc::new(InMemoryVirtualNetwork::new());
    for network in &config.networks {
        for device in &network.devices {
            vnet.add_device(network.id, device.clone());
        }
    }

    let services = ManagerServices {
        agents: store.clone(),
        leadership: Arc::new(StaticLeadership::single_node(&application, local.clone())),
        cluster: Arc::new(StaticCluster::new(local)),
        virtual_network: vnet,
    };
    let connector = Arc::new(ConnectionOrchestrator::new(
        config.connection.clone(),
        IoWorker::new()?,
    ));
    let manager = OfSwitchManager::new(services, connector, application);
    manager.start()?;

    for entry in &config.agents {
        store.create_agent(entry.network, entry.controllers.iter().copied())?;
        if entry.state == OfAgentState::Started {
            store.start_agent(entry.network)?;
        }
    }
    manager.flush().await?;
    info!(
        agents = config.agents.len(),
        switches = manager.of_switches().len(),
        "Configured agents applied"
    );

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;
    info!("Shutdown signal received");

    manager.stop().await?;
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    if let Err(e) = init_logging(&args.log_level) {
        eprintln!("ofswitchmgrd: {:#}", e);
        return ExitCode::FAILURE;
    }

    info!("--- Starting ofswitchmgrd ---");

    let config = match SwitchMgrConfig::load_or_default(&args.config) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load {}: {}", args.config.display(), e);
            return ExitCode::FAILURE;
        }
    };

    match run(config).await {
        Ok(()) => {
            info!("ofswitchmgrd exiting normally");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("ofswitchmgrd error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}
