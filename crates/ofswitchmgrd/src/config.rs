//! Configuration file support for ofswitchmgrd.
//!
//! Loads and validates the daemon configuration from a TOML file.
//! Default location: /etc/ofagent/ofswitchmgrd.toml

use std::collections::HashSet;
use std::fs;
use std::path::Path;
use std::time::Duration;

use ofagent_types::{DatapathId, DeviceId, NetworkId, NodeId, OfController};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::agent::OfAgentState;
use crate::error::{SwitchMgrError, SwitchMgrResult};

/// Default configuration file location.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/ofagent/ofswitchmgrd.toml";

/// Application name used for leadership election.
pub const APPLICATION_NAME: &str = "org.onosproject.ofagent";

/// Agent (application) configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Application name whose leader processes agent events
    #[serde(default = "default_application_name")]
    pub application_name: String,
}

/// Controller connection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// TCP connect timeout in milliseconds
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_ms: u64,

    /// Disable Nagle's algorithm on controller connections
    #[serde(default = "default_tcp_nodelay")]
    pub tcp_nodelay: bool,

    /// Read buffer size per controller connection in bytes
    #[serde(default = "default_read_buffer_size")]
    pub read_buffer_size: usize,
}

/// Cluster configuration for standalone mode
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterConfig {
    /// Identifier of this node
    #[serde(default = "default_local_node")]
    pub local_node: String,
}

/// A virtual network and its available devices
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    pub id: NetworkId,

    #[serde(default)]
    pub devices: Vec<DeviceId>,
}

/// An OpenFlow agent applied at startup
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentEntry {
    pub network: NetworkId,

    #[serde(default)]
    pub controllers: Vec<OfController>,

    /// Lifecycle state to drive the agent to (created or started)
    #[serde(default = "default_agent_state")]
    pub state: OfAgentState,
}

/// Complete ofswitchmgrd configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SwitchMgrConfig {
    #[serde(default)]
    pub agent: AgentConfig,

    #[serde(default)]
    pub connection: ConnectionConfig,

    #[serde(default)]
    pub cluster: ClusterConfig,

    #[serde(default)]
    pub networks: Vec<NetworkConfig>,

    #[serde(default)]
    pub agents: Vec<AgentEntry>,
}

// Default functions
fn default_application_name() -> String {
    APPLICATION_NAME.to_string()
}

fn default_connect_timeout() -> u64 {
    5000
}

fn default_tcp_nodelay() -> bool {
    true
}

fn default_read_buffer_size() -> usize {
    4096
}

fn default_local_node() -> String {
    "local".to_string()
}

fn default_agent_state() -> OfAgentState {
    OfAgentState::Started
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            application_name: default_application_name(),
        }
    }
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            connect_timeout_ms: default_connect_timeout(),
            tcp_nodelay: default_tcp_nodelay(),
            read_buffer_size: default_read_buffer_size(),
        }
    }
}

impl ConnectionConfig {
    /// Get connect timeout as Duration
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            local_node: default_local_node(),
        }
    }
}

impl ClusterConfig {
    pub fn local_node_id(&self) -> NodeId {
        NodeId::new(self.local_node.clone())
    }
}

impl SwitchMgrConfig {
    /// Load configuration from file, falling back to defaults if file not found
    pub fn load_or_default(path: impl AsRef<Path>) -> SwitchMgrResult<Self> {
        let path = path.as_ref();

        match fs::read_to_string(path) {
            Ok(content) => Self::from_toml(&content).map_err(|e| {
                SwitchMgrError::config(format!("{}: {}", path.display(), e))
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!(path = %path.display(), "Config file not found, using defaults");
                Ok(Self::default())
            }
            Err(e) => Err(SwitchMgrError::Io(e)),
        }
    }

    /// Parse and validate configuration text
    pub fn from_toml(content: &str) -> SwitchMgrResult<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| SwitchMgrError::config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> SwitchMgrResult<()> {
        if self.agent.application_name.trim().is_empty() {
            return Err(SwitchMgrError::config("application_name must not be empty"));
        }
        if self.connection.connect_timeout_ms == 0 {
            return Err(SwitchMgrError::config("connect_timeout_ms must be non-zero"));
        }
        if self.connection.read_buffer_size == 0 {
            return Err(SwitchMgrError::config("read_buffer_size must be non-zero"));
        }
        if self.cluster.local_node.trim().is_empty() {
            return Err(SwitchMgrError::config("local_node must not be empty"));
        }

        let mut networks = HashSet::new();
        for network in &self.networks {
            if !networks.insert(network.id) {
                return Err(SwitchMgrError::config(format!(
                    "network {} is defined more than once",
                    network.id
                )));
            }
            for device in &network.devices {
                DatapathId::from_device_id(device)
                    .map_err(|e| SwitchMgrError::config(e.to_string()))?;
            }
        }

        let mut agents = HashSet::new();
        for agent in &self.agents {
            if !networks.contains(&agent.network) {
                return Err(SwitchMgrError::config(format!(
                    "agent refers to unknown network {}",
                    agent.network
                )));
            }
            if !agents.insert(agent.network) {
                return Err(SwitchMgrError::config(format!(
                    "network {} has more than one agent",
                    agent.network
                )));
            }
            if !matches!(agent.state, OfAgentState::Created | OfAgentState::Started) {
                return Err(SwitchMgrError::config(format!(
                    "agent for network {} must be created or started, not {}",
                    agent.network, agent.state
                )));
            }
        }

        Ok(())
    }

    /// Save configuration to file
    pub fn save(&self, path: impl AsRef<Path>) -> SwitchMgrResult<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| SwitchMgrError::config(format!("Failed to serialize config: {}", e)))?;
        fs::write(path, content)?;
        Ok(())
    }
}
