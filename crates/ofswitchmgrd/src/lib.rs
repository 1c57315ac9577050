//! OpenFlow switch manager for the OpenFlow agent.
//!
//! This crate implements `ofswitchmgrd`, which exposes every device of a
//! virtual network whose OpenFlow agent is running as an independent
//! OpenFlow switch, and connects those switches to the agent's external
//! controllers.
//!
//! # Event handling
//!
//! | Agent event | Effect |
//! |-------------|--------|
//! | created | register a switch per available device, watch device events |
//! | removed | drop the network's switches, stop watching device events |
//! | started | connect switches to controllers, subscribe to packets and flow rules |
//! | stopped | disconnect switches, unsubscribe from packets and flow rules |
//!
//! Only the cluster node leading [`config::APPLICATION_NAME`] acts on
//! events.
//!
//! # Example
//!
//! ```ignore
//! use ofagent_switchmgrd::{ConnectionOrchestrator, IoWorker, OfSwitchManager};
//!
//! let connector = Arc::new(ConnectionOrchestrator::new(config.connection, IoWorker::new()?));
//! let manager = OfSwitchManager::new(services, connector, APPLICATION_NAME);
//! manager.start()?;
//! ```

pub mod agent;
pub mod capabilities;
pub mod config;
pub mod connection;
pub mod error;
pub mod events;
pub mod manager;
pub mod memory;
pub mod registry;
pub mod service;
pub mod switch;

pub use agent::{OfAgent, OfAgentEvent, OfAgentEventType, OfAgentState};
pub use capabilities::{OfCapability, OfSwitchCapabilities, DEFAULT_CAPABILITIES};
pub use config::SwitchMgrConfig;
pub use connection::{ConnectionOrchestrator, ControllerConnector, IoWorker};
pub use error::{SwitchMgrError, SwitchMgrResult};
pub use manager::{ManagerServices, OfSwitchManager};
pub use registry::SwitchRegistry;
pub use switch::{ControllerChannel, OfSwitch};
