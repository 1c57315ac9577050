//! OpenFlow agent model and agent lifecycle events.

use std::collections::BTreeSet;
use std::fmt;

use ofagent_types::{NetworkId, OfController};
use serde::{Deserialize, Serialize};

/// Desired lifecycle state of an agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OfAgentState {
    Created,
    Started,
    Stopped,
    Removed,
}

impl OfAgentState {
    pub fn as_str(&self) -> &'static str {
        match self {
            OfAgentState::Created => "created",
            OfAgentState::Started => "started",
            OfAgentState::Stopped => "stopped",
            OfAgentState::Removed => "removed",
        }
    }
}

impl fmt::Display for OfAgentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-virtual-network agent: which controllers the network's switches
/// should connect to, and whether they should be connected now.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OfAgent {
    network_id: NetworkId,
    state: OfAgentState,
    controllers: BTreeSet<OfController>,
}

impl OfAgent {
    pub fn new(
        network_id: NetworkId,
        state: OfAgentState,
        controllers: impl IntoIterator<Item = OfController>,
    ) -> Self {
        Self {
            network_id,
            state,
            controllers: controllers.into_iter().collect(),
        }
    }

    pub fn network_id(&self) -> NetworkId {
        self.network_id
    }

    pub fn state(&self) -> OfAgentState {
        self.state
    }

    pub fn controllers(&self) -> &BTreeSet<OfController> {
        &self.controllers
    }

    /// Returns a copy of this agent in another state.
    pub fn with_state(&self, state: OfAgentState) -> Self {
        Self {
            state,
            ..self.clone()
        }
    }

    /// Returns a copy of this agent with a different controller set.
    pub fn with_controllers(&self, controllers: impl IntoIterator<Item = OfController>) -> Self {
        Self {
            controllers: controllers.into_iter().collect(),
            ..self.clone()
        }
    }
}

impl fmt::Display for OfAgent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let controllers: Vec<String> = self.controllers.iter().map(|c| c.to_string()).collect();
        write!(
            f,
            "OfAgent{{network={}, state={}, controllers=[{}]}}",
            self.network_id,
            self.state,
            controllers.join(", ")
        )
    }
}

/// Kind of agent lifecycle event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OfAgentEventType {
    Created,
    Removed,
    Started,
    Stopped,
    ControllerAdded,
    ControllerRemoved,
}

/// An agent lifecycle event. The subject is the agent after the change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OfAgentEvent {
    kind: OfAgentEventType,
    subject: OfAgent,
}

impl OfAgentEvent {
    pub fn new(kind: OfAgentEventType, subject: OfAgent) -> Self {
        Self { kind, subject }
    }

    pub fn kind(&self) -> OfAgentEventType {
        self.kind
    }

    pub fn subject(&self) -> &OfAgent {
        &self.subject
    }
}
