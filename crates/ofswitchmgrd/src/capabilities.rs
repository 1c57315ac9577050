//! Switch capability profile advertised by every virtual OpenFlow switch.

use std::collections::BTreeSet;
use std::sync::Arc;

use once_cell::sync::Lazy;

/// A single switch capability, as defined by `ofp_capabilities`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum OfCapability {
    FlowStats,
    TableStats,
    PortStats,
    GroupStats,
    IpReasm,
    QueueStats,
    PortBlocked,
}

impl OfCapability {
    /// Returns the OpenFlow 1.3 wire bit for this capability.
    pub const fn wire_bit(&self) -> u32 {
        match self {
            OfCapability::FlowStats => 1 << 0,
            OfCapability::TableStats => 1 << 1,
            OfCapability::PortStats => 1 << 2,
            OfCapability::GroupStats => 1 << 3,
            OfCapability::IpReasm => 1 << 5,
            OfCapability::QueueStats => 1 << 6,
            OfCapability::PortBlocked => 1 << 8,
        }
    }
}

/// Immutable set of capabilities a switch advertises to its controllers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OfSwitchCapabilities {
    capabilities: BTreeSet<OfCapability>,
}

impl OfSwitchCapabilities {
    /// Starts building a capability set.
    pub fn builder() -> OfSwitchCapabilitiesBuilder {
        OfSwitchCapabilitiesBuilder::default()
    }

    /// Returns true if the capability is advertised.
    pub fn has(&self, capability: OfCapability) -> bool {
        self.capabilities.contains(&capability)
    }

    /// Iterates over the advertised capabilities.
    pub fn iter(&self) -> impl Iterator<Item = OfCapability> + '_ {
        self.capabilities.iter().copied()
    }

    /// Returns the number of advertised capabilities.
    pub fn len(&self) -> usize {
        self.capabilities.len()
    }

    /// Returns true if nothing is advertised.
    pub fn is_empty(&self) -> bool {
        self.capabilities.is_empty()
    }

    /// Returns the `capabilities` field of an OpenFlow 1.3 features reply.
    pub fn wire_bits(&self) -> u32 {
        self.capabilities
            .iter()
            .fold(0, |bits, capability| bits | capability.wire_bit())
    }
}

/// Builder for [`OfSwitchCapabilities`].
#[derive(Debug, Default)]
pub struct OfSwitchCapabilitiesBuilder {
    capabilities: BTreeSet<OfCapability>,
}

impl OfSwitchCapabilitiesBuilder {
    fn with(mut self, capability: OfCapability) -> Self {
        self.capabilities.insert(capability);
        self
    }

    pub fn flow_stats(self) -> Self {
        self.with(OfCapability::FlowStats)
    }

    pub fn table_stats(self) -> Self {
        self.with(OfCapability::TableStats)
    }

    pub fn port_stats(self) -> Self {
        self.with(OfCapability::PortStats)
    }

    pub fn group_stats(self) -> Self {
        self.with(OfCapability::GroupStats)
    }

    pub fn queue_stats(self) -> Self {
        self.with(OfCapability::QueueStats)
    }

    pub fn ip_reasm(self) -> Self {
        self.with(OfCapability::IpReasm)
    }

    pub fn port_blocked(self) -> Self {
        self.with(OfCapability::PortBlocked)
    }

    /// Freezes the capability set.
    pub fn build(self) -> OfSwitchCapabilities {
        OfSwitchCapabilities {
            capabilities: self.capabilities,
        }
    }
}

/// The capability profile shared by every switch this process exposes.
pub static DEFAULT_CAPABILITIES: Lazy<Arc<OfSwitchCapabilities>> = Lazy::new(|| {
    Arc::new(
        OfSwitchCapabilities::builder()
            .flow_stats()
            .table_stats()
            .port_stats()
            .group_stats()
            .queue_stats()
            .ip_reasm()
            .port_blocked()
            .build(),
    )
});
