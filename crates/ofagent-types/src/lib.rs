//! Common types shared by the OpenFlow agent crates.
//!
//! This crate provides type-safe representations of the identifiers that
//! cross the boundary between the virtual network layer and the OpenFlow
//! protocol layer:
//!
//! - [`DeviceId`]: Virtual device identifier (`<scheme>:<id>`)
//! - [`NetworkId`]: Virtual network identifier
//! - [`NodeId`]: Cluster node identifier
//! - [`DatapathId`]: OpenFlow datapath identifier derived from a [`DeviceId`]
//! - [`OfController`]: Address of an external OpenFlow controller

mod controller;
mod device;
mod dpid;
mod node;

pub use controller::OfController;
pub use device::{DeviceId, NetworkId};
pub use dpid::DatapathId;
pub use node::NodeId;

/// Common error type for parsing failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("invalid device identifier {id}: {reason}")]
    InvalidIdentifier { id: String, reason: String },

    #[error("invalid datapath id: {0}")]
    InvalidDatapathId(String),

    #[error("invalid controller address: {0} (expected ip:port)")]
    InvalidController(String),

    #[error("invalid network id: {0}")]
    InvalidNetworkId(String),
}

impl ParseError {
    pub(crate) fn invalid_identifier(id: impl Into<String>, reason: impl Into<String>) -> Self {
        ParseError::InvalidIdentifier {
            id: id.into(),
            reason: reason.into(),
        }
    }
}
