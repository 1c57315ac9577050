//! Virtual device and virtual network identifiers.

use crate::ParseError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Identifier of a device in a virtual network.
///
/// Device identifiers are URIs of the form `<scheme>:<id>`, for example
/// `of:0000000000000001`. The identifier is not validated on construction;
/// [`DatapathId::from_device_id`](crate::DatapathId::from_device_id) is the
/// place where the id part is checked.
///
/// # Examples
///
/// ```
/// use ofagent_types::DeviceId;
///
/// let device = DeviceId::new("of:0000000000000001");
/// assert_eq!(device.scheme(), "of");
/// assert_eq!(device.id_part(), Some("0000000000000001"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceId(String);

impl DeviceId {
    /// Separator between the URI scheme and the scheme-specific part.
    pub const SCHEME_SEPARATOR: char = ':';

    /// Creates a device identifier from its URI text.
    pub fn new(uri: impl Into<String>) -> Self {
        DeviceId(uri.into())
    }

    /// Returns the full URI text.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the URI scheme (the text before the first separator).
    pub fn scheme(&self) -> &str {
        self.0
            .split(Self::SCHEME_SEPARATOR)
            .next()
            .unwrap_or_default()
    }

    /// Returns the segment following the first scheme separator, if any.
    ///
    /// Only the segment up to the next separator is returned, so
    /// `of:abc:def` yields `abc`.
    pub fn id_part(&self) -> Option<&str> {
        self.0.split(Self::SCHEME_SEPARATOR).nth(1)
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DeviceId {
    fn from(s: &str) -> Self {
        DeviceId::new(s)
    }
}

impl From<String> for DeviceId {
    fn from(s: String) -> Self {
        DeviceId(s)
    }
}

/// Identifier of a virtual network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NetworkId(u64);

impl NetworkId {
    /// Creates a network identifier.
    pub const fn new(id: u64) -> Self {
        NetworkId(id)
    }
}

impl fmt::Display for NetworkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for NetworkId {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<u64>()
            .map(NetworkId)
            .map_err(|_| ParseError::InvalidNetworkId(s.to_string()))
    }
}

impl From<u64> for NetworkId {
    fn from(id: u64) -> Self {
        NetworkId(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_device_id_parts() {
        let device = DeviceId::new("of:0000000000000001");
        assert_eq!(device.scheme(), "of");
        assert_eq!(device.id_part(), Some("0000000000000001"));
        assert_eq!(device.to_string(), "of:0000000000000001");
    }

    #[test]
    fn test_device_id_without_separator() {
        let device = DeviceId::new("0000000000000001");
        assert_eq!(device.scheme(), "0000000000000001");
        assert_eq!(device.id_part(), None);
    }

    #[test]
    fn test_device_id_takes_first_segment_only() {
        let device = DeviceId::new("of:abc:def");
        assert_eq!(device.id_part(), Some("abc"));
    }

    #[test]
    fn test_network_id_parse() {
        assert_eq!("42".parse::<NetworkId>().unwrap(), NetworkId::new(42));
        assert_eq!(NetworkId::new(7).to_string(), "7");
        assert!("net-1".parse::<NetworkId>().is_err());
        assert!("-1".parse::<NetworkId>().is_err());
    }
}
