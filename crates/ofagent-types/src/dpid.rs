//! OpenFlow datapath identifier and its derivation from device identifiers.

use crate::{DeviceId, ParseError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Number of hexadecimal characters in a device id that encodes a datapath.
const DPID_HEX_LEN: usize = 16;

/// A 64-bit OpenFlow datapath identifier.
///
/// The textual form is 8 colon-separated groups of 2 lowercase hex digits.
///
/// # Examples
///
/// ```
/// use ofagent_types::{DatapathId, DeviceId};
///
/// let dpid = DatapathId::from_device_id(&DeviceId::new("of:0000000000000001")).unwrap();
/// assert_eq!(dpid.to_string(), "00:00:00:00:00:00:00:01");
/// assert_eq!(dpid.value(), 1);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DatapathId(u64);

impl DatapathId {
    /// Creates a datapath id from its numeric value.
    pub const fn new(value: u64) -> Self {
        DatapathId(value)
    }

    /// Returns the numeric value.
    pub const fn value(&self) -> u64 {
        self.0
    }

    /// Derives the datapath id of a virtual device.
    ///
    /// The segment after the device id's scheme separator must be exactly
    /// 16 hex characters. They are taken in order, two per group, with no
    /// reordering or byte swapping.
    ///
    /// # Errors
    ///
    /// Returns [`ParseError::InvalidIdentifier`] if the device id has no
    /// scheme separator, or the id part is not 16 hex characters.
    pub fn from_device_id(device: &DeviceId) -> Result<Self, ParseError> {
        let hex = device.id_part().ok_or_else(|| {
            ParseError::invalid_identifier(device.as_str(), "missing scheme separator")
        })?;

        if hex.len() != DPID_HEX_LEN {
            return Err(ParseError::invalid_identifier(
                device.as_str(),
                format!("expected {} hex characters, found {}", DPID_HEX_LEN, hex.len()),
            ));
        }
        if !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(ParseError::invalid_identifier(
                device.as_str(),
                "non-hexadecimal character",
            ));
        }

        let value = hex
            .chars()
            .filter_map(|c| c.to_digit(16))
            .fold(0u64, |acc, digit| (acc << 4) | u64::from(digit));
        Ok(DatapathId(value))
    }

    /// Returns the eight bytes in network order.
    pub const fn to_be_bytes(&self) -> [u8; 8] {
        self.0.to_be_bytes()
    }
}

impl fmt::Display for DatapathId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let b = self.0.to_be_bytes();
        write!(
            f,
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]
        )
    }
}

impl FromStr for DatapathId {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split(':').collect();
        if parts.len() != 8 {
            return Err(ParseError::InvalidDatapathId(s.to_string()));
        }

        let mut value = 0u64;
        for part in parts {
            if part.len() != 2 {
                return Err(ParseError::InvalidDatapathId(s.to_string()));
            }
            let byte = u8::from_str_radix(part, 16)
                .map_err(|_| ParseError::InvalidDatapathId(s.to_string()))?;
            value = (value << 8) | u64::from(byte);
        }

        Ok(DatapathId(value))
    }
}

impl TryFrom<String> for DatapathId {
    type Error = ParseError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<DatapathId> for String {
    fn from(dpid: DatapathId) -> String {
        dpid.to_string()
    }
}

impl From<u64> for DatapathId {
    fn from(value: u64) -> Self {
        DatapathId(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn dpid_of(id: &str) -> Result<DatapathId, ParseError> {
        DatapathId::from_device_id(&DeviceId::new(id))
    }

    #[test]
    fn test_from_device_id() {
        let dpid = dpid_of("of:0000000000000001").unwrap();
        assert_eq!(dpid.to_string(), "00:00:00:00:00:00:00:01");
        assert_eq!(dpid.value(), 1);
    }

    #[test]
    fn test_groups_follow_input_order() {
        let dpid = dpid_of("of:0123456789abcdef").unwrap();
        assert_eq!(dpid.to_string(), "01:23:45:67:89:ab:cd:ef");
        assert_eq!(dpid.to_string().replace(':', ""), "0123456789abcdef");
        assert_eq!(dpid.to_be_bytes()[0], 0x01);
    }

    #[test]
    fn test_full_range_value() {
        let dpid = dpid_of("of:fedcba9876543210").unwrap();
        assert_eq!(dpid.value(), 0xfedc_ba98_7654_3210);
        assert_eq!(dpid, "fe:dc:ba:98:76:54:32:10".parse().unwrap());
        assert_eq!(dpid_of("of:ffffffffffffffff").unwrap().value(), u64::MAX);
    }

    #[test]
    fn test_uppercase_is_normalized() {
        let dpid = dpid_of("of:00000000000000FF").unwrap();
        assert_eq!(dpid.to_string(), "00:00:00:00:00:00:00:ff");
    }

    #[test]
    fn test_scheme_is_ignored() {
        assert_eq!(
            dpid_of("null:000000000000000a").unwrap(),
            dpid_of("of:000000000000000a").unwrap()
        );
    }

    #[test]
    fn test_invalid_length() {
        assert!(matches!(
            dpid_of("of:001"),
            Err(ParseError::InvalidIdentifier { .. })
        ));
        assert!(matches!(
            dpid_of("of:00000000000000011"),
            Err(ParseError::InvalidIdentifier { .. })
        ));
        assert!(matches!(dpid_of("of:"), Err(ParseError::InvalidIdentifier { .. })));
    }

    #[test]
    fn test_missing_separator() {
        assert!(matches!(
            dpid_of("0000000000000001"),
            Err(ParseError::InvalidIdentifier { .. })
        ));
    }

    #[test]
    fn test_non_hex() {
        assert!(matches!(
            dpid_of("of:000000000000000g"),
            Err(ParseError::InvalidIdentifier { .. })
        ));
    }

    #[test]
    fn test_parse_display_form() {
        let dpid: DatapathId = "00:00:00:00:00:00:01:00".parse().unwrap();
        assert_eq!(dpid.value(), 256);
        assert!("00:00:00:00:00:00:01".parse::<DatapathId>().is_err());
        assert!("00:00:00:00:00:00:01:000".parse::<DatapathId>().is_err());
        assert!("zz:00:00:00:00:00:00:00".parse::<DatapathId>().is_err());
    }
}
