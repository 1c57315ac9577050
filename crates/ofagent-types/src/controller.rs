//! External OpenFlow controller address.

use crate::ParseError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;

/// An external OpenFlow controller that switches connect to.
///
/// # Examples
///
/// ```
/// use ofagent_types::OfController;
///
/// let ctrl: OfController = "10.0.0.1:6633".parse().unwrap();
/// assert_eq!(ctrl.port(), 6633);
/// assert_eq!(ctrl.to_string(), "10.0.0.1:6633");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct OfController {
    ip: IpAddr,
    port: u16,
}

impl OfController {
    /// Default OpenFlow controller port.
    pub const DEFAULT_PORT: u16 = 6653;

    /// Creates a controller descriptor.
    pub const fn new(ip: IpAddr, port: u16) -> Self {
        OfController { ip, port }
    }

    /// Returns the controller IP address.
    pub const fn ip(&self) -> IpAddr {
        self.ip
    }

    /// Returns the controller TCP port.
    pub const fn port(&self) -> u16 {
        self.port
    }

    /// Returns the socket address switches connect to.
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.ip, self.port)
    }
}

impl fmt::Display for OfController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.socket_addr())
    }
}

impl FromStr for OfController {
    type Err = ParseError;

    /// Accepts `ip:port`, `[v6]:port`, or a bare address on
    /// [`OfController::DEFAULT_PORT`].
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Ok(addr) = s.parse::<SocketAddr>() {
            return Ok(OfController::from(addr));
        }
        s.parse::<IpAddr>()
            .map(|ip| OfController::new(ip, OfController::DEFAULT_PORT))
            .map_err(|_| ParseError::InvalidController(s.to_string()))
    }
}

impl From<SocketAddr> for OfController {
    fn from(addr: SocketAddr) -> Self {
        OfController::new(addr.ip(), addr.port())
    }
}

impl TryFrom<String> for OfController {
    type Error = ParseError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<OfController> for String {
    fn from(ctrl: OfController) -> String {
        ctrl.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::net::Ipv4Addr;

    #[test]
    fn test_parse_ipv4() {
        let ctrl: OfController = "10.0.0.1:6633".parse().unwrap();
        assert_eq!(ctrl.ip(), IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1)));
        assert_eq!(ctrl.port(), 6633);
    }

    #[test]
    fn test_parse_ipv6() {
        let ctrl: OfController = "[::1]:6653".parse().unwrap();
        assert!(ctrl.ip().is_ipv6());
        assert_eq!(ctrl.to_string(), "[::1]:6653");
    }

    #[test]
    fn test_socket_addr() {
        let ctrl = OfController::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 6653);
        assert_eq!(ctrl.socket_addr(), "127.0.0.1:6653".parse().unwrap());
    }

    #[test]
    fn test_parse_bare_address_uses_default_port() {
        let ctrl: OfController = "10.0.0.1".parse().unwrap();
        assert_eq!(ctrl.port(), OfController::DEFAULT_PORT);
        assert_eq!(ctrl.to_string(), "10.0.0.1:6653");

        let ctrl: OfController = "::1".parse().unwrap();
        assert_eq!(ctrl.to_string(), "[::1]:6653");
    }

    #[test]
    fn test_invalid() {
        assert!("".parse::<OfController>().is_err());
        assert!("controller:6633".parse::<OfController>().is_err());
        assert!("10.0.0.1:99999".parse::<OfController>().is_err());
    }
}
