// Socket address module
// Tagged IPv4/IPv6 endpoint with conversions to and from configuration text

use std::fmt;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr, SocketAddrV4, SocketAddrV6};

use crate::error::AddressError;

/// Rendered in place of a descriptor when the address family is not set
pub const UNKNOWN_ADDRESS: &str = "<unknown>";

/// An IPv4 or IPv6 endpoint.
///
/// `Unspecified` is the uninitialised state: it never binds and renders as
/// [`UNKNOWN_ADDRESS`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SocketAddress {
    #[default]
    Unspecified,
    V4(SocketAddrV4),
    V6(SocketAddrV6),
}

/// Treat `*` in a bind address as "all interfaces"
pub fn normalize_wildcard(address: &str) -> &str {
    if address.starts_with('*') {
        ""
    } else {
        address
    }
}

impl SocketAddress {
    pub const fn new_v4(ip: Ipv4Addr, port: u16) -> Self {
        Self::V4(SocketAddrV4::new(ip, port))
    }

    pub const fn new_v6(ip: Ipv6Addr, port: u16) -> Self {
        Self::V6(SocketAddrV6::new(ip, port, 0, 0))
    }

    /// Wildcard address in the default family for this build
    pub const fn wildcard(port: u16) -> Self {
        if cfg!(feature = "ipv6") {
            Self::new_v6(Ipv6Addr::UNSPECIFIED, port)
        } else {
            Self::new_v4(Ipv4Addr::UNSPECIFIED, port)
        }
    }

    /// Zeroed IPv4 address and port, used for unspecified UDP bindings
    pub const fn unspecified_udp() -> Self {
        Self::new_v4(Ipv4Addr::UNSPECIFIED, 0)
    }

    /// Build an address from configuration text.
    ///
    /// An empty address yields the wildcard. Otherwise IPv4 is tried before
    /// IPv6 and the first family that parses wins.
    pub fn from_text(address: &str, port: u16) -> Result<Self, AddressError> {
        if address.is_empty() {
            return Ok(Self::wildcard(port));
        }
        if let Ok(ip) = address.parse::<Ipv4Addr>() {
            return Ok(Self::new_v4(ip, port));
        }
        if let Ok(ip) = address.parse::<Ipv6Addr>() {
            return Ok(Self::new_v6(ip, port));
        }
        Err(AddressError::InvalidAddress(address.to_string()))
    }

    /// Presentation form of the address plus the port
    pub fn to_text_and_port(&self) -> Result<(String, u16), AddressError> {
        match self {
            Self::V4(v4) => Ok((v4.ip().to_string(), v4.port())),
            Self::V6(v6) => Ok((v6.ip().to_string(), v6.port())),
            Self::Unspecified => Err(AddressError::UnsupportedFamily),
        }
    }

    /// Human-facing bind descriptor: `*:PORT`, `A.B.C.D:PORT` or `[v6]:PORT`
    pub fn to_user_string(&self) -> String {
        match self {
            Self::V4(v4) if v4.ip().is_unspecified() => format!("*:{}", v4.port()),
            Self::V4(v4) => {
                let [a, b, c, d] = v4.ip().octets();
                format!("{a}.{b}.{c}.{d}:{}", v4.port())
            }
            Self::V6(v6) if v6.ip().is_unspecified() => format!("*:{}", v6.port()),
            Self::V6(v6) => format!("[{}]:{}", v6.ip(), v6.port()),
            Self::Unspecified => UNKNOWN_ADDRESS.to_string(),
        }
    }

    /// Size of the family-specific sockaddr structure, 0 when unset
    pub fn byte_size(&self) -> usize {
        self.to_std()
            .map_or(0, |addr| socket2::SockAddr::from(addr).len() as usize)
    }

    pub const fn port(&self) -> Option<u16> {
        match self {
            Self::V4(v4) => Some(v4.port()),
            Self::V6(v6) => Some(v6.port()),
            Self::Unspecified => None,
        }
    }

    pub const fn is_wildcard(&self) -> bool {
        match self {
            Self::V4(v4) => v4.ip().is_unspecified(),
            Self::V6(v6) => v6.ip().is_unspecified(),
            Self::Unspecified => false,
        }
    }

    /// Address family as a string
    pub const fn family(&self) -> &'static str {
        match self {
            Self::V4(_) => "IPv4",
            Self::V6(_) => "IPv6",
            Self::Unspecified => "unknown",
        }
    }

    pub const fn to_std(&self) -> Option<SocketAddr> {
        match self {
            Self::V4(v4) => Some(SocketAddr::V4(*v4)),
            Self::V6(v6) => Some(SocketAddr::V6(*v6)),
            Self::Unspecified => None,
        }
    }

    /// Convert to the form handed to the bind syscall
    pub fn to_sockaddr(&self) -> Result<socket2::SockAddr, AddressError> {
        self.to_std()
            .map(socket2::SockAddr::from)
            .ok_or(AddressError::UnsupportedFamily)
    }
}

impl From<SocketAddr> for SocketAddress {
    fn from(addr: SocketAddr) -> Self {
        match addr {
            SocketAddr::V4(v4) => Self::V4(v4),
            SocketAddr::V6(v6) => Self::V6(v6),
        }
    }
}

impl fmt::Display for SocketAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_user_string())
    }
}
