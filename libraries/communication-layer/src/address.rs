use std::{fmt, str::FromStr};

const TCP_SCHEME: &str = "tcp://";
const MEMORY_SCHEME: &str = "mem://";

/// Transport address of a port.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PortAddress {
    /// A `host:port` pair, written as `tcp://host:port` or just `host:port`.
    Tcp(String),
    /// A named in-process channel, written as `mem://name`.
    Memory(String),
}

/// Error returned when parsing a [`PortAddress`] fails.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AddressError {
    /// The address was empty or only whitespace.
    #[error("address is empty")]
    Empty,
    /// The address uses a scheme other than `tcp://` or `mem://`.
    #[error("unsupported address scheme in `{0}`")]
    UnsupportedScheme(String),
    /// A TCP address without a port.
    #[error("`{0}` is not a valid `host:port` address")]
    MissingPort(String),
}

impl FromStr for PortAddress {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(AddressError::Empty);
        }
        if let Some(name) = s.strip_prefix(MEMORY_SCHEME) {
            if name.is_empty() {
                return Err(AddressError::Empty);
            }
            return Ok(PortAddress::Memory(name.to_owned()));
        }
        let host_port = match s.strip_prefix(TCP_SCHEME) {
            Some(rest) => rest,
            None if s.contains("://") => return Err(AddressError::UnsupportedScheme(s.to_owned())),
            None => s,
        };
        match host_port.rsplit_once(':') {
            Some((host, port)) if !host.is_empty() && port.parse::<u16>().is_ok() => {
                Ok(PortAddress::Tcp(host_port.to_owned()))
            }
            _ => Err(AddressError::MissingPort(s.to_owned())),
        }
    }
}

impl fmt::Display for PortAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PortAddress::Tcp(host_port) => write!(f, "{TCP_SCHEME}{host_port}"),
            PortAddress::Memory(name) => write!(f, "{MEMORY_SCHEME}{name}"),
        }
    }
}
