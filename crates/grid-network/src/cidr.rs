//! Overlay CIDR parsing.

use std::fmt;
use std::net::Ipv4Addr;

use grid_common::{GridError, GridResult};

/// Prefix length every overlay address is attached with.
///
/// Containers created by older agents may carry a narrower prefix
/// (e.g. `/19`); those are re-attached under this one.
pub const CANONICAL_PREFIX_LEN: u8 = 16;

/// An IPv4 address with its prefix length, e.g. `10.81.1.1/16`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OverlayCidr {
    /// Host address.
    pub ip: Ipv4Addr,
    /// Prefix length (0-32).
    pub prefix_len: u8,
}

impl OverlayCidr {
    /// Address `ip` under `prefix_len`.
    #[must_use]
    pub const fn new(ip: Ipv4Addr, prefix_len: u8) -> Self {
        Self { ip, prefix_len }
    }

    /// Parse `a.b.c.d/n`.
    pub fn parse(value: &str) -> GridResult<Self> {
        let invalid = || GridError::InvalidCidr {
            value: value.to_string(),
        };

        let (ip, prefix) = value.trim().split_once('/').ok_or_else(invalid)?;
        let ip: Ipv4Addr = ip.parse().map_err(|_| invalid())?;
        let prefix_len: u8 = prefix.parse().map_err(|_| invalid())?;
        if prefix_len > 32 {
            return Err(invalid());
        }

        Ok(Self { ip, prefix_len })
    }

    /// Same address under [`CANONICAL_PREFIX_LEN`].
    #[must_use]
    pub const fn canonical(self) -> Self {
        Self {
            ip: self.ip,
            prefix_len: CANONICAL_PREFIX_LEN,
        }
    }
}

impl fmt::Display for OverlayCidr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.ip, self.prefix_len)
    }
}
