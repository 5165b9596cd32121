//! Translation between allocation store keys, routing daemon prefixes and
//! the host address identity both loops reconcile on.
//!
//! The allocation store records a host's addresses as keys below
//! `<root>/<hostname>/ipv4/block/`. The last path segment carries the address,
//! optionally followed by its mask. Because `/` separates path segments the
//! store writes the mask delimiter as `-`:
//!
//! ```text
//! /calico/ipam/v2/host/node1/ipv4/block/10.0.0.7-26   ->  10.0.0.7
//! ```
//!
//! The routing daemon reports CIDR strings. Only full host masks (/32, /128)
//! are single-host routes this agent manages; anything else is ignored.


use std::fmt;
use std::net::IpAddr;
use std::net::Ipv4Addr;
use std::net::Ipv6Addr;
use std::str::FromStr;

use crate::constants::IPV4_BLOCK_SEGMENT;
use crate::constants::IPV4_HOST_PREFIX_LEN;
use crate::constants::IPV6_HOST_PREFIX_LEN;
use crate::constants::KEY_MASK_DELIMITER;

/// A normalized host address without prefix length.
///
/// Equality is address equality, which coincides with equality of the
/// canonical string form produced by [`fmt::Display`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IpIdentity(IpAddr);

impl IpIdentity {
    pub fn new(addr: IpAddr) -> Self {
        Self(addr)
    }

    pub fn addr(&self) -> IpAddr {
        self.0
    }

    pub fn is_ipv4(&self) -> bool {
        self.0.is_ipv4()
    }

    /// Prefix length of a route that covers exactly this address
    pub fn host_prefix_len(&self) -> u8 {
        match self.0 {
            IpAddr::V4(_) => IPV4_HOST_PREFIX_LEN,
            IpAddr::V6(_) => IPV6_HOST_PREFIX_LEN,
        }
    }
}

impl fmt::Display for IpIdentity {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<IpAddr> for IpIdentity {
    fn from(addr: IpAddr) -> Self {
        Self(addr)
    }
}

impl From<Ipv4Addr> for IpIdentity {
    fn from(addr: Ipv4Addr) -> Self {
        Self(IpAddr::V4(addr))
    }
}

impl From<Ipv6Addr> for IpIdentity {
    fn from(addr: Ipv6Addr) -> Self {
        Self(IpAddr::V6(addr))
    }
}

impl FromStr for IpIdentity {
    type Err = std::net::AddrParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse::<IpAddr>().map(Self)
    }
}

/// Builds the host scoped key prefix `<ipam_root>/<hostname>/ipv4/block/`.
pub fn host_prefix(
    ipam_root: &str,
    hostname: &str,
) -> String {
    format!(
        "{}/{}/{}/",
        ipam_root.trim_end_matches('/'),
        hostname.trim_matches('/'),
        IPV4_BLOCK_SEGMENT
    )
}

/// Stateless key and prefix codec.
#[derive(Debug, Clone, Copy, Default)]
pub struct KeyCodec;

impl KeyCodec {
    /// Decodes a raw allocation store key into the address it records.
    ///
    /// The host prefix is stripped, the `-` mask delimiter is turned back into
    /// `/` and the mask is discarded. Returns `None` for keys that carry no
    /// recognizable address; callers must skip those.
    pub fn decode(
        raw_key: &str,
        host_prefix: &str,
    ) -> Option<IpIdentity> {
        let remainder = raw_key.strip_prefix(host_prefix).unwrap_or(raw_key);

        // The address always lives in the last path segment
        let segment = remainder.rsplit('/').next()?;
        let network = segment.replace(KEY_MASK_DELIMITER, "/");
        let address = network.split('/').next()?;
        if address.is_empty() {
            return None;
        }

        address.parse::<IpIdentity>().ok()
    }

    /// Decodes a CIDR reported by the routing daemon.
    ///
    /// Returns `None` when the CIDR cannot be parsed or its mask is not a full
    /// host mask for the address family.
    pub fn decode_announced(cidr: &str) -> Option<IpIdentity> {
        let (address, prefix_len) = cidr.trim().split_once('/')?;
        let ip = address.parse::<IpIdentity>().ok()?;
        let prefix_len = prefix_len.parse::<u8>().ok()?;

        if prefix_len != ip.host_prefix_len() {
            return None;
        }
        Some(ip)
    }

    /// Encodes an address, optionally with its block mask, as a key below
    /// `host_prefix`. This is the inverse of [`KeyCodec::decode`].
    pub fn encode(
        host_prefix: &str,
        ip: IpIdentity,
        mask: Option<u8>,
    ) -> String {
        match mask {
            Some(mask) => format!("{host_prefix}{ip}{KEY_MASK_DELIMITER}{mask}"),
            None => format!("{host_prefix}{ip}"),
        }
    }
}
