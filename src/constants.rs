// -
// Allocation store key layout

/// Default root under which the IPAM allocator records per-host blocks
pub(crate) const DEFAULT_IPAM_ROOT: &str = "/calico/ipam/v2/host";

/// Path segment between the hostname and the encoded address
pub(crate) const IPV4_BLOCK_SEGMENT: &str = "ipv4/block";

/// Store keys cannot carry `/` inside a segment, so masks are written as `-`
pub(crate) const KEY_MASK_DELIMITER: char = '-';

// -
// Routing daemon path attributes

pub(crate) const DEFAULT_NEXT_HOP: &str = "0.0.0.0";

/// BGP ORIGIN attribute value IGP
pub(crate) const ORIGIN_IGP: u32 = 0;

pub(crate) const IPV4_HOST_PREFIX_LEN: u8 = 32;
pub(crate) const IPV6_HOST_PREFIX_LEN: u8 = 128;

pub(crate) const ANY_TYPE_URL_PREFIX: &str = "type.googleapis.com/";

// -
// Log file

pub(crate) const LOG_FILE_NAME: &str = "bgp-agent.log";
