use std::collections::HashSet;
use std::fmt;
use std::net::Ipv4Addr;

use ipnetwork::Ipv4Network;

use crate::route_table::RouteKey;
use crate::subnet::{ip_to_u32, mask_to_prefix};

pub const DEFAULT_MIN_PREFIX_LEN: u8 = 14;

/// Why a single advertised route was skipped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
  UnsupportedAddressFamily(u16),
  InvalidNetmask,
  PrefixTooShort(u8),
  InvalidSubnetMaskPair,
  NetNotManaged,
  NexthopInManagedNet,
  NexthopIsLocalGateway,
}

impl fmt::Display for RejectReason {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      RejectReason::UnsupportedAddressFamily(af) => write!(f, "unsupported address family {af}"),
      RejectReason::InvalidNetmask => write!(f, "invalid netmask"),
      RejectReason::PrefixTooShort(len) => write!(f, "prefix length /{len} too short"),
      RejectReason::InvalidSubnetMaskPair => write!(f, "network is not the base of its subnet"),
      RejectReason::NetNotManaged => write!(f, "network not in managed range"),
      RejectReason::NexthopInManagedNet => write!(f, "next hop inside managed range"),
      RejectReason::NexthopIsLocalGateway => write!(f, "next hop is a local address"),
    }
  }
}

/// Addresses owned by this host, never accepted as a next hop
#[derive(Debug, Default, Clone)]
pub struct LocalAddressSet(HashSet<Ipv4Addr>);

impl LocalAddressSet {
  pub fn new() -> LocalAddressSet {
    LocalAddressSet::default()
  }

  pub fn insert(&mut self, addr: Ipv4Addr) -> bool {
    self.0.insert(addr)
  }

  pub fn contains(&self, addr: &Ipv4Addr) -> bool {
    self.0.contains(addr)
  }

  pub fn len(&self) -> usize {
    self.0.len()
  }

  pub fn is_empty(&self) -> bool {
    self.0.is_empty()
  }
}

impl FromIterator<Ipv4Addr> for LocalAddressSet {
  fn from_iter<I: IntoIterator<Item = Ipv4Addr>>(iter: I) -> Self {
    LocalAddressSet(iter.into_iter().collect())
  }
}

#[derive(Debug, Clone)]
pub struct RouteValidator {
  pub min_prefix_len: u8,
  pub managed_net:    Ipv4Network,
  pub local_addrs:    LocalAddressSet,
}

impl RouteValidator {
  pub fn new(
    min_prefix_len: u8,
    managed_net: Ipv4Network,
    local_addrs: LocalAddressSet,
  ) -> RouteValidator {
    RouteValidator {
      min_prefix_len,
      managed_net,
      local_addrs,
    }
  }

  /// Runs the safety checks in order and stops at the first failure. On
  /// success returns the key the route would be stored under.
  pub fn validate(
    &self,
    network: Ipv4Addr,
    mask: Ipv4Addr,
    next_hop: Ipv4Addr,
  ) -> Result<RouteKey, RejectReason> {
    let mask_bits = ip_to_u32(mask);
    let prefix_len = mask_to_prefix(mask_bits).ok_or(RejectReason::InvalidNetmask)?;

    if prefix_len < self.min_prefix_len {
      return Err(RejectReason::PrefixTooShort(prefix_len));
    }

    if ip_to_u32(network) & mask_bits != ip_to_u32(network) {
      return Err(RejectReason::InvalidSubnetMaskPair);
    }

    // the whole advertised prefix has to sit inside the managed range
    if !self.managed_net.contains(network) || prefix_len < self.managed_net.prefix() {
      return Err(RejectReason::NetNotManaged);
    }

    if self.managed_net.contains(next_hop) {
      return Err(RejectReason::NexthopInManagedNet);
    }

    if self.local_addrs.contains(&next_hop) {
      return Err(RejectReason::NexthopIsLocalGateway);
    }

    Ok(RouteKey::new(network, prefix_len))
  }
}
