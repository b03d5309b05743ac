use std::net::Ipv4Addr;

/// Converts a netmask into its prefix length. Returns None unless the mask is
/// a run of ones followed only by zeros.
pub fn mask_to_prefix(mask: u32) -> Option<u8> {
  let prefix = mask.leading_ones();
  // everything after the leading ones must be zero
  if prefix < 32 && mask << prefix != 0 {
    return None;
  }
  Some(prefix as u8)
}

/// Builds the netmask for a prefix length, saturating above 32
pub fn prefix_to_mask(prefix_len: u8) -> u32 {
  match prefix_len {
    0 => 0,
    p if p >= 32 => u32::MAX,
    p => u32::MAX << (32 - p),
  }
}

pub fn ip_to_u32(addr: Ipv4Addr) -> u32 {
  u32::from_be_bytes(addr.octets())
}
