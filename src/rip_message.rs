use std::net::Ipv4Addr;

use crate::error::RipError;

pub const RIP_PORT: u16 = 520;
pub const RIP_VERSION: u8 = 2;
pub const RIP_MULTICAST_GROUP: Ipv4Addr = Ipv4Addr::new(224, 0, 0, 9);

pub const HEADER_SIZE: usize = 4;
pub const ENTRY_SIZE: usize = 20;
pub const MAX_ENTRIES: usize = 25;

pub const AF_INET: u16 = 2;
pub const AF_AUTH: u16 = 0xffff;
pub const AUTH_TYPE_PASSWORD: u16 = 2;
pub const AUTH_PASSWORD_LEN: usize = 16;

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum RipCommand {
  Request,
  Response,
}

impl From<RipCommand> for u8 {
  fn from(cmd: RipCommand) -> u8 {
    match cmd {
      RipCommand::Request => 1,
      RipCommand::Response => 2,
    }
  }
}

#[derive(Debug)]
pub struct RipMsg {
  pub command: RipCommand,
  pub version: u8,
  /// Raw entries in wire order, not yet split into routes and auth
  pub entries: Vec<RipEntry>,
}

/// One 20 byte record. For auth entries `route_tag` carries the auth type and
/// `data` the null padded password.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RipEntry {
  pub address_family: u16,
  pub route_tag: u16,
  data: [u8; 16],
}

/// A decoded IPv4 route record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RouteEntry {
  pub tag: u16,
  pub network: Ipv4Addr,
  pub mask: Ipv4Addr,
  pub next_hop: Ipv4Addr,
  pub metric: u32,
}

impl RipMsg {
  pub fn unpack(bytes: &[u8]) -> Result<RipMsg, RipError> {
    let len = bytes.len();
    if len < HEADER_SIZE + ENTRY_SIZE {
      return Err(RipError::TooShort(len));
    }
    if len > HEADER_SIZE + MAX_ENTRIES * ENTRY_SIZE {
      return Err(RipError::TooLong(len));
    }
    if (len - HEADER_SIZE) % ENTRY_SIZE != 0 {
      return Err(RipError::MisalignedLength(len));
    }

    let command = match bytes[0] {
      2 => RipCommand::Response,
      other => return Err(RipError::UnsupportedCommand(other)),
    };
    let version = bytes[1];
    if version != RIP_VERSION {
      return Err(RipError::UnsupportedVersion(version));
    }
    if bytes[2] != 0 || bytes[3] != 0 {
      return Err(RipError::NonZeroReserved(bytes[2], bytes[3]));
    }

    let entries = bytes[HEADER_SIZE..]
      .chunks_exact(ENTRY_SIZE)
      .map(RipEntry::unpack)
      .collect();

    Ok(RipMsg {
      command,
      version,
      entries,
    })
  }

  pub fn pack(&self) -> Vec<u8> {
    let mut buffer = Vec::with_capacity(HEADER_SIZE + self.entries.len() * ENTRY_SIZE);
    buffer.push(self.command.into());
    buffer.push(self.version);
    buffer.extend_from_slice(&[0, 0]);
    for entry in self.entries.iter() {
      buffer.extend_from_slice(&entry.pack());
    }
    buffer
  }
}

fn read_u32(bytes: &[u8]) -> u32 {
  u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
}

impl RipEntry {
  /// Caller guarantees `bytes` is exactly ENTRY_SIZE long
  fn unpack(bytes: &[u8]) -> RipEntry {
    let mut data = [0u8; 16];
    data.copy_from_slice(&bytes[4..ENTRY_SIZE]);
    RipEntry {
      address_family: u16::from_be_bytes([bytes[0], bytes[1]]),
      route_tag: u16::from_be_bytes([bytes[2], bytes[3]]),
      data,
    }
  }

  pub fn pack(&self) -> [u8; ENTRY_SIZE] {
    let mut buffer = [0u8; ENTRY_SIZE];
    buffer[0..2].copy_from_slice(&self.address_family.to_be_bytes());
    buffer[2..4].copy_from_slice(&self.route_tag.to_be_bytes());
    buffer[4..].copy_from_slice(&self.data);
    buffer
  }

  pub fn new_route(route: RouteEntry) -> RipEntry {
    let mut data = [0u8; 16];
    data[0..4].copy_from_slice(&route.network.octets());
    data[4..8].copy_from_slice(&route.mask.octets());
    data[8..12].copy_from_slice(&route.next_hop.octets());
    data[12..16].copy_from_slice(&route.metric.to_be_bytes());
    RipEntry {
      address_family: AF_INET,
      route_tag: route.tag,
      data,
    }
  }

  /// Simple password auth entry; passwords longer than 16 bytes are truncated
  pub fn new_auth(password: &[u8]) -> RipEntry {
    let mut data = [0u8; 16];
    let len = password.len().min(AUTH_PASSWORD_LEN);
    data[..len].copy_from_slice(&password[..len]);
    RipEntry {
      address_family: AF_AUTH,
      route_tag: AUTH_TYPE_PASSWORD,
      data,
    }
  }

  pub fn is_auth(&self) -> bool {
    self.address_family == AF_AUTH
  }

  pub fn auth_type(&self) -> Option<u16> {
    self.is_auth().then_some(self.route_tag)
  }

  /// Auth payload with trailing nulls stripped, None for non-auth entries
  pub fn auth_password(&self) -> Option<&[u8]> {
    if !self.is_auth() {
      return None;
    }
    let end = self
      .data
      .iter()
      .rposition(|b| *b != 0)
      .map_or(0, |i| i + 1);
    Some(&self.data[..end])
  }

  /// Interprets the entry as an IPv4 route. Auth entries and other address
  /// families yield None.
  pub fn as_route(&self) -> Option<RouteEntry> {
    if self.address_family != AF_INET {
      return None;
    }
    Some(RouteEntry {
      tag: self.route_tag,
      network: Ipv4Addr::from(read_u32(&self.data[0..4])),
      mask: Ipv4Addr::from(read_u32(&self.data[4..8])),
      next_hop: Ipv4Addr::from(read_u32(&self.data[8..12])),
      metric: read_u32(&self.data[12..16]),
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use rand::Rng;

  fn response(entries: Vec<RipEntry>) -> Vec<u8> {
    RipMsg {
      command: RipCommand::Response,
      version: RIP_VERSION,
      entries,
    }
    .pack()
  }

  fn sample_route() -> RouteEntry {
    RouteEntry {
      tag: 7,
      network: Ipv4Addr::new(44, 1, 0, 0),
      mask: Ipv4Addr::new(255, 255, 0, 0),
      next_hop: Ipv4Addr::new(203, 0, 113, 1),
      metric: 1,
    }
  }

  #[test]
  fn test_short_buffers_rejected() {
    let mut rng = rand::thread_rng();
    for len in 0..HEADER_SIZE + ENTRY_SIZE {
      let mut buf = vec![0u8; len];
      rng.fill(&mut buf[..]);
      assert_eq!(RipMsg::unpack(&buf).unwrap_err(), RipError::TooShort(len));
    }
  }

  #[test]
  fn test_misaligned_buffers_rejected() {
    let mut rng = rand::thread_rng();
    for _ in 0..200 {
      let len = rng.gen_range(HEADER_SIZE + ENTRY_SIZE..=HEADER_SIZE + MAX_ENTRIES * ENTRY_SIZE);
      if (len - HEADER_SIZE) % ENTRY_SIZE == 0 {
        continue;
      }
      let mut buf = vec![0u8; len];
      rng.fill(&mut buf[..]);
      assert_eq!(
        RipMsg::unpack(&buf).unwrap_err(),
        RipError::MisalignedLength(len)
      );
    }
  }

  #[test]
  fn test_too_long() {
    let entries = vec![RipEntry::new_route(sample_route()); MAX_ENTRIES + 1];
    let buf = response(entries);
    assert_eq!(RipMsg::unpack(&buf).unwrap_err(), RipError::TooLong(buf.len()));

    let entries = vec![RipEntry::new_route(sample_route()); MAX_ENTRIES];
    assert_eq!(RipMsg::unpack(&response(entries)).unwrap().entries.len(), MAX_ENTRIES);
  }

  #[test]
  fn test_header_checks() {
    let good = response(vec![RipEntry::new_route(sample_route())]);

    let mut request = good.clone();
    request[0] = 1;
    assert_eq!(
      RipMsg::unpack(&request).unwrap_err(),
      RipError::UnsupportedCommand(1)
    );

    let mut v1 = good.clone();
    v1[1] = 1;
    assert_eq!(RipMsg::unpack(&v1).unwrap_err(), RipError::UnsupportedVersion(1));

    let mut reserved = good.clone();
    reserved[3] = 0x80;
    assert_eq!(
      RipMsg::unpack(&reserved).unwrap_err(),
      RipError::NonZeroReserved(0, 0x80)
    );
  }

  #[test]
  fn test_decode_route_entry() {
    let mut buf = vec![2, 2, 0, 0];
    buf.extend_from_slice(&[0, 2, 0, 7]);
    buf.extend_from_slice(&[44, 1, 0, 0]);
    buf.extend_from_slice(&[255, 255, 0, 0]);
    buf.extend_from_slice(&[203, 0, 113, 1]);
    buf.extend_from_slice(&[0, 0, 0, 1]);

    let msg = RipMsg::unpack(&buf).unwrap();
    assert_eq!(msg.command, RipCommand::Response);
    assert_eq!(msg.entries.len(), 1);
    let entry = &msg.entries[0];
    assert!(!entry.is_auth());
    assert_eq!(entry.as_route(), Some(sample_route()));
    assert_eq!(entry.as_route().unwrap().network.to_string(), "44.1.0.0");
    assert_eq!(entry.pack().as_slice(), &buf[4..]);
  }

  #[test]
  fn test_decode_auth_entry() {
    let mut buf = vec![2, 2, 0, 0, 0xff, 0xff, 0, 2];
    let mut password = [0u8; 16];
    password[..6].copy_from_slice(b"secret");
    buf.extend_from_slice(&password);

    let msg = RipMsg::unpack(&buf).unwrap();
    let entry = &msg.entries[0];
    assert!(entry.is_auth());
    assert_eq!(entry.auth_type(), Some(AUTH_TYPE_PASSWORD));
    assert_eq!(entry.auth_password(), Some(&b"secret"[..]));
    assert_eq!(entry.as_route(), None);
    assert_eq!(*entry, RipEntry::new_auth(b"secret"));
  }

  #[test]
  fn test_other_address_family_is_not_a_route() {
    let mut entry = RipEntry::new_route(sample_route());
    entry.address_family = 10;
    assert!(!entry.is_auth());
    assert_eq!(entry.as_route(), None);
    assert_eq!(entry.auth_password(), None);
  }
}
