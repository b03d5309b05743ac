use std::collections::HashSet;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::SystemTime;

use tracing::{debug, info};

use crate::auth::{check_auth, Secret};
use crate::error::RipError;
use crate::rip_message::{RipMsg, RIP_PORT};
use crate::route_sink::RouteSink;
use crate::route_table::RouteTable;
use crate::validator::{RejectReason, RouteValidator};

/// Which senders are listened to at all
#[derive(Debug, Clone)]
pub struct SourcePolicy {
  /// Responses must come from this UDP port, RFC 2453 3.9.2
  pub required_port: Option<u16>,
  /// Empty means any address
  pub trusted:       HashSet<Ipv4Addr>,
}

impl Default for SourcePolicy {
  fn default() -> SourcePolicy {
    SourcePolicy {
      required_port: Some(RIP_PORT),
      trusted:       HashSet::new(),
    }
  }
}

impl SourcePolicy {
  pub fn permits(&self, source: SocketAddr) -> bool {
    if matches!(self.required_port, Some(port) if port != source.port()) {
      return false;
    }
    if self.trusted.is_empty() {
      return true;
    }
    match source.ip() {
      IpAddr::V4(addr) => self.trusted.contains(&addr),
      IpAddr::V6(_) => false,
    }
  }
}

/// Turns raw RIP datagrams into route table updates
#[derive(Debug, Clone)]
pub struct Processor {
  pub secret:    Option<Secret>,
  pub sources:   SourcePolicy,
  pub validator: RouteValidator,
}

impl Processor {
  pub fn new(secret: Option<Secret>, sources: SourcePolicy, validator: RouteValidator) -> Processor {
    Processor {
      secret,
      sources,
      validator,
    }
  }

  /// Processes one datagram and returns how many routes it carried that passed
  /// validation. Only whole-message problems are errors; rejected entries are
  /// logged and skipped.
  pub fn process_message(
    &self,
    source: SocketAddr,
    raw: &[u8],
    table: &mut RouteTable,
    sink: &mut dyn RouteSink,
    now: SystemTime,
  ) -> Result<usize, RipError> {
    if !self.sources.permits(source) {
      return Err(RipError::UntrustedSource(source));
    }

    let msg = RipMsg::unpack(raw)?;
    let mut entries = msg.entries.iter().enumerate();

    if let Some(secret) = &self.secret {
      let first = match entries.next() {
        Some((_, entry)) if entry.is_auth() => entry,
        _ => return Err(RipError::AuthRequired),
      };
      if !check_auth(first, secret) {
        return Err(RipError::AuthMismatch);
      }
    }

    let mut accepted = 0;
    for (i, entry) in entries {
      if entry.is_auth() {
        debug!("{source}: skipping auth entry at index {i}");
        continue;
      }

      let route = match entry.as_route() {
        Some(route) => route,
        None => {
          info!(
            "{source}: entry {i} rejected: {}",
            RejectReason::UnsupportedAddressFamily(entry.address_family)
          );
          continue;
        }
      };

      match self
        .validator
        .validate(route.network, route.mask, route.next_hop)
      {
        Ok(key) => {
          debug!(
            "{source}: entry {i} {key} via {} tag {} metric {}",
            route.next_hop, route.tag, route.metric
          );
          table.consider(key, route.next_hop, route.tag, now, sink);
          accepted += 1;
        }
        Err(reason) => info!(
          "{source}: entry {i} {}/{} via {} rejected: {reason}",
          route.network, route.mask, route.next_hop
        ),
      }
    }

    debug!(
      "{source}: {accepted} of {} entries accepted, {} routes in table",
      msg.entries.len(),
      table.len()
    );
    Ok(accepted)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::rip_message::{RipCommand, RipEntry, RouteEntry, RIP_VERSION};
  use crate::route_sink::tests::{RecordingSink, SinkCall};
  use crate::route_table::RouteKey;
  use crate::validator::{LocalAddressSet, DEFAULT_MIN_PREFIX_LEN};

  fn ip(s: &str) -> Ipv4Addr {
    s.parse().unwrap()
  }

  fn upstream() -> SocketAddr {
    "192.0.2.100:520".parse().unwrap()
  }

  fn processor(secret: Option<&str>) -> Processor {
    Processor::new(
      secret.map(|s| Secret::new(s).unwrap()),
      SourcePolicy::default(),
      RouteValidator::new(
        DEFAULT_MIN_PREFIX_LEN,
        "44.0.0.0/8".parse().unwrap(),
        LocalAddressSet::from_iter([ip("198.51.100.7")]),
      ),
    )
  }

  fn route(network: &str, mask: &str, next_hop: &str) -> RipEntry {
    RipEntry::new_route(RouteEntry {
      tag: 0,
      network: ip(network),
      mask: ip(mask),
      next_hop: ip(next_hop),
      metric: 1,
    })
  }

  fn datagram(entries: Vec<RipEntry>) -> Vec<u8> {
    RipMsg {
      command: RipCommand::Response,
      version: RIP_VERSION,
      entries,
    }
    .pack()
  }

  fn run(p: &Processor, raw: &[u8]) -> (Result<usize, RipError>, RouteTable, RecordingSink) {
    let mut table = RouteTable::new();
    let mut sink = RecordingSink::default();
    let res = p.process_message(upstream(), raw, &mut table, &mut sink, SystemTime::now());
    (res, table, sink)
  }

  #[test]
  fn test_single_route_installed() {
    let raw = datagram(vec![route("44.1.0.0", "255.255.0.0", "203.0.113.1")]);
    let (res, table, sink) = run(&processor(None), &raw);
    let key = RouteKey::new(ip("44.1.0.0"), 16);
    assert_eq!(res, Ok(1));
    assert_eq!(
      sink.calls,
      vec![
        SinkCall::Withdraw(key),
        SinkCall::Install(key, ip("203.0.113.1"))
      ]
    );
    assert_eq!(table.get(&key).unwrap().next_hop, ip("203.0.113.1"));
  }

  #[test]
  fn test_auth_required_but_missing() {
    let raw = datagram(vec![route("44.1.0.0", "255.255.0.0", "203.0.113.1")]);
    let (res, table, sink) = run(&processor(Some("secret")), &raw);
    assert_eq!(res, Err(RipError::AuthRequired));
    assert!(sink.calls.is_empty());
    assert!(table.is_empty());
  }

  #[test]
  fn test_auth_mismatch() {
    let raw = datagram(vec![
      RipEntry::new_auth(b"wrong"),
      route("44.1.0.0", "255.255.0.0", "203.0.113.1"),
    ]);
    let (res, _, sink) = run(&processor(Some("secret")), &raw);
    assert_eq!(res, Err(RipError::AuthMismatch));
    assert!(sink.calls.is_empty());
  }

  #[test]
  fn test_authenticated_message() {
    let raw = datagram(vec![
      RipEntry::new_auth(b"secret"),
      route("44.1.0.0", "255.255.0.0", "203.0.113.1"),
      route("44.2.0.0", "255.255.0.0", "203.0.113.2"),
    ]);
    let (res, table, _) = run(&processor(Some("secret")), &raw);
    assert_eq!(res, Ok(2));
    assert_eq!(table.len(), 2);
  }

  #[test]
  fn test_misplaced_auth_entries_are_skipped() {
    let raw = datagram(vec![
      RipEntry::new_auth(b"secret"),
      route("44.1.0.0", "255.255.0.0", "203.0.113.1"),
      RipEntry::new_auth(b"secret"),
    ]);
    let (res, _, _) = run(&processor(Some("secret")), &raw);
    assert_eq!(res, Ok(1));

    // without a configured secret auth entries are never consulted
    let (res, table, _) = run(&processor(None), &raw);
    assert_eq!(res, Ok(1));
    assert_eq!(table.len(), 1);
  }

  #[test]
  fn test_rejected_entries_reduce_count() {
    let raw = datagram(vec![
      route("44.1.0.0", "255.255.0.0", "203.0.113.1"),
      route("10.0.0.0", "255.255.255.0", "203.0.113.1"),
      route("44.3.0.0", "255.255.0.0", "44.9.9.9"),
      route("44.4.0.0", "255.255.0.0", "198.51.100.7"),
      route("44.0.0.0", "255.248.0.0", "203.0.113.1"),
    ]);
    let (res, table, sink) = run(&processor(None), &raw);
    assert_eq!(res, Ok(1));
    assert_eq!(table.len(), 1);
    assert_eq!(sink.calls.len(), 2);
  }

  #[test]
  fn test_unknown_address_family_skipped() {
    let mut odd = route("44.1.0.0", "255.255.0.0", "203.0.113.1");
    odd.address_family = 10;
    let raw = datagram(vec![odd, route("44.2.0.0", "255.255.0.0", "203.0.113.1")]);
    let (res, table, _) = run(&processor(None), &raw);
    assert_eq!(res, Ok(1));
    assert!(table.get(&RouteKey::new(ip("44.2.0.0"), 16)).is_some());
  }

  #[test]
  fn test_structural_error_installs_nothing() {
    let mut raw = datagram(vec![route("44.1.0.0", "255.255.0.0", "203.0.113.1")]);
    raw[1] = 1;
    let (res, table, sink) = run(&processor(None), &raw);
    assert_eq!(res, Err(RipError::UnsupportedVersion(1)));
    assert!(table.is_empty());
    assert!(sink.calls.is_empty());
  }

  #[test]
  fn test_source_policy() {
    let raw = datagram(vec![route("44.1.0.0", "255.255.0.0", "203.0.113.1")]);
    let mut p = processor(None);
    let mut table = RouteTable::new();
    let mut sink = RecordingSink::default();
    let wrong_port: SocketAddr = "192.0.2.100:5200".parse().unwrap();
    assert_eq!(
      p.process_message(wrong_port, &raw, &mut table, &mut sink, SystemTime::now()),
      Err(RipError::UntrustedSource(wrong_port))
    );

    p.sources.trusted.insert(ip("192.0.2.1"));
    assert_eq!(
      p.process_message(upstream(), &raw, &mut table, &mut sink, SystemTime::now()),
      Err(RipError::UntrustedSource(upstream()))
    );
    let trusted: SocketAddr = "192.0.2.1:520".parse().unwrap();
    assert_eq!(
      p.process_message(trusted, &raw, &mut table, &mut sink, SystemTime::now()),
      Ok(1)
    );

    p.sources.required_port = None;
    let any_port: SocketAddr = "192.0.2.1:40000".parse().unwrap();
    assert!(p.sources.permits(any_port));
  }
}
