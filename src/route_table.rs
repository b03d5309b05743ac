use std::collections::BTreeMap;
use std::fmt;
use std::net::Ipv4Addr;
use std::time::{Duration, SystemTime};

use tracing::{debug, error, info, warn};

use crate::route_sink::RouteSink;

/// Identity of one table entry, shown as `network/prefix_len`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RouteKey {
  network:    Ipv4Addr,
  prefix_len: u8,
}

impl RouteKey {
  pub fn new(network: Ipv4Addr, prefix_len: u8) -> RouteKey {
    RouteKey {
      network,
      prefix_len,
    }
  }

  pub fn network(&self) -> Ipv4Addr {
    self.network
  }

  pub fn prefix_len(&self) -> u8 {
    self.prefix_len
  }
}

impl fmt::Display for RouteKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}/{}", self.network, self.prefix_len)
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteState {
  pub next_hop:     Ipv4Addr,
  pub tag:          u16,
  pub last_refresh: SystemTime,
}

/// What `consider` did with an advertisement
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reconcile {
  /// Same next hop and tag, only the timestamp moved
  Refreshed,
  Installed,
  Changed,
}

/// Routes this daemon believes are installed. The in-memory state is
/// authoritative; sink failures never roll it back.
#[derive(Debug, Default)]
pub struct RouteTable {
  table: BTreeMap<RouteKey, RouteState>,
}

impl RouteTable {
  pub fn new() -> RouteTable {
    RouteTable::default()
  }

  /// Reconciles one validated advertisement against the table.
  ///
  /// An identical advertisement only refreshes the entry and makes no sink
  /// calls. Anything else is committed to the table first and then pushed to
  /// the sink as a withdraw followed by an install.
  pub fn consider(
    &mut self,
    key: RouteKey,
    next_hop: Ipv4Addr,
    tag: u16,
    now: SystemTime,
    sink: &mut dyn RouteSink,
  ) -> Reconcile {
    let outcome = match self.table.get_mut(&key) {
      Some(state) if state.next_hop == next_hop && state.tag == tag => {
        state.last_refresh = now;
        return Reconcile::Refreshed;
      }
      Some(state) => {
        info!(
          "route {key} changed: via {} tag {} -> via {next_hop} tag {tag}",
          state.next_hop, state.tag
        );
        state.next_hop = next_hop;
        state.tag = tag;
        state.last_refresh = now;
        Reconcile::Changed
      }
      None => {
        info!("new route {key} via {next_hop} tag {tag}");
        self.table.insert(
          key,
          RouteState {
            next_hop,
            tag,
            last_refresh: now,
          },
        );
        Reconcile::Installed
      }
    };

    // withdrawing a route the kernel never had is expected here
    if let Err(e) = sink.withdraw(key) {
      debug!("withdraw of {key} before install failed: {e:#}");
    }
    if let Err(e) = sink.install(key, next_hop) {
      error!("install of {key} via {next_hop} failed: {e:#}");
    }

    outcome
  }

  /// Withdraws every route not refreshed within `ttl` of `now`. Entries
  /// stamped in the future after a clock jump are pulled back to `now`.
  /// Returns the number of routes expired.
  pub fn expire_routes(&mut self, now: SystemTime, ttl: Duration, sink: &mut dyn RouteSink) -> usize {
    let cutoff = now.checked_sub(ttl);
    let mut expired = Vec::new();

    for (key, state) in self.table.iter_mut() {
      if state.last_refresh > now {
        warn!("route {key} refreshed in the future, clock moved backwards; clamping");
        state.last_refresh = now;
        continue;
      }
      if matches!(cutoff, Some(cutoff) if state.last_refresh < cutoff) {
        expired.push(*key);
      }
    }

    for key in expired.iter() {
      if let Some(state) = self.table.remove(key) {
        info!(
          "route {key} via {} expired, last refreshed {}s ago",
          state.next_hop,
          now
            .duration_since(state.last_refresh)
            .unwrap_or_default()
            .as_secs()
        );
      }
      if let Err(e) = sink.withdraw(*key) {
        error!("withdraw of expired route {key} failed: {e:#}");
      }
    }

    expired.len()
  }

  /// Removes one route and withdraws it from the sink. Returns false if the
  /// key was not in the table.
  pub fn withdraw(&mut self, key: RouteKey, sink: &mut dyn RouteSink) -> bool {
    if self.table.remove(&key).is_none() {
      return false;
    }
    info!("withdrawing route {key}");
    if let Err(e) = sink.withdraw(key) {
      error!("withdraw of {key} failed: {e:#}");
    }
    true
  }

  pub fn get(&self, key: &RouteKey) -> Option<&RouteState> {
    self.table.get(key)
  }

  pub fn routes(&self) -> impl Iterator<Item = (&RouteKey, &RouteState)> {
    self.table.iter()
  }

  pub fn len(&self) -> usize {
    self.table.len()
  }

  pub fn is_empty(&self) -> bool {
    self.table.is_empty()
  }
}
