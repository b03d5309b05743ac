use std::collections::HashSet;
use std::net::{Ipv4Addr, SocketAddrV4};
use std::time::Duration;

use anyhow::{anyhow, Result};
use clap::Parser;
use ipnetwork::Ipv4Network;

use crate::auth::Secret;
use crate::processor::{Processor, SourcePolicy};
use crate::rip_message::{RIP_MULTICAST_GROUP, RIP_PORT};
use crate::route_sink::{DryRunSink, IpRouteSink, RouteSink};
use crate::validator::{LocalAddressSet, RouteValidator};

#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
pub struct Args {
  /// Tunnel interface learned routes are installed on
  #[clap(short, long, default_value = "tunl0")]
  pub interface: String,

  /// RIPv2 simple password, at most 16 bytes
  #[clap(short, long, env = "RIPD44_PASSWORD", hide_env_values = true)]
  pub password: Option<String>,

  /// Local addresses never accepted as a next hop, repeatable or comma separated
  #[clap(short = 'a', long = "local-address", use_value_delimiter = true)]
  pub local_addresses: Vec<Ipv4Addr>,

  /// Shortest prefix accepted
  #[clap(long, default_value = "14")]
  pub min_prefix_len: u8,

  /// Range routes may be installed for
  #[clap(long, default_value = "44.0.0.0/8")]
  pub managed_net: Ipv4Network,

  /// Seconds a route is kept without being re-advertised
  #[clap(long, default_value = "604800")]
  pub route_ttl: u64,

  /// Minimum seconds between expiry sweeps
  #[clap(long, default_value = "3600")]
  pub expire_interval: u64,

  /// Routing table to install into
  #[clap(short, long, default_value = "44")]
  pub table: u32,

  /// Command used to change routes, may include a wrapper like sudo
  #[clap(long, default_value = "ip")]
  pub ip_command: String,

  #[clap(long, default_value = "0.0.0.0:520")]
  pub listen: SocketAddrV4,

  #[clap(long, default_value = "224.0.0.9")]
  pub multicast_group: Ipv4Addr,

  /// Local address of the interface to join the multicast group on
  #[clap(long, default_value = "0.0.0.0")]
  pub multicast_interface: Ipv4Addr,

  /// Only accept advertisements from these addresses, repeatable
  #[clap(long = "trusted-source", use_value_delimiter = true)]
  pub trusted_sources: Vec<Ipv4Addr>,

  /// Log route changes instead of applying them
  #[clap(long)]
  pub dry_run: bool,

  #[clap(short, long)]
  pub verbose: bool,
}

#[derive(Debug, Clone)]
pub struct Config {
  pub interface:           String,
  pub secret:              Option<Secret>,
  pub local_addresses:     LocalAddressSet,
  pub min_prefix_len:      u8,
  pub managed_net:         Ipv4Network,
  pub route_ttl:           Duration,
  pub expire_interval:     Duration,
  pub table:               u32,
  pub ip_command:          String,
  pub listen:              SocketAddrV4,
  pub multicast_group:     Ipv4Addr,
  pub multicast_interface: Ipv4Addr,
  pub trusted_sources:     HashSet<Ipv4Addr>,
  pub dry_run:             bool,
  pub verbose:             bool,
}

impl TryFrom<Args> for Config {
  type Error = anyhow::Error;

  fn try_from(args: Args) -> Result<Config> {
    let secret = args.password.as_deref().map(Secret::new).transpose()?;

    if args.min_prefix_len > 32 {
      return Err(anyhow!(
        "min-prefix-len must be at most 32, got {}",
        args.min_prefix_len
      ));
    }
    if args.route_ttl == 0 {
      return Err(anyhow!("route-ttl must be positive"));
    }
    if args.expire_interval == 0 {
      return Err(anyhow!("expire-interval must be positive"));
    }
    if !args.multicast_group.is_multicast() {
      return Err(anyhow!(
        "{} is not a multicast group",
        args.multicast_group
      ));
    }

    Ok(Config {
      interface: args.interface,
      secret,
      local_addresses: args.local_addresses.into_iter().collect(),
      min_prefix_len: args.min_prefix_len,
      managed_net: args.managed_net,
      route_ttl: Duration::from_secs(args.route_ttl),
      expire_interval: Duration::from_secs(args.expire_interval),
      table: args.table,
      ip_command: args.ip_command,
      listen: args.listen,
      multicast_group: args.multicast_group,
      multicast_interface: args.multicast_interface,
      trusted_sources: args.trusted_sources.into_iter().collect(),
      dry_run: args.dry_run,
      verbose: args.verbose,
    })
  }
}

impl Config {
  pub fn processor(&self) -> Processor {
    Processor::new(
      self.secret.clone(),
      SourcePolicy {
        required_port: Some(RIP_PORT),
        trusted:       self.trusted_sources.clone(),
      },
      RouteValidator::new(
        self.min_prefix_len,
        self.managed_net,
        self.local_addresses.clone(),
      ),
    )
  }

  pub fn route_sink(&self) -> Result<Box<dyn RouteSink>> {
    if self.dry_run {
      return Ok(Box::new(DryRunSink));
    }
    Ok(Box::new(IpRouteSink::new(
      &self.ip_command,
      &self.interface,
      self.table,
    )?))
  }
}
