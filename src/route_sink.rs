use std::net::Ipv4Addr;
use std::process::Command;

use anyhow::{anyhow, Context, Result};
use tracing::{debug, info};

use crate::route_table::RouteKey;

/// Where route changes end up. Both operations must tolerate being repeated:
/// withdrawing a missing route or installing an identical one must not break
/// anything, though they may report an error for logging.
pub trait RouteSink {
  fn install(&mut self, key: RouteKey, next_hop: Ipv4Addr) -> Result<()>;
  fn withdraw(&mut self, key: RouteKey) -> Result<()>;
}

/// Applies routes with the iproute2 `ip` tool
#[derive(Debug, Clone)]
pub struct IpRouteSink {
  program:   String,
  base_args: Vec<String>,
  device:    String,
  table:     u32,
}

impl IpRouteSink {
  /// `ip_command` may carry a wrapper and flags, e.g. `"sudo /sbin/ip -4"`
  pub fn new(ip_command: &str, device: &str, table: u32) -> Result<IpRouteSink> {
    let mut argv = shellwords::split(ip_command)
      .map_err(|e| anyhow!("cannot parse ip command {ip_command:?}: {e}"))?;
    if argv.is_empty() {
      return Err(anyhow!("ip command must not be empty"));
    }
    let program = argv.remove(0);
    Ok(IpRouteSink {
      program,
      base_args: argv,
      device: device.to_string(),
      table,
    })
  }

  fn install_args(&self, key: RouteKey, next_hop: Ipv4Addr) -> Vec<String> {
    vec![
      "route".into(),
      "replace".into(),
      key.to_string(),
      "via".into(),
      next_hop.to_string(),
      "dev".into(),
      self.device.clone(),
      "onlink".into(),
      "table".into(),
      self.table.to_string(),
    ]
  }

  fn withdraw_args(&self, key: RouteKey) -> Vec<String> {
    vec![
      "route".into(),
      "del".into(),
      key.to_string(),
      "table".into(),
      self.table.to_string(),
    ]
  }

  fn run(&self, args: Vec<String>) -> Result<()> {
    let cmdline = format!("{} {} {}", self.program, self.base_args.join(" "), args.join(" "));
    debug!("running {}", cmdline.trim());
    let output = Command::new(&self.program)
      .args(&self.base_args)
      .args(&args)
      .output()
      .with_context(|| format!("failed to spawn {}", self.program))?;
    if !output.status.success() {
      return Err(anyhow!(
        "`{}` exited with {}: {}",
        cmdline.trim(),
        output.status,
        String::from_utf8_lossy(&output.stderr).trim()
      ));
    }
    Ok(())
  }
}

impl RouteSink for IpRouteSink {
  fn install(&mut self, key: RouteKey, next_hop: Ipv4Addr) -> Result<()> {
    self.run(self.install_args(key, next_hop))
  }

  fn withdraw(&mut self, key: RouteKey) -> Result<()> {
    self.run(self.withdraw_args(key))
  }
}

/// Logs route changes without touching the system
#[derive(Debug, Default)]
pub struct DryRunSink;

impl RouteSink for DryRunSink {
  fn install(&mut self, key: RouteKey, next_hop: Ipv4Addr) -> Result<()> {
    info!("dry run: install {key} via {next_hop}");
    Ok(())
  }

  fn withdraw(&mut self, key: RouteKey) -> Result<()> {
    info!("dry run: withdraw {key}");
    Ok(())
  }
}
