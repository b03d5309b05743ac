use std::net::UdpSocket;
use std::time::{Duration, SystemTime};

use anyhow::{Context, Result};
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::processor::Processor;
use crate::route_sink::RouteSink;
use crate::route_table::RouteTable;

// big enough that oversized datagrams are seen whole and rejected, not truncated
const MAX_SIZE: usize = 65536;

/// Single threaded receive loop. Each datagram is fully applied, sink calls
/// included, before the next one is read; expiry runs only between datagrams.
pub struct Listener {
  socket:          UdpSocket,
  processor:       Processor,
  table:           RouteTable,
  sink:            Box<dyn RouteSink>,
  route_ttl:       Duration,
  expire_interval: Duration,
  last_expiry:     SystemTime,
  buf:             Vec<u8>,
}

impl Listener {
  /// Binds the RIP port and joins the multicast group from `config`
  pub fn bind(config: &Config) -> Result<Listener> {
    let socket = UdpSocket::bind(config.listen)
      .with_context(|| format!("failed to bind {}", config.listen))?;
    socket
      .join_multicast_v4(&config.multicast_group, &config.multicast_interface)
      .with_context(|| {
        format!(
          "failed to join {} on {}",
          config.multicast_group, config.multicast_interface
        )
      })?;
    info!(
      "listening on {}, joined {} via {}",
      config.listen, config.multicast_group, config.multicast_interface
    );

    Ok(Listener::new(
      socket,
      config.processor(),
      config.route_sink()?,
      config.route_ttl,
      config.expire_interval,
    ))
  }

  pub fn new(
    socket: UdpSocket,
    processor: Processor,
    sink: Box<dyn RouteSink>,
    route_ttl: Duration,
    expire_interval: Duration,
  ) -> Listener {
    Listener {
      socket,
      processor,
      table: RouteTable::new(),
      sink,
      route_ttl,
      expire_interval,
      last_expiry: SystemTime::now(),
      buf: vec![0u8; MAX_SIZE],
    }
  }

  /// Runs until the process is killed
  pub fn run(&mut self) {
    loop {
      self.run_once();
    }
  }

  /// Waits for one datagram, applies it, then sweeps expired routes if a sweep
  /// is due. Returns the accepted route count for a successfully processed
  /// datagram.
  pub fn run_once(&mut self) -> Option<usize> {
    let received = self.socket.recv_from(&mut self.buf);
    let now = SystemTime::now();

    let accepted = match received {
      Ok((len, source)) => match self.processor.process_message(
        source,
        &self.buf[..len],
        &mut self.table,
        self.sink.as_mut(),
        now,
      ) {
        Ok(accepted) => Some(accepted),
        Err(e) if e.is_auth_failure() => {
          warn!("{source}: dropping datagram: {e}");
          None
        }
        Err(e) => {
          debug!("{source}: dropping datagram: {e}");
          None
        }
      },
      Err(e) => {
        error!("receive failed: {e}");
        None
      }
    };

    self.maybe_expire(now);
    accepted
  }

  fn maybe_expire(&mut self, now: SystemTime) {
    let due = match now.duration_since(self.last_expiry) {
      Ok(elapsed) => elapsed >= self.expire_interval,
      Err(_) => {
        warn!("clock moved backwards since last expiry sweep");
        true
      }
    };
    if !due {
      return;
    }

    self.last_expiry = now;
    let expired = self
      .table
      .expire_routes(now, self.route_ttl, self.sink.as_mut());
    info!(
      "expiry sweep: {expired} routes expired, {} remain",
      self.table.len()
    );
  }

  pub fn table(&self) -> &RouteTable {
    &self.table
  }
}
