use anyhow::Result;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use ripd44::config::{Args, Config};
use ripd44::listener::Listener;

fn main() -> Result<()> {
  let args = Args::parse();
  let config = Config::try_from(args)?;

  let default_level = if config.verbose { "debug" } else { "info" };
  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
  tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_target(false)
    .init();

  info!(
    "ripd44 starting: interface {}, table {}, managed net {}, min prefix /{}, auth {}",
    config.interface,
    config.table,
    config.managed_net,
    config.min_prefix_len,
    if config.secret.is_some() { "on" } else { "off" }
  );

  let mut listener = Listener::bind(&config)?;
  listener.run();
  Ok(())
}
