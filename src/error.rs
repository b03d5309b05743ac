use std::net::SocketAddr;

use thiserror::Error;

/// Reasons a whole RIP datagram is thrown away before any route is looked at
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RipError {
  #[error("message too short: {0} bytes")]
  TooShort(usize),

  #[error("message too long: {0} bytes, more than 25 entries")]
  TooLong(usize),

  #[error("message length {0} is not a header plus whole 20 byte entries")]
  MisalignedLength(usize),

  #[error("unsupported command {0}, only responses are processed")]
  UnsupportedCommand(u8),

  #[error("unsupported version {0}")]
  UnsupportedVersion(u8),

  #[error("reserved header bytes are not zero: {0:#04x} {1:#04x}")]
  NonZeroReserved(u8, u8),

  #[error("authentication required, first entry is not a password auth entry")]
  AuthRequired,

  #[error("authentication failed, password mismatch")]
  AuthMismatch,

  #[error("datagram from untrusted source {0}")]
  UntrustedSource(SocketAddr),
}

impl RipError {
  pub fn is_auth_failure(&self) -> bool {
    matches!(self, RipError::AuthRequired | RipError::AuthMismatch)
  }
}
