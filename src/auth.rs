use std::fmt;

use anyhow::{anyhow, Result};

use crate::rip_message::{RipEntry, AUTH_PASSWORD_LEN, AUTH_TYPE_PASSWORD};

/// Shared RIPv2 simple password
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(Vec<u8>);

impl Secret {
  pub fn new(password: &str) -> Result<Secret> {
    let bytes = password.as_bytes();
    if bytes.is_empty() {
      return Err(anyhow!("password must not be empty"));
    }
    if bytes.len() > AUTH_PASSWORD_LEN {
      return Err(anyhow!(
        "password is {} bytes, RIPv2 allows at most {AUTH_PASSWORD_LEN}",
        bytes.len()
      ));
    }
    if bytes.contains(&0) {
      return Err(anyhow!("password must not contain null bytes"));
    }
    Ok(Secret(bytes.to_vec()))
  }

  pub fn as_bytes(&self) -> &[u8] {
    &self.0
  }
}

// keep the password out of logs
impl fmt::Debug for Secret {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "Secret(..)")
  }
}

/// True if `entry` is a simple password auth entry carrying `secret`. Any
/// other auth type counts as no valid auth present.
pub fn check_auth(entry: &RipEntry, secret: &Secret) -> bool {
  if entry.auth_type() != Some(AUTH_TYPE_PASSWORD) {
    return false;
  }
  entry.auth_password() == Some(secret.as_bytes())
}
