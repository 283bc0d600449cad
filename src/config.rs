//! Player connection configuration.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::mpv::{MpvError, DEFAULT_POLL_LIMIT};

/// How to launch and talk to MPV.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MpvConfig {
  /// Custom MPV executable path (None = auto-detect).
  #[serde(default)]
  pub binary: Option<PathBuf>,

  /// IPC socket (unix) or named pipe (Windows) path.
  #[serde(default = "default_socket_path")]
  pub socket_path: String,

  /// Additional MPV command-line arguments.
  #[serde(default)]
  pub extra_args: Vec<String>,

  /// Connection attempts before giving up.
  #[serde(default = "default_connect_retries")]
  pub connect_retries: u32,

  /// Wait after spawning MPV before the first connection attempt.
  #[serde(default = "default_startup_delay_ms")]
  pub startup_delay_ms: u64,

  /// Per-command response deadline (None = wait until the connection ends).
  #[serde(default)]
  pub command_timeout_ms: Option<u64>,

  /// Data deliveries a load may observe before it times out.
  #[serde(default = "default_load_poll_limit")]
  pub load_poll_limit: u32,
}

fn default_socket_path() -> String {
  #[cfg(windows)]
  {
    r"\\.\pipe\mpvctl".to_string()
  }
  #[cfg(not(windows))]
  {
    "/tmp/mpvctl.sock".to_string()
  }
}

fn default_connect_retries() -> u32 {
  10
}

fn default_startup_delay_ms() -> u64 {
  500
}

fn default_load_poll_limit() -> u32 {
  DEFAULT_POLL_LIMIT
}

impl Default for MpvConfig {
  fn default() -> Self {
    Self {
      binary: None,
      socket_path: default_socket_path(),
      extra_args: Vec::new(),
      connect_retries: default_connect_retries(),
      startup_delay_ms: default_startup_delay_ms(),
      command_timeout_ms: None,
      load_poll_limit: default_load_poll_limit(),
    }
  }
}

impl MpvConfig {
  /// Parse a JSON document; missing keys take their defaults.
  pub fn from_json(json: &str) -> Result<Self, MpvError> {
    let config: Self = serde_json::from_str(json).map_err(MpvError::InvalidConfig)?;
    config.validate()?;
    Ok(config)
  }

  /// Validate configuration values.
  pub fn validate(&self) -> Result<(), MpvError> {
    if self.socket_path.trim().is_empty() {
      return Err(invalid("socketPath", &self.socket_path, &["a non-empty path"]));
    }
    if self.connect_retries == 0 {
      return Err(invalid("connectRetries", "0", &["1 or more"]));
    }
    if self.load_poll_limit == 0 {
      return Err(invalid("loadPollLimit", "0", &["1 or more"]));
    }
    Ok(())
  }

  pub fn startup_delay(&self) -> Duration {
    Duration::from_millis(self.startup_delay_ms)
  }

  pub fn command_timeout(&self) -> Option<Duration> {
    self.command_timeout_ms.map(Duration::from_millis)
  }
}

fn invalid(field: &str, value: &str, valid: &'static [&'static str]) -> MpvError {
  MpvError::InvalidArgument {
    operation: "config",
    argument: format!("{}={}", field, value),
    valid,
  }
}
