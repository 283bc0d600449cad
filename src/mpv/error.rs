//! MPV control error types.

use serde::Serialize;
use thiserror::Error;

/// Errors that can occur when controlling MPV.
#[derive(Debug, Error)]
pub enum MpvError {
  #[error("{operation}: MPV is not running")]
  NotRunning { operation: &'static str },

  #[error("Failed to connect to {address}: {source}")]
  Connection {
    address: String,
    #[source]
    source: std::io::Error,
  },

  #[error("{operation}: connection to MPV lost")]
  ConnectionLost { operation: &'static str },

  #[error("Malformed MPV message {message:?}: {source}")]
  Protocol {
    message: String,
    #[source]
    source: serde_json::Error,
  },

  #[error("{operation}: invalid argument {argument:?} (expected one of {valid:?})")]
  InvalidArgument {
    operation: &'static str,
    argument: String,
    valid: &'static [&'static str],
  },

  #[error("MPV rejected command {command:?}: {error}")]
  RemoteCommand {
    error: String,
    command: Vec<serde_json::Value>,
  },

  #[error("{operation}: timed out after {polls} polls")]
  Timeout { operation: &'static str, polls: u32 },

  #[error("MPV did not answer {command:?} within {after:?}")]
  CommandTimeout {
    command: Vec<serde_json::Value>,
    after: std::time::Duration,
  },

  #[error("Playback of {file} failed before it finished loading: {reason}")]
  PlaybackFailed { file: String, reason: String },

  #[error("MPV executable not found")]
  BinaryNotFound,

  #[error("Failed to spawn MPV: {0}")]
  Spawn(#[source] std::io::Error),

  #[error("Invalid configuration: {0}")]
  InvalidConfig(#[source] serde_json::Error),
}

/// Error class of an [`MpvError`], without its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorKind {
  NotRunning,
  Connection,
  ConnectionLost,
  Protocol,
  InvalidArgument,
  RemoteCommand,
  Timeout,
  PlaybackFailed,
  BinaryNotFound,
  Spawn,
  Config,
}

impl MpvError {
  pub fn kind(&self) -> ErrorKind {
    match self {
      MpvError::NotRunning { .. } => ErrorKind::NotRunning,
      MpvError::Connection { .. } => ErrorKind::Connection,
      MpvError::ConnectionLost { .. } => ErrorKind::ConnectionLost,
      MpvError::Protocol { .. } => ErrorKind::Protocol,
      MpvError::InvalidArgument { .. } => ErrorKind::InvalidArgument,
      MpvError::RemoteCommand { .. } => ErrorKind::RemoteCommand,
      MpvError::Timeout { .. } | MpvError::CommandTimeout { .. } => ErrorKind::Timeout,
      MpvError::PlaybackFailed { .. } => ErrorKind::PlaybackFailed,
      MpvError::BinaryNotFound => ErrorKind::BinaryNotFound,
      MpvError::Spawn(_) => ErrorKind::Spawn,
      MpvError::InvalidConfig(_) => ErrorKind::Config,
    }
  }

  /// Name of the operation that failed, when the variant records one.
  pub fn operation(&self) -> Option<&'static str> {
    match self {
      MpvError::NotRunning { operation }
      | MpvError::ConnectionLost { operation }
      | MpvError::InvalidArgument { operation, .. }
      | MpvError::Timeout { operation, .. } => Some(*operation),
      MpvError::Connection { .. } => Some("connect"),
      MpvError::RemoteCommand { .. } | MpvError::CommandTimeout { .. } => Some("command"),
      MpvError::PlaybackFailed { .. } => Some("load"),
      MpvError::BinaryNotFound | MpvError::Spawn(_) => Some("start"),
      MpvError::InvalidConfig(_) => Some("config"),
      MpvError::Protocol { .. } => None,
    }
  }
}
