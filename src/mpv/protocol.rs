//! MPV JSON IPC protocol types.
//!
//! Reference: https://mpv.io/manual/master/#json-ipc

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use super::error::MpvError;

/// The only `error` value mpv uses to report success.
pub const SUCCESS: &str = "success";

/// Argument list of a command, without its request ID.
///
/// The correlator assigns the ID when the command is sent.
#[derive(Debug, Clone, PartialEq)]
pub struct MpvCommand {
  args: Vec<Value>,
}

impl MpvCommand {
  /// Generic command: `[name, args...]`.
  pub fn new<I>(name: &str, args: I) -> Self
  where
    I: IntoIterator,
    I::Item: Into<Value>,
  {
    let mut all = vec![Value::from(name)];
    all.extend(args.into_iter().map(Into::into));
    Self { args: all }
  }

  pub fn set_property(name: &str, value: impl Into<Value>) -> Self {
    Self::new("set_property", [Value::from(name), value.into()])
  }

  pub fn add_property(name: &str, value: impl Into<Value>) -> Self {
    Self::new("add", [Value::from(name), value.into()])
  }

  pub fn multiply_property(name: &str, factor: impl Into<Value>) -> Self {
    Self::new("multiply", [Value::from(name), factor.into()])
  }

  pub fn cycle_property(name: &str) -> Self {
    Self::new("cycle", [name])
  }

  pub fn get_property(name: &str) -> Self {
    Self::new("get_property", [name])
  }

  /// Observe a property for changes.
  pub fn observe_property(id: i64, name: &str) -> Self {
    Self::new("observe_property", [Value::from(id), Value::from(name)])
  }

  /// Seek to absolute position in seconds.
  pub fn seek(time: f64) -> Self {
    Self::new("seek", [Value::from(time), Value::from("absolute")])
  }

  /// `loadfile <file> <mode> [<options>]`, options joined as `key=value,...`.
  pub fn loadfile(file: &str, mode: &str, options: &[String]) -> Self {
    let mut args = vec![Value::from(file), Value::from(mode)];
    if !options.is_empty() {
      args.push(Value::from(options.join(",")));
    }
    Self::new("loadfile", args)
  }

  pub fn quit() -> Self {
    Self::new("quit", Vec::<Value>::new())
  }

  /// Full argument list, command name first.
  pub fn args(&self) -> &[Value] {
    &self.args
  }

  pub fn into_args(self) -> Vec<Value> {
    self.args
  }
}

/// Wire form of a correlated command.
#[derive(Debug, Serialize)]
pub(crate) struct Request<'a> {
  pub command: &'a [Value],
  pub request_id: i64,
}

/// Response from MPV for a command.
#[derive(Debug, Clone, Deserialize)]
pub struct MpvResponse {
  /// "success" or error message.
  ///
  /// A missing or non-string `error` is kept as text so the request still
  /// completes, as a failure.
  #[serde(default = "missing_error", deserialize_with = "error_text")]
  pub error: String,
  /// Response data (command-specific).
  #[serde(default)]
  pub data: Option<Value>,
  /// Matching request ID; zero or absent for uncorrelated replies.
  #[serde(default)]
  pub request_id: i64,
}

fn missing_error() -> String {
  "missing error field".to_string()
}

fn error_text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
  D: Deserializer<'de>,
{
  Ok(match Value::deserialize(deserializer)? {
    Value::String(error) => error,
    other => other.to_string(),
  })
}

impl MpvResponse {
  /// Check if the command succeeded.
  pub fn is_success(&self) -> bool {
    self.error == SUCCESS
  }
}

/// Event sent by MPV (property changes, playback events, etc.).
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MpvEvent {
  /// Event type (e.g., "property-change", "end-file", "client-message").
  pub event: String,
  /// Observer ID for property-change events.
  pub id: Option<i64>,
  /// Property name for property-change events.
  pub name: Option<String>,
  /// Event data.
  pub data: Option<Value>,
  /// Reason for end-file events (e.g., "eof", "stop", "quit", "error").
  pub reason: Option<String>,
  /// Arguments for client-message events (from script-message command).
  pub args: Option<Vec<String>>,
  /// Any other fields, kept as sent.
  #[serde(flatten)]
  pub extra: Map<String, Value>,
}

impl MpvEvent {
  /// Build a bare event with only a name, mostly for feeding watchers.
  pub fn named(event: &str) -> Self {
    Self {
      event: event.to_string(),
      id: None,
      name: None,
      data: None,
      reason: None,
      args: None,
      extra: Map::new(),
    }
  }
}

/// Typed property values from MPV.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropertyValue {
  Bool(bool),
  Number(f64),
  String(String),
  Null,
  Json(Value),
}

impl From<Value> for PropertyValue {
  fn from(value: Value) -> Self {
    match value {
      Value::Bool(b) => PropertyValue::Bool(b),
      Value::Number(n) => n
        .as_f64()
        .map(PropertyValue::Number)
        .unwrap_or(PropertyValue::Json(Value::Number(n))),
      Value::String(s) => PropertyValue::String(s),
      Value::Array(_) | Value::Object(_) => PropertyValue::Json(value),
      Value::Null => PropertyValue::Null,
    }
  }
}

/// Message received from MPV IPC.
#[derive(Debug, Clone)]
pub enum MpvMessage {
  /// Reply carrying a nonzero request ID.
  Response(MpvResponse),
  /// Reply without a request ID, e.g. to a raw command.
  Reply(MpvResponse),
  Event(MpvEvent),
}

impl MpvMessage {
  /// Parse one JSON line from MPV.
  pub fn parse(line: &str) -> Result<Self, MpvError> {
    let protocol_error = |source| MpvError::Protocol {
      message: line.to_string(),
      source,
    };

    let value: Value = serde_json::from_str(line).map_err(protocol_error)?;
    let request_id = value.get("request_id").and_then(Value::as_i64).unwrap_or(0);
    let is_event = value.get("event").is_some();

    if request_id != 0 {
      serde_json::from_value(value)
        .map(MpvMessage::Response)
        .map_err(protocol_error)
    } else if is_event {
      serde_json::from_value(value)
        .map(MpvMessage::Event)
        .map_err(protocol_error)
    } else {
      serde_json::from_value(value)
        .map(MpvMessage::Reply)
        .map_err(protocol_error)
    }
  }
}
