//! `loadfile` orchestration: issue the command, then watch a second
//! connection's event stream until playback really starts, fails or the
//! delivery budget runs out.

use std::fmt;
use std::str::FromStr;

use super::error::MpvError;
use super::framing::LineFramer;
use super::ipc::{IpcStream, MpvIpc};
use super::protocol::{MpvCommand, MpvEvent, MpvMessage};

/// Deliveries tolerated on the watch connection before giving up.
pub const DEFAULT_POLL_LIMIT: u32 = 10;

/// How `loadfile` treats the current playlist.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadMode {
  Replace,
  Append,
  AppendPlay,
}

impl LoadMode {
  pub const VALID: &'static [&'static str] = &["replace", "append", "append-play"];

  pub fn as_str(&self) -> &'static str {
    match self {
      LoadMode::Replace => "replace",
      LoadMode::Append => "append",
      LoadMode::AppendPlay => "append-play",
    }
  }
}

impl FromStr for LoadMode {
  type Err = MpvError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "replace" => Ok(LoadMode::Replace),
      "append" => Ok(LoadMode::Append),
      "append-play" => Ok(LoadMode::AppendPlay),
      other => Err(MpvError::InvalidArgument {
        operation: "load",
        argument: other.to_string(),
        valid: Self::VALID,
      }),
    }
  }
}

impl fmt::Display for LoadMode {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// Successful end of a load.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
  /// `file-loaded` followed `start-file`.
  Success,
  /// Appended without touching playback, so no event was awaited.
  SilentSuccess,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Conclusion {
  Success,
  SilentSuccess,
  Failed(String),
  TimedOut,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadState {
  NotStarted,
  AwaitingStart,
  AwaitingLoaded,
  Concluded(Conclusion),
}

/// Event-driven state machine for one load.
///
/// Every delivery counts as a poll whether or not it moved the state; once
/// the count exceeds the limit the watch concludes `TimedOut`.
#[derive(Debug)]
pub struct LoadWatch {
  state: LoadState,
  polls: u32,
  poll_limit: u32,
  framer: LineFramer,
}

impl LoadWatch {
  pub fn new(poll_limit: u32) -> Self {
    Self {
      state: LoadState::NotStarted,
      polls: 0,
      poll_limit,
      framer: LineFramer::new(),
    }
  }

  pub fn state(&self) -> &LoadState {
    &self.state
  }

  pub fn polls(&self) -> u32 {
    self.polls
  }

  pub fn conclusion(&self) -> Option<&Conclusion> {
    match &self.state {
      LoadState::Concluded(conclusion) => Some(conclusion),
      _ => None,
    }
  }

  /// Start waiting for `start-file`.
  pub fn begin(&mut self) {
    if self.state == LoadState::NotStarted {
      self.state = LoadState::AwaitingStart;
    }
  }

  /// End the watch without observing anything, e.g. on command failure.
  pub fn conclude(&mut self, conclusion: Conclusion) {
    if self.conclusion().is_none() {
      self.state = LoadState::Concluded(conclusion);
    }
  }

  /// Apply one lifecycle event.
  pub fn on_event(&mut self, event: &MpvEvent) {
    let next = match (&self.state, event.event.as_str()) {
      (LoadState::AwaitingStart | LoadState::AwaitingLoaded, "start-file") => {
        LoadState::AwaitingLoaded
      }
      (LoadState::AwaitingLoaded, "file-loaded") => LoadState::Concluded(Conclusion::Success),
      (LoadState::AwaitingLoaded, "end-file") => LoadState::Concluded(Conclusion::Failed(
        event.reason.clone().unwrap_or_else(|| "end-file".to_string()),
      )),
      _ => return,
    };
    self.state = next;
  }

  /// Count one raw delivery and apply every event it completes.
  pub fn on_delivery(&mut self, chunk: &[u8]) -> Option<&Conclusion> {
    if self.conclusion().is_some() {
      return self.conclusion();
    }
    self.polls += 1;

    for line in self.framer.push(chunk) {
      match MpvMessage::parse(&line) {
        Ok(MpvMessage::Event(event)) => {
          self.on_event(&event);
          if self.conclusion().is_some() {
            break;
          }
        }
        Ok(_) => {}
        Err(e) => log::warn!("Load watch skipped message: {}", e),
      }
    }

    if self.conclusion().is_none() && self.polls > self.poll_limit {
      self.state = LoadState::Concluded(Conclusion::TimedOut);
    }
    self.conclusion()
  }
}

/// Run one load. `watch_stream` is closed exactly once before returning.
pub async fn load_file(
  ipc: &MpvIpc,
  mut watch_stream: IpcStream,
  file: &str,
  mode: LoadMode,
  options: &[String],
  poll_limit: u32,
) -> Result<LoadOutcome, MpvError> {
  let mut watch = LoadWatch::new(poll_limit);
  let result = run(ipc, &mut watch_stream, &mut watch, file, mode, options).await;
  watch_stream.close().await;

  log::info!(
    "Load of {} ({}) ended in {:?} after {} polls",
    file,
    mode,
    watch.state(),
    watch.polls()
  );
  result
}

async fn run(
  ipc: &MpvIpc,
  stream: &mut IpcStream,
  watch: &mut LoadWatch,
  file: &str,
  mode: LoadMode,
  options: &[String],
) -> Result<LoadOutcome, MpvError> {
  log::info!("Loading file: {} ({})", file, mode);
  if let Err(e) = ipc
    .send_command(MpvCommand::loadfile(file, mode.as_str(), options))
    .await
  {
    watch.conclude(Conclusion::Failed(e.to_string()));
    return Err(e);
  }

  let playlist_count = match ipc
    .send_command(MpvCommand::get_property("playlist-count"))
    .await
  {
    Ok(data) => data.and_then(|v| v.as_i64()).unwrap_or(0),
    Err(e) => {
      watch.conclude(Conclusion::Failed(e.to_string()));
      return Err(e);
    }
  };

  // Appending leaves the current entry playing, so mpv sends no lifecycle
  // events for it. The count already includes the new entry.
  if mode == LoadMode::Append || (mode == LoadMode::AppendPlay && playlist_count > 1) {
    watch.conclude(Conclusion::SilentSuccess);
    return Ok(LoadOutcome::SilentSuccess);
  }

  watch.begin();
  let mut buf = [0u8; 4096];
  loop {
    let n = match stream.read_chunk(&mut buf).await {
      Ok(n) => n,
      Err(e) => {
        log::warn!("Load watch read error on {}: {}", stream.address(), e);
        0
      }
    };
    if n == 0 {
      watch.conclude(Conclusion::Failed("connection closed".to_string()));
      return Err(MpvError::ConnectionLost { operation: "load" });
    }

    match watch.on_delivery(&buf[..n]).cloned() {
      None => continue,
      Some(Conclusion::Success) => return Ok(LoadOutcome::Success),
      Some(Conclusion::SilentSuccess) => return Ok(LoadOutcome::SilentSuccess),
      Some(Conclusion::Failed(reason)) => {
        log::warn!("Playback of {} failed: {}", file, reason);
        return Err(MpvError::PlaybackFailed {
          file: file.to_string(),
          reason,
        });
      }
      Some(Conclusion::TimedOut) => {
        return Err(MpvError::Timeout {
          operation: "load",
          polls: watch.polls(),
        })
      }
    }
  }
}
