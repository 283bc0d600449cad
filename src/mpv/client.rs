//! High-level MPV client with command methods.

use std::collections::HashMap;
use std::process::Child;
use std::sync::Arc;

use async_channel::Receiver;
use parking_lot::{Mutex, RwLock};
use serde_json::Value;

use super::error::MpvError;
use super::ipc::{IpcStream, MpvIpc};
use super::load::{load_file, LoadMode, LoadOutcome};
use super::process::{cleanup_ipc, spawn_mpv};
use super::protocol::{MpvCommand, MpvEvent, PropertyValue};
use super::state::ObservedState;
use crate::config::MpvConfig;

/// High-level MPV client.
///
/// Cloning shares the same process, connection and observed state.
#[derive(Clone)]
pub struct MpvClient {
  config: Arc<RwLock<MpvConfig>>,
  process: Arc<Mutex<Option<Child>>>,
  ipc: Arc<Mutex<Option<Arc<MpvIpc>>>>,
  observed: Arc<ObservedState>,
}

impl MpvClient {
  /// Create a new MPV client.
  pub fn new(config: MpvConfig) -> Self {
    Self {
      config: Arc::new(RwLock::new(config)),
      process: Arc::new(Mutex::new(None)),
      ipc: Arc::new(Mutex::new(None)),
      observed: Arc::new(ObservedState::new()),
    }
  }

  /// Replace the configuration (takes effect on next start/attach).
  pub fn set_config(&self, config: MpvConfig) {
    *self.config.write() = config;
  }

  pub fn config(&self) -> MpvConfig {
    self.config.read().clone()
  }

  /// Start MPV and connect to IPC.
  ///
  /// A player or connection left from an earlier start is shut down first.
  pub async fn start(&self) -> Result<(), MpvError> {
    let config = self.config();
    config.validate()?;

    if self.process.lock().is_some() || self.ipc.lock().is_some() {
      log::info!("MPV already started, restarting");
      self.stop().await;
    }

    cleanup_ipc(&config.socket_path);
    let child = spawn_mpv(&config)?;
    *self.process.lock() = Some(child);

    // Wait a bit for MPV to create the socket
    tokio::time::sleep(config.startup_delay()).await;

    if let Err(e) = self.attach().await {
      self.stop().await;
      return Err(e);
    }
    Ok(())
  }

  /// Connect to an MPV that is already listening on the configured socket.
  pub async fn attach(&self) -> Result<(), MpvError> {
    let config = self.config();
    config.validate()?;

    let conn = MpvIpc::connect(&config.socket_path, config.connect_retries)
      .await?
      .with_command_timeout(config.command_timeout());
    self.install(conn);

    log::info!("MPV client connected to {}", config.socket_path);
    Ok(())
  }

  /// Make `conn` the main connection and feed its events into the observed state.
  fn install(&self, conn: MpvIpc) {
    let conn = Arc::new(conn);
    let event_rx = conn.events();
    let observed = self.observed.clone();
    observed.clear();

    tokio::spawn(async move {
      while let Ok(event) = event_rx.recv().await {
        observed.apply(&event);
      }
      log::debug!("MPV event listener ended");
    });

    if let Some(previous) = self.ipc.lock().replace(conn) {
      previous.close();
    }
  }

  /// Stop MPV and disconnect. Safe to call when already stopped.
  pub async fn stop(&self) {
    if let Some(conn) = self.ipc.lock().take() {
      log::info!("Closing IPC connection");
      conn.close();
    }

    let child = self.process.lock().take();
    if let Some(mut child) = child {
      let pid = child.id();
      log::info!("Killing MPV process (pid: {})", pid);

      // kill/wait block; keep them off the runtime threads
      let result = tokio::task::spawn_blocking(move || {
        let _ = child.kill();
        child.wait()
      })
      .await;

      match result {
        Ok(Ok(status)) => log::info!("MPV process exited with: {}", status),
        Ok(Err(e)) => log::error!("wait() failed: {}", e),
        Err(e) => log::error!("spawn_blocking panicked during process cleanup: {}", e),
      }
      cleanup_ipc(&self.config.read().socket_path);
    }

    log::info!("MPV client stopped");
  }

  /// Quit MPV gracefully.
  pub async fn quit(&self) -> Result<(), MpvError> {
    if let Err(e) = self.send(MpvCommand::quit()).await {
      log::debug!("quit command not acknowledged: {}", e);
    }
    self.stop().await;
    Ok(())
  }

  /// True while the main connection is up.
  pub fn is_running(&self) -> bool {
    self.ipc.lock().as_ref().is_some_and(|conn| conn.is_open())
  }

  fn get_ipc(&self, operation: &'static str) -> Result<Arc<MpvIpc>, MpvError> {
    match self.ipc.lock().as_ref() {
      Some(conn) if conn.is_open() => Ok(conn.clone()),
      _ => Err(MpvError::NotRunning { operation }),
    }
  }

  async fn send(&self, cmd: MpvCommand) -> Result<Option<Value>, MpvError> {
    self.get_ipc("command")?.send_command(cmd).await
  }

  /// Run any mpv command, returning its response data.
  pub async fn command<I>(&self, name: &str, args: I) -> Result<Option<Value>, MpvError>
  where
    I: IntoIterator,
    I::Item: Into<Value>,
  {
    self.send(MpvCommand::new(name, args)).await
  }

  pub async fn set_property(&self, name: &str, value: impl Into<Value>) -> Result<(), MpvError> {
    self.send(MpvCommand::set_property(name, value)).await?;
    Ok(())
  }

  pub async fn add_property(&self, name: &str, value: impl Into<Value>) -> Result<(), MpvError> {
    self.send(MpvCommand::add_property(name, value)).await?;
    Ok(())
  }

  pub async fn multiply_property(
    &self,
    name: &str,
    factor: impl Into<Value>,
  ) -> Result<(), MpvError> {
    self.send(MpvCommand::multiply_property(name, factor)).await?;
    Ok(())
  }

  pub async fn cycle_property(&self, name: &str) -> Result<(), MpvError> {
    self.send(MpvCommand::cycle_property(name)).await?;
    Ok(())
  }

  /// Get a property value.
  pub async fn get_property(&self, name: &str) -> Result<PropertyValue, MpvError> {
    let data = self.send(MpvCommand::get_property(name)).await?;
    Ok(data.map(PropertyValue::from).unwrap_or(PropertyValue::Null))
  }

  /// Write a command line verbatim, without waiting for a reply.
  pub async fn raw(&self, line: &str) -> Result<(), MpvError> {
    self.get_ipc("raw")?.send_raw(line).await
  }

  /// Observe a property for changes.
  /// Values land in [`MpvClient::observed`] and on every `events()` subscription.
  pub async fn observe_property(&self, observer_id: i64, property: &str) -> Result<(), MpvError> {
    self
      .send(MpvCommand::observe_property(observer_id, property))
      .await?;
    Ok(())
  }

  /// Seek to absolute position in seconds.
  pub async fn seek(&self, time: f64) -> Result<(), MpvError> {
    self.send(MpvCommand::seek(time)).await?;
    Ok(())
  }

  pub async fn set_pause(&self, paused: bool) -> Result<(), MpvError> {
    self.set_property("pause", paused).await
  }

  /// Set volume (0-100).
  pub async fn set_volume(&self, volume: f64) -> Result<(), MpvError> {
    self.set_property("volume", volume).await
  }

  pub async fn toggle_mute(&self) -> Result<(), MpvError> {
    self.cycle_property("mute").await
  }

  pub async fn playlist_count(&self) -> Result<i64, MpvError> {
    match self.get_property("playlist-count").await? {
      PropertyValue::Number(n) => Ok(n as i64),
      _ => Ok(0),
    }
  }

  /// Load `file` and wait until playback starts, fails or times out.
  ///
  /// `append`, and `append-play` onto a playlist that already has entries,
  /// return [`LoadOutcome::SilentSuccess`] without waiting.
  pub async fn load(
    &self,
    file: &str,
    mode: LoadMode,
    options: &[String],
  ) -> Result<LoadOutcome, MpvError> {
    let ipc = self.get_ipc("load")?;
    let (socket_path, poll_limit) = {
      let config = self.config.read();
      (config.socket_path.clone(), config.load_poll_limit)
    };

    let watch_stream = IpcStream::open(&socket_path).await?;
    load_file(&ipc, watch_stream, file, mode, options, poll_limit).await
  }

  /// [`load`](Self::load) with the mode given by name.
  ///
  /// An unknown mode fails with `InvalidArgument` before anything is sent.
  pub async fn load_str(
    &self,
    file: &str,
    mode: &str,
    options: &[String],
  ) -> Result<LoadOutcome, MpvError> {
    self.get_ipc("load")?;
    let mode: LoadMode = mode.parse()?;
    self.load(file, mode, options).await
  }

  /// Subscribe to events on the main connection.
  pub fn events(&self) -> Result<Receiver<MpvEvent>, MpvError> {
    Ok(self.get_ipc("events")?.events())
  }

  /// Last value seen for every observed property.
  pub fn observed(&self) -> HashMap<String, PropertyValue> {
    self.observed.snapshot()
  }

  pub fn property(&self, name: &str) -> Option<PropertyValue> {
    self.observed.get(name)
  }
}

impl Default for MpvClient {
  fn default() -> Self {
    Self::new(MpvConfig::default())
  }
}
