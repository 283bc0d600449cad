//! Async IPC connection to MPV.
//!
//! Handles platform-specific socket/pipe connections and runs the reader and
//! writer tasks that feed the correlator and the event sink.

use std::sync::Arc;
use std::time::Duration;

use async_channel::{Receiver, Sender};
use serde_json::Value;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::correlator::Correlator;
use super::error::MpvError;
use super::events::EventSink;
use super::framing::LineFramer;
use super::protocol::{MpvCommand, MpvEvent, MpvMessage, Request};

pub(crate) type IpcReader = Box<dyn AsyncRead + Send + Unpin>;
pub(crate) type IpcWriter = Box<dyn AsyncWrite + Send + Unpin>;

const READ_CHUNK: usize = 8192;

/// A raw, unmanaged duplex stream to the MPV control endpoint.
pub struct IpcStream {
  address: String,
  reader: IpcReader,
  writer: IpcWriter,
}

impl IpcStream {
  /// Open the socket/pipe at `path`.
  #[cfg(windows)]
  pub async fn open(path: &str) -> Result<Self, MpvError> {
    use tokio::net::windows::named_pipe::ClientOptions;

    let client = ClientOptions::new()
      .open(path)
      .map_err(|source| MpvError::Connection {
        address: path.to_string(),
        source,
      })?;

    let (reader, writer) = tokio::io::split(client);
    Ok(Self::from_parts(path, reader, writer))
  }

  /// Open the socket/pipe at `path`.
  #[cfg(not(windows))]
  pub async fn open(path: &str) -> Result<Self, MpvError> {
    use tokio::net::UnixStream;

    let stream = UnixStream::connect(path)
      .await
      .map_err(|source| MpvError::Connection {
        address: path.to_string(),
        source,
      })?;

    let (reader, writer) = stream.into_split();
    Ok(Self::from_parts(path, reader, writer))
  }

  /// Wrap an already connected reader/writer pair.
  pub fn from_parts<R, W>(address: &str, reader: R, writer: W) -> Self
  where
    R: AsyncRead + Send + Unpin + 'static,
    W: AsyncWrite + Send + Unpin + 'static,
  {
    Self {
      address: address.to_string(),
      reader: Box::new(reader),
      writer: Box::new(writer),
    }
  }

  pub fn address(&self) -> &str {
    &self.address
  }

  /// Read the next chunk of raw bytes; `Ok(0)` means the peer closed.
  pub async fn read_chunk(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
    self.reader.read(buf).await
  }

  /// Shut the stream down. Consumes the stream so it closes exactly once.
  pub async fn close(mut self) {
    if let Err(e) = self.writer.shutdown().await {
      log::debug!("IPC stream {} shutdown: {}", self.address, e);
    }
  }
}

/// State shared between the connection handle and its tasks.
struct Shared {
  address: String,
  correlator: Correlator,
  events: EventSink,
  write_tx: Sender<Vec<u8>>,
  cancel: CancellationToken,
}

impl Shared {
  /// Tear the connection down. Safe to call any number of times.
  fn teardown(&self) {
    if self.cancel.is_cancelled() {
      return;
    }
    log::debug!("Tearing down MPV IPC connection {}", self.address);
    self.cancel.cancel();
    self.write_tx.close();
    self.correlator.close();
    self.events.close();
  }

  fn dispatch_line(&self, line: &str) {
    match MpvMessage::parse(line) {
      Ok(MpvMessage::Response(response)) => {
        log::debug!(
          "MPV reader: received response for request_id={}",
          response.request_id
        );
        self.correlator.dispatch(response);
      }
      Ok(MpvMessage::Event(event)) => {
        log::debug!("MPV reader: received event {}", event.event);
        self.events.publish(event);
      }
      Ok(MpvMessage::Reply(reply)) => {
        log::debug!("MPV reader: uncorrelated reply, error={}", reply.error);
      }
      Err(e) => {
        log::warn!("Failed to parse MPV message: {}", e);
      }
    }
  }
}

/// MPV IPC connection.
pub struct MpvIpc {
  shared: Arc<Shared>,
  command_timeout: Option<Duration>,
  _reader_handle: JoinHandle<()>,
  _writer_handle: JoinHandle<()>,
}

impl MpvIpc {
  /// Connect to MPV IPC socket/pipe.
  pub async fn connect(path: &str, retry_count: u32) -> Result<Self, MpvError> {
    let mut last_error = None;

    for attempt in 0..retry_count.max(1) {
      if attempt > 0 {
        tokio::time::sleep(Duration::from_millis(100 * (attempt as u64 + 1))).await;
      }

      match IpcStream::open(path).await {
        Ok(stream) => return Ok(Self::with_stream(stream)),
        Err(e) => {
          log::debug!("IPC connect attempt {} failed: {}", attempt + 1, e);
          last_error = Some(e);
        }
      }
    }

    Err(last_error.unwrap_or_else(|| MpvError::Connection {
      address: path.to_string(),
      source: std::io::ErrorKind::NotConnected.into(),
    }))
  }

  /// Start the reader and writer tasks over an open stream.
  ///
  /// Must be called from within a tokio runtime.
  pub fn with_stream(stream: IpcStream) -> Self {
    let IpcStream {
      address,
      reader,
      writer,
    } = stream;

    let (write_tx, write_rx) = async_channel::unbounded::<Vec<u8>>();
    let shared = Arc::new(Shared {
      address,
      correlator: Correlator::new(),
      events: EventSink::new(),
      write_tx,
      cancel: CancellationToken::new(),
    });

    let reader_shared = shared.clone();
    let reader_handle = tokio::spawn(async move {
      Self::reader_loop(reader, reader_shared).await;
    });

    let writer_shared = shared.clone();
    let writer_handle = tokio::spawn(async move {
      Self::writer_loop(writer, write_rx, writer_shared).await;
    });

    Self {
      shared,
      command_timeout: None,
      _reader_handle: reader_handle,
      _writer_handle: writer_handle,
    }
  }

  /// Give up on commands that get no response within `timeout`.
  pub fn with_command_timeout(mut self, timeout: Option<Duration>) -> Self {
    self.command_timeout = timeout;
    self
  }

  async fn reader_loop(mut reader: IpcReader, shared: Arc<Shared>) {
    log::debug!("MPV IPC reader loop started");
    let mut framer = LineFramer::new();
    let mut buf = vec![0u8; READ_CHUNK];

    loop {
      tokio::select! {
        _ = shared.cancel.cancelled() => break,
        read = reader.read(&mut buf) => {
          match read {
            Ok(0) => {
              log::debug!("MPV IPC connection closed by peer");
              break;
            }
            Ok(n) => {
              for line in framer.push(&buf[..n]) {
                shared.dispatch_line(&line);
              }
            }
            Err(e) => {
              log::error!("MPV IPC read error: {}", e);
              break;
            }
          }
        }
      }
    }

    shared.teardown();
  }

  async fn writer_loop(mut writer: IpcWriter, write_rx: Receiver<Vec<u8>>, shared: Arc<Shared>) {
    log::debug!("MPV IPC writer loop started");

    while let Ok(mut data) = write_rx.recv().await {
      data.push(b'\n');
      if let Err(e) = writer.write_all(&data).await {
        log::error!("MPV IPC write error: {}", e);
        break;
      }
      if let Err(e) = writer.flush().await {
        log::error!("MPV IPC flush error: {}", e);
        break;
      }
    }

    let _ = writer.shutdown().await;
    shared.teardown();
    log::debug!("MPV IPC writer closed");
  }

  /// Send a command to MPV and wait for its response data.
  pub async fn send_command(&self, cmd: MpvCommand) -> Result<Option<Value>, MpvError> {
    let (request_id, rx) = self.shared.correlator.register(&cmd)?;

    let request = Request {
      command: cmd.args(),
      request_id,
    };
    let json = match serde_json::to_vec(&request) {
      Ok(json) => json,
      Err(source) => {
        self.shared.correlator.abandon(request_id);
        return Err(MpvError::Protocol {
          message: format!("{:?}", cmd.args()),
          source,
        });
      }
    };

    if self.shared.write_tx.send(json).await.is_err() {
      self.shared.correlator.abandon(request_id);
      return Err(MpvError::ConnectionLost {
        operation: "command",
      });
    }

    let received = match self.command_timeout {
      Some(after) => match tokio::time::timeout(after, rx).await {
        Ok(received) => received,
        Err(_) => {
          log::warn!("MPV command timeout, request_id={}", request_id);
          self.shared.correlator.abandon(request_id);
          return Err(MpvError::CommandTimeout {
            command: cmd.into_args(),
            after,
          });
        }
      },
      None => rx.await,
    };

    received.unwrap_or(Err(MpvError::ConnectionLost {
      operation: "command",
    }))
  }

  /// Write a bare command line with no request ID and no awaited response.
  pub async fn send_raw(&self, line: &str) -> Result<(), MpvError> {
    if self.shared.correlator.is_closed() {
      return Err(MpvError::NotRunning { operation: "raw" });
    }
    let line = line.trim_end_matches(['\r', '\n']);
    self
      .shared
      .write_tx
      .send(line.as_bytes().to_vec())
      .await
      .map_err(|_| MpvError::NotRunning { operation: "raw" })
  }

  /// Subscribe to events (property changes, playback lifecycle, ...).
  pub fn events(&self) -> Receiver<MpvEvent> {
    self.shared.events.subscribe()
  }

  pub fn address(&self) -> &str {
    &self.shared.address
  }

  pub fn is_open(&self) -> bool {
    !self.shared.correlator.is_closed()
  }

  pub fn pending_requests(&self) -> usize {
    self.shared.correlator.pending_count()
  }

  /// Close the connection. Pending commands fail with `ConnectionLost`.
  pub fn close(&self) {
    self.shared.teardown();
  }
}

impl Drop for MpvIpc {
  fn drop(&mut self) {
    self.shared.teardown();
  }
}
