//! MPV IPC module - spawns and controls external MPV player via JSON IPC.
//!
//! Architecture:
//! - `ipc.rs` - Async IPC connection (Named Pipes on Windows, Unix Sockets on Linux/macOS)
//! - `framing.rs` - Newline framing of the raw byte stream
//! - `correlator.rs` - Pending request table keyed by request ID
//! - `events.rs` - Fan-out of unsolicited events
//! - `protocol.rs` - JSON command/response types and serialization
//! - `client.rs` - High-level MPV client with command methods
//! - `load.rs` - `loadfile` with a watched completion
//! - `process.rs` - MPV binary detection and process spawning

mod client;
mod correlator;
mod error;
mod events;
mod framing;
mod ipc;
mod load;
mod process;
mod protocol;
mod state;

pub use client::MpvClient;
pub use correlator::{CommandOutcome, Correlator};
pub use error::{ErrorKind, MpvError};
pub use events::EventSink;
pub use framing::LineFramer;
pub use ipc::{IpcStream, MpvIpc};
pub use load::{
  load_file, Conclusion, LoadMode, LoadOutcome, LoadState, LoadWatch, DEFAULT_POLL_LIMIT,
};
pub use process::{cleanup_ipc, find_mpv, mpv_args, spawn_mpv};
pub use protocol::{MpvCommand, MpvEvent, MpvMessage, MpvResponse, PropertyValue, SUCCESS};
pub use state::ObservedState;
