//! Client-side control of an external MPV process over its JSON IPC socket.
//!
//! [`MpvClient`] launches or attaches to the player, correlates commands with
//! their responses on one shared connection, republishes player events and
//! runs `loadfile` until playback has really started.

mod config;
pub mod mpv;

pub use config::MpvConfig;
pub use mpv::{ErrorKind, LoadMode, LoadOutcome, MpvClient, MpvError, MpvEvent, PropertyValue};
