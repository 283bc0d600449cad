//! MPV process detection and spawning.

use std::path::PathBuf;
use std::process::{Child, Command, Stdio};

use super::error::MpvError;
use crate::config::MpvConfig;

#[cfg(windows)]
const KNOWN_LOCATIONS: &[&str] = &[
  r"C:\Program Files\mpv\mpv.exe",
  r"C:\Program Files (x86)\mpv\mpv.exe",
  r"C:\mpv\mpv.exe",
];

#[cfg(target_os = "macos")]
const KNOWN_LOCATIONS: &[&str] = &[
  "/usr/local/bin/mpv",
  "/opt/homebrew/bin/mpv",
  "/Applications/mpv.app/Contents/MacOS/mpv",
];

#[cfg(not(any(windows, target_os = "macos")))]
const KNOWN_LOCATIONS: &[&str] = &["/usr/bin/mpv", "/usr/local/bin/mpv"];

/// Find the MPV executable on PATH, then in common install locations.
pub fn find_mpv() -> Option<PathBuf> {
  if let Ok(path) = which::which("mpv") {
    return Some(path);
  }

  KNOWN_LOCATIONS
    .iter()
    .map(PathBuf::from)
    .find(|p| p.exists())
}

/// Command line MPV is launched with, minus the executable.
pub fn mpv_args(config: &MpvConfig) -> Vec<String> {
  let mut args = vec![
    format!("--input-ipc-server={}", config.socket_path),
    "--idle".to_string(),
    "--no-terminal".to_string(),
  ];
  args.extend(config.extra_args.iter().cloned());
  args
}

/// Spawn MPV with its IPC server listening on the configured socket.
pub fn spawn_mpv(config: &MpvConfig) -> Result<Child, MpvError> {
  let mpv_exe = config
    .binary
    .clone()
    .or_else(find_mpv)
    .ok_or(MpvError::BinaryNotFound)?;

  let args = mpv_args(config);
  log::info!("Spawning MPV: {:?} {:?}", mpv_exe, args);

  Command::new(&mpv_exe)
    .args(&args)
    .stdin(Stdio::null())
    .stdout(Stdio::null())
    .stderr(Stdio::null())
    .spawn()
    .map_err(MpvError::Spawn)
}

/// Remove a stale socket file left by a previous run.
pub fn cleanup_ipc(path: &str) {
  #[cfg(not(windows))]
  {
    if let Err(e) = std::fs::remove_file(path) {
      if e.kind() != std::io::ErrorKind::NotFound {
        log::debug!("Could not remove IPC socket {}: {}", path, e);
      }
    }
  }
  // Windows named pipes are cleaned up automatically
  #[cfg(windows)]
  let _ = path;
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_args_include_ipc_server_and_extras() {
    let config = MpvConfig {
      socket_path: "/tmp/test.sock".to_string(),
      extra_args: vec!["--mute=yes".to_string()],
      ..MpvConfig::default()
    };
    assert_eq!(
      mpv_args(&config),
      vec![
        "--input-ipc-server=/tmp/test.sock",
        "--idle",
        "--no-terminal",
        "--mute=yes",
      ]
    );
  }

  #[test]
  fn test_missing_binary() {
    let config = MpvConfig {
      binary: Some(PathBuf::from("/nonexistent/mpv-binary")),
      ..MpvConfig::default()
    };
    assert!(matches!(spawn_mpv(&config), Err(MpvError::Spawn(_))));
  }

  #[cfg(unix)]
  #[test]
  fn test_cleanup_missing_socket_is_quiet() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("gone.sock");
    cleanup_ipc(path.to_str().unwrap());

    std::fs::write(&path, b"").unwrap();
    cleanup_ipc(path.to_str().unwrap());
    assert!(!path.exists());
  }
}
