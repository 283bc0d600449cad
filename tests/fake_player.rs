//! End-to-end tests against a fake player listening on a unix socket.
#![cfg(unix)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use mpvctl::{ErrorKind, LoadMode, LoadOutcome, MpvClient, MpvConfig, MpvError, PropertyValue};
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::broadcast;

struct FakePlayer {
  _dir: tempfile::TempDir,
  socket_path: String,
  connections: Arc<AtomicUsize>,
  raw_lines: RawLines,
}

/// Non-JSON lines the fake received.
type RawLines = Arc<tokio::sync::Mutex<Vec<String>>>;

fn respond(command: &[Value], playlist: &mut Vec<String>) -> (Value, Vec<&'static str>) {
  let name = command.first().and_then(Value::as_str).unwrap_or("");
  match name {
    "loadfile" => {
      let file = command.get(1).and_then(Value::as_str).unwrap_or("").to_string();
      let mode = command.get(2).and_then(Value::as_str).unwrap_or("replace");
      let events = match mode {
        "append" => vec![],
        "append-play" if !playlist.is_empty() => vec![],
        _ if file.contains("broken") => vec!["start-file", "end-file"],
        _ => vec!["start-file", "file-loaded"],
      };
      if mode == "replace" {
        playlist.clear();
      }
      playlist.push(file);
      (json!({"error": "success", "data": null}), events)
    }
    "get_property" => match command.get(1).and_then(Value::as_str) {
      Some("playlist-count") => (json!({"error": "success", "data": playlist.len()}), vec![]),
      Some("volume") => (json!({"error": "success", "data": 50.0}), vec![]),
      _ => (json!({"error": "property unavailable"}), vec![]),
    },
    _ => (json!({"error": "success", "data": null}), vec![]),
  }
}

async fn serve(
  stream: UnixStream,
  events_tx: broadcast::Sender<String>,
  playlist: Arc<tokio::sync::Mutex<Vec<String>>>,
  raw_lines: RawLines,
) {
  let mut events_rx = events_tx.subscribe();
  let (reader, mut writer) = stream.into_split();
  let mut lines = BufReader::new(reader).lines();

  loop {
    tokio::select! {
      line = lines.next_line() => {
        let Ok(Some(line)) = line else { break };
        let Ok(request) = serde_json::from_str::<Value>(&line) else {
          raw_lines.lock().await.push(line);
          continue;
        };
        let command = request["command"].as_array().cloned().unwrap_or_default();
        let (mut reply, events) = respond(&command, &mut *playlist.lock().await);
        reply["request_id"] = request["request_id"].clone();
        let out = format!("{}\n", reply);
        if writer.write_all(out.as_bytes()).await.is_err() {
          break;
        }
        if !events.is_empty() {
          let events_tx = events_tx.clone();
          tokio::spawn(async move {
            for event in events {
              tokio::time::sleep(Duration::from_millis(30)).await;
              let _ = events_tx.send(format!("{}\n", json!({ "event": event })));
            }
          });
        }
      }
      event = events_rx.recv() => {
        let Ok(event) = event else { break };
        if writer.write_all(event.as_bytes()).await.is_err() {
          break;
        }
      }
    }
  }
}

async fn start_fake_player() -> FakePlayer {
  let dir = tempfile::tempdir().unwrap();
  let socket_path = dir.path().join("mpv.sock").to_str().unwrap().to_string();
  let listener = UnixListener::bind(&socket_path).unwrap();
  let connections = Arc::new(AtomicUsize::new(0));
  let raw_lines: RawLines = Default::default();
  let (events_tx, _) = broadcast::channel(64);
  let playlist = Arc::new(tokio::sync::Mutex::new(Vec::new()));

  let accepted = connections.clone();
  let raw = raw_lines.clone();
  tokio::spawn(async move {
    while let Ok((stream, _)) = listener.accept().await {
      accepted.fetch_add(1, Ordering::SeqCst);
      tokio::spawn(serve(stream, events_tx.clone(), playlist.clone(), raw.clone()));
    }
  });

  FakePlayer {
    _dir: dir,
    socket_path,
    connections,
    raw_lines,
  }
}

async fn attached_client(player: &FakePlayer) -> MpvClient {
  let client = MpvClient::new(MpvConfig {
    socket_path: player.socket_path.clone(),
    connect_retries: 3,
    ..MpvConfig::default()
  });
  client.attach().await.unwrap();
  client
}

#[tokio::test]
async fn test_facade_round_trips() {
  let player = start_fake_player().await;
  let client = attached_client(&player).await;
  assert!(client.is_running());

  assert_eq!(
    client.get_property("volume").await.unwrap(),
    PropertyValue::Number(50.0)
  );
  client.set_property("pause", true).await.unwrap();
  client.multiply_property("speed", 2).await.unwrap();
  client.cycle_property("fullscreen").await.unwrap();

  let err = client.get_property("bogus").await.unwrap_err();
  assert_eq!(err.kind(), ErrorKind::RemoteCommand);
  assert!(err.to_string().contains("property unavailable"));

  client.raw("cycle pause").await.unwrap();
  for _ in 0..50 {
    if !player.raw_lines.lock().await.is_empty() {
      break;
    }
    tokio::time::sleep(Duration::from_millis(10)).await;
  }
  assert_eq!(*player.raw_lines.lock().await, vec!["cycle pause"]);

  client.stop().await;
  client.stop().await;
  assert!(!client.is_running());
}

#[tokio::test]
async fn test_load_modes() {
  let player = start_fake_player().await;
  let client = attached_client(&player).await;

  assert_eq!(
    client.load("a.mkv", LoadMode::Replace, &[]).await.unwrap(),
    LoadOutcome::Success
  );
  assert_eq!(
    client.load("b.mkv", LoadMode::Append, &[]).await.unwrap(),
    LoadOutcome::SilentSuccess
  );
  assert_eq!(
    client.load("c.mkv", LoadMode::AppendPlay, &[]).await.unwrap(),
    LoadOutcome::SilentSuccess
  );

  let err = client
    .load("broken.mkv", LoadMode::Replace, &[])
    .await
    .unwrap_err();
  match err {
    MpvError::PlaybackFailed { file, reason } => {
      assert_eq!(file, "broken.mkv");
      assert_eq!(reason, "end-file");
    }
    other => panic!("Expected playback failure, got {:?}", other),
  }

  client.stop().await;
}

#[tokio::test]
async fn test_unknown_mode_makes_no_connection() {
  let player = start_fake_player().await;
  let client = attached_client(&player).await;
  let before = player.connections.load(Ordering::SeqCst);

  let err = client.load_str("a.mkv", "shuffle", &[]).await.unwrap_err();
  assert_eq!(err.kind(), ErrorKind::InvalidArgument);
  assert_eq!(player.connections.load(Ordering::SeqCst), before);

  assert_eq!(
    client.load_str("a.mkv", "replace", &[]).await.unwrap(),
    LoadOutcome::Success
  );
  assert_eq!(player.connections.load(Ordering::SeqCst), before + 1);

  client.stop().await;
}

#[tokio::test]
async fn test_attach_without_player() {
  let dir = tempfile::tempdir().unwrap();
  let client = MpvClient::new(MpvConfig {
    socket_path: dir.path().join("nobody.sock").to_str().unwrap().to_string(),
    connect_retries: 1,
    ..MpvConfig::default()
  });

  let err = client.attach().await.unwrap_err();
  assert_eq!(err.kind(), ErrorKind::Connection);
  assert!(!client.is_running());
}
