//! Request/response correlation for commands sharing one IPC stream.

use std::collections::HashMap;

use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::oneshot;

use super::error::MpvError;
use super::protocol::{MpvCommand, MpvResponse};

/// Result delivered to the caller of a correlated command: the response data.
pub type CommandOutcome = Result<Option<Value>, MpvError>;

/// Pending request waiting for response.
struct PendingRequest {
  command: Vec<Value>,
  tx: oneshot::Sender<CommandOutcome>,
}

struct PendingTable {
  next_id: i64,
  pending: HashMap<i64, PendingRequest>,
  closed: bool,
}

/// Tracks in-flight commands by request ID.
///
/// Every entry leaves the table through `HashMap::remove` under the lock, so
/// each request is completed at most once.
pub struct Correlator {
  table: Mutex<PendingTable>,
}

impl Correlator {
  pub fn new() -> Self {
    Self {
      table: Mutex::new(PendingTable {
        next_id: 1,
        pending: HashMap::new(),
        closed: false,
      }),
    }
  }

  /// Allocate an ID and register the command.
  ///
  /// Fails with `NotRunning` without registering anything once the table has
  /// been closed.
  pub fn register(
    &self,
    command: &MpvCommand,
  ) -> Result<(i64, oneshot::Receiver<CommandOutcome>), MpvError> {
    let mut table = self.table.lock();
    if table.closed {
      return Err(MpvError::NotRunning {
        operation: "command",
      });
    }

    let request_id = table.next_id;
    table.next_id += 1;

    let (tx, rx) = oneshot::channel();
    table.pending.insert(
      request_id,
      PendingRequest {
        command: command.args().to_vec(),
        tx,
      },
    );
    Ok((request_id, rx))
  }

  /// Complete the request matching `response.request_id`.
  ///
  /// Returns `false` for IDs with no pending request; those are dropped.
  pub fn dispatch(&self, response: MpvResponse) -> bool {
    let Some(request) = self.table.lock().pending.remove(&response.request_id) else {
      log::debug!(
        "Dropping response for unknown request_id={}",
        response.request_id
      );
      return false;
    };

    let outcome = if response.is_success() {
      Ok(response.data)
    } else {
      Err(MpvError::RemoteCommand {
        error: response.error,
        command: request.command,
      })
    };
    // The caller may have stopped waiting; nothing else to notify.
    let _ = request.tx.send(outcome);
    true
  }

  /// Remove a request nobody will answer, e.g. after a failed write.
  pub fn abandon(&self, request_id: i64) -> bool {
    self.table.lock().pending.remove(&request_id).is_some()
  }

  /// Refuse new requests and fail every pending one with `ConnectionLost`.
  ///
  /// Returns how many requests were failed. Calling it again is a no-op.
  pub fn close(&self) -> usize {
    let drained: Vec<PendingRequest> = {
      let mut table = self.table.lock();
      table.closed = true;
      table.pending.drain().map(|(_, request)| request).collect()
    };

    let count = drained.len();
    for request in drained {
      let _ = request.tx.send(Err(MpvError::ConnectionLost {
        operation: "command",
      }));
    }
    if count > 0 {
      log::warn!("Failed {} pending MPV requests after disconnect", count);
    }
    count
  }

  pub fn is_closed(&self) -> bool {
    self.table.lock().closed
  }

  pub fn pending_count(&self) -> usize {
    self.table.lock().pending.len()
  }
}

impl Default for Correlator {
  fn default() -> Self {
    Self::new()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  fn response(request_id: i64, error: &str, data: Option<Value>) -> MpvResponse {
    MpvResponse {
      error: error.to_string(),
      data,
      request_id,
    }
  }

  #[tokio::test]
  async fn test_success_resolves_only_matching_request() {
    let correlator = Correlator::new();
    let (id_a, rx_a) = correlator.register(&MpvCommand::get_property("volume")).unwrap();
    let (id_b, _rx_b) = correlator.register(&MpvCommand::get_property("pause")).unwrap();
    assert_ne!(id_a, id_b);

    assert!(correlator.dispatch(response(id_a, "success", Some(json!(80)))));
    assert_eq!(rx_a.await.unwrap().unwrap(), Some(json!(80)));
    assert_eq!(correlator.pending_count(), 1);
  }

  #[tokio::test]
  async fn test_error_carries_command() {
    let correlator = Correlator::new();
    let (id, rx) = correlator.register(&MpvCommand::get_property("nope")).unwrap();
    correlator.dispatch(response(id, "property not found", None));

    match rx.await.unwrap() {
      Err(MpvError::RemoteCommand { error, command }) => {
        assert_eq!(error, "property not found");
        assert_eq!(command, vec![json!("get_property"), json!("nope")]);
      }
      other => panic!("Expected remote error, got {:?}", other),
    }
    assert_eq!(correlator.pending_count(), 0);
  }

  #[test]
  fn test_duplicate_and_unknown_responses_are_dropped() {
    let correlator = Correlator::new();
    let (id, _rx) = correlator.register(&MpvCommand::quit()).unwrap();
    assert!(correlator.dispatch(response(id, "success", None)));
    assert!(!correlator.dispatch(response(id, "success", None)));
    assert!(!correlator.dispatch(response(999, "success", None)));
  }

  #[tokio::test]
  async fn test_close_fails_all_pending() {
    let correlator = Correlator::new();
    let receivers: Vec<_> = (0..3)
      .map(|_| correlator.register(&MpvCommand::quit()).unwrap().1)
      .collect();

    assert_eq!(correlator.close(), 3);
    assert_eq!(correlator.close(), 0);
    for rx in receivers {
      assert!(matches!(
        rx.await.unwrap(),
        Err(MpvError::ConnectionLost { .. })
      ));
    }
    assert_eq!(correlator.pending_count(), 0);
  }

  #[test]
  fn test_register_after_close() {
    let correlator = Correlator::new();
    correlator.close();
    let err = correlator.register(&MpvCommand::quit()).unwrap_err();
    assert!(matches!(err, MpvError::NotRunning { .. }));
    assert_eq!(correlator.pending_count(), 0);
  }
}
