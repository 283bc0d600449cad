//! Fan-out of unsolicited MPV events to subscribers.

use async_channel::{Receiver, Sender};
use parking_lot::Mutex;

use super::protocol::MpvEvent;

struct Subscribers {
  senders: Vec<Sender<MpvEvent>>,
  closed: bool,
}

/// Republishes events to every live subscriber, in arrival order.
///
/// Subscribers unsubscribe by dropping their receiver; closed channels are
/// pruned on the next publish.
pub struct EventSink {
  subscribers: Mutex<Subscribers>,
}

impl EventSink {
  pub fn new() -> Self {
    Self {
      subscribers: Mutex::new(Subscribers {
        senders: Vec::new(),
        closed: false,
      }),
    }
  }

  /// Receive every event published from now on.
  ///
  /// After [`EventSink::close`] the returned receiver is already closed.
  pub fn subscribe(&self) -> Receiver<MpvEvent> {
    let (tx, rx) = async_channel::unbounded();
    let mut subscribers = self.subscribers.lock();
    if subscribers.closed {
      tx.close();
    } else {
      subscribers.senders.push(tx);
    }
    rx
  }

  pub fn publish(&self, event: MpvEvent) {
    let mut subscribers = self.subscribers.lock();
    subscribers
      .senders
      .retain(|tx| tx.try_send(event.clone()).is_ok());
  }

  /// Close every subscription; receivers drain what they have, then end.
  pub fn close(&self) {
    let mut subscribers = self.subscribers.lock();
    subscribers.closed = true;
    for tx in subscribers.senders.drain(..) {
      tx.close();
    }
  }

  pub fn subscriber_count(&self) -> usize {
    self.subscribers.lock().senders.len()
  }
}

impl Default for EventSink {
  fn default() -> Self {
    Self::new()
  }
}
