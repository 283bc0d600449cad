//! Splits the raw IPC byte stream into newline-terminated messages.

/// Incremental line framer.
///
/// Chunks may end in the middle of a message; the unterminated tail is kept
/// until the next chunk completes it.
#[derive(Debug, Default)]
pub struct LineFramer {
  partial: Vec<u8>,
}

impl LineFramer {
  pub fn new() -> Self {
    Self::default()
  }

  /// Feed one chunk and iterate the messages it completes, in arrival order.
  ///
  /// Empty lines are skipped. Invalid UTF-8 is replaced rather than dropped so
  /// the parser can report it against that single message.
  pub fn push(&mut self, chunk: &[u8]) -> impl Iterator<Item = String> {
    self.partial.extend_from_slice(chunk);
    let complete = match self.partial.iter().rposition(|&b| b == b'\n') {
      Some(last) => {
        let rest = self.partial.split_off(last + 1);
        std::mem::replace(&mut self.partial, rest)
      }
      None => Vec::new(),
    };

    complete
      .split(|&b| b == b'\n')
      .map(|line| String::from_utf8_lossy(line).trim().to_string())
      .filter(|line| !line.is_empty())
      .collect::<Vec<_>>()
      .into_iter()
  }

  /// Bytes held back waiting for a terminator.
  pub fn pending(&self) -> usize {
    self.partial.len()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_many_messages_in_one_chunk() {
    let mut framer = LineFramer::new();
    let lines: Vec<_> = framer.push(b"{\"a\":1}\n\n{\"b\":2}\n").collect();
    assert_eq!(lines, vec!["{\"a\":1}", "{\"b\":2}"]);
    assert_eq!(framer.pending(), 0);
  }

  #[test]
  fn test_message_split_across_chunks() {
    let mut framer = LineFramer::new();
    assert_eq!(framer.push(b"{\"event\":\"st").count(), 0);
    assert_eq!(framer.pending(), 12);
    let lines: Vec<_> = framer.push(b"art-file\"}\n{\"ev").collect();
    assert_eq!(lines, vec!["{\"event\":\"start-file\"}"]);
    let lines: Vec<_> = framer.push(b"ent\":\"idle\"}\n").collect();
    assert_eq!(lines, vec!["{\"event\":\"idle\"}"]);
  }

  #[test]
  fn test_empty_chunk() {
    let mut framer = LineFramer::new();
    assert_eq!(framer.push(b"").count(), 0);
    assert_eq!(framer.push(b"\n\n").count(), 0);
  }
}
