//! Last-known property values, fed by `property-change` events.

use std::collections::HashMap;

use parking_lot::RwLock;

use super::protocol::{MpvEvent, PropertyValue};

#[derive(Debug, Default)]
pub struct ObservedState {
  values: RwLock<HashMap<String, PropertyValue>>,
}

impl ObservedState {
  pub fn new() -> Self {
    Self::default()
  }

  /// Record the value carried by a `property-change` event.
  ///
  /// Returns `false` for any other event.
  pub fn apply(&self, event: &MpvEvent) -> bool {
    if event.event != "property-change" {
      return false;
    }
    let Some(name) = event.name.as_ref() else {
      return false;
    };
    let value = event
      .data
      .clone()
      .map(PropertyValue::from)
      .unwrap_or(PropertyValue::Null);
    self.values.write().insert(name.clone(), value);
    true
  }

  pub fn get(&self, name: &str) -> Option<PropertyValue> {
    self.values.read().get(name).cloned()
  }

  pub fn snapshot(&self) -> HashMap<String, PropertyValue> {
    self.values.read().clone()
  }

  pub fn clear(&self) {
    self.values.write().clear();
  }
}
