//! A watchable handle for one category of live-mutable configuration.
//!
//! Readers call [`SettingsHandle::snapshot`] once at the entry of whatever
//! operation they're about to run and use that `Arc<T>` for the operation's
//! full duration. A concurrent [`SettingsHandle::publish`] swaps in a new
//! value for the *next* snapshot; it never mutates the one a reader already
//! holds, so a single ingestion or search can't observe half-old,
//! half-new settings partway through.

use std::sync::Arc;

use arc_swap::ArcSwap;

pub struct SettingsHandle<T> {
  current: ArcSwap<T>,
}

impl<T> SettingsHandle<T> {
  pub fn new(initial: T) -> Self {
    Self { current: ArcSwap::from_pointee(initial) }
  }

  /// Takes an immutable snapshot of the current value. Cheap: this is an
  /// atomic load, not a clone of `T`.
  pub fn snapshot(&self) -> Arc<T> {
    self.current.load_full()
  }

  /// Publishes a new value. Readers already holding an earlier snapshot are
  /// unaffected; only snapshots taken after this call see it.
  pub fn publish(&self, value: T) {
    self.current.store(Arc::new(value));
  }
}

impl<T: Default> Default for SettingsHandle<T> {
  fn default() -> Self {
    Self::new(T::default())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn snapshot_reflects_the_latest_publish() {
    let handle = SettingsHandle::new(1);
    assert_eq!(*handle.snapshot(), 1);
    handle.publish(2);
    assert_eq!(*handle.snapshot(), 2);
  }

  #[test]
  fn a_snapshot_taken_before_publish_is_unaffected_by_it() {
    let handle = SettingsHandle::new("old".to_string());
    let held = handle.snapshot();
    handle.publish("new".to_string());
    assert_eq!(*held, "old");
    assert_eq!(*handle.snapshot(), "new");
  }
}
