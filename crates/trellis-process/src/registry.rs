//! The set of known processes.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::descriptor::ProcessDescriptor;
use crate::error::ProcessError;

/// Observer of registry mutations.
///
/// Notification is synchronous on the mutating caller's thread, not queued:
/// when `register` returns, every listener has already seen the change.
/// Batch operations notify once per item, in registration order.
pub trait RegistryListener: Send + Sync {
  fn on_process_added(&self, descriptor: &ProcessDescriptor);
  fn on_process_removed(&self, identifier: &str);
}

/// Holds the registered process descriptors and notifies listeners on
/// add/remove. Descriptors are immutable once registered; lookups hand out
/// shared references.
#[derive(Default)]
pub struct ProcessRegistry {
  processes: RwLock<HashMap<String, Arc<ProcessDescriptor>>>,
  listeners: RwLock<Vec<Arc<dyn RegistryListener>>>,
}

impl ProcessRegistry {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn add_listener(&self, listener: Arc<dyn RegistryListener>) {
    self
      .listeners
      .write()
      .expect("registry lock poisoned")
      .push(listener);
  }

  /// Register a descriptor, replacing any previous one under the same
  /// identifier. A replacement notifies removal of the old descriptor
  /// followed by addition of the new one.
  pub fn register(&self, descriptor: ProcessDescriptor) {
    let descriptor = Arc::new(descriptor);
    let replaced = self
      .processes
      .write()
      .expect("registry lock poisoned")
      .insert(descriptor.identifier.clone(), descriptor.clone());

    // Listeners run outside the map lock so a callback may query the
    // registry again.
    for listener in self.listeners_snapshot() {
      if replaced.is_some() {
        listener.on_process_removed(&descriptor.identifier);
      }
      listener.on_process_added(&descriptor);
    }
  }

  /// Register a batch, notifying once per item in order.
  pub fn register_all(&self, descriptors: impl IntoIterator<Item = ProcessDescriptor>) {
    for descriptor in descriptors {
      self.register(descriptor);
    }
  }

  /// Remove a descriptor. Unknown identifiers fail with
  /// [`ProcessError::NoSuchProcess`] and fire no notification.
  pub fn unregister(&self, identifier: &str) -> Result<(), ProcessError> {
    let removed = self
      .processes
      .write()
      .expect("registry lock poisoned")
      .remove(identifier);

    match removed {
      Some(_) => {
        for listener in self.listeners_snapshot() {
          listener.on_process_removed(identifier);
        }
        Ok(())
      }
      None => Err(ProcessError::NoSuchProcess {
        identifier: identifier.to_string(),
      }),
    }
  }

  pub fn get(&self, identifier: &str) -> Option<Arc<ProcessDescriptor>> {
    self
      .processes
      .read()
      .expect("registry lock poisoned")
      .get(identifier)
      .cloned()
  }

  /// All registered descriptors, in no particular order.
  pub fn list(&self) -> Vec<Arc<ProcessDescriptor>> {
    self
      .processes
      .read()
      .expect("registry lock poisoned")
      .values()
      .cloned()
      .collect()
  }

  pub fn contains(&self, identifier: &str) -> bool {
    self
      .processes
      .read()
      .expect("registry lock poisoned")
      .contains_key(identifier)
  }

  fn listeners_snapshot(&self) -> Vec<Arc<dyn RegistryListener>> {
    self
      .listeners
      .read()
      .expect("registry lock poisoned")
      .clone()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::sync::atomic::{AtomicUsize, Ordering};

  #[derive(Default)]
  struct CountingListener {
    added: AtomicUsize,
    removed: AtomicUsize,
  }

  impl RegistryListener for CountingListener {
    fn on_process_added(&self, _descriptor: &ProcessDescriptor) {
      self.added.fetch_add(1, Ordering::SeqCst);
    }

    fn on_process_removed(&self, _identifier: &str) {
      self.removed.fetch_add(1, Ordering::SeqCst);
    }
  }

  #[test]
  fn one_notification_per_registered_descriptor() {
    let registry = ProcessRegistry::new();
    let listener = Arc::new(CountingListener::default());
    registry.add_listener(listener.clone());

    registry.register(ProcessDescriptor::new("p:one"));
    assert_eq!(listener.added.load(Ordering::SeqCst), 1);

    registry.register_all(vec![
      ProcessDescriptor::new("p:two"),
      ProcessDescriptor::new("p:three"),
    ]);
    assert_eq!(listener.added.load(Ordering::SeqCst), 3);
    assert_eq!(listener.removed.load(Ordering::SeqCst), 0);
  }

  #[test]
  fn every_listener_sees_each_add() {
    let registry = ProcessRegistry::new();
    let first = Arc::new(CountingListener::default());
    let second = Arc::new(CountingListener::default());
    registry.add_listener(first.clone());
    registry.add_listener(second.clone());

    registry.register(ProcessDescriptor::new("p:shared"));
    assert_eq!(first.added.load(Ordering::SeqCst), 1);
    assert_eq!(second.added.load(Ordering::SeqCst), 1);
  }

  #[test]
  fn unregister_notifies_and_removes() {
    let registry = ProcessRegistry::new();
    let listener = Arc::new(CountingListener::default());
    registry.add_listener(listener.clone());

    registry.register(ProcessDescriptor::new("p:gone"));
    registry.unregister("p:gone").unwrap();

    assert_eq!(listener.removed.load(Ordering::SeqCst), 1);
    assert!(registry.get("p:gone").is_none());
  }

  #[test]
  fn unregister_unknown_id_fires_no_notification() {
    let registry = ProcessRegistry::new();
    let listener = Arc::new(CountingListener::default());
    registry.add_listener(listener.clone());

    assert!(matches!(
      registry.unregister("p:missing"),
      Err(ProcessError::NoSuchProcess { .. })
    ));
    assert_eq!(listener.removed.load(Ordering::SeqCst), 0);
  }

  #[test]
  fn replacement_fires_remove_then_add() {
    let registry = ProcessRegistry::new();
    let listener = Arc::new(CountingListener::default());
    registry.add_listener(listener.clone());

    registry.register(ProcessDescriptor::new("p:dup"));
    registry.register(ProcessDescriptor::new("p:dup").with_title("v2"));

    assert_eq!(listener.added.load(Ordering::SeqCst), 2);
    assert_eq!(listener.removed.load(Ordering::SeqCst), 1);
    assert_eq!(registry.list().len(), 1);
    assert_eq!(
      registry.get("p:dup").unwrap().title.as_deref(),
      Some("v2")
    );
  }
}
