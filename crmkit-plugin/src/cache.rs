//! Pass-scoped key/value store shared by every handler of one dispatch.

use std::any::Any;
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

/// Shared scratch space for the handlers of one dispatch pass.
///
/// Clones share storage. The cache never leaves the thread running the
/// pass.
#[derive(Clone, Default)]
pub struct HandlerCache {
    entries: Rc<RefCell<HashMap<String, Box<dyn Any>>>>,
}

impl HandlerCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `value` under `key`, replacing any previous entry.
    pub fn insert<T: 'static>(&self, key: impl Into<String>, value: T) {
        self.entries.borrow_mut().insert(key.into(), Box::new(value));
    }

    /// Copy of the entry under `key`; `None` when absent or of another type.
    pub fn get<T: Clone + 'static>(&self, key: &str) -> Option<T> {
        self.entries
            .borrow()
            .get(key)
            .and_then(|value| value.downcast_ref::<T>())
            .cloned()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.borrow().contains_key(key)
    }

    pub fn remove(&self, key: &str) -> bool {
        self.entries.borrow_mut().remove(key).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }
}

impl fmt::Debug for HandlerCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let entries = self.entries.borrow();
        let mut keys: Vec<&String> = entries.keys().collect();
        keys.sort();
        f.debug_struct("HandlerCache").field("keys", &keys).finish()
    }
}
