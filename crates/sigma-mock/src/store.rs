//! Resource collections of the simulated backend.
//!
//! Each collection sits behind one exclusive lock. Every operation holds the
//! lock for exactly one inspection or mutation, which serializes all state
//! changes a client can observe.

use parking_lot::Mutex;
use std::collections::BTreeMap;

/// Keyed storage for one resource collection.
pub trait ResourceStore<T>: Send + Sync {
    /// Copy of the record stored under `uuid`.
    fn get(&self, uuid: &str) -> Option<T>;

    /// Insert or replace a record, returning the previous one.
    fn put(&self, uuid: &str, value: T) -> Option<T>;

    /// Remove a record, returning it.
    fn delete(&self, uuid: &str) -> Option<T>;

    /// Copies of all records, ordered by identifier.
    fn list(&self) -> Vec<T>;

    /// Mutate a record in place under the lock; false when absent.
    fn modify(&self, uuid: &str, f: &mut dyn FnMut(&mut T)) -> bool;

    /// Remove every record.
    fn clear(&self);

    /// Number of stored records.
    fn len(&self) -> usize;

    /// True when nothing is stored.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// In-memory store guarded by a `parking_lot` mutex.
#[derive(Debug)]
pub struct MemoryStore<T> {
    records: Mutex<BTreeMap<String, T>>,
}

impl<T> MemoryStore<T> {
    /// Empty store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            records: Mutex::new(BTreeMap::new()),
        }
    }
}

impl<T> Default for MemoryStore<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> ResourceStore<T> for MemoryStore<T>
where
    T: Clone + Send,
{
    fn get(&self, uuid: &str) -> Option<T> {
        self.records.lock().get(uuid).cloned()
    }

    fn put(&self, uuid: &str, value: T) -> Option<T> {
        self.records.lock().insert(uuid.to_string(), value)
    }

    fn delete(&self, uuid: &str) -> Option<T> {
        self.records.lock().remove(uuid)
    }

    fn list(&self) -> Vec<T> {
        self.records.lock().values().cloned().collect()
    }

    fn modify(&self, uuid: &str, f: &mut dyn FnMut(&mut T)) -> bool {
        match self.records.lock().get_mut(uuid) {
            Some(record) => {
                f(record);
                true
            }
            None => false,
        }
    }

    fn clear(&self) {
        self.records.lock().clear();
    }

    fn len(&self) -> usize {
        self.records.lock().len()
    }
}
