use std::collections::HashMap;

use parking_lot::RwLock;

use crate::error::StoreResult;
use crate::traits::{BinaryStore, Keys};

/// In-memory, HashMap-based binary store.
///
/// Used as the fast tier of the write-back cache and in tests. Values are
/// cloned on read and write. Nothing survives the store being dropped.
pub struct InMemoryStore {
    entries: RwLock<HashMap<String, Vec<u8>>>,
}

impl InMemoryStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Number of entries currently stored.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Returns `true` if the store is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Total bytes across all stored values.
    pub fn total_bytes(&self) -> u64 {
        self.entries
            .read()
            .values()
            .map(|v| v.len() as u64)
            .sum()
    }

    /// Remove all entries.
    pub fn clear(&self) {
        self.entries.write().clear();
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl BinaryStore for InMemoryStore {
    fn name(&self) -> String {
        String::new()
    }

    fn try_get(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        Ok(self.entries.read().get(key).cloned())
    }

    fn set(&self, key: &str, value: &[u8]) -> StoreResult<()> {
        self.entries.write().insert(key.to_string(), value.to_vec());
        Ok(())
    }

    fn contains_key(&self, key: &str) -> StoreResult<bool> {
        Ok(self.entries.read().contains_key(key))
    }

    fn remove(&self, key: &str) -> StoreResult<bool> {
        Ok(self.entries.write().remove(key).is_some())
    }

    fn flush(&self) -> StoreResult<()> {
        Ok(())
    }

    fn list_keys(&self) -> StoreResult<Keys> {
        let keys: Vec<String> = self.entries.read().keys().cloned().collect();
        Ok(Box::new(keys.into_iter()))
    }

    fn count(&self) -> StoreResult<u64> {
        Ok(self.len() as u64)
    }
}

impl std::fmt::Debug for InMemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryStore")
            .field("entry_count", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;
    use std::sync::Arc;

    #[test]
    fn set_and_get() {
        let store = InMemoryStore::new();
        store.set("a", b"hello world").unwrap();
        assert_eq!(store.get("a").unwrap(), b"hello world");
    }

    #[test]
    fn overwrite_replaces_value() {
        let store = InMemoryStore::new();
        store.set("a", b"one").unwrap();
        store.set("a", b"two").unwrap();
        assert_eq!(store.get("a").unwrap(), b"two");
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn get_missing_fails_try_get_does_not() {
        let store = InMemoryStore::new();
        assert!(store.try_get("nope").unwrap().is_none());
        assert!(matches!(
            store.get("nope").unwrap_err(),
            StoreError::NotFound { .. }
        ));
    }

    #[test]
    fn remove_present_and_missing() {
        let store = InMemoryStore::new();
        store.set("gone", b"x").unwrap();
        assert!(store.remove("gone").unwrap());
        assert!(!store.contains_key("gone").unwrap());
        assert!(!store.remove("gone").unwrap());
    }

    #[test]
    fn try_set_always_accepts() {
        let store = InMemoryStore::new();
        assert!(store.try_set("any/key", b"v").unwrap());
    }

    #[test]
    fn list_keys_is_a_snapshot() {
        let store = InMemoryStore::new();
        store.set("a", b"1").unwrap();
        store.set("b", b"2").unwrap();
        let keys = store.list_keys().unwrap();
        store.set("c", b"3").unwrap();
        let mut keys: Vec<String> = keys.collect();
        keys.sort();
        assert_eq!(keys, vec!["a", "b"]);
        assert_eq!(store.count().unwrap(), 3);
    }

    #[test]
    fn total_bytes_and_clear() {
        let store = InMemoryStore::new();
        store.set("a", b"12345").unwrap();
        store.set("b", b"123456789").unwrap();
        assert_eq!(store.total_bytes(), 14);
        store.clear();
        assert!(store.is_empty());
    }

    #[test]
    fn shared_through_arc() {
        let store = Arc::new(InMemoryStore::new());
        let handle: Arc<InMemoryStore> = Arc::clone(&store);
        handle.set("k", b"v").unwrap();
        assert_eq!(BinaryStore::get(&store, "k").unwrap(), b"v");
    }

    #[test]
    fn concurrent_writes_are_safe() {
        use std::thread;

        let store = Arc::new(InMemoryStore::new());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = Arc::clone(&store);
                thread::spawn(move || {
                    store.set(&format!("k{i}"), &[i as u8]).unwrap();
                })
            })
            .collect();
        for h in handles {
            h.join().expect("thread should not panic");
        }
        assert_eq!(store.len(), 8);
    }

    #[test]
    fn debug_format() {
        let store = InMemoryStore::new();
        store.set("x", b"x").unwrap();
        let debug = format!("{store:?}");
        assert!(debug.contains("InMemoryStore"));
        assert!(debug.contains("entry_count"));
    }
}
