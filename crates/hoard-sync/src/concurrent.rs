use hoard_store::{BinaryStore, Keys, StoreResult};

use crate::registry::KeyLockRegistry;

/// Thread-safe wrapper serializing access per key.
///
/// Operations on one key run one at a time, operations on different keys
/// run in parallel. Whole-store operations (`flush`, `list_keys`, `count`,
/// `dispose`) take the global lock and therefore see every key either
/// before or after any in-flight write, never in between.
pub struct ConcurrentStore<S> {
    inner: S,
    locks: KeyLockRegistry<String>,
}

impl<S: BinaryStore> ConcurrentStore<S> {
    /// Wrap `inner`.
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            locks: KeyLockRegistry::new(),
        }
    }

    /// The wrapped store. Access through it bypasses the locks.
    pub fn inner(&self) -> &S {
        &self.inner
    }

    /// Unwrap the inner store.
    pub fn into_inner(self) -> S {
        self.inner
    }

    /// The registry used to serialize operations.
    pub fn locks(&self) -> &KeyLockRegistry<String> {
        &self.locks
    }
}

impl<S: BinaryStore> BinaryStore for ConcurrentStore<S> {
    fn name(&self) -> String {
        self.inner.name()
    }

    fn validate_key(&self, key: &str) -> StoreResult<()> {
        self.inner.validate_key(key)
    }

    fn try_get(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        let _guard = self.locks.enter(key.to_string());
        self.inner.try_get(key)
    }

    fn get(&self, key: &str) -> StoreResult<Vec<u8>> {
        let _guard = self.locks.enter(key.to_string());
        self.inner.get(key)
    }

    fn set(&self, key: &str, value: &[u8]) -> StoreResult<()> {
        let _guard = self.locks.enter(key.to_string());
        self.inner.set(key, value)
    }

    fn try_set(&self, key: &str, value: &[u8]) -> StoreResult<bool> {
        let _guard = self.locks.enter(key.to_string());
        self.inner.try_set(key, value)
    }

    fn contains_key(&self, key: &str) -> StoreResult<bool> {
        let _guard = self.locks.enter(key.to_string());
        self.inner.contains_key(key)
    }

    fn remove(&self, key: &str) -> StoreResult<bool> {
        let _guard = self.locks.enter(key.to_string());
        self.inner.remove(key)
    }

    fn flush(&self) -> StoreResult<()> {
        let _guard = self.locks.enter_global();
        self.inner.flush()
    }

    fn list_keys(&self) -> StoreResult<Keys> {
        let _guard = self.locks.enter_global();
        // Materialize while the barrier is held so the snapshot is consistent.
        let keys: Vec<String> = self.inner.list_keys()?.collect();
        Ok(Box::new(keys.into_iter()))
    }

    fn count(&self) -> StoreResult<u64> {
        let _guard = self.locks.enter_global();
        self.inner.count()
    }

    fn dispose(&self) -> StoreResult<()> {
        let _guard = self.locks.enter_global();
        self.inner.dispose()
    }
}

impl<S: BinaryStore> std::fmt::Debug for ConcurrentStore<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConcurrentStore")
            .field("inner", &self.inner.name())
            .field("locks", &self.locks)
            .finish()
    }
}
