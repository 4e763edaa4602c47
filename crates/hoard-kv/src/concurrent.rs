use std::fmt;
use std::hash::Hash;
use std::marker::PhantomData;

use hoard_sync::KeyLockRegistry;

use crate::error::KvResult;
use crate::traits::{Entries, KvStore};

/// Thread-safe wrapper serializing typed operations per key.
///
/// Mirrors [`hoard_sync::ConcurrentStore`] one layer up: locking happens
/// on the typed key, so two threads touching the same `K` run one after
/// the other even when the inner store is shared by other wrappers.
pub struct ConcurrentKvStore<K, V, T> {
    inner: T,
    locks: KeyLockRegistry<K>,
    _value: PhantomData<fn() -> V>,
}

impl<K, V, T> ConcurrentKvStore<K, V, T>
where
    K: Eq + Hash + Clone + Send + 'static,
    V: 'static,
    T: KvStore<K, V>,
{
    /// Wrap `inner`.
    pub fn new(inner: T) -> Self {
        Self {
            inner,
            locks: KeyLockRegistry::new(),
            _value: PhantomData,
        }
    }

    /// The wrapped store. Access through it bypasses the locks.
    pub fn inner(&self) -> &T {
        &self.inner
    }

    pub fn into_inner(self) -> T {
        self.inner
    }

    pub fn locks(&self) -> &KeyLockRegistry<K> {
        &self.locks
    }
}

impl<K, V, T> KvStore<K, V> for ConcurrentKvStore<K, V, T>
where
    K: Eq + Hash + Clone + Send + 'static,
    V: 'static,
    T: KvStore<K, V>,
{
    fn get(&self, key: &K) -> KvResult<V> {
        let _guard = self.locks.enter(key.clone());
        self.inner.get(key)
    }

    fn try_get(&self, key: &K) -> KvResult<Option<V>> {
        let _guard = self.locks.enter(key.clone());
        self.inner.try_get(key)
    }

    fn set(&self, key: &K, value: &V) -> KvResult<()> {
        let _guard = self.locks.enter(key.clone());
        self.inner.set(key, value)
    }

    fn contains_key(&self, key: &K) -> KvResult<bool> {
        let _guard = self.locks.enter(key.clone());
        self.inner.contains_key(key)
    }

    fn remove(&self, key: &K) -> KvResult<bool> {
        let _guard = self.locks.enter(key.clone());
        self.inner.remove(key)
    }

    fn flush(&self) -> KvResult<()> {
        let _guard = self.locks.enter_global();
        self.inner.flush()
    }

    fn count(&self) -> KvResult<u64> {
        let _guard = self.locks.enter_global();
        self.inner.count()
    }

    fn entries(&self) -> KvResult<Entries<'_, K, V>> {
        let _guard = self.locks.enter_global();
        let entries: Vec<KvResult<(K, V)>> = self.inner.entries()?.collect();
        Ok(Box::new(entries.into_iter()))
    }

    fn dispose(&self) -> KvResult<()> {
        let _guard = self.locks.enter_global();
        self.inner.dispose()
    }
}

impl<K, V, T> fmt::Debug for ConcurrentKvStore<K, V, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConcurrentKvStore")
            .field("locks", &self.locks)
            .finish_non_exhaustive()
    }
}
