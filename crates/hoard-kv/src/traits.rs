use crate::error::KvResult;

/// Lazy iterator over decoded entries.
///
/// Each call to `entries` starts a new traversal over a fresh listing
/// snapshot; an `Entries` value itself cannot be restarted.
pub type Entries<'a, K, V> = Box<dyn Iterator<Item = KvResult<(K, V)>> + 'a>;

/// Typed key-value store.
///
/// Keys and values are arbitrary serde types. Absence is reported by
/// `try_get` as `None`, by `get` as a not-found error.
pub trait KvStore<K, V>: Send + Sync
where
    K: 'static,
    V: 'static,
{
    /// Read the value for `key`, failing if it is absent.
    fn get(&self, key: &K) -> KvResult<V>;

    /// Read the value for `key`, or `None` if it is absent.
    fn try_get(&self, key: &K) -> KvResult<Option<V>>;

    /// Store `value` under `key`, replacing any previous value.
    fn set(&self, key: &K, value: &V) -> KvResult<()>;

    /// Check whether `key` has a value.
    fn contains_key(&self, key: &K) -> KvResult<bool>;

    /// Remove `key`. Returns `true` if it existed.
    fn remove(&self, key: &K) -> KvResult<bool>;

    /// Flush the backing store.
    fn flush(&self) -> KvResult<()>;

    /// Number of stored entries.
    fn count(&self) -> KvResult<u64>;

    /// Iterate all entries.
    fn entries(&self) -> KvResult<Entries<'_, K, V>>;

    /// Release the store.
    fn dispose(&self) -> KvResult<()> {
        self.flush()
    }

    /// Iterate all keys.
    fn keys(&self) -> KvResult<Box<dyn Iterator<Item = KvResult<K>> + '_>> {
        Ok(Box::new(self.entries()?.map(|e| e.map(|(k, _)| k))))
    }

    /// Iterate all values.
    fn values(&self) -> KvResult<Box<dyn Iterator<Item = KvResult<V>> + '_>> {
        Ok(Box::new(self.entries()?.map(|e| e.map(|(_, v)| v))))
    }
}
