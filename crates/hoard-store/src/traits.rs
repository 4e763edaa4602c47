use std::sync::Arc;

use crate::error::{StoreError, StoreResult};

/// Lazy, finite sequence of keys captured when `list_keys` was called.
pub type Keys = Box<dyn Iterator<Item = String> + Send>;

/// Byte-blob store addressed by string keys.
///
/// All implementations must satisfy these invariants:
/// - `get` on an absent key fails with [`StoreError::NotFound`].
/// - The `try_*` operations absorb only absence and key validation
///   failures. Backend failures (disk, permissions, connectivity) are
///   returned as errors from every operation.
/// - The store never interprets values.
pub trait BinaryStore: Send + Sync {
    /// Diagnostic identity of the store.
    fn name(&self) -> String;

    /// Read the value stored under `key`.
    ///
    /// Returns `Ok(None)` if the key does not exist.
    fn try_get(&self, key: &str) -> StoreResult<Option<Vec<u8>>>;

    /// Store `value` under `key`, replacing any previous value.
    fn set(&self, key: &str, value: &[u8]) -> StoreResult<()>;

    /// Check whether `key` exists.
    fn contains_key(&self, key: &str) -> StoreResult<bool>;

    /// Remove `key`. Returns `true` if the key existed.
    fn remove(&self, key: &str) -> StoreResult<bool>;

    /// Push any buffered data down to durable storage.
    fn flush(&self) -> StoreResult<()>;

    /// Snapshot of all keys currently stored.
    fn list_keys(&self) -> StoreResult<Keys>;

    /// Number of keys currently stored.
    fn count(&self) -> StoreResult<u64>;

    /// Check `key` against the store's naming rules without touching
    /// storage. Fails with [`StoreError::InvalidKey`]; accepts everything by
    /// default.
    fn validate_key(&self, _key: &str) -> StoreResult<()> {
        Ok(())
    }

    /// Read the value stored under `key`, failing if it is absent.
    fn get(&self, key: &str) -> StoreResult<Vec<u8>> {
        self.try_get(key)?.ok_or_else(|| StoreError::NotFound {
            key: key.to_string(),
        })
    }

    /// Store `value` under `key`. Returns `false` if the key was rejected.
    fn try_set(&self, key: &str, value: &[u8]) -> StoreResult<bool> {
        match self.set(key, value) {
            Ok(()) => Ok(true),
            Err(e) if e.is_recoverable() => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Release the store. Implementations holding buffered state flush it.
    fn dispose(&self) -> StoreResult<()> {
        self.flush()
    }
}

impl<T: BinaryStore + ?Sized> BinaryStore for Arc<T> {
    fn name(&self) -> String {
        (**self).name()
    }

    fn try_get(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        (**self).try_get(key)
    }

    fn set(&self, key: &str, value: &[u8]) -> StoreResult<()> {
        (**self).set(key, value)
    }

    fn contains_key(&self, key: &str) -> StoreResult<bool> {
        (**self).contains_key(key)
    }

    fn remove(&self, key: &str) -> StoreResult<bool> {
        (**self).remove(key)
    }

    fn flush(&self) -> StoreResult<()> {
        (**self).flush()
    }

    fn list_keys(&self) -> StoreResult<Keys> {
        (**self).list_keys()
    }

    fn count(&self) -> StoreResult<u64> {
        (**self).count()
    }

    fn validate_key(&self, key: &str) -> StoreResult<()> {
        (**self).validate_key(key)
    }

    fn get(&self, key: &str) -> StoreResult<Vec<u8>> {
        (**self).get(key)
    }

    fn try_set(&self, key: &str, value: &[u8]) -> StoreResult<bool> {
        (**self).try_set(key, value)
    }

    fn dispose(&self) -> StoreResult<()> {
        (**self).dispose()
    }
}

impl<T: BinaryStore + ?Sized> BinaryStore for Box<T> {
    fn name(&self) -> String {
        (**self).name()
    }

    fn try_get(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        (**self).try_get(key)
    }

    fn set(&self, key: &str, value: &[u8]) -> StoreResult<()> {
        (**self).set(key, value)
    }

    fn contains_key(&self, key: &str) -> StoreResult<bool> {
        (**self).contains_key(key)
    }

    fn remove(&self, key: &str) -> StoreResult<bool> {
        (**self).remove(key)
    }

    fn flush(&self) -> StoreResult<()> {
        (**self).flush()
    }

    fn list_keys(&self) -> StoreResult<Keys> {
        (**self).list_keys()
    }

    fn count(&self) -> StoreResult<u64> {
        (**self).count()
    }

    fn validate_key(&self, key: &str) -> StoreResult<()> {
        (**self).validate_key(key)
    }

    fn get(&self, key: &str) -> StoreResult<Vec<u8>> {
        (**self).get(key)
    }

    fn try_set(&self, key: &str, value: &[u8]) -> StoreResult<bool> {
        (**self).try_set(key, value)
    }

    fn dispose(&self) -> StoreResult<()> {
        (**self).dispose()
    }
}
