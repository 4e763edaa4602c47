use std::fmt;
use std::marker::PhantomData;

use hoard_store::BinaryStore;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::codec::{Codec, SerializationMethod};
use crate::error::{KvError, KvResult};
use crate::hasher::KeyHasher;
use crate::traits::{Entries, KvStore};

/// Typed key-value store over a [`BinaryStore`].
///
/// Each entry lives at a path derived by hashing the key's canonical JSON
/// form under a prefix naming the codec, the backing store and both types.
/// The stored blob holds the encoded `(key, value)` pair so entries can be
/// enumerated and re-homed without a separate index.
///
/// The canonical form sorts map keys, so `HashMap` keys (and structs
/// holding them) derive one path regardless of iteration order. Sequences
/// keep their order: set-like keys must use an ordered collection such as
/// `BTreeSet`, since a `HashSet` serializes in iteration order and equal
/// sets could land on different paths.
pub struct TypedStore<K, V, S, C = SerializationMethod> {
    backing: S,
    codec: C,
    hasher: KeyHasher,
    _types: PhantomData<fn() -> (K, V)>,
}

impl<K, V, S, C> TypedStore<K, V, S, C>
where
    K: Serialize + DeserializeOwned + 'static,
    V: Serialize + DeserializeOwned + 'static,
    S: BinaryStore,
    C: Codec,
{
    /// Create a typed store over `backing` using `codec`.
    pub fn new(backing: S, codec: C) -> Self {
        let hasher = KeyHasher::for_types::<K, V>(codec.id(), &backing.name());
        Self {
            backing,
            codec,
            hasher,
            _types: PhantomData,
        }
    }

    /// Backing-store path holding the entry for `key`.
    pub fn path_for(&self, key: &K) -> KvResult<String> {
        let canonical =
            serde_json::to_value(key).map_err(|e| KvError::Serialization(e.to_string()))?;
        Ok(self.hasher.path(&canonical.to_string()))
    }

    /// The backing binary store.
    pub fn backing(&self) -> &S {
        &self.backing
    }

    /// Unwrap the backing store.
    pub fn into_backing(self) -> S {
        self.backing
    }

    /// The codec in use.
    pub fn codec(&self) -> &C {
        &self.codec
    }

    /// Move every entry stored under a stale path to the path its key
    /// derives to now. Returns the number of entries moved.
    ///
    /// Paths go stale when the backing store's name changes, for example
    /// after a file store's root directory was moved. Corrupt entries are
    /// logged and left in place.
    pub fn repair_paths(&self) -> KvResult<usize> {
        let mut moved = 0;
        for path in self.backing.list_keys()? {
            let Some(raw) = self.backing.try_get(&path)? else {
                continue;
            };
            let key = match self.decode(&path, &raw) {
                Ok((key, _)) => key,
                Err(KvError::CorruptEntry { path, reason }) => {
                    warn!(%path, %reason, "skipping corrupt entry during repair");
                    continue;
                }
                Err(e) => return Err(e),
            };
            let expected = self.path_for(&key)?;
            if expected == path {
                continue;
            }
            self.backing.set(&expected, &raw)?;
            self.backing.remove(&path)?;
            debug!(from = %path, to = %expected, "re-homed entry");
            moved += 1;
        }
        if moved > 0 {
            info!(moved, store = %self.backing.name(), "repaired entry paths");
        }
        Ok(moved)
    }

    fn decode(&self, path: &str, bytes: &[u8]) -> KvResult<(K, V)> {
        if bytes.is_empty() {
            return Err(KvError::CorruptEntry {
                path: path.to_string(),
                reason: "empty blob".into(),
            });
        }
        self.codec
            .decode(bytes)
            .map_err(|e| KvError::CorruptEntry {
                path: path.to_string(),
                reason: e.to_string(),
            })
    }

    fn read_entry(&self, path: &str) -> KvResult<Option<(K, V)>> {
        match self.backing.try_get(path)? {
            Some(bytes) => self.decode(path, &bytes).map(Some),
            None => Ok(None),
        }
    }
}

impl<K, V, S, C> KvStore<K, V> for TypedStore<K, V, S, C>
where
    K: Serialize + DeserializeOwned + 'static,
    V: Serialize + DeserializeOwned + 'static,
    S: BinaryStore,
    C: Codec,
{
    fn get(&self, key: &K) -> KvResult<V> {
        let path = self.path_for(key)?;
        let bytes = self.backing.get(&path)?;
        Ok(self.decode(&path, &bytes)?.1)
    }

    fn try_get(&self, key: &K) -> KvResult<Option<V>> {
        let path = self.path_for(key)?;
        Ok(self.read_entry(&path)?.map(|(_, v)| v))
    }

    fn set(&self, key: &K, value: &V) -> KvResult<()> {
        let path = self.path_for(key)?;
        let bytes = self.codec.encode(key, value)?;
        self.backing.set(&path, &bytes)?;
        Ok(())
    }

    fn contains_key(&self, key: &K) -> KvResult<bool> {
        let path = self.path_for(key)?;
        Ok(self.backing.contains_key(&path)?)
    }

    fn remove(&self, key: &K) -> KvResult<bool> {
        let path = self.path_for(key)?;
        Ok(self.backing.remove(&path)?)
    }

    fn flush(&self) -> KvResult<()> {
        Ok(self.backing.flush()?)
    }

    fn count(&self) -> KvResult<u64> {
        Ok(self.backing.count()?)
    }

    fn entries(&self) -> KvResult<Entries<'_, K, V>> {
        let paths = self.backing.list_keys()?;
        Ok(Box::new(
            paths.filter_map(move |path| self.read_entry(&path).transpose()),
        ))
    }

    fn dispose(&self) -> KvResult<()> {
        Ok(self.backing.dispose()?)
    }
}

impl<K, V, S, C: fmt::Debug> fmt::Debug for TypedStore<K, V, S, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypedStore")
            .field("codec", &self.codec)
            .field("prefix", &self.hasher.prefix())
            .finish()
    }
}
