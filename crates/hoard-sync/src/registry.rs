//! Fine-grained mutual exclusion over an open-ended key space.
//!
//! [`KeyLockRegistry`] hands out one exclusive lock per key, created on
//! demand and deregistered as soon as it is released, so memory use tracks
//! the number of keys currently in use rather than the number ever seen.
//! A global barrier sits in front of every per-key lock: per-key holders
//! take it shared, [`KeyLockRegistry::enter_global`] takes it exclusively.
//!
//! Waiters are not queued fairly. Under heavy contention on one key a
//! thread may be overtaken repeatedly. Acquisition never times out.

use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::sync::Arc;

use parking_lot::{Condvar, Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Signal shared by the holder of a key and everyone waiting for it.
struct Handle {
    released: Mutex<bool>,
    cond: Condvar,
}

impl Handle {
    fn held() -> Self {
        Self {
            released: Mutex::new(false),
            cond: Condvar::new(),
        }
    }

    fn wait(&self) {
        let mut released = self.released.lock();
        while !*released {
            self.cond.wait(&mut released);
        }
    }

    fn release(&self) {
        *self.released.lock() = true;
        self.cond.notify_all();
    }
}

/// Registry of per-key exclusive locks plus a global barrier.
///
/// A thread must not hold two guards from the same registry at once: a
/// pending global acquisition between the two would deadlock it.
pub struct KeyLockRegistry<K> {
    // Only held for lookup/insert/remove, never while a caller owns a key.
    handles: Mutex<HashMap<K, Arc<Handle>>>,
    barrier: RwLock<()>,
}

impl<K: Eq + Hash + Clone> KeyLockRegistry<K> {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            handles: Mutex::new(HashMap::new()),
            barrier: RwLock::new(()),
        }
    }

    /// Lock `key`, blocking while another thread holds it or while a global
    /// lock is held.
    pub fn enter(&self, key: K) -> KeyGuard<'_, K> {
        let shared = self.barrier.read();

        loop {
            let current = {
                let mut handles = self.handles.lock();
                match handles.get(&key) {
                    Some(handle) => Arc::clone(handle),
                    None => {
                        handles.insert(key.clone(), Arc::new(Handle::held()));
                        break;
                    }
                }
            };
            // The released handle is already gone from the map; race the
            // other waiters to register a fresh one.
            current.wait();
        }

        KeyGuard {
            registry: self,
            key,
            _shared: shared,
        }
    }

    /// Lock the whole registry, blocking until every per-key lock has been
    /// released. New per-key acquisitions wait until the guard is dropped.
    pub fn enter_global(&self) -> GlobalGuard<'_> {
        GlobalGuard {
            _exclusive: self.barrier.write(),
        }
    }

    /// Number of keys currently locked.
    pub fn active_keys(&self) -> usize {
        self.handles.lock().len()
    }

    fn exit(&self, key: &K) {
        let handle = self.handles.lock().remove(key);
        if let Some(handle) = handle {
            handle.release();
        }
    }
}

impl<K: Eq + Hash + Clone> Default for KeyLockRegistry<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K> fmt::Debug for KeyLockRegistry<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyLockRegistry")
            .field("active_keys", &self.handles.lock().len())
            .finish()
    }
}

/// Exclusive hold on one key. Released when dropped.
#[must_use = "the key is unlocked as soon as the guard is dropped"]
pub struct KeyGuard<'a, K: Eq + Hash + Clone> {
    registry: &'a KeyLockRegistry<K>,
    key: K,
    // Dropped after `Drop::drop` deregisters the key.
    _shared: RwLockReadGuard<'a, ()>,
}

impl<K: Eq + Hash + Clone> KeyGuard<'_, K> {
    /// The locked key.
    pub fn key(&self) -> &K {
        &self.key
    }

    /// Release the key now.
    pub fn exit(self) {}
}

impl<K: Eq + Hash + Clone> Drop for KeyGuard<'_, K> {
    fn drop(&mut self) {
        self.registry.exit(&self.key);
    }
}

/// Exclusive hold on a whole registry. Released when dropped.
#[must_use = "the registry is unlocked as soon as the guard is dropped"]
pub struct GlobalGuard<'a> {
    _exclusive: RwLockWriteGuard<'a, ()>,
}

impl GlobalGuard<'_> {
    /// Release the registry now.
    pub fn exit(self) {}
}
