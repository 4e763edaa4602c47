use std::collections::{HashMap, HashSet};

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use hoard_store::{BinaryStore, Keys, StoreResult};

use crate::config::CacheConfig;

/// Access tracking for the keys held in the fast tier.
#[derive(Debug)]
struct CacheState {
    /// Access counter per cached key. Writes start a key at 0, hits add 1.
    access: HashMap<String, u64>,
    /// Cached keys whose value has not reached the slow tier yet.
    dirty: HashSet<String>,
    max_size: usize,
    efficiency: f64,
    disposed: bool,
}

/// Write-back cache composing a fast and a slow [`BinaryStore`].
///
/// Writes land in the fast tier only and are marked dirty. They reach the
/// slow tier on [`flush`](BinaryStore::flush), on eviction, or on
/// [`dispose`](BinaryStore::dispose). Once more than `max_size` keys are
/// tracked, a compaction keeps the `max_size / 2` most accessed keys,
/// writes the dirty ones among the rest through and evicts them, then halves
/// every surviving counter so that stale popularity decays.
///
/// Keys are checked against both tiers' naming rules before they are
/// cached, so a key the slow tier would refuse never becomes dirty.
///
/// The bookkeeping lock is held for the duration of each operation, since a
/// compaction may write back keys other than the caller's. That includes
/// slow-tier I/O on misses, evictions and flushes, so operations on distinct
/// keys do not overlap and a `hoard_sync::ConcurrentStore` on top adds
/// per-key ordering but no parallelism. Ties in the eviction ranking favour
/// the key being inserted.
///
/// Dropping a cache that was not disposed flushes it.
pub struct WriteBackCache<F: BinaryStore, S: BinaryStore> {
    fast: F,
    slow: S,
    state: Mutex<CacheState>,
}

impl<F: BinaryStore, S: BinaryStore> WriteBackCache<F, S> {
    /// Cache `slow` behind `fast` with the default configuration.
    pub fn new(fast: F, slow: S) -> Self {
        Self::with_config(fast, slow, &CacheConfig::default())
    }

    /// Cache `slow` behind `fast`.
    pub fn with_config(fast: F, slow: S, config: &CacheConfig) -> Self {
        Self {
            fast,
            slow,
            state: Mutex::new(CacheState {
                access: HashMap::new(),
                dirty: HashSet::new(),
                max_size: config.max_size,
                efficiency: 1.0,
                disposed: false,
            }),
        }
    }

    /// The fast tier.
    pub fn fast(&self) -> &F {
        &self.fast
    }

    /// The slow tier.
    pub fn slow(&self) -> &S {
        &self.slow
    }

    /// Whether `key` is currently held in the fast tier.
    pub fn is_cached(&self, key: &str) -> StoreResult<bool> {
        self.fast.contains_key(key)
    }

    /// Moving average of the mean access count seen at each compaction.
    pub fn efficiency_factor(&self) -> f64 {
        self.state.lock().efficiency
    }

    /// Current access counter of a cached key.
    pub fn access_count(&self, key: &str) -> Option<u64> {
        self.state.lock().access.get(key).copied()
    }

    /// Number of keys tracked by the cache.
    pub fn tracked_len(&self) -> usize {
        self.state.lock().access.len()
    }

    /// Number of cached keys not yet written to the slow tier.
    pub fn dirty_len(&self) -> usize {
        self.state.lock().dirty.len()
    }

    /// Compaction threshold.
    pub fn max_size(&self) -> usize {
        self.state.lock().max_size
    }

    /// Change the compaction threshold. Takes effect on the next operation.
    pub fn set_max_size(&self, max_size: usize) {
        self.state.lock().max_size = max_size;
    }

    fn compact(&self, state: &mut CacheState, incoming: Option<&str>) -> StoreResult<()> {
        let tracked = state.access.len();
        if tracked <= state.max_size {
            return Ok(());
        }

        let access_sum: u64 = state.access.values().sum();
        let previous = state.efficiency;
        state.efficiency = 0.5 * previous + 0.5 * (access_sum as f64 / tracked as f64);
        info!(
            max_size = state.max_size,
            dirty = state.dirty.len(),
            tracked,
            access_sum,
            previous_efficiency = previous,
            efficiency = state.efficiency,
            "compacting cache"
        );

        let mut ranked: Vec<(String, u64)> = state
            .access
            .iter()
            .map(|(key, count)| (key.clone(), *count))
            .collect();
        // Most accessed first; on ties the incoming key, then key order.
        let is_incoming = |key: &str| incoming == Some(key);
        ranked.sort_by(|a, b| {
            b.1.cmp(&a.1)
                .then_with(|| is_incoming(b.0.as_str()).cmp(&is_incoming(a.0.as_str())))
                .then_with(|| a.0.cmp(&b.0))
        });

        let keep = state.max_size / 2;
        let mut written_back = 0usize;
        for (key, _) in ranked.into_iter().skip(keep) {
            if state.dirty.contains(&key) {
                let value = self.fast.get(&key)?;
                self.slow.set(&key, &value)?;
                state.dirty.remove(&key);
                written_back += 1;
            }
            self.fast.remove(&key)?;
            state.access.remove(&key);
        }

        for count in state.access.values_mut() {
            *count /= 2;
        }

        debug!(
            evicted = tracked - state.access.len(),
            written_back, "cache compaction finished"
        );
        Ok(())
    }

    fn write_back(&self, state: &mut CacheState) -> StoreResult<usize> {
        let mut dirty: Vec<String> = state.dirty.iter().cloned().collect();
        dirty.sort();
        for key in &dirty {
            let value = self.fast.get(key)?;
            self.slow.set(key, &value)?;
            state.dirty.remove(key);
        }
        Ok(dirty.len())
    }
}

impl<F: BinaryStore, S: BinaryStore> BinaryStore for WriteBackCache<F, S> {
    fn name(&self) -> String {
        format!("{}-{}", self.slow.name(), self.fast.name())
    }

    fn try_get(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        let mut state = self.state.lock();

        if let Some(value) = self.fast.try_get(key)? {
            *state.access.entry(key.to_string()).or_insert(0) += 1;
            return Ok(Some(value));
        }

        match self.slow.try_get(key)? {
            Some(value) => {
                self.fast.set(key, &value)?;
                state.access.insert(key.to_string(), 1);
                self.compact(&mut state, Some(key))?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    fn validate_key(&self, key: &str) -> StoreResult<()> {
        self.fast.validate_key(key)?;
        self.slow.validate_key(key)
    }

    fn set(&self, key: &str, value: &[u8]) -> StoreResult<()> {
        self.validate_key(key)?;
        let mut state = self.state.lock();

        self.fast.set(key, value)?;
        state.dirty.insert(key.to_string());
        // A write alone does not count as an access.
        state.access.entry(key.to_string()).or_insert(0);

        self.compact(&mut state, Some(key))
    }

    fn contains_key(&self, key: &str) -> StoreResult<bool> {
        let _state = self.state.lock();
        Ok(self.fast.contains_key(key)? || self.slow.contains_key(key)?)
    }

    fn remove(&self, key: &str) -> StoreResult<bool> {
        let mut state = self.state.lock();

        if !self.fast.remove(key)? {
            return Ok(false);
        }
        state.access.remove(key);
        state.dirty.remove(key);

        self.slow.remove(key)
    }

    fn flush(&self) -> StoreResult<()> {
        let mut state = self.state.lock();
        let written = self.write_back(&mut state)?;
        debug!(written, "flushed dirty cache entries");
        self.slow.flush()
    }

    fn list_keys(&self) -> StoreResult<Keys> {
        let _state = self.state.lock();
        let mut keys: HashSet<String> = self.slow.list_keys()?.collect();
        keys.extend(self.fast.list_keys()?);
        Ok(Box::new(keys.into_iter()))
    }

    fn count(&self) -> StoreResult<u64> {
        let state = self.state.lock();
        let mut count = self.slow.count()?;
        for key in state.access.keys() {
            if !self.slow.contains_key(key)? {
                count += 1;
            }
        }
        Ok(count)
    }

    fn dispose(&self) -> StoreResult<()> {
        let mut state = self.state.lock();
        self.write_back(&mut state)?;
        self.slow.flush()?;

        state.max_size = 0;
        self.compact(&mut state, None)?;
        state.disposed = true;
        Ok(())
    }
}

impl<F: BinaryStore, S: BinaryStore> Drop for WriteBackCache<F, S> {
    fn drop(&mut self) {
        if self.state.get_mut().disposed {
            return;
        }
        if let Err(e) = self.flush() {
            warn!(error = %e, cache = %self.name(), "failed to flush cache on drop");
        }
    }
}

impl<F: BinaryStore, S: BinaryStore> std::fmt::Debug for WriteBackCache<F, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("WriteBackCache")
            .field("name", &self.name())
            .field("tracked", &state.access.len())
            .field("dirty", &state.dirty.len())
            .field("max_size", &state.max_size)
            .field("efficiency", &state.efficiency)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hoard_store::{FileStore, FileStoreConfig, InMemoryStore, StoreError};
    use std::sync::Arc;

    type MemCache = WriteBackCache<InMemoryStore, Arc<InMemoryStore>>;

    fn cache_with(max_size: usize) -> (MemCache, Arc<InMemoryStore>) {
        let slow = Arc::new(InMemoryStore::new());
        let cache = WriteBackCache::with_config(
            InMemoryStore::new(),
            Arc::clone(&slow),
            &CacheConfig { max_size },
        );
        (cache, slow)
    }

    // -----------------------------------------------------------------------
    // Reads and writes
    // -----------------------------------------------------------------------

    #[test]
    fn write_stays_in_fast_tier_until_flush() {
        let (cache, slow) = cache_with(16);
        cache.set("a", b"1").unwrap();

        assert_eq!(cache.get("a").unwrap(), b"1");
        assert!(slow.is_empty());
        assert_eq!(cache.dirty_len(), 1);

        cache.flush().unwrap();
        assert_eq!(slow.get("a").unwrap(), b"1");
        assert_eq!(cache.dirty_len(), 0);
    }

    #[test]
    fn read_after_overwrite_returns_latest() {
        let (cache, _slow) = cache_with(16);
        cache.set("k", b"v1").unwrap();
        cache.set("k", b"v2").unwrap();
        assert_eq!(cache.get("k").unwrap(), b"v2");
        assert_eq!(cache.fast().len(), 1);
    }

    #[test]
    fn write_does_not_count_as_access() {
        let (cache, _slow) = cache_with(16);
        cache.set("k", b"v").unwrap();
        assert_eq!(cache.access_count("k"), Some(0));
        cache.get("k").unwrap();
        cache.get("k").unwrap();
        assert_eq!(cache.access_count("k"), Some(2));
        cache.set("k", b"w").unwrap();
        assert_eq!(cache.access_count("k"), Some(2));
    }

    #[test]
    fn miss_loads_from_slow_tier() {
        let (cache, slow) = cache_with(16);
        slow.set("cold", b"data").unwrap();

        assert!(!cache.is_cached("cold").unwrap());
        assert_eq!(cache.try_get("cold").unwrap(), Some(b"data".to_vec()));
        assert!(cache.is_cached("cold").unwrap());
        assert_eq!(cache.access_count("cold"), Some(1));
        assert_eq!(cache.dirty_len(), 0);
    }

    #[test]
    fn miss_on_both_tiers() {
        let (cache, _slow) = cache_with(16);
        assert!(cache.try_get("nope").unwrap().is_none());
        assert!(matches!(
            cache.get("nope").unwrap_err(),
            StoreError::NotFound { .. }
        ));
        assert_eq!(cache.tracked_len(), 0);
    }

    #[test]
    fn contains_checks_both_tiers() {
        let (cache, slow) = cache_with(16);
        slow.set("s", b"1").unwrap();
        cache.set("c", b"2").unwrap();
        assert!(cache.contains_key("s").unwrap());
        assert!(cache.contains_key("c").unwrap());
        assert!(!cache.contains_key("x").unwrap());
    }

    // -----------------------------------------------------------------------
    // Remove
    // -----------------------------------------------------------------------

    #[test]
    fn remove_cached_key_removes_from_both_tiers() {
        let (cache, slow) = cache_with(16);
        cache.set("k", b"v").unwrap();
        cache.flush().unwrap();

        assert!(cache.remove("k").unwrap());
        assert!(!cache.contains_key("k").unwrap());
        assert!(slow.is_empty());
        assert_eq!(cache.tracked_len(), 0);
    }

    #[test]
    fn remove_unflushed_key_reports_slow_tier_result() {
        let (cache, _slow) = cache_with(16);
        cache.set("k", b"v").unwrap();
        // Never reached the slow tier, so the slow removal finds nothing.
        assert!(!cache.remove("k").unwrap());
        assert!(!cache.contains_key("k").unwrap());
        assert_eq!(cache.dirty_len(), 0);
    }

    #[test]
    fn remove_uncached_key_fails() {
        let (cache, slow) = cache_with(16);
        slow.set("k", b"v").unwrap();
        assert!(!cache.remove("k").unwrap());
        assert!(slow.contains_key("k").unwrap());
    }

    // -----------------------------------------------------------------------
    // Listing and counting
    // -----------------------------------------------------------------------

    #[test]
    fn list_keys_is_union_of_tiers() {
        let (cache, slow) = cache_with(16);
        slow.set("slow-only", b"1").unwrap();
        slow.set("both", b"2").unwrap();
        cache.get("both").unwrap();
        cache.set("cache-only", b"3").unwrap();

        let mut keys: Vec<String> = cache.list_keys().unwrap().collect();
        keys.sort();
        assert_eq!(keys, vec!["both", "cache-only", "slow-only"]);
    }

    #[test]
    fn count_includes_unflushed_keys() {
        let (cache, slow) = cache_with(16);
        slow.set("a", b"1").unwrap();
        cache.get("a").unwrap();
        cache.set("b", b"2").unwrap();
        assert_eq!(cache.count().unwrap(), 2);
        cache.flush().unwrap();
        assert_eq!(cache.count().unwrap(), 2);
    }

    #[test]
    fn name_combines_tiers() {
        let dir = tempfile::tempdir().unwrap();
        let slow = FileStore::open(&FileStoreConfig::new(dir.path())).unwrap();
        let expected = format!("{}-", slow.name());
        let cache = WriteBackCache::new(InMemoryStore::new(), slow);
        assert_eq!(cache.name(), expected);
    }

    // -----------------------------------------------------------------------
    // Compaction
    // -----------------------------------------------------------------------

    #[test]
    fn compaction_bounds_cache_and_writes_back() {
        let (cache, slow) = cache_with(4);
        for i in 0..5u8 {
            cache.set(&format!("k{i}"), &[i]).unwrap();
        }

        assert_eq!(cache.tracked_len(), 2);
        assert_eq!(cache.fast().len(), 2);
        assert_eq!(slow.len(), 3);
        for key in slow.list_keys().unwrap() {
            let i: u8 = key[1..].parse().unwrap();
            assert_eq!(slow.get(&key).unwrap(), vec![i]);
            assert!(!cache.is_cached(&key).unwrap());
        }

        // Nothing is lost across the tiers.
        for i in 0..5u8 {
            assert_eq!(cache.get(&format!("k{i}")).unwrap(), vec![i]);
        }
    }

    #[test]
    fn frequently_read_keys_survive_compaction() {
        let (cache, slow) = cache_with(2);
        cache.set("a", b"A").unwrap();
        cache.set("b", b"B").unwrap();
        for _ in 0..10 {
            cache.get("a").unwrap();
        }
        cache.get("b").unwrap();

        cache.set("c", b"C").unwrap();

        assert!(cache.is_cached("a").unwrap());
        assert!(!cache.is_cached("b").unwrap());
        assert_eq!(slow.get("b").unwrap(), b"B");
        // Survivors are aged.
        assert_eq!(cache.access_count("a"), Some(5));
    }

    #[test]
    fn efficiency_factor_is_moving_average() {
        let (cache, _slow) = cache_with(2);
        assert_eq!(cache.efficiency_factor(), 1.0);

        cache.set("a", b"A").unwrap();
        cache.set("b", b"B").unwrap();
        for _ in 0..10 {
            cache.get("a").unwrap();
        }
        cache.get("b").unwrap();
        cache.set("c", b"C").unwrap();

        // Counters at compaction: a=10, b=1, c=0.
        let expected = 0.5 * 1.0 + 0.5 * (11.0 / 3.0);
        assert!((cache.efficiency_factor() - expected).abs() < 1e-9);
    }

    #[test]
    fn inserted_key_wins_ties() {
        let (cache, slow) = cache_with(2);
        cache.set("a", b"A").unwrap();
        cache.set("b", b"B").unwrap();
        cache.set("c", b"C").unwrap();

        // All counters are 0; the key just written stays cached.
        assert!(cache.is_cached("c").unwrap());
        assert_eq!(cache.tracked_len(), 1);
        assert_eq!(slow.get("a").unwrap(), b"A");
        assert_eq!(slow.get("b").unwrap(), b"B");
        assert!(!slow.contains_key("c").unwrap());
    }

    #[test]
    fn clean_evictions_are_not_written() {
        let (cache, slow) = cache_with(2);
        slow.set("x", b"1").unwrap();
        slow.set("y", b"2").unwrap();
        slow.set("z", b"3").unwrap();
        cache.get("x").unwrap();
        cache.get("y").unwrap();
        cache.get("z").unwrap();

        assert_eq!(cache.tracked_len(), 1);
        assert!(cache.is_cached("z").unwrap());
        assert_eq!(cache.dirty_len(), 0);
        assert_eq!(slow.len(), 3);
    }

    // -----------------------------------------------------------------------
    // Dispose / drop
    // -----------------------------------------------------------------------

    #[test]
    fn dispose_persists_and_empties_cache() {
        let (cache, slow) = cache_with(16);
        cache.set("a", b"1").unwrap();
        cache.set("b", b"2").unwrap();
        cache.get("a").unwrap();

        cache.dispose().unwrap();

        assert_eq!(cache.tracked_len(), 0);
        assert!(cache.fast().is_empty());
        assert_eq!(cache.max_size(), 0);
        assert_eq!(slow.get("a").unwrap(), b"1");
        assert_eq!(slow.get("b").unwrap(), b"2");
    }

    #[test]
    fn drop_flushes_dirty_entries() {
        let slow = Arc::new(InMemoryStore::new());
        {
            let cache = WriteBackCache::new(InMemoryStore::new(), Arc::clone(&slow));
            cache.set("k", b"v").unwrap();
        }
        assert_eq!(slow.get("k").unwrap(), b"v");
    }

    #[test]
    fn key_rejected_by_slow_tier_is_never_cached() {
        let dir = tempfile::tempdir().unwrap();
        let slow = FileStore::open(&FileStoreConfig::new(dir.path())).unwrap();
        let cache = WriteBackCache::with_config(
            InMemoryStore::new(),
            slow,
            &CacheConfig { max_size: 2 },
        );

        assert!(matches!(
            cache.set("a/b", b"v").unwrap_err(),
            StoreError::InvalidKey { .. }
        ));
        assert!(!cache.try_set("a/b", b"v").unwrap());
        assert!(!cache.try_set(".staging", b"v").unwrap());
        assert_eq!(cache.tracked_len(), 0);
        assert!(cache.fast().is_empty());

        cache.set("zeta", b"z").unwrap();
        cache.flush().unwrap();
        for key in ["k1", "k2", "k3"] {
            cache.set(key, key.as_bytes()).unwrap();
        }
        cache.dispose().unwrap();

        assert_eq!(cache.slow().get("zeta").unwrap(), b"z");
        assert_eq!(cache.slow().count().unwrap(), 4);
    }

    #[test]
    fn flush_propagates_slow_tier_io_errors() {
        let dir = tempfile::tempdir().unwrap();
        let slow = FileStore::open(&FileStoreConfig::new(dir.path())).unwrap();
        let cache = WriteBackCache::new(InMemoryStore::new(), slow);
        cache.set("k", b"v").unwrap();

        std::fs::remove_dir_all(dir.path().join(hoard_store::STAGING_DIR)).unwrap();
        assert!(matches!(cache.flush().unwrap_err(), StoreError::Io(_)));
        assert_eq!(cache.dirty_len(), 1);

        std::fs::create_dir_all(dir.path().join(hoard_store::STAGING_DIR)).unwrap();
        cache.flush().unwrap();
        assert_eq!(cache.slow().get("k").unwrap(), b"v");
    }

    // -----------------------------------------------------------------------
    // Composition
    // -----------------------------------------------------------------------

    #[test]
    fn concurrent_wrapper_over_cache() {
        use hoard_sync::ConcurrentStore;
        use std::thread;

        let dir = tempfile::tempdir().unwrap();
        let slow = FileStore::open(&FileStoreConfig::new(dir.path()).with_partitions(4)).unwrap();
        let cache = WriteBackCache::with_config(
            InMemoryStore::new(),
            slow,
            &CacheConfig { max_size: 8 },
        );
        let store = Arc::new(ConcurrentStore::new(cache));

        let handles: Vec<_> = (0..4)
            .map(|t| {
                let store = Arc::clone(&store);
                thread::spawn(move || {
                    for i in 0..25u32 {
                        let key = format!("t{t}-{}", i % 5);
                        let value = format!("{t}/{i}").into_bytes();
                        store.set(&key, &value).unwrap();
                        assert_eq!(store.get(&key).unwrap(), value);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().expect("thread should not panic");
        }

        store.flush().unwrap();
        assert_eq!(store.count().unwrap(), 20);
        assert_eq!(store.inner().slow().count().unwrap(), 20);
    }
}
