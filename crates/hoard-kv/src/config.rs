use std::path::Path;

use hoard_cache::{CacheConfig, WriteBackCache};
use hoard_store::{BinaryStore, FileStore, FileStoreConfig, InMemoryStore, StoreError};
use hoard_sync::ConcurrentStore;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::codec::SerializationMethod;
use crate::error::{KvError, KvResult};
use crate::typed::TypedStore;

/// Binary stack assembled from an [`EngineConfig`].
pub type DynStore = Box<dyn BinaryStore>;

/// Full engine configuration.
///
/// ```toml
/// serialization = "json"
/// concurrent = true
///
/// [store]
/// root = "/var/lib/hoard"
/// partitions = 16
///
/// [cache]
/// max_size = 4096
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub store: FileStoreConfig,
    /// Write-back cache in front of the file store. Omit to write through.
    pub cache: Option<CacheConfig>,
    pub serialization: SerializationMethod,
    /// Serialize operations per key.
    pub concurrent: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            store: FileStoreConfig::default(),
            cache: None,
            serialization: SerializationMethod::default(),
            concurrent: true,
        }
    }
}

impl EngineConfig {
    /// Parse a configuration from TOML text.
    pub fn from_toml_str(text: &str) -> KvResult<Self> {
        toml::from_str(text).map_err(|e| KvError::Config(e.to_string()))
    }

    /// Read and parse a TOML configuration file.
    pub fn load(path: impl AsRef<Path>) -> KvResult<Self> {
        let text = std::fs::read_to_string(path.as_ref()).map_err(StoreError::from)?;
        Self::from_toml_str(&text)
    }

    /// Open the binary store stack: file store, then the optional cache,
    /// then the optional concurrency wrapper.
    pub fn open_binary(&self) -> KvResult<DynStore> {
        let file = FileStore::open(&self.store)?;
        let report = file.recovery_report();

        let mut store: DynStore = Box::new(file);
        if let Some(cache) = &self.cache {
            store = Box::new(WriteBackCache::with_config(
                InMemoryStore::new(),
                store,
                cache,
            ));
        }
        if self.concurrent {
            store = Box::new(ConcurrentStore::new(store));
        }

        info!(
            root = %self.store.root.display(),
            partitions = ?self.store.partitions,
            cached = self.cache.is_some(),
            concurrent = self.concurrent,
            recovered = report.published + report.discarded,
            "opened store"
        );
        Ok(store)
    }

    /// Open a typed store over the configured binary stack.
    pub fn open<K, V>(&self) -> KvResult<TypedStore<K, V, DynStore>>
    where
        K: Serialize + DeserializeOwned + 'static,
        V: Serialize + DeserializeOwned + 'static,
    {
        Ok(TypedStore::new(self.open_binary()?, self.serialization))
    }
}
