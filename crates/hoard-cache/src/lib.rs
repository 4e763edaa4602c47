//! Write-back caching for hoard stores.
//!
//! [`WriteBackCache`] puts a fast [`BinaryStore`](hoard_store::BinaryStore)
//! (usually an [`InMemoryStore`](hoard_store::InMemoryStore)) in front of a
//! slow one and is itself a `BinaryStore`, so it composes with the
//! concurrency wrappers and the typed layer like any other backend.
//!
//! Eviction approximates least-frequently-used with decay: each compaction
//! keeps the most accessed half of the cache and halves the survivors'
//! counters.

pub mod cache;
pub mod config;

pub use cache::WriteBackCache;
pub use config::CacheConfig;
