use serde::{Deserialize, Serialize};

/// Configuration for a [`WriteBackCache`](crate::WriteBackCache).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Number of tracked keys above which a compaction runs. A compaction
    /// keeps the `max_size / 2` most frequently used keys.
    pub max_size: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self { max_size: 1024 }
    }
}
