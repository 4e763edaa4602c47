use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::StoreResult;
use crate::partition::PathPartitioner;

/// Configuration for a [`FileStore`](crate::FileStore).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileStoreConfig {
    /// Directory holding the entries.
    pub root: PathBuf,
    /// Number of sub-directories keys are spread over. `None` stores every
    /// key directly under `root`.
    pub partitions: Option<u32>,
    /// `fsync` each staged file before publishing it and the directory
    /// after. Without it a write survives a process crash but not
    /// necessarily a power loss.
    pub sync_writes: bool,
}

impl Default for FileStoreConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("hoard-data"),
            partitions: None,
            sync_writes: true,
        }
    }
}

impl FileStoreConfig {
    /// A flat store rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            ..Default::default()
        }
    }

    /// Spread keys over `partitions` sub-directories.
    pub fn with_partitions(mut self, partitions: u32) -> Self {
        self.partitions = Some(partitions);
        self
    }

    /// Build the path layout described by this configuration.
    pub fn partitioner(&self) -> StoreResult<PathPartitioner> {
        match self.partitions {
            Some(n) => PathPartitioner::partitioned(&self.root, n),
            None => Ok(PathPartitioner::flat(&self.root)),
        }
    }
}
