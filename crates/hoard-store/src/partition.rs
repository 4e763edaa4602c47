//! Mapping of keys to file paths, optionally sharded across sub-directories.

use std::path::{Path, PathBuf};

use crate::error::{StoreError, StoreResult};

/// Maps store keys to paths below a root directory.
///
/// A flat partitioner places every key directly under the root. A
/// partitioned one spreads keys over `N` numbered sub-directories so that
/// no single directory grows without bound. The partition of a key is the
/// sum of its characters modulo `N`, which is stable across processes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PathPartitioner {
    root: PathBuf,
    partitions: Option<u32>,
}

impl PathPartitioner {
    /// All keys directly under `root`.
    pub fn flat(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            partitions: None,
        }
    }

    /// Keys spread over `partitions` sub-directories of `root`.
    pub fn partitioned(root: impl Into<PathBuf>, partitions: u32) -> StoreResult<Self> {
        if partitions == 0 {
            return Err(StoreError::InvalidConfig(
                "partition count must be at least 1".into(),
            ));
        }
        Ok(Self {
            root: root.into(),
            partitions: Some(partitions),
        })
    }

    /// The root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Number of partitions, or `None` for the flat layout.
    pub fn partitions(&self) -> Option<u32> {
        self.partitions
    }

    /// The same layout anchored at a different root.
    pub fn with_root(&self, root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            partitions: self.partitions,
        }
    }

    /// Partition index for `key`, or `None` for the flat layout.
    pub fn partition_of(&self, key: &str) -> Option<u32> {
        self.partitions.map(|n| {
            let sum = key
                .chars()
                .fold(0u64, |acc, c| acc.wrapping_add(u64::from(c)));
            (sum % u64::from(n)) as u32
        })
    }

    /// Full path of the file holding `key`.
    pub fn get_path(&self, key: &str) -> PathBuf {
        match self.partition_of(key) {
            Some(p) => self.root.join(p.to_string()).join(key),
            None => self.root.join(key),
        }
    }

    /// Every directory a key can land in.
    pub fn possible_directories(&self) -> Vec<PathBuf> {
        match self.partitions {
            Some(n) => (0..n).map(|p| self.root.join(p.to_string())).collect(),
            None => vec![self.root.clone()],
        }
    }
}
