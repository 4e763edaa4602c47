//! Crash-safe, file-per-key binary store.
//!
//! Every write is first staged under `<root>/.staging`, which mirrors the
//! partition layout of the root, and then published with a rename. A crash
//! at any point leaves either the previous value or the new one visible,
//! never a partially written file. Staged files that survive a crash are
//! resolved when the store is next opened.

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, info};
use walkdir::WalkDir;

use crate::config::FileStoreConfig;
use crate::error::{StoreError, StoreResult};
use crate::partition::PathPartitioner;
use crate::traits::{BinaryStore, Keys};

/// Name of the staging directory under the store root. Keys starting with
/// this prefix are rejected.
pub const STAGING_DIR: &str = ".staging";

/// Outcome of the startup scan over the staging directory.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RecoveryReport {
    /// Staged files moved into place because no published copy existed.
    pub published: usize,
    /// Stale staged files deleted because a published copy existed.
    pub discarded: usize,
}

impl RecoveryReport {
    /// Whether the scan found anything to resolve.
    pub fn is_clean(&self) -> bool {
        self.published == 0 && self.discarded == 0
    }
}

/// Binary store keeping one file per key on the local filesystem.
#[derive(Debug)]
pub struct FileStore {
    paths: PathPartitioner,
    staging: PathPartitioner,
    sync_writes: bool,
    recovery: RecoveryReport,
}

impl FileStore {
    /// Open (or create) the store described by `config`.
    pub fn open(config: &FileStoreConfig) -> StoreResult<Self> {
        Self::with_partitioner(config.partitioner()?, config.sync_writes)
    }

    /// Open (or create) a store using an explicit path layout.
    ///
    /// Creates every partition directory, then resolves leftover staged
    /// writes. A staged file that can be neither deleted nor published
    /// aborts the open with [`StoreError::RecoveryFailure`].
    pub fn with_partitioner(paths: PathPartitioner, sync_writes: bool) -> StoreResult<Self> {
        let staging = paths.with_root(paths.root().join(STAGING_DIR));

        for dir in paths
            .possible_directories()
            .into_iter()
            .chain(staging.possible_directories())
        {
            fs::create_dir_all(&dir)?;
        }

        let mut store = Self {
            paths,
            staging,
            sync_writes,
            recovery: RecoveryReport::default(),
        };
        store.recovery = store.recover()?;
        Ok(store)
    }

    /// Root directory of the store.
    pub fn root(&self) -> &Path {
        self.paths.root()
    }

    /// The path layout in use.
    pub fn partitioner(&self) -> &PathPartitioner {
        &self.paths
    }

    /// What the startup recovery scan did.
    pub fn recovery_report(&self) -> RecoveryReport {
        self.recovery
    }

    /// Staging location for `key`.
    pub fn staging_path(&self, key: &str) -> PathBuf {
        self.staging.get_path(key)
    }

    fn recover(&self) -> StoreResult<RecoveryReport> {
        let staging_root = self.staging.root();
        let mut report = RecoveryReport::default();

        for entry in WalkDir::new(staging_root).min_depth(1) {
            let entry = entry.map_err(|e| StoreError::Io(e.into()))?;
            if !entry.file_type().is_file() {
                continue;
            }

            let staged = entry.path();
            let Ok(relative) = staged.strip_prefix(staging_root) else {
                continue;
            };
            let target = self.root().join(relative);

            if target.exists() {
                fs::remove_file(staged).map_err(|source| StoreError::RecoveryFailure {
                    path: staged.to_path_buf(),
                    source,
                })?;
                debug!(path = %staged.display(), "discarded stale staged write");
                report.discarded += 1;
            } else {
                fs::rename(staged, &target).map_err(|source| StoreError::RecoveryFailure {
                    path: staged.to_path_buf(),
                    source,
                })?;
                debug!(path = %target.display(), "published staged write");
                report.published += 1;
            }
        }

        if !report.is_clean() {
            info!(
                root = %self.root().display(),
                published = report.published,
                discarded = report.discarded,
                "recovered interrupted writes"
            );
        }
        Ok(report)
    }

    fn check_key(key: &str) -> StoreResult<()> {
        if key.is_empty() {
            return Err(StoreError::invalid_key(key, "key is empty"));
        }
        if key.starts_with(STAGING_DIR) {
            return Err(StoreError::invalid_key(
                key,
                format!("key must not start with reserved prefix <{STAGING_DIR}>"),
            ));
        }
        if key == "." || key == ".." || key.contains(['/', '\\', '\0']) {
            return Err(StoreError::invalid_key(key, "key must be a plain file name"));
        }
        Ok(())
    }

    fn collect_keys(&self) -> StoreResult<Vec<String>> {
        let mut keys = Vec::new();
        for dir in self.paths.possible_directories() {
            for entry in fs::read_dir(&dir)? {
                let entry = entry?;
                if !entry.file_type()?.is_file() {
                    continue;
                }
                if let Ok(name) = entry.file_name().into_string() {
                    keys.push(name);
                }
            }
        }
        Ok(keys)
    }
}

fn remove_if_exists(path: &Path) -> io::Result<bool> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}

/// Persist the directory entry created by a rename.
#[cfg(unix)]
fn sync_parent(path: &Path) -> io::Result<()> {
    match path.parent() {
        Some(parent) => File::open(parent)?.sync_all(),
        None => Ok(()),
    }
}

#[cfg(not(unix))]
fn sync_parent(_path: &Path) -> io::Result<()> {
    Ok(())
}

impl BinaryStore for FileStore {
    fn name(&self) -> String {
        self.root().display().to_string()
    }

    fn validate_key(&self, key: &str) -> StoreResult<()> {
        Self::check_key(key)
    }

    fn get(&self, key: &str) -> StoreResult<Vec<u8>> {
        Self::check_key(key)?;
        self.try_get(key)?.ok_or_else(|| StoreError::NotFound {
            key: key.to_string(),
        })
    }

    fn try_get(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        if Self::check_key(key).is_err() {
            return Ok(None);
        }
        match fs::read(self.paths.get_path(key)) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set(&self, key: &str, value: &[u8]) -> StoreResult<()> {
        Self::check_key(key)?;

        let target = self.paths.get_path(key);
        let staged = self.staging.get_path(key);

        {
            let mut file = File::create(&staged)?;
            file.write_all(value)?;
            if self.sync_writes {
                file.sync_all()?;
            }
        }

        // Delete-then-rename: a crash between the two leaves only the staged
        // copy, which recovery publishes.
        remove_if_exists(&target)?;
        fs::rename(&staged, &target)?;
        if self.sync_writes {
            sync_parent(&target)?;
        }

        debug!(key, len = value.len(), "stored entry");
        Ok(())
    }

    fn contains_key(&self, key: &str) -> StoreResult<bool> {
        if Self::check_key(key).is_err() {
            return Ok(false);
        }
        match fs::metadata(self.paths.get_path(key)) {
            Ok(meta) => Ok(meta.is_file()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn remove(&self, key: &str) -> StoreResult<bool> {
        if Self::check_key(key).is_err() {
            return Ok(false);
        }
        Ok(remove_if_exists(&self.paths.get_path(key))?)
    }

    fn flush(&self) -> StoreResult<()> {
        // Writes are published before `set` returns.
        Ok(())
    }

    fn list_keys(&self) -> StoreResult<Keys> {
        Ok(Box::new(self.collect_keys()?.into_iter()))
    }

    fn count(&self) -> StoreResult<u64> {
        Ok(self.collect_keys()?.len() as u64)
    }
}
