//! Binary storage backends for hoard.
//!
//! This crate defines the [`BinaryStore`] contract, a byte-blob store
//! addressed by string keys, together with the backends that implement it.
//! Everything above it (the write-back cache, the concurrency wrappers, the
//! typed key-value layer) composes these backends without knowing which one
//! it holds.
//!
//! # Storage Backends
//!
//! - [`FileStore`] -- one file per key, crash-safe writes, optional
//!   partitioning into sub-directories
//! - [`InMemoryStore`] -- `HashMap`-based store for cache tiers and tests
//!
//! # Design Rules
//!
//! 1. A write is either fully visible or not visible at all, even across a
//!    crash (stage, remove, rename).
//! 2. Absence is reported as `None` / [`StoreError::NotFound`], never as
//!    empty content.
//! 3. `try_*` operations absorb absence and key validation only. All I/O
//!    errors are propagated, never silently ignored.
//! 4. The store never interprets values.

pub mod config;
pub mod error;
pub mod file;
pub mod memory;
pub mod partition;
pub mod traits;

// Re-export primary types at crate root for ergonomic imports.
pub use config::FileStoreConfig;
pub use error::{StoreError, StoreResult};
pub use file::{FileStore, RecoveryReport, STAGING_DIR};
pub use memory::InMemoryStore;
pub use partition::PathPartitioner;
pub use traits::{BinaryStore, Keys};
