//! Concurrency control for hoard stores.
//!
//! - [`KeyLockRegistry`] -- per-key exclusive locks created on demand, plus a
//!   global barrier for whole-store operations
//! - [`ConcurrentStore`] -- wraps any [`BinaryStore`](hoard_store::BinaryStore)
//!   and routes each operation through a registry
//!
//! The typed counterpart of [`ConcurrentStore`] lives in `hoard-kv`.

pub mod concurrent;
pub mod registry;

pub use concurrent::ConcurrentStore;
pub use registry::{GlobalGuard, KeyGuard, KeyLockRegistry};
