//! Typed key-value storage for hoard.
//!
//! [`TypedStore`] maps serde keys and values onto any
//! [`BinaryStore`](hoard_store::BinaryStore). Each key is hashed into a
//! fixed-width path; the stored blob carries both key and value so the
//! store can be enumerated and repaired without an index.
//!
//! # Path derivation
//!
//! ```text
//! prefix = "hoard-kv {codec} {store-name} {key-type} {value-type} "
//! text   = prefix + canonical JSON of the key
//! path   = "{len(text)}-{hex(BLAKE3-XOF-512(text))}"
//! ```
//!
//! Entries written with another codec, another backing store name or other
//! types never collide with this store's paths.
//!
//! [`EngineConfig`] assembles the usual stack from TOML: a file store,
//! optionally behind a write-back cache and a per-key lock wrapper.

pub mod codec;
pub mod concurrent;
pub mod config;
pub mod error;
pub mod hasher;
pub mod traits;
pub mod typed;

pub use codec::{BincodeCodec, Codec, JsonCodec, SerializationMethod};
pub use concurrent::ConcurrentKvStore;
pub use config::{DynStore, EngineConfig};
pub use error::{KvError, KvResult};
pub use hasher::KeyHasher;
pub use traits::{Entries, KvStore};
pub use typed::TypedStore;
