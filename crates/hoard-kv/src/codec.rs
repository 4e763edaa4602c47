//! Encoding of `(key, value)` pairs into stored blobs.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{KvError, KvResult};

/// Encodes and decodes the `(key, value)` pair stored in each entry.
///
/// The codec id is folded into every entry path, so switching codecs makes
/// old entries unreachable rather than misread.
pub trait Codec: Send + Sync {
    /// Stable identifier of the wire format.
    fn id(&self) -> &'static str;

    /// Encode a pair.
    fn encode<K: Serialize, V: Serialize>(&self, key: &K, value: &V) -> KvResult<Vec<u8>>;

    /// Decode a pair.
    fn decode<K: DeserializeOwned, V: DeserializeOwned>(&self, bytes: &[u8]) -> KvResult<(K, V)>;
}

/// Compact binary encoding via `bincode`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BincodeCodec;

impl Codec for BincodeCodec {
    fn id(&self) -> &'static str {
        "bincode"
    }

    fn encode<K: Serialize, V: Serialize>(&self, key: &K, value: &V) -> KvResult<Vec<u8>> {
        bincode::serialize(&(key, value)).map_err(|e| KvError::Serialization(e.to_string()))
    }

    fn decode<K: DeserializeOwned, V: DeserializeOwned>(&self, bytes: &[u8]) -> KvResult<(K, V)> {
        bincode::deserialize(bytes).map_err(|e| KvError::Serialization(e.to_string()))
    }
}

/// Self-describing JSON encoding via `serde_json`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn id(&self) -> &'static str {
        "json"
    }

    fn encode<K: Serialize, V: Serialize>(&self, key: &K, value: &V) -> KvResult<Vec<u8>> {
        serde_json::to_vec(&(key, value)).map_err(|e| KvError::Serialization(e.to_string()))
    }

    fn decode<K: DeserializeOwned, V: DeserializeOwned>(&self, bytes: &[u8]) -> KvResult<(K, V)> {
        serde_json::from_slice(bytes).map_err(|e| KvError::Serialization(e.to_string()))
    }
}

/// Codec selected by configuration.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SerializationMethod {
    #[default]
    Bincode,
    Json,
}

impl Codec for SerializationMethod {
    fn id(&self) -> &'static str {
        match self {
            Self::Bincode => BincodeCodec.id(),
            Self::Json => JsonCodec.id(),
        }
    }

    fn encode<K: Serialize, V: Serialize>(&self, key: &K, value: &V) -> KvResult<Vec<u8>> {
        match self {
            Self::Bincode => BincodeCodec.encode(key, value),
            Self::Json => JsonCodec.encode(key, value),
        }
    }

    fn decode<K: DeserializeOwned, V: DeserializeOwned>(&self, bytes: &[u8]) -> KvResult<(K, V)> {
        match self {
            Self::Bincode => BincodeCodec.decode(bytes),
            Self::Json => JsonCodec.decode(bytes),
        }
    }
}
