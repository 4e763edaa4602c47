use hoard_store::StoreError;

/// Errors from typed key-value operations.
#[derive(Debug, thiserror::Error)]
pub enum KvError {
    /// Error from the backing binary store, passed through unchanged.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The stored blob is empty or cannot be decoded.
    #[error("corrupt entry at {path}: {reason}")]
    CorruptEntry { path: String, reason: String },

    /// A key or value could not be encoded.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// The engine configuration could not be read or parsed.
    #[error("configuration error: {0}")]
    Config(String),
}

impl KvError {
    /// Whether this error reports an absent key.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Store(StoreError::NotFound { .. }))
    }
}

/// Result alias for typed key-value operations.
pub type KvResult<T> = Result<T, KvError>;
