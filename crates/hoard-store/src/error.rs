use std::path::PathBuf;

/// Errors from binary store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The requested key was not found.
    #[error("key not found: {key}")]
    NotFound { key: String },

    /// The key cannot be stored (reserved prefix, path separators, empty).
    #[error("invalid key {key:?}: {reason}")]
    InvalidKey { key: String, reason: String },

    /// I/O error from the underlying storage medium.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A leftover staged write could be neither discarded nor published.
    #[error("recovery failed for staged file {}: {source}", path.display())]
    RecoveryFailure {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The store configuration is unusable.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl StoreError {
    /// Whether a `try_*` operation may absorb this error.
    ///
    /// Only absence and input validation qualify. Anything coming from the
    /// storage medium must reach the caller.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::NotFound { .. } | Self::InvalidKey { .. })
    }

    pub(crate) fn invalid_key(key: &str, reason: impl Into<String>) -> Self {
        Self::InvalidKey {
            key: key.to_string(),
            reason: reason.into(),
        }
    }
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_absence_and_validation_are_recoverable() {
        assert!(StoreError::NotFound { key: "a".into() }.is_recoverable());
        assert!(StoreError::invalid_key("", "empty").is_recoverable());
        assert!(!StoreError::Io(std::io::Error::other("disk gone")).is_recoverable());
        assert!(!StoreError::InvalidConfig("partitions".into()).is_recoverable());
    }

    #[test]
    fn display_includes_key() {
        let err = StoreError::NotFound { key: "alpha".into() };
        assert_eq!(err.to_string(), "key not found: alpha");
    }
}
