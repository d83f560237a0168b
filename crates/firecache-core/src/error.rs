use std::path::PathBuf;

use thiserror::Error;

/// Failures reported by a [`StorageAdapter`](crate::storage::StorageAdapter).
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Storage file is corrupt: {path}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Storage unavailable: {0}")]
    Unavailable(String),
}

#[derive(Error, Debug)]
pub enum CacheError {
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// A cached record exists but is not valid JSON for the requested type.
    #[error("Failed to parse cached record {key}")]
    Parse {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to serialize value for {key}")]
    Serialize {
        key: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Error reported by the remote database when it cancels a listener.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{code}: {message}")]
pub struct DatabaseError {
    pub code: String,
    pub message: String,
}

impl DatabaseError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }

    pub fn permission_denied(path: &str) -> Self {
        Self::new(
            "permission_denied",
            format!("Client doesn't have permission to access the desired data at /{}", path),
        )
    }

    pub fn is_permission_denied(&self) -> bool {
        self.code == "permission_denied"
    }
}

/// Result type for cache operations.
pub type Result<T> = std::result::Result<T, CacheError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_permission_denied_display() {
        let err = DatabaseError::permission_denied("items/secret");
        assert!(err.is_permission_denied());
        assert_eq!(
            err.to_string(),
            "permission_denied: Client doesn't have permission to access the desired data at /items/secret"
        );
    }

    #[test]
    fn test_storage_error_converts_into_cache_error() {
        let err: CacheError = StorageError::Unavailable("offline".to_string()).into();
        assert!(matches!(err, CacheError::Storage(StorageError::Unavailable(_))));
        assert_eq!(err.to_string(), "Storage unavailable: offline");
    }
}
