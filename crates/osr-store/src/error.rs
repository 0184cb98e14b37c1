use std::io;

/// Errors from object store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The bucket does not exist.
    #[error("no such bucket: {0}")]
    NoSuchBucket(String),

    /// The object does not exist in an existing bucket.
    #[error("no such key: {bucket}/{key}")]
    NoSuchKey { bucket: String, key: String },

    /// A bucket with this name already exists.
    #[error("bucket already exists: {0}")]
    BucketAlreadyExists(String),

    /// The bucket name violates the naming rules.
    #[error("invalid bucket name {name:?}: {reason}")]
    InvalidBucketName { name: String, reason: String },

    /// The object key cannot be stored by this backend.
    #[error("invalid object key {key:?}: {reason}")]
    InvalidKey { key: String, reason: String },

    /// I/O error from the backend or from a put source stream.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Any other failure talking to the store.
    #[error("transport error: {0}")]
    Transport(String),
}

impl StoreError {
    /// Returns `true` if this error is a "not found" signal for a bucket or key.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NoSuchBucket(_) | Self::NoSuchKey { .. })
    }
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_classification() {
        assert!(StoreError::NoSuchBucket("b".into()).is_not_found());
        assert!(StoreError::NoSuchKey {
            bucket: "b".into(),
            key: "k".into()
        }
        .is_not_found());
        assert!(!StoreError::Transport("reset".into()).is_not_found());
        assert!(!StoreError::BucketAlreadyExists("b".into()).is_not_found());
    }

    #[test]
    fn display_includes_address() {
        let err = StoreError::NoSuchKey {
            bucket: "photos".into(),
            key: "2024/cat.jpg".into(),
        };
        assert_eq!(err.to_string(), "no such key: photos/2024/cat.jpg");
    }
}
