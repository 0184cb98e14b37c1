use std::io;

use osr_store::StoreError;

/// Errors surfaced by object storage resources.
///
/// Store errors never escape as-is: the existence checks and the uploader map
/// them into one of these kinds, keeping only the store's message.
#[derive(Debug, thiserror::Error)]
pub enum ResourceError {
    /// The location is not a valid `scheme://bucket[/key]` address.
    #[error("malformed address {uri:?}: {reason}")]
    MalformedAddress { uri: String, reason: String },

    /// The operation is not legal for the target kind (bucket vs. object).
    #[error("{0}")]
    IllegalOperation(String),

    /// The bucket or object does not exist.
    #[error("{0}")]
    NotFound(String),

    /// A remote call failed for a reason other than "not found".
    #[error("{operation} failed: {message}")]
    Transport {
        operation: &'static str,
        message: String,
    },

    /// The background upload failed; reported when the write stream closes.
    #[error("upload to {target} failed: {message}")]
    UploadFailure { target: String, message: String },

    /// The resource cannot support this operation at all.
    #[error("{0}")]
    UnsupportedOperation(String),

    /// The upload executor has been shut down and accepts no new uploads.
    #[error("upload executor is shut down")]
    ExecutorShutdown,

    /// Local I/O failure (config files, worker threads).
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Configuration could not be loaded or is invalid.
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl ResourceError {
    /// Map a store error from `operation` into the resource taxonomy.
    pub(crate) fn from_store(operation: &'static str, err: StoreError) -> Self {
        if err.is_not_found() {
            Self::NotFound(err.to_string())
        } else {
            Self::Transport {
                operation,
                message: err.to_string(),
            }
        }
    }
}

impl From<ResourceError> for io::Error {
    fn from(err: ResourceError) -> Self {
        let kind = match &err {
            ResourceError::NotFound(_) => io::ErrorKind::NotFound,
            ResourceError::UnsupportedOperation(_) => io::ErrorKind::Unsupported,
            ResourceError::IllegalOperation(_) | ResourceError::MalformedAddress { .. } => {
                io::ErrorKind::InvalidInput
            }
            _ => io::ErrorKind::Other,
        };
        io::Error::new(kind, err)
    }
}

/// Result alias for resource operations.
pub type ResourceResult<T> = Result<T, ResourceError>;
