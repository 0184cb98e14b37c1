use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A bucket as reported by the store.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bucket {
    /// Bucket name.
    pub name: String,
    /// Creation time.
    pub created: DateTime<Utc>,
}

impl Bucket {
    /// Create a bucket record stamped with the current time.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            created: Utc::now(),
        }
    }
}

/// Object metadata returned by head and put calls.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectMetadata {
    /// Object size in bytes.
    pub content_length: u64,
    /// Last modification time.
    pub last_modified: DateTime<Utc>,
    /// Hex-encoded BLAKE3 digest of the content.
    pub etag: String,
}

impl ObjectMetadata {
    /// Build metadata for `data`, stamped with the current time.
    pub fn for_content(data: &[u8]) -> Self {
        Self {
            content_length: data.len() as u64,
            last_modified: Utc::now(),
            etag: content_etag(data),
        }
    }
}

/// Compute the etag for a complete object body.
pub fn content_etag(data: &[u8]) -> String {
    blake3::hash(data).to_hex().to_string()
}
