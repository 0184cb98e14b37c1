use std::io::Read;

use crate::error::StoreResult;
use crate::object::{Bucket, ObjectMetadata};

/// A readable object body. Dropping it releases the underlying connection.
pub type ObjectStream = Box<dyn Read + Send>;

/// Synchronous client for a bucket/key object store.
///
/// All implementations must satisfy these invariants:
/// - Every call is a fresh round-trip; callers never see cached answers.
/// - `put_object` blocks until `source` is exhausted (or fails), and a
///   failed put leaves no partial object.
/// - "Not found" is reported as `NoSuchBucket` / `NoSuchKey`.
/// - Concurrent calls are safe; the last completed put to a key wins.
pub trait ObjectStoreClient: Send + Sync {
    /// List all buckets.
    fn list_buckets(&self) -> StoreResult<Vec<Bucket>>;

    /// Check whether a bucket exists.
    ///
    /// Default implementation scans [`list_buckets`](Self::list_buckets).
    /// Backends may override with a direct lookup.
    fn bucket_exists(&self, name: &str) -> StoreResult<bool> {
        Ok(self.list_buckets()?.iter().any(|b| b.name == name))
    }

    /// Create a bucket. Fails with `BucketAlreadyExists` if it is present.
    fn create_bucket(&self, name: &str) -> StoreResult<Bucket>;

    /// Upload an object, consuming `source` to end-of-stream.
    ///
    /// A read error from `source` aborts the upload and is returned as
    /// `StoreError::Io`.
    fn put_object(&self, bucket: &str, key: &str, source: &mut dyn Read)
        -> StoreResult<ObjectMetadata>;

    /// Open an object for reading.
    fn get_object(&self, bucket: &str, key: &str) -> StoreResult<ObjectStream>;

    /// Fetch object metadata without the body.
    fn head_object(&self, bucket: &str, key: &str) -> StoreResult<ObjectMetadata>;
}
