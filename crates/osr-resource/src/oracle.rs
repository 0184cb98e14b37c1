use std::sync::Arc;

use osr_store::{ObjectMetadata, ObjectStoreClient, StoreError};
use tracing::debug;

use crate::error::{ResourceError, ResourceResult};

/// Live existence and metadata queries against the store.
///
/// Nothing is cached: every call is a fresh round-trip, so answers reflect
/// writes completed elsewhere.
#[derive(Clone)]
pub struct ExistenceOracle {
    client: Arc<dyn ObjectStoreClient>,
}

impl ExistenceOracle {
    /// Create an oracle over `client`.
    pub fn new(client: Arc<dyn ObjectStoreClient>) -> Self {
        Self { client }
    }

    /// Returns `true` if the bucket exists.
    pub fn bucket_exists(&self, bucket: &str) -> ResourceResult<bool> {
        let exists = self
            .client
            .bucket_exists(bucket)
            .map_err(|e| ResourceError::from_store("bucket lookup", e))?;
        debug!(bucket, exists, "bucket existence checked");
        Ok(exists)
    }

    /// Returns `true` if the object exists. A missing bucket counts as a
    /// missing object.
    pub fn object_exists(&self, bucket: &str, key: &str) -> ResourceResult<bool> {
        match self.client.head_object(bucket, key) {
            Ok(_) => Ok(true),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(ResourceError::from_store("head object", e)),
        }
    }

    /// Fetch object metadata, failing with `NotFound` if the object is absent.
    pub fn metadata(&self, bucket: &str, key: &str) -> ResourceResult<ObjectMetadata> {
        self.client.head_object(bucket, key).map_err(|e| match e {
            StoreError::NoSuchKey { .. } | StoreError::NoSuchBucket(_) => {
                ResourceError::NotFound(format!("object not existed: {bucket}/{key}"))
            }
            other => ResourceError::from_store("head object", other),
        })
    }
}

impl std::fmt::Debug for ExistenceOracle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExistenceOracle").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use osr_store::{Bucket, InMemoryObjectStore, ObjectStream, StoreResult};
    use std::io::Read;

    fn oracle_with_object() -> (Arc<InMemoryObjectStore>, ExistenceOracle) {
        let store = Arc::new(InMemoryObjectStore::new());
        store.create_bucket("aliyun-test-bucket").unwrap();
        let mut body: &[u8] = &[1u8; 4096];
        store
            .put_object("aliyun-test-bucket", "myfilekey", &mut body)
            .unwrap();
        let oracle = ExistenceOracle::new(store.clone());
        (store, oracle)
    }

    /// A store whose every call fails with a transport error.
    struct Unreachable;

    impl ObjectStoreClient for Unreachable {
        fn list_buckets(&self) -> StoreResult<Vec<Bucket>> {
            Err(StoreError::Transport("unreachable".into()))
        }
        fn create_bucket(&self, _: &str) -> StoreResult<Bucket> {
            Err(StoreError::Transport("unreachable".into()))
        }
        fn put_object(&self, _: &str, _: &str, _: &mut dyn Read) -> StoreResult<ObjectMetadata> {
            Err(StoreError::Transport("unreachable".into()))
        }
        fn get_object(&self, _: &str, _: &str) -> StoreResult<ObjectStream> {
            Err(StoreError::Transport("unreachable".into()))
        }
        fn head_object(&self, _: &str, _: &str) -> StoreResult<ObjectMetadata> {
            Err(StoreError::Transport("unreachable".into()))
        }
    }

    #[test]
    fn existing_and_missing() {
        let (_store, oracle) = oracle_with_object();
        assert!(oracle.bucket_exists("aliyun-test-bucket").unwrap());
        assert!(!oracle.bucket_exists("other-bucket").unwrap());
        assert!(oracle.object_exists("aliyun-test-bucket", "myfilekey").unwrap());
        assert!(!oracle.object_exists("aliyun-test-bucket", "missing").unwrap());
        assert!(!oracle.object_exists("other-bucket", "myfilekey").unwrap());
    }

    #[test]
    fn metadata_reports_store_values() {
        let (store, oracle) = oracle_with_object();
        let meta = oracle.metadata("aliyun-test-bucket", "myfilekey").unwrap();
        let head = store.head_object("aliyun-test-bucket", "myfilekey").unwrap();
        assert_eq!(meta, head);
        assert_eq!(meta.content_length, 4096);
    }

    #[test]
    fn metadata_for_missing_object() {
        let (_store, oracle) = oracle_with_object();
        let err = oracle.metadata("aliyun-test-bucket", "missing").unwrap_err();
        assert!(matches!(err, ResourceError::NotFound(_)));
    }

    #[test]
    fn transport_failures_propagate() {
        let oracle = ExistenceOracle::new(Arc::new(Unreachable));
        assert!(matches!(
            oracle.bucket_exists("b").unwrap_err(),
            ResourceError::Transport { .. }
        ));
        assert!(matches!(
            oracle.object_exists("b", "k").unwrap_err(),
            ResourceError::Transport { .. }
        ));
        assert!(matches!(
            oracle.metadata("b", "k").unwrap_err(),
            ResourceError::Transport { .. }
        ));
    }

    #[test]
    fn no_caching() {
        let (store, oracle) = oracle_with_object();
        let before = store.round_trips();
        oracle.object_exists("aliyun-test-bucket", "myfilekey").unwrap();
        oracle.object_exists("aliyun-test-bucket", "myfilekey").unwrap();
        assert_eq!(store.round_trips(), before + 2);
    }
}
