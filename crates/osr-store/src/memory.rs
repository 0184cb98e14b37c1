use std::collections::BTreeMap;
use std::io::{Cursor, Read};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use tracing::debug;

use crate::error::{StoreError, StoreResult};
use crate::names::{validate_bucket_name, validate_object_key};
use crate::object::{Bucket, ObjectMetadata};
use crate::traits::{ObjectStoreClient, ObjectStream};

/// A stored object body plus its metadata.
#[derive(Clone)]
struct StoredObject {
    data: Arc<[u8]>,
    metadata: ObjectMetadata,
}

struct BucketEntry {
    bucket: Bucket,
    objects: BTreeMap<String, StoredObject>,
}

/// In-memory, BTreeMap-based object store.
///
/// Intended for tests and embedding. Buckets and objects live behind a
/// `RwLock`; object bodies are shared (`Arc<[u8]>`) so open readers never
/// copy. Two hooks exist for tests:
///
/// - [`fail_puts_after`](Self::fail_puts_after) injects a transport failure
///   into every put once it has consumed a given number of bytes.
/// - [`round_trips`](Self::round_trips) counts trait calls, so callers can
///   assert that nothing is answered from a cache.
pub struct InMemoryObjectStore {
    buckets: RwLock<BTreeMap<String, BucketEntry>>,
    round_trips: AtomicU64,
    put_failure_after: RwLock<Option<usize>>,
}

impl InMemoryObjectStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self {
            buckets: RwLock::new(BTreeMap::new()),
            round_trips: AtomicU64::new(0),
            put_failure_after: RwLock::new(None),
        }
    }

    /// Number of buckets currently stored.
    pub fn bucket_count(&self) -> usize {
        self.buckets.read().expect("lock poisoned").len()
    }

    /// Number of objects across all buckets.
    pub fn object_count(&self) -> usize {
        self.buckets
            .read()
            .expect("lock poisoned")
            .values()
            .map(|b| b.objects.len())
            .sum()
    }

    /// Copy of an object's body, bypassing the client interface.
    pub fn object_bytes(&self, bucket: &str, key: &str) -> Option<Vec<u8>> {
        let map = self.buckets.read().expect("lock poisoned");
        map.get(bucket)
            .and_then(|b| b.objects.get(key))
            .map(|o| o.data.to_vec())
    }

    /// Total number of client calls served so far.
    pub fn round_trips(&self) -> u64 {
        self.round_trips.load(Ordering::SeqCst)
    }

    /// Make every subsequent put fail with a transport error once its body
    /// runs past `limit` bytes. Bodies of at most `limit` bytes still succeed.
    /// `None` disables the injection.
    pub fn fail_puts_after(&self, limit: Option<usize>) {
        *self.put_failure_after.write().expect("lock poisoned") = limit;
    }

    fn tick(&self) {
        self.round_trips.fetch_add(1, Ordering::SeqCst);
    }

    fn read_body(&self, source: &mut dyn Read) -> StoreResult<Vec<u8>> {
        let limit = *self.put_failure_after.read().expect("lock poisoned");
        let mut data = Vec::new();
        match limit {
            None => {
                source.read_to_end(&mut data)?;
            }
            Some(limit) => {
                source.take(limit as u64 + 1).read_to_end(&mut data)?;
                if data.len() > limit {
                    return Err(StoreError::Transport(format!(
                        "connection reset after {limit} bytes"
                    )));
                }
            }
        }
        Ok(data)
    }
}

impl Default for InMemoryObjectStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ObjectStoreClient for InMemoryObjectStore {
    fn list_buckets(&self) -> StoreResult<Vec<Bucket>> {
        self.tick();
        let map = self.buckets.read().expect("lock poisoned");
        Ok(map.values().map(|b| b.bucket.clone()).collect())
    }

    fn bucket_exists(&self, name: &str) -> StoreResult<bool> {
        self.tick();
        let map = self.buckets.read().expect("lock poisoned");
        Ok(map.contains_key(name))
    }

    fn create_bucket(&self, name: &str) -> StoreResult<Bucket> {
        self.tick();
        validate_bucket_name(name)?;
        let mut map = self.buckets.write().expect("lock poisoned");
        if map.contains_key(name) {
            return Err(StoreError::BucketAlreadyExists(name.to_string()));
        }
        let bucket = Bucket::new(name);
        map.insert(
            name.to_string(),
            BucketEntry {
                bucket: bucket.clone(),
                objects: BTreeMap::new(),
            },
        );
        debug!(bucket = name, "bucket created");
        Ok(bucket)
    }

    fn put_object(
        &self,
        bucket: &str,
        key: &str,
        source: &mut dyn Read,
    ) -> StoreResult<ObjectMetadata> {
        self.tick();
        validate_object_key(key)?;
        if !self
            .buckets
            .read()
            .expect("lock poisoned")
            .contains_key(bucket)
        {
            return Err(StoreError::NoSuchBucket(bucket.to_string()));
        }

        let data = self.read_body(source)?;
        let metadata = ObjectMetadata::for_content(&data);

        // The bucket may have vanished while the body was streaming in.
        let mut map = self.buckets.write().expect("lock poisoned");
        let entry = map
            .get_mut(bucket)
            .ok_or_else(|| StoreError::NoSuchBucket(bucket.to_string()))?;
        entry.objects.insert(
            key.to_string(),
            StoredObject {
                data: data.into(),
                metadata: metadata.clone(),
            },
        );
        debug!(bucket, key, len = metadata.content_length, "object stored");
        Ok(metadata)
    }

    fn get_object(&self, bucket: &str, key: &str) -> StoreResult<ObjectStream> {
        self.tick();
        let map = self.buckets.read().expect("lock poisoned");
        let entry = map
            .get(bucket)
            .ok_or_else(|| StoreError::NoSuchBucket(bucket.to_string()))?;
        let object = entry.objects.get(key).ok_or_else(|| StoreError::NoSuchKey {
            bucket: bucket.to_string(),
            key: key.to_string(),
        })?;
        Ok(Box::new(Cursor::new(Arc::clone(&object.data))))
    }

    fn head_object(&self, bucket: &str, key: &str) -> StoreResult<ObjectMetadata> {
        self.tick();
        let map = self.buckets.read().expect("lock poisoned");
        let entry = map
            .get(bucket)
            .ok_or_else(|| StoreError::NoSuchBucket(bucket.to_string()))?;
        entry
            .objects
            .get(key)
            .map(|o| o.metadata.clone())
            .ok_or_else(|| StoreError::NoSuchKey {
                bucket: bucket.to_string(),
                key: key.to_string(),
            })
    }
}

impl std::fmt::Debug for InMemoryObjectStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryObjectStore")
            .field("bucket_count", &self.bucket_count())
            .field("object_count", &self.object_count())
            .finish()
    }
}
