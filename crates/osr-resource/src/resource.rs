use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use osr_store::{ObjectMetadata, ObjectStoreClient, StoreError};
use tracing::debug;

use crate::address::ObjectAddress;
use crate::config::DEFAULT_PIPE_CAPACITY;
use crate::error::{ResourceError, ResourceResult};
use crate::executor::UploadExecutor;
use crate::oracle::ExistenceOracle;
use crate::reader::ObjectReader;
use crate::upload::{StreamingUploader, UploadWriter};

/// What an address points at. Fixed when the resource is created.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TargetKind {
    /// The bucket itself (empty key).
    Bucket,
    /// An object within the bucket.
    Object,
}

/// Handle on a bucket, obtained without touching the store.
#[derive(Clone)]
pub struct BucketRef {
    name: String,
    client: Arc<dyn ObjectStoreClient>,
}

impl BucketRef {
    /// The bucket name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns `true` if the bucket exists (one round-trip).
    pub fn exists(&self) -> ResourceResult<bool> {
        ExistenceOracle::new(Arc::clone(&self.client)).bucket_exists(&self.name)
    }

    /// Create the bucket if it is absent. An existing bucket is success.
    pub fn create(&self) -> ResourceResult<()> {
        match self.client.create_bucket(&self.name) {
            Ok(_) => {
                debug!(bucket = %self.name, "bucket created");
                Ok(())
            }
            Err(StoreError::BucketAlreadyExists(_)) => {
                debug!(bucket = %self.name, "bucket already exists");
                Ok(())
            }
            Err(e) => Err(ResourceError::from_store("create bucket", e)),
        }
    }
}

impl fmt::Debug for BucketRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BucketRef").field("name", &self.name).finish()
    }
}

/// A bucket or object in remote storage, used like a file handle.
///
/// The address is parsed once at construction; every other answer comes from
/// a live query. Reads return an [`ObjectReader`]; writes return an
/// [`UploadWriter`] whose `close` reports whether the object was stored.
///
/// A resource should have at most one open write stream at a time. This is
/// not enforced; concurrent streams to the same key race and the last one to
/// close wins.
#[derive(Clone)]
pub struct ObjectResource {
    address: ObjectAddress,
    client: Arc<dyn ObjectStoreClient>,
    oracle: ExistenceOracle,
    uploader: StreamingUploader,
    executor: Arc<UploadExecutor>,
    auto_create_files: bool,
    pipe_capacity: usize,
}

impl ObjectResource {
    /// Create a resource for `location` (`scheme://bucket[/key]`).
    ///
    /// Write streams may create new objects (see
    /// [`with_auto_create_files`](Self::with_auto_create_files)).
    pub fn new(
        location: &str,
        client: Arc<dyn ObjectStoreClient>,
        executor: Arc<UploadExecutor>,
    ) -> ResourceResult<Self> {
        let address = ObjectAddress::parse(location)?;
        Ok(Self::from_parts(
            address,
            client,
            executor,
            true,
            DEFAULT_PIPE_CAPACITY,
        ))
    }

    fn from_parts(
        address: ObjectAddress,
        client: Arc<dyn ObjectStoreClient>,
        executor: Arc<UploadExecutor>,
        auto_create_files: bool,
        pipe_capacity: usize,
    ) -> Self {
        Self {
            oracle: ExistenceOracle::new(Arc::clone(&client)),
            uploader: StreamingUploader::new(Arc::clone(&client), Arc::clone(&executor), pipe_capacity),
            address,
            client,
            executor,
            auto_create_files,
            pipe_capacity,
        }
    }

    /// Whether write streams may create objects that do not exist yet.
    pub fn with_auto_create_files(mut self, auto_create_files: bool) -> Self {
        self.auto_create_files = auto_create_files;
        self
    }

    /// Bytes buffered between a write stream and its upload worker.
    ///
    /// # Panics
    ///
    /// Panics if `pipe_capacity` is zero.
    pub fn with_pipe_capacity(self, pipe_capacity: usize) -> Self {
        assert!(pipe_capacity > 0, "pipe capacity must be non-zero");
        Self::from_parts(
            self.address,
            self.client,
            self.executor,
            self.auto_create_files,
            pipe_capacity,
        )
    }

    // ---- Identity ----

    /// The parsed address.
    pub fn address(&self) -> &ObjectAddress {
        &self.address
    }

    /// Bucket or object.
    pub fn kind(&self) -> TargetKind {
        if self.address.is_bucket_root() {
            TargetKind::Bucket
        } else {
            TargetKind::Object
        }
    }

    /// Returns `true` if this resource is a bucket root.
    pub fn is_bucket(&self) -> bool {
        self.kind() == TargetKind::Bucket
    }

    /// Canonical location string.
    pub fn uri(&self) -> String {
        self.address.uri()
    }

    /// Base name: the bucket name for a bucket, else the last key segment.
    pub fn filename(&self) -> &str {
        self.address.filename()
    }

    /// Human-readable description.
    pub fn description(&self) -> String {
        format!("object storage resource [{}]", self.address)
    }

    /// Handle on this resource's bucket. Makes no remote call.
    pub fn bucket(&self) -> BucketRef {
        BucketRef {
            name: self.address.bucket().to_string(),
            client: Arc::clone(&self.client),
        }
    }

    /// A resource at `relative_path` resolved against this one, sharing the
    /// client, executor and settings.
    pub fn create_relative(&self, relative_path: &str) -> Self {
        Self {
            address: self.address.resolve(relative_path),
            ..self.clone()
        }
    }

    // ---- Existence and metadata ----

    /// Live existence check: the bucket for a bucket root, the object otherwise.
    pub fn exists(&self) -> ResourceResult<bool> {
        match self.kind() {
            TargetKind::Bucket => self.oracle.bucket_exists(self.address.bucket()),
            TargetKind::Object => self
                .oracle
                .object_exists(self.address.bucket(), self.address.key()),
        }
    }

    /// Live check of the bucket component, whatever the target kind.
    pub fn bucket_exists(&self) -> ResourceResult<bool> {
        self.oracle.bucket_exists(self.address.bucket())
    }

    /// Full object metadata. Fails with `NotFound` for buckets and absent
    /// objects.
    pub fn metadata(&self) -> ResourceResult<ObjectMetadata> {
        if self.is_bucket() {
            return Err(self.not_existed());
        }
        self.oracle
            .metadata(self.address.bucket(), self.address.key())
            .map_err(|e| match e {
                ResourceError::NotFound(_) => self.not_existed(),
                other => other,
            })
    }

    /// Object size in bytes, as reported by the store.
    pub fn content_length(&self) -> ResourceResult<u64> {
        Ok(self.metadata()?.content_length)
    }

    /// Last modification time, as reported by the store.
    pub fn last_modified(&self) -> ResourceResult<DateTime<Utc>> {
        Ok(self.metadata()?.last_modified)
    }

    /// Always fails: remote objects have no local path.
    pub fn file_path(&self) -> ResourceResult<PathBuf> {
        Err(ResourceError::UnsupportedOperation(format!(
            "{} cannot be resolved to absolute file path",
            self.address
        )))
    }

    /// `false` for buckets; for objects, `true` if write streams may create
    /// the object or it already exists.
    pub fn is_writable(&self) -> ResourceResult<bool> {
        if self.is_bucket() {
            return Ok(false);
        }
        if self.auto_create_files {
            return Ok(true);
        }
        self.exists()
    }

    /// Always `false`: streams are opened on demand, nothing is held open.
    pub fn is_open(&self) -> bool {
        false
    }

    // ---- Streams ----

    /// Open the object for reading. Each call is a fresh fetch.
    pub fn open_read_stream(&self) -> ResourceResult<ObjectReader> {
        if self.is_bucket() {
            return Err(ResourceError::IllegalOperation(format!(
                "cannot open an input stream to a bucket: '{}'",
                self.address
            )));
        }
        let body = self
            .client
            .get_object(self.address.bucket(), self.address.key())
            .map_err(|e| {
                if e.is_not_found() {
                    self.not_existed()
                } else {
                    ResourceError::from_store("get object", e)
                }
            })?;
        Ok(ObjectReader::new(body, self.uri()))
    }

    /// Open a write stream that uploads to this object.
    ///
    /// Blocks while every upload worker is busy. The returned writer must be
    /// closed for the upload to take effect.
    pub fn open_write_stream(&self) -> ResourceResult<UploadWriter> {
        if self.is_bucket() {
            return Err(ResourceError::IllegalOperation(format!(
                "cannot open an output stream to a bucket: '{}'",
                self.address
            )));
        }
        if !self.auto_create_files && !self.exists()? {
            return Err(ResourceError::NotFound(format!(
                "the object was not found: {}",
                self.address
            )));
        }
        debug!(target = %self.address, pipe_capacity = self.pipe_capacity, "opening upload stream");
        self.uploader.open(&self.address)
    }

    // ---- Buckets ----

    /// Create this resource's bucket if absent. Safe to call repeatedly.
    pub fn create_bucket(&self) -> ResourceResult<BucketRef> {
        let bucket = self.bucket();
        bucket.create()?;
        Ok(bucket)
    }

    fn not_existed(&self) -> ResourceError {
        ResourceError::NotFound(format!("object not existed: {}", self.address))
    }
}

impl fmt::Display for ObjectResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.description())
    }
}

impl fmt::Debug for ObjectResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectResource")
            .field("address", &self.address)
            .field("auto_create_files", &self.auto_create_files)
            .field("pipe_capacity", &self.pipe_capacity)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use osr_store::InMemoryObjectStore;
    use rand::RngCore;
    use std::io::{Read, Write};

    const BUCKET: &str = "oss://aliyun-test-bucket/";
    const OBJECT: &str = "oss://aliyun-test-bucket/myfilekey";

    struct Fixture {
        store: Arc<InMemoryObjectStore>,
        executor: Arc<UploadExecutor>,
        content: Vec<u8>,
    }

    impl Fixture {
        fn new() -> Self {
            let store = Arc::new(InMemoryObjectStore::new());
            store.create_bucket("aliyun-test-bucket").unwrap();
            let content = random_bytes(4096);
            let mut body = content.as_slice();
            store
                .put_object("aliyun-test-bucket", "myfilekey", &mut body)
                .unwrap();
            Self {
                store,
                executor: Arc::new(UploadExecutor::new(8).unwrap()),
                content,
            }
        }

        fn resource(&self, location: &str) -> ObjectResource {
            ObjectResource::new(location, self.store.clone(), Arc::clone(&self.executor)).unwrap()
        }
    }

    fn random_bytes(len: usize) -> Vec<u8> {
        let mut data = vec![0u8; len];
        rand::thread_rng().fill_bytes(&mut data);
        data
    }

    // -----------------------------------------------------------------------
    // Identity
    // -----------------------------------------------------------------------

    #[test]
    fn object_resource_identity() {
        let fx = Fixture::new();
        let res = fx.resource(OBJECT);
        assert_eq!(res.kind(), TargetKind::Object);
        assert!(!res.is_bucket());
        assert_eq!(res.filename(), "myfilekey");
        assert_eq!(res.uri(), OBJECT);
        assert_eq!(
            res.to_string(),
            "object storage resource [oss://aliyun-test-bucket/myfilekey]"
        );
    }

    #[test]
    fn bucket_resource_identity() {
        let fx = Fixture::new();
        for location in [BUCKET, "oss://aliyun-test-bucket"] {
            let res = fx.resource(location);
            assert!(res.is_bucket());
            assert_eq!(res.filename(), "aliyun-test-bucket");
            assert_eq!(res.uri(), BUCKET);
            assert_eq!(res.bucket().name(), "aliyun-test-bucket");
        }
    }

    #[test]
    fn malformed_location() {
        let fx = Fixture::new();
        let err = ObjectResource::new("oss://", fx.store.clone(), Arc::clone(&fx.executor)).unwrap_err();
        assert!(matches!(err, ResourceError::MalformedAddress { .. }));
    }

    #[test]
    fn bucket_handle_makes_no_round_trip() {
        let fx = Fixture::new();
        let res = fx.resource(OBJECT);
        let before = fx.store.round_trips();
        let bucket = res.bucket();
        assert_eq!(bucket.name(), "aliyun-test-bucket");
        assert_eq!(fx.store.round_trips(), before);
        assert!(bucket.exists().unwrap());
    }

    // -----------------------------------------------------------------------
    // Existence and metadata
    // -----------------------------------------------------------------------

    #[test]
    fn valid_object() {
        let fx = Fixture::new();
        let res = fx.resource(OBJECT);
        assert!(res.exists().unwrap());
        assert!(res.bucket_exists().unwrap());
        assert_eq!(res.content_length().unwrap(), 4096);

        let head = fx.store.head_object("aliyun-test-bucket", "myfilekey").unwrap();
        assert_eq!(res.last_modified().unwrap(), head.last_modified);
    }

    #[test]
    fn bucket_exists_and_statuses() {
        let fx = Fixture::new();
        let res = fx.resource(BUCKET);
        assert!(res.exists().unwrap());
        assert!(res.bucket_exists().unwrap());
        assert!(!res.is_open());
        assert!(!res.is_writable().unwrap());

        assert!(!fx.resource("oss://other-bucket/").exists().unwrap());
    }

    #[test]
    fn missing_object() {
        let fx = Fixture::new();
        let res = fx.resource("oss://aliyun-test-bucket/missing");
        assert!(!res.exists().unwrap());
        for err in [res.content_length().unwrap_err(), res.last_modified().unwrap_err()] {
            assert!(matches!(err, ResourceError::NotFound(_)), "{err:?}");
        }
        assert!(matches!(
            res.open_read_stream().unwrap_err(),
            ResourceError::NotFound(_)
        ));
    }

    #[test]
    fn bucket_has_no_content_length() {
        let fx = Fixture::new();
        let res = fx.resource(BUCKET);
        let err = res.content_length().unwrap_err();
        assert!(matches!(err, ResourceError::NotFound(_)));
        assert!(err.to_string().contains("object not existed"));
        assert!(matches!(
            res.last_modified().unwrap_err(),
            ResourceError::NotFound(_)
        ));
    }

    #[test]
    fn file_path_is_unsupported() {
        let fx = Fixture::new();
        for location in [BUCKET, OBJECT] {
            let err = fx.resource(location).file_path().unwrap_err();
            assert!(matches!(err, ResourceError::UnsupportedOperation(_)));
        }
        assert_eq!(
            fx.resource(BUCKET).file_path().unwrap_err().to_string(),
            "oss://aliyun-test-bucket/ cannot be resolved to absolute file path"
        );
    }

    #[test]
    fn existence_is_never_cached() {
        let fx = Fixture::new();
        let res = fx.resource("oss://aliyun-test-bucket/late");
        assert!(!res.exists().unwrap());

        let mut body: &[u8] = b"written elsewhere";
        fx.store
            .put_object("aliyun-test-bucket", "late", &mut body)
            .unwrap();

        let before = fx.store.round_trips();
        assert!(res.exists().unwrap());
        assert!(res.exists().unwrap());
        assert_eq!(fx.store.round_trips(), before + 2);
    }

    // -----------------------------------------------------------------------
    // Streams
    // -----------------------------------------------------------------------

    #[test]
    fn read_existing_object() {
        let fx = Fixture::new();
        let mut reader = fx.resource(OBJECT).open_read_stream().unwrap();
        let mut out = Vec::new();
        reader.read_to_end(&mut out).unwrap();
        assert_eq!(out, fx.content);
        assert!(reader.is_released());
    }

    #[test]
    fn bucket_streams_are_illegal() {
        let fx = Fixture::new();
        let res = fx.resource(BUCKET);

        let err = res.open_write_stream().unwrap_err();
        assert!(matches!(err, ResourceError::IllegalOperation(_)));
        assert_eq!(
            err.to_string(),
            "cannot open an output stream to a bucket: 'oss://aliyun-test-bucket/'"
        );

        let err = res.open_read_stream().unwrap_err();
        assert_eq!(
            err.to_string(),
            "cannot open an input stream to a bucket: 'oss://aliyun-test-bucket/'"
        );

        // Same answer when the bucket does not exist.
        let ghost = fx.resource("oss://ghost-bucket");
        assert!(matches!(
            ghost.open_write_stream().unwrap_err(),
            ResourceError::IllegalOperation(_)
        ));
        assert!(matches!(
            ghost.open_read_stream().unwrap_err(),
            ResourceError::IllegalOperation(_)
        ));
    }

    #[test]
    fn writable_output_stream_round_trip() {
        let fx = Fixture::new();
        let res = fx.resource("oss://aliyun-test-bucket/test");
        assert!(res.is_writable().unwrap());

        let data = random_bytes(1203);
        let mut writer = res.open_write_stream().unwrap();
        writer.write_all(&data).unwrap();
        writer.close().unwrap();

        let mut out = Vec::new();
        res.open_read_stream().unwrap().read_to_end(&mut out).unwrap();
        assert_eq!(out, data);
        assert_eq!(res.content_length().unwrap(), 1203);
    }

    #[test]
    fn round_trip_beyond_pipe_capacity() {
        let fx = Fixture::new();
        let res = fx.resource("oss://aliyun-test-bucket/big").with_pipe_capacity(512);
        for len in [0usize, 511, 512, 513, 512 * 20 + 3] {
            let data = random_bytes(len);
            let mut writer = res.open_write_stream().unwrap();
            writer.write_all(&data).unwrap();
            writer.close().unwrap();

            let mut out = Vec::new();
            res.open_read_stream().unwrap().read_to_end(&mut out).unwrap();
            assert_eq!(out, data, "len {len}");
        }
    }

    #[test]
    fn overwrite_existing_object() {
        let fx = Fixture::new();
        let res = fx.resource(OBJECT);
        let mut writer = res.open_write_stream().unwrap();
        writer.write_all(b"replaced").unwrap();
        writer.close().unwrap();
        assert_eq!(res.content_length().unwrap(), 8);
    }

    #[test]
    fn upload_failure_raised_on_close() {
        let fx = Fixture::new();
        fx.store.fail_puts_after(Some(64));
        let res = fx.resource("oss://aliyun-test-bucket/failing");

        let mut writer = res.open_write_stream().unwrap();
        let _ = writer.write_all(&random_bytes(4096));
        assert!(matches!(
            writer.close().unwrap_err(),
            ResourceError::UploadFailure { .. }
        ));
        assert!(!res.exists().unwrap());
    }

    #[test]
    fn without_auto_create_missing_objects_are_not_writable() {
        let fx = Fixture::new();
        let missing = fx
            .resource("oss://aliyun-test-bucket/new-file")
            .with_auto_create_files(false);
        assert!(!missing.is_writable().unwrap());
        let err = missing.open_write_stream().unwrap_err();
        assert!(matches!(err, ResourceError::NotFound(_)));
        assert!(err.to_string().contains("the object was not found"));

        let existing = fx.resource(OBJECT).with_auto_create_files(false);
        assert!(existing.is_writable().unwrap());
        let mut writer = existing.open_write_stream().unwrap();
        writer.write_all(b"update").unwrap();
        writer.close().unwrap();
    }

    #[test]
    fn directory_store_reports_unstorable_keys_as_missing() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(osr_store::FsObjectStore::open(dir.path()).unwrap());
        store.create_bucket("aliyun-test-bucket").unwrap();
        let executor = Arc::new(UploadExecutor::new(1).unwrap());

        let file = ObjectResource::new("oss://aliyun-test-bucket/a", store.clone(), executor.clone()).unwrap();
        let mut writer = file.open_write_stream().unwrap();
        writer.write_all(b"plain object").unwrap();
        writer.close().unwrap();

        for location in [
            "oss://aliyun-test-bucket/a/b",
            "oss://aliyun-test-bucket/dir/",
            "oss://aliyun-test-bucket/x//y",
        ] {
            let res = ObjectResource::new(location, store.clone(), executor.clone()).unwrap();
            assert!(!res.exists().unwrap(), "{location}");
            assert!(matches!(
                res.content_length().unwrap_err(),
                ResourceError::NotFound(_)
            ));
        }
    }

    // -----------------------------------------------------------------------
    // Buckets and relative resources
    // -----------------------------------------------------------------------

    #[test]
    fn create_bucket_is_idempotent() {
        let fx = Fixture::new();
        let res = fx.resource("oss://my-new-test-bucket/");
        assert!(!res.bucket_exists().unwrap());

        let bucket = res.create_bucket().unwrap();
        assert_eq!(bucket.name(), "my-new-test-bucket");
        res.create_bucket().unwrap();

        assert!(res.bucket_exists().unwrap());
        let matching = fx
            .store
            .list_buckets()
            .unwrap()
            .into_iter()
            .filter(|b| b.name == "my-new-test-bucket")
            .count();
        assert_eq!(matching, 1);
    }

    #[test]
    fn create_bucket_from_object_resource() {
        let fx = Fixture::new();
        let res = fx.resource("oss://fresh-bucket/some/key");
        res.create_bucket().unwrap();
        assert!(res.bucket_exists().unwrap());
        assert!(!res.exists().unwrap());
    }

    #[test]
    fn create_bucket_rejects_invalid_name() {
        let fx = Fixture::new();
        let err = fx.resource("oss://No_Such/").create_bucket().unwrap_err();
        assert!(matches!(err, ResourceError::Transport { .. }));
    }

    #[test]
    fn relative_resource_shares_settings() {
        let fx = Fixture::new();
        let dir = fx
            .resource("oss://aliyun-test-bucket/docs/readme.md")
            .with_auto_create_files(false);
        let sibling = dir.create_relative("guide.md");
        assert_eq!(sibling.uri(), "oss://aliyun-test-bucket/docs/guide.md");
        assert!(!sibling.is_writable().unwrap());

        let root = fx.resource(BUCKET).create_relative("myfilekey");
        assert!(root.exists().unwrap());
    }
}
