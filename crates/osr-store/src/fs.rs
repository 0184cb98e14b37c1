use std::fs::{self, File};
use std::io::{self, BufReader, Read, Write};
use std::path::{Component, Path, PathBuf};

use chrono::{DateTime, Utc};
use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::error::{StoreError, StoreResult};
use crate::names::{validate_bucket_name, validate_object_key};
use crate::object::{Bucket, ObjectMetadata};
use crate::traits::{ObjectStoreClient, ObjectStream};

/// Copy buffer size for puts and etag computation.
const COPY_BUF_SIZE: usize = 64 * 1024;

/// Directory-backed object store.
///
/// Layout under the root directory:
/// ```text
/// <root>/<bucket>/            one directory per bucket
/// <root>/<bucket>/<key>       one file per object; `/` in keys nests
/// ```
///
/// Puts stream into a temporary file inside the bucket directory and are
/// renamed into place only after the source is exhausted, so readers never
/// observe a partial object and a failed put leaves nothing behind.
#[derive(Debug, Clone)]
pub struct FsObjectStore {
    root: PathBuf,
}

impl FsObjectStore {
    /// Open (or create) a store rooted at `root`.
    pub fn open(root: impl AsRef<Path>) -> StoreResult<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;
        info!(root = %root.display(), "filesystem object store opened");
        Ok(Self { root })
    }

    /// The root directory of this store.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve an existing bucket directory. Names that fail validation can
    /// never exist, so they are reported as missing.
    fn bucket_dir(&self, bucket: &str) -> StoreResult<PathBuf> {
        if validate_bucket_name(bucket).is_err() {
            return Err(StoreError::NoSuchBucket(bucket.to_string()));
        }
        let dir = self.root.join(bucket);
        if !dir.is_dir() {
            return Err(StoreError::NoSuchBucket(bucket.to_string()));
        }
        Ok(dir)
    }

    fn object_path(&self, bucket: &str, key: &str) -> StoreResult<PathBuf> {
        let dir = self.bucket_dir(bucket)?;
        validate_fs_key(key)?;
        Ok(dir.join(key))
    }

    /// Path of an object on the read side. A key this backend could never
    /// have stored is reported as missing, like an invalid bucket name.
    fn stored_path(&self, bucket: &str, key: &str) -> StoreResult<PathBuf> {
        let dir = self.bucket_dir(bucket)?;
        if validate_fs_key(key).is_err() {
            return Err(Self::not_found(bucket, key));
        }
        Ok(dir.join(key))
    }

    fn not_found(bucket: &str, key: &str) -> StoreError {
        StoreError::NoSuchKey {
            bucket: bucket.to_string(),
            key: key.to_string(),
        }
    }
}

/// Keys become relative paths, so they must not escape the bucket directory.
fn validate_fs_key(key: &str) -> StoreResult<()> {
    validate_object_key(key)?;
    let invalid = |reason: &str| StoreError::InvalidKey {
        key: key.to_string(),
        reason: reason.to_string(),
    };
    if key.starts_with('/') || key.ends_with('/') {
        return Err(invalid("must not start or end with '/'"));
    }
    if key.split('/').any(str::is_empty) {
        return Err(invalid("path components must not be empty"));
    }
    if Path::new(key)
        .components()
        .any(|c| !matches!(c, Component::Normal(_)))
    {
        return Err(invalid("must not contain '.' or '..' components"));
    }
    Ok(())
}

/// Returns `true` if some leading component of `key` under `dir` is a
/// regular file, so no object can exist at `key`.
fn blocked_by_file(dir: &Path, key: &str) -> bool {
    let mut path = dir.to_path_buf();
    let mut segments = key.split('/').peekable();
    while let Some(segment) = segments.next() {
        if segments.peek().is_none() {
            break;
        }
        path.push(segment);
        if path.is_file() {
            return true;
        }
    }
    false
}

fn modified_time(meta: &fs::Metadata) -> DateTime<Utc> {
    meta.modified().map(DateTime::<Utc>::from).unwrap_or_else(|_| Utc::now())
}

fn hash_file(path: &Path) -> io::Result<String> {
    let mut reader = BufReader::with_capacity(COPY_BUF_SIZE, File::open(path)?);
    let mut hasher = blake3::Hasher::new();
    io::copy(&mut reader, &mut hasher)?;
    Ok(hasher.finalize().to_hex().to_string())
}

impl ObjectStoreClient for FsObjectStore {
    fn list_buckets(&self) -> StoreResult<Vec<Bucket>> {
        let mut buckets = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            let meta = entry.metadata()?;
            if !meta.is_dir() {
                continue;
            }
            let Some(name) = entry.file_name().to_str().map(str::to_string) else {
                continue;
            };
            if validate_bucket_name(&name).is_err() {
                continue;
            }
            let created = meta
                .created()
                .map(DateTime::<Utc>::from)
                .unwrap_or_else(|_| modified_time(&meta));
            buckets.push(Bucket { name, created });
        }
        buckets.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(buckets)
    }

    fn bucket_exists(&self, name: &str) -> StoreResult<bool> {
        match self.bucket_dir(name) {
            Ok(_) => Ok(true),
            Err(StoreError::NoSuchBucket(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    fn create_bucket(&self, name: &str) -> StoreResult<Bucket> {
        validate_bucket_name(name)?;
        match fs::create_dir(self.root.join(name)) {
            Ok(()) => {
                debug!(bucket = name, "bucket directory created");
                Ok(Bucket::new(name))
            }
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                Err(StoreError::BucketAlreadyExists(name.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    fn put_object(
        &self,
        bucket: &str,
        key: &str,
        source: &mut dyn Read,
    ) -> StoreResult<ObjectMetadata> {
        let path = self.object_path(bucket, key)?;
        let bucket_dir = self.bucket_dir(bucket)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut tmp = NamedTempFile::new_in(&bucket_dir)?;
        let mut hasher = blake3::Hasher::new();
        let mut buf = vec![0u8; COPY_BUF_SIZE];
        let mut len = 0u64;
        loop {
            let n = match source.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                // Dropping `tmp` removes the partial file.
                Err(e) => return Err(e.into()),
            };
            hasher.update(&buf[..n]);
            tmp.write_all(&buf[..n])?;
            len += n as u64;
        }
        tmp.as_file().sync_all()?;
        let file = tmp.persist(&path).map_err(|e| StoreError::Io(e.error))?;

        let meta = file.metadata()?;
        debug!(bucket, key, len, "object persisted");
        Ok(ObjectMetadata {
            content_length: len,
            last_modified: modified_time(&meta),
            etag: hasher.finalize().to_hex().to_string(),
        })
    }

    fn get_object(&self, bucket: &str, key: &str) -> StoreResult<ObjectStream> {
        let path = self.stored_path(bucket, key)?;
        if !path.is_file() {
            return Err(Self::not_found(bucket, key));
        }
        match File::open(&path) {
            Ok(file) => Ok(Box::new(BufReader::with_capacity(COPY_BUF_SIZE, file))),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Err(Self::not_found(bucket, key)),
            Err(e) => Err(e.into()),
        }
    }

    fn head_object(&self, bucket: &str, key: &str) -> StoreResult<ObjectMetadata> {
        let path = self.stored_path(bucket, key)?;
        let meta = match fs::metadata(&path) {
            Ok(meta) if meta.is_file() => meta,
            Ok(_) => return Err(Self::not_found(bucket, key)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(Self::not_found(bucket, key))
            }
            // ENOTDIR: a prefix of the key is an object, not a directory.
            Err(_) if blocked_by_file(&self.root.join(bucket), key) => {
                return Err(Self::not_found(bucket, key))
            }
            Err(e) => return Err(e.into()),
        };
        Ok(ObjectMetadata {
            content_length: meta.len(),
            last_modified: modified_time(&meta),
            etag: hash_file(&path)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::content_etag;

    fn temp_store() -> (tempfile::TempDir, FsObjectStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = FsObjectStore::open(dir.path().join("store")).unwrap();
        (dir, store)
    }

    fn read_all(store: &FsObjectStore, bucket: &str, key: &str) -> Vec<u8> {
        let mut body = Vec::new();
        store
            .get_object(bucket, key)
            .unwrap()
            .read_to_end(&mut body)
            .unwrap();
        body
    }

    #[test]
    fn bucket_lifecycle() {
        let (_dir, store) = temp_store();
        assert!(store.list_buckets().unwrap().is_empty());
        assert!(!store.bucket_exists("media").unwrap());

        store.create_bucket("media").unwrap();
        assert!(store.bucket_exists("media").unwrap());
        assert!(matches!(
            store.create_bucket("media").unwrap_err(),
            StoreError::BucketAlreadyExists(_)
        ));

        let names: Vec<String> = store.list_buckets().unwrap().into_iter().map(|b| b.name).collect();
        assert_eq!(names, vec!["media"]);
    }

    #[test]
    fn invalid_bucket_names_never_exist() {
        let (_dir, store) = temp_store();
        assert!(!store.bucket_exists("../escape").unwrap());
        assert!(store.head_object("../escape", "k").unwrap_err().is_not_found());
    }

    #[test]
    fn put_and_read_back_nested_key() {
        let (_dir, store) = temp_store();
        store.create_bucket("media").unwrap();

        let mut source: &[u8] = b"nested content";
        let meta = store.put_object("media", "a/b/c.txt", &mut source).unwrap();
        assert_eq!(meta.content_length, 14);
        assert_eq!(meta.etag, content_etag(b"nested content"));

        assert_eq!(read_all(&store, "media", "a/b/c.txt"), b"nested content");
        let head = store.head_object("media", "a/b/c.txt").unwrap();
        assert_eq!(head.content_length, 14);
        assert_eq!(head.etag, meta.etag);
    }

    #[test]
    fn directories_are_not_objects() {
        let (_dir, store) = temp_store();
        store.create_bucket("media").unwrap();
        let mut source: &[u8] = b"x";
        store.put_object("media", "dir/file", &mut source).unwrap();
        assert!(store.head_object("media", "dir").unwrap_err().is_not_found());
        assert!(store.get_object("media", "dir").err().unwrap().is_not_found());
    }

    #[test]
    fn unstorable_keys_read_as_missing() {
        let (_dir, store) = temp_store();
        store.create_bucket("media").unwrap();
        let mut source: &[u8] = b"file, not a directory";
        store.put_object("media", "a", &mut source).unwrap();

        for key in ["a/b", "a/b/c", "dir/", "x//y", "../x"] {
            let err = store.head_object("media", key).unwrap_err();
            assert!(matches!(err, StoreError::NoSuchKey { .. }), "head {key:?}: {err:?}");
            let err = store.get_object("media", key).err().unwrap();
            assert!(matches!(err, StoreError::NoSuchKey { .. }), "get {key:?}: {err:?}");
        }
        assert!(blocked_by_file(&store.root().join("media"), "a/b"));
        assert!(!blocked_by_file(&store.root().join("media"), "a"));
    }

    #[test]
    fn escaping_keys_are_rejected() {
        let (_dir, store) = temp_store();
        store.create_bucket("media").unwrap();
        for key in ["../x", "a/../../x", "/abs", "trailing/", "a//b", "./x"] {
            let mut source: &[u8] = b"x";
            let err = store.put_object("media", key, &mut source).unwrap_err();
            assert!(matches!(err, StoreError::InvalidKey { .. }), "key {key:?}");
        }
    }

    #[test]
    fn failed_put_leaves_no_object() {
        struct FailAfter(usize);
        impl Read for FailAfter {
            fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
                if self.0 == 0 {
                    return Err(io::Error::new(io::ErrorKind::ConnectionReset, "reset"));
                }
                let n = self.0.min(buf.len());
                buf[..n].fill(7);
                self.0 -= n;
                Ok(n)
            }
        }

        let (_dir, store) = temp_store();
        store.create_bucket("media").unwrap();
        let err = store.put_object("media", "partial", &mut FailAfter(1000)).unwrap_err();
        assert!(matches!(err, StoreError::Io(_)));
        assert!(store.head_object("media", "partial").unwrap_err().is_not_found());

        // Only the bucket directory itself remains.
        let leftovers = fs::read_dir(store.root().join("media")).unwrap().count();
        assert_eq!(leftovers, 0);
    }

    #[test]
    fn put_into_missing_bucket() {
        let (_dir, store) = temp_store();
        let mut source: &[u8] = b"x";
        let err = store.put_object("ghost", "k", &mut source).unwrap_err();
        assert!(matches!(err, StoreError::NoSuchBucket(_)));
    }
}
