//! File-like resources over bucket/key object storage.
//!
//! An [`ObjectResource`] wraps one `scheme://bucket[/key]` address and lets
//! application code treat a remote object like a local file: check that it
//! exists, read its length and modification time, read it as a stream, or
//! write it as a stream.
//!
//! # Write path
//!
//! The store's only write primitive is a blocking "upload this whole stream"
//! call. [`ObjectResource::open_write_stream`] bridges it to incremental
//! writes: the caller writes into a bounded [`pipe`], a worker from the
//! shared [`UploadExecutor`] runs the put against the pipe's read end, and
//! [`UploadWriter::close`] waits for that put to finish. Upload failures are
//! reported by `close`, never by a successful return.
//!
//! # Rules
//!
//! 1. The address is parsed once; bucket-vs-object legality never changes.
//! 2. Existence and metadata are never cached.
//! 3. Streams cannot be opened on a bucket root.
//! 4. Bytes reach the store in the order they were written.
//! 5. Store errors are mapped into [`ResourceError`] kinds at the boundary.
//! 6. A write stream dropped without `close` is a lost upload.

pub mod address;
pub mod config;
pub mod error;
pub mod executor;
pub mod loader;
pub mod oracle;
pub mod pipe;
pub mod reader;
pub mod resource;
pub mod upload;

pub use address::ObjectAddress;
pub use config::ResourceConfig;
pub use error::{ResourceError, ResourceResult};
pub use executor::UploadExecutor;
pub use loader::ResourceLoader;
pub use oracle::ExistenceOracle;
pub use reader::ObjectReader;
pub use resource::{BucketRef, ObjectResource, TargetKind};
pub use upload::{StreamingUploader, UploadWriter};

pub use osr_store::{Bucket, ObjectMetadata, ObjectStoreClient};
