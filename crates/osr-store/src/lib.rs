//! Object-store client interface for object storage resources.
//!
//! This crate describes the remote service that resources are layered on: a
//! flat namespace of buckets, each holding objects addressed by key. The
//! interface is synchronous; every call is one blocking round-trip.
//!
//! # Backends
//!
//! All backends implement the [`ObjectStoreClient`] trait:
//!
//! - [`InMemoryObjectStore`] -- `BTreeMap`-based store for tests and embedding,
//!   with failure injection and round-trip accounting
//! - [`FsObjectStore`] -- directory-backed store (buckets are directories,
//!   objects are files)
//!
//! # Contract
//!
//! 1. `put_object` consumes its source to end-of-stream before returning.
//! 2. A failed put never leaves a partially written object behind.
//! 3. "Not found" is always reported as [`StoreError::NoSuchBucket`] or
//!    [`StoreError::NoSuchKey`], never as a transport error.
//! 4. Objects are last-writer-wins; there is no versioning.

pub mod error;
pub mod fs;
pub mod memory;
pub mod names;
pub mod object;
pub mod traits;

pub use error::{StoreError, StoreResult};
pub use fs::FsObjectStore;
pub use memory::InMemoryObjectStore;
pub use names::{validate_bucket_name, validate_object_key};
pub use object::{Bucket, ObjectMetadata};
pub use traits::{ObjectStoreClient, ObjectStream};
