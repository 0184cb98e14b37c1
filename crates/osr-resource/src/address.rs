//! Object addresses: `scheme://bucket[/key]`.
//!
//! The first path segment after the scheme is the bucket; everything after
//! the single separator that follows it is the key. An address with an empty
//! key (`oss://bucket` or `oss://bucket/`) denotes the bucket itself.

use std::fmt;
use std::str::FromStr;

use crate::error::{ResourceError, ResourceResult};

const SCHEME_SEPARATOR: &str = "://";

/// A decomposed, immutable object address.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ObjectAddress {
    scheme: String,
    bucket: String,
    key: String,
}

impl ObjectAddress {
    /// Parse a scheme-qualified location.
    ///
    /// # Examples
    ///
    /// ```
    /// use osr_resource::ObjectAddress;
    ///
    /// let addr = ObjectAddress::parse("oss://photos/2024/cat.jpg").unwrap();
    /// assert_eq!(addr.bucket(), "photos");
    /// assert_eq!(addr.key(), "2024/cat.jpg");
    /// assert!(!addr.is_bucket_root());
    ///
    /// assert!(ObjectAddress::parse("oss://photos/").unwrap().is_bucket_root());
    /// assert!(ObjectAddress::parse("oss://").is_err());
    /// ```
    pub fn parse(uri: &str) -> ResourceResult<Self> {
        let malformed = |reason: &str| ResourceError::MalformedAddress {
            uri: uri.to_string(),
            reason: reason.to_string(),
        };

        let (scheme, rest) = uri
            .split_once(SCHEME_SEPARATOR)
            .ok_or_else(|| malformed("missing '://' after scheme"))?;
        validate_scheme(scheme).map_err(|reason| malformed(&reason))?;

        let (bucket, key) = match rest.split_once('/') {
            Some((bucket, key)) => (bucket, key),
            None => (rest, ""),
        };
        if bucket.is_empty() {
            return Err(malformed("missing bucket segment"));
        }
        if bucket.chars().any(char::is_whitespace) {
            return Err(malformed("bucket segment must not contain whitespace"));
        }

        Ok(Self {
            scheme: scheme.to_string(),
            bucket: bucket.to_string(),
            key: key.to_string(),
        })
    }

    /// The URI scheme, e.g. `oss`.
    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    /// The bucket name. Never empty.
    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// The object key. Empty for bucket-root addresses.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Returns `true` if this address denotes the bucket itself.
    pub fn is_bucket_root(&self) -> bool {
        self.key.is_empty()
    }

    /// Base name: the bucket for a bucket root, otherwise the last key segment.
    /// A key made only of separators is its own base name.
    pub fn filename(&self) -> &str {
        if self.is_bucket_root() {
            return &self.bucket;
        }
        let trimmed = self.key.trim_end_matches('/');
        if trimmed.is_empty() {
            return &self.key;
        }
        trimmed.rsplit('/').next().unwrap_or(trimmed)
    }

    /// Canonical location string. Bucket roots carry a trailing `/`.
    pub fn uri(&self) -> String {
        self.to_string()
    }

    /// Resolve a path relative to this address.
    ///
    /// A leading `/` replaces the whole key. Otherwise the path replaces the
    /// last key segment, or is appended when this address is a bucket root or
    /// its key ends in `/`.
    pub fn resolve(&self, relative: &str) -> Self {
        let key = if let Some(absolute) = relative.strip_prefix('/') {
            absolute.to_string()
        } else {
            let parent = match self.key.rfind('/') {
                Some(idx) => &self.key[..=idx],
                None => "",
            };
            format!("{parent}{relative}")
        };
        Self {
            scheme: self.scheme.clone(),
            bucket: self.bucket.clone(),
            key,
        }
    }
}

fn validate_scheme(scheme: &str) -> Result<(), String> {
    if scheme.is_empty() {
        return Err("scheme must not be empty".into());
    }
    if !scheme.starts_with(|c: char| c.is_ascii_alphabetic()) {
        return Err("scheme must start with a letter".into());
    }
    if let Some(ch) = scheme
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.')))
    {
        return Err(format!("scheme contains forbidden character: {ch:?}"));
    }
    Ok(())
}

impl fmt::Display for ObjectAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}/{}", self.scheme, self.bucket, self.key)
    }
}

impl FromStr for ObjectAddress {
    type Err = ResourceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Check whether `scheme` is usable in an address.
pub(crate) fn is_valid_scheme(scheme: &str) -> bool {
    validate_scheme(scheme).is_ok()
}
