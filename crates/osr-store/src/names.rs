//! Bucket name and object key validation.
//!
//! Valid bucket names:
//! - Are 3 to 63 characters long
//! - Contain only lowercase ASCII letters, digits, `-` and `.`
//! - Start and end with a letter or digit
//! - Do not contain `..`
//!
//! Valid object keys are non-empty and contain no NUL bytes. Backends may
//! impose further restrictions (see [`FsObjectStore`](crate::FsObjectStore)).

use crate::error::{StoreError, StoreResult};

const MIN_BUCKET_LEN: usize = 3;
const MAX_BUCKET_LEN: usize = 63;

/// Validate a bucket name, returning `Ok(())` if valid.
///
/// # Examples
///
/// ```
/// use osr_store::names::validate_bucket_name;
///
/// assert!(validate_bucket_name("aliyun-test-bucket").is_ok());
/// assert!(validate_bucket_name("logs.2024").is_ok());
/// assert!(validate_bucket_name("ab").is_err());
/// assert!(validate_bucket_name("Upper").is_err());
/// ```
pub fn validate_bucket_name(name: &str) -> StoreResult<()> {
    let invalid = |reason: String| StoreError::InvalidBucketName {
        name: name.to_string(),
        reason,
    };

    if name.len() < MIN_BUCKET_LEN || name.len() > MAX_BUCKET_LEN {
        return Err(invalid(format!(
            "length must be between {MIN_BUCKET_LEN} and {MAX_BUCKET_LEN}"
        )));
    }

    if let Some(ch) = name
        .chars()
        .find(|c| !(c.is_ascii_lowercase() || c.is_ascii_digit() || *c == '-' || *c == '.'))
    {
        return Err(invalid(format!("contains forbidden character: {ch:?}")));
    }

    let alnum = |c: Option<char>| c.is_some_and(|c| c.is_ascii_alphanumeric());
    if !alnum(name.chars().next()) || !alnum(name.chars().last()) {
        return Err(invalid("must start and end with a letter or digit".into()));
    }

    if name.contains("..") {
        return Err(invalid("must not contain '..'".into()));
    }

    Ok(())
}

/// Validate an object key, returning `Ok(())` if valid.
pub fn validate_object_key(key: &str) -> StoreResult<()> {
    if key.is_empty() {
        return Err(StoreError::InvalidKey {
            key: key.to_string(),
            reason: "key must not be empty".into(),
        });
    }
    if key.contains('\0') {
        return Err(StoreError::InvalidKey {
            key: key.to_string(),
            reason: "key must not contain NUL".into(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_bucket_names() {
        assert!(validate_bucket_name("abc").is_ok());
        assert!(validate_bucket_name("aliyun-test-bucket").is_ok());
        assert!(validate_bucket_name("my.bucket.v2").is_ok());
        assert!(validate_bucket_name("0day").is_ok());
    }

    #[test]
    fn reject_bad_length() {
        assert!(validate_bucket_name("").is_err());
        assert!(validate_bucket_name("ab").is_err());
        assert!(validate_bucket_name(&"a".repeat(64)).is_err());
        assert!(validate_bucket_name(&"a".repeat(63)).is_ok());
    }

    #[test]
    fn reject_forbidden_chars() {
        assert!(validate_bucket_name("Bucket").is_err());
        assert!(validate_bucket_name("under_score").is_err());
        assert!(validate_bucket_name("has space").is_err());
        assert!(validate_bucket_name("slash/inside").is_err());
    }

    #[test]
    fn reject_boundaries() {
        assert!(validate_bucket_name("-leading").is_err());
        assert!(validate_bucket_name("trailing.").is_err());
        assert!(validate_bucket_name("a..b").is_err());
    }

    #[test]
    fn object_keys() {
        assert!(validate_object_key("myfilekey").is_ok());
        assert!(validate_object_key("nested/path/file.txt").is_ok());
        assert!(validate_object_key("").is_err());
        assert!(validate_object_key("nul\0byte").is_err());
    }
}
