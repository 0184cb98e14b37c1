use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::address::is_valid_scheme;
use crate::error::{ResourceError, ResourceResult};

/// Scheme handled by default.
pub const DEFAULT_SCHEME: &str = "oss";
/// Bytes buffered between a write stream and its upload worker.
pub const DEFAULT_PIPE_CAPACITY: usize = 64 * 1024;
/// Upload workers, i.e. simultaneous uploads.
pub const DEFAULT_MAX_CONCURRENT_UPLOADS: usize = 8;

/// Resolved settings for resources and their upload executor.
///
/// Loaded from TOML; every field is optional:
///
/// ```toml
/// scheme = "oss"
/// auto_create_files = true
/// pipe_capacity = 65536
/// max_concurrent_uploads = 8
/// store_root = "/var/lib/osr"
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResourceConfig {
    pub scheme: String,
    pub auto_create_files: bool,
    pub pipe_capacity: usize,
    pub max_concurrent_uploads: usize,
    /// Root directory for the filesystem store.
    pub store_root: PathBuf,
}

impl Default for ResourceConfig {
    fn default() -> Self {
        Self {
            scheme: DEFAULT_SCHEME.to_string(),
            auto_create_files: true,
            pipe_capacity: DEFAULT_PIPE_CAPACITY,
            max_concurrent_uploads: DEFAULT_MAX_CONCURRENT_UPLOADS,
            store_root: PathBuf::from("osr-data"),
        }
    }
}

impl ResourceConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(text: &str) -> ResourceResult<Self> {
        let config: Self = toml::from_str(text).map_err(|e| ResourceError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file.
    pub fn load(path: &Path) -> ResourceResult<Self> {
        let text = fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Check that the settings are usable.
    pub fn validate(&self) -> ResourceResult<()> {
        if !is_valid_scheme(&self.scheme) {
            return Err(ResourceError::Config(format!(
                "invalid scheme {:?}",
                self.scheme
            )));
        }
        if self.pipe_capacity == 0 {
            return Err(ResourceError::Config("pipe_capacity must be non-zero".into()));
        }
        if self.max_concurrent_uploads == 0 {
            return Err(ResourceError::Config(
                "max_concurrent_uploads must be non-zero".into(),
            ));
        }
        Ok(())
    }
}
