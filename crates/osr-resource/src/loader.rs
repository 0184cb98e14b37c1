use std::sync::Arc;

use osr_store::ObjectStoreClient;
use tracing::debug;

use crate::config::ResourceConfig;
use crate::error::{ResourceError, ResourceResult};
use crate::executor::UploadExecutor;
use crate::resource::ObjectResource;

/// Turns `scheme://...` location strings into [`ObjectResource`]s.
///
/// Owns the shared upload executor; every resource it hands out uploads on
/// the same bounded pool.
#[derive(Clone)]
pub struct ResourceLoader {
    config: ResourceConfig,
    client: Arc<dyn ObjectStoreClient>,
    executor: Arc<UploadExecutor>,
}

impl ResourceLoader {
    /// Create a loader with its own executor sized from `config`.
    pub fn new(config: ResourceConfig, client: Arc<dyn ObjectStoreClient>) -> ResourceResult<Self> {
        config.validate()?;
        let executor = Arc::new(UploadExecutor::new(config.max_concurrent_uploads)?);
        Self::with_executor(config, client, executor)
    }

    /// Create a loader that uploads on an existing executor.
    pub fn with_executor(
        config: ResourceConfig,
        client: Arc<dyn ObjectStoreClient>,
        executor: Arc<UploadExecutor>,
    ) -> ResourceResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            client,
            executor,
        })
    }

    /// The scheme this loader answers for.
    pub fn scheme(&self) -> &str {
        &self.config.scheme
    }

    /// The shared upload executor.
    pub fn executor(&self) -> &Arc<UploadExecutor> {
        &self.executor
    }

    /// Resolve `location` if it uses this loader's scheme; `None` otherwise,
    /// so another resolver can try.
    pub fn resolve(&self, location: &str) -> Option<ResourceResult<ObjectResource>> {
        let rest = location.strip_prefix(self.config.scheme.as_str())?;
        if !rest.starts_with("://") {
            return None;
        }
        debug!(location, "resolving object resource");
        Some(self.build(location))
    }

    /// Resolve `location`, treating a foreign scheme as a malformed address.
    pub fn load(&self, location: &str) -> ResourceResult<ObjectResource> {
        self.resolve(location).unwrap_or_else(|| {
            Err(ResourceError::MalformedAddress {
                uri: location.to_string(),
                reason: format!("expected a {}:// location", self.config.scheme),
            })
        })
    }

    /// Drain in-flight uploads and refuse new ones.
    pub fn shutdown(&self) {
        self.executor.shutdown();
    }

    fn build(&self, location: &str) -> ResourceResult<ObjectResource> {
        Ok(ObjectResource::new(location, Arc::clone(&self.client), Arc::clone(&self.executor))?
            .with_auto_create_files(self.config.auto_create_files)
            .with_pipe_capacity(self.config.pipe_capacity))
    }
}

impl std::fmt::Debug for ResourceLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceLoader")
            .field("config", &self.config)
            .field("executor", &self.executor)
            .finish()
    }
}
