//! Object-store backed storage: Azure-style containers and AWS-style buckets
//!
//! Both variants keep the staging area on the local filesystem and talk to
//! the storage area through an [`ObjectStore`] handle opened once at
//! construction. They differ in how they protect against clobbering an
//! existing object and in what their listings contain.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use super::{
    filter_sorted, list_tree, map_store_error, write_file_atomic, Area, StorageBackend,
};
use crate::config::{
    ConfigError, StorageConfig, StorageType, BUCKET_KEY, CONTAINER_KEY, STORAGE_TYPE_KEY,
};
use crate::error::StorageError;
use crate::objstore::{ObjectInfo, ObjectStore, ObjectStoreConnector, PutMode};

/// State shared by the remote variants
struct RemoteArea {
    storage_type: StorageType,
    config: StorageConfig,
    local_path: PathBuf,
    /// Container or bucket name
    target: String,
    store: Box<dyn ObjectStore>,
}

impl RemoteArea {
    fn connect(
        storage_type: StorageType,
        target_key: &str,
        config: StorageConfig,
        connector: &dyn ObjectStoreConnector,
    ) -> Result<Self, StorageError> {
        let found = config.validate()?;
        if found != storage_type {
            return Err(ConfigError::InvalidValue {
                profile: config.profile().to_string(),
                key: STORAGE_TYPE_KEY.to_string(),
                reason: format!("expected {}, found {}", storage_type, found),
            }
            .into());
        }
        let local_path = config.local_path()?;
        let target = config.require(target_key)?.to_string();

        let locator = format!("{}:{}", storage_type, target);
        let store = connector
            .connect(storage_type, &config)
            .map_err(|e| map_store_error(storage_type, &locator, e))?;
        log::debug!("connected to {}", locator);

        Ok(Self {
            storage_type,
            config,
            local_path,
            target,
            store,
        })
    }

    fn locator(&self, filename: &str) -> String {
        format!("{}:{}:{}", self.storage_type, self.target, filename)
    }

    fn list(&self, prefix: Option<&str>) -> Result<Vec<ObjectInfo>, StorageError> {
        self.store
            .list(prefix)
            .map_err(|e| map_store_error(self.storage_type, &self.locator(prefix.unwrap_or("")), e))
    }

    fn exists(&self, filename: &str) -> Result<bool, StorageError> {
        self.store
            .exists(filename)
            .map_err(|e| map_store_error(self.storage_type, &self.locator(filename), e))
    }

    fn download(&self, filename: &str, overwrite: bool) -> Result<PathBuf, StorageError> {
        let dst = self.local_path.join(filename);
        if dst.exists() && !overwrite {
            log::debug!("{} already in staging area", dst.display());
            return Ok(dst);
        }

        let data = self
            .store
            .get(filename)
            .map_err(|e| map_store_error(self.storage_type, &self.locator(filename), e))?;
        write_file_atomic(&dst, &data)?;
        log::debug!("fetched {} ({} bytes)", self.locator(filename), data.len());
        Ok(dst)
    }

    fn put(&self, filename: &str, mode: PutMode) -> Result<String, StorageError> {
        let src = self.local_path.join(filename);
        let data = fs::read(&src).map_err(|e| StorageError::io(&src, e))?;
        let locator = self.locator(filename);
        self.store
            .put(filename, &data, mode)
            .map_err(|e| map_store_error(self.storage_type, &locator, e))?;
        log::debug!("stored {} ({} bytes)", locator, data.len());
        Ok(locator)
    }
}

impl fmt::Debug for RemoteArea {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteArea")
            .field("storage_type", &self.storage_type)
            .field("target", &self.target)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Storage area in an Azure-style blob container
///
/// Uploads without `overwrite` use the store's native no-clobber write.
/// Stores without conditional writes get an existence check first.
#[derive(Debug)]
pub struct AzureStorage {
    remote: RemoteArea,
}

impl AzureStorage {
    /// Open the container named by the profile's `container` key
    pub fn connect(
        config: StorageConfig,
        connector: &dyn ObjectStoreConnector,
    ) -> Result<Self, StorageError> {
        Ok(Self {
            remote: RemoteArea::connect(StorageType::Azure, CONTAINER_KEY, config, connector)?,
        })
    }

    /// Container name
    pub fn container(&self) -> &str {
        &self.remote.target
    }
}

impl StorageBackend for AzureStorage {
    fn config(&self) -> &StorageConfig {
        &self.remote.config
    }

    fn local_path(&self) -> &Path {
        &self.remote.local_path
    }

    fn ls(&self, area: Area, prefix: Option<&str>) -> Result<Vec<String>, StorageError> {
        if area == Area::Local {
            return list_tree(&self.remote.local_path, prefix);
        }
        let names = self.remote.list(prefix)?.into_iter().map(|o| o.key).collect();
        Ok(filter_sorted(names, prefix))
    }

    fn exists(&self, filename: &str) -> Result<bool, StorageError> {
        self.remote.exists(filename)
    }

    fn download(&self, filename: &str, overwrite: bool) -> Result<PathBuf, StorageError> {
        self.remote.download(filename, overwrite)
    }

    fn upload(&self, filename: &str, overwrite: bool) -> Result<String, StorageError> {
        if overwrite {
            return self.remote.put(filename, PutMode::Overwrite);
        }
        if !self.remote.store.supports_conditional_put() && self.remote.exists(filename)? {
            return Err(StorageError::AlreadyExists(self.remote.locator(filename)));
        }
        self.remote.put(filename, PutMode::Create)
    }
}

/// Storage area in an AWS-style bucket
///
/// Uploads without `overwrite` check for an existing object first; the
/// check and the write are not atomic. Zero-size objects (directory
/// markers) are left out of listings.
#[derive(Debug)]
pub struct AwsStorage {
    remote: RemoteArea,
}

impl AwsStorage {
    /// Open the bucket named by the profile's `bucket` key
    pub fn connect(
        config: StorageConfig,
        connector: &dyn ObjectStoreConnector,
    ) -> Result<Self, StorageError> {
        Ok(Self {
            remote: RemoteArea::connect(StorageType::Aws, BUCKET_KEY, config, connector)?,
        })
    }

    /// Bucket name
    pub fn bucket(&self) -> &str {
        &self.remote.target
    }
}

impl StorageBackend for AwsStorage {
    fn config(&self) -> &StorageConfig {
        &self.remote.config
    }

    fn local_path(&self) -> &Path {
        &self.remote.local_path
    }

    fn ls(&self, area: Area, prefix: Option<&str>) -> Result<Vec<String>, StorageError> {
        if area == Area::Local {
            return list_tree(&self.remote.local_path, prefix);
        }
        let names = self
            .remote
            .list(prefix)?
            .into_iter()
            .filter(|o| o.size > 0)
            .map(|o| o.key)
            .collect();
        Ok(filter_sorted(names, prefix))
    }

    fn exists(&self, filename: &str) -> Result<bool, StorageError> {
        self.remote.exists(filename)
    }

    fn download(&self, filename: &str, overwrite: bool) -> Result<PathBuf, StorageError> {
        self.remote.download(filename, overwrite)
    }

    fn upload(&self, filename: &str, overwrite: bool) -> Result<String, StorageError> {
        if !overwrite && self.remote.exists(filename)? {
            return Err(StorageError::AlreadyExists(self.remote.locator(filename)));
        }
        self.remote.put(filename, PutMode::Overwrite)
    }
}
