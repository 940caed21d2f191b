//! Local/local storage: the storage area is a second directory

use std::fs;
use std::path::{Path, PathBuf};

use super::{list_tree, temp_sibling, Area, StorageBackend};
use crate::config::{ConfigError, StorageConfig, StorageType, STORAGE_AREA_KEY, STORAGE_TYPE_KEY};
use crate::error::StorageError;

/// Storage client whose storage area lives on the local filesystem
#[derive(Debug, Clone)]
pub struct LocalStorage {
    config: StorageConfig,
    local_path: PathBuf,
    storage_area: PathBuf,
}

impl LocalStorage {
    /// Build from a `storage_type = "local"` profile
    pub fn new(config: StorageConfig) -> Result<Self, StorageError> {
        let storage_type = config.validate()?;
        if storage_type != StorageType::Local {
            return Err(ConfigError::InvalidValue {
                profile: config.profile().to_string(),
                key: STORAGE_TYPE_KEY.to_string(),
                reason: format!("expected local, found {}", storage_type),
            }
            .into());
        }
        let local_path = config.local_path()?;
        let storage_area = PathBuf::from(config.require(STORAGE_AREA_KEY)?);
        Ok(Self {
            config,
            local_path,
            storage_area,
        })
    }

    /// Root of the storage area
    pub fn storage_area(&self) -> &Path {
        &self.storage_area
    }
}

impl StorageBackend for LocalStorage {
    fn config(&self) -> &StorageConfig {
        &self.config
    }

    fn local_path(&self) -> &Path {
        &self.local_path
    }

    fn ls(&self, area: Area, prefix: Option<&str>) -> Result<Vec<String>, StorageError> {
        match area {
            Area::Storage => list_tree(&self.storage_area, prefix),
            Area::Local => list_tree(&self.local_path, prefix),
        }
    }

    fn exists(&self, filename: &str) -> Result<bool, StorageError> {
        Ok(self.storage_area.join(filename).exists())
    }

    fn download(&self, filename: &str, overwrite: bool) -> Result<PathBuf, StorageError> {
        let dst = self.local_path.join(filename);
        if dst.exists() && !overwrite {
            log::debug!("{} already in staging area", dst.display());
            return Ok(dst);
        }
        copy_file(&self.storage_area.join(filename), &dst)?;
        Ok(dst)
    }

    fn upload(&self, filename: &str, overwrite: bool) -> Result<String, StorageError> {
        let dst = self.storage_area.join(filename);
        if dst.exists() && !overwrite {
            return Err(StorageError::AlreadyExists(dst.display().to_string()));
        }
        copy_file(&self.local_path.join(filename), &dst)?;
        Ok(dst.display().to_string())
    }
}

/// Copy `src` to `dst` through a temporary sibling so `dst` is either the
/// old file or the complete new one
fn copy_file(src: &Path, dst: &Path) -> Result<(), StorageError> {
    if !src.is_file() {
        return Err(StorageError::NotFound(src.display().to_string()));
    }
    if let Some(parent) = dst.parent() {
        fs::create_dir_all(parent).map_err(|e| StorageError::io(parent, e))?;
    }

    let temp_path = temp_sibling(dst);

    if let Err(e) = fs::copy(src, &temp_path) {
        let _ = fs::remove_file(&temp_path);
        return Err(StorageError::io(&temp_path, e));
    }
    fs::rename(&temp_path, dst).map_err(|e| StorageError::io(dst, e))
}
