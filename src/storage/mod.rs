//! Storage clients
//!
//! A [`StorageClient`] moves dataset archives between the local staging
//! area (`local_path`) and a storage area. The storage area is either a
//! second local directory or an object store; the variant is picked from
//! the profile's `storage_type`.
//!
//! Every variant implements the [`StorageBackend`] capability set
//! (list, exists, download, upload). The dataset workflow on top of it
//! (version listing, archive build, pack, verify) lives on
//! [`StorageClient`] and is the same for all variants.

mod local;
mod remote;

pub use local::LocalStorage;
pub use remote::{AwsStorage, AzureStorage};

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::archive::{
    build_archive_folder, validate_dataset_name, versions_of, ArchiveName, Packer, ZipPacker,
};
use crate::config::{Settings, StorageConfig, StorageType};
use crate::error::StorageError;
use crate::manifest::{to_slash_path, verify_archive};
use crate::objstore::{ObjectStoreConnector, ObjectStoreError};
use crate::version::{Version, VersionRequest, VersionSelector};

/// Which side of a client to list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Area {
    /// The storage area archives are published to
    #[default]
    Storage,
    /// The local staging area
    Local,
}

/// Operations every storage variant provides
pub trait StorageBackend {
    /// Configuration this backend was built from
    fn config(&self) -> &StorageConfig;

    /// Root of the local staging area
    fn local_path(&self) -> &Path;

    /// Sorted names of the files in `area`, optionally restricted to names
    /// starting with `prefix`
    fn ls(&self, area: Area, prefix: Option<&str>) -> Result<Vec<String>, StorageError>;

    /// Whether `filename` exists in the storage area
    fn exists(&self, filename: &str) -> Result<bool, StorageError>;

    /// Copy `filename` from the storage area into the staging area
    ///
    /// A file already present locally is returned as is unless `overwrite`
    /// is set.
    fn download(&self, filename: &str, overwrite: bool) -> Result<PathBuf, StorageError>;

    /// Copy `filename` from the staging area into the storage area and
    /// return a locator for the stored copy
    ///
    /// Fails with `AlreadyExists` if the target is taken and `overwrite`
    /// is not set.
    fn upload(&self, filename: &str, overwrite: bool) -> Result<String, StorageError>;
}

/// The closed set of storage variants
pub enum Backend {
    Local(LocalStorage),
    Azure(AzureStorage),
    Aws(AwsStorage),
}

impl Backend {
    /// Build the backend selected by `config`'s `storage_type`
    ///
    /// Remote variants open their object-store handle through `connector`
    /// here; the handle lives as long as the backend.
    pub fn from_config(
        config: StorageConfig,
        connector: &dyn ObjectStoreConnector,
    ) -> Result<Self, StorageError> {
        match config.validate()? {
            StorageType::Local => Ok(Backend::Local(LocalStorage::new(config)?)),
            StorageType::Azure => Ok(Backend::Azure(AzureStorage::connect(config, connector)?)),
            StorageType::Aws => Ok(Backend::Aws(AwsStorage::connect(config, connector)?)),
        }
    }

    /// Variant discriminator
    pub fn storage_type(&self) -> StorageType {
        match self {
            Backend::Local(_) => StorageType::Local,
            Backend::Azure(_) => StorageType::Azure,
            Backend::Aws(_) => StorageType::Aws,
        }
    }

    fn inner(&self) -> &dyn StorageBackend {
        match self {
            Backend::Local(backend) => backend,
            Backend::Azure(backend) => backend,
            Backend::Aws(backend) => backend,
        }
    }
}

impl StorageBackend for Backend {
    fn config(&self) -> &StorageConfig {
        self.inner().config()
    }

    fn local_path(&self) -> &Path {
        self.inner().local_path()
    }

    fn ls(&self, area: Area, prefix: Option<&str>) -> Result<Vec<String>, StorageError> {
        self.inner().ls(area, prefix)
    }

    fn exists(&self, filename: &str) -> Result<bool, StorageError> {
        self.inner().exists(filename)
    }

    fn download(&self, filename: &str, overwrite: bool) -> Result<PathBuf, StorageError> {
        self.inner().download(filename, overwrite)
    }

    fn upload(&self, filename: &str, overwrite: bool) -> Result<String, StorageError> {
        self.inner().upload(filename, overwrite)
    }
}

impl fmt::Debug for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Backend")
            .field("storage_type", &self.storage_type())
            .field("config", self.config())
            .finish()
    }
}

/// Storage client bound to one profile
pub struct StorageClient {
    backend: Backend,
    packer: Box<dyn Packer>,
}

impl StorageClient {
    /// Wrap `backend`, packing archives as zip files
    pub fn new(backend: Backend) -> Self {
        Self {
            backend,
            packer: Box::new(ZipPacker),
        }
    }

    /// Build a client for `config`
    pub fn from_config(
        config: StorageConfig,
        connector: &dyn ObjectStoreConnector,
    ) -> Result<Self, StorageError> {
        Ok(Self::new(Backend::from_config(config, connector)?))
    }

    /// Build a local/local client; no object store is involved
    pub fn local(config: StorageConfig) -> Result<Self, StorageError> {
        Ok(Self::new(Backend::Local(LocalStorage::new(config)?)))
    }

    /// Replace the pack collaborator
    pub fn with_packer(mut self, packer: impl Packer + 'static) -> Self {
        self.packer = Box::new(packer);
        self
    }

    /// The underlying variant
    pub fn backend(&self) -> &Backend {
        &self.backend
    }

    /// Configuration the client was built from
    pub fn config(&self) -> &StorageConfig {
        self.backend.config()
    }

    /// Variant discriminator
    pub fn storage_type(&self) -> StorageType {
        self.backend.storage_type()
    }

    /// Root of the staging area
    pub fn local_path(&self) -> &Path {
        self.backend.local_path()
    }

    /// Sorted file names in `area`
    pub fn ls(&self, area: Area, prefix: Option<&str>) -> Result<Vec<String>, StorageError> {
        self.backend.ls(area, prefix)
    }

    /// Whether `filename` exists in the storage area
    pub fn exists(&self, filename: &str) -> Result<bool, StorageError> {
        self.backend.exists(filename)
    }

    /// See [`StorageBackend::download`]
    pub fn download(&self, filename: &str, overwrite: bool) -> Result<PathBuf, StorageError> {
        self.backend.download(filename, overwrite)
    }

    /// See [`StorageBackend::upload`]
    pub fn upload(&self, filename: &str, overwrite: bool) -> Result<String, StorageError> {
        self.backend.upload(filename, overwrite)
    }

    /// Published versions of dataset `name`, ascending
    ///
    /// Returns `None` rather than an empty list when nothing by that name
    /// is stored. Entries that are not archive names are ignored.
    pub fn ls_versions(&self, name: &str) -> Result<Option<Vec<String>>, StorageError> {
        self.ls_versions_in(name, Area::Storage)
    }

    /// Versions of dataset `name` found in `area`, ascending
    pub fn ls_versions_in(
        &self,
        name: &str,
        area: Area,
    ) -> Result<Option<Vec<String>>, StorageError> {
        let entries = self.ls(area, Some(name))?;
        Ok(versions_of(name, &entries))
    }

    /// Archive dataset `name` from the staging area and publish it
    ///
    /// The version is either given explicitly or derived from the latest
    /// published one. Returns the locator of the uploaded archive.
    pub fn upload_dataset(
        &self,
        name: &str,
        request: impl Into<VersionRequest>,
    ) -> Result<String, StorageError> {
        validate_dataset_name(name)?;
        let prior = self.ls_versions(name)?;
        let request: VersionRequest = request.into();
        let version = request.resolve(prior.as_deref())?;
        log::debug!("resolved {} to version {}", name, version);

        let blob = ArchiveName::new(name, version).file_name();
        if self.backend.exists(&blob)? {
            return Err(StorageError::AlreadyExists(blob));
        }

        let folder = build_archive_folder(
            self.local_path(),
            name,
            prior.as_deref(),
            VersionRequest::Exact(version),
        )?;
        let packed = self.packer.pack(&folder.path)?;
        log::debug!("packed {} into {}", folder.path.display(), packed.display());

        let locator = self.backend.upload(&folder.blob_name(), false)?;
        log::info!("uploaded {} version {} to {}", name, version, locator);
        Ok(locator)
    }

    /// Fetch, unpack and verify a published version of dataset `name`
    ///
    /// An already extracted folder is returned without any transfer unless
    /// `overwrite` is set, in which case it is replaced. A folder that fails
    /// verification is left in place.
    pub fn download_dataset(
        &self,
        name: &str,
        selector: impl Into<VersionSelector>,
        overwrite: bool,
    ) -> Result<PathBuf, StorageError> {
        validate_dataset_name(name)?;
        let selector: VersionSelector = selector.into();
        let archive = match selector {
            VersionSelector::Exact(version) => ArchiveName::new(name, version),
            VersionSelector::Latest => {
                let latest = self
                    .ls_versions(name)?
                    .and_then(|mut versions| versions.pop())
                    .ok_or_else(|| StorageError::NoVersionsFound(name.to_string()))?;
                // Keep the listed spelling; it names the stored blob
                Version::parse(&latest)?;
                ArchiveName {
                    name: name.to_string(),
                    version: latest,
                }
            }
        };
        let version = &archive.version;

        let dst = self.local_path().join(archive.folder_name());
        if dst.exists() {
            if !overwrite {
                log::debug!("{} already present, skipping download", dst.display());
                return Ok(dst);
            }
            remove_path(&dst)?;
        }

        let blob = self.backend.download(&archive.file_name(), overwrite)?;
        self.packer.unpack(&blob, &dst)?;
        if let Err(e) = verify_archive(&dst) {
            log::warn!("verification of {} failed: {}", dst.display(), e);
            return Err(e.into());
        }

        log::info!("downloaded {} version {} to {}", name, version, dst.display());
        Ok(dst)
    }
}

impl fmt::Debug for StorageClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StorageClient")
            .field("backend", &self.backend)
            .finish_non_exhaustive()
    }
}

/// Build the storage client for `profile` in the settings file at
/// `settings_path`
///
/// A missing settings file or profile is reported as a configuration
/// error.
pub fn new_storage_client(
    profile: &str,
    settings_path: &Path,
    connector: &dyn ObjectStoreConnector,
) -> Result<StorageClient, StorageError> {
    let settings = Settings::load(settings_path)?;
    let config = settings.profile(profile)?;
    log::debug!("building {} client for profile {}", config.storage_type()?, profile);
    StorageClient::from_config(config, connector)
}

/// Sorted, forward-slash relative paths of all files under `root`
///
/// The directory is created if it does not exist yet.
pub(crate) fn list_tree(root: &Path, prefix: Option<&str>) -> Result<Vec<String>, StorageError> {
    fs::create_dir_all(root).map_err(|e| StorageError::io(root, e))?;

    let mut names = Vec::new();
    for entry in WalkDir::new(root) {
        let entry = entry.map_err(|e| {
            let path = e.path().map(Path::to_path_buf).unwrap_or_else(|| root.to_path_buf());
            StorageError::io(&path, e.into())
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        if let Ok(rel) = entry.path().strip_prefix(root) {
            names.push(to_slash_path(rel));
        }
    }

    Ok(filter_sorted(names, prefix))
}

/// Keep names starting with `prefix` and sort them
pub(crate) fn filter_sorted(names: Vec<String>, prefix: Option<&str>) -> Vec<String> {
    let mut names: Vec<String> = match prefix {
        Some(prefix) => names.into_iter().filter(|n| n.starts_with(prefix)).collect(),
        None => names,
    };
    names.sort();
    names
}

/// Translate an object-store failure on `locator` into the storage taxonomy
pub(crate) fn map_store_error(
    storage_type: StorageType,
    locator: &str,
    err: ObjectStoreError,
) -> StorageError {
    match err {
        ObjectStoreError::NotFound(_) => StorageError::NotFound(locator.to_string()),
        ObjectStoreError::AlreadyExists(_) => StorageError::AlreadyExists(locator.to_string()),
        ObjectStoreError::Backend(message) => StorageError::Backend {
            backend: storage_type.as_str().to_string(),
            message: format!("{}: {}", locator, message),
        },
    }
}

/// `<dst>.tmp`, the name a write goes to before it is renamed over `dst`
pub(crate) fn temp_sibling(dst: &Path) -> PathBuf {
    let mut name = dst.as_os_str().to_os_string();
    name.push(".tmp");
    PathBuf::from(name)
}

/// Write `data` to `dst` through [`temp_sibling`], so `dst` is either absent,
/// the old file or the complete new one
pub(crate) fn write_file_atomic(dst: &Path, data: &[u8]) -> Result<(), StorageError> {
    if let Some(parent) = dst.parent() {
        fs::create_dir_all(parent).map_err(|e| StorageError::io(parent, e))?;
    }
    let temp_path = temp_sibling(dst);
    if let Err(e) = fs::write(&temp_path, data) {
        let _ = fs::remove_file(&temp_path);
        return Err(StorageError::io(&temp_path, e));
    }
    fs::rename(&temp_path, dst).map_err(|e| StorageError::io(dst, e))
}

fn remove_path(path: &Path) -> Result<(), StorageError> {
    let result = if path.is_dir() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    };
    result.map_err(|e| StorageError::io(path, e))
}
