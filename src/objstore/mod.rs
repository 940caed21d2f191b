//! Object-store capability
//!
//! The remote storage clients talk to their backend only through
//! [`ObjectStore`]: put, get, list-by-prefix and exists. The wire protocol
//! behind it belongs to whoever implements the trait.
//!
//! Backend handles are acquired once, when a storage client is built,
//! through an [`ObjectStoreConnector`], and released when the client is
//! dropped.

mod failure;
mod memory;

pub use failure::{FailureConfig, FailureInjector, StoreOp};
pub use memory::{MemoryConnector, MemoryObjectStore};

use crate::config::{StorageConfig, StorageType};

/// Errors reported by object-store backends
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ObjectStoreError {
    #[error("object not found: {0}")]
    NotFound(String),

    #[error("object already exists: {0}")]
    AlreadyExists(String),

    #[error("{0}")]
    Backend(String),
}

/// How a put treats an existing object
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PutMode {
    /// Fail with `AlreadyExists` if the key is taken (where supported)
    Create,
    /// Replace whatever is stored under the key
    Overwrite,
}

/// A listed object
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectInfo {
    /// Full object key
    pub key: String,
    /// Size in bytes
    pub size: u64,
}

/// Minimal blocking object-store interface
pub trait ObjectStore: Send + Sync {
    /// Store `data` under `key`
    ///
    /// With [`PutMode::Create`], stores that support conditional writes
    /// return [`ObjectStoreError::AlreadyExists`] when the key is taken.
    /// Stores that do not may silently overwrite.
    fn put(&self, key: &str, data: &[u8], mode: PutMode) -> Result<(), ObjectStoreError>;

    /// Fetch the object stored under `key`
    fn get(&self, key: &str) -> Result<Vec<u8>, ObjectStoreError>;

    /// List objects whose key starts with `prefix`
    ///
    /// Implementations may ignore the prefix and return a superset.
    fn list(&self, prefix: Option<&str>) -> Result<Vec<ObjectInfo>, ObjectStoreError>;

    /// Whether an object exists under exactly `key`
    fn exists(&self, key: &str) -> Result<bool, ObjectStoreError>;

    /// Whether [`PutMode::Create`] is enforced by the backend
    fn supports_conditional_put(&self) -> bool {
        false
    }
}

/// Opens backend handles for remote storage clients
pub trait ObjectStoreConnector {
    /// Open the store described by `config` for a client of `storage_type`
    fn connect(
        &self,
        storage_type: StorageType,
        config: &StorageConfig,
    ) -> Result<Box<dyn ObjectStore>, ObjectStoreError>;
}
