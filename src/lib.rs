//! Storage Tools - versioned, integrity-checked dataset archives
//!
//! This crate publishes datasets from a local staging area as immutable,
//! semantically versioned zip archives carrying a SHA-256 manifest, and
//! fetches them back from interchangeable storage areas: a local
//! directory, an Azure-style blob container or an AWS-style bucket.

pub mod archive;
pub mod config;
pub mod error;
pub mod manifest;
pub mod objstore;
pub mod storage;
pub mod version;

pub use archive::{build_archive_folder, ArchiveFolder, ArchiveName, Packer, ZipPacker};
pub use config::{Settings, StorageConfig, StorageType};
pub use error::{ErrorKind, StorageError};
pub use manifest::{build_manifest, verify_archive, Manifest};
pub use objstore::{MemoryConnector, MemoryObjectStore, ObjectStore, ObjectStoreConnector};
pub use storage::{new_storage_client, Area, Backend, StorageBackend, StorageClient};
pub use version::{next_version, Increment, Version, VersionRequest, VersionSelector};
