//! Error taxonomy for dataset storage operations
//!
//! Module errors (`VersionError`, `ManifestError`, ...) convert into
//! [`StorageError`]; callers branch on [`StorageError::kind`] rather than on
//! the nested variants.

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

use crate::archive::PackError;
use crate::config::ConfigError;
use crate::manifest::ManifestError;
use crate::version::VersionError;

/// Stable classification of storage errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Malformed version string
    InvalidVersion,
    /// Increment token outside major/minor/patch
    UnknownIncrement,
    /// Dataset name cannot be stored under the archive naming convention
    InvalidName,
    /// Source dataset, local file or stored archive absent
    NotFound,
    /// Write attempted over an existing target without overwrite
    AlreadyExists,
    /// Latest version requested but none are published
    NoVersionsFound,
    /// Archive contents do not match their manifest
    IntegrityMismatch,
    /// Missing or malformed storage profile
    ConfigurationError,
    /// Packing or unpacking an archive blob failed
    Pack,
    /// Object-store failure other than not-found/already-exists
    Backend,
    /// Local filesystem failure
    Io,
}

impl ErrorKind {
    /// Returns the string representation of the error kind
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::InvalidVersion => "INVALID_VERSION",
            ErrorKind::UnknownIncrement => "UNKNOWN_INCREMENT",
            ErrorKind::InvalidName => "INVALID_NAME",
            ErrorKind::NotFound => "NOT_FOUND",
            ErrorKind::AlreadyExists => "ALREADY_EXISTS",
            ErrorKind::NoVersionsFound => "NO_VERSIONS_FOUND",
            ErrorKind::IntegrityMismatch => "INTEGRITY_MISMATCH",
            ErrorKind::ConfigurationError => "CONFIGURATION_ERROR",
            ErrorKind::Pack => "PACK_ERROR",
            ErrorKind::Backend => "BACKEND_ERROR",
            ErrorKind::Io => "IO_ERROR",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Errors raised by archive building and storage clients
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error(transparent)]
    Version(#[from] VersionError),

    #[error(transparent)]
    Manifest(#[from] ManifestError),

    #[error(transparent)]
    Pack(#[from] PackError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Invalid dataset name {name:?}: {reason}")]
    InvalidName { name: String, reason: String },

    #[error("{0} not found")]
    NotFound(String),

    #[error("{0} exists and overwrite=false")]
    AlreadyExists(String),

    #[error("latest version of {0} requested but no versions exist in storage area")]
    NoVersionsFound(String),

    #[error("{backend} backend error: {message}")]
    Backend { backend: String, message: String },

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl StorageError {
    /// Returns the classification of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            StorageError::Version(VersionError::InvalidVersion(_)) => ErrorKind::InvalidVersion,
            StorageError::Version(VersionError::UnknownIncrement(_)) => ErrorKind::UnknownIncrement,
            StorageError::Manifest(ManifestError::Io { .. }) => ErrorKind::Io,
            StorageError::Manifest(ManifestError::Walk(_)) => ErrorKind::Io,
            StorageError::Manifest(_) => ErrorKind::IntegrityMismatch,
            StorageError::Pack(_) => ErrorKind::Pack,
            StorageError::Config(_) => ErrorKind::ConfigurationError,
            StorageError::InvalidName { .. } => ErrorKind::InvalidName,
            StorageError::NotFound(_) => ErrorKind::NotFound,
            StorageError::AlreadyExists(_) => ErrorKind::AlreadyExists,
            StorageError::NoVersionsFound(_) => ErrorKind::NoVersionsFound,
            StorageError::Backend { .. } => ErrorKind::Backend,
            StorageError::Io { .. } => ErrorKind::Io,
        }
    }

    /// Wrap an I/O error with the path it occurred on
    ///
    /// `NotFound` I/O errors become [`StorageError::NotFound`] so callers
    /// see the same condition whichever layer noticed it first.
    pub fn io(path: &Path, source: io::Error) -> Self {
        if source.kind() == io::ErrorKind::NotFound {
            return StorageError::NotFound(path.display().to_string());
        }
        StorageError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kind_str() {
        assert_eq!(ErrorKind::AlreadyExists.as_str(), "ALREADY_EXISTS");
        assert_eq!(ErrorKind::IntegrityMismatch.to_string(), "INTEGRITY_MISMATCH");
    }

    #[test]
    fn test_version_errors_keep_their_kind() {
        let err = StorageError::from(VersionError::InvalidVersion("1.x".to_string()));
        assert_eq!(err.kind(), ErrorKind::InvalidVersion);
        assert!(err.to_string().contains("1.x"));

        let err = StorageError::from(VersionError::UnknownIncrement("huge".to_string()));
        assert_eq!(err.kind(), ErrorKind::UnknownIncrement);
    }

    #[test]
    fn test_integrity_mismatch_kind() {
        let err = StorageError::from(ManifestError::IntegrityMismatch {
            file: "data/a.csv".to_string(),
            expected: "aa".to_string(),
            actual: "bb".to_string(),
        });
        assert_eq!(err.kind(), ErrorKind::IntegrityMismatch);
        let message = err.to_string();
        assert!(message.contains("data/a.csv"));
        assert!(message.contains("Expected aa but found bb"));
    }

    #[test]
    fn test_io_not_found_maps_to_not_found() {
        let err = StorageError::io(
            Path::new("/staging/ds"),
            io::Error::new(io::ErrorKind::NotFound, "gone"),
        );
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert!(err.to_string().contains("/staging/ds"));

        let err = StorageError::io(
            Path::new("/staging/ds"),
            io::Error::new(io::ErrorKind::PermissionDenied, "nope"),
        );
        assert_eq!(err.kind(), ErrorKind::Io);
    }

    #[test]
    fn test_already_exists_message_names_target() {
        let err = StorageError::AlreadyExists("aws:bucket:ds.1.0.0.zip".to_string());
        assert_eq!(err.to_string(), "aws:bucket:ds.1.0.0.zip exists and overwrite=false");
    }
}
