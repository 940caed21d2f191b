//! Storage profiles
//!
//! A [`StorageConfig`] is the immutable key/value mapping bound to one
//! storage client. Profiles come from a TOML settings file with one table
//! per profile:
//!
//! ```toml
//! [archive]
//! storage_type = "local"
//! local_path = "data/staging"
//! storage_area = "data/archive"
//!
//! [cloud]
//! storage_type = "aws"
//! local_path = "data/staging"
//! bucket = "datasets"
//! aws_access_key_id = "..."
//! aws_secret_access_key = "..."
//! ```

mod settings;

pub use settings::{Settings, DEFAULT_SETTINGS_PATH};

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Key naming the backend variant
pub const STORAGE_TYPE_KEY: &str = "storage_type";

/// Key holding the staging-area root
pub const LOCAL_PATH_KEY: &str = "local_path";

/// Key holding the local storage-area root
pub const STORAGE_AREA_KEY: &str = "storage_area";

/// Key holding the container name for Azure-style stores
pub const CONTAINER_KEY: &str = "container";

/// Key holding the bucket name for AWS-style stores
pub const BUCKET_KEY: &str = "bucket";

/// Key fragments whose values are never printed
const SECRET_KEYS: &[&str] = &["credential", "conn_str", "secret", "password", "token"];

/// Errors for storage profile handling
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read settings file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse settings file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Settings file not found: {0}")]
    SettingsNotFound(PathBuf),

    #[error("Error: [{profile}] section not found in {source_name}")]
    ProfileNotFound { profile: String, source_name: String },

    #[error("Profile '{profile}': missing required key '{key}'")]
    MissingKey { profile: String, key: String },

    #[error("Profile '{profile}': invalid value for '{key}': {reason}")]
    InvalidValue {
        profile: String,
        key: String,
        reason: String,
    },

    #[error("Unknown storage_type: {0}")]
    UnknownStorageType(String),
}

/// Backend variant selected by `storage_type`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageType {
    /// Both areas on the local filesystem
    Local,
    /// Azure-style blob container (native no-clobber writes)
    Azure,
    /// AWS-style bucket (existence checked before writes)
    Aws,
}

impl StorageType {
    /// Returns the `storage_type` token for this variant
    pub fn as_str(&self) -> &'static str {
        match self {
            StorageType::Local => "local",
            StorageType::Azure => "azure",
            StorageType::Aws => "aws",
        }
    }

    /// Keys a profile of this type must define
    pub fn required_keys(&self) -> &'static [&'static str] {
        match self {
            StorageType::Local => &[LOCAL_PATH_KEY, STORAGE_AREA_KEY],
            StorageType::Azure => &[LOCAL_PATH_KEY, CONTAINER_KEY],
            StorageType::Aws => &[LOCAL_PATH_KEY, BUCKET_KEY],
        }
    }
}

impl fmt::Display for StorageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for StorageType {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "local" => Ok(StorageType::Local),
            "azure" => Ok(StorageType::Azure),
            "aws" => Ok(StorageType::Aws),
            other => Err(ConfigError::UnknownStorageType(other.to_string())),
        }
    }
}

/// Immutable configuration of one storage client
#[derive(Clone, PartialEq, Eq)]
pub struct StorageConfig {
    profile: String,
    values: BTreeMap<String, String>,
}

impl StorageConfig {
    /// Build a configuration from raw key/value pairs
    pub fn new<I, K, V>(profile: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            profile: profile.into(),
            values: values
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Convenience constructor for a local/local profile
    pub fn local(local_path: impl Into<String>, storage_area: impl Into<String>) -> Self {
        Self::new(
            "local",
            [
                (STORAGE_TYPE_KEY, StorageType::Local.as_str().to_string()),
                (LOCAL_PATH_KEY, local_path.into()),
                (STORAGE_AREA_KEY, storage_area.into()),
            ],
        )
    }

    /// Name of the profile this configuration came from
    pub fn profile(&self) -> &str {
        &self.profile
    }

    /// Value for `key`, if present
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// Value for `key`, or a configuration error naming the profile
    pub fn require(&self, key: &str) -> Result<&str, ConfigError> {
        self.get(key).ok_or_else(|| ConfigError::MissingKey {
            profile: self.profile.clone(),
            key: key.to_string(),
        })
    }

    /// The backend discriminator
    pub fn storage_type(&self) -> Result<StorageType, ConfigError> {
        self.require(STORAGE_TYPE_KEY)?.parse()
    }

    /// Root of the staging area
    pub fn local_path(&self) -> Result<PathBuf, ConfigError> {
        self.require(LOCAL_PATH_KEY).map(PathBuf::from)
    }

    /// Check that the keys required by the configured backend are present
    pub fn validate(&self) -> Result<StorageType, ConfigError> {
        let storage_type = self.storage_type()?;
        for key in storage_type.required_keys() {
            let value = self.require(key)?;
            if value.trim().is_empty() {
                return Err(ConfigError::InvalidValue {
                    profile: self.profile.clone(),
                    key: key.to_string(),
                    reason: "must not be empty".to_string(),
                });
            }
        }
        Ok(storage_type)
    }

    /// Iterate over all key/value pairs in key order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl fmt::Debug for StorageConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let redacted: BTreeMap<&str, &str> = self
            .values
            .iter()
            .map(|(k, v)| {
                if is_secret_key(k) {
                    (k.as_str(), "[REDACTED]")
                } else {
                    (k.as_str(), v.as_str())
                }
            })
            .collect();
        f.debug_struct("StorageConfig")
            .field("profile", &self.profile)
            .field("values", &redacted)
            .finish()
    }
}

fn is_secret_key(key: &str) -> bool {
    let lower = key.to_lowercase();
    SECRET_KEYS.iter().any(|secret| lower.contains(secret))
}
