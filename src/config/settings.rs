//! Settings file loading
//!
//! The settings file is TOML with one table per storage profile. Values
//! are kept as strings; integers, floats and booleans are accepted and
//! stringified, nested tables and arrays are rejected.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use super::{ConfigError, StorageConfig};

/// Default location of the settings file, relative to the working directory
pub const DEFAULT_SETTINGS_PATH: &str = "secrets/settings.toml";

/// All storage profiles defined in a settings file
#[derive(Debug, Clone, Default)]
pub struct Settings {
    source_name: String,
    profiles: BTreeMap<String, StorageConfig>,
}

impl Settings {
    /// Load settings from the default location
    pub fn load_default() -> Result<Self, ConfigError> {
        Self::load(Path::new(DEFAULT_SETTINGS_PATH))
    }

    /// Load settings from `path`
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::SettingsNotFound(path.to_path_buf()));
        }
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut settings = Self::parse(&content)?;
        settings.source_name = path.display().to_string();
        Ok(settings)
    }

    /// Parse settings from a TOML string
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let table: toml::Table = toml::from_str(content)?;
        let mut profiles = BTreeMap::new();

        for (profile, value) in table {
            let section = match value {
                toml::Value::Table(section) => section,
                _ => {
                    return Err(ConfigError::InvalidValue {
                        profile: profile.clone(),
                        key: profile,
                        reason: "top-level entries must be profile tables".to_string(),
                    })
                }
            };

            let mut values = BTreeMap::new();
            for (key, value) in section {
                let text = scalar_to_string(&value).ok_or_else(|| ConfigError::InvalidValue {
                    profile: profile.clone(),
                    key: key.clone(),
                    reason: format!("expected a scalar, found {}", value.type_str()),
                })?;
                values.insert(key, text);
            }
            profiles.insert(profile.clone(), StorageConfig::new(profile, values));
        }

        Ok(Self {
            source_name: "<inline settings>".to_string(),
            profiles,
        })
    }

    /// The configuration of `profile`
    ///
    /// The profile must exist and carry the keys its `storage_type`
    /// requires.
    pub fn profile(&self, profile: &str) -> Result<StorageConfig, ConfigError> {
        let config = self
            .profiles
            .get(profile)
            .ok_or_else(|| ConfigError::ProfileNotFound {
                profile: profile.to_string(),
                source_name: self.source_name.clone(),
            })?;
        config.validate()?;
        Ok(config.clone())
    }

    /// Names of all defined profiles, sorted
    pub fn profile_names(&self) -> Vec<&str> {
        self.profiles.keys().map(String::as_str).collect()
    }

    /// Where these settings were read from
    pub fn source_name(&self) -> &str {
        &self.source_name
    }

    /// Path of the settings file this was loaded from, if any
    pub fn source_path(&self) -> Option<PathBuf> {
        let path = PathBuf::from(&self.source_name);
        path.exists().then_some(path)
    }
}

fn scalar_to_string(value: &toml::Value) -> Option<String> {
    match value {
        toml::Value::String(s) => Some(s.clone()),
        toml::Value::Integer(i) => Some(i.to_string()),
        toml::Value::Float(f) => Some(f.to_string()),
        toml::Value::Boolean(b) => Some(b.to_string()),
        toml::Value::Datetime(dt) => Some(dt.to_string()),
        toml::Value::Array(_) | toml::Value::Table(_) => None,
    }
}
