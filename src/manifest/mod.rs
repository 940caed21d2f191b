//! Archive manifests (manifest.json)
//!
//! Every archive folder carries a `manifest.json` listing each regular file
//! under the folder with its SHA-256 digest, plus the UTC time the manifest
//! was built. The manifest is rebuilt wholesale, never patched, but
//! top-level keys this crate does not know about survive a rebuild.
//!
//! On-disk format:
//!
//! ```json
//! {
//!   "datetime": "2024-05-01T09:30:00.000000Z",
//!   "files": [
//!     { "file": "sub/data.csv", "sha256": "<lowercase hex>" }
//!   ]
//! }
//! ```

mod verify;

pub use verify::verify_archive;

use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io;
use std::path::{Component, Path, PathBuf};
use walkdir::WalkDir;

/// File name of the manifest inside an archive folder
pub const MANIFEST_FILE: &str = "manifest.json";

/// Errors for manifest operations
#[derive(Debug, thiserror::Error)]
pub enum ManifestError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("JSON error in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Walk error: {0}")]
    Walk(#[from] walkdir::Error),

    #[error("Invalid manifest {path}: {reason}")]
    InvalidManifest { path: PathBuf, reason: String },

    #[error("sha mismatch for {file}. Expected {expected} but found {actual}")]
    IntegrityMismatch {
        file: String,
        expected: String,
        actual: String,
    },
}

impl ManifestError {
    fn io(path: &Path, source: io::Error) -> Self {
        ManifestError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// A single file entry in the manifest
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestFile {
    /// Path relative to the archive folder, `/`-separated
    pub file: String,

    /// Lowercase hex SHA-256 of the file contents
    pub sha256: String,
}

/// Declared contents of an archive folder
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    /// When the manifest was built (ISO-8601, UTC)
    pub datetime: String,

    /// Every regular file in the folder, sorted by path
    pub files: Vec<ManifestFile>,

    /// Top-level keys carried over from an earlier manifest
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl Manifest {
    /// Path of the manifest file inside `folder`
    pub fn path_in(folder: &Path) -> PathBuf {
        folder.join(MANIFEST_FILE)
    }

    /// Hash every regular file under `folder` into a fresh manifest
    ///
    /// The folder's own `manifest.json` is never listed. Nothing is
    /// written; see [`build_manifest`] for the persisting variant.
    pub fn scan(folder: &Path) -> Result<Self, ManifestError> {
        let mut files = Vec::new();

        for entry in WalkDir::new(folder)
            .follow_links(true)
            .sort_by(|a, b| a.file_name().cmp(b.file_name()))
        {
            let entry = entry?;
            if !entry.file_type().is_file() {
                continue;
            }

            let rel_path = entry.path().strip_prefix(folder).map_err(|_| {
                ManifestError::InvalidManifest {
                    path: entry.path().to_path_buf(),
                    reason: "file is outside the archive folder".to_string(),
                }
            })?;
            let rel = to_slash_path(rel_path);
            if rel == MANIFEST_FILE {
                continue;
            }

            files.push(ManifestFile {
                sha256: sha256_file(entry.path())?,
                file: rel,
            });
        }

        files.sort_by(|a, b| a.file.cmp(&b.file));

        Ok(Self {
            datetime: now_timestamp(),
            files,
            extra: BTreeMap::new(),
        })
    }

    /// Load the manifest stored in `folder`
    pub fn load(folder: &Path) -> Result<Self, ManifestError> {
        let path = Self::path_in(folder);
        if !path.is_file() {
            return Err(ManifestError::InvalidManifest {
                path,
                reason: "manifest not found".to_string(),
            });
        }
        let json = fs::read_to_string(&path).map_err(|e| ManifestError::io(&path, e))?;
        serde_json::from_str(&json).map_err(|source| ManifestError::Json { path, source })
    }

    /// Serialize to pretty JSON with sorted keys
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        let sorted: BTreeMap<String, Value> = match serde_json::to_value(self)? {
            Value::Object(map) => map.into_iter().collect(),
            _ => BTreeMap::new(),
        };
        serde_json::to_string_pretty(&sorted)
    }

    /// Write the manifest into `folder`, replacing any previous one
    pub fn write(&self, folder: &Path) -> Result<PathBuf, ManifestError> {
        let path = Self::path_in(folder);
        let json = self.to_json().map_err(|source| ManifestError::Json {
            path: path.clone(),
            source,
        })?;
        fs::write(&path, json).map_err(|e| ManifestError::io(&path, e))?;
        Ok(path)
    }

    /// Creation time, if `datetime` parses
    ///
    /// Accepts RFC 3339 as well as naive ISO-8601 timestamps, which are
    /// taken to be UTC.
    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        if let Ok(dt) = DateTime::parse_from_rfc3339(&self.datetime) {
            return Some(dt.with_timezone(&Utc));
        }
        NaiveDateTime::parse_from_str(&self.datetime, "%Y-%m-%dT%H:%M:%S%.f")
            .ok()
            .map(|naive| naive.and_utc())
    }

    /// Number of files listed
    pub fn file_count(&self) -> usize {
        self.files.len()
    }

    /// Look up the entry for `file`
    pub fn entry(&self, file: &str) -> Option<&ManifestFile> {
        self.files.iter().find(|f| f.file == file)
    }
}

/// Create or refresh the manifest of `folder`
///
/// Reads any existing `manifest.json`, replaces its `datetime` and `files`
/// keys with freshly computed values, keeps every other key, and writes
/// the result back.
pub fn build_manifest(folder: &Path) -> Result<Manifest, ManifestError> {
    let extra = read_extra_keys(folder)?;
    let mut manifest = Manifest::scan(folder)?;
    manifest.extra = extra;
    let path = manifest.write(folder)?;
    log::debug!(
        "wrote {} ({} files)",
        path.display(),
        manifest.file_count()
    );
    Ok(manifest)
}

/// Keys of an existing manifest other than `datetime` and `files`
fn read_extra_keys(folder: &Path) -> Result<BTreeMap<String, Value>, ManifestError> {
    let path = Manifest::path_in(folder);
    if !path.is_file() {
        return Ok(BTreeMap::new());
    }

    let json = fs::read_to_string(&path).map_err(|e| ManifestError::io(&path, e))?;
    let raw: Map<String, Value> =
        serde_json::from_str(&json).map_err(|source| ManifestError::Json {
            path: path.clone(),
            source,
        })?;

    Ok(raw
        .into_iter()
        .filter(|(key, _)| key != "datetime" && key != "files")
        .collect())
}

/// Compute the SHA-256 of a file as lowercase hex
///
/// The file is streamed through the hasher rather than read whole.
pub fn sha256_file(path: &Path) -> Result<String, ManifestError> {
    let mut file = File::open(path).map_err(|e| ManifestError::io(path, e))?;
    let mut hasher = Sha256::new();
    io::copy(&mut file, &mut hasher).map_err(|e| ManifestError::io(path, e))?;
    Ok(hex::encode(hasher.finalize()))
}

/// Current UTC time as RFC 3339 with microseconds
fn now_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Render a relative path with `/` separators on every platform
pub(crate) fn to_slash_path(path: &Path) -> String {
    path.components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}
