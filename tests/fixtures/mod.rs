//! Shared fixtures for the storage integration tests
//!
//! Every fixture lives in a `TempDir` with a `staging/` root (the client's
//! `local_path`) and, for local/local clients, an `area/` storage root.

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use storage_tools::{MemoryConnector, StorageClient, StorageConfig};
use tempfile::TempDir;

/// Container/bucket name used by remote fixtures
pub const REMOTE_TARGET: &str = "datasets";

/// Staging root inside a fixture directory
pub fn staging(dir: &TempDir) -> PathBuf {
    dir.path().join("staging")
}

/// Local storage-area root inside a fixture directory
pub fn storage_area(dir: &TempDir) -> PathBuf {
    dir.path().join("area")
}

/// Write a small two-level dataset called `name` into the staging root
pub fn create_dataset(staging: &Path, name: &str) -> PathBuf {
    let root = staging.join(name);
    fs::create_dir_all(root.join("labels")).unwrap();
    fs::write(root.join("train.csv"), "x,y\n1,2\n3,4\n").unwrap();
    fs::write(root.join("test.csv"), "x,y\n5,6\n").unwrap();
    fs::write(root.join("labels/classes.txt"), "cat\ndog\n").unwrap();
    root
}

/// Local/local client rooted in `dir`
pub fn local_client(dir: &TempDir) -> StorageClient {
    let config = StorageConfig::local(
        staging(dir).display().to_string(),
        storage_area(dir).display().to_string(),
    );
    StorageClient::local(config).unwrap()
}

/// Remote profile of `storage_type` ("azure" or "aws") rooted in `dir`
pub fn remote_config(dir: &TempDir, storage_type: &str) -> StorageConfig {
    let target_key = match storage_type {
        "azure" => "container",
        _ => "bucket",
    };
    StorageConfig::new(
        storage_type,
        [
            ("storage_type", storage_type.to_string()),
            ("local_path", staging(dir).display().to_string()),
            (target_key, REMOTE_TARGET.to_string()),
        ],
    )
}

/// Remote client of `storage_type` backed by `connector`
pub fn remote_client(
    dir: &TempDir,
    storage_type: &str,
    connector: &MemoryConnector,
) -> StorageClient {
    StorageClient::from_config(remote_config(dir, storage_type), connector).unwrap()
}

/// Write a settings file with one local and one aws profile
pub fn write_settings(dir: &TempDir) -> PathBuf {
    let path = dir.path().join("secrets/settings.toml");
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    let content = format!(
        r#"
[archive]
storage_type = "local"
local_path = "{staging}"
storage_area = "{area}"

[cloud]
storage_type = "aws"
local_path = "{staging}"
bucket = "{bucket}"
service_name = "s3"
aws_access_key_id = "AKIAEXAMPLE"
aws_secret_access_key = "not-a-real-secret"

[broken]
storage_type = "azure"
local_path = "{staging}"
"#,
        staging = toml_path(&staging(dir)),
        area = toml_path(&storage_area(dir)),
        bucket = REMOTE_TARGET,
    );
    fs::write(&path, content).unwrap();
    path
}

fn toml_path(path: &Path) -> String {
    path.display().to_string().replace('\\', "/")
}
