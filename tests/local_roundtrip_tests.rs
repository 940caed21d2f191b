//! Dataset round trips through a local/local storage client
//!
//! Covers version resolution on upload, idempotent download, refusal to
//! republish an existing version and integrity verification of fetched
//! archives.

mod fixtures;

use std::fs;

use storage_tools::archive::{Packer, ZipPacker};
use storage_tools::manifest::{verify_archive, MANIFEST_FILE};
use storage_tools::{
    Area, ErrorKind, Increment, StorageClient, StorageConfig, Version, VersionSelector,
};
use tempfile::TempDir;

/// A second client sharing `dir`'s storage area but with its own staging root
fn second_client(dir: &TempDir) -> StorageClient {
    let config = StorageConfig::local(
        dir.path().join("staging2").display().to_string(),
        fixtures::storage_area(dir).display().to_string(),
    );
    StorageClient::local(config).unwrap()
}

// =============================================================================
// Upload
// =============================================================================

#[test]
fn test_patch_uploads_never_clash() {
    let dir = TempDir::new().unwrap();
    let client = fixtures::local_client(&dir);
    fixtures::create_dataset(&fixtures::staging(&dir), "ds");

    client.upload_dataset("ds", Version::new(1, 0, 0)).unwrap();
    let first = client.upload_dataset("ds", Increment::Patch).unwrap();
    let second = client.upload_dataset("ds", Increment::Patch).unwrap();

    assert!(first.ends_with("ds.1.0.1.zip"));
    assert!(second.ends_with("ds.1.0.2.zip"));
    assert_eq!(
        client.ls_versions("ds").unwrap(),
        Some(vec!["1.0.0".to_string(), "1.0.1".to_string(), "1.0.2".to_string()])
    );

    let staging = fixtures::staging(&dir);
    assert!(staging.join("ds.1.0.1").join(MANIFEST_FILE).is_file());
    assert!(staging.join("ds.1.0.2").join(MANIFEST_FILE).is_file());
}

#[test]
fn test_first_upload_starts_from_zero() {
    let dir = TempDir::new().unwrap();
    let client = fixtures::local_client(&dir);
    fixtures::create_dataset(&fixtures::staging(&dir), "ds");

    assert_eq!(client.ls_versions("ds").unwrap(), None);
    client.upload_dataset("ds", Increment::Minor).unwrap();
    assert_eq!(client.ls_versions("ds").unwrap(), Some(vec!["0.1.0".to_string()]));
    assert_eq!(client.ls(Area::Storage, None).unwrap(), vec!["ds.0.1.0.zip"]);
}

#[test]
fn test_republishing_a_version_is_rejected() {
    let dir = TempDir::new().unwrap();
    let client = fixtures::local_client(&dir);
    let staging = fixtures::staging(&dir);
    fixtures::create_dataset(&staging, "ds");

    client.upload_dataset("ds", Version::new(1, 0, 0)).unwrap();
    let stored_before = fs::read(fixtures::storage_area(&dir).join("ds.1.0.0.zip")).unwrap();

    let err = client.upload_dataset("ds", Version::new(1, 0, 0)).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::AlreadyExists);
    assert!(err.to_string().contains("ds.1.0.0.zip"));

    let stored_after = fs::read(fixtures::storage_area(&dir).join("ds.1.0.0.zip")).unwrap();
    assert_eq!(stored_before, stored_after);
    assert_eq!(client.ls_versions("ds").unwrap(), Some(vec!["1.0.0".to_string()]));
}

#[test]
fn test_existing_archive_folder_blocks_upload_without_partial_write() {
    let dir = TempDir::new().unwrap();
    let client = fixtures::local_client(&dir);
    let staging = fixtures::staging(&dir);
    fixtures::create_dataset(&staging, "ds");

    let existing = staging.join("ds.2.0.0");
    fs::create_dir_all(&existing).unwrap();
    fs::write(existing.join("notes.txt"), "hand-made").unwrap();

    let err = client.upload_dataset("ds", Version::new(2, 0, 0)).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::AlreadyExists);

    assert_eq!(fs::read_to_string(existing.join("notes.txt")).unwrap(), "hand-made");
    assert!(!existing.join("train.csv").exists());
    assert!(!staging.join("ds.2.0.0.zip").exists());
    assert!(client.ls(Area::Storage, None).unwrap().is_empty());
}

#[test]
fn test_upload_missing_dataset() {
    let dir = TempDir::new().unwrap();
    let client = fixtures::local_client(&dir);

    let err = client.upload_dataset("ghost", Increment::Patch).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert!(err.to_string().contains("ghost"));
}

#[test]
fn test_upload_rejects_bad_requests() {
    let dir = TempDir::new().unwrap();
    let client = fixtures::local_client(&dir);
    fixtures::create_dataset(&fixtures::staging(&dir), "ds");

    let request = "1.0".parse::<storage_tools::VersionRequest>();
    assert!(request.is_err());

    let err = client.upload_dataset("../ds", Increment::Patch).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidName);
}

// =============================================================================
// Listing
// =============================================================================

#[test]
fn test_ls_versions_tolerates_malformed_entries() {
    let dir = TempDir::new().unwrap();
    let client = fixtures::local_client(&dir);
    let area = fixtures::storage_area(&dir);
    fs::create_dir_all(&area).unwrap();
    for name in [
        "ds.1.0.0.zip",
        "ds.10.0.0.zip",
        "ds.0.9.0.zip",
        "ds.99999999999999999999999.0.0.zip",
        "ds.1.0.zip",
        "ds.notes.txt",
        "other.3.0.0.zip",
    ] {
        fs::write(area.join(name), "x").unwrap();
    }

    let versions = client.ls_versions("ds").unwrap().unwrap();
    assert_eq!(
        versions,
        vec!["99999999999999999999999.0.0", "0.9.0", "1.0.0", "10.0.0"]
    );
    assert_eq!(client.ls_versions("other").unwrap(), Some(vec!["3.0.0".to_string()]));
    assert_eq!(client.ls_versions("missing").unwrap(), None);
}

#[test]
fn test_download_latest_keeps_zero_padded_version() {
    let dir = TempDir::new().unwrap();
    let client = fixtures::local_client(&dir);
    fixtures::create_dataset(&fixtures::staging(&dir), "ds");
    client.upload_dataset("ds", Version::new(1, 0, 0)).unwrap();

    let area = fixtures::storage_area(&dir);
    fs::rename(area.join("ds.1.0.0.zip"), area.join("ds.01.0.0.zip")).unwrap();
    assert_eq!(client.ls_versions("ds").unwrap(), Some(vec!["01.0.0".to_string()]));

    let reader = second_client(&dir);
    let path = reader.download_dataset("ds", VersionSelector::Latest, false).unwrap();
    assert_eq!(path, dir.path().join("staging2/ds.01.0.0"));
    assert_eq!(fs::read_to_string(path.join("test.csv")).unwrap(), "x,y\n5,6\n");
    verify_archive(&path).unwrap();
}

#[test]
fn test_non_ascii_dataset_roundtrip() {
    let dir = TempDir::new().unwrap();
    let client = fixtures::local_client(&dir);
    fixtures::create_dataset(&fixtures::staging(&dir), "données");

    client.upload_dataset("données", Increment::Patch).unwrap();
    assert_eq!(client.ls_versions("données").unwrap(), Some(vec!["0.0.1".to_string()]));

    let reader = second_client(&dir);
    let path = reader.download_dataset("données", VersionSelector::Latest, false).unwrap();
    assert_eq!(path, dir.path().join("staging2/données.0.0.1"));
    verify_archive(&path).unwrap();
}

#[test]
fn test_ls_local_area() {
    let dir = TempDir::new().unwrap();
    let client = fixtures::local_client(&dir);
    fixtures::create_dataset(&fixtures::staging(&dir), "ds");

    assert_eq!(
        client.ls(Area::Local, Some("ds/")).unwrap(),
        vec!["ds/labels/classes.txt", "ds/test.csv", "ds/train.csv"]
    );
}

// =============================================================================
// Download
// =============================================================================

#[test]
fn test_download_latest_restores_verified_copy() {
    let dir = TempDir::new().unwrap();
    let client = fixtures::local_client(&dir);
    fixtures::create_dataset(&fixtures::staging(&dir), "ds");
    client.upload_dataset("ds", Increment::Patch).unwrap();
    client.upload_dataset("ds", Increment::Patch).unwrap();

    let reader = second_client(&dir);
    let path = reader.download_dataset("ds", VersionSelector::Latest, false).unwrap();

    assert_eq!(path, dir.path().join("staging2/ds.0.0.2"));
    assert_eq!(
        fs::read_to_string(path.join("labels/classes.txt")).unwrap(),
        "cat\ndog\n"
    );
    let manifest = verify_archive(&path).unwrap();
    assert_eq!(manifest.file_count(), 3);
}

#[test]
fn test_download_latest_twice_is_idempotent() {
    let dir = TempDir::new().unwrap();
    let client = fixtures::local_client(&dir);
    fixtures::create_dataset(&fixtures::staging(&dir), "ds");
    client.upload_dataset("ds", Increment::Patch).unwrap();

    let reader = second_client(&dir);
    let first = reader.download_dataset("ds", VersionSelector::Latest, false).unwrap();

    // Any transfer would bring the blob back
    let blob = dir.path().join("staging2/ds.0.0.1.zip");
    fs::remove_file(&blob).unwrap();

    let second = reader.download_dataset("ds", VersionSelector::Latest, false).unwrap();
    assert_eq!(first, second);
    assert!(!blob.exists());
}

#[test]
fn test_download_overwrite_replaces_folder() {
    let dir = TempDir::new().unwrap();
    let client = fixtures::local_client(&dir);
    fixtures::create_dataset(&fixtures::staging(&dir), "ds");
    client.upload_dataset("ds", Version::new(1, 0, 0)).unwrap();

    let reader = second_client(&dir);
    let path = reader.download_dataset("ds", Version::new(1, 0, 0), false).unwrap();
    fs::write(path.join("scratch.txt"), "local edit").unwrap();

    let again = reader.download_dataset("ds", Version::new(1, 0, 0), true).unwrap();
    assert_eq!(again, path);
    assert!(!path.join("scratch.txt").exists());
    verify_archive(&path).unwrap();
}

#[test]
fn test_download_latest_without_versions() {
    let dir = TempDir::new().unwrap();
    let client = fixtures::local_client(&dir);

    let err = client.download_dataset("ds", VersionSelector::Latest, false).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NoVersionsFound);
    assert!(err.to_string().contains("ds"));
}

#[test]
fn test_download_unknown_version_is_not_found() {
    let dir = TempDir::new().unwrap();
    let client = fixtures::local_client(&dir);

    let err = client.download_dataset("ds", Version::new(4, 0, 0), false).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert!(err.to_string().contains("ds.4.0.0.zip"));
    assert!(!fixtures::staging(&dir).join("ds.4.0.0").exists());
}

#[test]
fn test_tampered_archive_fails_verification() {
    let dir = TempDir::new().unwrap();
    let client = fixtures::local_client(&dir);
    let staging = fixtures::staging(&dir);
    fixtures::create_dataset(&staging, "ds");
    client.upload_dataset("ds", Version::new(1, 0, 0)).unwrap();

    // Change one byte after the manifest was written and republish the blob
    let folder = staging.join("ds.1.0.0");
    fs::write(folder.join("train.csv"), "x,y\n1,2\n3,5\n").unwrap();
    ZipPacker.pack(&folder).unwrap();
    client.upload("ds.1.0.0.zip", true).unwrap();

    let reader = second_client(&dir);
    let err = reader.download_dataset("ds", Version::new(1, 0, 0), false).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::IntegrityMismatch);
    assert!(err.to_string().contains("sha mismatch for train.csv"));

    // The extracted folder stays for inspection
    let extracted = dir.path().join("staging2/ds.1.0.0");
    assert!(extracted.join(MANIFEST_FILE).is_file());
}

#[test]
fn test_single_file_dataset_roundtrip() {
    let dir = TempDir::new().unwrap();
    let client = fixtures::local_client(&dir);
    let staging = fixtures::staging(&dir);
    fs::create_dir_all(&staging).unwrap();
    fs::write(staging.join("labels.json"), r#"{"cat": 0, "dog": 1}"#).unwrap();

    client.upload_dataset("labels.json", Increment::Major).unwrap();
    assert_eq!(client.ls(Area::Storage, None).unwrap(), vec!["labels.json.1.0.0.zip"]);

    let reader = second_client(&dir);
    let path = reader.download_dataset("labels.json", VersionSelector::Latest, false).unwrap();
    assert_eq!(
        fs::read_to_string(path.join("labels.json")).unwrap(),
        r#"{"cat": 0, "dog": 1}"#
    );
}
