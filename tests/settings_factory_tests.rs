//! Building storage clients from a settings file

mod fixtures;

use storage_tools::config::ConfigError;
use storage_tools::{
    new_storage_client, ErrorKind, Increment, MemoryConnector, Settings, StorageError,
    StorageType, VersionSelector,
};
use tempfile::TempDir;

#[test]
fn test_factory_selects_variant_from_profile() {
    let dir = TempDir::new().unwrap();
    let settings = fixtures::write_settings(&dir);
    let connector = MemoryConnector::new();

    let local = new_storage_client("archive", &settings, &connector).unwrap();
    assert_eq!(local.storage_type(), StorageType::Local);
    assert_eq!(local.local_path(), fixtures::staging(&dir).as_path());

    let cloud = new_storage_client("cloud", &settings, &connector).unwrap();
    assert_eq!(cloud.storage_type(), StorageType::Aws);
    assert_eq!(cloud.config().get("service_name"), Some("s3"));
}

#[test]
fn test_missing_profile_is_configuration_error() {
    let dir = TempDir::new().unwrap();
    let settings = fixtures::write_settings(&dir);

    let err = new_storage_client("staging", &settings, &MemoryConnector::new()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ConfigurationError);
    assert!(err.to_string().contains("[staging] section not found"));
}

#[test]
fn test_incomplete_profile_is_configuration_error() {
    let dir = TempDir::new().unwrap();
    let settings = fixtures::write_settings(&dir);

    let err = new_storage_client("broken", &settings, &MemoryConnector::new()).unwrap_err();
    assert!(matches!(
        err,
        StorageError::Config(ConfigError::MissingKey { ref key, .. }) if key == "container"
    ));
}

#[test]
fn test_missing_settings_file() {
    let dir = TempDir::new().unwrap();
    let err = new_storage_client(
        "archive",
        &dir.path().join("secrets/settings.toml"),
        &MemoryConnector::new(),
    )
    .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ConfigurationError);
}

#[test]
fn test_secrets_never_appear_in_debug_output() {
    let dir = TempDir::new().unwrap();
    let path = fixtures::write_settings(&dir);
    let settings = Settings::load(&path).unwrap();
    let cloud = settings.profile("cloud").unwrap();

    let rendered = format!("{:?}", cloud);
    assert!(!rendered.contains("not-a-real-secret"));
    assert!(rendered.contains("AKIAEXAMPLE"));

    let client = new_storage_client("cloud", &path, &MemoryConnector::new()).unwrap();
    assert!(!format!("{:?}", client).contains("not-a-real-secret"));
}

#[test]
fn test_profiles_share_one_connector() {
    let dir = TempDir::new().unwrap();
    let settings = fixtures::write_settings(&dir);
    let connector = MemoryConnector::new();
    fixtures::create_dataset(&fixtures::staging(&dir), "ds");

    let writer = new_storage_client("cloud", &settings, &connector).unwrap();
    writer.upload_dataset("ds", Increment::Patch).unwrap();
    drop(writer);

    let reader = new_storage_client("cloud", &settings, &connector).unwrap();
    assert_eq!(reader.ls_versions("ds").unwrap(), Some(vec!["0.0.1".to_string()]));
    let path = reader.download_dataset("ds", VersionSelector::Latest, false).unwrap();
    assert_eq!(path, fixtures::staging(&dir).join("ds.0.0.1"));
}
