//! Archive folders
//!
//! An archive folder is an immutable, versioned copy of a dataset living
//! next to it in the staging area as `<name>.<version>`, with a
//! `manifest.json` describing its contents. Finalized folders are never
//! overwritten; publishing the same version twice is an error.

pub mod naming;
mod pack;

pub use naming::{version_sort_key, versions_of, ArchiveName, PACK_EXTENSION};
pub use pack::{blob_path_for, PackError, Packer, ZipPacker};

use std::fs;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::error::StorageError;
use crate::manifest::{build_manifest, Manifest};
use crate::version::{Version, VersionRequest};

/// A finalized archive folder
#[derive(Debug, Clone)]
pub struct ArchiveFolder {
    /// Location of the folder in the staging area
    pub path: PathBuf,
    /// Logical name and version
    pub archive: ArchiveName,
    /// Resolved version
    pub version: Version,
    /// Manifest written into the folder
    pub manifest: Manifest,
}

impl ArchiveFolder {
    /// Name of the packed blob relative to the staging root
    pub fn blob_name(&self) -> String {
        self.archive.file_name()
    }
}

/// Create a new archive folder for dataset `name` under `base`
///
/// The target version is either `request`'s explicit version or a bump of
/// the last entry of `prior` (which must be sorted ascending). The dataset
/// at `base/name` may be a directory, copied recursively, or a single file,
/// copied into a fresh folder. Fails without touching the disk when the
/// source is missing or `base/<name>.<version>` already exists.
pub fn build_archive_folder(
    base: &Path,
    name: &str,
    prior: Option<&[String]>,
    request: VersionRequest,
) -> Result<ArchiveFolder, StorageError> {
    validate_dataset_name(name)?;

    let src = base.join(name);
    if !src.exists() {
        return Err(StorageError::NotFound(src.display().to_string()));
    }

    let version = request.resolve(prior)?;
    let archive = ArchiveName::new(name, version);
    let folder = base.join(archive.folder_name());
    if folder.exists() {
        return Err(StorageError::AlreadyExists(format!(
            "Archive folder {}",
            folder.display()
        )));
    }

    log::debug!("building archive folder {} from {}", folder.display(), src.display());
    match populate(&src, &folder) {
        Ok(manifest) => Ok(ArchiveFolder {
            path: folder,
            archive,
            version,
            manifest,
        }),
        Err(e) => {
            // Leave no half-built version behind
            let _ = fs::remove_dir_all(&folder);
            Err(e)
        }
    }
}

fn populate(src: &Path, folder: &Path) -> Result<Manifest, StorageError> {
    if src.is_file() {
        let file_name = src.file_name().ok_or_else(|| StorageError::InvalidName {
            name: src.display().to_string(),
            reason: "dataset file has no file name".to_string(),
        })?;
        fs::create_dir_all(folder).map_err(|e| StorageError::io(folder, e))?;
        let dst = folder.join(file_name);
        fs::copy(src, &dst).map_err(|e| StorageError::io(&dst, e))?;
    } else {
        copy_tree(src, folder)?;
    }
    Ok(build_manifest(folder)?)
}

/// Recursively copy the directory `src` to `dst`, following symlinks
pub(crate) fn copy_tree(src: &Path, dst: &Path) -> Result<(), StorageError> {
    for entry in WalkDir::new(src).follow_links(true) {
        let entry = entry.map_err(|e| {
            let path = e.path().map(Path::to_path_buf).unwrap_or_else(|| src.to_path_buf());
            StorageError::io(&path, e.into())
        })?;
        let rel = match entry.path().strip_prefix(src) {
            Ok(rel) => rel,
            Err(_) => continue,
        };
        let target = dst.join(rel);

        if entry.file_type().is_dir() {
            fs::create_dir_all(&target).map_err(|e| StorageError::io(&target, e))?;
        } else if entry.file_type().is_file() {
            fs::copy(entry.path(), &target).map_err(|e| StorageError::io(&target, e))?;
        }
    }
    Ok(())
}

/// Dataset names must survive the archive naming convention and stay
/// inside the staging root
pub fn validate_dataset_name(name: &str) -> Result<(), StorageError> {
    let invalid = |reason: &str| StorageError::InvalidName {
        name: name.to_string(),
        reason: reason.to_string(),
    };

    if name.is_empty() {
        return Err(invalid("name is empty"));
    }
    if name
        .split('/')
        .any(|part| part.is_empty() || part == "." || part == "..")
    {
        return Err(invalid("name must be a relative path without empty, '.' or '..' segments"));
    }

    let candidate = ArchiveName::new(name, Version::default());
    match ArchiveName::parse(&candidate.file_name()) {
        Some(parsed) if parsed.name == name => Ok(()),
        _ => Err(invalid(
            "only word characters, '.', '/', '-' and whitespace are allowed",
        )),
    }
}
