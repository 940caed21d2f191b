//! Packing archive folders into single-file blobs
//!
//! The storage core only needs "directory → blob" and "blob → directory".
//! [`ZipPacker`] is the default; anything that round-trips relative paths
//! and file contents exactly can stand in through the [`Packer`] trait.

use std::fs::{self, File};
use std::io;
use std::path::{Component, Path, PathBuf};

use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use super::naming::PACK_EXTENSION;
use crate::manifest::to_slash_path;

/// Errors from packing and unpacking
#[derive(Debug, thiserror::Error)]
pub enum PackError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Zip error in {path}: {source}")]
    Zip {
        path: PathBuf,
        #[source]
        source: zip::result::ZipError,
    },

    #[error("Walk error: {0}")]
    Walk(#[from] walkdir::Error),

    #[error("path traversal detected: {path}")]
    PathTraversal { path: String },
}

impl PackError {
    fn io(path: &Path, source: io::Error) -> Self {
        PackError::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    fn zip(path: &Path, source: zip::result::ZipError) -> Self {
        PackError::Zip {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Directory ↔ blob conversion used by the storage clients
pub trait Packer: Send + Sync {
    /// Pack `dir` into a sibling blob named `<dir>.zip` and return its path
    fn pack(&self, dir: &Path) -> Result<PathBuf, PackError>;

    /// Unpack `blob` into `dest`, creating `dest` if needed
    fn unpack(&self, blob: &Path, dest: &Path) -> Result<(), PackError>;
}

/// Path of the blob that packing `dir` produces
pub fn blob_path_for(dir: &Path) -> PathBuf {
    let mut name = dir.as_os_str().to_os_string();
    name.push(".");
    name.push(PACK_EXTENSION);
    PathBuf::from(name)
}

/// Deflate-compressed zip archives via the `zip` crate
///
/// Entries are written in sorted order with `/`-separated names.
/// Directories get their own entries so empty ones survive a round trip.
#[derive(Debug, Clone, Copy, Default)]
pub struct ZipPacker;

impl Packer for ZipPacker {
    fn pack(&self, dir: &Path) -> Result<PathBuf, PackError> {
        let blob = blob_path_for(dir);
        let file = File::create(&blob).map_err(|e| PackError::io(&blob, e))?;
        let mut writer = ZipWriter::new(file);

        for entry in WalkDir::new(dir)
            .follow_links(true)
            .sort_by(|a, b| a.file_name().cmp(b.file_name()))
        {
            let entry = entry?;
            let rel = match entry.path().strip_prefix(dir) {
                Ok(rel) if !rel.as_os_str().is_empty() => to_slash_path(rel),
                _ => continue,
            };

            if entry.file_type().is_dir() {
                writer
                    .add_directory(rel, entry_options(0o755))
                    .map_err(|e| PackError::zip(&blob, e))?;
            } else if entry.file_type().is_file() {
                let size = entry.metadata()?.len();
                let options = entry_options(0o644).large_file(size >= u64::from(u32::MAX));
                writer
                    .start_file(rel, options)
                    .map_err(|e| PackError::zip(&blob, e))?;
                let mut source = File::open(entry.path()).map_err(|e| PackError::io(entry.path(), e))?;
                io::copy(&mut source, &mut writer).map_err(|e| PackError::io(entry.path(), e))?;
            }
        }

        writer.finish().map_err(|e| PackError::zip(&blob, e))?;
        log::debug!("packed {} into {}", dir.display(), blob.display());
        Ok(blob)
    }

    fn unpack(&self, blob: &Path, dest: &Path) -> Result<(), PackError> {
        let file = File::open(blob).map_err(|e| PackError::io(blob, e))?;
        let mut archive = ZipArchive::new(file).map_err(|e| PackError::zip(blob, e))?;
        fs::create_dir_all(dest).map_err(|e| PackError::io(dest, e))?;

        for index in 0..archive.len() {
            let mut entry = archive.by_index(index).map_err(|e| PackError::zip(blob, e))?;
            validate_entry_path(entry.name())?;
            let rel = entry
                .enclosed_name()
                .map(|p| p.to_path_buf())
                .ok_or_else(|| PackError::PathTraversal {
                    path: entry.name().to_string(),
                })?;
            let out = dest.join(rel);

            if entry.is_dir() {
                fs::create_dir_all(&out).map_err(|e| PackError::io(&out, e))?;
                continue;
            }
            if let Some(parent) = out.parent() {
                fs::create_dir_all(parent).map_err(|e| PackError::io(parent, e))?;
            }
            let mut target = File::create(&out).map_err(|e| PackError::io(&out, e))?;
            io::copy(&mut entry, &mut target).map_err(|e| PackError::io(&out, e))?;
        }

        log::debug!("unpacked {} into {}", blob.display(), dest.display());
        Ok(())
    }
}

fn entry_options(mode: u32) -> SimpleFileOptions {
    SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .unix_permissions(mode)
}

/// Reject absolute entry names and any `..` component
fn validate_entry_path(name: &str) -> Result<(), PackError> {
    let path = Path::new(name);
    let escapes = path.is_absolute()
        || name.starts_with('/')
        || name.starts_with('\\')
        || path
            .components()
            .any(|c| matches!(c, Component::ParentDir | Component::Prefix(_)));
    if escapes {
        return Err(PackError::PathTraversal {
            path: name.to_string(),
        });
    }
    Ok(())
}
