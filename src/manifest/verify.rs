//! Archive verification against manifest.json

use std::io;
use std::path::{Component, Path};

use super::{sha256_file, Manifest, ManifestError};

/// Check every file listed in the folder's manifest against its digest
///
/// Stops at the first file whose digest differs. A listed file that cannot
/// be read (missing, permission denied) counts as a mismatch rather than an
/// I/O failure. Files present on disk but absent from the manifest are not
/// reported.
pub fn verify_archive(folder: &Path) -> Result<Manifest, ManifestError> {
    let manifest = Manifest::load(folder)?;

    for entry in &manifest.files {
        if !is_contained(&entry.file) {
            return Err(ManifestError::InvalidManifest {
                path: Manifest::path_in(folder),
                reason: format!("entry escapes archive folder: {}", entry.file),
            });
        }

        let actual = match sha256_file(&folder.join(&entry.file)) {
            Ok(digest) => digest,
            Err(ManifestError::Io { source, .. }) if source.kind() == io::ErrorKind::NotFound => {
                "<missing>".to_string()
            }
            Err(ManifestError::Io { source, .. }) => format!("<unreadable: {}>", source),
            Err(e) => return Err(e),
        };

        if actual != entry.sha256 {
            log::warn!(
                "integrity check failed for {} in {}",
                entry.file,
                folder.display()
            );
            return Err(ManifestError::IntegrityMismatch {
                file: entry.file.clone(),
                expected: entry.sha256.clone(),
                actual,
            });
        }
    }

    log::debug!(
        "verified {} files in {}",
        manifest.file_count(),
        folder.display()
    );
    Ok(manifest)
}

/// Manifest paths must stay relative and below the folder root
fn is_contained(rel: &str) -> bool {
    let path = Path::new(rel);
    !rel.is_empty()
        && path
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
}
