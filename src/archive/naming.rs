//! Stored archive names
//!
//! Archives in a storage area are named `<name>.<major>.<minor>.<patch>.zip`.
//! Listings may contain anything else too, so parsing is match-or-none and
//! never fails.

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;

use crate::version::Version;

/// Extension of packed archive blobs
pub const PACK_EXTENSION: &str = "zip";

/// Logical name characters are word characters, dot, slash, whitespace and
/// hyphen; the version and extension are anchored at the end. `\w`, `\s`
/// and `\d` are Unicode classes.
const ARCHIVE_NAME_PATTERN: &str = r"^([./\s\w-]+)\.(\d+\.\d+\.\d+)\.zip$";

fn archive_name_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(ARCHIVE_NAME_PATTERN).ok()).as_ref()
}

/// A parsed archive file name
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ArchiveName {
    /// Logical dataset name shared by every version
    pub name: String,
    /// Version string exactly as it appears in the file name
    pub version: String,
}

impl ArchiveName {
    /// Build the name of an archive for `name` at `version`
    pub fn new(name: impl Into<String>, version: Version) -> Self {
        Self {
            name: name.into(),
            version: version.to_string(),
        }
    }

    /// Split `s` into logical name and version, or `None` if `s` is not an
    /// archive name
    pub fn parse(s: &str) -> Option<Self> {
        let caps = archive_name_regex()?.captures(s)?;
        Some(Self {
            name: caps.get(1)?.as_str().to_string(),
            version: caps.get(2)?.as_str().to_string(),
        })
    }

    /// Name of the archive folder in the staging area (`<name>.<version>`)
    pub fn folder_name(&self) -> String {
        format!("{}.{}", self.name, self.version)
    }

    /// Name of the packed blob (`<name>.<version>.zip`)
    pub fn file_name(&self) -> String {
        format!("{}.{}", self.folder_name(), PACK_EXTENSION)
    }

    /// Parsed version, if the version string is a valid version
    pub fn parsed_version(&self) -> Option<Version> {
        Version::parse(&self.version).ok()
    }
}

impl fmt::Display for ArchiveName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.file_name())
    }
}

/// Sort key for a version string found in a listing
///
/// Unparseable versions map to `None`, which orders before every valid
/// version, so a malformed entry never aborts a listing.
pub fn version_sort_key(version: &str) -> Option<Version> {
    Version::parse(version).ok()
}

/// Versions of `name` among `entries`, ascending, or `None` if there are none
pub fn versions_of<I, S>(name: &str, entries: I) -> Option<Vec<String>>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut versions: Vec<String> = entries
        .into_iter()
        .filter_map(|entry| ArchiveName::parse(entry.as_ref()))
        .filter(|archive| archive.name == name)
        .map(|archive| archive.version)
        .collect();

    if versions.is_empty() {
        return None;
    }
    versions.sort_by_cached_key(|v| version_sort_key(v));
    Some(versions)
}
