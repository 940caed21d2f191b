//! Dataset archive versions
//!
//! Versions are `major.minor.patch` triples of non-negative integers,
//! ordered lexicographically. New versions are derived from the last
//! published one by bumping a single component.

use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Pattern a version string must match in full
const VERSION_PATTERN: &str = r"^(\d+)\.(\d+)\.(\d+)$";

fn version_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(VERSION_PATTERN).ok()).as_ref()
}

/// Errors for version parsing and increments
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VersionError {
    #[error("Invalid version: {0}")]
    InvalidVersion(String),

    #[error("Unknown increment: {0}")]
    UnknownIncrement(String),
}

/// A semantic dataset version
///
/// Field order matters: the derived `Ord` compares major, then minor,
/// then patch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[derive(Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Version {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
}

impl Version {
    /// Create a version from its three components
    pub const fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    /// Parse a `major.minor.patch` string
    ///
    /// Three dot-separated digit runs are accepted and leading zeros are
    /// allowed. Signs, whitespace, pre-release tags, non-ASCII digits and
    /// components that overflow `u64` are rejected.
    pub fn parse(s: &str) -> Result<Self, VersionError> {
        let invalid = || VersionError::InvalidVersion(s.to_string());
        let caps = version_regex().ok_or_else(invalid)?.captures(s).ok_or_else(invalid)?;

        let component = |idx: usize| -> Result<u64, VersionError> {
            caps.get(idx)
                .ok_or_else(invalid)?
                .as_str()
                .parse::<u64>()
                .map_err(|_| invalid())
        };

        Ok(Self::new(component(1)?, component(2)?, component(3)?))
    }

    /// Return the version obtained by applying `increment`
    pub fn bump(self, increment: Increment) -> Self {
        match increment {
            Increment::Patch => Self::new(self.major, self.minor, self.patch + 1),
            Increment::Minor => Self::new(self.major, self.minor + 1, 0),
            Increment::Major => Self::new(self.major + 1, 0, 0),
        }
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

impl FromStr for Version {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Version {
    type Error = VersionError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Version> for String {
    fn from(version: Version) -> Self {
        version.to_string()
    }
}

/// Which version component to bump
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Increment {
    Major,
    Minor,
    Patch,
}

impl Increment {
    /// Returns the token used for this increment
    pub fn as_str(&self) -> &'static str {
        match self {
            Increment::Major => "major",
            Increment::Minor => "minor",
            Increment::Patch => "patch",
        }
    }
}

impl fmt::Display for Increment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Increment {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "major" => Ok(Increment::Major),
            "minor" => Ok(Increment::Minor),
            "patch" => Ok(Increment::Patch),
            other => Err(VersionError::UnknownIncrement(other.to_string())),
        }
    }
}

/// The version a caller asks for when publishing a dataset
///
/// `"major"`, `"minor"` and `"patch"` select a bump of the latest
/// published version; any other token must be a literal version.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionRequest {
    Bump(Increment),
    Exact(Version),
}

impl VersionRequest {
    /// Resolve the request against the versions already published
    pub fn resolve<S: AsRef<str>>(&self, prior: Option<&[S]>) -> Result<Version, VersionError> {
        match self {
            VersionRequest::Bump(increment) => next_version(prior, *increment),
            VersionRequest::Exact(version) => Ok(*version),
        }
    }
}

impl Default for VersionRequest {
    fn default() -> Self {
        VersionRequest::Bump(Increment::Patch)
    }
}

impl FromStr for VersionRequest {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.parse::<Increment>() {
            Ok(increment) => Ok(VersionRequest::Bump(increment)),
            Err(_) => Version::parse(s).map(VersionRequest::Exact),
        }
    }
}

impl From<Increment> for VersionRequest {
    fn from(increment: Increment) -> Self {
        VersionRequest::Bump(increment)
    }
}

impl From<Version> for VersionRequest {
    fn from(version: Version) -> Self {
        VersionRequest::Exact(version)
    }
}

/// The version a caller asks for when fetching a dataset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VersionSelector {
    /// Highest version published in the storage area
    #[default]
    Latest,
    Exact(Version),
}

impl fmt::Display for VersionSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VersionSelector::Latest => write!(f, "latest"),
            VersionSelector::Exact(version) => write!(f, "{}", version),
        }
    }
}

impl FromStr for VersionSelector {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "latest" {
            return Ok(VersionSelector::Latest);
        }
        Version::parse(s).map(VersionSelector::Exact)
    }
}

impl From<Version> for VersionSelector {
    fn from(version: Version) -> Self {
        VersionSelector::Exact(version)
    }
}

/// Return the version that follows the last entry of `versions`
///
/// `versions` must already be sorted ascending; only its last element is
/// consulted. `None` or an empty slice means nothing has been published
/// yet and the baseline is `0.0.0`.
pub fn next_version<S: AsRef<str>>(
    versions: Option<&[S]>,
    increment: Increment,
) -> Result<Version, VersionError> {
    let base = match versions.and_then(|v| v.last()) {
        Some(last) => Version::parse(last.as_ref())?,
        None => Version::default(),
    };
    Ok(base.bump(increment))
}
