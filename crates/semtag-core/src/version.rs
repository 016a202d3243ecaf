//! Semantic version model.
//!
//! [`SemanticVersion`] wraps [`semver::Version`] so that parsing, ordering and
//! canonical printing follow the semver 2.0.0 grammar exactly, while the
//! surface stays small: parse (with an optional `v` prefix), print, tag, and
//! the three bump rules. Bumping always yields a release-grade version, so
//! prerelease and build metadata are dropped.

use std::fmt;
use std::str::FromStr;

use semver::Version;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from version operations.
#[derive(Error, Debug)]
pub enum VersionError {
    /// The text is not a valid semantic version.
    #[error("invalid version {text:?}: {source}")]
    Invalid {
        /// The text that failed to parse (as given, including any `v`).
        text: String,
        /// Parser diagnostics.
        #[source]
        source: semver::Error,
    },

    /// A version component would exceed `u64::MAX`.
    #[error("cannot bump {kind} of {version}: component overflow")]
    Overflow {
        /// The version being bumped.
        version: String,
        /// The bump that overflowed.
        kind: BumpKind,
    },
}

/// Result alias for version operations.
pub type VersionResult<T> = Result<T, VersionError>;

/// Which component of a version to bump.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum BumpKind {
    /// Breaking release (X.0.0).
    Major,
    /// Feature release (x.Y.0).
    Minor,
    /// Fix release (x.y.Z).
    Patch,
}

impl fmt::Display for BumpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Major => write!(f, "major"),
            Self::Minor => write!(f, "minor"),
            Self::Patch => write!(f, "patch"),
        }
    }
}

/// An immutable semantic version.
///
/// Ordering follows semver precedence. Printing is canonical
/// (`major.minor.patch[-prerelease][+build]`), never with a `v`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SemanticVersion(Version);

impl SemanticVersion {
    /// The version used when a project has never been tagged.
    pub const ZERO: Self = Self(Version::new(0, 0, 0));

    /// Construct a plain release version.
    pub const fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self(Version::new(major, minor, patch))
    }

    /// Parse a version, accepting a single optional leading `v`.
    ///
    /// Anything else outside the semver grammar is rejected, including
    /// surrounding whitespace, missing or extra numeric components, and
    /// leading zeros in numeric prerelease identifiers.
    pub fn parse(text: &str) -> VersionResult<Self> {
        let bare = text.strip_prefix('v').unwrap_or(text);
        Version::parse(bare)
            .map(Self)
            .map_err(|source| VersionError::Invalid {
                text: text.to_string(),
                source,
            })
    }

    /// Major component.
    pub const fn major(&self) -> u64 {
        self.0.major
    }

    /// Minor component.
    pub const fn minor(&self) -> u64 {
        self.0.minor
    }

    /// Patch component.
    pub const fn patch(&self) -> u64 {
        self.0.patch
    }

    /// Dot-separated prerelease identifiers, empty when absent.
    pub fn prerelease(&self) -> &str {
        self.0.pre.as_str()
    }

    /// Dot-separated build metadata identifiers, empty when absent.
    pub fn build_metadata(&self) -> &str {
        self.0.build.as_str()
    }

    /// The git tag name for this version: `"v"` followed by the canonical text.
    pub fn tag(&self) -> String {
        format!("v{self}")
    }

    /// Apply a bump rule, producing a new version.
    pub fn bump(&self, kind: BumpKind) -> VersionResult<Self> {
        match kind {
            BumpKind::Major => self.bump_major(),
            BumpKind::Minor => self.bump_minor(),
            BumpKind::Patch => self.bump_patch(),
        }
    }

    /// `X+1.0.0`, dropping prerelease and build metadata.
    pub fn bump_major(&self) -> VersionResult<Self> {
        let major = self.checked(self.major(), BumpKind::Major)?;
        Ok(Self::new(major, 0, 0))
    }

    /// `x.Y+1.0`, dropping prerelease and build metadata.
    pub fn bump_minor(&self) -> VersionResult<Self> {
        let minor = self.checked(self.minor(), BumpKind::Minor)?;
        Ok(Self::new(self.major(), minor, 0))
    }

    /// `x.y.Z+1`, dropping prerelease and build metadata.
    pub fn bump_patch(&self) -> VersionResult<Self> {
        let patch = self.checked(self.patch(), BumpKind::Patch)?;
        Ok(Self::new(self.major(), self.minor(), patch))
    }

    fn checked(&self, component: u64, kind: BumpKind) -> VersionResult<u64> {
        component.checked_add(1).ok_or_else(|| VersionError::Overflow {
            version: self.to_string(),
            kind,
        })
    }
}

impl fmt::Display for SemanticVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl FromStr for SemanticVersion {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for SemanticVersion {
    type Error = VersionError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<SemanticVersion> for String {
    fn from(value: SemanticVersion) -> Self {
        value.to_string()
    }
}
