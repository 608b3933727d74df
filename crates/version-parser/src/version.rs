//! NuGet version numbers.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use semver::Prerelease;
use serde::{Serialize, Serializer};

use crate::error::VersionError;

/// A package version: `major.minor.patch[.revision][-prerelease][+metadata]`.
///
/// Missing numeric components default to zero, so `1.0`, `1.0.0` and
/// `1.0.0.0` are the same version. Pre-release labels are compared
/// case-insensitively with semantic-version precedence, a release always
/// sorts above its pre-releases, and build metadata is ignored by
/// comparison and equality.
#[derive(Debug, Clone)]
pub struct Version {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
    pub revision: u64,
    /// Lower-cased label used for ordering
    pre: Prerelease,
    /// Label as written, used for display
    label: String,
    metadata: String,
}

impl Version {
    pub fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self {
            major,
            minor,
            patch,
            revision: 0,
            pre: Prerelease::EMPTY,
            label: String::new(),
            metadata: String::new(),
        }
    }

    /// Returns a copy of this version carrying the given pre-release label.
    pub fn with_prerelease(mut self, label: &str) -> Result<Self, VersionError> {
        self.pre = parse_prerelease(&self.to_string(), label)?;
        self.label = label.to_string();
        Ok(self)
    }

    pub fn is_prerelease(&self) -> bool {
        !self.pre.is_empty()
    }

    /// The pre-release label as written, empty for releases.
    pub fn prerelease(&self) -> &str {
        &self.label
    }

    pub fn metadata(&self) -> &str {
        &self.metadata
    }

    /// True when both versions share `major.minor.patch.revision`, ignoring
    /// their pre-release labels.
    pub fn same_release(&self, other: &Version) -> bool {
        self.numbers() == other.numbers()
    }

    fn numbers(&self) -> (u64, u64, u64, u64) {
        (self.major, self.minor, self.patch, self.revision)
    }
}

fn parse_prerelease(version: &str, label: &str) -> Result<Prerelease, VersionError> {
    Prerelease::new(&label.to_ascii_lowercase()).map_err(|_| VersionError::InvalidPrerelease {
        version: version.to_string(),
        label: label.to_string(),
    })
}

impl FromStr for Version {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let text = s.trim();
        let invalid = || VersionError::InvalidVersion(s.to_string());

        let (rest, metadata) = match text.split_once('+') {
            Some((rest, metadata)) if !metadata.is_empty() => (rest, metadata),
            Some(_) => return Err(invalid()),
            None => (text, ""),
        };
        let (numbers, label) = match rest.split_once('-') {
            Some((numbers, label)) if !label.is_empty() => (numbers, label),
            Some(_) => return Err(invalid()),
            None => (rest, ""),
        };

        let mut parts = [0u64; 4];
        let mut count = 0;
        for part in numbers.split('.') {
            if count == parts.len() || part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit())
            {
                return Err(invalid());
            }
            parts[count] = part.parse().map_err(|_| invalid())?;
            count += 1;
        }

        let pre = if label.is_empty() {
            Prerelease::EMPTY
        } else {
            parse_prerelease(text, label)?
        };

        Ok(Self {
            major: parts[0],
            minor: parts[1],
            patch: parts[2],
            revision: parts[3],
            pre,
            label: label.to_string(),
            metadata: metadata.to_string(),
        })
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        self.numbers()
            .cmp(&other.numbers())
            .then_with(|| match (self.pre.is_empty(), other.pre.is_empty()) {
                (true, true) => Ordering::Equal,
                (true, false) => Ordering::Greater,
                (false, true) => Ordering::Less,
                (false, false) => self.pre.cmp(&other.pre),
            })
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Version {}

impl Hash for Version {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.numbers().hash(state);
        self.pre.hash(state);
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)?;
        if self.revision > 0 {
            write!(f, ".{}", self.revision)?;
        }
        if !self.label.is_empty() {
            write!(f, "-{}", self.label)?;
        }
        if !self.metadata.is_empty() {
            write!(f, "+{}", self.metadata)?;
        }
        Ok(())
    }
}

impl Serialize for Version {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}
