//! Latest-version selection rules.
//!
//! Everything here is pure: the same candidates, resolved version and
//! parameters always select the same version.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::VersionError;
use crate::range::VersionRange;
use crate::version::Version;

/// Whether pre-release versions may be reported as the latest version.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrereleaseMode {
    /// Only when the resolved version is already a pre-release
    #[default]
    #[serde(alias = "Auto")]
    Auto,
    #[serde(alias = "Always")]
    Always,
    #[serde(alias = "Never")]
    Never,
}

/// Restricts candidates to the resolved version's major (and minor) line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VersionLock {
    #[default]
    #[serde(alias = "None")]
    None,
    #[serde(alias = "Major")]
    Major,
    #[serde(alias = "Minor")]
    Minor,
}

impl FromStr for PrereleaseMode {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "always" => Ok(Self::Always),
            "never" => Ok(Self::Never),
            _ => Err(VersionError::UnknownMode {
                kind: "pre-release mode",
                value: s.to_string(),
                expected: "auto, always, never",
            }),
        }
    }
}

impl FromStr for VersionLock {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "none" => Ok(Self::None),
            "major" => Ok(Self::Major),
            "minor" => Ok(Self::Minor),
            _ => Err(VersionError::UnknownMode {
                kind: "version lock",
                value: s.to_string(),
                expected: "none, major, minor",
            }),
        }
    }
}

impl fmt::Display for PrereleaseMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Auto => "auto",
            Self::Always => "always",
            Self::Never => "never",
        })
    }
}

impl fmt::Display for VersionLock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::None => "none",
            Self::Major => "major",
            Self::Minor => "minor",
        })
    }
}

/// Release candidates always pass. Pre-release candidates pass under
/// `Always`, and under `Auto` or `Never` only when the resolved version is
/// itself a pre-release.
pub fn allows_prerelease(
    candidate: &Version,
    resolved_is_prerelease: bool,
    mode: PrereleaseMode,
) -> bool {
    if !candidate.is_prerelease() {
        return true;
    }
    match mode {
        PrereleaseMode::Always => true,
        PrereleaseMode::Never | PrereleaseMode::Auto => resolved_is_prerelease,
    }
}

pub fn within_lock(candidate: &Version, resolved: &Version, lock: VersionLock) -> bool {
    match lock {
        VersionLock::None => true,
        VersionLock::Major => candidate.major == resolved.major,
        VersionLock::Minor => {
            candidate.major == resolved.major && candidate.minor == resolved.minor
        }
    }
}

/// Picks the greatest candidate inside `range` that passes the lock and
/// pre-release rules.
///
/// The result may equal `resolved` when nothing newer qualifies; `None`
/// means no candidate qualified at all.
pub fn select_latest<'a>(
    candidates: impl IntoIterator<Item = &'a Version>,
    resolved: &Version,
    range: &VersionRange,
    lock: VersionLock,
    prerelease: PrereleaseMode,
) -> Option<Version> {
    let resolved_is_prerelease = resolved.is_prerelease();
    candidates
        .into_iter()
        .filter(|c| range.satisfies(c))
        .filter(|c| within_lock(c, resolved, lock))
        .filter(|c| allows_prerelease(c, resolved_is_prerelease, prerelease))
        .max()
        .cloned()
}

/// Selection parameters shared by every dependency of a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VersionPolicy {
    pub prerelease: PrereleaseMode,
    pub lock: VersionLock,
}

impl VersionPolicy {
    pub fn new(prerelease: PrereleaseMode, lock: VersionLock) -> Self {
        Self { prerelease, lock }
    }

    pub fn select_latest<'a>(
        &self,
        candidates: impl IntoIterator<Item = &'a Version>,
        resolved: &Version,
        range: &VersionRange,
    ) -> Option<Version> {
        select_latest(candidates, resolved, range, self.lock, self.prerelease)
    }
}
