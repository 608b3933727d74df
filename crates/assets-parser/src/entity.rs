//! Dependency graph types.
//!
//! These are the values handed from graph construction to version
//! resolution and then to reporting. Everything except
//! [`Dependency::latest_version`] is fixed once the graph is built.

use std::path::PathBuf;

use serde::Serialize;
use version_parser::{Version, VersionRange};

/// A buildable project and the frameworks it targets.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub name: String,
    pub path: PathBuf,
    /// Package feed endpoints, in restore order
    pub sources: Vec<String>,
    pub profiles: Vec<TargetProfile>,
    /// Frameworks whose restore metadata could not be used
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub skipped_profiles: Vec<SkippedProfile>,
}

/// One target framework of a project.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetProfile {
    pub name: String,
    /// Breadth-first discovery order: direct references first
    pub dependencies: Vec<Dependency>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SkippedProfile {
    pub name: String,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Dependency {
    pub name: String,
    pub requested_range: VersionRange,
    /// The version restore selected
    pub resolved_version: Version,
    /// Filled in by version resolution; `None` when it could not be determined
    pub latest_version: Option<Version>,
    pub is_transitive: bool,
    /// Implicitly referenced by the SDK
    pub is_auto_referenced: bool,
    /// Reference hops from the project, 0 for direct references
    pub depth: u32,
}

impl Dependency {
    pub fn direct(name: impl Into<String>, range: VersionRange, resolved: Version) -> Self {
        Self {
            name: name.into(),
            requested_range: range,
            resolved_version: resolved,
            latest_version: None,
            is_transitive: false,
            is_auto_referenced: false,
            depth: 0,
        }
    }

    pub fn transitive(
        name: impl Into<String>,
        range: VersionRange,
        resolved: Version,
        depth: u32,
    ) -> Self {
        Self {
            is_transitive: true,
            depth,
            ..Self::direct(name, range, resolved)
        }
    }

    /// Returns true if a version newer than the resolved one was found.
    pub fn is_outdated(&self) -> bool {
        self.latest_version
            .as_ref()
            .is_some_and(|latest| latest > &self.resolved_version)
    }
}

impl TargetProfile {
    /// Lookup by package id, ignoring case as NuGet does.
    pub fn dependency(&self, name: &str) -> Option<&Dependency> {
        self.dependencies
            .iter()
            .find(|d| d.name.eq_ignore_ascii_case(name))
    }
}
