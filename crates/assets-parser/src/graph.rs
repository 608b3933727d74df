//! Build per-framework dependency graphs from restore metadata.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use tracing::{debug, trace, warn};
use version_parser::{Version, VersionRange};

use crate::assets::{AssetsFile, FrameworkSpec, OrderedMap, TargetLibrary};
use crate::entity::{Dependency, Project, SkippedProfile, TargetProfile};
use crate::error::GraphError;

/// Turns restore metadata into [`Project`]s.
///
/// Direct references are always included. With `transitive` enabled the
/// graph is expanded breadth-first up to `depth_limit` reference hops; each
/// package appears once per framework, at the first depth it was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GraphBuilder {
    transitive: bool,
    depth_limit: u32,
}

/// Restored package libraries of one target, keyed by lower-cased id.
struct LibraryIndex<'a> {
    packages: HashMap<String, (&'a str, &'a str, &'a TargetLibrary)>,
}

impl<'a> LibraryIndex<'a> {
    fn new(target: &'a OrderedMap<TargetLibrary>) -> Self {
        let mut packages = HashMap::with_capacity(target.len());
        for (key, library) in target.iter() {
            if !library.is_package() {
                continue;
            }
            let Some((name, version)) = key.split_once('/') else {
                debug!("ignoring library without version: {}", key);
                continue;
            };
            packages
                .entry(name.to_ascii_lowercase())
                .or_insert((name, version, library));
        }
        Self { packages }
    }

    /// `(name, version, library)` of a restored package.
    fn get(&self, name: &str) -> Option<(&'a str, &'a str, &'a TargetLibrary)> {
        self.packages.get(&name.to_ascii_lowercase()).copied()
    }
}

impl GraphBuilder {
    pub fn new(transitive: bool, depth_limit: u32) -> Self {
        Self {
            transitive,
            depth_limit,
        }
    }

    /// Build a project from its restore metadata.
    ///
    /// `project_file` names the project when the metadata does not.
    /// Frameworks that fail to build are recorded in
    /// [`Project::skipped_profiles`] instead of failing the whole project.
    #[tracing::instrument(name = "build_graph", level = "trace", skip(self, assets))]
    pub fn build(&self, assets: &AssetsFile, project_file: &Path) -> Project {
        let restore = &assets.project.restore;
        let path = restore
            .project_path
            .as_deref()
            .map(Path::new)
            .unwrap_or(project_file)
            .to_path_buf();
        let name = restore.project_name.clone().unwrap_or_else(|| {
            path.file_stem()
                .map(|s| s.to_string_lossy().to_string())
                .unwrap_or_default()
        });

        let mut project = Project {
            name,
            path,
            sources: assets.sources(),
            ..Default::default()
        };

        for (framework, spec) in assets.project.frameworks.iter() {
            let profile = match assets.target_for(framework, spec) {
                Some(target) => self.build_profile(framework, spec, target),
                None => Err(GraphError::missing_target(framework)),
            };
            match profile {
                Ok(profile) => {
                    trace!(
                        "built profile {} of {} with {} dependencies",
                        profile.name,
                        project.name,
                        profile.dependencies.len()
                    );
                    project.profiles.push(profile);
                }
                Err(e) => {
                    warn!("skipping {} of {}: {}", framework, project.name, e);
                    project.skipped_profiles.push(SkippedProfile {
                        name: framework.to_string(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        project
    }

    /// Build the dependency list of one framework.
    pub fn build_profile(
        &self,
        framework: &str,
        spec: &FrameworkSpec,
        target: &OrderedMap<TargetLibrary>,
    ) -> Result<TargetProfile, GraphError> {
        let libraries = LibraryIndex::new(target);
        let mut seen: HashSet<String> = HashSet::new();
        let mut dependencies: Vec<Dependency> = Vec::new();

        // Seed every direct reference first so depth 0 always wins.
        for (name, reference) in spec.dependencies.iter() {
            if !reference.is_package() || !seen.insert(name.to_ascii_lowercase()) {
                continue;
            }
            let Some((_, version, _)) = libraries.get(name) else {
                return Err(GraphError::missing_library(framework, name));
            };
            let resolved: Version = version
                .parse()
                .map_err(|e| GraphError::invalid_version(framework, name, e))?;
            let range = match reference.version.as_deref() {
                Some(range) => range
                    .parse()
                    .map_err(|e| GraphError::invalid_range(framework, name, e))?,
                None => VersionRange::any(),
            };

            let mut dependency = Dependency::direct(name, range, resolved);
            dependency.is_auto_referenced = reference.auto_referenced;
            dependencies.push(dependency);
        }

        if !self.transitive {
            return Ok(TargetProfile {
                name: framework.to_string(),
                dependencies,
            });
        }

        let mut frontier: Vec<usize> = (0..dependencies.len()).collect();
        for depth in 1..=self.depth_limit {
            let mut next = Vec::new();
            for index in frontier {
                let Some((_, _, library)) = libraries.get(&dependencies[index].name) else {
                    continue;
                };
                for (name, range) in library.dependencies.iter() {
                    if seen.contains(&name.to_ascii_lowercase()) {
                        continue;
                    }
                    let Some((restored_name, version, _)) = libraries.get(name) else {
                        debug!("{} has no restored library in {}, skipping", name, framework);
                        continue;
                    };
                    let resolved: Version = version
                        .parse()
                        .map_err(|e| GraphError::invalid_version(framework, name, e))?;
                    let range: VersionRange = range
                        .parse()
                        .map_err(|e| GraphError::invalid_range(framework, name, e))?;

                    seen.insert(name.to_ascii_lowercase());
                    next.push(dependencies.len());
                    dependencies.push(Dependency::transitive(
                        restored_name,
                        range,
                        resolved,
                        depth,
                    ));
                }
            }
            if next.is_empty() {
                break;
            }
            frontier = next;
        }

        Ok(TargetProfile {
            name: framework.to_string(),
            dependencies,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GraphErrorKind;

    /// App -> A -> B -> C -> D, App -> C directly, Auto is SDK-provided.
    const CHAIN: &str = r#"{
        "version": 3,
        "targets": {
            "net8.0": {
                "A/1.0.0": { "type": "package", "dependencies": { "B": "[2.0.0, )" } },
                "B/2.1.0": { "type": "package", "dependencies": { "C": "[3.0.0, )", "Lib": "1.0.0" } },
                "C/3.0.0": { "type": "package", "dependencies": { "D": "[4.0.0, )" } },
                "D/4.0.0": { "type": "package" },
                "Auto/8.0.0": { "type": "package" },
                "Lib/1.0.0": { "type": "project" }
            }
        },
        "project": {
            "restore": {
                "projectName": "App",
                "projectPath": "/src/App/App.csproj",
                "sources": { "https://api.nuget.org/v3/index.json": {} }
            },
            "frameworks": {
                "net8.0": {
                    "targetAlias": "net8.0",
                    "dependencies": {
                        "A": { "target": "Package", "version": "[1.0.0, )" },
                        "c": { "target": "Package", "version": "[3.0.0, )" },
                        "Auto": { "target": "Package", "version": "[8.0.0, )", "autoReferenced": true }
                    }
                }
            }
        }
    }"#;

    fn build(json: &str, transitive: bool, depth: u32) -> Project {
        let assets = AssetsFile::parse(json).unwrap();
        GraphBuilder::new(transitive, depth).build(&assets, Path::new("App.csproj"))
    }

    fn names(profile: &TargetProfile) -> Vec<(&str, u32)> {
        profile
            .dependencies
            .iter()
            .map(|d| (d.name.as_str(), d.depth))
            .collect()
    }

    #[test]
    fn test_project_metadata() {
        let project = build(CHAIN, false, 0);
        assert_eq!(project.name, "App");
        assert_eq!(project.path, Path::new("/src/App/App.csproj"));
        assert_eq!(project.sources, vec!["https://api.nuget.org/v3/index.json"]);
        assert_eq!(project.profiles.len(), 1);
        assert!(project.skipped_profiles.is_empty());
    }

    #[test]
    fn test_direct_only() {
        for (transitive, depth) in [(false, 0), (false, 5), (true, 0)] {
            let project = build(CHAIN, transitive, depth);
            let profile = &project.profiles[0];
            assert_eq!(names(profile), vec![("A", 0), ("c", 0), ("Auto", 0)]);
            assert!(profile.dependencies.iter().all(|d| !d.is_transitive));
        }
    }

    #[test]
    fn test_depth_bound() {
        let project = build(CHAIN, true, 1);
        assert_eq!(
            names(&project.profiles[0]),
            vec![("A", 0), ("c", 0), ("Auto", 0), ("B", 1), ("D", 1)]
        );

        let project = build(CHAIN, true, 2);
        let profile = &project.profiles[0];
        assert!(profile.dependencies.iter().all(|d| d.depth <= 2));
        assert_eq!(profile.dependencies.len(), 5);
    }

    #[test]
    fn test_direct_wins_over_transitive() {
        // C is reachable at depth 2 through A -> B but is also direct
        let project = build(CHAIN, true, 3);
        let profile = &project.profiles[0];
        let c: Vec<_> = profile
            .dependencies
            .iter()
            .filter(|d| d.name.eq_ignore_ascii_case("c"))
            .collect();
        assert_eq!(c.len(), 1);
        assert!(!c[0].is_transitive);
        assert_eq!(c[0].depth, 0);
        assert_eq!(c[0].resolved_version.to_string(), "3.0.0");
    }

    #[test]
    fn test_transitive_fields() {
        let project = build(CHAIN, true, 1);
        let b = project.profiles[0].dependency("b").unwrap();
        assert!(b.is_transitive);
        assert_eq!(b.depth, 1);
        assert_eq!(b.requested_range.to_string(), "[2.0.0, )");
        assert_eq!(b.resolved_version.to_string(), "2.1.0");
        assert!(b.latest_version.is_none());
    }

    #[test]
    fn test_project_references_skipped() {
        let project = build(CHAIN, true, 5);
        assert!(project.profiles[0].dependency("Lib").is_none());
    }

    #[test]
    fn test_auto_referenced_kept_and_flagged() {
        let project = build(CHAIN, false, 0);
        let auto = project.profiles[0].dependency("Auto").unwrap();
        assert!(auto.is_auto_referenced);
        assert!(!project.profiles[0].dependency("A").unwrap().is_auto_referenced);
    }

    #[test]
    fn test_first_discovered_wins_among_transitive_paths() {
        // X is reachable at depth 1 via Q and at depth 1 via P; P is listed first
        let json = r#"{
            "targets": {
                "net8.0": {
                    "P/1.0.0": { "type": "package", "dependencies": { "X": "[1.0.0, )" } },
                    "Q/1.0.0": { "type": "package", "dependencies": { "X": "[0.5.0, )" } },
                    "X/1.2.0": { "type": "package" }
                }
            },
            "project": {
                "frameworks": {
                    "net8.0": {
                        "dependencies": {
                            "P": { "target": "Package", "version": "1.0.0" },
                            "Q": { "target": "Package", "version": "1.0.0" }
                        }
                    }
                }
            }
        }"#;
        let project = build(json, true, 3);
        let x = project.profiles[0].dependency("X").unwrap();
        assert_eq!(x.requested_range.to_string(), "[1.0.0, )");
        assert_eq!(project.name, "App");
    }

    #[test]
    fn test_shallower_transitive_path_wins() {
        // X is reachable at depth 3 via C -> D -> E and at depth 2 via A -> B;
        // the deeper path starts from the first direct reference
        let json = r#"{
            "targets": {
                "net8.0": {
                    "C/1.0.0": { "type": "package", "dependencies": { "D": "1.0.0" } },
                    "D/1.0.0": { "type": "package", "dependencies": { "E": "1.0.0" } },
                    "E/1.0.0": { "type": "package", "dependencies": { "X": "[0.1.0, )" } },
                    "A/1.0.0": { "type": "package", "dependencies": { "B": "1.0.0" } },
                    "B/1.0.0": { "type": "package", "dependencies": { "X": "[1.0.0, )" } },
                    "X/1.2.0": { "type": "package" }
                }
            },
            "project": {
                "frameworks": {
                    "net8.0": {
                        "dependencies": {
                            "C": { "target": "Package", "version": "1.0.0" },
                            "A": { "target": "Package", "version": "1.0.0" }
                        }
                    }
                }
            }
        }"#;
        let project = build(json, true, 3);
        let profile = &project.profiles[0];
        let x: Vec<_> = profile.dependencies.iter().filter(|d| d.name == "X").collect();
        assert_eq!(x.len(), 1);
        assert_eq!(x[0].depth, 2);
        assert_eq!(x[0].requested_range.to_string(), "[1.0.0, )");
    }

    #[test]
    fn test_multi_target_with_long_framework_names() {
        let json = r#"{
            "targets": {
                ".NETStandard,Version=v2.0": {
                    "A/1.0.0": { "type": "package", "dependencies": { "NETStandard.Library": "2.0.3" } },
                    "NETStandard.Library/2.0.3": { "type": "package" }
                },
                "net8.0": { "A/1.0.0": { "type": "package" } }
            },
            "project": {
                "frameworks": {
                    "netstandard2.0": {
                        "targetAlias": "netstandard2.0",
                        "dependencies": { "A": { "target": "Package", "version": "[1.0.0, )" } }
                    },
                    "net8.0": {
                        "targetAlias": "net8.0",
                        "dependencies": { "A": { "target": "Package", "version": "[1.0.0, )" } }
                    }
                }
            }
        }"#;
        let project = build(json, true, 1);
        let names: Vec<&str> = project.profiles.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["netstandard2.0", "net8.0"]);
        assert!(project.skipped_profiles.is_empty());
        assert!(project.profiles[0].dependency("NETStandard.Library").is_some());
    }

    #[test]
    fn test_missing_target_skips_profile_only() {
        let json = r#"{
            "targets": {
                "net8.0": { "A/1.0.0": { "type": "package" } }
            },
            "project": {
                "frameworks": {
                    "net8.0": { "dependencies": { "A": { "target": "Package", "version": "1.0.0" } } },
                    "net6.0": { "dependencies": { "A": { "target": "Package", "version": "1.0.0" } } }
                }
            }
        }"#;
        let project = build(json, false, 0);
        assert_eq!(project.profiles.len(), 1);
        assert_eq!(project.profiles[0].name, "net8.0");
        assert_eq!(project.skipped_profiles.len(), 1);
        assert_eq!(project.skipped_profiles[0].name, "net6.0");
    }

    #[test]
    fn test_invalid_resolved_version() {
        let json = r#"{
            "targets": {
                "net8.0": { "A/not-a-version": { "type": "package" } }
            },
            "project": {
                "frameworks": {
                    "net8.0": { "dependencies": { "A": { "target": "Package", "version": "1.0.0" } } }
                }
            }
        }"#;
        let assets = AssetsFile::parse(json).unwrap();
        let spec = assets.project.frameworks.get("net8.0").unwrap();
        let target = assets.target_for("net8.0", spec).unwrap();
        let err = GraphBuilder::new(false, 0)
            .build_profile("net8.0", spec, target)
            .unwrap_err();
        assert_eq!(err.kind(), &GraphErrorKind::InvalidVersion("A".to_string()));
        assert_eq!(err.profile(), "net8.0");
    }

    #[test]
    fn test_missing_direct_library() {
        let json = r#"{
            "targets": { "net8.0": {} },
            "project": {
                "frameworks": {
                    "net8.0": { "dependencies": { "A": { "target": "Package", "version": "1.0.0" } } }
                }
            }
        }"#;
        let project = build(json, false, 0);
        assert!(project.profiles.is_empty());
        assert!(project.skipped_profiles[0].reason.contains("`A`"));
    }
}
